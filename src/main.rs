use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use clap::{Parser, Subcommand};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

use dividend_ledger::{
    change::{AmendmentRegistry, ApplyContext, ChangeTransactor, NodeStatus},
    config::NodeConfig,
    ledger::{serde_hash, Hash, LedgerEntry, LedgerHeader, LedgerIndex, LedgerState},
    tx::ChangeTransaction,
    vote::{
        dividend::{
            DividendVote, FixedClock, NetworkClock, ProposedSet, SystemClock, Validation,
            ValidationSet,
        },
        VoteTally,
    },
};

//==================== CLI ====================//

#[derive(Parser)]
#[command(name = "dividend", version, about = "Dividend voting and ledger change tools")]
struct Cli {
    /// Node config (JSON); defaults are used when omitted
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the network day instead of reading the system clock
    #[arg(long, global = true)]
    day: Option<u32>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Tally votes for a single parameter
    Tally {
        #[arg(long)]
        current: u64,
        #[arg(long)]
        target: u64,
        /// A validator vote; repeat for every vote
        #[arg(long = "vote")]
        votes: Vec<u64>,
        /// Number of validators without a preference
        #[arg(long, default_value_t = 0)]
        no_votes: u32,
    },
    /// Run dividend voting over a fixture of the last closed ledger and
    /// the validations of its parent
    Vote { fixture: PathBuf },
    /// Apply a dividend to a ledger file
    ApplyDividend {
        ledger: PathBuf,
        /// Where to write the resulting ledger
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

//==================== Files ====================//

#[derive(Serialize, Deserialize)]
struct LedgerFile {
    seq: LedgerIndex,
    #[serde(with = "serde_hash")]
    parent_hash: Hash,
    entries: Vec<LedgerEntry>,
}

#[derive(Deserialize)]
struct VoteFixture {
    last_closed: LedgerHeader,
    validations: Vec<FixtureValidation>,
}

#[derive(Deserialize)]
struct FixtureValidation {
    #[serde(flatten)]
    validation: Validation,
    #[serde(default = "trusted_default")]
    trusted: bool,
}

fn trusted_default() -> bool {
    true
}

fn fail(msg: impl std::fmt::Display) -> ! {
    eprintln!("error: {msg}");
    std::process::exit(2)
}

fn read_json<T: DeserializeOwned>(path: &Path) -> T {
    let bytes = fs::read(path).unwrap_or_else(|e| fail(format!("{}: {e}", path.display())));
    serde_json::from_slice(&bytes).unwrap_or_else(|e| fail(format!("{}: {e}", path.display())))
}

fn write_json<T: Serialize>(path: &Path, value: &T) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).ok();
    }
    let bytes = serde_json::to_vec_pretty(value).unwrap_or_else(|e| fail(e));
    let mut f = fs::File::create(path).unwrap_or_else(|e| fail(format!("{}: {e}", path.display())));
    f.write_all(&bytes).unwrap_or_else(|e| fail(e));
}

//==================== Commands ====================//

fn tally_cmd(current: u64, target: u64, votes: &[u64], no_votes: u32) {
    let mut tally = VoteTally::new(current, target);
    for vote in votes {
        tally.add_vote(*vote);
    }
    for _ in 0..no_votes {
        tally.no_vote();
    }
    println!("{}", tally.get_votes());
}

fn vote_cmd(config: &NodeConfig, clock: &dyn NetworkClock, fixture: &Path) {
    let fixture: VoteFixture = read_json(fixture);

    let mut set = ValidationSet::new();
    for entry in fixture.validations {
        set.add(entry.validation, entry.trusted);
    }

    let mut manager = DividendVote::new(config.voting, clock, &set);
    let day = clock.current_network_day();
    if day <= fixture.last_closed.dividend_time {
        fail(format!(
            "ledger {} is not a voting ledger (network day {day}, dividend day {})",
            fixture.last_closed.seq, fixture.last_closed.dividend_time
        ));
    }

    let mut position = ProposedSet::new();
    manager.do_voting(&fixture.last_closed, &mut position);

    let targets = manager.targets();
    println!("dividend_time          {}", targets.dividend_time);
    println!("total_coins            {}", targets.total_coins);
    println!("total_coins_secondary  {}", targets.total_coins_secondary);
    for (id, tx) in position.iter() {
        println!("proposed {}", hex::encode(id));
        println!(
            "{}",
            serde_json::to_string_pretty(tx).unwrap_or_else(|e| fail(e))
        );
    }
}

fn apply_dividend_cmd(
    config: &NodeConfig,
    clock: &dyn NetworkClock,
    path: &Path,
    out: Option<&Path>,
) {
    let file: LedgerFile = read_json(path);
    let mut ledger = LedgerState::from_entries(file.seq, file.parent_hash, file.entries);

    let header = ledger.header();
    let tx = ChangeTransaction::dividend(
        header.dividend_time,
        header.total_coins,
        header.total_coins_secondary,
    );

    let mut amendments = AmendmentRegistry::default();
    let mut status = NodeStatus::default();
    let mut transactor = ChangeTransactor::new(
        config.change.root_account,
        clock,
        &mut amendments,
        &mut status,
    );
    let applied = transactor
        .apply(&mut ledger, &tx, ApplyContext::closing())
        .unwrap_or_else(|e| fail(format!("{} ({})", e, e.code())));

    for payout in &applied.payouts {
        println!("{}  +{}", payout.account, payout.amount);
    }
    let header = ledger.header();
    println!("total_coins  {}", header.total_coins);
    println!("state_root   {}", hex::encode(ledger.state_root()));

    if let Some(out) = out {
        let file = LedgerFile {
            seq: ledger.seq,
            parent_hash: ledger.parent_hash,
            entries: ledger.entries().cloned().collect(),
        };
        write_json(out, &file);
        println!("ledger written → {}", out.display());
    }
}

//==================== main ====================//

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => NodeConfig::load(path).unwrap_or_else(|e| fail(e)),
        None => NodeConfig::default(),
    };
    let clock: Box<dyn NetworkClock> = match cli.day {
        Some(day) => Box::new(FixedClock(day)),
        None => Box::new(SystemClock),
    };

    match cli.command {
        Command::Tally {
            current,
            target,
            votes,
            no_votes,
        } => tally_cmd(current, target, &votes, no_votes),
        Command::Vote { fixture } => vote_cmd(&config, clock.as_ref(), &fixture),
        Command::ApplyDividend { ledger, out } => {
            apply_dividend_cmd(&config, clock.as_ref(), &ledger, out.as_deref())
        }
    }
}
