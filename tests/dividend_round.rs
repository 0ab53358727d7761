use dividend_ledger::{
    change::{AmendmentRegistry, ApplyContext, ChangeTransactor, NodeStatus},
    ledger::{dividend_index, AccountId, DividendRecord, EntryCache, LedgerState},
    tx::{ChangeTransaction, TxBody},
    vote::dividend::{
        DividendTargets, DividendVote, FixedClock, ProposedSet, Validation, ValidationSet,
    },
    ChangeError,
};

const TODAY: u32 = 102;

fn account(byte: u8) -> AccountId {
    AccountId([byte; 20])
}

fn root() -> AccountId {
    account(0xff)
}

/// Ledger 10 (parent) and ledger 11 (last closed, dividend day 100).
fn genesis() -> (LedgerState, LedgerState) {
    let mut parent = LedgerState::new();
    parent.seq = 10;
    for (byte, balance) in [(1u8, 10u64), (2, 10), (3, 20), (4, 30), (5, 1)] {
        parent.credit_account(&account(byte), balance * 1_000);
    }
    parent.credit_account(&root(), 50_000_000);
    parent.persist(
        dividend_index(),
        DividendRecord {
            dividend_time: 100,
            total_coins: 1_000_000,
            total_coins_secondary: 20_000,
        },
    );
    let last_closed = parent.successor();
    (parent, last_closed)
}

fn validations(parent_hash: [u8; 32]) -> ValidationSet {
    let mut set = ValidationSet::new();
    for (validator, day) in [(1u8, 101u32), (2, 101), (3, 102)] {
        let validation = Validation {
            dividend_time: Some(day),
            ..Validation::new(parent_hash, account(validator))
        };
        set.add(validation, true);
    }
    set
}

/// One full round on one validator: vote on ledger 11, apply the winning
/// transaction to ledger 12 and return the closed ledger.
fn run_round() -> (LedgerState, Vec<ChangeTransaction>) {
    let (parent, last_closed) = genesis();
    let header = last_closed.header();
    let set = validations(parent.header().hash);

    let clock = FixedClock(TODAY);
    let targets = DividendTargets {
        dividend_time: 101,
        total_coins: header.total_coins,
        total_coins_secondary: header.total_coins_secondary,
    };
    let mut manager = DividendVote::new(targets, clock, &set);
    let mut position = ProposedSet::new();
    manager.do_voting(&header, &mut position);
    assert_eq!(manager.targets().dividend_time, 101);

    let txs: Vec<ChangeTransaction> = position.iter().map(|(_, tx)| tx.clone()).collect();

    let mut next = last_closed.successor();
    let mut amendments = AmendmentRegistry::default();
    let mut status = NodeStatus::default();
    let mut transactor = ChangeTransactor::new(root(), &clock, &mut amendments, &mut status);
    for tx in &txs {
        transactor
            .apply(&mut next, tx, ApplyContext::closing())
            .expect("dividend applies");
    }
    (next, txs)
}

#[test]
fn round_proposes_single_dividend() {
    let (_, txs) = run_round();
    assert_eq!(txs.len(), 1);
    assert_eq!(
        txs[0].body,
        TxBody::Dividend {
            dividend_time: 101,
            total_coins: 1_000_000,
            total_coins_secondary: 20_000,
        }
    );
}

#[test]
fn round_distributes_by_rank() {
    let (ledger, _) = run_round();

    let record = ledger.dividend().unwrap();
    assert_eq!(record.dividend_time, TODAY);
    assert_eq!(record.total_coins, 1_003_000);
    assert_eq!(record.total_coins_secondary, 20_006);

    // Balances 1k, 10k, 10k, 20k, 30k, root 50M -> ranks 1, 2, 2, 3, 4, 5.
    // total_part = 17, dividend = 3_000.
    assert_eq!(ledger.balance(&account(5)), Some(1_000 + 3_000 / 17));
    assert_eq!(ledger.balance(&account(1)), Some(10_000 + 6_000 / 17));
    assert_eq!(ledger.balance(&account(2)), Some(10_000 + 6_000 / 17));
    assert_eq!(ledger.balance(&account(3)), Some(20_000 + 9_000 / 17));
    assert_eq!(ledger.balance(&account(4)), Some(30_000 + 12_000 / 17));
    assert_eq!(ledger.balance(&root()), Some(50_000_000));
}

#[test]
fn independent_validators_agree_byte_for_byte() {
    let (a, txs_a) = run_round();
    let (b, txs_b) = run_round();
    assert_eq!(txs_a[0].id(), txs_b[0].id());
    assert_eq!(a.state_root(), b.state_root());
    assert_eq!(a.header(), b.header());
}

#[test]
fn validation_round_trip_feeds_tally() {
    let (parent, last_closed) = genesis();
    let header = last_closed.header();
    let clock = FixedClock(TODAY);

    // Three validators advertise their targets for the parent ledger.
    let mut set = ValidationSet::new();
    for (validator, day) in [(1u8, 101u32), (2, 101), (3, 102)] {
        let peer = DividendVote::new(
            DividendTargets {
                dividend_time: day,
                total_coins: header.total_coins,
                total_coins_secondary: header.total_coins_secondary,
            },
            clock,
            ValidationSet::new(),
        );
        let mut validation = Validation::new(parent.header().hash, account(validator));
        peer.do_validation(&parent.header(), &mut validation);
        assert_eq!(validation.total_coins, None);
        set.add(validation, true);
    }

    let mut manager = DividendVote::new(
        DividendTargets {
            dividend_time: 102,
            total_coins: header.total_coins,
            total_coins_secondary: header.total_coins_secondary,
        },
        clock,
        &set,
    );
    manager.do_voting(&header, &mut ProposedSet::new());
    // 101 and 102 (ours plus one peer) both hold two votes; the smaller wins.
    assert_eq!(manager.targets().dividend_time, 101);
}

#[test]
fn replayed_amendment_is_rejected() {
    let (_, mut ledger) = genesis();
    let clock = FixedClock(TODAY);
    let mut amendments = AmendmentRegistry::new([[1u8; 32]]);
    let mut status = NodeStatus::default();
    let mut transactor = ChangeTransactor::new(root(), &clock, &mut amendments, &mut status);

    let tx = ChangeTransaction::amendment([1u8; 32]);
    transactor
        .apply(&mut ledger, &tx, ApplyContext::closing())
        .unwrap();
    let root_before = ledger.state_root();
    assert_eq!(
        transactor.apply(&mut ledger, &tx, ApplyContext::closing()),
        Err(ChangeError::AlreadyApplied)
    );
    assert_eq!(ledger.state_root(), root_before);
}
