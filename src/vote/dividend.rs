//! Dividend parameter voting.
//!
//! Each validator carries three targets: the day of the next dividend and
//! the total supplies of the primary and secondary coins. They are
//! advertised in validations while they differ from the last closed ledger
//! and resolved with a [`VoteTally`] on every boundary ledger. When the
//! resolved day is behind the network clock a dividend pseudo-transaction
//! is added to our initial position.

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::VoteTally;
use crate::change::dividend::issuance;
use crate::ledger::{serde_hash, AccountId, Hash, LedgerHeader, SECONDS_PER_DAY};
use crate::tx::{ChangeTransaction, TxId};

/// Network time starts at 2000-01-01T00:00:00Z.
pub const NETWORK_EPOCH_OFFSET: u64 = 946_684_800;

pub trait NetworkClock {
    fn current_network_day(&self) -> u32;
}

impl<T: NetworkClock + ?Sized> NetworkClock for &T {
    fn current_network_day(&self) -> u32 {
        (**self).current_network_day()
    }
}

/// Wall clock converted to network days.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl NetworkClock for SystemClock {
    fn current_network_day(&self) -> u32 {
        let unix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        (unix.saturating_sub(NETWORK_EPOCH_OFFSET) / SECONDS_PER_DAY) as u32
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FixedClock(pub u32);

impl NetworkClock for FixedClock {
    fn current_network_day(&self) -> u32 {
        self.0
    }
}

/// The parameter fields a validator may attach to its validation.
///
/// A missing field means "no preference".
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validation {
    #[serde(with = "serde_hash")]
    pub ledger_hash: Hash,
    pub validator: AccountId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dividend_time: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_coins: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_coins_secondary: Option<u64>,
}

impl Validation {
    pub fn new(ledger_hash: Hash, validator: AccountId) -> Self {
        Self {
            ledger_hash,
            validator,
            ..Self::default()
        }
    }
}

pub trait ValidationSource {
    /// Trusted validations received for `ledger_hash`.
    fn trusted_validations(&self, ledger_hash: &Hash) -> Vec<Validation>;
}

impl<T: ValidationSource + ?Sized> ValidationSource for &T {
    fn trusted_validations(&self, ledger_hash: &Hash) -> Vec<Validation> {
        (**self).trusted_validations(ledger_hash)
    }
}

/// Validations received from peers, grouped by ledger.
#[derive(Clone, Debug, Default)]
pub struct ValidationSet {
    by_ledger: BTreeMap<Hash, Vec<(Validation, bool)>>,
}

impl ValidationSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, validation: Validation, trusted: bool) {
        self.by_ledger
            .entry(validation.ledger_hash)
            .or_default()
            .push((validation, trusted));
    }
}

impl ValidationSource for ValidationSet {
    fn trusted_validations(&self, ledger_hash: &Hash) -> Vec<Validation> {
        self.by_ledger
            .get(ledger_hash)
            .map(|set| {
                set.iter()
                    .filter(|(_, trusted)| *trusted)
                    .map(|(validation, _)| validation.clone())
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// The transaction set we propose for the next round.
pub trait TxSet {
    /// Returns `false` if an identical transaction is already present.
    fn add_transaction(&mut self, id: TxId, tx: ChangeTransaction) -> bool;
}

#[derive(Clone, Debug, Default)]
pub struct ProposedSet {
    txs: BTreeMap<TxId, ChangeTransaction>,
}

impl ProposedSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.txs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.txs.is_empty()
    }

    pub fn get(&self, id: &TxId) -> Option<&ChangeTransaction> {
        self.txs.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TxId, &ChangeTransaction)> {
        self.txs.iter()
    }
}

impl TxSet for ProposedSet {
    fn add_transaction(&mut self, id: TxId, tx: ChangeTransaction) -> bool {
        if self.txs.contains_key(&id) {
            return false;
        }
        self.txs.insert(id, tx);
        true
    }
}

/// Operator-configured parameter targets.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DividendTargets {
    pub dividend_time: u32,
    pub total_coins: u64,
    pub total_coins_secondary: u64,
}

/// Per-validator dividend voting manager.
pub struct DividendVote<C, V> {
    targets: DividendTargets,
    clock: C,
    validations: V,
}

impl<C: NetworkClock, V: ValidationSource> DividendVote<C, V> {
    pub fn new(targets: DividendTargets, clock: C, validations: V) -> Self {
        Self {
            targets,
            clock,
            validations,
        }
    }

    pub fn targets(&self) -> DividendTargets {
        self.targets
    }

    /// Attach our preferences to an outgoing validation.
    ///
    /// Only values that differ from the last closed ledger are written.
    pub fn do_validation(&self, last_closed: &LedgerHeader, validation: &mut Validation) {
        if last_closed.dividend_time != self.targets.dividend_time {
            info!(
                dividend_time = self.targets.dividend_time,
                "voting for dividend time"
            );
            validation.dividend_time = Some(self.targets.dividend_time);
        }

        if last_closed.total_coins != self.targets.total_coins {
            info!(total_coins = self.targets.total_coins, "voting for total coins");
            validation.total_coins = Some(self.targets.total_coins);
        }

        if last_closed.total_coins_secondary != self.targets.total_coins_secondary {
            info!(
                total_coins_secondary = self.targets.total_coins_secondary,
                "voting for total secondary coins"
            );
            validation.total_coins_secondary = Some(self.targets.total_coins_secondary);
        }
    }

    /// Tally the validations of the ledger before `last_closed` and, if a
    /// dividend is due, add the dividend transaction to `position`.
    ///
    /// # Panics
    ///
    /// If `last_closed` is not a voting boundary, i.e. its dividend day is
    /// not behind the network clock.
    pub fn do_voting(&mut self, last_closed: &LedgerHeader, position: &mut dyn TxSet) {
        let now = self.clock.current_network_day();
        assert!(
            now > last_closed.dividend_time,
            "dividend voting on non-boundary ledger {} (network day {}, dividend day {})",
            last_closed.seq,
            now,
            last_closed.dividend_time
        );

        let mut dividend_time =
            VoteTally::new(last_closed.dividend_time, self.targets.dividend_time);
        let mut total_coins = VoteTally::new(last_closed.total_coins, self.targets.total_coins);
        let mut total_coins_secondary = VoteTally::new(
            last_closed.total_coins_secondary,
            self.targets.total_coins_secondary,
        );

        let validations = self.validations.trusted_validations(&last_closed.parent_hash);
        debug!(
            ledger = last_closed.seq,
            count = validations.len(),
            "tallying trusted validations"
        );
        for validation in &validations {
            match validation.dividend_time {
                Some(vote) => dividend_time.add_vote(vote),
                None => dividend_time.no_vote(),
            }
            match validation.total_coins {
                Some(vote) => total_coins.add_vote(vote),
                None => total_coins.no_vote(),
            }
            match validation.total_coins_secondary {
                Some(vote) => total_coins_secondary.add_vote(vote),
                None => total_coins_secondary.no_vote(),
            }
        }

        self.targets = DividendTargets {
            dividend_time: dividend_time.get_votes(),
            total_coins: total_coins.get_votes(),
            total_coins_secondary: total_coins_secondary.get_votes(),
        };

        if now <= self.targets.dividend_time {
            return;
        }

        let (amount, _) = issuance(self.targets.total_coins, self.targets.total_coins_secondary);
        warn!(day = now, amount, "voting for a dividend");

        let tx = ChangeTransaction::dividend(
            self.targets.dividend_time,
            self.targets.total_coins,
            self.targets.total_coins_secondary,
        );
        let id = tx.id();
        warn!(tx = %hex::encode(id), "dividend vote");

        if !position.add_transaction(id, tx) {
            warn!("ledger already had dividend");
        }
    }
}
