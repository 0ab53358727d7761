//! Transactor for validator-injected change transactions.
//!
//! Three pseudo-transaction kinds are handled: amendment activation, fee
//! schedule updates and dividends. They are only valid while closing a
//! ledger and never carry an account, signature, sequence or fee.

pub mod dividend;

use std::collections::BTreeSet;

use tracing::{info, trace, warn};

use crate::error::ChangeError;
use crate::ledger::{
    amendments_index, fee_index, AccountId, AccountRoots, Amendments, EntryCache, FeeSettings,
    Hash,
};
use crate::tx::{ChangeTransaction, TxBody};
use crate::vote::dividend::NetworkClock;

pub use dividend::Payout;

/// Amendments known to this node.
pub trait AmendmentTable {
    fn enable(&mut self, amendment: Hash);

    fn is_supported(&self, amendment: &Hash) -> bool;
}

/// Node health signals raised while applying transactions.
pub trait NodeOps {
    fn set_amendment_blocked(&mut self);
}

#[derive(Clone, Debug, Default)]
pub struct AmendmentRegistry {
    supported: BTreeSet<Hash>,
    enabled: BTreeSet<Hash>,
}

impl AmendmentRegistry {
    pub fn new(supported: impl IntoIterator<Item = Hash>) -> Self {
        Self {
            supported: supported.into_iter().collect(),
            enabled: BTreeSet::new(),
        }
    }

    pub fn is_enabled(&self, amendment: &Hash) -> bool {
        self.enabled.contains(amendment)
    }
}

impl AmendmentTable for AmendmentRegistry {
    fn enable(&mut self, amendment: Hash) {
        self.enabled.insert(amendment);
    }

    fn is_supported(&self, amendment: &Hash) -> bool {
        self.supported.contains(amendment)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NodeStatus {
    pub amendment_blocked: bool,
}

impl NodeOps for NodeStatus {
    fn set_amendment_blocked(&mut self) {
        self.amendment_blocked = true;
    }
}

/// How the ledger being built will be used.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ApplyContext {
    /// Speculative apply against the open ledger.
    pub open_ledger: bool,
}

impl ApplyContext {
    pub fn closing() -> Self {
        Self { open_ledger: false }
    }

    pub fn open() -> Self {
        Self { open_ledger: true }
    }
}

/// Outcome of a successful apply.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Applied {
    /// Credits made by a dividend, in ascending balance order.
    pub payouts: Vec<Payout>,
}

pub struct ChangeTransactor<'a> {
    root_account: AccountId,
    clock: &'a dyn NetworkClock,
    amendments: &'a mut dyn AmendmentTable,
    ops: &'a mut dyn NodeOps,
}

impl<'a> ChangeTransactor<'a> {
    pub fn new(
        root_account: AccountId,
        clock: &'a dyn NetworkClock,
        amendments: &'a mut dyn AmendmentTable,
        ops: &'a mut dyn NodeOps,
    ) -> Self {
        Self {
            root_account,
            clock,
            amendments,
            ops,
        }
    }

    /// Check and apply `tx` to `ledger`.
    ///
    /// A rejected transaction leaves the ledger untouched.
    pub fn apply<L: EntryCache + AccountRoots>(
        &mut self,
        ledger: &mut L,
        tx: &ChangeTransaction,
        ctx: ApplyContext,
    ) -> Result<Applied, ChangeError> {
        check_sig(tx)?;
        check_seq(tx)?;
        pay_fee(tx)?;
        pre_check(tx, ctx)?;

        match &tx.body {
            TxBody::Amendment { amendment } => {
                self.apply_amendment(ledger, *amendment)?;
                Ok(Applied::default())
            }
            TxBody::Fee {
                base_fee,
                reference_fee_units,
                reserve_base,
                reserve_increment,
            } => {
                apply_fee(
                    ledger,
                    FeeSettings {
                        base_fee: *base_fee,
                        reference_fee_units: *reference_fee_units,
                        reserve_base: *reserve_base,
                        reserve_increment: *reserve_increment,
                    },
                );
                Ok(Applied::default())
            }
            TxBody::Dividend {
                total_coins,
                total_coins_secondary,
                ..
            } => {
                let payouts = dividend::apply(
                    ledger,
                    *total_coins,
                    *total_coins_secondary,
                    self.clock.current_network_day(),
                    &self.root_account,
                );
                Ok(Applied { payouts })
            }
            TxBody::Other { tx_type } => Err(ChangeError::Unknown(*tx_type)),
        }
    }

    fn apply_amendment<L: EntryCache>(
        &mut self,
        ledger: &mut L,
        amendment: Hash,
    ) -> Result<(), ChangeError> {
        let key = amendments_index();
        let mut list: Amendments = ledger.fetch_or_create(key);

        if list.amendments.contains(&amendment) {
            return Err(ChangeError::AlreadyApplied);
        }

        list.amendments.push(amendment);
        ledger.persist(key, list);
        info!(amendment = %hex::encode(amendment), "amendment enabled");

        self.amendments.enable(amendment);
        if !self.amendments.is_supported(&amendment) {
            warn!(amendment = %hex::encode(amendment), "unsupported amendment enabled, node is blocked");
            self.ops.set_amendment_blocked();
        }
        Ok(())
    }
}

fn check_sig(tx: &ChangeTransaction) -> Result<(), ChangeError> {
    if !tx.account.is_zero() {
        warn!("bad source account");
        return Err(ChangeError::BadSourceAccount);
    }

    if !tx.signing_pub_key.is_empty() || !tx.signature.is_empty() {
        warn!("bad signature");
        return Err(ChangeError::BadSignature);
    }

    Ok(())
}

fn check_seq(tx: &ChangeTransaction) -> Result<(), ChangeError> {
    if tx.sequence != 0 || tx.previous_txn_id.is_some() {
        warn!("bad sequence");
        return Err(ChangeError::BadSequence);
    }
    Ok(())
}

fn pay_fee(tx: &ChangeTransaction) -> Result<(), ChangeError> {
    if tx.fee != 0 {
        warn!(fee = tx.fee, "non-zero fee");
        return Err(ChangeError::BadFee);
    }
    Ok(())
}

fn pre_check(tx: &ChangeTransaction, ctx: ApplyContext) -> Result<(), ChangeError> {
    if !tx.source_account.is_zero() {
        warn!("bad source id");
        return Err(ChangeError::BadSourceAccount);
    }

    if ctx.open_ledger {
        warn!("change transaction against open ledger");
        return Err(ChangeError::InvalidContext);
    }

    Ok(())
}

fn apply_fee<L: EntryCache>(ledger: &mut L, fees: FeeSettings) {
    let key = fee_index();
    let previous: FeeSettings = ledger.fetch_or_create(key);
    trace!(?previous, "previous fee object");

    ledger.persist(key, fees.clone());
    trace!(current = ?fees, "new fee object");
    warn!("fees have been changed");
}
