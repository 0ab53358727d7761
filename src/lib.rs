//! Validator dividend voting and ledger change application.
//!
//! * [`vote`] — the generic [`vote::VoteTally`] and the dividend parameter
//!   voting manager that annotates validations and proposes dividend
//!   pseudo-transactions.
//! * [`change`] — the transactor that applies amendment, fee and dividend
//!   pseudo-transactions, including the rank-proportional dividend payout.
//! * [`ledger`] — entry types, collaborator traits and an in-memory ledger.
//! * [`tx`] — the change transaction envelope and its canonical id.
//!
//! Every computation is integer-only and ordered deterministically so that
//! all validators derive byte-identical ledgers.

pub mod change;
pub mod config;
pub mod ledger;
pub mod tx;
pub mod vote;

mod error;

pub use error::{ChangeError, ConfigError};
