use thiserror::Error;

/// Rejection codes produced by the change transactor.
///
/// Every variant is terminal for the transaction: the ledger is left
/// untouched and the code is recorded against the transaction.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ChangeError {
    /// Source account field or declared source id is not the zero account.
    #[error("bad source account")]
    BadSourceAccount,

    /// A signing key or signature is attached.
    #[error("bad signature")]
    BadSignature,

    /// Non-zero sequence or a previous transaction id is present.
    #[error("bad sequence")]
    BadSequence,

    /// Non-zero fee attached.
    #[error("non-zero fee")]
    BadFee,

    /// Applied against an open (speculative) ledger.
    #[error("change transaction against open ledger")]
    InvalidContext,

    /// Transaction type is not handled by the change transactor.
    #[error("unknown transaction type {0}")]
    Unknown(u16),

    /// The amendment is already enabled in this ledger.
    #[error("amendment already applied")]
    AlreadyApplied,
}

impl ChangeError {
    /// Stable result token recorded in transaction metadata.
    pub fn code(&self) -> &'static str {
        match self {
            ChangeError::BadSourceAccount => "temBAD_SRC_ACCOUNT",
            ChangeError::BadSignature => "temBAD_SIGNATURE",
            ChangeError::BadSequence => "temBAD_SEQUENCE",
            ChangeError::BadFee => "temBAD_FEE",
            ChangeError::InvalidContext => "temINVALID",
            ChangeError::Unknown(_) => "temUNKNOWN",
            ChangeError::AlreadyApplied => "tefALREADY",
        }
    }

    /// Malformed transactions can never succeed in any ledger.
    pub fn is_malformed(&self) -> bool {
        !matches!(self, ChangeError::AlreadyApplied)
    }
}

/// Failure while loading node configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(ChangeError::BadFee.code(), "temBAD_FEE");
        assert_eq!(ChangeError::Unknown(0).code(), "temUNKNOWN");
        assert_eq!(ChangeError::AlreadyApplied.code(), "tefALREADY");
    }

    #[test]
    fn already_applied_is_not_malformed() {
        assert!(!ChangeError::AlreadyApplied.is_malformed());
        assert!(ChangeError::InvalidContext.is_malformed());
    }
}
