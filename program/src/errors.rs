use thiserror::Error;

use crate::state::{Category, RequestId, TokenId};

/// Result alias used throughout the mint workflow.
pub type MintResult<T> = Result<T, MintError>;

/// Error codes for the mint workflow.
///
/// Every variant is independently matchable so callers can tell input errors,
/// protocol-integrity errors and configuration errors apart.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MintError {
    /// The payment sent with a mint request is below the mint fee.
    #[error("insufficient payment: need {required}, got {provided}")]
    InsufficientPayment { required: u128, provided: u128 },
    /// The oracle subscription cannot cover the per-request oracle fee.
    #[error("oracle fee rejected: need {required}, subscription holds {balance}")]
    FeeRejected { required: u128, balance: u128 },
    /// A request id was registered while an entry for it is still pending.
    #[error("duplicate request: {0}")]
    DuplicateRequest(RequestId),
    /// No pending request exists for the id (never issued, already fulfilled or purged).
    #[error("nonexistent request: {0}")]
    UnknownRequest(RequestId),
    /// The random value is not covered by any rarity bucket.
    #[error("random value {value} is out of range for table size {table_size}")]
    RangeExceeded { value: u64, table_size: u64 },
    /// The rarity table failed validation at construction time.
    #[error("invalid rarity table: {0}")]
    InvalidRarityTable(String),
    /// The ledger has no metadata URI configured for the category.
    #[error("no token uri configured for category {0}")]
    MissingTokenUri(Category),
    /// The token id has not been minted.
    #[error("unknown token: {0}")]
    UnknownToken(TokenId),
    /// Caller is not the collection owner.
    #[error("caller is not the collection owner")]
    NotOwner,
}

/// Coarse classification of a [`MintError`], used for logging and HTTP mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Bad caller input; nothing was mutated and the call may be retried.
    Input,
    /// Replay, foreign request or duplicate id. Never retried automatically.
    Integrity,
    /// Misconfigured rarity table or ledger.
    Configuration,
    /// Lookup of something that does not exist, or a permission failure.
    Access,
}

impl MintError {
    pub fn class(&self) -> ErrorClass {
        match self {
            MintError::InsufficientPayment { .. } | MintError::FeeRejected { .. } => {
                ErrorClass::Input
            }
            MintError::DuplicateRequest(_) | MintError::UnknownRequest(_) => ErrorClass::Integrity,
            MintError::RangeExceeded { .. }
            | MintError::InvalidRarityTable(_)
            | MintError::MissingTokenUri(_) => ErrorClass::Configuration,
            MintError::UnknownToken(_) | MintError::NotOwner => ErrorClass::Access,
        }
    }

    /// Only caller input errors are safe to retry with corrected input.
    pub fn is_retryable(&self) -> bool {
        self.class() == ErrorClass::Input
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integrity_errors_are_not_retryable() {
        assert!(!MintError::UnknownRequest(RequestId(1)).is_retryable());
        assert!(!MintError::DuplicateRequest(RequestId(1)).is_retryable());
        assert_eq!(
            MintError::UnknownRequest(RequestId(7)).class(),
            ErrorClass::Integrity
        );
    }

    #[test]
    fn underpayment_is_retryable() {
        let err = MintError::InsufficientPayment {
            required: 10,
            provided: 9,
        };
        assert!(err.is_retryable());
        assert_eq!(err.to_string(), "insufficient payment: need 10, got 9");
    }

    #[test]
    fn range_exceeded_is_configuration() {
        let err = MintError::RangeExceeded {
            value: 50,
            table_size: 100,
        };
        assert_eq!(err.class(), ErrorClass::Configuration);
    }
}
