//! Error types for the agent ledger
//!
//! This module defines the errors that can occur while mutating or reading the
//! ledger. Errors carry enough context to be reported directly to the caller of
//! an engine operation.
//!
//! # Error Categories
//!
//! - **Domain rejections**: insufficient balance, unknown provider, banned account
//! - **Input validation**: empty wallets or tokens, zero amounts, bad fee rates
//! - **Arithmetic**: a credit that would overflow 256 bits
//! - **Storage**: failures of the underlying database or value encoding

use primitive_types::U256;
use sled::transaction::TransactionError;
use thiserror::Error;

/// Main error type for ledger operations
///
/// Every variant except `Storage` and `Serialization` is a rejection that leaves
/// the ledger untouched; the caller may retry with different parameters.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LedgerError {
    /// The wallet does not hold enough credit for the requested debit
    ///
    /// Raised by the conditional decrement itself, so a balance can never go
    /// below zero, not even transiently.
    #[error("Insufficient balance for wallet {wallet}: available {available}, requested {requested}")]
    InsufficientBalance {
        /// Normalized wallet address
        wallet: String,
        /// Balance at the time of the attempt
        available: U256,
        /// Amount that would have been debited
        requested: U256,
    },

    /// The provider id does not resolve to an online offer
    #[error("Unknown or offline provider '{provider_id}'")]
    UnknownProvider {
        /// Node id supplied by the caller
        provider_id: String,
    },

    /// The renter account is banned from spending
    #[error("Account {wallet} is banned")]
    AccountBanned {
        /// Normalized wallet address
        wallet: String,
    },

    /// A wallet address was empty after normalization
    #[error("Invalid wallet address '{wallet}'")]
    InvalidWallet {
        /// The address as supplied
        wallet: String,
    },

    /// An idempotency token was empty after normalization
    #[error("Invalid idempotency token '{token}'")]
    InvalidToken {
        /// The token as supplied
        token: String,
    },

    /// Credits must be strictly positive
    #[error("Invalid amount {amount} for {operation}")]
    InvalidAmount {
        /// The rejected amount
        amount: U256,
        /// Operation that received it
        operation: String,
    },

    /// Fee rate must satisfy `0 <= numerator <= denominator` and `denominator > 0`
    #[error("Invalid fee rate {numerator}/{denominator}")]
    InvalidFeeRate {
        /// Numerator as supplied
        numerator: u64,
        /// Denominator as supplied
        denominator: u64,
    },

    /// Arithmetic overflow would occur
    #[error("Arithmetic overflow in {operation} for wallet {wallet}")]
    ArithmeticOverflow {
        /// Operation that would overflow
        operation: String,
        /// Wallet involved
        wallet: String,
    },

    /// The underlying database failed
    #[error("Storage error: {message}")]
    Storage {
        /// Description of the storage failure
        message: String,
    },

    /// A stored value could not be encoded or decoded
    #[error("Serialization error: {message}")]
    Serialization {
        /// Description of the encoding failure
        message: String,
    },
}

impl From<sled::Error> for LedgerError {
    fn from(error: sled::Error) -> Self {
        LedgerError::Storage {
            message: error.to_string(),
        }
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(error: serde_json::Error) -> Self {
        LedgerError::Serialization {
            message: error.to_string(),
        }
    }
}

// Aborted transactions carry the domain error; storage failures are flattened.
impl From<TransactionError<LedgerError>> for LedgerError {
    fn from(error: TransactionError<LedgerError>) -> Self {
        match error {
            TransactionError::Abort(inner) => inner,
            TransactionError::Storage(inner) => inner.into(),
        }
    }
}

// Helper functions for creating common errors
impl LedgerError {
    /// Create an InsufficientBalance error
    pub fn insufficient_balance(wallet: &str, available: U256, requested: U256) -> Self {
        LedgerError::InsufficientBalance {
            wallet: wallet.to_string(),
            available,
            requested,
        }
    }

    /// Create an UnknownProvider error
    pub fn unknown_provider(provider_id: &str) -> Self {
        LedgerError::UnknownProvider {
            provider_id: provider_id.to_string(),
        }
    }

    /// Create an AccountBanned error
    pub fn account_banned(wallet: &str) -> Self {
        LedgerError::AccountBanned {
            wallet: wallet.to_string(),
        }
    }

    /// Create an InvalidWallet error
    pub fn invalid_wallet(wallet: &str) -> Self {
        LedgerError::InvalidWallet {
            wallet: wallet.to_string(),
        }
    }

    /// Create an InvalidToken error
    pub fn invalid_token(token: &str) -> Self {
        LedgerError::InvalidToken {
            token: token.to_string(),
        }
    }

    /// Create an InvalidAmount error
    pub fn invalid_amount(amount: U256, operation: &str) -> Self {
        LedgerError::InvalidAmount {
            amount,
            operation: operation.to_string(),
        }
    }

    /// Create an ArithmeticOverflow error
    pub fn arithmetic_overflow(operation: &str, wallet: &str) -> Self {
        LedgerError::ArithmeticOverflow {
            operation: operation.to_string(),
            wallet: wallet.to_string(),
        }
    }

    /// Create a Storage error
    pub fn storage(message: impl Into<String>) -> Self {
        LedgerError::Storage {
            message: message.into(),
        }
    }

    /// Whether this error is a business rejection rather than an infrastructure failure
    pub fn is_rejection(&self) -> bool {
        !matches!(
            self,
            LedgerError::Storage { .. } | LedgerError::Serialization { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_balance_display() {
        let error = LedgerError::insufficient_balance("0xabc", U256::from(5), U256::from(10));
        assert_eq!(
            error.to_string(),
            "Insufficient balance for wallet 0xabc: available 5, requested 10"
        );
    }

    #[test]
    fn test_unknown_provider_display() {
        let error = LedgerError::unknown_provider("NODE_ZULU");
        assert_eq!(error.to_string(), "Unknown or offline provider 'NODE_ZULU'");
    }

    #[test]
    fn test_transaction_abort_unwraps_domain_error() {
        let error: LedgerError =
            TransactionError::Abort(LedgerError::account_banned("0xabc")).into();
        assert_eq!(error, LedgerError::account_banned("0xabc"));
    }

    #[test]
    fn test_is_rejection() {
        assert!(LedgerError::unknown_provider("x").is_rejection());
        assert!(LedgerError::invalid_amount(U256::zero(), "credit").is_rejection());
        assert!(!LedgerError::storage("disk full").is_rejection());
    }
}
