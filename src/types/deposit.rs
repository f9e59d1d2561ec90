//! Deposit types: chain value transfers converted into ledger credits

use primitive_types::U256;
use serde::{Deserialize, Serialize};

use super::account::Wallet;
use super::error::LedgerError;

/// Idempotency key of a deposit, normally the chain transaction hash
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DepositToken(String);

impl DepositToken {
    /// Normalize a token the same way as wallets (hashes are hex, case-insensitive)
    pub fn parse(token: &str) -> Result<Self, LedgerError> {
        let normalized = token.trim().to_lowercase();
        if normalized.is_empty() {
            return Err(LedgerError::invalid_token(token));
        }
        Ok(DepositToken(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A qualifying value transfer to the receiving address
///
/// Applied at most once, keyed by `token`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepositEvent {
    pub token: DepositToken,
    pub sender: Wallet,
    pub amount: U256,
    /// Height of the block that carried it; `None` for manual credits
    pub block_height: Option<u64>,
}

/// Result of a credit request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CreditOutcome {
    /// `false` when the token had already been applied
    pub applied: bool,
}
