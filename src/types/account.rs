//! Account-related types for the agent ledger
//!
//! This module defines the `Wallet` identifier and the `Account` record that
//! holds a wallet's spendable credit.

use primitive_types::U256;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::LedgerError;

/// Normalized external-chain address identifying an account
///
/// Addresses are trimmed and lower-cased so that checksummed and plain hex
/// spellings of the same address map to one account.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Wallet(String);

impl Wallet {
    /// Normalize and validate a wallet address
    ///
    /// # Errors
    ///
    /// Returns `InvalidWallet` if the address is empty after trimming.
    pub fn parse(address: &str) -> Result<Self, LedgerError> {
        let normalized = address.trim().to_lowercase();
        if normalized.is_empty() {
            return Err(LedgerError::invalid_wallet(address));
        }
        Ok(Wallet(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Wallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Wallet account state
///
/// Created implicitly by the first credit and never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// The normalized wallet address (primary key)
    pub wallet: Wallet,

    /// Spendable credit in the chain's smallest unit
    ///
    /// Unsigned, so the non-negative invariant is carried by the type; every
    /// debit goes through a checked subtraction that refuses to underflow.
    pub balance: U256,

    /// Whether the account is barred from spending
    ///
    /// Deposits are still credited to banned accounts.
    pub banned: bool,
}

impl Account {
    /// Create a new account with zero balance and no ban
    pub fn new(wallet: Wallet) -> Self {
        Account {
            wallet,
            balance: U256::zero(),
            banned: false,
        }
    }
}
