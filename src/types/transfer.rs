//! Transfer types: fee-splitting spends from a renter to a provider

use chrono::{DateTime, Utc};
use primitive_types::U256;
use serde::{Deserialize, Serialize};

use super::account::Wallet;

/// Fully priced transfer, ready to be applied atomically by the store
///
/// Built by the engine from the provider offer and the fee rate; the store
/// only checks balances and writes.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferPlan {
    pub renter: Wallet,
    pub provider_wallet: Wallet,
    pub provider_id: String,
    /// Amount debited from the renter (the offer's unit price)
    pub gross: U256,
    /// Platform cut, recorded but never credited to an account
    pub fee: U256,
    /// Amount credited to the provider (`gross - fee`)
    pub provider_net: U256,
}

/// Immutable audit row for one completed spend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferRecord {
    /// Monotonic id, starting at 1
    pub id: u64,
    pub from_wallet: Wallet,
    pub to_wallet: Wallet,
    pub provider_id: String,
    pub fee_amount: U256,
    pub gross_amount: U256,
    pub timestamp: DateTime<Utc>,
}

/// Result returned to the caller of a successful spend
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpendReceipt {
    pub transfer_id: u64,
    pub provider_id: String,
    pub provider_wallet: Wallet,
    pub fee: U256,
    pub gross: U256,
    pub provider_net: U256,
    /// Renter balance right after the debit
    pub renter_balance: U256,
}
