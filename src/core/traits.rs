//! Core traits for ledger storage and the provider catalog
//!
//! The engine only talks to these seams, so the storage backend and the offer
//! source can be swapped without touching the transfer logic.

use primitive_types::U256;

use crate::types::{
    Account, ActivityEntry, DepositEvent, DepositToken, LedgerError, ProviderOffer,
    TransferPlan, TransferRecord, Wallet,
};

/// Direction and size of a single-account balance adjustment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalanceDelta {
    Credit(U256),
    Debit(U256),
}

/// Durable ledger storage
///
/// Every mutating method is one all-or-nothing unit. Implementations must make
/// the balance check and the write atomic with respect to every other mutation
/// touching the same accounts.
pub trait LedgerStore: Send + Sync {
    /// Read an account; `None` if the wallet has never been credited
    fn account(&self, wallet: &Wallet) -> Result<Option<Account>, LedgerError>;

    /// Adjust one balance, refusing debits that would go below zero
    ///
    /// Returns the balance after the adjustment.
    fn adjust_balance(&self, wallet: &Wallet, delta: BalanceDelta) -> Result<U256, LedgerError>;

    /// Credit a deposit unless its token was already applied
    ///
    /// Returns `true` if the credit was applied by this call.
    fn apply_deposit(&self, deposit: &DepositEvent) -> Result<bool, LedgerError>;

    /// Whether a deposit token has been applied
    fn is_deposit_applied(&self, token: &DepositToken) -> Result<bool, LedgerError>;

    /// Debit the renter, credit the provider and append the audit record
    ///
    /// Returns the record and the renter's balance after the debit.
    fn apply_transfer(&self, plan: &TransferPlan) -> Result<(TransferRecord, U256), LedgerError>;

    /// Set or clear the spending ban on an account, creating it if needed
    fn set_banned(&self, wallet: &Wallet, banned: bool) -> Result<(), LedgerError>;

    /// Snapshot of every account
    fn accounts(&self) -> Result<Vec<Account>, LedgerError>;

    fn account_count(&self) -> Result<u64, LedgerError>;

    /// Running total of the fees of all recorded transfers
    fn total_fees(&self) -> Result<U256, LedgerError>;

    /// Most recent transfers first
    fn recent_transfers(&self, limit: usize) -> Result<Vec<TransferRecord>, LedgerError>;

    /// Most recent activity entries first
    fn recent_activity(&self, limit: usize) -> Result<Vec<ActivityEntry>, LedgerError>;

    /// Last fully processed block height, if the cursor was ever initialized
    fn cursor(&self) -> Result<Option<u64>, LedgerError>;

    /// Initialize the cursor unless it already exists
    ///
    /// Returns the stored value, which is the existing one if another
    /// initialization won.
    fn init_cursor(&self, height: u64) -> Result<u64, LedgerError>;

    /// Durably move the cursor forward to `height`
    ///
    /// All previously committed credits are made durable before the cursor is
    /// written. Heights at or below the current cursor are ignored.
    fn advance_cursor(&self, height: u64) -> Result<(), LedgerError>;
}

/// Source of provider offers
pub trait Catalog: Send + Sync {
    /// Find an offer by node id, regardless of status
    fn lookup_offer(&self, node_id: &str) -> Option<ProviderOffer>;

    /// Every offer currently online
    fn list_online_offers(&self) -> Vec<ProviderOffer>;
}
