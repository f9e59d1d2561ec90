//! Transfer engine
//!
//! This module provides the `TransferEngine` that executes every balance-changing
//! operation of the ledger by coordinating the `LedgerStore` and the `Catalog`.
//!
//! The engine enforces business rules such as:
//! - Deposits are credited at most once per idempotency token
//! - A spend is priced from the provider's current online offer
//! - The platform fee is a fixed rational share computed on integers
//! - Renters cannot spend more than they hold, even under concurrency
//!
//! # Thread Safety
//!
//! `TransferEngine` is cheap to clone (all state lives behind `Arc`) and every
//! method takes `&self`, so request handlers and the chain watcher share one
//! engine across threads.

use primitive_types::U256;
use std::sync::Arc;
use tracing::{debug, info};

use crate::core::fee::FeeRate;
use crate::core::traits::{Catalog, LedgerStore};
use crate::types::{
    Account, ActivityEntry, CreditOutcome, DepositEvent, DepositToken, LedgerError, Overview,
    ProviderOffer, SpendReceipt, TransferPlan, TransferRecord, Wallet,
};

/// Ledger operations shared by request handlers and the chain watcher
#[derive(Clone)]
pub struct TransferEngine {
    store: Arc<dyn LedgerStore>,
    catalog: Arc<dyn Catalog>,
    fee_rate: FeeRate,
}

impl TransferEngine {
    /// Create a new engine with the default 1% fee
    ///
    /// # Arguments
    ///
    /// * `store` - Shared ledger storage
    /// * `catalog` - Shared provider catalog
    pub fn new(store: Arc<dyn LedgerStore>, catalog: Arc<dyn Catalog>) -> Self {
        Self::with_fee_rate(store, catalog, FeeRate::default())
    }

    pub fn with_fee_rate(
        store: Arc<dyn LedgerStore>,
        catalog: Arc<dyn Catalog>,
        fee_rate: FeeRate,
    ) -> Self {
        Self {
            store,
            catalog,
            fee_rate,
        }
    }

    /// Credit a deposit exactly once
    ///
    /// A token that was already applied is a successful no-op reported with
    /// `applied = false`.
    ///
    /// # Errors
    ///
    /// * `InvalidWallet` / `InvalidToken` - blank wallet or token
    /// * `InvalidAmount` - zero amount
    /// * `ArithmeticOverflow` - the balance would exceed 256 bits
    pub fn credit(
        &self,
        wallet: &str,
        amount: U256,
        token: &str,
    ) -> Result<CreditOutcome, LedgerError> {
        self.credit_deposit(DepositEvent {
            token: DepositToken::parse(token)?,
            sender: Wallet::parse(wallet)?,
            amount,
            block_height: None,
        })
    }

    /// Credit a deposit observed on chain
    pub fn credit_deposit(&self, deposit: DepositEvent) -> Result<CreditOutcome, LedgerError> {
        if deposit.amount.is_zero() {
            return Err(LedgerError::invalid_amount(deposit.amount, "credit"));
        }

        let applied = self.store.apply_deposit(&deposit)?;
        if applied {
            info!(
                wallet = %deposit.sender,
                amount = %deposit.amount,
                token = deposit.token.as_str(),
                block = ?deposit.block_height,
                "deposit credited"
            );
        } else {
            debug!(token = deposit.token.as_str(), "deposit already applied");
        }
        Ok(CreditOutcome { applied })
    }

    /// Rent a provider's offer, paying its unit price from the renter's balance
    ///
    /// The renter is debited the full unit price, the provider's payout wallet is
    /// credited the price minus the fee, and one `TransferRecord` is appended, all
    /// in a single atomic unit. The fee itself is only recorded.
    ///
    /// # Errors
    ///
    /// * `UnknownProvider` - no offer with that id, or the offer is offline
    /// * `InsufficientBalance` - the renter holds less than the unit price
    /// * `AccountBanned` - the renter is banned
    ///
    /// None of these leave any mutation behind.
    pub fn spend(&self, renter: &str, provider_id: &str) -> Result<SpendReceipt, LedgerError> {
        let renter = Wallet::parse(renter)?;
        let offer = self
            .catalog
            .lookup_offer(provider_id)
            .filter(ProviderOffer::is_online)
            .ok_or_else(|| LedgerError::unknown_provider(provider_id))?;
        let provider_wallet = Wallet::parse(&offer.payout_wallet)?;
        let split = self.fee_rate.split(offer.unit_price)?;

        let plan = TransferPlan {
            renter,
            provider_wallet,
            provider_id: offer.node_id,
            gross: offer.unit_price,
            fee: split.fee,
            provider_net: split.provider_net,
        };
        let (record, renter_balance) = self.store.apply_transfer(&plan)?;

        info!(
            transfer_id = record.id,
            renter = %plan.renter,
            provider = %plan.provider_id,
            gross = %plan.gross,
            fee = %plan.fee,
            "transfer committed"
        );

        Ok(SpendReceipt {
            transfer_id: record.id,
            provider_id: plan.provider_id,
            provider_wallet: plan.provider_wallet,
            fee: plan.fee,
            gross: plan.gross,
            provider_net: plan.provider_net,
            renter_balance,
        })
    }

    /// Current balance; unknown or blank wallets read as zero
    pub fn balance(&self, wallet: &str) -> Result<U256, LedgerError> {
        let wallet = match Wallet::parse(wallet) {
            Ok(wallet) => wallet,
            Err(_) => return Ok(U256::zero()),
        };
        Ok(self
            .store
            .account(&wallet)?
            .map(|account| account.balance)
            .unwrap_or_default())
    }

    pub fn overview(&self) -> Result<Overview, LedgerError> {
        Ok(Overview {
            account_count: self.store.account_count()?,
            active_provider_count: self.catalog.list_online_offers().len() as u64,
            total_fees_collected: self.store.total_fees()?,
        })
    }

    /// Latest transfers, most recent first
    pub fn recent_transfers(&self, limit: usize) -> Result<Vec<TransferRecord>, LedgerError> {
        self.store.recent_transfers(limit)
    }

    pub fn recent_activity(&self, limit: usize) -> Result<Vec<ActivityEntry>, LedgerError> {
        self.store.recent_activity(limit)
    }

    /// Every account, sorted by wallet
    pub fn accounts(&self) -> Result<Vec<Account>, LedgerError> {
        let mut accounts = self.store.accounts()?;
        accounts.sort_by(|a, b| a.wallet.cmp(&b.wallet));
        Ok(accounts)
    }

    pub fn set_banned(&self, wallet: &str, banned: bool) -> Result<(), LedgerError> {
        let wallet = Wallet::parse(wallet)?;
        self.store.set_banned(&wallet, banned)?;
        info!(wallet = %wallet, banned, "account moderation updated");
        Ok(())
    }

    pub fn online_offers(&self) -> Vec<ProviderOffer> {
        self.catalog.list_online_offers()
    }

    /// Last block fully credited by the chain watcher
    pub fn current_cursor(&self) -> Result<Option<u64>, LedgerError> {
        self.store.cursor()
    }

    /// Store handle, for the chain watcher's cursor management
    pub(crate) fn store(&self) -> &Arc<dyn LedgerStore> {
        &self.store
    }
}
