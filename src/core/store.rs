//! Durable ledger storage on an embedded sled database
//!
//! # Layout
//!
//! | tree        | key                     | value                 |
//! |-------------|-------------------------|-----------------------|
//! | `accounts`  | normalized wallet       | JSON `Account`        |
//! | `deposits`  | normalized tx hash      | JSON `DepositEvent`   |
//! | `transfers` | big-endian transfer id  | JSON `TransferRecord` |
//! | `activity`  | big-endian entry id     | JSON `ActivityEntry`  |
//! | `meta`      | fixed keys              | cursor, counters, fee total |
//!
//! # Atomicity
//!
//! Every mutation runs inside one multi-tree sled transaction. sled
//! transactions are serializable: a transaction whose reads were invalidated by
//! a concurrent commit is re-run against fresh data, so a balance check and the
//! debit it guards can never interleave with another spender of the same wallet.
//! A closure that aborts leaves no trace in any tree.

use chrono::Utc;
use primitive_types::U256;
use serde::{de::DeserializeOwned, Serialize};
use sled::transaction::{
    ConflictableTransactionError, ConflictableTransactionResult, TransactionalTree,
};
use sled::{Transactional, Tree};
use std::path::Path;
use tracing::{debug, info};

#[cfg(test)]
use std::sync::{Arc, Mutex};

use crate::core::traits::{BalanceDelta, LedgerStore};
use crate::types::{
    Account, ActivityEntry, ActivityKind, DepositEvent, DepositToken, LedgerError, TransferPlan,
    TransferRecord, Wallet,
};

const ACCOUNTS_TREE: &str = "accounts";
const DEPOSITS_TREE: &str = "deposits";
const TRANSFERS_TREE: &str = "transfers";
const ACTIVITY_TREE: &str = "activity";
const META_TREE: &str = "meta";

const CURSOR_KEY: &[u8] = b"cursor";
const FEES_TOTAL_KEY: &[u8] = b"fees_total";
const NEXT_TRANSFER_ID_KEY: &[u8] = b"next_transfer_id";
const NEXT_ACTIVITY_ID_KEY: &[u8] = b"next_activity_id";

type TxResult<T> = ConflictableTransactionResult<T, LedgerError>;

/// Points between the writes of a transfer where a test can force an abort
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteStage {
    AfterDebit,
    AfterPayout,
    AfterRecord,
}

/// Ledger store backed by sled
#[derive(Debug, Clone)]
pub struct SledLedger {
    db: sled::Db,
    accounts: Tree,
    deposits: Tree,
    transfers: Tree,
    activity: Tree,
    meta: Tree,
    #[cfg(test)]
    fault: Arc<Mutex<Option<WriteStage>>>,
}

impl SledLedger {
    /// Open or create a ledger database at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, LedgerError> {
        let path = path.as_ref();
        let db = sled::open(path).map_err(|e| {
            if is_lock_conflict(&e) {
                LedgerError::storage(format!(
                    "Ledger at {} is in use by another process (is `agent-ledger watch` running? \
                     use `watch --requests` to issue commands against it)",
                    path.display()
                ))
            } else {
                LedgerError::storage(format!("Failed to open ledger at {}: {}", path.display(), e))
            }
        })?;
        Self::from_db(db)
    }

    /// Open a throwaway ledger that is deleted when dropped
    pub fn temporary() -> Result<Self, LedgerError> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: sled::Db) -> Result<Self, LedgerError> {
        Ok(Self {
            accounts: db.open_tree(ACCOUNTS_TREE)?,
            deposits: db.open_tree(DEPOSITS_TREE)?,
            transfers: db.open_tree(TRANSFERS_TREE)?,
            activity: db.open_tree(ACTIVITY_TREE)?,
            meta: db.open_tree(META_TREE)?,
            db,
            #[cfg(test)]
            fault: Arc::new(Mutex::new(None)),
        })
    }

    /// Flush all committed writes to disk
    pub fn flush(&self) -> Result<(), LedgerError> {
        self.db.flush()?;
        Ok(())
    }

    #[cfg(test)]
    fn arm_fault(&self, stage: Option<WriteStage>) {
        *self.fault.lock().unwrap() = stage;
    }

    #[cfg(test)]
    fn checkpoint(&self, stage: WriteStage) -> TxResult<()> {
        let armed = *self.fault.lock().unwrap_or_else(|p| p.into_inner());
        if armed == Some(stage) {
            return abort(LedgerError::storage(format!("injected fault {:?}", stage)));
        }
        Ok(())
    }

    #[cfg(not(test))]
    #[inline]
    fn checkpoint(&self, _stage: WriteStage) -> TxResult<()> {
        Ok(())
    }
}

// ==================== transaction helpers ====================

fn abort<T>(error: LedgerError) -> TxResult<T> {
    Err(ConflictableTransactionError::Abort(error))
}

fn encode<T: Serialize>(value: &T) -> TxResult<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| ConflictableTransactionError::Abort(e.into()))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, LedgerError> {
    Ok(serde_json::from_slice(bytes)?)
}

fn decode_u64(bytes: &[u8]) -> Result<u64, LedgerError> {
    <[u8; 8]>::try_from(bytes)
        .map(u64::from_be_bytes)
        .map_err(|_| LedgerError::Serialization {
            message: format!("expected 8-byte counter, found {} bytes", bytes.len()),
        })
}

fn load_account(accounts: &TransactionalTree, wallet: &Wallet) -> TxResult<Account> {
    match accounts.get(wallet.as_str())? {
        Some(bytes) => decode(&bytes).map_err(ConflictableTransactionError::Abort),
        None => Ok(Account::new(wallet.clone())),
    }
}

fn store_account(accounts: &TransactionalTree, account: &Account) -> TxResult<()> {
    accounts.insert(account.wallet.as_str(), encode(account)?)?;
    Ok(())
}

/// Conditional adjustment: debits that would underflow abort the transaction
fn adjust(
    accounts: &TransactionalTree,
    wallet: &Wallet,
    delta: BalanceDelta,
    operation: &str,
) -> TxResult<Account> {
    let mut account = load_account(accounts, wallet)?;
    account.balance = match delta {
        BalanceDelta::Credit(amount) => match account.balance.checked_add(amount) {
            Some(balance) => balance,
            None => return abort(LedgerError::arithmetic_overflow(operation, wallet.as_str())),
        },
        BalanceDelta::Debit(amount) => match account.balance.checked_sub(amount) {
            Some(balance) => balance,
            None => {
                return abort(LedgerError::insufficient_balance(
                    wallet.as_str(),
                    account.balance,
                    amount,
                ))
            }
        },
    };
    store_account(accounts, &account)?;
    Ok(account)
}

fn next_id(meta: &TransactionalTree, key: &[u8]) -> TxResult<u64> {
    let current = match meta.get(key)? {
        Some(bytes) => decode_u64(&bytes).map_err(ConflictableTransactionError::Abort)?,
        None => 0,
    };
    let next = current + 1;
    meta.insert(key, &next.to_be_bytes()[..])?;
    Ok(next)
}

fn append_activity(
    activity: &TransactionalTree,
    meta: &TransactionalTree,
    kind: ActivityKind,
    description: String,
) -> TxResult<()> {
    let id = next_id(meta, NEXT_ACTIVITY_ID_KEY)?;
    let entry = ActivityEntry {
        id,
        kind,
        description,
        timestamp: Utc::now(),
    };
    activity.insert(&id.to_be_bytes()[..], encode(&entry)?)?;
    Ok(())
}

fn load_fees(meta: &TransactionalTree) -> TxResult<U256> {
    match meta.get(FEES_TOTAL_KEY)? {
        Some(bytes) => decode(&bytes).map_err(ConflictableTransactionError::Abort),
        None => Ok(U256::zero()),
    }
}

impl LedgerStore for SledLedger {
    fn account(&self, wallet: &Wallet) -> Result<Option<Account>, LedgerError> {
        match self.accounts.get(wallet.as_str())? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn adjust_balance(&self, wallet: &Wallet, delta: BalanceDelta) -> Result<U256, LedgerError> {
        let account = self
            .accounts
            .transaction(|accounts| adjust(accounts, wallet, delta, "adjust"))?;
        Ok(account.balance)
    }

    fn apply_deposit(&self, deposit: &DepositEvent) -> Result<bool, LedgerError> {
        let applied = (&self.accounts, &self.deposits, &self.activity, &self.meta).transaction(
            |(accounts, deposits, activity, meta)| -> TxResult<bool> {
                if deposits.get(deposit.token.as_str())?.is_some() {
                    return Ok(false);
                }
                deposits.insert(deposit.token.as_str(), encode(deposit)?)?;
                adjust(
                    accounts,
                    &deposit.sender,
                    BalanceDelta::Credit(deposit.amount),
                    "deposit",
                )?;
                append_activity(
                    activity,
                    meta,
                    ActivityKind::Deposit,
                    format!(
                        "DEPOSIT: {} credited {} wei (tx {})",
                        deposit.sender, deposit.amount, deposit.token.as_str()
                    ),
                )?;
                Ok(true)
            },
        )?;

        if applied {
            debug!(token = deposit.token.as_str(), "deposit committed");
        }
        Ok(applied)
    }

    fn is_deposit_applied(&self, token: &DepositToken) -> Result<bool, LedgerError> {
        Ok(self.deposits.contains_key(token.as_str())?)
    }

    fn apply_transfer(&self, plan: &TransferPlan) -> Result<(TransferRecord, U256), LedgerError> {
        let outcome = (&self.accounts, &self.transfers, &self.activity, &self.meta).transaction(
            |(accounts, transfers, activity, meta)| -> TxResult<(TransferRecord, U256)> {
                if load_account(accounts, &plan.renter)?.banned {
                    return abort(LedgerError::account_banned(plan.renter.as_str()));
                }
                let renter = adjust(accounts, &plan.renter, BalanceDelta::Debit(plan.gross), "spend")?;
                self.checkpoint(WriteStage::AfterDebit)?;

                adjust(
                    accounts,
                    &plan.provider_wallet,
                    BalanceDelta::Credit(plan.provider_net),
                    "payout",
                )?;
                self.checkpoint(WriteStage::AfterPayout)?;

                let id = next_id(meta, NEXT_TRANSFER_ID_KEY)?;
                let record = TransferRecord {
                    id,
                    from_wallet: plan.renter.clone(),
                    to_wallet: plan.provider_wallet.clone(),
                    provider_id: plan.provider_id.clone(),
                    fee_amount: plan.fee,
                    gross_amount: plan.gross,
                    timestamp: Utc::now(),
                };
                transfers.insert(&id.to_be_bytes()[..], encode(&record)?)?;
                self.checkpoint(WriteStage::AfterRecord)?;

                let fees = match load_fees(meta)?.checked_add(plan.fee) {
                    Some(total) => total,
                    None => return abort(LedgerError::arithmetic_overflow("fee total", "-")),
                };
                meta.insert(FEES_TOTAL_KEY, encode(&fees)?)?;

                append_activity(
                    activity,
                    meta,
                    ActivityKind::Transfer,
                    format!(
                        "A2A TRANSFER: {} -> {} | FEE: {} Wei",
                        plan.renter, plan.provider_wallet, plan.fee
                    ),
                )?;
                Ok((record, renter.balance))
            },
        )?;
        Ok(outcome)
    }

    fn set_banned(&self, wallet: &Wallet, banned: bool) -> Result<(), LedgerError> {
        (&self.accounts, &self.activity, &self.meta).transaction(|(accounts, activity, meta)| -> TxResult<()> {
            let mut account = load_account(accounts, wallet)?;
            account.banned = banned;
            store_account(accounts, &account)?;
            let verb = if banned { "BANNED" } else { "UNBANNED" };
            append_activity(activity, meta, ActivityKind::Moderation, format!("{}: {}", verb, wallet))?;
            Ok(())
        })?;
        Ok(())
    }

    fn accounts(&self) -> Result<Vec<Account>, LedgerError> {
        let mut accounts = Vec::new();
        for item in self.accounts.iter() {
            let (_, value) = item?;
            accounts.push(decode(&value)?);
        }
        Ok(accounts)
    }

    fn account_count(&self) -> Result<u64, LedgerError> {
        Ok(self.accounts.len() as u64)
    }

    fn total_fees(&self) -> Result<U256, LedgerError> {
        match self.meta.get(FEES_TOTAL_KEY)? {
            Some(bytes) => decode(&bytes),
            None => Ok(U256::zero()),
        }
    }

    fn recent_transfers(&self, limit: usize) -> Result<Vec<TransferRecord>, LedgerError> {
        let mut records = Vec::with_capacity(limit.min(64));
        for item in self.transfers.iter().rev().take(limit) {
            let (_, value) = item?;
            records.push(decode(&value)?);
        }
        Ok(records)
    }

    fn recent_activity(&self, limit: usize) -> Result<Vec<ActivityEntry>, LedgerError> {
        let mut entries = Vec::with_capacity(limit.min(64));
        for item in self.activity.iter().rev().take(limit) {
            let (_, value) = item?;
            entries.push(decode(&value)?);
        }
        Ok(entries)
    }

    fn cursor(&self) -> Result<Option<u64>, LedgerError> {
        match self.meta.get(CURSOR_KEY)? {
            Some(bytes) => Ok(Some(decode_u64(&bytes)?)),
            None => Ok(None),
        }
    }

    fn init_cursor(&self, height: u64) -> Result<u64, LedgerError> {
        let swapped = self.meta.compare_and_swap(
            CURSOR_KEY,
            None::<&[u8]>,
            Some(&height.to_be_bytes()[..]),
        )?;
        match swapped {
            Ok(()) => {
                self.flush()?;
                info!(height, "reconciliation cursor initialized");
                Ok(height)
            }
            Err(existing) => match existing.current {
                Some(bytes) => decode_u64(&bytes),
                None => Err(LedgerError::storage("cursor vanished during initialization")),
            },
        }
    }

    fn advance_cursor(&self, height: u64) -> Result<(), LedgerError> {
        if let Some(current) = self.cursor()? {
            if height <= current {
                return Ok(());
            }
        }
        // Credits first, then the cursor that vouches for them.
        self.flush()?;
        self.meta.insert(CURSOR_KEY, &height.to_be_bytes()[..])?;
        self.flush()
    }
}

/// sled holds an exclusive file lock for the lifetime of a `Db`
fn is_lock_conflict(error: &sled::Error) -> bool {
    match error {
        sled::Error::Io(io) => {
            io.kind() == std::io::ErrorKind::WouldBlock
                || io.to_string().contains("could not acquire lock")
        }
        _ => false,
    }
}
