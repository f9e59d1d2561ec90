//! Agent Ledger Library
//! # Overview
//!
//! This library provides a custodial credit ledger for a marketplace where
//! autonomous agents rent compute from provider nodes. Deposits arrive as
//! on-chain transfers to a receiving address and are reconciled into
//! per-wallet balances; rentals move credit from renter to provider with a
//! platform fee, atomically.
//!
//! # Architecture
//!
//! The system is organized into several key components:
//!
//! - [`types`] - Core data types (Account, TransferRecord, LedgerError, etc.)
//! - [`core`] - Business logic components:
//!   - [`core::engine`] - Credit and spend orchestration
//!   - [`core::store`] - Durable `sled` storage with atomic multi-row updates
//!   - [`core::catalog`] - Provider offers
//!   - [`core::fee`] - Integer fee arithmetic
//! - [`chain`] - Chain data sources (JSON-RPC and scripted)
//! - [`watcher`] - Background reconciliation of deposits with a durable cursor
//! - [`replay`] - Offline replay of a chain script and a spend batch
//! - [`io`] - CSV input and export
//! - [`cli`] - CLI arguments parsing and command execution
//!
//! # Guarantees
//!
//! - A deposit is credited at most once per transaction hash
//! - No balance ever goes negative, including under concurrent spends
//! - A spend either applies its debit, payout and record together or not at all
//! - The watcher never skips a block and never moves its cursor past a block
//!   whose credits are not durable

// Module declarations
pub mod chain;
pub mod cli;
pub mod core;
pub mod io;
pub mod replay;
pub mod types;
pub mod watcher;

pub use chain::{ChainBlock, ChainError, ChainSource, ChainTransaction};
pub use crate::core::{Catalog, FeeRate, LedgerStore, MemoryCatalog, SledLedger, TransferEngine};
pub use io::{write_accounts_csv, write_transfers_csv};
pub use types::{
    Account, ActivityEntry, DepositEvent, LedgerError, Overview, ProviderOffer, SpendReceipt,
    TransferRecord, Wallet,
};
pub use watcher::{ChainWatcher, WatcherConfig, WatcherState};
