//! Types module
//!
//! Contains core data structures used throughout the application.
//! This module organizes types into logical submodules:
//! - `account`: wallets and account state
//! - `deposit`: chain deposits and their idempotency tokens
//! - `transfer`: fee-splitting spends and their audit records
//! - `offer`: provider offers
//! - `report`: aggregate and activity records
//! - `error`: error types for the ledger

pub mod account;
pub mod deposit;
pub mod error;
pub mod offer;
pub mod report;
pub mod transfer;

pub use account::{Account, Wallet};
pub use deposit::{CreditOutcome, DepositEvent, DepositToken};
pub use error::LedgerError;
pub use offer::{OfferStatus, ProviderOffer};
pub use report::{ActivityEntry, ActivityKind, Overview};
pub use transfer::{SpendReceipt, TransferPlan, TransferRecord};
