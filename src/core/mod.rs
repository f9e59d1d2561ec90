//! Core business logic module
//!
//! This module contains the ledger components:
//! - `traits` - Storage and catalog seams
//! - `store` - Durable sled-backed ledger storage
//! - `engine` - Credit, spend and report operations
//! - `fee` - Integer fee computation
//! - `catalog` - In-process provider catalog

pub mod catalog;
pub mod engine;
pub mod fee;
pub mod store;
pub mod traits;

pub use catalog::{CatalogLoadError, MemoryCatalog};
pub use engine::TransferEngine;
pub use fee::{FeeRate, FeeSplit};
pub use store::SledLedger;
pub use traits::{BalanceDelta, Catalog, LedgerStore};
