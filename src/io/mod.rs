//! I/O module
//!
//! Handles CSV parsing and output.
//!
//! # Components
//!
//! - `csv_format` - CSV format handling (spend rows, account and transfer exports)
//! - `spend_reader` - Streaming reader over spend request files

pub mod csv_format;
pub mod spend_reader;

pub use csv_format::{write_accounts_csv, write_transfers_csv, SpendRow};
pub use spend_reader::SpendReader;
