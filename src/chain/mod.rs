//! Chain data sources
//!
//! The watcher only needs two reads from a chain: the current head height and
//! the transactions of a block at a given height. Both may fail transiently.
//!
//! - [`rpc::JsonRpcChain`] - Ethereum-compatible JSON-RPC node
//! - [`scripted::ScriptedChain`] - in-memory chain with fault injection

pub mod rpc;
pub mod scripted;

use async_trait::async_trait;
use primitive_types::U256;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use rpc::JsonRpcChain;
pub use scripted::{ChainScript, ScriptedChain};

/// A value transfer inside a block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainTransaction {
    pub hash: String,
    pub from: String,
    /// `None` for contract creations
    pub to: Option<String>,
    pub value: U256,
}

/// The transactions of one block
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChainBlock {
    pub height: u64,
    #[serde(default)]
    pub transactions: Vec<ChainTransaction>,
}

/// Errors reading from a chain; all of them are treated as transient
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ChainError {
    #[error("Chain node unreachable: {0}")]
    Connection(String),

    #[error("Chain request failed: {0}")]
    Request(String),

    #[error("Chain node returned error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("Block {height} is not available yet")]
    BlockUnavailable { height: u64 },

    #[error("Malformed chain data: {0}")]
    Decode(String),
}

/// Read access to a chain
#[async_trait]
pub trait ChainSource: Send + Sync {
    /// Height of the latest block known to the node
    async fn head_height(&self) -> Result<u64, ChainError>;

    /// Full block at `height`
    async fn block_at(&self, height: u64) -> Result<ChainBlock, ChainError>;
}
