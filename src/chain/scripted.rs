//! In-memory chain driven by a script
//!
//! Used for replaying fixtures from the CLI and for exercising the watcher
//! against head moves, unavailable blocks and slow responses.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::time::Duration;
use tokio::sync::Mutex;

use super::{ChainBlock, ChainError, ChainSource, ChainTransaction};

/// JSON script describing a chain
///
/// ```json
/// {
///   "receiving_address": "0xcafe",
///   "head": 12,
///   "blocks": [{"height": 3, "transactions": [...]}]
/// }
/// ```
///
/// Heights up to `head` without an entry are empty blocks. When `head` is
/// absent it defaults to the highest scripted block. Scripted blocks start at
/// height 1: genesis is never processed, so a height 0 entry is rejected by
/// [`ChainScript::validate`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChainScript {
    pub receiving_address: Option<String>,
    pub head: Option<u64>,
    #[serde(default)]
    pub blocks: Vec<ChainBlock>,
}

impl ChainScript {
    pub fn from_json_file(path: &Path) -> Result<Self, ChainError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ChainError::Connection(format!("{}: {}", path.display(), e)))?;
        let script: Self = serde_json::from_str(&contents)
            .map_err(|e| ChainError::Decode(format!("{}: {}", path.display(), e)))?;
        script.validate()?;
        Ok(script)
    }

    /// Reject blocks the watcher would never reach
    pub fn validate(&self) -> Result<(), ChainError> {
        if self.blocks.iter().any(|block| block.height == 0) {
            return Err(ChainError::Decode(
                "block at height 0 would never be processed; scripted blocks start at 1"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct ScriptState {
    head: u64,
    blocks: BTreeMap<u64, ChainBlock>,
    head_failures: u32,
    block_failures: HashMap<u64, u32>,
    stalls: HashMap<u64, Duration>,
    head_calls: u64,
    block_calls: HashMap<u64, u32>,
}

/// Scripted [`ChainSource`]
#[derive(Debug, Default)]
pub struct ScriptedChain {
    state: Mutex<ScriptState>,
}

impl ScriptedChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_script(script: ChainScript) -> Self {
        let mut blocks = BTreeMap::new();
        for block in script.blocks {
            blocks.insert(block.height, block);
        }
        let head = script
            .head
            .or_else(|| blocks.keys().next_back().copied())
            .unwrap_or(0);

        Self {
            state: Mutex::new(ScriptState {
                head,
                blocks,
                ..ScriptState::default()
            }),
        }
    }

    /// Append a block on top of the head and return its height
    pub async fn push_block(&self, transactions: Vec<ChainTransaction>) -> u64 {
        let mut state = self.state.lock().await;
        state.head += 1;
        let height = state.head;
        state.blocks.insert(
            height,
            ChainBlock {
                height,
                transactions,
            },
        );
        height
    }

    /// Move the head; intermediate heights become empty blocks
    pub async fn set_head(&self, height: u64) {
        self.state.lock().await.head = height;
    }

    /// Fail the next `times` head queries
    pub async fn fail_head(&self, times: u32) {
        self.state.lock().await.head_failures = times;
    }

    /// Fail the next `times` fetches of block `height`
    pub async fn fail_block(&self, height: u64, times: u32) {
        self.state.lock().await.block_failures.insert(height, times);
    }

    /// Delay the next fetch of block `height` by `delay`
    pub async fn stall_block(&self, height: u64, delay: Duration) {
        self.state.lock().await.stalls.insert(height, delay);
    }

    /// Number of fetch attempts made for block `height`
    pub async fn block_calls(&self, height: u64) -> u32 {
        self.state
            .lock()
            .await
            .block_calls
            .get(&height)
            .copied()
            .unwrap_or(0)
    }

    pub async fn head_calls(&self) -> u64 {
        self.state.lock().await.head_calls
    }
}

#[async_trait]
impl ChainSource for ScriptedChain {
    async fn head_height(&self) -> Result<u64, ChainError> {
        let mut state = self.state.lock().await;
        state.head_calls += 1;
        if state.head_failures > 0 {
            state.head_failures -= 1;
            return Err(ChainError::Connection("scripted head failure".to_string()));
        }
        Ok(state.head)
    }

    async fn block_at(&self, height: u64) -> Result<ChainBlock, ChainError> {
        let stall = {
            let mut state = self.state.lock().await;
            *state.block_calls.entry(height).or_insert(0) += 1;
            state.stalls.remove(&height)
        };
        // Sleep without holding the lock so a timed-out caller can retry.
        if let Some(delay) = stall {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock().await;
        if let Some(remaining) = state.block_failures.get_mut(&height) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(ChainError::Request(format!(
                    "scripted failure for block {}",
                    height
                )));
            }
        }
        if height > state.head {
            return Err(ChainError::BlockUnavailable { height });
        }
        Ok(state.blocks.get(&height).cloned().unwrap_or(ChainBlock {
            height,
            transactions: Vec::new(),
        }))
    }
}
