//! Chain watcher
//!
//! Turns confirmed transfers to the receiving address into ledger credits.
//!
//! # Architecture
//!
//! ```text
//! ChainWatcher::run
//!     ├── start      (initialize the cursor once per deployment)
//!     └── sync_once  (per block: fetch -> credit -> advance cursor)
//!           ├── ChainSource  (head + blocks, bounded by fetch_timeout)
//!           └── TransferEngine (idempotent credits, keyed by tx hash)
//! ```
//!
//! A block's credits are durable before the cursor moves past it, and the
//! credits are idempotent, so a crash anywhere inside a block re-processes
//! that block on restart without crediting anything twice.

pub mod config;

use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::chain::{ChainBlock, ChainError, ChainSource};
use crate::core::TransferEngine;
use crate::types::{DepositEvent, DepositToken, LedgerError, Wallet};

pub use config::WatcherConfig;

/// Lifecycle of the watcher task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherState {
    Starting,
    /// Processing blocks between the cursor and the target height
    CatchingUp,
    /// Caught up, waiting for new blocks
    Polling,
    /// Waiting out a transient failure
    Backoff { attempt: u32 },
    Stopped,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum WatchError {
    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error("Timed out fetching block {height}")]
    Timeout { height: u64 },

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("Watcher cancelled")]
    Cancelled,
}

/// Outcome of one sync cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SyncReport {
    pub blocks: u64,
    pub credited: u64,
    pub cursor: u64,
}

pub struct ChainWatcher {
    engine: TransferEngine,
    chain: Arc<dyn ChainSource>,
    receiving_address: String,
    config: WatcherConfig,
    state: watch::Sender<WatcherState>,
}

impl ChainWatcher {
    pub fn new(
        engine: TransferEngine,
        chain: Arc<dyn ChainSource>,
        receiving_address: &str,
        config: WatcherConfig,
    ) -> Self {
        let (state, _) = watch::channel(WatcherState::Starting);
        Self {
            engine,
            chain,
            receiving_address: receiving_address.trim().to_lowercase(),
            config,
            state,
        }
    }

    /// Observe state changes
    pub fn subscribe(&self) -> watch::Receiver<WatcherState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> WatcherState {
        *self.state.borrow()
    }

    fn publish(&self, state: WatcherState) {
        self.state.send_replace(state);
    }

    /// Load the cursor, initializing it below the head if none exists yet
    pub async fn start(&self) -> Result<u64, WatchError> {
        if let Some(cursor) = self.engine.current_cursor()? {
            debug!(cursor, "using stored cursor");
            return Ok(cursor);
        }

        let head = self.chain.head_height().await?;
        let initial = head.saturating_sub(self.config.start_depth);
        // Another process may have won the race; its value is returned.
        Ok(self.engine.store().init_cursor(initial)?)
    }

    /// Process every block in `(cursor, head - confirmations]`
    ///
    /// Stops at the first failing block; everything before it stays committed.
    pub async fn sync_once(&self, cancel: &CancellationToken) -> Result<SyncReport, WatchError> {
        let mut cursor = self.start().await?;
        let head = self.chain.head_height().await?;
        let target = head.saturating_sub(self.config.confirmations);

        let mut report = SyncReport {
            cursor,
            ..SyncReport::default()
        };
        if target <= cursor {
            return Ok(report);
        }

        self.publish(WatcherState::CatchingUp);
        debug!(cursor, target, head, "catching up");

        while cursor < target {
            let height = cursor + 1;
            let block = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(WatchError::Cancelled),
                fetched = tokio::time::timeout(self.config.fetch_timeout, self.chain.block_at(height)) => {
                    fetched.map_err(|_| WatchError::Timeout { height })??
                }
            };

            // sled commits and flushes block the thread; keep them off the workers.
            let engine = self.engine.clone();
            let receiving_address = self.receiving_address.clone();
            let credited = tokio::task::spawn_blocking(move || -> Result<u64, WatchError> {
                let credited = credit_block(&engine, &receiving_address, height, &block)?;
                engine.store().advance_cursor(height)?;
                Ok(credited)
            })
            .await
            .map_err(|e| {
                LedgerError::storage(format!("ledger worker for block {} failed: {}", height, e))
            })??;

            report.credited += credited;
            cursor = height;
            report.blocks += 1;
            report.cursor = cursor;
            debug!(height, "block processed");
        }

        Ok(report)
    }

    /// Run until `cancel` fires
    pub async fn run(self, cancel: CancellationToken) {
        self.publish(WatcherState::Starting);
        let mut attempt: u32 = 0;

        loop {
            let pause = match self.sync_once(&cancel).await {
                Ok(report) => {
                    attempt = 0;
                    if report.blocks > 0 {
                        info!(
                            blocks = report.blocks,
                            credited = report.credited,
                            cursor = report.cursor,
                            "sync cycle complete"
                        );
                    }
                    self.publish(WatcherState::Polling);
                    self.config.poll_interval
                }
                Err(WatchError::Cancelled) => break,
                Err(e) => {
                    attempt = attempt.saturating_add(1);
                    match &e {
                        WatchError::Ledger(_) => error!(attempt, error = %e, "ledger failure, backing off"),
                        _ => warn!(attempt, error = %e, "chain unavailable, backing off"),
                    }
                    self.publish(WatcherState::Backoff { attempt });
                    self.config.backoff_interval
                }
            };

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(pause) => {}
            }
        }

        info!("watcher stopped");
        self.publish(WatcherState::Stopped);
    }
}

/// Credit every qualifying transaction of one block
fn credit_block(
    engine: &TransferEngine,
    receiving_address: &str,
    height: u64,
    block: &ChainBlock,
) -> Result<u64, WatchError> {
    let mut credited = 0;
    for tx in &block.transactions {
        let to_us = tx
            .to
            .as_deref()
            .is_some_and(|to| to.trim().eq_ignore_ascii_case(receiving_address));
        if !to_us || tx.value.is_zero() {
            continue;
        }

        let deposit = match (Wallet::parse(&tx.from), DepositToken::parse(&tx.hash)) {
            (Ok(sender), Ok(token)) => DepositEvent {
                token,
                sender,
                amount: tx.value,
                block_height: Some(height),
            },
            _ => {
                warn!(height, hash = %tx.hash, "skipping transaction with blank sender or hash");
                continue;
            }
        };

        match engine.credit_deposit(deposit) {
            Ok(outcome) if outcome.applied => credited += 1,
            Ok(_) => {}
            Err(e) if e.is_rejection() => {
                error!(height, hash = %tx.hash, error = %e, "deposit rejected");
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(credited)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{ChainTransaction, ScriptedChain};
    use crate::core::{MemoryCatalog, SledLedger};
    use primitive_types::U256;
    use std::time::Duration;

    const RECEIVER: &str = "0xCAFE00000000000000000000000000000000BEEF";

    fn tx(hash: &str, from: &str, to: Option<&str>, value: u64) -> ChainTransaction {
        ChainTransaction {
            hash: hash.to_string(),
            from: from.to_string(),
            to: to.map(str::to_string),
            value: U256::from(value),
        }
    }

    fn engine_on(store: SledLedger) -> TransferEngine {
        TransferEngine::new(Arc::new(store), Arc::new(MemoryCatalog::seeded()))
    }

    fn fast_config() -> WatcherConfig {
        WatcherConfig::new(
            Duration::from_millis(10),
            Duration::from_millis(10),
            Duration::from_millis(50),
            10,
            0,
        )
    }

    fn watcher(engine: &TransferEngine, chain: &Arc<ScriptedChain>) -> ChainWatcher {
        ChainWatcher::new(engine.clone(), chain.clone(), RECEIVER, fast_config())
    }

    #[tokio::test]
    async fn test_start_initializes_below_head_once() {
        let engine = engine_on(SledLedger::temporary().unwrap());
        let chain = Arc::new(ScriptedChain::new());
        chain.set_head(25).await;
        let watcher = watcher(&engine, &chain);

        assert_eq!(watcher.start().await.unwrap(), 15);

        chain.set_head(40).await;
        assert_eq!(watcher.start().await.unwrap(), 15);
        assert_eq!(engine.current_cursor().unwrap(), Some(15));
    }

    #[tokio::test]
    async fn test_start_saturates_on_short_chain() {
        let engine = engine_on(SledLedger::temporary().unwrap());
        let chain = Arc::new(ScriptedChain::new());
        chain.set_head(4).await;

        assert_eq!(watcher(&engine, &chain).start().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_sync_credits_only_qualifying_transactions() {
        let engine = engine_on(SledLedger::temporary().unwrap());
        let chain = Arc::new(ScriptedChain::new());
        let watcher = watcher(&engine, &chain);
        watcher.start().await.unwrap();

        chain
            .push_block(vec![
                tx("0x01", "0xAlice", Some(&RECEIVER.to_lowercase()), 700),
                tx("0x02", "0xBob", Some("0xsomeoneelse"), 500),
                tx("0x03", "0xBob", None, 500),
                tx("0x04", "0xBob", Some(RECEIVER), 0),
            ])
            .await;
        chain
            .push_block(vec![tx("0x05", "0xalice", Some(RECEIVER), 300)])
            .await;

        let report = watcher.sync_once(&CancellationToken::new()).await.unwrap();

        assert_eq!(
            report,
            SyncReport {
                blocks: 2,
                credited: 2,
                cursor: 2
            }
        );
        assert_eq!(engine.balance("0xalice").unwrap(), U256::from(1000));
        assert_eq!(engine.balance("0xbob").unwrap(), U256::zero());
        assert_eq!(engine.current_cursor().unwrap(), Some(2));
    }

    #[tokio::test]
    async fn test_confirmations_hold_back_recent_blocks() {
        let engine = engine_on(SledLedger::temporary().unwrap());
        let chain = Arc::new(ScriptedChain::new());
        let config = WatcherConfig {
            confirmations: 2,
            ..fast_config()
        };
        let watcher = ChainWatcher::new(engine.clone(), chain.clone(), RECEIVER, config);
        watcher.start().await.unwrap();

        for i in 0..5u64 {
            chain
                .push_block(vec![tx(&format!("0x{}", i), "0xalice", Some(RECEIVER), 1)])
                .await;
        }

        let report = watcher.sync_once(&CancellationToken::new()).await.unwrap();

        assert_eq!(report.cursor, 3);
        assert_eq!(engine.balance("0xalice").unwrap(), U256::from(3));
    }

    #[tokio::test]
    async fn test_failed_block_is_retried_not_skipped() {
        let engine = engine_on(SledLedger::temporary().unwrap());
        let chain = Arc::new(ScriptedChain::new());
        let watcher = watcher(&engine, &chain);
        watcher.start().await.unwrap();

        chain
            .push_block(vec![tx("0x01", "0xalice", Some(RECEIVER), 10)])
            .await;
        chain
            .push_block(vec![tx("0x02", "0xalice", Some(RECEIVER), 20)])
            .await;
        chain.fail_block(2, 1).await;

        let first = watcher.sync_once(&CancellationToken::new()).await;

        assert!(matches!(first, Err(WatchError::Chain(_))));
        assert_eq!(engine.current_cursor().unwrap(), Some(1));
        assert_eq!(engine.balance("0xalice").unwrap(), U256::from(10));

        let second = watcher.sync_once(&CancellationToken::new()).await.unwrap();

        assert_eq!(second.cursor, 2);
        assert_eq!(second.credited, 1);
        assert_eq!(engine.balance("0xalice").unwrap(), U256::from(30));
    }

    #[tokio::test]
    async fn test_stalled_fetch_times_out_without_advancing() {
        let engine = engine_on(SledLedger::temporary().unwrap());
        let chain = Arc::new(ScriptedChain::new());
        let watcher = watcher(&engine, &chain);
        watcher.start().await.unwrap();

        chain
            .push_block(vec![tx("0x01", "0xalice", Some(RECEIVER), 10)])
            .await;
        chain.stall_block(1, Duration::from_millis(500)).await;

        let result = watcher.sync_once(&CancellationToken::new()).await;

        assert_eq!(result, Err(WatchError::Timeout { height: 1 }));
        assert_eq!(engine.current_cursor().unwrap(), Some(0));
        assert_eq!(engine.balance("0xalice").unwrap(), U256::zero());

        // The stall is consumed; the retry reaches the same height.
        watcher.sync_once(&CancellationToken::new()).await.unwrap();
        assert_eq!(engine.balance("0xalice").unwrap(), U256::from(10));
        assert_eq!(chain.block_calls(1).await, 2);
    }

    #[tokio::test]
    async fn test_cancelled_sync_leaves_cursor() {
        let engine = engine_on(SledLedger::temporary().unwrap());
        let chain = Arc::new(ScriptedChain::new());
        let watcher = watcher(&engine, &chain);
        watcher.start().await.unwrap();
        chain.push_block(Vec::new()).await;

        let cancel = CancellationToken::new();
        cancel.cancel();

        assert_eq!(
            watcher.sync_once(&cancel).await,
            Err(WatchError::Cancelled)
        );
        assert_eq!(engine.current_cursor().unwrap(), Some(0));
    }

    #[tokio::test]
    async fn test_resume_after_crash_mid_block() {
        let dir = tempfile::tempdir().unwrap();
        let chain = Arc::new(ScriptedChain::new());
        chain.set_head(10).await;

        {
            let engine = engine_on(SledLedger::open(dir.path()).unwrap());
            let watcher = watcher(&engine, &chain);
            assert_eq!(watcher.start().await.unwrap(), 0);

            for i in 1..=3u64 {
                chain
                    .push_block(vec![tx(&format!("0xa{}", i), "0xalice", Some(RECEIVER), 100)])
                    .await;
            }
            watcher.sync_once(&CancellationToken::new()).await.unwrap();
            assert_eq!(engine.current_cursor().unwrap(), Some(13));

            // Block 14 arrives; the process dies after its first credit but
            // before the cursor write.
            chain
                .push_block(vec![
                    tx("0xb1", "0xbob", Some(RECEIVER), 40),
                    tx("0xb2", "0xbob", Some(RECEIVER), 2),
                ])
                .await;
            engine.credit("0xbob", U256::from(40), "0xb1").unwrap();
        }

        let engine = engine_on(SledLedger::open(dir.path()).unwrap());
        let watcher = watcher(&engine, &chain);
        assert_eq!(watcher.start().await.unwrap(), 13);

        let report = watcher.sync_once(&CancellationToken::new()).await.unwrap();

        assert_eq!(report.credited, 1);
        assert_eq!(report.cursor, 14);
        assert_eq!(engine.balance("0xbob").unwrap(), U256::from(42));
        assert_eq!(engine.balance("0xalice").unwrap(), U256::from(300));
    }

    #[tokio::test]
    async fn test_run_backs_off_then_stops_on_cancel() {
        let engine = engine_on(SledLedger::temporary().unwrap());
        let chain = Arc::new(ScriptedChain::new());
        chain.set_head(12).await;
        chain.fail_head(1).await;
        chain
            .push_block(vec![tx("0x0d", "0xalice", Some(RECEIVER), 5)])
            .await;

        // Long enough backoff that the recorder observes it before recovery
        let config = WatcherConfig {
            backoff_interval: Duration::from_millis(100),
            ..fast_config()
        };
        let watcher = ChainWatcher::new(engine.clone(), chain.clone(), RECEIVER, config);
        let mut recorded = watcher.subscribe();
        let mut states = watcher.subscribe();
        let recorder = tokio::spawn(async move {
            let mut seen = Vec::new();
            while recorded.changed().await.is_ok() {
                let state = *recorded.borrow_and_update();
                seen.push(state);
                if state == WatcherState::Stopped {
                    break;
                }
            }
            seen
        });

        let cancel = CancellationToken::new();
        let task = tokio::spawn(watcher.run(cancel.clone()));

        tokio::time::timeout(
            Duration::from_secs(5),
            states.wait_for(|s| *s == WatcherState::Polling),
        )
        .await
        .unwrap()
        .unwrap();

        assert_eq!(engine.current_cursor().unwrap(), Some(13));
        assert_eq!(engine.balance("0xalice").unwrap(), U256::from(5));
        // One failed query, then the retried cycle queries the head again
        assert!(chain.head_calls().await >= 3);

        cancel.cancel();
        task.await.unwrap();
        let seen = recorder.await.unwrap();

        let backoff = seen
            .iter()
            .position(|s| *s == WatcherState::Backoff { attempt: 1 })
            .expect("backoff was never published");
        let polling = seen
            .iter()
            .position(|s| *s == WatcherState::Polling)
            .expect("polling was never published");
        assert!(backoff < polling, "states out of order: {:?}", seen);
        assert_eq!(seen.last(), Some(&WatcherState::Stopped));
    }
}
