//! Concurrency tests against the public API
//!
//! Spends and credits are issued from many runtime tasks at once; balances
//! must never go negative and every deposit token must land exactly once.

use agent_ledger::{LedgerError, MemoryCatalog, SledLedger, TransferEngine};
use futures::future::join_all;
use primitive_types::U256;
use std::sync::Arc;

const ALPHA_PRICE: u64 = 10_000_000_000_000_000;
const ALPHA_PAYOUT: &str = "0x1a2b000000000000000000000000000000000a11";

fn engine() -> TransferEngine {
    TransferEngine::new(
        Arc::new(SledLedger::temporary().unwrap()),
        Arc::new(MemoryCatalog::seeded()),
    )
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_spends_never_overdraw() {
    let engine = engine();
    engine
        .credit("0xrenter", U256::from(ALPHA_PRICE) * 3u64, "0xfund")
        .unwrap();

    let tasks = (0..12).map(|_| {
        let engine = engine.clone();
        tokio::task::spawn_blocking(move || engine.spend("0xrenter", "NODE_ALPHA"))
    });
    let results: Vec<_> = join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    let succeeded = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(succeeded, 3);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| matches!(e, LedgerError::InsufficientBalance { .. })));

    assert_eq!(engine.balance("0xrenter").unwrap(), U256::zero());
    assert_eq!(
        engine.balance(ALPHA_PAYOUT).unwrap(),
        U256::from(ALPHA_PRICE / 100 * 99) * 3u64
    );
    assert_eq!(
        engine.overview().unwrap().total_fees_collected,
        U256::from(ALPHA_PRICE / 100) * 3u64
    );
    assert_eq!(engine.recent_transfers(20).unwrap().len(), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_duplicate_credits_apply_once() {
    let engine = engine();

    // Eight distinct tokens, each submitted four times
    let tasks = (0..32u64).map(|i| {
        let engine = engine.clone();
        tokio::task::spawn_blocking(move || {
            engine.credit("0xdepositor", U256::from(1000u64), &format!("0xtx{}", i % 8))
        })
    });
    let applied = join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap())
        .filter(|outcome| outcome.applied)
        .count();

    assert_eq!(applied, 8);
    assert_eq!(
        engine.balance("0xdepositor").unwrap(),
        U256::from(8000u64)
    );
}
