//! Benchmark suite for ledger operations
//!
//! Measures the durable credit and spend paths and the fee split using the
//! divan benchmarking framework.
//!
//! # Running Benchmarks
//!
//! ```bash
//! # Run all benchmarks
//! cargo bench
//! ```
//!
//! Every iteration commits a `sled` transaction on a temporary store, so the
//! numbers reflect transaction overhead rather than disk flushes.

use agent_ledger::core::FeeRate;
use agent_ledger::{MemoryCatalog, SledLedger, TransferEngine};
use primitive_types::U256;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

fn main() {
    divan::main();
}

fn engine() -> TransferEngine {
    TransferEngine::new(
        Arc::new(SledLedger::temporary().expect("Failed to open store")),
        Arc::new(MemoryCatalog::seeded()),
    )
}

/// Credit a fresh deposit token per iteration
#[divan::bench]
fn credit_new_token(bencher: divan::Bencher) {
    let engine = engine();
    let counter = AtomicU64::new(0);

    bencher.bench(|| {
        let token = format!("0x{:x}", counter.fetch_add(1, Ordering::Relaxed));
        engine
            .credit("0xdepositor", U256::from(1_000u64), &token)
            .expect("Credit failed")
    });
}

/// Re-submit an already applied token
#[divan::bench]
fn credit_duplicate_token(bencher: divan::Bencher) {
    let engine = engine();
    engine
        .credit("0xdepositor", U256::from(1_000u64), "0xseen")
        .expect("Credit failed");

    bencher.bench(|| {
        engine
            .credit("0xdepositor", U256::from(1_000u64), "0xseen")
            .expect("Credit failed")
    });
}

/// Rent the cheapest seeded node from a wallet funded for every iteration
#[divan::bench(sample_count = 100, sample_size = 10)]
fn spend(bencher: divan::Bencher) {
    let engine = engine();
    engine
        .credit("0xrenter", U256::MAX / 2u64, "0xfund")
        .expect("Credit failed");

    bencher.bench(|| engine.spend("0xrenter", "NODE_BRAVO").expect("Spend failed"));
}

#[divan::bench(args = [1_000_000u64, u64::MAX])]
fn fee_split(amount: u64) -> U256 {
    FeeRate::default()
        .split(divan::black_box(U256::from(amount)))
        .expect("Split failed")
        .fee
}
