//! Agent Ledger CLI
//!
//! Command-line interface for the agent-to-agent compute ledger.
//!
//! # Usage
//!
//! ```bash
//! agent-ledger watch --receiving-address 0xcafe... > /dev/null
//! agent-ledger watch --receiving-address 0xcafe... --requests   # commands on stdin
//! agent-ledger spend 0xrenter NODE_ALPHA
//! agent-ledger --data-dir /var/lib/ledger accounts > accounts.csv
//! agent-ledger replay chain.json --spends spends.csv > accounts.csv
//! ```
//!
//! Command results go to stdout (JSON or CSV); logs go to stderr and are
//! filtered by `RUST_LOG`, falling back to `--log-level`.
//!
//! # Exit Codes
//!
//! - 0: Success
//! - 1: Error (rejected operation, unreadable file, storage failure, etc.)

use agent_ledger::cli;
use std::process;
use tracing_subscriber::EnvFilter;

fn main() {
    let args = cli::parse_args();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&args.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let workers = match args.workers {
        Some(0) => {
            tracing::warn!(
                "Invalid workers (0), using default ({})",
                num_cpus::get()
            );
            num_cpus::get()
        }
        Some(workers) => workers,
        None => num_cpus::get(),
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .worker_threads(workers)
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error: failed to start runtime: {}", e);
            process::exit(1);
        }
    };

    let mut output = std::io::stdout();
    let result = runtime.block_on(cli::execute(&args, &mut output));
    // A pending stdin read from `watch --requests` must not hold up exit.
    runtime.shutdown_background();
    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
