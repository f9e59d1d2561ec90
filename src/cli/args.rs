use crate::watcher::WatcherConfig;
use clap::{Args, Parser, Subcommand};
use primitive_types::U256;
use std::path::PathBuf;
use std::time::Duration;

/// Public Ethereum endpoint used when none is configured
pub const DEFAULT_RPC_URL: &str = "https://cloudflare-eth.com";

/// Agent-to-agent compute ledger with on-chain deposit reconciliation
#[derive(Parser, Debug)]
#[command(name = "agent-ledger")]
#[command(about = "Agent-to-agent compute ledger with on-chain deposit reconciliation", long_about = None)]
pub struct CliArgs {
    /// Directory holding the ledger database
    #[arg(
        long = "data-dir",
        value_name = "DIR",
        env = "LEDGER_DATA_DIR",
        default_value = "ledger-data",
        global = true
    )]
    pub data_dir: PathBuf,

    /// JSON file with provider offers (defaults to the built-in catalog)
    #[arg(long = "offers", value_name = "FILE", global = true)]
    pub offers: Option<PathBuf>,

    /// Log filter used when RUST_LOG is not set
    #[arg(
        long = "log-level",
        value_name = "FILTER",
        default_value = "info",
        global = true
    )]
    pub log_level: String,

    /// Number of runtime worker threads (default: CPU cores)
    #[arg(long = "workers", value_name = "COUNT", global = true)]
    pub workers: Option<usize>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Follow the chain and credit deposits until interrupted
    Watch(WatchArgs),

    /// Replay a chain script and a spend batch, then print accounts as CSV
    Replay {
        /// JSON chain script
        #[arg(value_name = "SCRIPT")]
        script: PathBuf,

        /// CSV file with renter,provider rows
        #[arg(long = "spends", value_name = "FILE")]
        spends: Option<PathBuf>,

        /// Overrides the address stored in the script
        #[arg(long = "receiving-address", value_name = "ADDRESS")]
        receiving_address: Option<String>,
    },

    /// Show a wallet's balance
    Balance { wallet: String },

    /// Credit a deposit by hand; repeating a token is a no-op
    Credit {
        wallet: String,
        /// Amount in wei, decimal or 0x-prefixed hex
        #[arg(value_parser = parse_amount)]
        amount: U256,
        token: String,
    },

    /// Rent a provider's offer
    Spend { renter: String, provider: String },

    /// Show account count, active providers and collected fees
    Overview,

    /// Show the reconciliation cursor
    Cursor,

    /// List online provider offers
    Offers,

    /// Print recent transfers as CSV, most recent first
    Transfers {
        #[arg(long = "limit", default_value_t = 20)]
        limit: usize,
    },

    /// Print all accounts as CSV
    Accounts,

    /// Show recent activity, most recent first
    Activity {
        #[arg(long = "limit", default_value_t = 20)]
        limit: usize,
    },

    /// Bar a wallet from spending
    Ban { wallet: String },

    /// Lift a ban
    Unban { wallet: String },
}

#[derive(Args, Debug, Clone, PartialEq)]
pub struct WatchArgs {
    /// Address deposits are sent to
    #[arg(long = "receiving-address", value_name = "ADDRESS", env = "RECEIVING_ADDRESS")]
    pub receiving_address: String,

    /// Ethereum JSON-RPC endpoint
    #[arg(
        long = "rpc-url",
        value_name = "URL",
        env = "ETH_RPC_URL",
        default_value = DEFAULT_RPC_URL
    )]
    pub rpc_url: String,

    /// Follow a JSON chain script instead of the RPC endpoint
    #[arg(long = "script", value_name = "FILE")]
    pub script: Option<PathBuf>,

    /// Seconds between polls once caught up (default: 10)
    #[arg(long = "poll-secs", value_name = "SECS")]
    pub poll_secs: Option<u64>,

    /// Seconds to wait after a failure (default: 10)
    #[arg(long = "backoff-secs", value_name = "SECS")]
    pub backoff_secs: Option<u64>,

    /// Per-block fetch timeout in seconds (default: 15)
    #[arg(long = "fetch-timeout-secs", value_name = "SECS")]
    pub fetch_timeout_secs: Option<u64>,

    /// Blocks below the head where a new ledger starts (default: 10)
    #[arg(long = "start-depth", value_name = "BLOCKS")]
    pub start_depth: Option<u64>,

    /// Blocks to stay behind the head (default: 0)
    #[arg(long = "confirmations", value_name = "BLOCKS")]
    pub confirmations: Option<u64>,

    /// Also answer ledger commands read one per line from stdin
    #[arg(long = "requests")]
    pub requests: bool,
}

impl WatchArgs {
    /// Create a WatcherConfig from CLI arguments, falling back to defaults
    pub fn to_watcher_config(&self) -> WatcherConfig {
        let default = WatcherConfig::default();
        WatcherConfig::new(
            self.poll_secs
                .map(Duration::from_secs)
                .unwrap_or(default.poll_interval),
            self.backoff_secs
                .map(Duration::from_secs)
                .unwrap_or(default.backoff_interval),
            self.fetch_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(default.fetch_timeout),
            self.start_depth.unwrap_or(default.start_depth),
            self.confirmations.unwrap_or(default.confirmations),
        )
    }
}

/// Parse a wei amount given in decimal or `0x` hex
pub fn parse_amount(input: &str) -> Result<U256, String> {
    let input = input.trim();
    let parsed = match input.strip_prefix("0x") {
        Some(hex) => U256::from_str_radix(hex, 16).map_err(|e| format!("{:?}", e)),
        None => U256::from_dec_str(input).map_err(|e| format!("{:?}", e)),
    };
    parsed.map_err(|e| format!("Invalid amount '{}': {}", input, e))
}
