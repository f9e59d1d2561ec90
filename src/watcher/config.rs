use std::time::Duration;
use tracing::warn;

/// Timing and depth settings for the chain watcher
#[derive(Clone, Debug, PartialEq)]
pub struct WatcherConfig {
    /// Pause between cycles once caught up
    pub poll_interval: Duration,
    /// Pause after a transient failure before retrying the same height
    pub backoff_interval: Duration,
    /// Upper bound on a single block fetch
    pub fetch_timeout: Duration,
    /// How far below the head a brand-new cursor starts
    pub start_depth: u64,
    /// Blocks kept between the processed height and the head
    pub confirmations: u64,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            backoff_interval: Duration::from_secs(10),
            fetch_timeout: Duration::from_secs(15),
            start_depth: 10,
            confirmations: 0,
        }
    }
}

impl WatcherConfig {
    /// Create a config; zero durations fall back to the defaults
    pub fn new(
        poll_interval: Duration,
        backoff_interval: Duration,
        fetch_timeout: Duration,
        start_depth: u64,
        confirmations: u64,
    ) -> Self {
        let default = Self::default();

        Self {
            poll_interval: non_zero("poll_interval", poll_interval, default.poll_interval),
            backoff_interval: non_zero(
                "backoff_interval",
                backoff_interval,
                default.backoff_interval,
            ),
            fetch_timeout: non_zero("fetch_timeout", fetch_timeout, default.fetch_timeout),
            start_depth,
            confirmations,
        }
    }
}

fn non_zero(name: &str, value: Duration, default: Duration) -> Duration {
    if value.is_zero() {
        warn!(
            "Invalid {} ({:?}), using default ({:?})",
            name, value, default
        );
        default
    } else {
        value
    }
}
