//! Read-only report records for administrative callers

use chrono::{DateTime, Utc};
use primitive_types::U256;
use serde::{Deserialize, Serialize};

/// Aggregate view of the ledger
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Overview {
    pub account_count: u64,
    pub active_provider_count: u64,
    /// Sum of the fees of every recorded transfer
    pub total_fees_collected: U256,
}

/// What an activity log entry describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
    Deposit,
    Transfer,
    Moderation,
}

/// Human-readable line of the append-only activity log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub id: u64,
    pub kind: ActivityKind,
    pub description: String,
    pub timestamp: DateTime<Utc>,
}
