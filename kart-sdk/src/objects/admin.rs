//! Admin API response bodies.

use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::money::Money;

/// Returned by `POST /api/v1/admin/staging`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagingResponse {
    pub race_id: Uuid,
    /// Frozen roster in grid order.
    pub roster: Vec<CompactString>,
    pub ready_timeout_ms: u64,
}

/// One racer's final line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutLine {
    pub racer_id: CompactString,
    pub display_name: String,
    /// 1-based.
    pub rank: u32,
    pub session_total: Money,
    pub payout: Money,
}

/// Returned by `POST /api/v1/admin/end`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaceResultsResponse {
    pub race_id: Uuid,
    pub total_pot: Money,
    pub duration_ms: u64,
    /// Ordered by rank.
    pub results: Vec<PayoutLine>,
}
