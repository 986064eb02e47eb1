use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// The immutable once-per-cycle settlement record.
///
/// Exactly one row per cycle date; creation is gated by a storage-level
/// uniqueness constraint, never by an application-level existence check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleSettlement {
    pub id: i64,
    pub date: NaiveDate,
    /// Sum of result_pct over all events created inside the cycle window
    pub aggregate_pct: f64,
    pub events_count: i64,
    pub created_at: DateTime<Utc>,
}

/// Snapshot of the open cycle, served by the administrative surface
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleProgress {
    pub date: NaiveDate,
    pub cumulative_pct: f64,
    pub events_count: i64,
    pub hours_remaining: f64,
    pub is_active: bool,
}
