use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use std::collections::HashSet;

use crate::domain::{CycleSettlement, IncomeEntry, LedgerPosition, NewTradeEvent};
use crate::error::Result;

/// Repository interface shared by every background loop.
///
/// Implementations must make `try_insert_settlement` atomic under
/// concurrent callers via a storage-level uniqueness constraint on the
/// cycle date; it is the only once-per-cycle gate in the system.
#[async_trait]
pub trait Store: Send + Sync {
    // ==================== Trade events ====================

    /// Append one trade event, returning its id
    async fn insert_trade(&self, event: &NewTradeEvent) -> Result<i64>;

    /// Sum of result_pct over events created in `[start, end)`
    async fn sum_results_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<f64>;

    /// Number of events created in `[start, end)`
    async fn count_trades_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<i64>;

    // ==================== Settlements ====================

    /// Atomically create the settlement row for `date` unless one exists.
    /// Returns `true` iff this call created the row.
    async fn try_insert_settlement(
        &self,
        date: NaiveDate,
        aggregate_pct: f64,
        events_count: i64,
    ) -> Result<bool>;

    async fn get_settlement(&self, date: NaiveDate) -> Result<Option<CycleSettlement>>;

    // ==================== Ledger ====================

    /// Active positions opened strictly before `cutoff`
    async fn active_positions_opened_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<LedgerPosition>>;

    /// Apply one payout in a single transaction: the principal update (when
    /// `auto_reinvest`) or the withdrawable-balance credit, together with the
    /// income audit entry. A crash or error must leave neither half applied,
    /// so a re-run of the cycle's distribution either skips or re-pays the
    /// position as a whole.
    async fn apply_payout(&self, entry: &IncomeEntry, auto_reinvest: bool) -> Result<()>;

    async fn get_balance(&self, owner_id: i64) -> Result<Decimal>;

    /// Position ids that already received an income entry for `date`
    async fn income_position_ids_for_date(&self, date: NaiveDate) -> Result<HashSet<i64>>;
}
