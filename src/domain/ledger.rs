use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// An open investment position in the ledger.
///
/// The distributor is the only part of this crate that mutates positions;
/// opening and closing them belongs to the external account workflows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerPosition {
    pub id: i64,
    pub owner_id: i64,
    pub pool: String,
    pub principal: Decimal,
    /// Running total of yield folded back into the principal
    pub reinvested: Decimal,
    pub auto_reinvest: bool,
    pub is_active: bool,
    pub opened_at: DateTime<Utc>,
}

/// Append-only audit record of one per-position payout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncomeEntry {
    pub position_id: i64,
    pub owner_id: i64,
    pub pool: String,
    pub amount: Decimal,
    pub date: NaiveDate,
}

/// Summary returned by a distribution run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DistributionReport {
    pub date: Option<NaiveDate>,
    pub positions_paid: usize,
    /// Positions skipped because an income entry for the date already existed
    pub skipped_existing: usize,
    /// Positions skipped because their pool has no configuration
    pub skipped_unconfigured: usize,
    pub total_distributed: Decimal,
}
