//! Settlement distribution
//!
//! Applies a finalized cycle to the ledger: every active position opened
//! before the cycle's window start receives a payout drawn from its pool's
//! configured yield range, either reinvested into the principal or credited
//! to the owner's withdrawable balance. Each payout leaves an append-only
//! income entry; positions that already hold one for the date are skipped,
//! which makes operator-triggered re-runs safe.

use chrono::{DateTime, NaiveDate, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::SharedPools;
use crate::domain::{DistributionReport, IncomeEntry};
use crate::error::Result;
use crate::persistence::Store;

pub struct YieldDistributor {
    store: Arc<dyn Store>,
    pools: SharedPools,
}

impl YieldDistributor {
    pub fn new(store: Arc<dyn Store>, pools: SharedPools) -> Self {
        Self { store, pools }
    }

    /// Distribute the cycle dated `date` whose window starts at
    /// `window_start`.
    pub async fn distribute(
        &self,
        date: NaiveDate,
        window_start: DateTime<Utc>,
    ) -> Result<DistributionReport> {
        let mut rng = StdRng::from_entropy();
        self.distribute_with_rng(date, window_start, &mut rng).await
    }

    /// Deterministic variant used by tests
    pub async fn distribute_with_rng<R: Rng + Send>(
        &self,
        date: NaiveDate,
        window_start: DateTime<Utc>,
        rng: &mut R,
    ) -> Result<DistributionReport> {
        let pools = self.pools.snapshot().await;
        let positions = self
            .store
            .active_positions_opened_before(window_start)
            .await?;
        let already_paid = self.store.income_position_ids_for_date(date).await?;

        let mut report = DistributionReport {
            date: Some(date),
            ..Default::default()
        };

        for position in positions {
            if already_paid.contains(&position.id) {
                report.skipped_existing += 1;
                continue;
            }

            let pool = match pools.get(&position.pool) {
                Some(pool) => pool,
                None => {
                    warn!(
                        "Position {} references unconfigured pool {}, skipping",
                        position.id, position.pool
                    );
                    report.skipped_unconfigured += 1;
                    continue;
                }
            };

            let base_pct: f64 = rng.gen_range(pool.yield_min..=pool.yield_max);
            let final_pct = (Decimal::try_from(base_pct).unwrap_or(Decimal::ZERO)
                * pool.coefficient)
                .round_dp(2);
            let amount = (position.principal * final_pct / Decimal::ONE_HUNDRED).round_dp(4);

            let entry = IncomeEntry {
                position_id: position.id,
                owner_id: position.owner_id,
                pool: position.pool.clone(),
                amount,
                date,
            };
            self.store.apply_payout(&entry, position.auto_reinvest).await?;

            report.positions_paid += 1;
            report.total_distributed += amount;
        }

        info!(
            "Distribution for {}: {} positions paid, {} already settled, total ${}",
            date, report.positions_paid, report.skipped_existing, report.total_distributed
        );

        Ok(report)
    }
}
