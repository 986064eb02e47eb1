//! Cycle finalization
//!
//! Polls on a short interval and, once per cycle, turns the closed window's
//! events into an immutable settlement record. The once-per-cycle guarantee
//! is the storage-level uniqueness constraint on the settlement date: the
//! finalizer attempts an insert-if-absent and only the caller that wins the
//! insert runs distribution and publishing. A lost race is an expected
//! no-op, not an error, so overlapping finalizers (rolling restarts, admin
//! force-runs) are safe.

use chrono::{DateTime, NaiveDate, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

use crate::adapters::Publisher;
use crate::config::EngineConfig;
use crate::domain::CycleWindow;
use crate::engine::distributor::YieldDistributor;
use crate::engine::matcher::round2;
use crate::error::{GlidepathError, Result};
use crate::persistence::Store;
use crate::services::Metrics;

pub struct CycleFinalizer {
    store: Arc<dyn Store>,
    distributor: YieldDistributor,
    publisher: Arc<dyn Publisher>,
    metrics: Arc<Metrics>,
    cfg: EngineConfig,
}

impl CycleFinalizer {
    pub fn new(
        store: Arc<dyn Store>,
        distributor: YieldDistributor,
        publisher: Arc<dyn Publisher>,
        metrics: Arc<Metrics>,
        cfg: EngineConfig,
    ) -> Self {
        Self {
            store,
            distributor,
            publisher,
            metrics,
            cfg,
        }
    }

    /// One finalization attempt for the most recently completed window.
    /// Returns `true` iff this call created the settlement.
    pub async fn tick(&self, now: DateTime<Utc>) -> Result<bool> {
        let window = CycleWindow::last_closed(now, self.cfg.cutover_hour_utc);
        self.finalize_window(window, false).await
    }

    /// Administrative finalize for an explicit cycle date. The window must
    /// already be closed; the uniqueness guarantee applies unchanged. If the
    /// cycle is already finalized, distribution is re-run instead. Per-date
    /// income entries make that a per-position no-op, so this is the
    /// operator's recovery path for a cycle left finalized but undistributed.
    pub async fn finalize_date(&self, date: NaiveDate) -> Result<bool> {
        let window = CycleWindow::for_date(date, self.cfg.cutover_hour_utc);
        if !window.is_closed(Utc::now()) {
            return Err(GlidepathError::Validation(format!(
                "Cycle {} is still open",
                date
            )));
        }
        self.finalize_window(window, true).await
    }

    async fn finalize_window(
        &self,
        window: CycleWindow,
        redistribute_on_conflict: bool,
    ) -> Result<bool> {
        let aggregate = round2(
            self.store
                .sum_results_between(window.start, window.end)
                .await?,
        );
        let events_count = self
            .store
            .count_trades_between(window.start, window.end)
            .await?;

        let inserted = self
            .store
            .try_insert_settlement(window.date, aggregate, events_count)
            .await?;

        if !inserted {
            if redistribute_on_conflict {
                info!("Cycle {} already finalized, re-running distribution", window.date);
                let report = self
                    .distributor
                    .distribute(window.date, window.start)
                    .await?;
                info!(
                    "Re-distribution for {}: {} paid, {} already settled",
                    window.date, report.positions_paid, report.skipped_existing
                );
            } else {
                debug!("Cycle {} already finalized", window.date);
            }
            return Ok(false);
        }

        let status = if aggregate < self.cfg.target_min {
            "below range"
        } else if aggregate > self.cfg.target_max {
            "above range"
        } else {
            "in range"
        };
        info!(
            "Finalized cycle {}: {:+.2}% over {} events ({})",
            window.date, aggregate, events_count, status
        );
        self.metrics.record_finalize();

        // The settlement row is already durable. Downstream failures are
        // escalated for operator re-run, never unwound.
        if let Err(e) = self.distributor.distribute(window.date, window.start).await {
            error!(
                "Distribution failed for finalized cycle {}: {} (re-run with finalize --date {})",
                window.date, e, window.date
            );
        }

        if let Err(e) = self
            .publisher
            .publish_settlement(window.date, aggregate)
            .await
        {
            error!("Settlement publish failed for {}: {}", window.date, e);
            self.metrics.record_publish_failure();
        }

        Ok(true)
    }

    /// Main loop: short fixed poll, one failing tick never terminates it.
    pub async fn run(&self) {
        info!(
            "Cycle finalizer started (poll every {}s, cutover {:02}:00 UTC)",
            self.cfg.finalize_poll_seconds, self.cfg.cutover_hour_utc
        );

        let mut interval =
            tokio::time::interval(Duration::from_secs(self.cfg.finalize_poll_seconds));

        loop {
            interval.tick().await;

            if let Err(e) = self.tick(Utc::now()).await {
                error!("Finalizer tick failed: {}", e);
            }
        }
    }
}
