//! Operator-facing one-shot actions, backing the CLI subcommands.

use crate::adapters::Publisher;
use crate::collector::CandleSource;
use crate::domain::CycleProgress;
use crate::engine::{CycleFinalizer, TickOutcome, TradeGenerator};
use crate::error::{GlidepathError, Result};
use crate::persistence::Store;
use chrono::{NaiveDate, Utc};
use std::sync::Arc;
use tracing::info;

pub struct AdminApi<C: CandleSource> {
    generator: Arc<TradeGenerator<C>>,
    finalizer: Arc<CycleFinalizer>,
    store: Arc<dyn Store>,
    publisher: Arc<dyn Publisher>,
}

impl<C: CandleSource> AdminApi<C> {
    pub fn new(
        generator: Arc<TradeGenerator<C>>,
        finalizer: Arc<CycleFinalizer>,
        store: Arc<dyn Store>,
        publisher: Arc<dyn Publisher>,
    ) -> Self {
        Self {
            generator,
            finalizer,
            store,
            publisher,
        }
    }

    /// Generate a single trade event immediately, ignoring the scheduler.
    pub async fn force_generate(&self) -> Result<TickOutcome> {
        let outcome = self.generator.tick().await?;
        match &outcome {
            TickOutcome::Generated(id) => info!("Forced generation produced event #{}", id),
            TickOutcome::NoCandidate => info!("Forced generation found no acceptable candidate"),
            TickOutcome::Closed => info!("Current cycle is closed, nothing generated"),
        }
        Ok(outcome)
    }

    /// Finalize a closed cycle. With no date, finalizes the most recently
    /// closed window, same as one scheduler pass.
    pub async fn force_finalize(&self, date: Option<NaiveDate>) -> Result<bool> {
        match date {
            Some(d) => self.finalizer.finalize_date(d).await,
            None => self.finalizer.tick(Utc::now()).await,
        }
    }

    /// Snapshot of the running cycle.
    pub async fn progress(&self) -> Result<CycleProgress> {
        self.generator.progress().await
    }

    /// Re-send the settlement notification for a finalized cycle. An explicit
    /// percentage overrides the stored aggregate.
    pub async fn republish_settlement(&self, date: NaiveDate, pct: Option<f64>) -> Result<f64> {
        let aggregate = match pct {
            Some(p) => p,
            None => self
                .store
                .get_settlement(date)
                .await?
                .ok_or(GlidepathError::SettlementNotFound(date))?
                .aggregate_pct,
        };
        self.publisher.publish_settlement(date, aggregate).await?;
        info!("Republished settlement for {}: {:+.2}%", date, aggregate);
        Ok(aggregate)
    }
}
