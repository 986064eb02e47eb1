//! Event generator loop
//!
//! Long-running task that steers the day's cumulative result toward the
//! target range: read progress from the store, ask the controller for a
//! target, ask the matcher for a real price pair, persist, sleep. The
//! cumulative sum is re-derived from persisted events on every tick, so a
//! crashed or restarted generator resumes exactly where the store says the
//! day is.

use chrono::Utc;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::adapters::Publisher;
use crate::collector::CandleSource;
use crate::config::EngineConfig;
use crate::domain::{CycleProgress, CycleWindow, NewTradeEvent, TradeEvent};
use crate::engine::controller::{CycleStats, Decision, TargetController};
use crate::engine::matcher::{round2, MatchRequest, TradeMatcher};
use crate::error::Result;
use crate::persistence::Store;
use crate::services::Metrics;

/// Loop state, surfaced through the health endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorState {
    /// Cycle open, generating events
    Active,
    /// Cycle closed, waiting for the next window
    Idle,
}

impl GeneratorState {
    pub fn as_str(&self) -> &'static str {
        match self {
            GeneratorState::Active => "active",
            GeneratorState::Idle => "idle",
        }
    }
}

/// Result of one generator tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// An event was persisted
    Generated(i64),
    /// Search exhausted its retry budget; nothing persisted
    NoCandidate,
    /// The cycle is closed
    Closed,
}

/// Sleep after a tick that found no candidate or errored
const RETRY_DELAY: Duration = Duration::from_secs(5 * 60);

pub struct TradeGenerator<C: CandleSource> {
    store: Arc<dyn Store>,
    matcher: TradeMatcher<C>,
    controller: TargetController,
    publisher: Arc<dyn Publisher>,
    metrics: Arc<Metrics>,
    cfg: EngineConfig,
    state: RwLock<GeneratorState>,
}

impl<C: CandleSource> TradeGenerator<C> {
    pub fn new(
        store: Arc<dyn Store>,
        matcher: TradeMatcher<C>,
        controller: TargetController,
        publisher: Arc<dyn Publisher>,
        metrics: Arc<Metrics>,
        cfg: EngineConfig,
    ) -> Self {
        Self {
            store,
            matcher,
            controller,
            publisher,
            metrics,
            cfg,
            state: RwLock::new(GeneratorState::Idle),
        }
    }

    pub async fn state(&self) -> GeneratorState {
        *self.state.read().await
    }

    /// Progress of the currently open cycle, re-derived from the store
    pub async fn progress(&self) -> Result<CycleProgress> {
        let now = Utc::now();
        let window = CycleWindow::containing(now, self.cfg.cutover_hour_utc);
        let stats = self.cycle_stats(&window).await?;

        Ok(CycleProgress {
            date: window.date,
            cumulative_pct: round2(stats.cumulative_pct),
            events_count: stats.events_count,
            hours_remaining: stats.hours_remaining,
            is_active: stats.is_active(),
        })
    }

    async fn cycle_stats(&self, window: &CycleWindow) -> Result<CycleStats> {
        let now = Utc::now();
        let upper = window.end.min(now);

        Ok(CycleStats {
            cumulative_pct: self.store.sum_results_between(window.start, upper).await?,
            events_count: self.store.count_trades_between(window.start, upper).await?,
            hours_remaining: window.hours_remaining(now),
        })
    }

    /// One generation attempt. Also the administrative force entry point;
    /// safe to call concurrently with the scheduled loop.
    pub async fn tick(&self) -> Result<TickOutcome> {
        let now = Utc::now();
        let window = CycleWindow::containing(now, self.cfg.cutover_hour_utc);
        let stats = self.cycle_stats(&window).await?;

        let mut rng = StdRng::from_entropy();

        let target = match self.controller.decide(&stats, &mut rng) {
            Decision::Closed => {
                *self.state.write().await = GeneratorState::Idle;
                return Ok(TickOutcome::Closed);
            }
            Decision::Seek { target_pct, mode } => {
                *self.state.write().await = GeneratorState::Active;
                info!(
                    "Cycle {}: {:.2}% over {} events, {:.1}h left, {} target {:+.2}%",
                    window.date,
                    stats.cumulative_pct,
                    stats.events_count,
                    stats.hours_remaining,
                    mode.as_str(),
                    target_pct
                );
                target_pct
            }
        };

        let request = MatchRequest {
            target_pct: Some(target),
            required_direction: None,
        };

        let matched = match self.matcher.find(&request, &mut rng).await {
            Some(m) => m,
            None => {
                warn!(
                    "No candidate for cycle {} (target {:+.2}%), skipping tick",
                    window.date, target
                );
                self.metrics.record_skip();
                return Ok(TickOutcome::NoCandidate);
            }
        };

        let event = NewTradeEvent {
            symbol: matched.symbol,
            exchange: matched.exchange,
            direction: matched.direction,
            entry_price: matched.entry_price,
            exit_price: matched.exit_price,
            result_pct: matched.result_pct,
            result_usd: round2(matched.result_pct / 100.0 * self.cfg.notional_usd),
            entry_time: matched.entry_time,
            exit_time: matched.exit_time,
        };

        let id = self.store.insert_trade(&event).await?;
        self.metrics.record_event();

        let new_total = stats.cumulative_pct + event.result_pct;
        info!(
            "Event #{} | {} {} {:+.2}% | cycle total {:.2}%",
            id, event.symbol, event.direction, event.result_pct, new_total
        );

        let persisted = TradeEvent {
            id,
            symbol: event.symbol,
            exchange: event.exchange,
            direction: event.direction,
            entry_price: event.entry_price,
            exit_price: event.exit_price,
            result_pct: event.result_pct,
            result_usd: event.result_usd,
            entry_time: event.entry_time,
            exit_time: event.exit_time,
            created_at: now,
        };

        if let Err(e) = self.publisher.publish_trade(&persisted).await {
            // Announcement is best-effort; the event is already durable.
            error!("Trade publish failed for event #{}: {}", id, e);
            self.metrics.record_publish_failure();
        }

        Ok(TickOutcome::Generated(id))
    }

    /// Main loop. One failing tick never terminates the loop.
    pub async fn run(&self) {
        info!("Trade generator started");

        loop {
            match self.tick().await {
                Ok(TickOutcome::Generated(_)) => {
                    let delay = self.next_delay().await;
                    debug!("Next event in {} minutes", delay.as_secs() / 60);
                    tokio::time::sleep(delay).await;
                }
                Ok(TickOutcome::NoCandidate) => {
                    tokio::time::sleep(RETRY_DELAY).await;
                }
                Ok(TickOutcome::Closed) => {
                    debug!("Cycle closed, generator idle");
                    tokio::time::sleep(Duration::from_secs(self.cfg.idle_poll_minutes * 60))
                        .await;
                }
                Err(e) => {
                    error!("Generator tick failed: {}", e);
                    tokio::time::sleep(RETRY_DELAY).await;
                }
            }
        }
    }

    async fn next_delay(&self) -> Duration {
        let now = Utc::now();
        let window = CycleWindow::containing(now, self.cfg.cutover_hour_utc);

        match self.cycle_stats(&window).await {
            Ok(stats) => {
                let mut rng = StdRng::from_entropy();
                self.controller.delay(&stats, &mut rng)
            }
            Err(e) => {
                warn!("Falling back to retry delay, stats unavailable: {}", e);
                RETRY_DELAY
            }
        }
    }
}
