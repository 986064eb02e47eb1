//! Candidate search
//!
//! Bounded-retry rejection search over real historical price segments. The
//! matcher never fabricates a number: it keeps sampling entry/exit pairs
//! from fetched candles until one lands inside the requested tolerance, or
//! gives up after the retry budget.

use rand::Rng;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::collector::CandleSource;
use crate::config::EngineConfig;
use crate::domain::Direction;
use chrono::{DateTime, Utc};

const CANDLE_INTERVAL: &str = "15m";
const CANDLE_LIMIT: usize = 96;
const MIN_CANDLES: usize = 50;

/// What the controller asked the matcher to find
#[derive(Debug, Clone, Copy, Default)]
pub struct MatchRequest {
    /// Signed target; `None` accepts any qualifying magnitude
    pub target_pct: Option<f64>,
    /// Restrict the result's sign, if set
    pub required_direction: Option<Direction>,
}

/// An accepted entry/exit pair
#[derive(Debug, Clone)]
pub struct MatchedTrade {
    pub symbol: String,
    pub exchange: String,
    pub direction: Direction,
    pub entry_price: Decimal,
    pub exit_price: Decimal,
    /// Signed percentage, rounded to 2dp
    pub result_pct: f64,
    pub entry_time: DateTime<Utc>,
    pub exit_time: DateTime<Utc>,
}

/// Rejection-sampling matcher over a pool of candidate symbols
pub struct TradeMatcher<C: CandleSource> {
    source: C,
    cfg: EngineConfig,
    /// Most recently matched symbol, never repeated back-to-back
    last_symbol: Mutex<Option<String>>,
}

impl<C: CandleSource> TradeMatcher<C> {
    pub fn new(source: C, cfg: EngineConfig) -> Self {
        Self {
            source,
            cfg,
            last_symbol: Mutex::new(None),
        }
    }

    /// Search for a qualifying trade; `None` once the retry budget is
    /// exhausted. Fetch failures cost an attempt and move to the next
    /// symbol.
    pub async fn find<R: Rng + Send>(
        &self,
        request: &MatchRequest,
        rng: &mut R,
    ) -> Option<MatchedTrade> {
        for attempt in 0..self.cfg.match_retries {
            let (symbol, exchange) = self.pick_venue(rng).await;

            let candles = match self
                .source
                .fetch(&symbol, CANDLE_INTERVAL, CANDLE_LIMIT)
                .await
            {
                Ok(candles) => candles,
                Err(e) => {
                    warn!("Candle fetch failed for {}: {}", symbol, e);
                    continue;
                }
            };

            if candles.len() < MIN_CANDLES {
                debug!(
                    "Only {} candles for {}, need {}",
                    candles.len(),
                    symbol,
                    MIN_CANDLES
                );
                continue;
            }

            let entry_idx = rng.gen_range(5..=candles.len() - 20);
            let max_offset = 25.min(candles.len() - entry_idx - 1);
            let exit_idx = entry_idx + rng.gen_range(3..=max_offset.max(3));
            let exit_idx = exit_idx.min(candles.len() - 1);

            let entry = &candles[entry_idx];
            let exit = &candles[exit_idx];

            if entry.close.is_zero() {
                continue;
            }

            let raw_pct = ((exit.close - entry.close) / entry.close * Decimal::from(100))
                .to_f64()
                .unwrap_or(0.0);

            // Evaluate both framings of the same price move: an UP entry
            // keeps the raw sign, a DOWN entry inverts it.
            for direction in [Direction::Up, Direction::Down] {
                let pct = match direction {
                    Direction::Up => raw_pct,
                    Direction::Down => -raw_pct,
                };

                if !self.accepts(request, direction, pct) {
                    continue;
                }

                *self.last_symbol.lock().await = Some(symbol.clone());

                debug!(
                    "Matched {} {} {:+.2}% on attempt {}",
                    symbol,
                    direction,
                    pct,
                    attempt + 1
                );

                return Some(MatchedTrade {
                    symbol,
                    exchange,
                    direction,
                    entry_price: entry.close,
                    exit_price: exit.close,
                    result_pct: round2(pct),
                    entry_time: entry.time,
                    exit_time: exit.time,
                });
            }
        }

        debug!(
            "No candidate within tolerance after {} attempts (target {:?})",
            self.cfg.match_retries, request.target_pct
        );
        None
    }

    fn accepts(&self, request: &MatchRequest, direction: Direction, pct: f64) -> bool {
        let magnitude = pct.abs();
        if magnitude < self.cfg.min_event_magnitude || magnitude > self.cfg.max_event_magnitude {
            return false;
        }

        if let Some(required) = request.required_direction {
            if required != direction {
                return false;
            }
        }

        if let Some(target) = request.target_pct {
            if (pct - target).abs() > self.cfg.tolerance_pct {
                return false;
            }
        }

        true
    }

    async fn pick_venue<R: Rng>(&self, rng: &mut R) -> (String, String) {
        let last = self.last_symbol.lock().await.clone();

        let pool: Vec<&String> = self
            .cfg
            .symbols
            .iter()
            .filter(|s| Some(s.as_str()) != last.as_deref())
            .collect();

        let symbol = if pool.is_empty() {
            self.cfg.symbols[rng.gen_range(0..self.cfg.symbols.len())].clone()
        } else {
            pool[rng.gen_range(0..pool.len())].clone()
        };

        let exchange = self.cfg.exchanges[rng.gen_range(0..self.cfg.exchanges.len())].clone();

        (symbol, exchange)
    }
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
