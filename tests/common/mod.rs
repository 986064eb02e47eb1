//! Shared in-memory fixtures for integration tests.
//!
//! Each test binary compiles its own copy and uses a different subset.
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use glidepath::adapters::Publisher;
use glidepath::domain::{
    CycleSettlement, IncomeEntry, LedgerPosition, NewTradeEvent, TradeEvent,
};
use glidepath::error::Result;
use glidepath::persistence::Store;
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// In-memory `Store` with the same uniqueness semantics as the Postgres
/// schema: one settlement per date, one income entry per position and date.
#[derive(Default)]
pub struct MemoryStore {
    trades: Mutex<Vec<TradeEvent>>,
    settlements: Mutex<HashMap<NaiveDate, CycleSettlement>>,
    positions: Mutex<Vec<LedgerPosition>>,
    balances: Mutex<HashMap<i64, Decimal>>,
    income: Mutex<Vec<IncomeEntry>>,
    next_id: AtomicU64,
    payout_failures: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_position(&self, position: LedgerPosition) {
        self.positions.lock().unwrap().push(position);
    }

    pub fn position(&self, id: i64) -> Option<LedgerPosition> {
        self.positions
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.id == id)
            .cloned()
    }

    pub fn income_entries(&self) -> Vec<IncomeEntry> {
        self.income.lock().unwrap().clone()
    }

    pub fn settlement_count(&self) -> usize {
        self.settlements.lock().unwrap().len()
    }

    pub fn trade_count(&self) -> usize {
        self.trades.lock().unwrap().len()
    }

    /// Insert a trade with an explicit creation time, for seeding past
    /// cycle windows.
    pub fn insert_trade_at(&self, result_pct: f64, created_at: DateTime<Utc>) {
        let id = self.alloc_id();
        self.trades.lock().unwrap().push(TradeEvent {
            id,
            symbol: "BTCUSDT".to_string(),
            exchange: "Binance".to_string(),
            direction: glidepath::Direction::Up,
            entry_price: Decimal::new(50_000, 0),
            exit_price: Decimal::new(50_500, 0),
            result_pct,
            result_usd: result_pct * 5.0,
            entry_time: created_at,
            exit_time: created_at,
            created_at,
        });
    }

    /// Make the next `n` payout applications fail before touching any state,
    /// simulating a storage transaction that rolled back.
    pub fn fail_next_payouts(&self, n: u64) {
        self.payout_failures.store(n, Ordering::SeqCst);
    }

    fn alloc_id(&self) -> i64 {
        (self.next_id.fetch_add(1, Ordering::SeqCst) + 1) as i64
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_trade(&self, event: &NewTradeEvent) -> Result<i64> {
        let id = self.alloc_id();
        self.trades.lock().unwrap().push(TradeEvent {
            id,
            symbol: event.symbol.clone(),
            exchange: event.exchange.clone(),
            direction: event.direction,
            entry_price: event.entry_price,
            exit_price: event.exit_price,
            result_pct: event.result_pct,
            result_usd: event.result_usd,
            entry_time: event.entry_time,
            exit_time: event.exit_time,
            created_at: Utc::now(),
        });
        Ok(id)
    }

    async fn sum_results_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<f64> {
        Ok(self
            .trades
            .lock()
            .unwrap()
            .iter()
            .filter(|t| t.created_at >= start && t.created_at < end)
            .map(|t| t.result_pct)
            .sum())
    }

    async fn count_trades_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<i64> {
        Ok(self
            .trades
            .lock()
            .unwrap()
            .iter()
            .filter(|t| t.created_at >= start && t.created_at < end)
            .count() as i64)
    }

    async fn try_insert_settlement(
        &self,
        date: NaiveDate,
        aggregate_pct: f64,
        events_count: i64,
    ) -> Result<bool> {
        let mut settlements = self.settlements.lock().unwrap();
        if settlements.contains_key(&date) {
            return Ok(false);
        }
        let id = self.alloc_id();
        settlements.insert(
            date,
            CycleSettlement {
                id,
                date,
                aggregate_pct,
                events_count,
                created_at: Utc::now(),
            },
        );
        Ok(true)
    }

    async fn get_settlement(&self, date: NaiveDate) -> Result<Option<CycleSettlement>> {
        Ok(self.settlements.lock().unwrap().get(&date).cloned())
    }

    async fn active_positions_opened_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<LedgerPosition>> {
        Ok(self
            .positions
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.is_active && p.opened_at < cutoff)
            .cloned()
            .collect())
    }

    async fn apply_payout(&self, entry: &IncomeEntry, auto_reinvest: bool) -> Result<()> {
        if self.payout_failures.load(Ordering::SeqCst) > 0 {
            self.payout_failures.fetch_sub(1, Ordering::SeqCst);
            return Err(glidepath::GlidepathError::Internal(
                "payout transaction rolled back".to_string(),
            ));
        }

        // Income entry first so a duplicate rejects before the ledger moves,
        // mirroring the UNIQUE(position_id, date) constraint.
        {
            let mut income = self.income.lock().unwrap();
            if income
                .iter()
                .any(|e| e.position_id == entry.position_id && e.date == entry.date)
            {
                return Err(glidepath::GlidepathError::Internal(
                    "duplicate income entry".to_string(),
                ));
            }
            income.push(entry.clone());
        }

        if auto_reinvest {
            let mut positions = self.positions.lock().unwrap();
            if let Some(p) = positions.iter_mut().find(|p| p.id == entry.position_id) {
                p.principal += entry.amount;
                p.reinvested += entry.amount;
            }
        } else {
            *self
                .balances
                .lock()
                .unwrap()
                .entry(entry.owner_id)
                .or_insert(Decimal::ZERO) += entry.amount;
        }
        Ok(())
    }

    async fn get_balance(&self, owner_id: i64) -> Result<Decimal> {
        Ok(self
            .balances
            .lock()
            .unwrap()
            .get(&owner_id)
            .copied()
            .unwrap_or(Decimal::ZERO))
    }

    async fn income_position_ids_for_date(&self, date: NaiveDate) -> Result<HashSet<i64>> {
        Ok(self
            .income
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.date == date)
            .map(|e| e.position_id)
            .collect())
    }
}

/// Publisher that only counts calls.
#[derive(Default)]
pub struct CountingPublisher {
    pub trades: AtomicU64,
    pub settlements: AtomicU64,
}

impl CountingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn settlement_count(&self) -> u64 {
        self.settlements.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Publisher for CountingPublisher {
    async fn publish_trade(&self, _event: &TradeEvent) -> Result<()> {
        self.trades.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn publish_settlement(&self, _date: NaiveDate, _aggregate_pct: f64) -> Result<()> {
        self.settlements.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Engine settings matching the shipped defaults.
pub fn engine_config() -> glidepath::EngineConfig {
    glidepath::EngineConfig {
        cutover_hour_utc: 15,
        target_min: 2.0,
        target_max: 5.0,
        correction_threshold_hours: 2.0,
        max_single_event_pct: 2.0,
        min_event_magnitude: 0.2,
        max_event_magnitude: 3.0,
        tolerance_pct: 1.0,
        match_retries: 30,
        min_delay_minutes: 30,
        max_delay_minutes: 90,
        idle_poll_minutes: 10,
        finalize_poll_seconds: 60,
        symbols: vec!["BTCUSDT".to_string(), "ETHUSDT".to_string()],
        exchanges: vec!["Binance".to_string()],
        notional_usd: 500.0,
    }
}

/// A position fixture opened well in the past.
pub fn position(id: i64, owner_id: i64, pool: &str, principal: Decimal, auto_reinvest: bool) -> LedgerPosition {
    LedgerPosition {
        id,
        owner_id,
        pool: pool.to_string(),
        principal,
        reinvested: Decimal::ZERO,
        auto_reinvest,
        is_active: true,
        opened_at: Utc::now() - chrono::Duration::days(30),
    }
}
