use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;
use std::collections::HashSet;
use tracing::{debug, info};

use crate::domain::{CycleSettlement, IncomeEntry, LedgerPosition, NewTradeEvent};
use crate::error::Result;
use crate::persistence::Store;

/// PostgreSQL storage adapter
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Create a new PostgreSQL store
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        info!("Connected to PostgreSQL");
        Ok(Self { pool })
    }

    /// Create a PostgreSQL store from an existing connection pool
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run migrations
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Database migrations completed");
        Ok(())
    }

    /// Get the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

}

#[async_trait]
impl Store for PostgresStore {
    async fn insert_trade(&self, event: &NewTradeEvent) -> Result<i64> {
        let row = sqlx::query(
            r#"
            INSERT INTO trade_events (
                symbol, exchange, direction, entry_price, exit_price,
                result_pct, result_usd, entry_time, exit_time
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id
            "#,
        )
        .bind(&event.symbol)
        .bind(&event.exchange)
        .bind(event.direction.as_str())
        .bind(event.entry_price)
        .bind(event.exit_price)
        .bind(event.result_pct)
        .bind(event.result_usd)
        .bind(event.entry_time)
        .bind(event.exit_time)
        .fetch_one(&self.pool)
        .await?;

        let id: i64 = row.get("id");
        debug!(
            "Inserted trade event {} ({} {} {:+.2}%)",
            id, event.symbol, event.direction, event.result_pct
        );
        Ok(id)
    }

    async fn sum_results_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<f64> {
        let row = sqlx::query(
            r#"
            SELECT COALESCE(SUM(result_pct), 0) AS total
            FROM trade_events
            WHERE created_at >= $1 AND created_at < $2
            "#,
        )
        .bind(start)
        .bind(end)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.get("total"))
    }

    async fn count_trades_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<i64> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS count
            FROM trade_events
            WHERE created_at >= $1 AND created_at < $2
            "#,
        )
        .bind(start)
        .bind(end)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.get("count"))
    }

    async fn try_insert_settlement(
        &self,
        date: NaiveDate,
        aggregate_pct: f64,
        events_count: i64,
    ) -> Result<bool> {
        // The UNIQUE constraint on date is the once-per-cycle guarantee;
        // concurrent finalizers race on this insert and exactly one wins.
        let result = sqlx::query(
            r#"
            INSERT INTO cycle_settlements (date, aggregate_pct, events_count)
            VALUES ($1, $2, $3)
            ON CONFLICT (date) DO NOTHING
            "#,
        )
        .bind(date)
        .bind(aggregate_pct)
        .bind(events_count)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn get_settlement(&self, date: NaiveDate) -> Result<Option<CycleSettlement>> {
        let row = sqlx::query(
            r#"
            SELECT id, date, aggregate_pct, events_count, created_at
            FROM cycle_settlements
            WHERE date = $1
            "#,
        )
        .bind(date)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| CycleSettlement {
            id: row.get("id"),
            date: row.get("date"),
            aggregate_pct: row.get("aggregate_pct"),
            events_count: row.get("events_count"),
            created_at: row.get("created_at"),
        }))
    }

    async fn active_positions_opened_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<LedgerPosition>> {
        let rows = sqlx::query(
            r#"
            SELECT id, owner_id, pool, principal, reinvested, auto_reinvest,
                   is_active, opened_at
            FROM ledger_positions
            WHERE is_active = TRUE AND opened_at < $1
            ORDER BY id
            "#,
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| LedgerPosition {
                id: row.get("id"),
                owner_id: row.get("owner_id"),
                pool: row.get("pool"),
                principal: row.get("principal"),
                reinvested: row.get("reinvested"),
                auto_reinvest: row.get("auto_reinvest"),
                is_active: row.get("is_active"),
                opened_at: row.get("opened_at"),
            })
            .collect())
    }

    async fn apply_payout(&self, entry: &IncomeEntry, auto_reinvest: bool) -> Result<()> {
        // One transaction so the ledger mutation and the income entry land
        // together. The income row doubles as the re-run skip marker, so a
        // credit without it would be paid twice on operator retry.
        let mut tx = self.pool.begin().await?;

        if auto_reinvest {
            sqlx::query(
                r#"
                UPDATE ledger_positions
                SET principal = principal + $2,
                    reinvested = reinvested + $2
                WHERE id = $1
                "#,
            )
            .bind(entry.position_id)
            .bind(entry.amount)
            .execute(&mut *tx)
            .await?;
        } else {
            sqlx::query(
                r#"
                INSERT INTO account_balances (owner_id, withdrawable)
                VALUES ($1, $2)
                ON CONFLICT (owner_id) DO UPDATE SET
                    withdrawable = account_balances.withdrawable + EXCLUDED.withdrawable
                "#,
            )
            .bind(entry.owner_id)
            .bind(entry.amount)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query(
            r#"
            INSERT INTO income_entries (position_id, owner_id, pool, amount, date)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(entry.position_id)
        .bind(entry.owner_id)
        .bind(&entry.pool)
        .bind(entry.amount)
        .bind(entry.date)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn get_balance(&self, owner_id: i64) -> Result<Decimal> {
        let row = sqlx::query(
            r#"
            SELECT withdrawable FROM account_balances WHERE owner_id = $1
            "#,
        )
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row
            .map(|row| row.get("withdrawable"))
            .unwrap_or(Decimal::ZERO))
    }

    async fn income_position_ids_for_date(&self, date: NaiveDate) -> Result<HashSet<i64>> {
        let rows = sqlx::query(
            r#"
            SELECT position_id FROM income_entries WHERE date = $1
            "#,
        )
        .bind(date)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(|row| row.get("position_id")).collect())
    }
}
