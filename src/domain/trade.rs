use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Direction of a generated trade event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    pub fn opposite(&self) -> Self {
        match self {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Up => "UP",
            Direction::Down => "DOWN",
        }
    }

}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One immutable synthetic trade event. Created by the generator loop,
/// only ever read in aggregate afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeEvent {
    pub id: i64,
    pub symbol: String,
    pub exchange: String,
    pub direction: Direction,
    pub entry_price: Decimal,
    pub exit_price: Decimal,
    /// Signed percentage result, rounded to 2 decimal places
    pub result_pct: f64,
    /// Display result against the configured notional
    pub result_usd: f64,
    pub entry_time: DateTime<Utc>,
    pub exit_time: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl TradeEvent {
    pub fn is_profitable(&self) -> bool {
        self.result_pct > 0.0
    }
}

/// Insert payload for a trade event; the store assigns id and created_at
#[derive(Debug, Clone)]
pub struct NewTradeEvent {
    pub symbol: String,
    pub exchange: String,
    pub direction: Direction,
    pub entry_price: Decimal,
    pub exit_price: Decimal,
    pub result_pct: f64,
    pub result_usd: f64,
    pub entry_time: DateTime<Utc>,
    pub exit_time: DateTime<Utc>,
}
