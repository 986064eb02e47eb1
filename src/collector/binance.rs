//! Binance K-line (candlestick) REST API client
//!
//! Fetches bounded historical candle segments for the candidate search.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
#[cfg(test)]
use mockall::automock;
use rust_decimal::Decimal;
use std::time::Duration;
use tracing::debug;

use crate::error::{GlidepathError, Result};

const BINANCE_API_URL: &str = "https://api.binance.com";

/// Timeout for a single candle fetch. A stalled upstream call must never
/// stall the generator loop.
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// A single candle
#[derive(Debug, Clone)]
pub struct Candle {
    pub time: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
}

/// Source of historical candle segments
#[cfg_attr(test, automock)]
#[async_trait]
pub trait CandleSource: Send + Sync {
    /// Fetch up to `limit` candles for `symbol` at the given interval
    /// ("1m", "15m", "1h", ...). Ordered oldest-first.
    async fn fetch(&self, symbol: &str, interval: &str, limit: usize) -> Result<Vec<Candle>>;
}

/// Binance spot K-line client
pub struct BinanceCandles {
    client: reqwest::Client,
    base_url: String,
}

impl BinanceCandles {
    pub fn new() -> Self {
        Self::with_base_url(BINANCE_API_URL)
    }

    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.to_string(),
        }
    }

    fn parse_row(row: &[serde_json::Value]) -> Option<Candle> {
        if row.len() < 7 {
            return None;
        }

        Some(Candle {
            time: DateTime::from_timestamp_millis(row[0].as_i64()?)?,
            open: row[1].as_str()?.parse().ok()?,
            high: row[2].as_str()?.parse().ok()?,
            low: row[3].as_str()?.parse().ok()?,
            close: row[4].as_str()?.parse().ok()?,
        })
    }
}

impl Default for BinanceCandles {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CandleSource for BinanceCandles {
    async fn fetch(&self, symbol: &str, interval: &str, limit: usize) -> Result<Vec<Candle>> {
        let url = format!(
            "{}/api/v3/klines?symbol={}&interval={}&limit={}",
            self.base_url,
            symbol,
            interval,
            limit.min(1000)
        );

        debug!("Fetching K-lines: {}", url);

        let response = self
            .client
            .get(&url)
            .timeout(FETCH_TIMEOUT)
            .send()
            .await
            .map_err(|e| {
                GlidepathError::MarketDataUnavailable(format!("K-line request failed: {}", e))
            })?;

        if !response.status().is_success() {
            return Err(GlidepathError::MarketDataUnavailable(format!(
                "K-line API error: {}",
                response.status()
            )));
        }

        let data: Vec<Vec<serde_json::Value>> = response.json().await.map_err(|e| {
            GlidepathError::InvalidMarketData(format!("K-line parse error: {}", e))
        })?;

        let candles: Vec<Candle> = data.iter().filter_map(|row| Self::parse_row(row)).collect();

        debug!("Fetched {} K-lines for {}", candles.len(), symbol);
        Ok(candles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_row() {
        let row = vec![
            json!(1718035200000i64),
            json!("65000.10"),
            json!("65400.00"),
            json!("64800.50"),
            json!("65250.00"),
            json!("123.4"),
            json!(1718036099999i64),
        ];

        let candle = BinanceCandles::parse_row(&row).unwrap();
        assert_eq!(candle.open, "65000.10".parse::<Decimal>().unwrap());
        assert_eq!(candle.close, "65250.00".parse::<Decimal>().unwrap());
    }

    #[test]
    fn test_parse_row_rejects_short_rows() {
        let row = vec![json!(1718035200000i64), json!("65000.10")];
        assert!(BinanceCandles::parse_row(&row).is_none());
    }

    #[test]
    fn test_parse_row_rejects_non_string_prices() {
        let row = vec![
            json!(1718035200000i64),
            json!(65000.10),
            json!("65400.00"),
            json!("64800.50"),
            json!("65250.00"),
            json!("123.4"),
            json!(1718036099999i64),
        ];
        assert!(BinanceCandles::parse_row(&row).is_none());
    }
}
