use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub engine: EngineConfig,
    /// Per-pool yield ranges and coefficients, keyed by pool name
    pub pools: HashMap<String, PoolConfig>,
    #[serde(default)]
    pub publisher: PublisherConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Health server port (default: 8080)
    #[serde(default)]
    pub health_port: Option<u16>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,
    /// Maximum connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

/// Tuning knobs for the generator, controller, matcher and finalizer.
///
/// The daily target range and the correction constants are operator policy,
/// not fixed contracts; everything here can be overridden per environment.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Hour (UTC) at which one trading cycle ends and the next begins
    #[serde(default = "default_cutover_hour")]
    pub cutover_hour_utc: u32,
    /// Daily cumulative yield target range, in percent
    pub target_min: f64,
    pub target_max: f64,
    /// Hours before cycle end where correction urgency doubles and event
    /// frequency compresses
    #[serde(default = "default_correction_threshold")]
    pub correction_threshold_hours: f64,
    /// Hard cap on the magnitude a single event may target, in percent
    #[serde(default = "default_max_single_event")]
    pub max_single_event_pct: f64,
    /// Accepted per-event magnitude bounds, in percent
    #[serde(default = "default_min_magnitude")]
    pub min_event_magnitude: f64,
    #[serde(default = "default_max_magnitude")]
    pub max_event_magnitude: f64,
    /// Tolerance around the requested target, in percent
    #[serde(default = "default_tolerance")]
    pub tolerance_pct: f64,
    /// Retry budget for the candidate search
    #[serde(default = "default_match_retries")]
    pub match_retries: u32,
    /// Base delay range between events, in minutes
    #[serde(default = "default_min_delay")]
    pub min_delay_minutes: u64,
    #[serde(default = "default_max_delay")]
    pub max_delay_minutes: u64,
    /// Poll interval while the cycle is closed, in minutes
    #[serde(default = "default_idle_poll")]
    pub idle_poll_minutes: u64,
    /// Finalizer poll interval, in seconds
    #[serde(default = "default_finalize_poll")]
    pub finalize_poll_seconds: u64,
    /// Candidate symbol pool (Binance spot symbols)
    #[serde(default = "default_symbols")]
    pub symbols: Vec<String>,
    /// Exchange labels attached to generated events
    #[serde(default = "default_exchanges")]
    pub exchanges: Vec<String>,
    /// Display notional used for the per-event USD result
    #[serde(default = "default_notional")]
    pub notional_usd: f64,
}

fn default_cutover_hour() -> u32 {
    15
}

fn default_correction_threshold() -> f64 {
    2.0
}

fn default_max_single_event() -> f64 {
    2.0
}

fn default_min_magnitude() -> f64 {
    0.2
}

fn default_max_magnitude() -> f64 {
    3.0
}

fn default_tolerance() -> f64 {
    1.0
}

fn default_match_retries() -> u32 {
    30
}

fn default_min_delay() -> u64 {
    30
}

fn default_max_delay() -> u64 {
    90
}

fn default_idle_poll() -> u64 {
    10
}

fn default_finalize_poll() -> u64 {
    60
}

fn default_notional() -> f64 {
    500.0
}

fn default_symbols() -> Vec<String> {
    [
        "BTCUSDT", "ETHUSDT", "SOLUSDT", "OPUSDT", "TONUSDT", "ARBUSDT", "MATICUSDT", "SUIUSDT",
        "AVAXUSDT", "APTUSDT", "INJUSDT", "LDOUSDT", "LINKUSDT", "RNDRUSDT", "TIAUSDT", "NEARUSDT",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_exchanges() -> Vec<String> {
    vec![
        "Binance".to_string(),
        "Bybit".to_string(),
        "OKX".to_string(),
    ]
}

impl EngineConfig {
    pub fn target_center(&self) -> f64 {
        (self.target_min + self.target_max) / 2.0
    }
}

/// Per-pool settlement configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PoolConfig {
    /// Daily yield range drawn per position, in percent
    pub yield_min: f64,
    pub yield_max: f64,
    /// Multiplier applied to the drawn yield (1.0 = unchanged)
    #[serde(default = "default_coefficient")]
    pub coefficient: Decimal,
}

fn default_coefficient() -> Decimal {
    Decimal::ONE
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct PublisherConfig {
    /// Webhook endpoint receiving trade and settlement announcements.
    /// Unset disables publishing.
    #[serde(default)]
    pub webhook_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Enable JSON formatted logs
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AppConfig {
    /// Load configuration from files and environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from a specific directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?
            .set_default("database.max_connections", 5)?
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Environment-specific config (e.g., config/production.toml)
            .add_source(
                File::from(config_dir.join(
                    std::env::var("GLIDEPATH_ENV").unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            // Override with environment variables (GLIDEPATH_DATABASE__URL, etc.)
            .add_source(
                Environment::with_prefix("GLIDEPATH")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        let e = &self.engine;

        if e.cutover_hour_utc > 23 {
            errors.push("cutover_hour_utc must be in 0..=23".to_string());
        }

        if e.target_min >= e.target_max {
            errors.push("target_min must be less than target_max".to_string());
        }

        if e.min_event_magnitude <= 0.0 || e.min_event_magnitude >= e.max_event_magnitude {
            errors.push("event magnitude bounds must satisfy 0 < min < max".to_string());
        }

        if e.max_single_event_pct > e.max_event_magnitude {
            errors.push(
                "max_single_event_pct must not exceed max_event_magnitude, or the matcher can never satisfy a clamped target".to_string(),
            );
        }

        if e.min_delay_minutes == 0 || e.min_delay_minutes > e.max_delay_minutes {
            errors.push("delay bounds must satisfy 0 < min <= max".to_string());
        }

        if e.symbols.len() < 2 {
            errors.push("at least two candidate symbols are required".to_string());
        }

        if self.pools.is_empty() {
            errors.push("at least one pool must be configured".to_string());
        }

        for (name, pool) in &self.pools {
            if pool.yield_min > pool.yield_max {
                errors.push(format!("pool {name}: yield_min must not exceed yield_max"));
            }
            if pool.coefficient <= Decimal::ZERO {
                errors.push(format!("pool {name}: coefficient must be positive"));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Live-editable pool configuration shared between the distributor and the
/// administrative surface. Operators adjust yield ranges without a restart;
/// the distributor reads a consistent snapshot per settlement.
#[derive(Clone)]
pub struct SharedPools {
    inner: Arc<RwLock<HashMap<String, PoolConfig>>>,
}

impl SharedPools {
    pub fn new(pools: HashMap<String, PoolConfig>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(pools)),
        }
    }

    /// Snapshot of the current pool table
    pub async fn snapshot(&self) -> HashMap<String, PoolConfig> {
        self.inner.read().await.clone()
    }

    /// Replace the whole pool table (administrative reload entry point)
    pub async fn reload(&self, pools: HashMap<String, PoolConfig>) {
        *self.inner.write().await = pools;
    }

    /// Update a single pool in place
    pub async fn set_pool(&self, name: &str, pool: PoolConfig) {
        self.inner.write().await.insert(name.to_string(), pool);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample_config() -> AppConfig {
        let mut pools = HashMap::new();
        pools.insert(
            "Basic".to_string(),
            PoolConfig {
                yield_min: 1.8,
                yield_max: 2.2,
                coefficient: Decimal::ONE,
            },
        );

        AppConfig {
            database: DatabaseConfig {
                url: "postgres://localhost/glidepath".to_string(),
                max_connections: 5,
            },
            engine: EngineConfig {
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
                symbols: default_symbols(),
                exchanges: default_exchanges(),
                notional_usd: 500.0,
            },
            pools,
            publisher: PublisherConfig::default(),
            logging: LoggingConfig::default(),
            health_port: Some(8080),
        }
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(sample_config().validate().is_ok());
    }

    #[test]
    fn test_inverted_target_range_rejected() {
        let mut cfg = sample_config();
        cfg.engine.target_min = 6.0;
        let errors = cfg.validate().unwrap_err();
        assert!(errors.iter().any(|e| e.contains("target_min")));
    }

    #[test]
    fn test_clamp_above_magnitude_rejected() {
        let mut cfg = sample_config();
        cfg.engine.max_single_event_pct = 5.0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_target_center() {
        let cfg = sample_config();
        assert_eq!(cfg.engine.target_center(), 3.5);
    }

    #[tokio::test]
    async fn test_shared_pools_reload() {
        let pools = SharedPools::new(HashMap::new());
        assert!(pools.snapshot().await.is_empty());

        pools
            .set_pool(
                "Alpha",
                PoolConfig {
                    yield_min: 3.5,
                    yield_max: 4.2,
                    coefficient: dec!(1.5),
                },
            )
            .await;

        let snap = pools.snapshot().await;
        assert_eq!(snap.len(), 1);
        assert_eq!(snap["Alpha"].coefficient, dec!(1.5));
    }
}
