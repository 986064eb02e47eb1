pub mod adapters;
pub mod collector;
pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod persistence;
pub mod services;
pub mod supervisor;

pub use adapters::{NoopPublisher, PostgresStore, Publisher, WebhookPublisher};
pub use collector::{BinanceCandles, Candle, CandleSource};
pub use config::{AppConfig, EngineConfig, PoolConfig, SharedPools};
pub use domain::{
    CycleProgress, CycleSettlement, CycleWindow, Direction, IncomeEntry, LedgerPosition,
    TradeEvent,
};
pub use engine::{
    CycleFinalizer, TargetController, TickOutcome, TradeGenerator, TradeMatcher, YieldDistributor,
};
pub use error::{GlidepathError, Result};
pub use persistence::Store;
pub use services::{AdminApi, HealthServer, HealthState, Metrics};
pub use supervisor::{spawn_supervised, SupervisorConfig};
