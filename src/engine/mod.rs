//! Engine core: the feedback controller, candidate search, generator loop,
//! cycle finalizer and settlement distributor.

pub mod controller;
pub mod distributor;
pub mod finalizer;
pub mod generator;
pub mod matcher;

pub use controller::{ControlMode, CycleStats, Decision, TargetController};
pub use distributor::YieldDistributor;
pub use finalizer::CycleFinalizer;
pub use generator::{GeneratorState, TickOutcome, TradeGenerator};
pub use matcher::{MatchRequest, MatchedTrade, TradeMatcher};
