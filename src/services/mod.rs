pub mod admin;
pub mod health;
pub mod metrics;

pub use admin::AdminApi;
pub use health::{HealthServer, HealthState, HealthStatus};
pub use metrics::Metrics;
