//! Health check HTTP server for 24/7 production monitoring
//!
//! Provides liveness and readiness probes for process supervision
//! and a Prometheus metrics endpoint.

use crate::services::Metrics;
use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

/// Health status for a component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthStatus::Healthy)
    }
}

/// Component health check result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub name: String,
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_check: Option<DateTime<Utc>>,
}

/// Overall system health response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub timestamp: DateTime<Utc>,
    pub uptime_seconds: u64,
    pub components: Vec<ComponentHealth>,
    pub generator_state: String,
}

/// Shared state for health server
pub struct HealthState {
    /// When the server started
    pub started_at: DateTime<Utc>,
    /// Is database connected
    pub db_connected: AtomicBool,
    /// Last database check timestamp
    pub last_db_check: RwLock<Option<DateTime<Utc>>>,
    /// Current generator state ("active" or "idle")
    pub generator_state: RwLock<String>,
    /// Metrics reference
    pub metrics: Option<Arc<Metrics>>,
    /// How long the generator may go without producing an event while
    /// active before the component is reported degraded, in seconds
    pub event_staleness_threshold: i64,
}

impl HealthState {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            db_connected: AtomicBool::new(false),
            last_db_check: RwLock::new(None),
            generator_state: RwLock::new("idle".to_string()),
            metrics: None,
            // Long enough to cover the widest scheduling delay plus one retry
            event_staleness_threshold: 2 * 3600,
        }
    }

    pub fn with_metrics(mut self, m: Arc<Metrics>) -> Self {
        self.metrics = Some(m);
        self
    }

    /// Record database check
    pub async fn record_db_check(&self, success: bool) {
        *self.last_db_check.write().await = Some(Utc::now());
        self.db_connected.store(success, Ordering::SeqCst);
    }

    /// Update generator state
    pub async fn set_generator_state(&self, state: &str) {
        *self.generator_state.write().await = state.to_string();
    }

    /// Check whether the generator has gone quiet while active
    pub async fn is_generator_stale(&self) -> bool {
        if self.generator_state.read().await.as_str() != "active" {
            return false;
        }
        match self.metrics.as_ref().and_then(|m| m.seconds_since_last_event()) {
            Some(elapsed) => elapsed > self.event_staleness_threshold,
            // No event yet; give the process its full startup grace
            None => {
                let since_start = (Utc::now() - self.started_at).num_seconds();
                since_start > self.event_staleness_threshold
            }
        }
    }

    /// Get overall health status
    pub async fn get_health(&self) -> HealthResponse {
        let mut components = Vec::new();
        let mut overall_status = HealthStatus::Healthy;

        // Database health
        let db_connected = self.db_connected.load(Ordering::SeqCst);
        let db_status = if db_connected {
            HealthStatus::Healthy
        } else {
            HealthStatus::Unhealthy
        };
        if db_status == HealthStatus::Unhealthy {
            overall_status = HealthStatus::Unhealthy;
        }
        components.push(ComponentHealth {
            name: "database".to_string(),
            status: db_status,
            message: if !db_connected {
                Some("Disconnected".to_string())
            } else {
                None
            },
            last_check: *self.last_db_check.read().await,
        });

        // Generator health
        let generator_state = self.generator_state.read().await.clone();
        let stale = self.is_generator_stale().await;
        let gen_status = if stale {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };
        if gen_status == HealthStatus::Degraded && overall_status == HealthStatus::Healthy {
            overall_status = HealthStatus::Degraded;
        }
        components.push(ComponentHealth {
            name: "generator".to_string(),
            status: gen_status,
            message: if stale {
                Some("No events produced within staleness threshold".to_string())
            } else {
                Some(generator_state.clone())
            },
            last_check: Some(Utc::now()),
        });

        let uptime = (Utc::now() - self.started_at).num_seconds() as u64;

        HealthResponse {
            status: overall_status,
            timestamp: Utc::now(),
            uptime_seconds: uptime,
            components,
            generator_state,
        }
    }
}

impl Default for HealthState {
    fn default() -> Self {
        Self::new()
    }
}

/// Health check server
pub struct HealthServer {
    state: Arc<HealthState>,
    port: u16,
}

impl HealthServer {
    pub fn new(state: Arc<HealthState>, port: u16) -> Self {
        Self { state, port }
    }

    /// Start the health server
    pub async fn run(&self) -> crate::Result<()> {
        let state = Arc::clone(&self.state);

        let app = Router::new()
            .route("/health", get(health_handler))
            .route("/healthz", get(liveness_handler))
            .route("/readyz", get(readiness_handler))
            .route("/metrics", get(metrics_handler))
            .with_state(state);

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        info!("Starting health server on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app)
            .await
            .map_err(|e| crate::GlidepathError::Internal(format!("Health server error: {}", e)))?;

        Ok(())
    }

    /// Get shared state for updating from other components
    pub fn state(&self) -> Arc<HealthState> {
        Arc::clone(&self.state)
    }
}

/// Full health check endpoint
async fn health_handler(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    let health = state.get_health().await;
    let status_code = match health.status {
        HealthStatus::Healthy => StatusCode::OK,
        HealthStatus::Degraded => StatusCode::OK, // Still return 200 for degraded
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status_code, Json(health))
}

/// Kubernetes liveness probe - is the process alive?
async fn liveness_handler() -> impl IntoResponse {
    StatusCode::OK
}

/// Kubernetes readiness probe - can the service do useful work?
async fn readiness_handler(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    let health = state.get_health().await;
    match health.status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    }
}

/// Prometheus metrics endpoint
async fn metrics_handler(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    let health = state.get_health().await;
    let db_connected = if state.db_connected.load(Ordering::SeqCst) {
        1
    } else {
        0
    };
    let health_status = match health.status {
        HealthStatus::Healthy => 1,
        HealthStatus::Degraded => 0,
        HealthStatus::Unhealthy => -1,
    };

    let mut body = format!(
        r#"# HELP glidepath_up Health status (1=healthy, 0=degraded, -1=unhealthy)
# TYPE glidepath_up gauge
glidepath_up {}

# HELP glidepath_uptime_seconds Uptime in seconds
# TYPE glidepath_uptime_seconds counter
glidepath_uptime_seconds {}

# HELP glidepath_database_connected Database connection status
# TYPE glidepath_database_connected gauge
glidepath_database_connected {}

"#,
        health_status, health.uptime_seconds, db_connected,
    );
    if let Some(ref m) = state.metrics {
        body.push_str(&m.prometheus());
    }

    (
        StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; charset=utf-8",
        )],
        body,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_health_state_new() {
        let state = HealthState::new();
        assert!(!state.db_connected.load(Ordering::SeqCst));
        assert_eq!(state.generator_state.read().await.as_str(), "idle");
    }

    #[tokio::test]
    async fn test_unhealthy_without_database() {
        let state = HealthState::new();
        let health = state.get_health().await;
        assert_eq!(health.status, HealthStatus::Unhealthy);
    }

    #[tokio::test]
    async fn test_healthy_with_database() {
        let state = HealthState::new();
        state.record_db_check(true).await;
        let health = state.get_health().await;
        assert_eq!(health.status, HealthStatus::Healthy);
        assert!(health.components.iter().any(|c| c.name == "database"));
    }

    #[tokio::test]
    async fn test_idle_generator_never_stale() {
        let state = HealthState::new().with_metrics(Arc::new(Metrics::new()));
        assert!(!state.is_generator_stale().await);
    }

    #[tokio::test]
    async fn test_active_generator_fresh_after_event() {
        let metrics = Arc::new(Metrics::new());
        metrics.record_event();
        let state = HealthState::new().with_metrics(Arc::clone(&metrics));
        state.set_generator_state("active").await;
        assert!(!state.is_generator_stale().await);
    }
}
