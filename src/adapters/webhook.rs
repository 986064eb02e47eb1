//! Webhook announcements
//!
//! Pushes generated trades and finalized settlements to a configured
//! webhook endpoint. Delivery is best-effort: a failed publish is logged
//! and never rolls back the record that triggered it.

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, error, info};

use crate::domain::TradeEvent;
use crate::error::{GlidepathError, Result};

/// Downstream announcement sink
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Announce one generated trade event
    async fn publish_trade(&self, event: &TradeEvent) -> Result<()>;

    /// Announce a finalized cycle, once per date
    async fn publish_settlement(&self, date: NaiveDate, aggregate_pct: f64) -> Result<()>;
}

#[derive(Serialize)]
struct WebhookMessage<'a> {
    kind: &'a str,
    text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pct: Option<f64>,
}

/// Publisher posting JSON messages to a webhook URL
#[derive(Clone)]
pub struct WebhookPublisher {
    client: Client,
    webhook_url: String,
}

impl WebhookPublisher {
    pub fn new(webhook_url: String) -> Self {
        info!("Webhook publishing enabled");
        Self {
            client: Client::new(),
            webhook_url,
        }
    }

    /// Create from the GLIDEPATH_WEBHOOK_URL environment variable
    pub fn from_env() -> Option<Self> {
        std::env::var("GLIDEPATH_WEBHOOK_URL")
            .ok()
            .map(Self::new)
    }

    async fn send(&self, message: &WebhookMessage<'_>) -> Result<()> {
        let resp = self
            .client
            .post(&self.webhook_url)
            .json(message)
            .send()
            .await?;

        if resp.status().is_success() {
            debug!("Webhook {} message sent", message.kind);
            Ok(())
        } else {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            error!("Webhook publish failed: {} - {}", status, body);
            Err(GlidepathError::Publish(format!("HTTP {status}: {body}")))
        }
    }
}

#[async_trait]
impl Publisher for WebhookPublisher {
    async fn publish_trade(&self, event: &TradeEvent) -> Result<()> {
        let emoji = if event.is_profitable() { "🟢" } else { "🔴" };
        let text = format!(
            "{} {} {} | entry {} exit {} | {:+.2}% (${:+.2})",
            emoji,
            event.symbol,
            event.direction,
            event.entry_price,
            event.exit_price,
            event.result_pct,
            event.result_usd,
        );

        self.send(&WebhookMessage {
            kind: "trade",
            text,
            date: None,
            pct: Some(event.result_pct),
        })
        .await
    }

    async fn publish_settlement(&self, date: NaiveDate, aggregate_pct: f64) -> Result<()> {
        let text = format!("📊 Daily result for {}: {:+.2}%", date, aggregate_pct);

        self.send(&WebhookMessage {
            kind: "settlement",
            text,
            date: Some(date),
            pct: Some(aggregate_pct),
        })
        .await
    }
}

/// Publisher that drops everything; used when no webhook is configured
#[derive(Default, Clone)]
pub struct NoopPublisher;

#[async_trait]
impl Publisher for NoopPublisher {
    async fn publish_trade(&self, _event: &TradeEvent) -> Result<()> {
        Ok(())
    }

    async fn publish_settlement(&self, _date: NaiveDate, _aggregate_pct: f64) -> Result<()> {
        Ok(())
    }
}
