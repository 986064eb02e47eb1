//! External system adapters: PostgreSQL storage and the webhook publisher.

mod postgres;
mod webhook;

pub use postgres::PostgresStore;
pub use webhook::{NoopPublisher, Publisher, WebhookPublisher};
