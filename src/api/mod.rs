//! API layer - HTTP endpoint handlers organized by domain.

mod devices;
mod health;
mod ingest;
mod metrics;
mod notifications;
mod preferences;
mod routes;
mod sources;

pub use health::{health, HealthResponse};
pub use ingest::{ingest_webhook, IngestResponse};
pub use metrics::prometheus_metrics;
pub use notifications::{BatchAction, BatchRequest, ListParams, NotificationListResponse};
pub use routes::api_routes;
