use axum::{
    routing::{get, patch, post},
    Router,
};

use crate::server::AppState;

use super::devices::{register_device, unregister_device};
use super::health::health;
use super::ingest::ingest_webhook;
use super::metrics::prometheus_metrics;
use super::notifications::{
    archive, batch_update, list_notifications, mark_read, mark_unread, unarchive,
};
use super::preferences::{get_preferences, update_preferences};
use super::sources::{
    create_source, delete_source, delete_token, list_sources, register_token, update_source,
};

pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Health & Metrics
        .route("/health", get(health))
        .route("/metrics", get(prometheus_metrics))
        // Webhook ingestion (token auth)
        .route("/ingest/{provider}", post(ingest_webhook))
        // User endpoints (JWT auth)
        .nest(
            "/api/v1",
            Router::new()
                // Sources
                .route("/sources", get(list_sources).post(create_source))
                .route("/sources/register-token", post(register_token))
                .route("/sources/delete-token", post(delete_token))
                .route("/sources/{id}", patch(update_source).delete(delete_source))
                // Inbox
                .route("/notifications", get(list_notifications))
                .route("/notifications/batch", post(batch_update))
                .route("/notifications/{id}/read", post(mark_read))
                .route("/notifications/{id}/unread", post(mark_unread))
                .route("/notifications/{id}/archive", post(archive))
                .route("/notifications/{id}/unarchive", post(unarchive))
                // Preferences
                .route("/preferences", get(get_preferences).patch(update_preferences))
                // Push devices
                .route("/push/register", post(register_device))
                .route("/push/unregister", post(unregister_device)),
        )
}
