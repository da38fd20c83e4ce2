//! Public webhook endpoint. Authenticated by the `token` query parameter only.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ingest::IngestError;
use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct IngestParams {
    pub token: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestResponse {
    pub notification_id: Uuid,
}

/// POST /ingest/{provider}?token=...
pub async fn ingest_webhook(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Query(params): Query<IngestParams>,
    body: Bytes,
) -> Result<(StatusCode, Json<IngestResponse>), IngestError> {
    let ingested = state
        .gateway
        .ingest(&provider, params.token.as_deref(), &body)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(IngestResponse {
            notification_id: ingested.notification_id,
        }),
    ))
}
