//! Source management for the authenticated user.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;

use crate::auth::AuthUser;
use crate::error::Result;
use crate::server::AppState;
use crate::source::{
    CreateSourceRequest, CreatedSource, DeleteTokenRequest, RegisterTokenRequest, Source,
    SourcePatch, WebhookToken,
};

#[derive(Debug, Serialize)]
pub struct SourceListResponse {
    pub sources: Vec<Source>,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct DeleteTokenResponse {
    pub removed: usize,
}

/// GET /api/v1/sources
#[tracing::instrument(name = "http.list_sources", skip(state, user), fields(user_id = %user.user_id))]
pub async fn list_sources(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<SourceListResponse>> {
    let sources = state.sources.list(&user.user_id).await?;
    Ok(Json(SourceListResponse {
        total: sources.len(),
        sources,
    }))
}

/// POST /api/v1/sources
#[tracing::instrument(name = "http.create_source", skip(state, user, request), fields(user_id = %user.user_id))]
pub async fn create_source(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<CreateSourceRequest>,
) -> Result<(StatusCode, Json<CreatedSource>)> {
    let created = state.sources.create(&user.user_id, request).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// PATCH /api/v1/sources/{id}
#[tracing::instrument(name = "http.update_source", skip(state, user, patch), fields(user_id = %user.user_id))]
pub async fn update_source(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(patch): Json<SourcePatch>,
) -> Result<Json<Source>> {
    Ok(Json(state.sources.update(&user.user_id, &id, &patch).await?))
}

/// DELETE /api/v1/sources/{id}
#[tracing::instrument(name = "http.delete_source", skip(state, user), fields(user_id = %user.user_id))]
pub async fn delete_source(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    state.sources.delete(&user.user_id, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/sources/register-token
pub async fn register_token(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<RegisterTokenRequest>,
) -> Result<(StatusCode, Json<WebhookToken>)> {
    let mapping = state.sources.register_token(&user.user_id, request).await?;
    Ok((StatusCode::CREATED, Json(mapping)))
}

/// POST /api/v1/sources/delete-token
pub async fn delete_token(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<DeleteTokenRequest>,
) -> Result<Json<DeleteTokenResponse>> {
    let removed = state.sources.delete_token(&user.user_id, request).await?;
    Ok(Json(DeleteTokenResponse { removed }))
}
