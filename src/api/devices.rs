//! Push device registration.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::auth::AuthUser;
use crate::error::{AppError, Result};
use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct DeviceTokenRequest {
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterDeviceResponse {
    /// False when the token was already registered
    pub registered: bool,
}

#[derive(Debug, Serialize)]
pub struct UnregisterDeviceResponse {
    pub removed: bool,
}

fn device_token(request: &DeviceTokenRequest) -> Result<&str> {
    let token = request.token.trim();
    if token.is_empty() {
        return Err(AppError::Validation("Device token must not be empty".to_string()));
    }
    Ok(token)
}

/// POST /api/v1/push/register
#[tracing::instrument(name = "http.register_device", skip(state, user, request), fields(user_id = %user.user_id))]
pub async fn register_device(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<DeviceTokenRequest>,
) -> Result<Json<RegisterDeviceResponse>> {
    let registered = state
        .store
        .add_device_token(&user.user_id, device_token(&request)?)
        .await?;
    Ok(Json(RegisterDeviceResponse { registered }))
}

/// POST /api/v1/push/unregister
#[tracing::instrument(name = "http.unregister_device", skip(state, user, request), fields(user_id = %user.user_id))]
pub async fn unregister_device(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<DeviceTokenRequest>,
) -> Result<Json<UnregisterDeviceResponse>> {
    let removed = state
        .store
        .remove_device_token(&user.user_id, device_token(&request)?)
        .await?;
    Ok(Json(UnregisterDeviceResponse { removed }))
}
