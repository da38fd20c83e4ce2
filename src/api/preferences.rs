use axum::{extract::State, Json};

use crate::auth::AuthUser;
use crate::error::Result;
use crate::preferences::{PreferencesPatch, UserPreferences};
use crate::server::AppState;

/// GET /api/v1/preferences
pub async fn get_preferences(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<UserPreferences>> {
    Ok(Json(state.preferences.get(&user.user_id).await?))
}

/// PATCH /api/v1/preferences
pub async fn update_preferences(
    State(state): State<AppState>,
    user: AuthUser,
    Json(patch): Json<PreferencesPatch>,
) -> Result<Json<UserPreferences>> {
    Ok(Json(state.preferences.update(&user.user_id, &patch).await?))
}
