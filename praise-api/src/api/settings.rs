//! Global and period settings endpoints

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    routing::{get, patch},
    Json, Router,
};
use praise_common::settings::{PeriodSetting, Setting};
use uuid::Uuid;

use crate::auth::Caller;
use crate::error::ApiResult;
use crate::services::settings::SetValueInput;
use crate::AppState;

/// GET /api/settings
pub async fn list_settings(State(state): State<AppState>, caller: Caller) -> ApiResult<Json<Vec<Setting>>> {
    Ok(Json(state.services.settings.find_all(&caller).await?))
}

/// PATCH /api/settings/:key
pub async fn set_setting(
    State(state): State<AppState>,
    caller: Caller,
    Path(key): Path<String>,
    payload: Result<Json<SetValueInput>, JsonRejection>,
) -> ApiResult<Json<Setting>> {
    let Json(input) = payload?;
    Ok(Json(
        state.services.settings.set(&caller, &key, &input.value).await?,
    ))
}

/// GET /api/periods/:id/settings
pub async fn list_period_settings(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<PeriodSetting>>> {
    Ok(Json(state.services.settings.find_for_period(&caller, id).await?))
}

/// PATCH /api/periods/:id/settings/:key
pub async fn set_period_setting(
    State(state): State<AppState>,
    caller: Caller,
    Path((id, key)): Path<(Uuid, String)>,
    payload: Result<Json<SetValueInput>, JsonRejection>,
) -> ApiResult<Json<PeriodSetting>> {
    let Json(input) = payload?;
    Ok(Json(
        state
            .services
            .settings
            .set_for_period(&caller, id, &key, &input.value)
            .await?,
    ))
}

pub fn settings_routes() -> Router<AppState> {
    Router::new()
        .route("/api/settings", get(list_settings))
        .route("/api/settings/:key", patch(set_setting))
        .route("/api/periods/:id/settings", get(list_period_settings))
        .route("/api/periods/:id/settings/:key", patch(set_period_setting))
}
