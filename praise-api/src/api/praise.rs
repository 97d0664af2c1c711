//! Praise, user account and quantification endpoints

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use praise_common::db::{Period, Praise, UserAccount};
use uuid::Uuid;

use crate::auth::Caller;
use crate::error::ApiResult;
use crate::services::praise::{CreateAccountInput, CreatePraiseInput};
use crate::services::quantify::{QuantifyInput, QuantifyMultipleInput};
use crate::AppState;

/// POST /api/accounts
pub async fn create_account(
    State(state): State<AppState>,
    caller: Caller,
    payload: Result<Json<CreateAccountInput>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<UserAccount>)> {
    let Json(input) = payload?;
    let account = state.services.praise.create_account(&caller, &input).await?;
    Ok((StatusCode::CREATED, Json(account)))
}

/// POST /api/praise
pub async fn create_praise(
    State(state): State<AppState>,
    caller: Caller,
    payload: Result<Json<CreatePraiseInput>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Praise>)> {
    let Json(input) = payload?;
    let praise = state.services.praise.create_praise(&caller, &input).await?;
    Ok((StatusCode::CREATED, Json(praise)))
}

/// GET /api/praise/:id
pub async fn get_praise(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Praise>> {
    Ok(Json(state.services.praise.find(&caller, id).await?))
}

/// PATCH /api/praise/:id/quantify
///
/// Returns every praise item whose score changed.
pub async fn quantify(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
    payload: Result<Json<QuantifyInput>, JsonRejection>,
) -> ApiResult<Json<Vec<Praise>>> {
    let Json(input) = payload?;
    Ok(Json(
        state.services.quantification.quantify(&caller, id, &input).await?,
    ))
}

/// GET /api/praise/:id/period
pub async fn praise_period(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Option<Period>>> {
    Ok(Json(
        state.services.periods.period_for_praise(&caller, id).await?,
    ))
}

/// PATCH /api/praise/quantify
pub async fn quantify_multiple(
    State(state): State<AppState>,
    caller: Caller,
    payload: Result<Json<QuantifyMultipleInput>, JsonRejection>,
) -> ApiResult<Json<Vec<Praise>>> {
    let Json(input) = payload?;
    Ok(Json(
        state
            .services
            .quantification
            .quantify_multiple(&caller, &input)
            .await?,
    ))
}

pub fn praise_routes() -> Router<AppState> {
    Router::new()
        .route("/api/accounts", post(create_account))
        .route("/api/praise", post(create_praise))
        .route("/api/praise/quantify", patch(quantify_multiple))
        .route("/api/praise/:id", get(get_praise))
        .route("/api/praise/:id/period", get(praise_period))
        .route("/api/praise/:id/quantify", patch(quantify))
}
