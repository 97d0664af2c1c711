//! Period, praise listing and quantifier assignment endpoints

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::{get, patch},
    Json, Router,
};
use praise_common::db::{Period, Praise};
use uuid::Uuid;

use crate::auth::Caller;
use crate::db::praise::PraiseFilter;
use crate::error::ApiResult;
use crate::services::assignment::{PoolRequirement, ReplaceQuantifierInput, ReplaceQuantifierResult};
use crate::services::periods::{CreatePeriodInput, PeriodDetails, UpdatePeriodInput};
use crate::AppState;

/// POST /api/periods
pub async fn create_period(
    State(state): State<AppState>,
    caller: Caller,
    payload: Result<Json<CreatePeriodInput>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Period>)> {
    let Json(input) = payload?;
    let period = state.services.periods.create(&caller, &input).await?;
    Ok((StatusCode::CREATED, Json(period)))
}

/// GET /api/periods
pub async fn list_periods(State(state): State<AppState>, caller: Caller) -> ApiResult<Json<Vec<Period>>> {
    Ok(Json(state.services.periods.find_all(&caller).await?))
}

/// GET /api/periods/:id
pub async fn get_period(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<PeriodDetails>> {
    Ok(Json(state.services.periods.details(&caller, id).await?))
}

/// PATCH /api/periods/:id
pub async fn update_period(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
    payload: Result<Json<UpdatePeriodInput>, JsonRejection>,
) -> ApiResult<Json<Period>> {
    let Json(input) = payload?;
    Ok(Json(state.services.periods.update(&caller, id, &input).await?))
}

/// PATCH /api/periods/:id/close
pub async fn close_period(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Period>> {
    Ok(Json(state.services.periods.close(&caller, id).await?))
}

/// GET /api/periods/:id/praise
pub async fn period_praise(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<Praise>>> {
    Ok(Json(
        state.services.periods.praise(&caller, id, PraiseFilter::All).await?,
    ))
}

/// GET /api/periods/:id/praise/receiver/:account_id
pub async fn receiver_praise(
    State(state): State<AppState>,
    caller: Caller,
    Path((id, account_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<Vec<Praise>>> {
    Ok(Json(
        state
            .services
            .periods
            .praise(&caller, id, PraiseFilter::Receiver(account_id))
            .await?,
    ))
}

/// GET /api/periods/:id/praise/giver/:account_id
pub async fn giver_praise(
    State(state): State<AppState>,
    caller: Caller,
    Path((id, account_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<Vec<Praise>>> {
    Ok(Json(
        state
            .services
            .periods
            .praise(&caller, id, PraiseFilter::Giver(account_id))
            .await?,
    ))
}

/// GET /api/periods/:id/praise/quantifier/:user_id
pub async fn quantifier_praise(
    State(state): State<AppState>,
    caller: Caller,
    Path((id, user_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<Vec<Praise>>> {
    Ok(Json(
        state
            .services
            .periods
            .praise(&caller, id, PraiseFilter::Quantifier(user_id))
            .await?,
    ))
}

/// GET /api/periods/:id/verifyQuantifierPoolSize
pub async fn verify_quantifier_pool_size(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<PoolRequirement>> {
    Ok(Json(
        state
            .services
            .assignment
            .verify_quantifier_pool_size(&caller, id)
            .await?,
    ))
}

/// PATCH /api/periods/:id/assignQuantifiers
pub async fn assign_quantifiers(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<PeriodDetails>> {
    Ok(Json(
        state.services.assignment.assign_quantifiers(&caller, id).await?,
    ))
}

/// PATCH /api/periods/:id/replaceQuantifier
pub async fn replace_quantifier(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
    payload: Result<Json<ReplaceQuantifierInput>, JsonRejection>,
) -> ApiResult<Json<ReplaceQuantifierResult>> {
    let Json(input) = payload?;
    Ok(Json(
        state
            .services
            .assignment
            .replace_quantifier(&caller, id, &input)
            .await?,
    ))
}

pub fn period_routes() -> Router<AppState> {
    Router::new()
        .route("/api/periods", get(list_periods).post(create_period))
        .route("/api/periods/:id", get(get_period).patch(update_period))
        .route("/api/periods/:id/close", patch(close_period))
        .route("/api/periods/:id/praise", get(period_praise))
        .route("/api/periods/:id/praise/receiver/:account_id", get(receiver_praise))
        .route("/api/periods/:id/praise/giver/:account_id", get(giver_praise))
        .route("/api/periods/:id/praise/quantifier/:user_id", get(quantifier_praise))
        .route(
            "/api/periods/:id/verifyQuantifierPoolSize",
            get(verify_quantifier_pool_size),
        )
        .route("/api/periods/:id/assignQuantifiers", patch(assign_quantifiers))
        .route("/api/periods/:id/replaceQuantifier", patch(replace_quantifier))
}
