//! User and role endpoints

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::{get, patch},
    Json, Router,
};
use praise_common::db::User;
use uuid::Uuid;

use crate::auth::Caller;
use crate::error::ApiResult;
use crate::services::users::{CreateUserInput, RoleChangeInput};
use crate::AppState;

/// POST /api/users
pub async fn create_user(
    State(state): State<AppState>,
    caller: Caller,
    payload: Result<Json<CreateUserInput>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<User>)> {
    let Json(input) = payload?;
    let user = state.services.users.create_user(&caller, &input).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// GET /api/users
pub async fn list_users(State(state): State<AppState>, caller: Caller) -> ApiResult<Json<Vec<User>>> {
    Ok(Json(state.services.users.find_all(&caller).await?))
}

/// GET /api/users/:id
pub async fn get_user(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<User>> {
    Ok(Json(state.services.users.find(&caller, id).await?))
}

/// PATCH /api/users/:id/addRole
pub async fn add_role(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
    payload: Result<Json<RoleChangeInput>, JsonRejection>,
) -> ApiResult<Json<User>> {
    let Json(input) = payload?;
    Ok(Json(state.services.users.add_role(&caller, id, input.role).await?))
}

/// PATCH /api/users/:id/removeRole
pub async fn remove_role(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
    payload: Result<Json<RoleChangeInput>, JsonRejection>,
) -> ApiResult<Json<User>> {
    let Json(input) = payload?;
    Ok(Json(state.services.users.remove_role(&caller, id, input.role).await?))
}

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/api/users", get(list_users).post(create_user))
        .route("/api/users/:id", get(get_user))
        .route("/api/users/:id/addRole", patch(add_role))
        .route("/api/users/:id/removeRole", patch(remove_role))
}
