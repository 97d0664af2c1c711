//! Audit event endpoints: paged history and a live SSE stream

use axum::{
    extract::{Query, State},
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Json, Router,
};
use futures::stream::{Stream, StreamExt};
use praise_common::events::EventLogEntry;
use serde::Deserialize;
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, warn};

use crate::auth::{Caller, Permission};
use crate::error::ApiResult;
use crate::AppState;

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 500;

#[derive(Debug, Deserialize)]
pub struct EventLogQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// GET /api/eventlogs
pub async fn list_event_logs(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<EventLogQuery>,
) -> ApiResult<Json<Vec<EventLogEntry>>> {
    caller.require(Permission::EventLogView)?;

    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let offset = query.offset.unwrap_or(0).max(0);

    let mut conn = state.db.acquire().await?;
    Ok(Json(state.events.find_recent(&mut conn, limit, offset).await?))
}

/// GET /api/events - SSE stream of audit events as they are committed
pub async fn event_stream(
    State(state): State<AppState>,
    caller: Caller,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    caller.require(Permission::EventLogView)?;
    debug!(user_id = %caller.user_id, "New SSE client connected");

    let stream = BroadcastStream::new(state.events.subscribe()).filter_map(|result| async move {
        match result {
            Ok(entry) => match serde_json::to_string(&entry) {
                Ok(json) => Some(Ok(Event::default().event(entry.type_key.as_str()).data(json))),
                Err(e) => {
                    warn!("Failed to serialize event: {}", e);
                    None
                }
            },
            Err(e) => {
                // Lagged subscriber
                warn!("SSE stream error: {:?}", e);
                None
            }
        }
    });

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    ))
}

pub fn event_routes() -> Router<AppState> {
    Router::new()
        .route("/api/eventlogs", get(list_event_logs))
        .route("/api/events", get(event_stream))
}
