//! praise-api library
//!
//! Quantification service for community praise: periods, quantifier
//! assignment, scoring, and the HTTP API in front of them.

use axum::Router;
use chrono::{DateTime, Utc};
use praise_common::events::EventLog;
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod auth;
pub mod db;
pub mod error;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use services::{
    AssignmentService, PeriodService, PraiseService, QuantificationService, SettingsService,
    UserService,
};

/// Services wired together at startup
pub struct Services {
    pub users: UserService,
    pub praise: PraiseService,
    pub periods: PeriodService,
    pub quantification: QuantificationService,
    pub assignment: AssignmentService,
    pub settings: SettingsService,
}

impl Services {
    pub fn new(db: &SqlitePool, events: &EventLog) -> Self {
        Self {
            users: UserService::new(db.clone(), events.clone()),
            praise: PraiseService::new(db.clone(), events.clone()),
            periods: PeriodService::new(db.clone(), events.clone()),
            quantification: QuantificationService::new(db.clone(), events.clone()),
            assignment: AssignmentService::new(db.clone(), events.clone()),
            settings: SettingsService::new(db.clone(), events.clone()),
        }
    }
}

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Audit log and live event broadcaster
    pub events: EventLog,
    pub services: Arc<Services>,
    /// Service startup timestamp for uptime reporting
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(db: SqlitePool, events: EventLog) -> Self {
        let services = Arc::new(Services::new(&db, &events));
        Self {
            db,
            events,
            services,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health_routes())
        .merge(api::user_routes())
        .merge(api::praise_routes())
        .merge(api::period_routes())
        .merge(api::settings_routes())
        .merge(api::event_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
