//! Shared fixtures for praise-api integration tests

#![allow(dead_code)]

use chrono::{DateTime, Duration, Utc};
use praise_api::auth::Caller;
use praise_api::db::praise::NewPraise;
use praise_api::db::{periods, praise, quantifications, users};
use praise_api::AppState;
use praise_common::db::{init_database, Period, PeriodStatus, Praise, Quantification, Role, User, UserAccount};
use praise_common::events::EventLog;
use praise_common::settings;
use sqlx::SqlitePool;
use tempfile::TempDir;
use uuid::Uuid;

pub struct TestEnv {
    // Keeps the database directory alive for the test's duration
    _dir: TempDir,
    pub pool: SqlitePool,
    pub state: AppState,
}

pub async fn setup() -> TestEnv {
    let dir = TempDir::new().unwrap();
    let pool = init_database(&dir.path().join("praise.db")).await.unwrap();
    let state = AppState::new(pool.clone(), EventLog::default());
    TestEnv {
        _dir: dir,
        pool,
        state,
    }
}

pub fn caller(user: &User) -> Caller {
    Caller::new(user.id, user.roles.clone())
}

pub async fn user(pool: &SqlitePool, username: &str, roles: &[Role]) -> User {
    let mut conn = pool.acquire().await.unwrap();
    let mut all = vec![Role::User];
    all.extend_from_slice(roles);
    users::insert_user(&mut conn, username, &all).await.unwrap()
}

pub async fn admin(pool: &SqlitePool) -> User {
    user(pool, "admin", &[Role::Admin]).await
}

pub async fn quantifier(pool: &SqlitePool, username: &str) -> User {
    user(pool, username, &[Role::Quantifier]).await
}

pub async fn account(pool: &SqlitePool, name: &str, user_id: Option<Uuid>) -> UserAccount {
    let mut conn = pool.acquire().await.unwrap();
    users::insert_account(&mut conn, &format!("discord-{}", name), name, "DISCORD", user_id)
        .await
        .unwrap()
}

pub async fn praise_at(
    pool: &SqlitePool,
    giver: &UserAccount,
    receiver: &UserAccount,
    created_at: DateTime<Utc>,
) -> Praise {
    let mut conn = pool.acquire().await.unwrap();
    let new = NewPraise {
        reason: format!("for helping {}", receiver.name),
        giver_id: giver.id,
        receiver_id: receiver.id,
        forwarder_id: None,
        source_id: "channel-1".to_string(),
        source_name: "general".to_string(),
        created_at,
    };
    praise::insert_praise(&mut conn, &new).await.unwrap()
}

/// A praise item created an hour ago
pub async fn recent_praise(pool: &SqlitePool, giver: &UserAccount, receiver: &UserAccount) -> Praise {
    praise_at(pool, giver, receiver, Utc::now() - Duration::hours(1)).await
}

/// OPEN period with copied settings
pub async fn period(pool: &SqlitePool, name: &str, end_date: DateTime<Utc>) -> Period {
    let mut conn = pool.acquire().await.unwrap();
    let period = periods::insert_period(&mut conn, name, end_date).await.unwrap();
    settings::copy_settings_to_period(&mut conn, period.id).await.unwrap();
    period
}

/// OPEN period ending tomorrow
pub async fn current_period(pool: &SqlitePool) -> Period {
    period(pool, "Current", Utc::now() + Duration::days(1)).await
}

pub async fn set_status(pool: &SqlitePool, period_id: Uuid, status: PeriodStatus) {
    let mut conn = pool.acquire().await.unwrap();
    periods::update_status(&mut conn, period_id, status).await.unwrap();
}

pub async fn set_period_setting(pool: &SqlitePool, period_id: Uuid, key: &str, value: &str) {
    let mut conn = pool.acquire().await.unwrap();
    settings::set_period_setting(&mut conn, period_id, key, value)
        .await
        .unwrap();
}

pub async fn assign(pool: &SqlitePool, praise_id: Uuid, quantifier_id: Uuid) {
    let mut conn = pool.acquire().await.unwrap();
    quantifications::insert_assignment(&mut conn, praise_id, quantifier_id)
        .await
        .unwrap();
}

pub async fn quantification(pool: &SqlitePool, praise_id: Uuid, quantifier_id: Uuid) -> Quantification {
    let mut conn = pool.acquire().await.unwrap();
    quantifications::find_by_praise_and_quantifier(&mut conn, praise_id, quantifier_id)
        .await
        .unwrap()
        .expect("quantification should exist")
}

pub async fn find_praise(pool: &SqlitePool, id: Uuid) -> Praise {
    let mut conn = pool.acquire().await.unwrap();
    praise::find_praise(&mut conn, id).await.unwrap().unwrap()
}

pub async fn find_period(pool: &SqlitePool, id: Uuid) -> Period {
    let mut conn = pool.acquire().await.unwrap();
    periods::find_period(&mut conn, id).await.unwrap().unwrap()
}

pub async fn event_count(pool: &SqlitePool, type_key: &str) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM event_log WHERE type_key = ?")
        .bind(type_key)
        .fetch_one(pool)
        .await
        .unwrap()
}
