//! Database initialization
//!
//! Creates the database on first run, applies connection settings and creates
//! every table idempotently. Safe to call on an existing database.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// How long a connection waits for the write lock before failing
const BUSY_TIMEOUT: Duration = Duration::from_millis(5000);

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Connection options apply to every pooled connection
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true)
        .busy_timeout(BUSY_TIMEOUT);

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_schema(&pool).await?;
    crate::settings::init_default_settings(&pool).await?;

    Ok(pool)
}

/// Create all tables and indexes (idempotent)
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_users_tables(pool).await?;
    create_user_accounts_table(pool).await?;
    create_periods_table(pool).await?;
    create_praise_table(pool).await?;
    create_quantifications_table(pool).await?;
    create_settings_tables(pool).await?;
    create_event_log_table(pool).await?;
    Ok(())
}

async fn create_users_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id BLOB PRIMARY KEY,
            username TEXT NOT NULL UNIQUE,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS user_roles (
            user_id BLOB NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            role TEXT NOT NULL CHECK (role IN ('USER', 'ADMIN', 'QUANTIFIER', 'FORWARDER')),
            PRIMARY KEY (user_id, role)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_user_accounts_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS user_accounts (
            id BLOB PRIMARY KEY,
            account_id TEXT NOT NULL,
            name TEXT NOT NULL,
            platform TEXT NOT NULL,
            user_id BLOB REFERENCES users(id) ON DELETE SET NULL,
            created_at INTEGER NOT NULL,
            UNIQUE (platform, account_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_user_accounts_user ON user_accounts(user_id)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_periods_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS periods (
            id BLOB PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            end_date INTEGER NOT NULL,
            status TEXT NOT NULL DEFAULT 'OPEN' CHECK (status IN ('OPEN', 'QUANTIFY', 'CLOSED')),
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_periods_end_date ON periods(end_date)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_praise_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS praise (
            id BLOB PRIMARY KEY,
            reason TEXT NOT NULL,
            giver_id BLOB NOT NULL REFERENCES user_accounts(id),
            receiver_id BLOB NOT NULL REFERENCES user_accounts(id),
            forwarder_id BLOB REFERENCES user_accounts(id),
            source_id TEXT NOT NULL DEFAULT '',
            source_name TEXT NOT NULL DEFAULT '',
            score REAL NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_praise_created_at ON praise(created_at)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_praise_receiver ON praise(receiver_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_praise_giver ON praise(giver_id)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_quantifications_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS quantifications (
            id BLOB PRIMARY KEY,
            praise_id BLOB NOT NULL REFERENCES praise(id) ON DELETE CASCADE,
            quantifier_id BLOB NOT NULL REFERENCES users(id),
            score INTEGER NOT NULL DEFAULT 0,
            score_realized REAL NOT NULL DEFAULT 0,
            dismissed BOOLEAN NOT NULL DEFAULT 0,
            duplicate_praise_id BLOB REFERENCES praise(id),
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            UNIQUE (praise_id, quantifier_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_quantifications_quantifier ON quantifications(quantifier_id)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_quantifications_duplicate ON quantifications(duplicate_praise_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_settings_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL DEFAULT '',
            type TEXT NOT NULL,
            label TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            period_overridable BOOLEAN NOT NULL DEFAULT 0,
            updated_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS period_settings (
            period_id BLOB NOT NULL REFERENCES periods(id) ON DELETE CASCADE,
            key TEXT NOT NULL REFERENCES settings(key),
            value TEXT NOT NULL DEFAULT '',
            updated_at INTEGER NOT NULL,
            PRIMARY KEY (period_id, key)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_event_log_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS event_log (
            id BLOB PRIMARY KEY,
            type_key TEXT NOT NULL,
            description TEXT NOT NULL,
            user_id BLOB,
            period_id BLOB,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_event_log_created_at ON event_log(created_at)")
        .execute(pool)
        .await?;

    Ok(())
}
