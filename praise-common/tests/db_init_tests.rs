//! Tests for database initialization
//!
//! - Automatic database creation with default schema
//! - Idempotent re-open of an existing database
//! - Default settings initialization

use praise_common::db::init::init_database;
use tempfile::TempDir;

#[tokio::test]
async fn test_database_creation_when_missing() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("nested").join("praise.db");

    let result = init_database(&db_path).await;

    assert!(result.is_ok(), "Database initialization failed: {:?}", result.err());
    assert!(db_path.exists(), "Database file was not created");
}

#[tokio::test]
async fn test_database_opens_existing() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("praise.db");

    let pool1 = init_database(&db_path).await;
    assert!(pool1.is_ok());

    let pool2 = init_database(&db_path).await;
    assert!(pool2.is_ok(), "Failed to open existing database: {:?}", pool2.err());
}

#[tokio::test]
async fn test_all_tables_created() {
    let dir = TempDir::new().unwrap();
    let pool = init_database(&dir.path().join("praise.db")).await.unwrap();

    for table in [
        "users",
        "user_roles",
        "user_accounts",
        "periods",
        "praise",
        "quantifications",
        "settings",
        "period_settings",
        "event_log",
    ] {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
        )
        .bind(table)
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(count, 1, "table {} missing", table);
    }
}

#[tokio::test]
async fn test_default_settings_initialized() {
    let dir = TempDir::new().unwrap();
    let pool = init_database(&dir.path().join("praise.db")).await.unwrap();

    let allowed: Option<String> = sqlx::query_scalar(
        "SELECT value FROM settings WHERE key = 'PRAISE_QUANTIFY_ALLOWED_VALUES'",
    )
    .fetch_optional(&pool)
    .await
    .unwrap();
    assert_eq!(allowed.as_deref(), Some("0, 1, 3, 5, 8, 13, 21, 34, 55, 89, 144"));

    let percentage: Option<String> = sqlx::query_scalar(
        "SELECT value FROM settings WHERE key = 'PRAISE_QUANTIFY_DUPLICATE_PRAISE_PERCENTAGE'",
    )
    .fetch_optional(&pool)
    .await
    .unwrap();
    assert_eq!(percentage.as_deref(), Some("0.1"));
}

#[tokio::test]
async fn test_reinit_keeps_changed_settings() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("praise.db");
    let pool = init_database(&db_path).await.unwrap();

    sqlx::query("UPDATE settings SET value = '5' WHERE key = 'PRAISE_QUANTIFIERS_PER_PRAISE_RECEIVER'")
        .execute(&pool)
        .await
        .unwrap();
    pool.close().await;

    let pool = init_database(&db_path).await.unwrap();
    let value: String = sqlx::query_scalar(
        "SELECT value FROM settings WHERE key = 'PRAISE_QUANTIFIERS_PER_PRAISE_RECEIVER'",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(value, "5");
}

#[tokio::test]
async fn test_foreign_keys_enforced() {
    let dir = TempDir::new().unwrap();
    let pool = init_database(&dir.path().join("praise.db")).await.unwrap();

    let result = sqlx::query(
        "INSERT INTO user_roles (user_id, role) VALUES (x'00000000000000000000000000000001', 'ADMIN')",
    )
    .execute(&pool)
    .await;
    assert!(result.is_err(), "role for unknown user should be rejected");
}
