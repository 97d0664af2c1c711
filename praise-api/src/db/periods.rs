//! Period persistence and the praise → period date join

use chrono::{DateTime, Utc};
use praise_common::db::{Period, PeriodStatus};
use praise_common::time::{now, to_millis};
use praise_common::{Error, Result};
use sqlx::SqliteConnection;
use uuid::Uuid;

pub async fn insert_period(
    conn: &mut SqliteConnection,
    name: &str,
    end_date: DateTime<Utc>,
) -> Result<Period> {
    let id = Uuid::new_v4();
    let ts = to_millis(now());
    sqlx::query(
        r#"
        INSERT INTO periods (id, name, end_date, status, created_at, updated_at)
        VALUES (?, ?, ?, 'OPEN', ?, ?)
        "#,
    )
    .bind(id)
    .bind(name)
    .bind(to_millis(end_date))
    .bind(ts)
    .bind(ts)
    .execute(&mut *conn)
    .await?;

    find_period(conn, id)
        .await?
        .ok_or_else(|| Error::Internal("Inserted period vanished".to_string()))
}

pub async fn find_period(conn: &mut SqliteConnection, id: Uuid) -> Result<Option<Period>> {
    let row = sqlx::query("SELECT * FROM periods WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    row.as_ref().map(Period::from_row).transpose()
}

pub async fn find_period_by_name(conn: &mut SqliteConnection, name: &str) -> Result<Option<Period>> {
    let row = sqlx::query("SELECT * FROM periods WHERE name = ?")
        .bind(name)
        .fetch_optional(&mut *conn)
        .await?;
    row.as_ref().map(Period::from_row).transpose()
}

/// All periods, latest end date first
pub async fn find_all_periods(conn: &mut SqliteConnection) -> Result<Vec<Period>> {
    let rows = sqlx::query("SELECT * FROM periods ORDER BY end_date DESC")
        .fetch_all(&mut *conn)
        .await?;
    rows.iter().map(Period::from_row).collect()
}

pub async fn latest_period(conn: &mut SqliteConnection) -> Result<Option<Period>> {
    let row = sqlx::query("SELECT * FROM periods ORDER BY end_date DESC LIMIT 1")
        .fetch_optional(&mut *conn)
        .await?;
    row.as_ref().map(Period::from_row).transpose()
}

/// The period ending closest before `end_date`
pub async fn previous_period(
    conn: &mut SqliteConnection,
    end_date: DateTime<Utc>,
) -> Result<Option<Period>> {
    let row = sqlx::query("SELECT * FROM periods WHERE end_date < ? ORDER BY end_date DESC LIMIT 1")
        .bind(to_millis(end_date))
        .fetch_optional(&mut *conn)
        .await?;
    row.as_ref().map(Period::from_row).transpose()
}

/// The period ending closest after `end_date`
pub async fn next_period(
    conn: &mut SqliteConnection,
    end_date: DateTime<Utc>,
) -> Result<Option<Period>> {
    let row = sqlx::query("SELECT * FROM periods WHERE end_date > ? ORDER BY end_date ASC LIMIT 1")
        .bind(to_millis(end_date))
        .fetch_optional(&mut *conn)
        .await?;
    row.as_ref().map(Period::from_row).transpose()
}

/// Period a praise item belongs to: the earliest-ending period whose end
/// date is at or after the praise creation time
pub async fn period_for_date(
    conn: &mut SqliteConnection,
    created_at: DateTime<Utc>,
) -> Result<Option<Period>> {
    let row = sqlx::query(
        "SELECT * FROM periods WHERE end_date >= ? ORDER BY end_date ASC LIMIT 1",
    )
    .bind(to_millis(created_at))
    .fetch_optional(&mut *conn)
    .await?;
    row.as_ref().map(Period::from_row).transpose()
}

/// Praise creation window of a period as `(exclusive start, inclusive end)`
/// in stored milliseconds
pub async fn date_range(conn: &mut SqliteConnection, period: &Period) -> Result<(i64, i64)> {
    let start = previous_period(conn, period.end_date)
        .await?
        .map(|p| to_millis(p.end_date))
        .unwrap_or(i64::MIN);
    Ok((start, to_millis(period.end_date)))
}

pub async fn update_status(
    conn: &mut SqliteConnection,
    id: Uuid,
    status: PeriodStatus,
) -> Result<()> {
    sqlx::query("UPDATE periods SET status = ?, updated_at = ? WHERE id = ?")
        .bind(status.as_str())
        .bind(to_millis(now()))
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub async fn update_name(conn: &mut SqliteConnection, id: Uuid, name: &str) -> Result<()> {
    sqlx::query("UPDATE periods SET name = ?, updated_at = ? WHERE id = ?")
        .bind(name)
        .bind(to_millis(now()))
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub async fn update_end_date(
    conn: &mut SqliteConnection,
    id: Uuid,
    end_date: DateTime<Utc>,
) -> Result<()> {
    sqlx::query("UPDATE periods SET end_date = ?, updated_at = ? WHERE id = ?")
        .bind(to_millis(end_date))
        .bind(to_millis(now()))
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}
