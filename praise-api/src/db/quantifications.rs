//! Quantifications: one quantifier's judgment on one praise item

use praise_common::db::Quantification;
use praise_common::time::{now, to_millis};
use praise_common::Result;
use serde::Serialize;
use sqlx::SqliteConnection;
use uuid::Uuid;

/// Per-quantifier progress within a period
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuantifierProgress {
    pub quantifier_id: Uuid,
    pub username: String,
    pub assigned: i64,
    pub finished: i64,
}

pub async fn find_for_praise(conn: &mut SqliteConnection, praise_id: Uuid) -> Result<Vec<Quantification>> {
    let rows = sqlx::query("SELECT * FROM quantifications WHERE praise_id = ? ORDER BY created_at, rowid")
        .bind(praise_id)
        .fetch_all(&mut *conn)
        .await?;
    rows.iter().map(Quantification::from_row).collect()
}

pub async fn find_by_praise_and_quantifier(
    conn: &mut SqliteConnection,
    praise_id: Uuid,
    quantifier_id: Uuid,
) -> Result<Option<Quantification>> {
    let row = sqlx::query("SELECT * FROM quantifications WHERE praise_id = ? AND quantifier_id = ?")
        .bind(praise_id)
        .bind(quantifier_id)
        .fetch_optional(&mut *conn)
        .await?;
    row.as_ref().map(Quantification::from_row).transpose()
}

/// Quantifications by `quantifier_id` that mark some praise as a duplicate of `original_id`
pub async fn find_duplicates_of(
    conn: &mut SqliteConnection,
    original_id: Uuid,
    quantifier_id: Uuid,
) -> Result<Vec<Quantification>> {
    let rows = sqlx::query(
        "SELECT * FROM quantifications WHERE duplicate_praise_id = ? AND quantifier_id = ? ORDER BY created_at, rowid",
    )
    .bind(original_id)
    .bind(quantifier_id)
    .fetch_all(&mut *conn)
    .await?;
    rows.iter().map(Quantification::from_row).collect()
}

/// Store a quantifier's judgment; the realized score is recomputed separately
pub async fn update_judgment(
    conn: &mut SqliteConnection,
    id: Uuid,
    score: i64,
    dismissed: bool,
    duplicate_praise_id: Option<Uuid>,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE quantifications
        SET score = ?, dismissed = ?, duplicate_praise_id = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(score)
    .bind(dismissed)
    .bind(duplicate_praise_id)
    .bind(to_millis(now()))
    .bind(id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn update_realized(conn: &mut SqliteConnection, id: Uuid, score_realized: f64) -> Result<()> {
    sqlx::query("UPDATE quantifications SET score_realized = ? WHERE id = ?")
        .bind(score_realized)
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Create an empty (pending) quantification assigning `quantifier_id` to the praise
pub async fn insert_assignment(
    conn: &mut SqliteConnection,
    praise_id: Uuid,
    quantifier_id: Uuid,
) -> Result<Uuid> {
    let id = Uuid::new_v4();
    let ts = to_millis(now());
    sqlx::query(
        r#"
        INSERT INTO quantifications (id, praise_id, quantifier_id, score, score_realized, dismissed,
                                     duplicate_praise_id, created_at, updated_at)
        VALUES (?, ?, ?, 0, 0, 0, NULL, ?, ?)
        "#,
    )
    .bind(id)
    .bind(praise_id)
    .bind(quantifier_id)
    .bind(ts)
    .bind(ts)
    .execute(&mut *conn)
    .await?;
    Ok(id)
}

/// Pending quantifications of one quantifier on praise created in `(start, end]`
pub async fn pending_for_quantifier_in_range(
    conn: &mut SqliteConnection,
    quantifier_id: Uuid,
    start: i64,
    end: i64,
) -> Result<Vec<Quantification>> {
    let rows = sqlx::query(
        r#"
        SELECT q.* FROM quantifications q
        JOIN praise p ON p.id = q.praise_id
        WHERE q.quantifier_id = ? AND p.created_at > ? AND p.created_at <= ?
          AND q.score = 0 AND q.dismissed = 0 AND q.duplicate_praise_id IS NULL
        ORDER BY p.created_at, p.id
        "#,
    )
    .bind(quantifier_id)
    .bind(start)
    .bind(end)
    .fetch_all(&mut *conn)
    .await?;
    rows.iter().map(Quantification::from_row).collect()
}

/// Hand a quantification over to another quantifier
pub async fn reassign(conn: &mut SqliteConnection, id: Uuid, quantifier_id: Uuid) -> Result<()> {
    sqlx::query("UPDATE quantifications SET quantifier_id = ?, updated_at = ? WHERE id = ?")
        .bind(quantifier_id)
        .bind(to_millis(now()))
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Number of quantifications the user holds on praise belonging to a period in
/// QUANTIFY status
///
/// A praise item belongs to the earliest-ending period whose end date is at or
/// after its creation time.
pub async fn count_in_quantifying_periods(conn: &mut SqliteConnection, quantifier_id: Uuid) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM quantifications q
        JOIN praise p ON p.id = q.praise_id
        WHERE q.quantifier_id = ?
          AND (
            SELECT per.status FROM periods per
            WHERE per.end_date >= p.created_at
            ORDER BY per.end_date ASC LIMIT 1
          ) = 'QUANTIFY'
        "#,
    )
    .bind(quantifier_id)
    .fetch_one(&mut *conn)
    .await?;
    Ok(count)
}

/// Assigned and finished counts for every quantifier with work in `(start, end]`
pub async fn progress_in_range(
    conn: &mut SqliteConnection,
    start: i64,
    end: i64,
) -> Result<Vec<QuantifierProgress>> {
    let rows: Vec<(Uuid, String, i64, i64)> = sqlx::query_as(
        r#"
        SELECT q.quantifier_id,
               u.username,
               COUNT(*),
               SUM(CASE WHEN q.score > 0 OR q.dismissed = 1 OR q.duplicate_praise_id IS NOT NULL
                        THEN 1 ELSE 0 END)
        FROM quantifications q
        JOIN praise p ON p.id = q.praise_id
        JOIN users u ON u.id = q.quantifier_id
        WHERE p.created_at > ? AND p.created_at <= ?
        GROUP BY q.quantifier_id, u.username
        ORDER BY u.username
        "#,
    )
    .bind(start)
    .bind(end)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(quantifier_id, username, assigned, finished)| QuantifierProgress {
            quantifier_id,
            username,
            assigned,
            finished,
        })
        .collect())
}

/// Number of quantifications on praise in `(start, end]`
pub async fn count_in_range(conn: &mut SqliteConnection, start: i64, end: i64) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM quantifications q
        JOIN praise p ON p.id = q.praise_id
        WHERE p.created_at > ? AND p.created_at <= ?
        "#,
    )
    .bind(start)
    .bind(end)
    .fetch_one(&mut *conn)
    .await?;
    Ok(count)
}
