//! Praise items

use chrono::{DateTime, Utc};
use praise_common::db::Praise;
use praise_common::time::{now, to_millis};
use praise_common::{Error, Result};
use sqlx::SqliteConnection;
use uuid::Uuid;

use super::quantifications;

/// Fields of a praise item at intake
#[derive(Debug, Clone)]
pub struct NewPraise {
    pub reason: String,
    pub giver_id: Uuid,
    pub receiver_id: Uuid,
    pub forwarder_id: Option<Uuid>,
    pub source_id: String,
    pub source_name: String,
    pub created_at: DateTime<Utc>,
}

/// Narrowing applied to a period's praise listing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PraiseFilter {
    All,
    /// Praise received by a user account
    Receiver(Uuid),
    /// Praise given by a user account
    Giver(Uuid),
    /// Praise a user is assigned to quantify
    Quantifier(Uuid),
}

/// Praise item as seen by the assignment planner
#[derive(Debug, Clone, PartialEq)]
pub struct AssignmentCandidate {
    pub praise_id: Uuid,
    pub receiver_id: Uuid,
    /// Users linked to the giver or receiver account
    pub excluded_users: Vec<Uuid>,
    pub created_at: i64,
}

pub async fn insert_praise(conn: &mut SqliteConnection, new: &NewPraise) -> Result<Praise> {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO praise (id, reason, giver_id, receiver_id, forwarder_id, source_id, source_name,
                            score, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, 0, ?, ?)
        "#,
    )
    .bind(id)
    .bind(&new.reason)
    .bind(new.giver_id)
    .bind(new.receiver_id)
    .bind(new.forwarder_id)
    .bind(&new.source_id)
    .bind(&new.source_name)
    .bind(to_millis(new.created_at))
    .bind(to_millis(now()))
    .execute(&mut *conn)
    .await?;

    find_praise(conn, id)
        .await?
        .ok_or_else(|| Error::Internal("Inserted praise vanished".to_string()))
}

/// Praise row without its quantifications
pub async fn find_praise_row(conn: &mut SqliteConnection, id: Uuid) -> Result<Option<Praise>> {
    let row = sqlx::query("SELECT * FROM praise WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    row.as_ref().map(Praise::from_row).transpose()
}

/// Praise with quantifications attached
pub async fn find_praise(conn: &mut SqliteConnection, id: Uuid) -> Result<Option<Praise>> {
    match find_praise_row(conn, id).await? {
        Some(mut praise) => {
            praise.quantifications = quantifications::find_for_praise(conn, id).await?;
            Ok(Some(praise))
        }
        None => Ok(None),
    }
}

/// Bump `updated_at`; returns false when the praise does not exist
///
/// Used as the opening write of a quantification transaction so the
/// connection holds the write lock before it reads anything.
pub async fn touch_praise(conn: &mut SqliteConnection, id: Uuid) -> Result<bool> {
    let result = sqlx::query("UPDATE praise SET updated_at = ? WHERE id = ?")
        .bind(to_millis(now()))
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn update_score(conn: &mut SqliteConnection, id: Uuid, score: f64) -> Result<()> {
    sqlx::query("UPDATE praise SET score = ?, updated_at = ? WHERE id = ?")
        .bind(score)
        .bind(to_millis(now()))
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Praise created in `(start, end]`, oldest first, with quantifications
pub async fn praise_in_range(
    conn: &mut SqliteConnection,
    start: i64,
    end: i64,
    filter: PraiseFilter,
) -> Result<Vec<Praise>> {
    let (clause, bound) = match filter {
        PraiseFilter::All => ("", None),
        PraiseFilter::Receiver(id) => ("AND p.receiver_id = ?", Some(id)),
        PraiseFilter::Giver(id) => ("AND p.giver_id = ?", Some(id)),
        PraiseFilter::Quantifier(id) => (
            "AND EXISTS (SELECT 1 FROM quantifications q WHERE q.praise_id = p.id AND q.quantifier_id = ?)",
            Some(id),
        ),
    };

    let sql = format!(
        "SELECT p.* FROM praise p WHERE p.created_at > ? AND p.created_at <= ? {} ORDER BY p.created_at, p.id",
        clause
    );

    let mut query = sqlx::query(&sql).bind(start).bind(end);
    if let Some(id) = bound {
        query = query.bind(id);
    }
    let rows = query.fetch_all(&mut *conn).await?;

    let mut praise = rows
        .iter()
        .map(Praise::from_row)
        .collect::<Result<Vec<Praise>>>()?;
    for item in praise.iter_mut() {
        item.quantifications = quantifications::find_for_praise(conn, item.id).await?;
    }
    Ok(praise)
}

pub async fn count_in_range(conn: &mut SqliteConnection, start: i64, end: i64) -> Result<i64> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM praise WHERE created_at > ? AND created_at <= ?")
            .bind(start)
            .bind(end)
            .fetch_one(&mut *conn)
            .await?;
    Ok(count)
}

/// Praise in `(start, end]` with the users linked to its giver and receiver
pub async fn assignment_candidates(
    conn: &mut SqliteConnection,
    start: i64,
    end: i64,
) -> Result<Vec<AssignmentCandidate>> {
    let rows: Vec<(Uuid, Uuid, Option<Uuid>, Option<Uuid>, i64)> = sqlx::query_as(
        r#"
        SELECT p.id, p.receiver_id, g.user_id, r.user_id, p.created_at
        FROM praise p
        JOIN user_accounts g ON g.id = p.giver_id
        JOIN user_accounts r ON r.id = p.receiver_id
        WHERE p.created_at > ? AND p.created_at <= ?
        ORDER BY p.created_at, p.id
        "#,
    )
    .bind(start)
    .bind(end)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(praise_id, receiver_id, giver_user, receiver_user, created_at)| {
            let mut excluded_users: Vec<Uuid> =
                giver_user.into_iter().chain(receiver_user).collect();
            excluded_users.dedup();
            AssignmentCandidate {
                praise_id,
                receiver_id,
                excluded_users,
                created_at,
            }
        })
        .collect())
}
