//! Quantification engine
//!
//! Applies a quantifier's judgment (score, dismiss or mark duplicate) to a
//! praise item and recomputes every score that depends on it. Each call runs
//! in one transaction; nothing is visible to readers until it commits.

use praise_common::db::{PeriodStatus, Praise};
use praise_common::events::{EventLog, EventLogTypeKey, NewEvent};
use praise_common::{settings, Error, Result};
use serde::Deserialize;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use crate::auth::{Caller, Permission};
use crate::db::{periods, praise, quantifications};
use crate::services::scoring::{composite_score, realized_score};

/// Request body of a quantification
///
/// Only one action applies: a duplicate reference wins over `dismissed`, which
/// wins over `score`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuantifyInput {
    pub score: Option<i64>,
    pub dismissed: Option<bool>,
    #[serde(alias = "duplicatePraiseId")]
    pub duplicate_praise: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub struct QuantifyMultipleInput {
    pub praise_ids: Vec<Uuid>,
    pub params: QuantifyInput,
}

impl<'de> Deserialize<'de> for QuantifyMultipleInput {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Body {
            praise_ids: Vec<Uuid>,
            score: Option<i64>,
            dismissed: Option<bool>,
            #[serde(alias = "duplicatePraiseId")]
            duplicate_praise: Option<Uuid>,
        }

        let body = Body::deserialize(deserializer)?;
        Ok(Self {
            praise_ids: body.praise_ids,
            params: QuantifyInput {
                score: body.score,
                dismissed: body.dismissed,
                duplicate_praise: body.duplicate_praise,
            },
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Judgment {
    Duplicate(Uuid),
    Dismiss,
    Score(i64),
}

impl QuantifyInput {
    fn judgment(&self) -> Result<Judgment> {
        if let Some(original) = self.duplicate_praise {
            Ok(Judgment::Duplicate(original))
        } else if self.dismissed == Some(true) {
            Ok(Judgment::Dismiss)
        } else if let Some(score) = self.score {
            Ok(Judgment::Score(score))
        } else {
            Err(Error::validation(
                "Score, dismissed or duplicatePraise is required",
            ))
        }
    }
}

/// Recompute realized scores of every quantification on a praise item and
/// store the new composite score
pub(crate) async fn recompute_praise_score(
    conn: &mut SqliteConnection,
    praise_id: Uuid,
    duplicate_percentage: f64,
) -> Result<f64> {
    let mut items = quantifications::find_for_praise(conn, praise_id).await?;

    for q in items.iter_mut() {
        let original_score = match q.duplicate_praise_id {
            Some(original) => {
                quantifications::find_by_praise_and_quantifier(conn, original, q.quantifier_id)
                    .await?
                    .map(|o| o.score)
            }
            None => None,
        };

        let realized = realized_score(q, original_score, duplicate_percentage);
        if realized != q.score_realized {
            quantifications::update_realized(conn, q.id, realized).await?;
            q.score_realized = realized;
        }
    }

    let score = composite_score(&items);
    praise::update_score(conn, praise_id, score).await?;
    Ok(score)
}

pub struct QuantificationService {
    db: SqlitePool,
    events: EventLog,
}

impl QuantificationService {
    pub fn new(db: SqlitePool, events: EventLog) -> Self {
        Self { db, events }
    }

    /// Apply the caller's judgment to one praise item
    ///
    /// Returns the praise item and every praise item the caller marked as a
    /// duplicate of it, with updated scores.
    pub async fn quantify(
        &self,
        caller: &Caller,
        praise_id: Uuid,
        input: &QuantifyInput,
    ) -> Result<Vec<Praise>> {
        caller.require(Permission::PraiseQuantify)?;
        let judgment = input.judgment()?;

        let mut tx = self.db.begin().await?;
        let (affected, event) = apply_judgment(&mut *tx, caller.user_id, praise_id, judgment).await?;
        let entry = self.events.log(&mut *tx, event).await?;
        let praise = load_praise(&mut *tx, &affected).await?;
        tx.commit().await?;

        self.events.publish(entry);
        Ok(praise)
    }

    /// Apply the same judgment to several praise items, all or nothing
    pub async fn quantify_multiple(
        &self,
        caller: &Caller,
        input: &QuantifyMultipleInput,
    ) -> Result<Vec<Praise>> {
        caller.require(Permission::PraiseQuantify)?;
        if input.praise_ids.is_empty() {
            return Err(Error::validation("praiseIds must not be empty"));
        }
        let judgment = input.params.judgment()?;

        let mut tx = self.db.begin().await?;
        let mut affected: Vec<Uuid> = Vec::new();
        let mut entries = Vec::with_capacity(input.praise_ids.len());

        for praise_id in &input.praise_ids {
            let (ids, event) = apply_judgment(&mut *tx, caller.user_id, *praise_id, judgment).await?;
            for id in ids {
                if !affected.contains(&id) {
                    affected.push(id);
                }
            }
            entries.push(self.events.log(&mut *tx, event).await?);
        }

        let praise = load_praise(&mut *tx, &affected).await?;
        tx.commit().await?;

        info!(
            quantifier_id = %caller.user_id,
            count = input.praise_ids.len(),
            "Quantified multiple praise items"
        );
        for entry in entries {
            self.events.publish(entry);
        }
        Ok(praise)
    }
}

async fn load_praise(conn: &mut SqliteConnection, ids: &[Uuid]) -> Result<Vec<Praise>> {
    let mut items = Vec::with_capacity(ids.len());
    for id in ids {
        let item = praise::find_praise(conn, *id)
            .await?
            .ok_or_else(|| Error::not_found("Praise item"))?;
        items.push(item);
    }
    Ok(items)
}

/// Validate and store one judgment, then recompute affected scores
///
/// Returns the ids of every praise item whose score was recomputed and the
/// audit event describing the change.
async fn apply_judgment(
    conn: &mut SqliteConnection,
    quantifier_id: Uuid,
    praise_id: Uuid,
    judgment: Judgment,
) -> Result<(Vec<Uuid>, NewEvent)> {
    // Write first so this transaction owns the write lock before reading
    if !praise::touch_praise(conn, praise_id).await? {
        return Err(Error::not_found("Praise item"));
    }
    let item = praise::find_praise_row(conn, praise_id)
        .await?
        .ok_or_else(|| Error::not_found("Praise item"))?;

    let period = periods::period_for_date(conn, item.created_at)
        .await?
        .ok_or_else(|| Error::not_found("Praise does not have an associated period"))?;
    if period.status != PeriodStatus::Quantify {
        return Err(Error::conflict(
            "Period associated with praise does not have status QUANTIFY",
        ));
    }

    let quantification = quantifications::find_by_praise_and_quantifier(conn, praise_id, quantifier_id)
        .await?
        .ok_or_else(|| Error::Forbidden("User not assigned as quantifier for praise".to_string()))?;

    let duplicates_of_this = quantifications::find_duplicates_of(conn, praise_id, quantifier_id).await?;

    let description = match judgment {
        Judgment::Duplicate(original_id) => {
            if original_id == praise_id {
                return Err(Error::validation("Praise cannot be a duplicate of itself"));
            }
            if praise::find_praise_row(conn, original_id).await?.is_none() {
                return Err(Error::not_found("Duplicate praise item"));
            }
            if !duplicates_of_this.is_empty() {
                return Err(Error::conflict(
                    "Praise cannot be marked duplicate when it is the original of another duplicate",
                ));
            }
            let on_original =
                quantifications::find_by_praise_and_quantifier(conn, original_id, quantifier_id).await?;
            if on_original.is_some_and(|q| q.duplicate_praise_id.is_some()) {
                return Err(Error::conflict(
                    "Praise cannot be marked duplicate of another duplicate",
                ));
            }

            quantifications::update_judgment(conn, quantification.id, 0, false, Some(original_id)).await?;
            format!(
                "Marked the praise with id \"{}\" as duplicate of the praise with id \"{}\"",
                praise_id, original_id
            )
        }
        Judgment::Dismiss => {
            quantifications::update_judgment(conn, quantification.id, 0, true, None).await?;
            format!("Dismissed the praise with id \"{}\"", praise_id)
        }
        Judgment::Score(score) => {
            let allowed = settings::allowed_scores(conn, period.id).await?;
            if !allowed.contains(&score) {
                let listed: Vec<String> = allowed.iter().map(i64::to_string).collect();
                return Err(Error::validation(format!(
                    "Score {} is not allowed. Allowed scores are: {}",
                    score,
                    listed.join(", ")
                )));
            }

            quantifications::update_judgment(conn, quantification.id, score, false, None).await?;
            format!("Gave a score of {} to the praise with id \"{}\"", score, praise_id)
        }
    };

    let duplicate_percentage = settings::duplicate_score_percentage(conn, period.id).await?;
    let mut affected = vec![praise_id];
    affected.extend(duplicates_of_this.iter().map(|q| q.praise_id));

    for id in &affected {
        let score = recompute_praise_score(conn, *id, duplicate_percentage).await?;
        debug!(praise_id = %id, score, "Recomputed praise score");
    }

    let event = NewEvent::new(EventLogTypeKey::Quantification, description)
        .by(quantifier_id)
        .in_period(period.id);

    Ok((affected, event))
}
