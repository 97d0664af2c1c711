//! Period manager
//!
//! Lifecycle OPEN -> QUANTIFY -> CLOSED. A period's praise is whatever was
//! created after the previous period's end date and up to its own, so end
//! dates are kept strictly increasing.

use chrono::{DateTime, Utc};
use praise_common::db::{Period, PeriodStatus, Praise};
use praise_common::events::{EventLog, EventLogTypeKey, NewEvent};
use praise_common::time::{from_millis, to_millis};
use praise_common::{settings, Error, Result};
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::info;
use uuid::Uuid;

use crate::auth::{Caller, Permission};
use crate::db::praise::PraiseFilter;
use crate::db::quantifications::QuantifierProgress;
use crate::db::{periods, praise, quantifications};

/// Period with praise and per-quantifier progress
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodDetails {
    #[serde(flatten)]
    pub period: Period,
    pub praise_count: i64,
    pub quantifiers: Vec<QuantifierProgress>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePeriodInput {
    pub name: String,
    pub end_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePeriodInput {
    pub name: Option<String>,
    pub end_date: Option<DateTime<Utc>>,
}

pub(crate) async fn period_details(conn: &mut SqliteConnection, period: Period) -> Result<PeriodDetails> {
    let (start, end) = periods::date_range(conn, &period).await?;
    let praise_count = praise::count_in_range(conn, start, end).await?;
    let quantifiers = quantifications::progress_in_range(conn, start, end).await?;
    Ok(PeriodDetails {
        period,
        praise_count,
        quantifiers,
    })
}

/// Truncate to the stored millisecond precision so comparisons match what is persisted
fn stored_precision(date: DateTime<Utc>) -> Result<DateTime<Utc>> {
    from_millis(to_millis(date))
}

fn clean_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::validation("Period name must not be empty"));
    }
    Ok(name.to_string())
}

async fn ensure_name_free(conn: &mut SqliteConnection, name: &str, except: Option<Uuid>) -> Result<()> {
    match periods::find_period_by_name(conn, name).await? {
        Some(existing) if Some(existing.id) != except => Err(Error::validation(format!(
            "Period name \"{}\" is already in use",
            name
        ))),
        _ => Ok(()),
    }
}

pub struct PeriodService {
    db: SqlitePool,
    events: EventLog,
}

impl PeriodService {
    pub fn new(db: SqlitePool, events: EventLog) -> Self {
        Self { db, events }
    }

    pub async fn create(&self, caller: &Caller, input: &CreatePeriodInput) -> Result<Period> {
        caller.require(Permission::PeriodCreate)?;
        let name = clean_name(&input.name)?;
        let end_date = stored_precision(input.end_date)?;

        let mut tx = self.db.begin().await?;
        ensure_name_free(&mut *tx, &name, None).await?;
        if let Some(latest) = periods::latest_period(&mut *tx).await? {
            if end_date <= latest.end_date {
                return Err(Error::validation(format!(
                    "End date must be after the end date of period \"{}\"",
                    latest.name
                )));
            }
        }

        let period = periods::insert_period(&mut *tx, &name, end_date).await?;
        let copied = settings::copy_settings_to_period(&mut *tx, period.id).await?;

        let event = NewEvent::new(
            EventLogTypeKey::Period,
            format!("Created a new period \"{}\"", period.name),
        )
        .by(caller.user_id)
        .in_period(period.id);
        let entry = self.events.log(&mut *tx, event).await?;
        tx.commit().await?;

        info!(period_id = %period.id, settings = copied, "Created period {}", period.name);
        self.events.publish(entry);
        Ok(period)
    }

    /// Rename a period or move its end date
    ///
    /// The end date may only change while the period is OPEN and must stay
    /// between the neighbouring periods' end dates.
    pub async fn update(&self, caller: &Caller, id: Uuid, input: &UpdatePeriodInput) -> Result<Period> {
        caller.require(Permission::PeriodUpdate)?;
        if input.name.is_none() && input.end_date.is_none() {
            return Err(Error::validation("Nothing to update: name or endDate required"));
        }

        let mut tx = self.db.begin().await?;
        let period = periods::find_period(&mut *tx, id)
            .await?
            .ok_or_else(|| Error::not_found("Period"))?;

        let mut changes = Vec::new();

        if let Some(name) = &input.name {
            let name = clean_name(name)?;
            if name != period.name {
                ensure_name_free(&mut *tx, &name, Some(period.id)).await?;
                periods::update_name(&mut *tx, period.id, &name).await?;
                changes.push(format!("name to \"{}\"", name));
            }
        }

        if let Some(end_date) = input.end_date.map(stored_precision).transpose()? {
            if end_date != period.end_date {
                if period.status != PeriodStatus::Open {
                    return Err(Error::conflict(
                        "Period end date can only be changed when period status is OPEN",
                    ));
                }
                if let Some(previous) = periods::previous_period(&mut *tx, period.end_date).await? {
                    if end_date <= previous.end_date {
                        return Err(Error::validation(format!(
                            "End date must be after the end date of period \"{}\"",
                            previous.name
                        )));
                    }
                }
                if let Some(next) = periods::next_period(&mut *tx, period.end_date).await? {
                    if end_date >= next.end_date {
                        return Err(Error::validation(format!(
                            "End date must be before the end date of period \"{}\"",
                            next.name
                        )));
                    }
                }
                periods::update_end_date(&mut *tx, period.id, end_date).await?;
                changes.push(format!("end date to {}", end_date.to_rfc3339()));
            }
        }

        let updated = periods::find_period(&mut *tx, id)
            .await?
            .ok_or_else(|| Error::not_found("Period"))?;

        if changes.is_empty() {
            tx.commit().await?;
            return Ok(updated);
        }

        let event = NewEvent::new(
            EventLogTypeKey::Period,
            format!("Updated period \"{}\": {}", period.name, changes.join(", ")),
        )
        .by(caller.user_id)
        .in_period(period.id);
        let entry = self.events.log(&mut *tx, event).await?;
        tx.commit().await?;

        self.events.publish(entry);
        Ok(updated)
    }

    pub async fn close(&self, caller: &Caller, id: Uuid) -> Result<Period> {
        caller.require(Permission::PeriodUpdate)?;

        let mut tx = self.db.begin().await?;
        let period = periods::find_period(&mut *tx, id)
            .await?
            .ok_or_else(|| Error::not_found("Period"))?;
        if period.status == PeriodStatus::Closed {
            return Err(Error::conflict("Period is already closed"));
        }

        periods::update_status(&mut *tx, id, PeriodStatus::Closed).await?;
        let event = NewEvent::new(
            EventLogTypeKey::Period,
            format!("Closed the period \"{}\"", period.name),
        )
        .by(caller.user_id)
        .in_period(period.id);
        let entry = self.events.log(&mut *tx, event).await?;
        let closed = periods::find_period(&mut *tx, id)
            .await?
            .ok_or_else(|| Error::not_found("Period"))?;
        tx.commit().await?;

        info!(period_id = %id, "Closed period {}", period.name);
        self.events.publish(entry);
        Ok(closed)
    }

    pub async fn find_all(&self, caller: &Caller) -> Result<Vec<Period>> {
        caller.require(Permission::PeriodView)?;
        let mut conn = self.db.acquire().await?;
        periods::find_all_periods(&mut conn).await
    }

    pub async fn details(&self, caller: &Caller, id: Uuid) -> Result<PeriodDetails> {
        caller.require(Permission::PeriodView)?;
        let mut conn = self.db.acquire().await?;
        let period = periods::find_period(&mut conn, id)
            .await?
            .ok_or_else(|| Error::not_found("Period"))?;
        period_details(&mut conn, period).await
    }

    /// Praise of a period, optionally narrowed to a receiver, giver or quantifier
    pub async fn praise(&self, caller: &Caller, id: Uuid, filter: PraiseFilter) -> Result<Vec<Praise>> {
        caller.require(Permission::PraiseView)?;
        let mut conn = self.db.acquire().await?;
        let period = periods::find_period(&mut conn, id)
            .await?
            .ok_or_else(|| Error::not_found("Period"))?;
        let (start, end) = periods::date_range(&mut conn, &period).await?;
        praise::praise_in_range(&mut conn, start, end, filter).await
    }

    /// The period a praise item belongs to, if any
    pub async fn period_for_praise(&self, caller: &Caller, praise_id: Uuid) -> Result<Option<Period>> {
        caller.require(Permission::PeriodView)?;
        let mut conn = self.db.acquire().await?;
        let item = praise::find_praise_row(&mut conn, praise_id)
            .await?
            .ok_or_else(|| Error::not_found("Praise item"))?;
        periods::period_for_date(&mut conn, item.created_at).await
    }
}
