//! Praise intake and user accounts

use chrono::{DateTime, Utc};
use praise_common::db::{PeriodStatus, Praise, UserAccount};
use praise_common::events::{EventLog, EventLogTypeKey, NewEvent};
use praise_common::time::now;
use praise_common::{Error, Result};
use serde::Deserialize;
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::auth::{Caller, Permission};
use crate::db::praise::NewPraise;
use crate::db::{periods, praise, users};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAccountInput {
    pub account_id: String,
    pub name: String,
    pub platform: String,
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePraiseInput {
    pub reason: String,
    pub giver_id: Uuid,
    pub receiver_id: Uuid,
    pub forwarder_id: Option<Uuid>,
    #[serde(default)]
    pub source_id: String,
    #[serde(default)]
    pub source_name: String,
    /// Defaults to now; set when importing praise logged elsewhere
    pub created_at: Option<DateTime<Utc>>,
}

pub struct PraiseService {
    db: SqlitePool,
    events: EventLog,
}

impl PraiseService {
    pub fn new(db: SqlitePool, events: EventLog) -> Self {
        Self { db, events }
    }

    /// Register an external chat identity
    pub async fn create_account(&self, caller: &Caller, input: &CreateAccountInput) -> Result<UserAccount> {
        caller.require(Permission::UserAccountsCreate)?;
        let account_id = input.account_id.trim();
        let platform = input.platform.trim();
        if account_id.is_empty() || platform.is_empty() {
            return Err(Error::validation("accountId and platform are required"));
        }

        let mut tx = self.db.begin().await?;
        if users::find_account_by_platform_id(&mut *tx, platform, account_id)
            .await?
            .is_some()
        {
            return Err(Error::validation(format!(
                "Account {} already registered on {}",
                account_id, platform
            )));
        }
        if let Some(user_id) = input.user_id {
            if users::find_user(&mut *tx, user_id).await?.is_none() {
                return Err(Error::not_found("User"));
            }
        }

        let account = users::insert_account(&mut *tx, account_id, input.name.trim(), platform, input.user_id).await?;
        let mut event = NewEvent::new(
            EventLogTypeKey::UserAccount,
            format!("Registered {} account \"{}\"", account.platform, account.name),
        )
        .by(caller.user_id);
        if let Some(user_id) = account.user_id {
            event.description.push_str(&format!(" linked to user {}", user_id));
        }
        let entry = self.events.log(&mut *tx, event).await?;
        tx.commit().await?;

        self.events.publish(entry);
        Ok(account)
    }

    pub async fn create_praise(&self, caller: &Caller, input: &CreatePraiseInput) -> Result<Praise> {
        caller.require(Permission::PraiseCreate)?;
        let reason = input.reason.trim();
        if reason.is_empty() {
            return Err(Error::validation("Praise reason must not be empty"));
        }
        if input.giver_id == input.receiver_id {
            return Err(Error::validation("Praise giver and receiver must differ"));
        }

        let mut tx = self.db.begin().await?;
        let giver = users::find_account(&mut *tx, input.giver_id)
            .await?
            .ok_or_else(|| Error::not_found("Giver account"))?;
        let receiver = users::find_account(&mut *tx, input.receiver_id)
            .await?
            .ok_or_else(|| Error::not_found("Receiver account"))?;
        if let Some(forwarder_id) = input.forwarder_id {
            users::find_account(&mut *tx, forwarder_id)
                .await?
                .ok_or_else(|| Error::not_found("Forwarder account"))?;
        }

        // Only an OPEN period (or none yet) may still gain praise
        let created_at = input.created_at.unwrap_or_else(now);
        if let Some(period) = periods::period_for_date(&mut *tx, created_at).await? {
            if period.status != PeriodStatus::Open {
                return Err(Error::conflict(format!(
                    "Praise cannot be added to period \"{}\" with status {}",
                    period.name, period.status
                )));
            }
        }

        let new = NewPraise {
            reason: reason.to_string(),
            giver_id: giver.id,
            receiver_id: receiver.id,
            forwarder_id: input.forwarder_id,
            source_id: input.source_id.clone(),
            source_name: input.source_name.clone(),
            created_at,
        };
        let item = praise::insert_praise(&mut *tx, &new).await?;

        let event = NewEvent::new(
            EventLogTypeKey::Praise,
            format!("{} praised {}", giver.name, receiver.name),
        )
        .by(caller.user_id);
        let entry = self.events.log(&mut *tx, event).await?;
        tx.commit().await?;

        debug!(praise_id = %item.id, "Created praise");
        self.events.publish(entry);
        Ok(item)
    }

    pub async fn find(&self, caller: &Caller, id: Uuid) -> Result<Praise> {
        caller.require(Permission::PraiseView)?;
        let mut conn = self.db.acquire().await?;
        praise::find_praise(&mut conn, id)
            .await?
            .ok_or_else(|| Error::not_found("Praise item"))
    }
}
