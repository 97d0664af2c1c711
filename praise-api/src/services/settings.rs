//! Global and period-scoped settings with audit logging

use praise_common::events::{EventLog, EventLogTypeKey, NewEvent};
use praise_common::settings::{self, PeriodSetting, Setting};
use praise_common::Result;
use serde::Deserialize;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::auth::{Caller, Permission};

#[derive(Debug, Clone, Deserialize)]
pub struct SetValueInput {
    pub value: String,
}

pub struct SettingsService {
    db: SqlitePool,
    events: EventLog,
}

impl SettingsService {
    pub fn new(db: SqlitePool, events: EventLog) -> Self {
        Self { db, events }
    }

    pub async fn find_all(&self, caller: &Caller) -> Result<Vec<Setting>> {
        caller.require(Permission::SettingsView)?;
        let mut conn = self.db.acquire().await?;
        settings::find_all(&mut conn).await
    }

    pub async fn set(&self, caller: &Caller, key: &str, value: &str) -> Result<Setting> {
        caller.require(Permission::SettingsUpdate)?;

        let mut tx = self.db.begin().await?;
        let previous = settings::find_setting(&mut *tx, key).await?;
        let setting = settings::set_setting(&mut *tx, key, value).await?;
        let event = NewEvent::new(
            EventLogTypeKey::Setting,
            format!(
                "Updated global setting \"{}\" from \"{}\" to \"{}\"",
                key, previous.value, setting.value
            ),
        )
        .by(caller.user_id);
        let entry = self.events.log(&mut *tx, event).await?;
        tx.commit().await?;

        self.events.publish(entry);
        Ok(setting)
    }

    pub async fn find_for_period(&self, caller: &Caller, period_id: Uuid) -> Result<Vec<PeriodSetting>> {
        caller.require(Permission::SettingsView)?;
        let mut conn = self.db.acquire().await?;
        settings::find_period_settings(&mut conn, period_id).await
    }

    pub async fn set_for_period(
        &self,
        caller: &Caller,
        period_id: Uuid,
        key: &str,
        value: &str,
    ) -> Result<PeriodSetting> {
        caller.require(Permission::PeriodSettingsUpdate)?;

        let mut tx = self.db.begin().await?;
        let setting = settings::set_period_setting(&mut *tx, period_id, key, value).await?;
        let event = NewEvent::new(
            EventLogTypeKey::PeriodSetting,
            format!("Updated period setting \"{}\" to \"{}\"", key, setting.value),
        )
        .by(caller.user_id)
        .in_period(period_id);
        let entry = self.events.log(&mut *tx, event).await?;
        tx.commit().await?;

        self.events.publish(entry);
        Ok(setting)
    }
}
