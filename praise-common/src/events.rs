//! Audit event log
//!
//! Every mutating operation writes one `event_log` row inside its own
//! transaction. After the transaction commits the entry is published on a
//! broadcast channel so live subscribers (the SSE endpoint) see it.
//!
//! The broadcast side uses `tokio::broadcast`:
//! - Non-blocking publish (slow subscribers don't block producers)
//! - Multiple concurrent subscribers
//! - Lagged message detection for slow subscribers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use std::fmt;
use std::str::FromStr;
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use crate::time::{from_millis, now, to_millis};
use crate::{Error, Result};

/// Category of an audit event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventLogTypeKey {
    Permission,
    Period,
    PeriodSetting,
    Setting,
    Quantification,
    Praise,
    UserAccount,
}

impl EventLogTypeKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventLogTypeKey::Permission => "PERMISSION",
            EventLogTypeKey::Period => "PERIOD",
            EventLogTypeKey::PeriodSetting => "PERIOD_SETTING",
            EventLogTypeKey::Setting => "SETTING",
            EventLogTypeKey::Quantification => "QUANTIFICATION",
            EventLogTypeKey::Praise => "PRAISE",
            EventLogTypeKey::UserAccount => "USER_ACCOUNT",
        }
    }
}

impl fmt::Display for EventLogTypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventLogTypeKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "PERMISSION" => Ok(EventLogTypeKey::Permission),
            "PERIOD" => Ok(EventLogTypeKey::Period),
            "PERIOD_SETTING" => Ok(EventLogTypeKey::PeriodSetting),
            "SETTING" => Ok(EventLogTypeKey::Setting),
            "QUANTIFICATION" => Ok(EventLogTypeKey::Quantification),
            "PRAISE" => Ok(EventLogTypeKey::Praise),
            "USER_ACCOUNT" => Ok(EventLogTypeKey::UserAccount),
            other => Err(Error::Internal(format!("Unknown event type: {}", other))),
        }
    }
}

/// Event to be recorded
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub type_key: EventLogTypeKey,
    pub description: String,
    pub user_id: Option<Uuid>,
    pub period_id: Option<Uuid>,
}

impl NewEvent {
    pub fn new(type_key: EventLogTypeKey, description: impl Into<String>) -> Self {
        Self {
            type_key,
            description: description.into(),
            user_id: None,
            period_id: None,
        }
    }

    pub fn by(mut self, user_id: Uuid) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn in_period(mut self, period_id: Uuid) -> Self {
        self.period_id = Some(period_id);
        self
    }
}

/// Recorded audit event
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventLogEntry {
    pub id: Uuid,
    pub type_key: EventLogTypeKey,
    pub description: String,
    pub user_id: Option<Uuid>,
    pub period_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl EventLogEntry {
    fn from_row(row: &SqliteRow) -> Result<Self> {
        let type_key: String = row.try_get("type_key")?;
        Ok(Self {
            id: row.try_get("id")?,
            type_key: type_key.parse()?,
            description: row.try_get("description")?,
            user_id: row.try_get("user_id")?,
            period_id: row.try_get("period_id")?,
            created_at: from_millis(row.try_get("created_at")?)?,
        })
    }
}

/// Audit log writer and live broadcaster
#[derive(Clone)]
pub struct EventLog {
    tx: broadcast::Sender<EventLogEntry>,
}

impl EventLog {
    /// Creates a new event log with the given broadcast capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to entries published after this call
    pub fn subscribe(&self) -> broadcast::Receiver<EventLogEntry> {
        self.tx.subscribe()
    }

    /// Insert an entry using the caller's connection (usually a transaction)
    ///
    /// The entry is not published; call [`EventLog::publish`] once the
    /// surrounding transaction has committed.
    pub async fn log(&self, conn: &mut SqliteConnection, event: NewEvent) -> Result<EventLogEntry> {
        let entry = EventLogEntry {
            id: Uuid::new_v4(),
            type_key: event.type_key,
            description: event.description,
            user_id: event.user_id,
            period_id: event.period_id,
            created_at: now(),
        };

        sqlx::query(
            r#"
            INSERT INTO event_log (id, type_key, description, user_id, period_id, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(entry.id)
        .bind(entry.type_key.as_str())
        .bind(&entry.description)
        .bind(entry.user_id)
        .bind(entry.period_id)
        .bind(to_millis(entry.created_at))
        .execute(&mut *conn)
        .await?;

        Ok(entry)
    }

    /// Broadcast a committed entry; no subscribers is not an error
    pub fn publish(&self, entry: EventLogEntry) {
        debug!(type_key = %entry.type_key, "{}", entry.description);
        let _ = self.tx.send(entry);
    }

    /// Most recent entries first
    pub async fn find_recent(
        &self,
        conn: &mut SqliteConnection,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<EventLogEntry>> {
        let rows = sqlx::query(
            "SELECT * FROM event_log ORDER BY created_at DESC, rowid DESC LIMIT ? OFFSET ?",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&mut *conn)
        .await?;
        rows.iter().map(EventLogEntry::from_row).collect()
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new(100)
    }
}
