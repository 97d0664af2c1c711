//! Database models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::time::from_millis;
use crate::{Error, Result};

/// Role held by a user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    User,
    Admin,
    Quantifier,
    Forwarder,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::Admin => "ADMIN",
            Role::Quantifier => "QUANTIFIER",
            Role::Forwarder => "FORWARDER",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "USER" => Ok(Role::User),
            "ADMIN" => Ok(Role::Admin),
            "QUANTIFIER" => Ok(Role::Quantifier),
            "FORWARDER" => Ok(Role::Forwarder),
            other => Err(Error::validation(format!("Unknown role: {}", other))),
        }
    }
}

/// Period lifecycle: OPEN -> QUANTIFY -> CLOSED
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PeriodStatus {
    Open,
    Quantify,
    Closed,
}

impl PeriodStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PeriodStatus::Open => "OPEN",
            PeriodStatus::Quantify => "QUANTIFY",
            PeriodStatus::Closed => "CLOSED",
        }
    }
}

impl fmt::Display for PeriodStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PeriodStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "OPEN" => Ok(PeriodStatus::Open),
            "QUANTIFY" => Ok(PeriodStatus::Quantify),
            "CLOSED" => Ok(PeriodStatus::Closed),
            other => Err(Error::Internal(format!("Unknown period status: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub roles: Vec<Role>,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Build from a `users` row; roles are loaded separately
    pub fn from_row(row: &SqliteRow, roles: Vec<Role>) -> Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            username: row.try_get("username")?,
            roles,
            created_at: from_millis(row.try_get("created_at")?)?,
        })
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }
}

/// External chat identity (giver / receiver / forwarder of praise)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAccount {
    pub id: Uuid,
    pub account_id: String,
    pub name: String,
    pub platform: String,
    pub user_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl UserAccount {
    pub fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            account_id: row.try_get("account_id")?,
            name: row.try_get("name")?,
            platform: row.try_get("platform")?,
            user_id: row.try_get("user_id")?,
            created_at: from_millis(row.try_get("created_at")?)?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Period {
    pub id: Uuid,
    pub name: String,
    pub end_date: DateTime<Utc>,
    pub status: PeriodStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Period {
    pub fn from_row(row: &SqliteRow) -> Result<Self> {
        let status: String = row.try_get("status")?;
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            end_date: from_millis(row.try_get("end_date")?)?,
            status: status.parse()?,
            created_at: from_millis(row.try_get("created_at")?)?,
            updated_at: from_millis(row.try_get("updated_at")?)?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Praise {
    pub id: Uuid,
    pub reason: String,
    pub giver_id: Uuid,
    pub receiver_id: Uuid,
    pub forwarder_id: Option<Uuid>,
    pub source_id: String,
    pub source_name: String,
    pub score: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub quantifications: Vec<Quantification>,
}

impl Praise {
    /// Build from a `praise` row; quantifications are loaded separately
    pub fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            reason: row.try_get("reason")?,
            giver_id: row.try_get("giver_id")?,
            receiver_id: row.try_get("receiver_id")?,
            forwarder_id: row.try_get("forwarder_id")?,
            source_id: row.try_get("source_id")?,
            source_name: row.try_get("source_name")?,
            score: row.try_get("score")?,
            created_at: from_millis(row.try_get("created_at")?)?,
            updated_at: from_millis(row.try_get("updated_at")?)?,
            quantifications: Vec::new(),
        })
    }
}

/// One quantifier's judgment on one praise item
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quantification {
    pub id: Uuid,
    pub praise_id: Uuid,
    pub quantifier_id: Uuid,
    pub score: i64,
    pub score_realized: f64,
    pub dismissed: bool,
    pub duplicate_praise_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Quantification {
    pub fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            praise_id: row.try_get("praise_id")?,
            quantifier_id: row.try_get("quantifier_id")?,
            score: row.try_get("score")?,
            score_realized: row.try_get("score_realized")?,
            dismissed: row.try_get("dismissed")?,
            duplicate_praise_id: row.try_get("duplicate_praise_id")?,
            created_at: from_millis(row.try_get("created_at")?)?,
            updated_at: from_millis(row.try_get("updated_at")?)?,
        })
    }

    /// A quantifier has submitted a judgment (score, dismissal or duplicate marking)
    pub fn is_completed(&self) -> bool {
        self.score > 0 || self.dismissed || self.duplicate_praise_id.is_some()
    }
}
