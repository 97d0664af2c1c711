//! Typed settings with period-scoped overrides
//!
//! Global settings live in `settings`. When a period is created every
//! period-overridable setting is copied into `period_settings`; lookups that
//! name a period read the period copy first and fall back to the global value.

use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::db::PeriodStatus;
use crate::time::{now, to_millis};
use crate::{Error, Result};

/// Well-known setting keys
pub mod keys {
    pub const ALLOWED_VALUES: &str = "PRAISE_QUANTIFY_ALLOWED_VALUES";
    pub const DUPLICATE_PRAISE_PERCENTAGE: &str = "PRAISE_QUANTIFY_DUPLICATE_PRAISE_PERCENTAGE";
    pub const QUANTIFIERS_PER_PRAISE_RECEIVER: &str = "PRAISE_QUANTIFIERS_PER_PRAISE_RECEIVER";
    pub const RECEIVER_PSEUDONYMS: &str = "PRAISE_QUANTIFY_RECEIVER_PSEUDONYMS";
    pub const NAME: &str = "NAME";
    pub const DESCRIPTION: &str = "DESCRIPTION";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SettingType {
    Integer,
    Float,
    Boolean,
    String,
    Textarea,
    IntegerList,
    StringList,
}

impl SettingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SettingType::Integer => "Integer",
            SettingType::Float => "Float",
            SettingType::Boolean => "Boolean",
            SettingType::String => "String",
            SettingType::Textarea => "Textarea",
            SettingType::IntegerList => "IntegerList",
            SettingType::StringList => "StringList",
        }
    }
}

impl fmt::Display for SettingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SettingType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Integer" => Ok(SettingType::Integer),
            "Float" => Ok(SettingType::Float),
            "Boolean" => Ok(SettingType::Boolean),
            "String" => Ok(SettingType::String),
            "Textarea" => Ok(SettingType::Textarea),
            "IntegerList" => Ok(SettingType::IntegerList),
            "StringList" => Ok(SettingType::StringList),
            other => Err(Error::Config(format!("Unknown setting type: {}", other))),
        }
    }
}

/// A setting value parsed according to its type
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SettingValue {
    Integer(i64),
    Float(f64),
    Boolean(bool),
    String(String),
    IntegerList(Vec<i64>),
    StringList(Vec<String>),
}

impl SettingValue {
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            SettingValue::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            SettingValue::Float(v) => Some(*v),
            SettingValue::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_integer_list(&self) -> Option<&[i64]> {
        match self {
            SettingValue::IntegerList(v) => Some(v),
            _ => None,
        }
    }
}

/// Compiled-in definition of a default setting
pub struct SettingDefinition {
    pub key: &'static str,
    pub value: &'static str,
    pub setting_type: SettingType,
    pub label: &'static str,
    pub description: &'static str,
    pub period_overridable: bool,
}

pub const DEFAULT_SETTINGS: &[SettingDefinition] = &[
    SettingDefinition {
        key: keys::NAME,
        value: "Praise",
        setting_type: SettingType::String,
        label: "Community name",
        description: "Name shown in reports and messages.",
        period_overridable: false,
    },
    SettingDefinition {
        key: keys::DESCRIPTION,
        value: "",
        setting_type: SettingType::Textarea,
        label: "Community description",
        description: "Short description of the community.",
        period_overridable: false,
    },
    SettingDefinition {
        key: keys::QUANTIFIERS_PER_PRAISE_RECEIVER,
        value: "3",
        setting_type: SettingType::Integer,
        label: "Quantifiers per praise",
        description: "How many distinct quantifiers score each praise item.",
        period_overridable: true,
    },
    SettingDefinition {
        key: keys::ALLOWED_VALUES,
        value: "0, 1, 3, 5, 8, 13, 21, 34, 55, 89, 144",
        setting_type: SettingType::IntegerList,
        label: "Allowed score values",
        description: "Scores a quantifier may give, in ascending order.",
        period_overridable: true,
    },
    SettingDefinition {
        key: keys::DUPLICATE_PRAISE_PERCENTAGE,
        value: "0.1",
        setting_type: SettingType::Float,
        label: "Duplicate praise score",
        description: "Fraction of the original's score given to a praise marked as its duplicate.",
        period_overridable: true,
    },
    SettingDefinition {
        key: keys::RECEIVER_PSEUDONYMS,
        value: "false",
        setting_type: SettingType::Boolean,
        label: "Use pseudonyms for receivers",
        description: "Hide receiver names from quantifiers.",
        period_overridable: true,
    },
];

/// Global setting as stored
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Setting {
    pub key: String,
    pub value: String,
    #[serde(rename = "type")]
    pub setting_type: SettingType,
    pub label: String,
    pub description: String,
    pub period_overridable: bool,
    pub value_normalized: Option<SettingValue>,
}

impl Setting {
    fn from_row(row: &SqliteRow) -> Result<Self> {
        let type_str: String = row.try_get("type")?;
        let setting_type: SettingType = type_str.parse()?;
        let value: String = row.try_get("value")?;
        Ok(Self {
            key: row.try_get("key")?,
            value_normalized: normalize(setting_type, &value).ok(),
            value,
            setting_type,
            label: row.try_get("label")?,
            description: row.try_get("description")?,
            period_overridable: row.try_get("period_overridable")?,
        })
    }
}

/// Period-scoped copy of a setting
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodSetting {
    pub period_id: Uuid,
    pub key: String,
    pub value: String,
    #[serde(rename = "type")]
    pub setting_type: SettingType,
    pub label: String,
    pub value_normalized: Option<SettingValue>,
}

impl PeriodSetting {
    fn from_row(row: &SqliteRow) -> Result<Self> {
        let type_str: String = row.try_get("type")?;
        let setting_type: SettingType = type_str.parse()?;
        let value: String = row.try_get("value")?;
        Ok(Self {
            period_id: row.try_get("period_id")?,
            key: row.try_get("key")?,
            value_normalized: normalize(setting_type, &value).ok(),
            value,
            setting_type,
            label: row.try_get("label")?,
        })
    }
}

fn split_list(value: &str) -> impl Iterator<Item = &str> {
    value.split(',').map(str::trim)
}

/// Check that a submitted value is acceptable for the setting type
///
/// Only text and string-list settings may be empty.
pub fn validate_value(setting_type: SettingType, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return match setting_type {
            SettingType::String | SettingType::Textarea | SettingType::StringList => Ok(()),
            _ => Err(Error::validation(format!(
                "A {} setting cannot be empty",
                setting_type
            ))),
        };
    }

    let invalid = || {
        Error::validation(format!(
            "Value \"{}\" is not a valid {}",
            value, setting_type
        ))
    };

    match setting_type {
        SettingType::Integer => value.trim().parse::<i64>().map(|_| ()).map_err(|_| invalid()),
        SettingType::Float => value
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .map(|_| ())
            .ok_or_else(invalid),
        SettingType::Boolean => match value {
            "true" | "false" => Ok(()),
            _ => Err(invalid()),
        },
        SettingType::String | SettingType::Textarea | SettingType::StringList => Ok(()),
        SettingType::IntegerList => {
            let mut previous = 0i64;
            for element in split_list(value) {
                let parsed = element.parse::<i64>().map_err(|_| invalid())?;
                if parsed < previous {
                    return Err(Error::validation(format!(
                        "Value \"{}\" must list integers in ascending order",
                        value
                    )));
                }
                previous = parsed;
            }
            Ok(())
        }
    }
}

/// Type check plus the ranges the quantification engine relies on
pub fn validate_setting(key: &str, setting_type: SettingType, value: &str) -> Result<()> {
    validate_value(setting_type, value)?;

    match key {
        keys::DUPLICATE_PRAISE_PERCENTAGE => {
            let pct = value.trim().parse::<f64>().unwrap_or(f64::NAN);
            if !(0.0..=1.0).contains(&pct) {
                return Err(Error::validation(format!(
                    "{} must be between 0 and 1",
                    key
                )));
            }
        }
        keys::QUANTIFIERS_PER_PRAISE_RECEIVER => {
            if value.trim().parse::<i64>().map_or(true, |n| n < 1) {
                return Err(Error::validation(format!("{} must be at least 1", key)));
            }
        }
        _ => {}
    }
    Ok(())
}

/// Parse a stored value according to its type
pub fn normalize(setting_type: SettingType, value: &str) -> Result<SettingValue> {
    let unparsable = || {
        Error::Config(format!(
            "Stored value \"{}\" cannot be read as {}",
            value, setting_type
        ))
    };

    Ok(match setting_type {
        SettingType::Integer => {
            SettingValue::Integer(value.trim().parse().map_err(|_| unparsable())?)
        }
        SettingType::Float => SettingValue::Float(value.trim().parse().map_err(|_| unparsable())?),
        SettingType::Boolean => match value {
            "true" => SettingValue::Boolean(true),
            "false" => SettingValue::Boolean(false),
            _ => return Err(unparsable()),
        },
        SettingType::String | SettingType::Textarea => SettingValue::String(value.to_string()),
        SettingType::IntegerList => {
            if value.trim().is_empty() {
                SettingValue::IntegerList(Vec::new())
            } else {
                let list = split_list(value)
                    .map(|v| v.parse::<i64>().map_err(|_| unparsable()))
                    .collect::<Result<Vec<_>>>()?;
                SettingValue::IntegerList(list)
            }
        }
        SettingType::StringList => {
            if value.trim().is_empty() {
                SettingValue::StringList(Vec::new())
            } else {
                SettingValue::StringList(split_list(value).map(str::to_string).collect())
            }
        }
    })
}

/// Insert any missing default settings; existing values are kept
pub async fn init_default_settings(pool: &SqlitePool) -> Result<()> {
    let updated_at = to_millis(now());
    for def in DEFAULT_SETTINGS {
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO settings (key, value, type, label, description, period_overridable, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(def.key)
        .bind(def.value)
        .bind(def.setting_type.as_str())
        .bind(def.label)
        .bind(def.description)
        .bind(def.period_overridable)
        .bind(updated_at)
        .execute(pool)
        .await?;
    }
    Ok(())
}

pub async fn find_all(conn: &mut SqliteConnection) -> Result<Vec<Setting>> {
    let rows = sqlx::query("SELECT * FROM settings ORDER BY key")
        .fetch_all(&mut *conn)
        .await?;
    rows.iter().map(Setting::from_row).collect()
}

pub async fn find_setting(conn: &mut SqliteConnection, key: &str) -> Result<Setting> {
    let row = sqlx::query("SELECT * FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| Error::not_found(format!("Setting {}", key)))?;
    Setting::from_row(&row)
}

/// Typed lookup of a setting, optionally scoped to a period
pub async fn setting_value(
    conn: &mut SqliteConnection,
    key: &str,
    period_id: Option<Uuid>,
) -> Result<SettingValue> {
    let row: Option<(String, String)> = sqlx::query_as(
        r#"
        SELECT s.type, COALESCE(ps.value, s.value)
        FROM settings s
        LEFT JOIN period_settings ps ON ps.key = s.key AND ps.period_id = ?
        WHERE s.key = ?
        "#,
    )
    .bind(period_id)
    .bind(key)
    .fetch_optional(&mut *conn)
    .await?;

    let (type_str, value) = row.ok_or_else(|| Error::not_found(format!("Setting {}", key)))?;
    normalize(type_str.parse()?, &value)
}

/// Validate and store a new global value
pub async fn set_setting(conn: &mut SqliteConnection, key: &str, value: &str) -> Result<Setting> {
    let setting = find_setting(conn, key).await?;
    validate_setting(key, setting.setting_type, value)?;

    sqlx::query("UPDATE settings SET value = ?, updated_at = ? WHERE key = ?")
        .bind(value)
        .bind(to_millis(now()))
        .bind(key)
        .execute(&mut *conn)
        .await?;

    find_setting(conn, key).await
}

pub async fn find_period_settings(
    conn: &mut SqliteConnection,
    period_id: Uuid,
) -> Result<Vec<PeriodSetting>> {
    let rows = sqlx::query(
        r#"
        SELECT ps.period_id, ps.key, ps.value, s.type, s.label
        FROM period_settings ps
        JOIN settings s ON s.key = ps.key
        WHERE ps.period_id = ?
        ORDER BY ps.key
        "#,
    )
    .bind(period_id)
    .fetch_all(&mut *conn)
    .await?;
    rows.iter().map(PeriodSetting::from_row).collect()
}

async fn find_period_setting(
    conn: &mut SqliteConnection,
    period_id: Uuid,
    key: &str,
) -> Result<Option<PeriodSetting>> {
    let row = sqlx::query(
        r#"
        SELECT ps.period_id, ps.key, ps.value, s.type, s.label
        FROM period_settings ps
        JOIN settings s ON s.key = ps.key
        WHERE ps.period_id = ? AND ps.key = ?
        "#,
    )
    .bind(period_id)
    .bind(key)
    .fetch_optional(&mut *conn)
    .await?;
    row.as_ref().map(PeriodSetting::from_row).transpose()
}

/// Store a period-scoped value; only allowed while the period is OPEN
pub async fn set_period_setting(
    conn: &mut SqliteConnection,
    period_id: Uuid,
    key: &str,
    value: &str,
) -> Result<PeriodSetting> {
    let status: Option<String> = sqlx::query_scalar("SELECT status FROM periods WHERE id = ?")
        .bind(period_id)
        .fetch_optional(&mut *conn)
        .await?;
    let status: PeriodStatus = status
        .ok_or_else(|| Error::not_found("Period"))?
        .parse()?;
    if status != PeriodStatus::Open {
        return Err(Error::conflict(
            "Period settings can only be changed when period status is OPEN",
        ));
    }

    let current = find_period_setting(conn, period_id, key)
        .await?
        .ok_or_else(|| Error::not_found(format!("Period setting {}", key)))?;
    validate_setting(key, current.setting_type, value)?;

    sqlx::query("UPDATE period_settings SET value = ?, updated_at = ? WHERE period_id = ? AND key = ?")
        .bind(value)
        .bind(to_millis(now()))
        .bind(period_id)
        .bind(key)
        .execute(&mut *conn)
        .await?;

    find_period_setting(conn, period_id, key)
        .await?
        .ok_or_else(|| Error::not_found(format!("Period setting {}", key)))
}

/// Copy every period-overridable global setting into a new period
pub async fn copy_settings_to_period(conn: &mut SqliteConnection, period_id: Uuid) -> Result<u64> {
    let result = sqlx::query(
        r#"
        INSERT OR IGNORE INTO period_settings (period_id, key, value, updated_at)
        SELECT ?, key, value, ? FROM settings WHERE period_overridable = 1
        "#,
    )
    .bind(period_id)
    .bind(to_millis(now()))
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected())
}

/// Scores a quantifier may give in the period
pub async fn allowed_scores(conn: &mut SqliteConnection, period_id: Uuid) -> Result<Vec<i64>> {
    let value = setting_value(conn, keys::ALLOWED_VALUES, Some(period_id)).await?;
    value
        .as_integer_list()
        .map(<[i64]>::to_vec)
        .ok_or_else(|| Error::Config(format!("{} is not an integer list", keys::ALLOWED_VALUES)))
}

/// Fraction of the original's score given to a duplicate
pub async fn duplicate_score_percentage(
    conn: &mut SqliteConnection,
    period_id: Uuid,
) -> Result<f64> {
    let value = setting_value(conn, keys::DUPLICATE_PRAISE_PERCENTAGE, Some(period_id)).await?;
    value.as_float().ok_or_else(|| {
        Error::Config(format!("{} is not a number", keys::DUPLICATE_PRAISE_PERCENTAGE))
    })
}

/// Number of distinct quantifiers assigned to each praise item
pub async fn quantifiers_per_praise(conn: &mut SqliteConnection, period_id: Uuid) -> Result<usize> {
    let value = setting_value(conn, keys::QUANTIFIERS_PER_PRAISE_RECEIVER, Some(period_id)).await?;
    value
        .as_integer()
        .filter(|v| *v > 0)
        .map(|v| v as usize)
        .ok_or_else(|| {
            Error::Config(format!(
                "{} must be a positive integer",
                keys::QUANTIFIERS_PER_PRAISE_RECEIVER
            ))
        })
}
