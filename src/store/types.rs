//! Core types for users and tasks.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Result, ServiceError};

/// Current schema version for the SQLite store.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// A registered account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: String,
    pub email: String,
    /// PHC-format Argon2 hash. Never serialized.
    pub password_hash: String,
    pub created_at: i64,
}

/// Task urgency.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    /// Parse a stored or path value. Accepts names and the numeric form
    /// `1` (high), `2` (medium), `3` (low).
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" | "3" => Ok(Self::Low),
            "medium" | "2" => Ok(Self::Medium),
            "high" | "1" => Ok(Self::High),
            other => Err(ServiceError::InvalidArgument(format!(
                "Invalid priority '{other}'. Use 'low', 'medium', or 'high' (or 3, 2, 1)."
            ))),
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted task. Always belongs to exactly one owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub owner_id: String,
    pub title: String,
    pub description: String,
    pub is_complete: bool,
    pub due_date: DateTime<Utc>,
    pub priority: Priority,
    pub category: String,
}

/// Client-supplied fields for a new task. The owner and id are assigned
/// by the server.
#[derive(Debug, Clone, Deserialize)]
pub struct NewTask {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub is_complete: bool,
    #[serde(deserialize_with = "deserialize_due_date")]
    pub due_date: DateTime<Utc>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub category: String,
}

impl NewTask {
    /// Trim text fields, reject an empty title, and clamp the due date to
    /// millisecond precision so it round-trips through the store unchanged.
    pub fn normalized(mut self) -> Result<Self> {
        self.title = self.title.trim().to_owned();
        if self.title.is_empty() {
            return Err(ServiceError::InvalidArgument("title is required".into()));
        }
        self.category = self.category.trim().to_owned();
        self.due_date = truncate_to_millis(self.due_date)?;
        Ok(self)
    }
}

/// Partial update. Absent fields keep their stored value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_complete: Option<bool>,
    #[serde(default, deserialize_with = "deserialize_optional_due_date")]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub category: Option<String>,
}

impl TaskPatch {
    /// Same rules as [`NewTask::normalized`] for the fields that are present.
    pub fn normalized(mut self) -> Result<Self> {
        if let Some(title) = self.title.as_mut() {
            *title = title.trim().to_owned();
            if title.is_empty() {
                return Err(ServiceError::InvalidArgument("title must not be empty".into()));
            }
        }
        if let Some(category) = self.category.as_mut() {
            *category = category.trim().to_owned();
        }
        if let Some(due) = self.due_date {
            self.due_date = Some(truncate_to_millis(due)?);
        }
        Ok(self)
    }

    /// Merge into an existing task.
    pub fn apply_to(self, task: &mut Task) {
        if let Some(title) = self.title {
            task.title = title;
        }
        if let Some(description) = self.description {
            task.description = description;
        }
        if let Some(is_complete) = self.is_complete {
            task.is_complete = is_complete;
        }
        if let Some(due_date) = self.due_date {
            task.due_date = due_date;
        }
        if let Some(priority) = self.priority {
            task.priority = priority;
        }
        if let Some(category) = self.category {
            task.category = category;
        }
    }
}

/// Owner-scoped task selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskQuery {
    /// Every task of the owner.
    All,
    /// `start <= due_date <= end`.
    DueBetween {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    /// `due_date < now` and not complete.
    Overdue { now: DateTime<Utc> },
    /// Exact category match.
    Category(String),
    /// Exact priority match.
    Priority(Priority),
}

/// Parse a due date: RFC 3339 with an offset, or a naive timestamp / date
/// that is taken to be UTC.
pub fn parse_due_date(raw: &str) -> std::result::Result<DateTime<Utc>, String> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Ok(naive.and_utc());
        }
    }
    if let Some(naive) = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
    {
        return Ok(naive.and_utc());
    }
    Err(format!("invalid due_date '{raw}': expected an RFC 3339 timestamp"))
}

fn deserialize_due_date<'de, D>(deserializer: D) -> std::result::Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_due_date(&raw).map_err(serde::de::Error::custom)
}

fn deserialize_optional_due_date<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    raw.map(|s| parse_due_date(&s).map_err(serde::de::Error::custom))
        .transpose()
}

/// Drop sub-millisecond precision.
pub fn truncate_to_millis(dt: DateTime<Utc>) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(dt.timestamp_millis())
        .ok_or_else(|| ServiceError::InvalidArgument("due_date is out of range".into()))
}

/// Generate a new record ID.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Get the current time as Unix epoch seconds.
pub fn now_epoch_secs() -> i64 {
    Utc::now().timestamp()
}
