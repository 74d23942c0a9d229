//! Reminder timing policy and the records that flow through the scheduler.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::store::Task;

/// Default fraction of the remaining time at which reminders fire.
pub const DEFAULT_LEAD_FRACTION: f64 = 0.7;

/// When a reminder should fire, relative to its creation instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReminderPlan {
    pub delay: Duration,
    pub fire_at: DateTime<Utc>,
}

/// Compute `delay = fraction * (due - now)`.
///
/// Returns `None` when the delay is not strictly positive, which covers
/// overdue tasks and tasks due exactly now. The delay is rounded to whole
/// milliseconds.
pub fn plan_reminder(
    now: DateTime<Utc>,
    due: DateTime<Utc>,
    fraction: f64,
) -> Option<ReminderPlan> {
    let remaining = due.signed_duration_since(now);
    let remaining_secs =
        remaining.num_seconds() as f64 + f64::from(remaining.subsec_nanos()) / 1_000_000_000.0;
    let delay_secs = fraction * remaining_secs;
    if !delay_secs.is_finite() || delay_secs <= 0.0 {
        return None;
    }

    // Millisecond resolution, matching the delay queue.
    let delay_ms = (delay_secs * 1000.0).round() as u64;
    let fire_at = now.checked_add_signed(chrono::Duration::milliseconds(
        i64::try_from(delay_ms).ok()?,
    ))?;
    Some(ReminderPlan {
        delay: Duration::from_millis(delay_ms),
        fire_at,
    })
}

/// An armed reminder. Holds the task as it was at creation; later edits
/// to the stored task are not reflected.
#[derive(Debug, Clone)]
pub struct ScheduledReminder {
    pub snapshot: Task,
    /// Address captured from the creator's identity.
    pub recipient: Option<String>,
    pub fire_at: DateTime<Utc>,
}

impl ScheduledReminder {
    /// The recipient if it looks deliverable.
    pub fn resolved_recipient(&self) -> Option<&str> {
        self.recipient
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty() && r.contains('@'))
    }
}

/// What happened to one reminder attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum DeliveryStatus {
    Sent,
    /// Dropped without trying to send (e.g. no resolvable recipient).
    Skipped(String),
    Failed(String),
}

/// Record of one finished reminder attempt.
#[derive(Debug, Clone, Serialize)]
pub struct ReminderOutcome {
    pub task_id: String,
    pub recipient: Option<String>,
    pub fire_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub status: DeliveryStatus,
}
