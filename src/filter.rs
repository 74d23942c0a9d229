//! Due-date windows for `/tasks/filter`.

use std::str::FromStr;

use chrono::{DateTime, Days, Months, Utc};
use serde::Deserialize;

use crate::error::{Result, ServiceError};
use crate::store::TaskQuery;

/// Supported filter periods.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    Day,
    Week,
    Month,
}

impl FromStr for Period {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "day" => Ok(Self::Day),
            "week" => Ok(Self::Week),
            "month" => Ok(Self::Month),
            _ => Err(ServiceError::InvalidArgument(
                "Invalid period. Use 'day', 'week', or 'month'.".into(),
            )),
        }
    }
}

/// Inclusive `[start, end]` due-date window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DueWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DueWindow {
    pub fn as_query(&self) -> TaskQuery {
        TaskQuery::DueBetween {
            start: self.start,
            end: self.end,
        }
    }
}

/// Window starting at `now` and ending one calendar day, seven calendar
/// days, or one calendar month later.
///
/// Month addition clamps to the last day of the target month, so
/// January 31 maps to the end of February.
pub fn due_window(period: Period, now: DateTime<Utc>) -> Result<DueWindow> {
    let end = match period {
        Period::Day => now.checked_add_days(Days::new(1)),
        Period::Week => now.checked_add_days(Days::new(7)),
        Period::Month => now.checked_add_months(Months::new(1)),
    }
    .ok_or_else(|| ServiceError::InvalidArgument("filter window is out of range".into()))?;
    Ok(DueWindow { start: now, end })
}

/// Query string of `/tasks/filter`.
#[derive(Debug, Deserialize)]
pub struct FilterParams {
    #[serde(default)]
    pub period: Option<String>,
}

impl FilterParams {
    /// Validate the period token. A missing period is invalid too.
    pub fn period(&self) -> Result<Period> {
        self.period.as_deref().unwrap_or_default().parse()
    }
}
