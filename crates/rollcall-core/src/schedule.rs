//! Practice schedule: loading the practice list and picking this week's event.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("Failed to read practice list {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse practice list {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PracticeEvent {
    pub date: NaiveDate,
    #[serde(deserialize_with = "deserialize_time")]
    pub start: NaiveTime,
    #[serde(deserialize_with = "deserialize_time")]
    pub end: NaiveTime,
}

fn deserialize_time<'de, D>(deserializer: D) -> Result<NaiveTime, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    NaiveTime::parse_from_str(&raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(&raw, "%H:%M:%S"))
        .map_err(|e| serde::de::Error::custom(format!("invalid time '{}': {}", raw, e)))
}

/// Outcome of looking for this week's practice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    NoUpcoming,
    NotThisWeek {
        next: NaiveDate,
        week_end: NaiveDateTime,
    },
    ThisWeek {
        event: PracticeEvent,
        label: String,
    },
}

impl Resolution {
    pub fn label(&self) -> Option<&str> {
        match self {
            Resolution::ThisWeek { label, .. } => Some(label),
            _ => None,
        }
    }

    pub fn into_label(self) -> Option<String> {
        match self {
            Resolution::ThisWeek { label, .. } => Some(label),
            _ => None,
        }
    }
}

pub async fn load_practices(path: &Path) -> Result<Vec<PracticeEvent>, ScheduleError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ScheduleError::Io {
            path: path.display().to_string(),
            source,
        })?;
    parse_practices(&content).map_err(|source| ScheduleError::Parse {
        path: path.display().to_string(),
        source,
    })
}

pub fn parse_practices(content: &str) -> Result<Vec<PracticeEvent>, serde_json::Error> {
    serde_json::from_str(content)
}

/// Last instant (Sunday 23:59:59.999) of the Monday-started week containing `now`.
pub fn end_of_week(now: NaiveDateTime) -> NaiveDateTime {
    let days_to_sunday = 6 - i64::from(now.weekday().num_days_from_monday());
    let sunday = now.date() + Duration::days(days_to_sunday);
    sunday.and_time(NaiveTime::MIN) + Duration::days(1) - Duration::milliseconds(1)
}

/// Pick the first event dated after `now` and keep it only if it falls in the current week.
///
/// Event dates are compared at midnight, so an event on today's date is never selected.
/// The list is assumed sorted ascending.
pub fn resolve(events: &[PracticeEvent], now: NaiveDateTime) -> Resolution {
    let Some(next) = events
        .iter()
        .find(|event| event.date.and_time(NaiveTime::MIN) > now)
    else {
        return Resolution::NoUpcoming;
    };

    let week_end = end_of_week(now);
    if next.date.and_time(NaiveTime::MIN) >= week_end {
        return Resolution::NotThisWeek {
            next: next.date,
            week_end,
        };
    }

    Resolution::ThisWeek {
        event: next.clone(),
        label: format_label(next),
    }
}

/// Render an event as e.g. `Friday, October 16 @ 6:00PM-7:30PM`.
pub fn format_label(event: &PracticeEvent) -> String {
    let day = event.date.format("%A, %B %-d");
    let start = event.date.and_time(event.start).format("%-I:%M%p");
    let end = event.date.and_time(event.end).format("%-I:%M%p");
    format!("{} @ {}-{}", day, start, end)
}

/// Load the practice list at `path` and return the label of this week's practice, if any.
pub async fn next_practice_this_week(
    path: &Path,
    now: NaiveDateTime,
) -> Result<Option<String>, ScheduleError> {
    let events = load_practices(path).await?;
    Ok(resolve(&events, now).into_label())
}
