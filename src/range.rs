//! Date span selection over the reading and exercise series
//!
//! Bounds are calendar dates and both are inclusive: a range ending on
//! 2024-03-10 keeps an evening reading taken that day.

use crate::error::{BpImpactError, Result};
use crate::models::{BpReading, ExerciseEvent};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Records that carry the instant they were taken
pub trait Timestamped {
    fn timestamp(&self) -> NaiveDateTime;
}

impl Timestamped for BpReading {
    fn timestamp(&self) -> NaiveDateTime {
        self.timestamp
    }
}

impl Timestamped for ExerciseEvent {
    fn timestamp(&self) -> NaiveDateTime {
        self.timestamp
    }
}

/// Optional first and last calendar day to keep
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    /// Build a range; a start after the end is rejected
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Result<Self> {
        if let (Some(start), Some(end)) = (start, end) {
            if start > end {
                return Err(BpImpactError::Validation(format!(
                    "date range start {} is after its end {}",
                    start, end
                )));
            }
        }
        Ok(DateRange { start, end })
    }

    /// Range that keeps everything
    pub fn all() -> Self {
        Self::default()
    }

    pub fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    pub fn contains(&self, timestamp: NaiveDateTime) -> bool {
        let date = timestamp.date();
        self.start.map_or(true, |start| date >= start) && self.end.map_or(true, |end| date <= end)
    }

    /// Records falling inside the range, in their original order
    pub fn filter<T: Timestamped + Clone>(&self, records: &[T]) -> Vec<T> {
        if self.is_unbounded() {
            return records.to_vec();
        }

        let kept: Vec<T> = records
            .iter()
            .filter(|record| self.contains(record.timestamp()))
            .cloned()
            .collect();

        debug!(
            range = %self,
            total = records.len(),
            kept = kept.len(),
            "Applied date range"
        );
        kept
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.start, self.end) {
            (Some(start), Some(end)) => write!(f, "{} to {}", start, end),
            (Some(start), None) => write!(f, "from {}", start),
            (None, Some(end)) => write!(f, "until {}", end),
            (None, None) => f.write_str("all dates"),
        }
    }
}

/// First and last calendar day covered by either series
pub fn data_span(
    readings: &[BpReading],
    events: &[ExerciseEvent],
) -> Option<(NaiveDate, NaiveDate)> {
    let dates = readings
        .iter()
        .map(|reading| reading.timestamp.date())
        .chain(events.iter().map(|event| event.timestamp.date()));

    dates.fold(None, |span, date| match span {
        None => Some((date, date)),
        Some((first, last)) => Some((first.min(date), last.max(date))),
    })
}
