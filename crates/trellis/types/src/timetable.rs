//! Timetables: how a workflow derives a data interval from an instant.
//!
//! A timetable never schedules anything by itself here. It only answers
//! one question: given the logical instant a run is anchored at, what
//! window of source data does that run cover?

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

// ── Data Interval ────────────────────────────────────────────────────

/// The window of source data a run covers
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataInterval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DataInterval {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Zero-width interval pinned to a single instant
    pub fn exact(instant: DateTime<Utc>) -> Self {
        Self {
            start: instant,
            end: instant,
        }
    }

    pub fn duration_secs(&self) -> i64 {
        self.end.signed_duration_since(self.start).num_seconds()
    }
}

// ── Timetable ────────────────────────────────────────────────────────

/// Schedule shape of a workflow
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Timetable {
    /// No schedule; runs carry no data interval
    #[default]
    Unscheduled,
    /// Each run covers exactly the instant it was requested for
    Instant,
    /// Each run covers a fixed window ending at the reference instant
    FixedWindow { window_secs: i64 },
}

impl Timetable {
    /// Derive the data interval for a run anchored at `instant`
    pub fn infer_interval(&self, instant: DateTime<Utc>) -> Option<DataInterval> {
        match self {
            Timetable::Unscheduled => None,
            Timetable::Instant => Some(DataInterval::exact(instant)),
            Timetable::FixedWindow { window_secs } => Some(DataInterval::new(
                instant - Duration::seconds(*window_secs),
                instant,
            )),
        }
    }
}
