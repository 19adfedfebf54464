//! Episode-relative time
//!
//! Both the aggregation path and the final merge need the same two
//! operations: join rows to their encounter's episode, dropping anything
//! recorded after extubation, and annotate each surviving row with its
//! signed offsets from intubation and extubation. [`annotate`] does both.

use crate::error::LabelError;
use crate::types::{RelativeOffsets, VentilationEvent};
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeDelta};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const MICROS_PER_HOUR: f64 = 3_600_000_000.0;

/// Accepted naive timestamp layouts, tried in order after RFC 3339
const TIMESTAMP_FORMATS: [&str; 5] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

/// Anything carrying an encounter id and an absolute observation time
pub trait Observed {
    fn encounter(&self) -> &str;
    fn observed_at(&self) -> NaiveDateTime;
}

/// A parsed ventilation episode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Episode {
    /// Intubation time
    pub start: NaiveDateTime,
    /// Extubation time
    pub end: NaiveDateTime,
}

impl Episode {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self { start, end }
    }

    /// Parse an event's start and end; missing or malformed times are fatal.
    pub fn from_event(event: &VentilationEvent) -> Result<Self, LabelError> {
        let start = parse_timestamp(&event.start).map_err(|e| {
            LabelError::TimeParse(format!("encounter {} start: {}", event.encounter, e))
        })?;
        let end = parse_timestamp(&event.end).map_err(|e| {
            LabelError::TimeParse(format!("encounter {} end: {}", event.encounter, e))
        })?;
        Ok(Self { start, end })
    }

    pub fn offsets(&self, observed_at: NaiveDateTime) -> RelativeOffsets {
        RelativeOffsets {
            from_intubation_start: hours(observed_at - self.start),
            from_extubation: hours(observed_at - self.end),
        }
    }

    /// Whether an observation is at or before extubation
    pub fn admits(&self, observed_at: NaiveDateTime) -> bool {
        observed_at <= self.end
    }
}

/// A row joined to its encounter's episode
#[derive(Debug, Clone, PartialEq)]
pub struct Annotated<R> {
    pub row: R,
    pub episode: Episode,
    pub offsets: RelativeOffsets,
}

impl<R: Observed> Annotated<R> {
    pub fn encounter(&self) -> &str {
        self.row.encounter()
    }
}

/// Inner-join rows to episodes, drop rows after extubation, and attach
/// relative offsets. Row order is preserved.
pub fn annotate<R, I>(rows: I, episodes: &HashMap<String, Episode>) -> Vec<Annotated<R>>
where
    R: Observed,
    I: IntoIterator<Item = R>,
{
    rows.into_iter()
        .filter_map(|row| {
            let episode = *episodes.get(row.encounter())?;
            let observed_at = row.observed_at();
            if !episode.admits(observed_at) {
                return None;
            }
            Some(Annotated {
                offsets: episode.offsets(observed_at),
                episode,
                row,
            })
        })
        .collect()
}

/// Signed duration in fractional hours
pub fn hours(delta: TimeDelta) -> f64 {
    match delta.num_microseconds() {
        Some(us) => us as f64 / MICROS_PER_HOUR,
        None => delta.num_milliseconds() as f64 / (MICROS_PER_HOUR / 1000.0),
    }
}

/// Parse a timestamp into a naive (wall clock) time.
///
/// Offsets carried by RFC 3339 input are folded into UTC. A bare date is
/// read as midnight.
pub fn parse_timestamp(text: &str) -> Result<NaiveDateTime, LabelError> {
    let trimmed = text.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("nat") || trimmed.eq_ignore_ascii_case("nan") {
        return Err(LabelError::TimeParse("missing timestamp".to_string()));
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.naive_utc());
    }

    for format in TIMESTAMP_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(dt);
        }
    }

    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(|| LabelError::TimeParse(format!("unrecognized timestamp '{}'", trimmed)))
}

/// Render a timestamp the way the output table stores it
pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format("%Y-%m-%d %H:%M:%S%.f").to_string()
}
