//! Core types for the labeling pipeline
//!
//! This module defines the tables that flow between stages: ventilation
//! events, per-timestep series, aligned observations, target vectors and the
//! final labeled table.

use crate::error::LabelError;
use crate::timeline::{Annotated, Episode, Observed};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// One intubation attempt as read from the events input.
///
/// Start and end are kept as text until an encounter is actually joined to
/// vitals, so that only times that matter can fail to parse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VentilationEvent {
    pub encounter: String,
    pub start: String,
    pub end: String,
    pub success: bool,
}

/// A per-timestep table keyed by (encounter, time step).
///
/// Used for both the raw vitals series and the preprocessed feature series.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimestepTable {
    /// Names of the value columns, in file order
    pub columns: Vec<String>,
    pub rows: Vec<TimestepRow>,
}

/// One (encounter, time step) row
#[derive(Debug, Clone, PartialEq)]
pub struct TimestepRow {
    pub encounter: String,
    pub time_step: i64,
    /// Absolute observation time
    pub observed_at: NaiveDateTime,
    /// One entry per table column; `None` is missing
    pub values: Vec<Option<f64>>,
}

impl Observed for TimestepRow {
    fn encounter(&self) -> &str {
        &self.encounter
    }

    fn observed_at(&self) -> NaiveDateTime {
        self.observed_at
    }
}

impl TimestepTable {
    pub fn column_index(&self, name: &str, input: &str) -> Result<usize, LabelError> {
        self.columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| LabelError::missing_column(name, input))
    }

    /// Keep only the named columns, in the order given.
    pub fn project(self, names: &[String], input: &str) -> Result<Vec<VitalObservation>, LabelError> {
        let indices = names
            .iter()
            .map(|name| self.column_index(name, input))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(self
            .rows
            .into_iter()
            .map(|row| VitalObservation {
                vitals: indices.iter().map(|&i| row.values[i]).collect(),
                encounter: row.encounter,
                time_step: row.time_step,
                observed_at: row.observed_at,
            })
            .collect())
    }
}

/// Configured vitals at one (encounter, time step)
#[derive(Debug, Clone, PartialEq)]
pub struct VitalObservation {
    pub encounter: String,
    pub time_step: i64,
    pub observed_at: NaiveDateTime,
    /// One entry per configured vital
    pub vitals: Vec<Option<f64>>,
}

impl Observed for VitalObservation {
    fn encounter(&self) -> &str {
        &self.encounter
    }

    fn observed_at(&self) -> NaiveDateTime {
        self.observed_at
    }
}

/// Signed hours between an observation and the episode boundaries
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RelativeOffsets {
    /// `observed_at - start`; negative before intubation
    pub from_intubation_start: f64,
    /// `observed_at - end`; negative before extubation
    pub from_extubation: f64,
}

/// Vitals joined to their encounter's episode
pub type AlignedObservation = Annotated<VitalObservation>;

/// Mean and standard deviation for one feature
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureStats {
    pub mean: f64,
    pub std: f64,
}

/// Externally supplied ZMUV statistics, keyed by feature name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizationStats {
    entries: BTreeMap<String, FeatureStats>,
}

impl NormalizationStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, feature: impl Into<String>, mean: f64, std: f64) {
        self.entries.insert(feature.into(), FeatureStats { mean, std });
    }

    pub fn get(&self, feature: &str) -> Option<&FeatureStats> {
        self.entries.get(feature)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, f64, f64)> for NormalizationStats {
    fn from_iter<I: IntoIterator<Item = (S, f64, f64)>>(iter: I) -> Self {
        let mut stats = NormalizationStats::new();
        for (feature, mean, std) in iter {
            stats.insert(feature, mean, std);
        }
        stats
    }
}

/// Normalized targets for one eligible encounter
#[derive(Debug, Clone, PartialEq)]
pub struct TargetVector {
    pub encounter: String,
    pub episode: Episode,
    /// One entry per target column
    pub values: Vec<Option<f64>>,
}

/// All target vectors plus their `target_`-prefixed column names
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TargetSet {
    pub columns: Vec<String>,
    pub vectors: Vec<TargetVector>,
}

/// One persisted row: features, targets, episode and offsets
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledRow {
    pub row: TimestepRow,
    pub episode: Episode,
    pub offsets: RelativeOffsets,
    pub targets: Vec<Option<f64>>,
}

/// The final labeled dataset
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabeledTable {
    pub feature_columns: Vec<String>,
    pub target_columns: Vec<String>,
    pub rows: Vec<LabeledRow>,
}

impl LabeledTable {
    /// Order rows by the (encounter, time step) index
    pub fn sort_by_index(&mut self) {
        self.rows.sort_by(|a, b| {
            a.row
                .encounter
                .cmp(&b.row.encounter)
                .then(a.row.time_step.cmp(&b.row.time_step))
        });
    }

    pub fn encounter_count(&self) -> usize {
        distinct_encounters(self.rows.iter().map(|r| r.row.encounter.as_str()))
    }
}

/// Encounter counts at each stage, for auditing dataset size changes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CohortAudit {
    /// Distinct encounters in the events input
    pub events_encounters: usize,
    /// First episode was unsuccessful
    pub no_successful_first_episode: usize,
    /// Successful first episode but no vitals at or before extubation
    pub no_vital_rows: usize,
    /// Ventilated for no longer than the minimum observation span
    pub insufficient_observation: usize,
    /// Eligible, but no rows inside the aggregation window
    pub empty_window: usize,
    /// Labeled, but absent from the preprocessed feature table
    pub missing_features: usize,
    /// Encounters in the final table
    pub labeled_encounters: usize,
    /// Rows in the final table
    pub labeled_rows: usize,
    /// Rows with at least one visible target
    pub visible_label_rows: usize,
}

impl CohortAudit {
    pub fn to_json(&self) -> Result<String, LabelError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Emit one log line per non-empty exclusion category
    pub fn log(&self) {
        let exclusions = [
            ("no successful first episode", self.no_successful_first_episode),
            ("no vital rows", self.no_vital_rows),
            ("insufficient observation span", self.insufficient_observation),
            ("empty aggregation window", self.empty_window),
            ("missing from feature table", self.missing_features),
        ];
        for (reason, count) in exclusions {
            if count > 0 {
                tracing::warn!(reason, count, "encounters excluded");
            }
        }
        tracing::info!(
            encounters = self.labeled_encounters,
            rows = self.labeled_rows,
            visible = self.visible_label_rows,
            "labeled cohort"
        );
    }
}

/// Count distinct encounter ids
pub fn distinct_encounters<'a>(ids: impl IntoIterator<Item = &'a str>) -> usize {
    ids.into_iter().collect::<HashSet<_>>().len()
}
