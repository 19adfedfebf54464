//! Target merge
//!
//! Attaches target vectors to the preprocessed per-timestep feature table.
//! The inner join here is what restricts the final dataset to eligible,
//! successfully ventilated encounters.

use crate::timeline::{annotate, Episode};
use crate::types::{LabeledRow, LabeledTable, TargetSet, TimestepTable};
use std::collections::HashMap;

pub struct Merger;

impl Merger {
    /// Join features to targets on encounter, drop rows after extubation and
    /// recompute episode-relative offsets. Targets are not masked yet.
    pub fn merge(features: TimestepTable, targets: &TargetSet) -> LabeledTable {
        let episodes: HashMap<String, Episode> = targets
            .vectors
            .iter()
            .map(|t| (t.encounter.clone(), t.episode))
            .collect();
        let values: HashMap<&str, &[Option<f64>]> = targets
            .vectors
            .iter()
            .map(|t| (t.encounter.as_str(), t.values.as_slice()))
            .collect();

        let input_rows = features.rows.len();
        let rows: Vec<LabeledRow> = annotate(features.rows, &episodes)
            .into_iter()
            .map(|annotated| LabeledRow {
                targets: values
                    .get(annotated.row.encounter.as_str())
                    .map(|v| v.to_vec())
                    .unwrap_or_default(),
                episode: annotated.episode,
                offsets: annotated.offsets,
                row: annotated.row,
            })
            .collect();

        tracing::info!(input_rows, merged_rows = rows.len(), "merged targets onto features");

        LabeledTable {
            feature_columns: features.columns,
            target_columns: targets.columns.clone(),
            rows,
        }
    }
}
