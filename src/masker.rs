//! Label masking
//!
//! A target is visible on a row only when the row is at or after intubation
//! and at least `extubation_win_hours` before extubation. Everywhere else it
//! is set to missing, so a model never sees the label on rows that overlap
//! the window the label was computed from.

use crate::types::{LabeledTable, RelativeOffsets};

pub struct TemporalMasker {
    extubation_win_hours: f64,
}

impl TemporalMasker {
    pub fn new(extubation_win_hours: f64) -> Self {
        Self {
            extubation_win_hours,
        }
    }

    pub fn is_label_visible(&self, offsets: &RelativeOffsets) -> bool {
        let before_intubation = offsets.from_intubation_start < 0.0;
        let in_terminal_window = offsets.from_extubation > -self.extubation_win_hours;
        !(before_intubation || in_terminal_window)
    }

    pub fn mask(&self, mut table: LabeledTable) -> LabeledTable {
        let mut masked_rows = 0usize;

        for row in table.rows.iter_mut() {
            if !self.is_label_visible(&row.offsets) {
                row.targets.iter_mut().for_each(|t| *t = None);
                masked_rows += 1;
            }
        }

        tracing::info!(
            rows = table.rows.len(),
            masked_rows,
            "masked targets outside the visibility window"
        );

        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::{parse_timestamp, Episode};
    use crate::types::{LabeledRow, TimestepRow};
    use chrono::TimeDelta;

    fn make_table(hours: &[i64]) -> LabeledTable {
        let t0 = parse_timestamp("2024-01-15 00:00:00").unwrap();
        let episode = Episode::new(t0, t0 + TimeDelta::hours(20));
        let rows = hours
            .iter()
            .map(|&h| {
                let observed_at = t0 + TimeDelta::hours(h);
                LabeledRow {
                    row: TimestepRow {
                        encounter: "a".to_string(),
                        time_step: h,
                        observed_at,
                        values: vec![],
                    },
                    episode,
                    offsets: episode.offsets(observed_at),
                    targets: vec![Some(1.0), Some(-1.0)],
                }
            })
            .collect();
        LabeledTable {
            feature_columns: vec![],
            target_columns: vec!["target_x".to_string(), "target_y".to_string()],
            rows,
        }
    }

    #[test]
    fn test_visibility_boundaries() {
        let masker = TemporalMasker::new(6.0);
        let table = masker.mask(make_table(&[-1, 0, 13, 14, 15, 20]));

        let visible: Vec<(i64, bool)> = table
            .rows
            .iter()
            .map(|r| (r.row.time_step, r.targets.iter().all(|t| t.is_some())))
            .collect();

        assert_eq!(
            visible,
            vec![
                (-1, false),
                (0, true),
                (13, true),
                (14, true),
                (15, false),
                (20, false),
            ]
        );
    }

    #[test]
    fn test_masked_rows_clear_every_target() {
        let masker = TemporalMasker::new(6.0);
        let table = masker.mask(make_table(&[18]));
        assert_eq!(table.rows[0].targets, vec![None, None]);
    }
}
