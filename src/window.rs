//! Pre-extubation aggregation window
//!
//! Keeps rows with `-extubation_win <= offset_from_extubation < -exclusion_win`:
//! the lower bound is inclusive, the upper bound exclusive. The exclusion
//! buffer drops observations taken right before the tube came out.

use crate::types::AlignedObservation;

pub struct WindowExtractor {
    extubation_win_hours: f64,
    exclusion_win_hours: f64,
}

impl WindowExtractor {
    pub fn new(extubation_win_hours: f64, exclusion_win_hours: f64) -> Self {
        Self {
            extubation_win_hours,
            exclusion_win_hours,
        }
    }

    pub fn contains(&self, offset_from_extubation: f64) -> bool {
        offset_from_extubation >= -self.extubation_win_hours
            && offset_from_extubation < -self.exclusion_win_hours
    }

    /// Narrow rows to the window, ordered by (encounter, observation time)
    pub fn extract(&self, rows: Vec<AlignedObservation>) -> Vec<AlignedObservation> {
        let mut window: Vec<_> = rows
            .into_iter()
            .filter(|row| self.contains(row.offsets.from_extubation))
            .collect();

        window.sort_by(|a, b| {
            a.row
                .encounter
                .cmp(&b.row.encounter)
                .then(a.row.observed_at.cmp(&b.row.observed_at))
        });

        tracing::info!(rows = window.len(), "extracted pre-extubation window");

        window
    }
}
