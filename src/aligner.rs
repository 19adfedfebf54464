//! Vital alignment
//!
//! Forward-fills raw vitals within each encounter, joins them to the selected
//! episode and annotates every row with its episode-relative offsets.

use crate::error::LabelError;
use crate::timeline::{annotate, Episode};
use crate::types::{AlignedObservation, VentilationEvent, VitalObservation};
use std::collections::{HashMap, HashSet};

/// Joins vitals to episodes
pub struct TimeAligner;

impl TimeAligner {
    /// Join observations to their encounter's episode.
    ///
    /// Encounters without a selected event are dropped, as are rows recorded
    /// after extubation. Episode times are parsed only for encounters that
    /// have vitals; a bad time there aborts the run.
    pub fn align(
        observations: Vec<VitalObservation>,
        events: &[VentilationEvent],
    ) -> Result<Vec<AlignedObservation>, LabelError> {
        let episodes = {
            let observed: HashSet<&str> = observations.iter().map(|o| o.encounter.as_str()).collect();
            let mut episodes = HashMap::new();
            for event in events {
                if observed.contains(event.encounter.as_str()) {
                    episodes.insert(event.encounter.clone(), Episode::from_event(event)?);
                }
            }
            episodes
        };

        let input_rows = observations.len();
        let aligned = annotate(observations, &episodes);

        tracing::info!(
            input_rows,
            aligned_rows = aligned.len(),
            episodes = episodes.len(),
            "aligned vitals to ventilation episodes"
        );

        Ok(aligned)
    }
}

/// Forward-fill missing vitals within each encounter.
///
/// Rows are ordered by (encounter, time step) first; a value never carries
/// over from one encounter into the next.
pub fn forward_fill_by_encounter(mut observations: Vec<VitalObservation>) -> Vec<VitalObservation> {
    observations.sort_by(|a, b| {
        a.encounter
            .cmp(&b.encounter)
            .then(a.time_step.cmp(&b.time_step))
    });

    let mut last: Vec<Option<f64>> = Vec::new();
    let mut current: Option<String> = None;

    for obs in observations.iter_mut() {
        if current.as_deref() != Some(obs.encounter.as_str()) {
            current = Some(obs.encounter.clone());
            last = vec![None; obs.vitals.len()];
        }
        for (value, carried) in obs.vitals.iter_mut().zip(last.iter_mut()) {
            if value.is_some() {
                *carried = *value;
            } else {
                *value = *carried;
            }
        }
    }

    observations
}
