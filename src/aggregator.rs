//! Window aggregation
//!
//! Computes the per-encounter arithmetic mean of each vital over the window
//! rows. Missing values are skipped; a vital never observed in the window
//! has no mean.

use crate::timeline::Episode;
use crate::types::AlignedObservation;
use std::collections::BTreeMap;

/// Unnormalized window means for one encounter
#[derive(Debug, Clone, PartialEq)]
pub struct WindowMean {
    pub encounter: String,
    pub episode: Episode,
    /// One entry per configured vital
    pub means: Vec<Option<f64>>,
    /// Window rows contributing to this encounter
    pub samples: usize,
}

/// Running sums for one encounter
struct MeanAccumulator {
    episode: Episode,
    sums: Vec<f64>,
    counts: Vec<usize>,
    samples: usize,
}

impl MeanAccumulator {
    fn new(episode: Episode, width: usize) -> Self {
        Self {
            episode,
            sums: vec![0.0; width],
            counts: vec![0; width],
            samples: 0,
        }
    }

    fn add(&mut self, vitals: &[Option<f64>]) {
        self.samples += 1;
        for (i, value) in vitals.iter().enumerate() {
            if let Some(v) = value.filter(|v| !v.is_nan()) {
                self.sums[i] += v;
                self.counts[i] += 1;
            }
        }
    }

    fn means(&self) -> Vec<Option<f64>> {
        self.sums
            .iter()
            .zip(&self.counts)
            .map(|(&sum, &count)| (count > 0).then(|| sum / count as f64))
            .collect()
    }
}

pub struct Aggregator;

impl Aggregator {
    /// Mean of each vital per encounter, sorted by encounter.
    ///
    /// Encounters with no window rows do not appear in the output.
    pub fn aggregate(rows: &[AlignedObservation]) -> Vec<WindowMean> {
        let mut by_encounter: BTreeMap<&str, MeanAccumulator> = BTreeMap::new();

        for row in rows {
            by_encounter
                .entry(row.encounter())
                .or_insert_with(|| MeanAccumulator::new(row.episode, row.row.vitals.len()))
                .add(&row.row.vitals);
        }

        let means: Vec<WindowMean> = by_encounter
            .into_iter()
            .map(|(encounter, acc)| WindowMean {
                encounter: encounter.to_string(),
                episode: acc.episode,
                means: acc.means(),
                samples: acc.samples,
            })
            .collect();

        tracing::info!(encounters = means.len(), "aggregated window means");

        means
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::{annotate, parse_timestamp};
    use crate::types::VitalObservation;
    use chrono::TimeDelta;
    use std::collections::HashMap;

    fn make_rows(encounter: &str, values: &[[Option<f64>; 2]]) -> Vec<AlignedObservation> {
        let start = parse_timestamp("2024-01-15 00:00:00").unwrap();
        let mut episodes = HashMap::new();
        episodes.insert(
            encounter.to_string(),
            Episode::new(start, start + TimeDelta::hours(20)),
        );

        let rows = values.iter().enumerate().map(|(i, v)| VitalObservation {
            encounter: encounter.to_string(),
            time_step: i as i64,
            observed_at: start + TimeDelta::hours(15 + i as i64),
            vitals: v.to_vec(),
        });
        annotate(rows, &episodes)
    }

    #[test]
    fn test_mean_of_three_samples() {
        let rows = make_rows(
            "a",
            &[
                [Some(80.0), Some(20.0)],
                [Some(90.0), Some(22.0)],
                [Some(100.0), Some(24.0)],
            ],
        );

        let means = Aggregator::aggregate(&rows);

        assert_eq!(means.len(), 1);
        assert_eq!(means[0].means, vec![Some(90.0), Some(22.0)]);
        assert_eq!(means[0].samples, 3);
    }

    #[test]
    fn test_missing_values_are_skipped() {
        let rows = make_rows(
            "a",
            &[[Some(80.0), None], [None, None], [Some(100.0), Some(f64::NAN)]],
        );

        let means = Aggregator::aggregate(&rows);

        assert_eq!(means[0].means, vec![Some(90.0), None]);
    }

    #[test]
    fn test_one_row_per_encounter_sorted() {
        let mut rows = make_rows("b", &[[Some(1.0), Some(1.0)]]);
        rows.extend(make_rows("a", &[[Some(2.0), Some(2.0)]]));

        let encounters: Vec<_> = Aggregator::aggregate(&rows)
            .into_iter()
            .map(|m| m.encounter)
            .collect();

        assert_eq!(encounters, vec!["a", "b"]);
    }

    #[test]
    fn test_empty_window_yields_nothing() {
        assert!(Aggregator::aggregate(&[]).is_empty());
    }
}
