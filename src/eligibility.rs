//! Minimum-observation eligibility
//!
//! An encounter is kept only if it was observed on the ventilator for longer
//! than the configured span. The comparison is strict: an encounter whose
//! latest observation is exactly `min_int_obs_hours` after intubation is
//! dropped. Failing encounters lose every row, not just the short ones.

use crate::types::AlignedObservation;
use std::collections::{HashMap, HashSet};

pub struct EligibilityFilter {
    min_int_obs_hours: f64,
}

impl EligibilityFilter {
    pub fn new(min_int_obs_hours: f64) -> Self {
        Self { min_int_obs_hours }
    }

    pub fn is_eligible(&self, max_hours_since_intubation: f64) -> bool {
        max_hours_since_intubation > self.min_int_obs_hours
    }

    pub fn filter(&self, rows: Vec<AlignedObservation>) -> Vec<AlignedObservation> {
        let mut max_offset: HashMap<&str, f64> = HashMap::new();
        for row in &rows {
            let offset = row.offsets.from_intubation_start;
            max_offset
                .entry(row.encounter())
                .and_modify(|m| *m = m.max(offset))
                .or_insert(offset);
        }

        let eligible: HashSet<String> = max_offset
            .iter()
            .filter(|(_, &max)| self.is_eligible(max))
            .map(|(encounter, _)| encounter.to_string())
            .collect();

        tracing::info!(
            encounters = max_offset.len(),
            eligible = eligible.len(),
            min_int_obs_hours = self.min_int_obs_hours,
            "applied minimum ventilation span"
        );

        rows.into_iter()
            .filter(|row| eligible.contains(row.encounter()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::{annotate, parse_timestamp, Episode};
    use crate::types::VitalObservation;
    use chrono::TimeDelta;

    /// Hourly observations from intubation up to `last_hour`, for one encounter
    fn make_rows(encounter: &str, last_hour: i64) -> Vec<AlignedObservation> {
        let start = parse_timestamp("2024-01-15 00:00:00").unwrap();
        let end = start + TimeDelta::hours(48);
        let mut episodes = std::collections::HashMap::new();
        episodes.insert(encounter.to_string(), Episode::new(start, end));

        let rows = (0..=last_hour).map(|h| VitalObservation {
            encounter: encounter.to_string(),
            time_step: h,
            observed_at: start + TimeDelta::hours(h),
            vitals: vec![Some(1.0)],
        });
        annotate(rows, &episodes)
    }

    #[test]
    fn test_exact_threshold_is_excluded() {
        let filter = EligibilityFilter::new(12.0);
        assert!(filter.filter(make_rows("a", 12)).is_empty());
    }

    #[test]
    fn test_just_above_threshold_is_kept_whole() {
        let filter = EligibilityFilter::new(12.0);
        let mut rows = make_rows("a", 12);

        // One extra observation a minute past the threshold
        let mut extra = rows[0].clone();
        extra.row.observed_at += TimeDelta::minutes(12 * 60 + 1);
        extra.offsets = extra.episode.offsets(extra.row.observed_at);
        rows.push(extra);

        let kept = filter.filter(rows);
        assert_eq!(kept.len(), 14);
    }

    #[test]
    fn test_filters_per_encounter() {
        let filter = EligibilityFilter::new(12.0);
        let mut rows = make_rows("short", 6);
        rows.extend(make_rows("long", 20));

        let kept = filter.filter(rows);

        assert_eq!(kept.len(), 21);
        assert!(kept.iter().all(|r| r.encounter() == "long"));
    }
}
