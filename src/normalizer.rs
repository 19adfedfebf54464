//! Target normalization
//!
//! This module rescales window means with externally supplied statistics:
//! - `normalized = (raw - mean) / std` per vital
//! - Output columns renamed to `target_<vital>`
//! - Missing stats or a degenerate std abort the run rather than producing NaN or infinity

use crate::aggregator::WindowMean;
use crate::config::LabelConfig;
use crate::error::LabelError;
use crate::types::{FeatureStats, NormalizationStats, TargetSet, TargetVector};

/// ZMUV normalizer resolved against a fixed vital list
#[derive(Debug, Clone)]
pub struct Normalizer {
    columns: Vec<String>,
    stats: Vec<FeatureStats>,
}

impl Normalizer {
    /// Resolve stats for every vital up front, so a configuration problem
    /// surfaces before any data is processed.
    pub fn new(vitals: &[String], stats: &NormalizationStats) -> Result<Self, LabelError> {
        let mut resolved = Vec::with_capacity(vitals.len());

        for vital in vitals {
            let entry = stats.get(vital).ok_or_else(|| {
                LabelError::Configuration(format!("no normalization stats for '{}'", vital))
            })?;

            if entry.std == 0.0 || !entry.std.is_finite() {
                return Err(LabelError::Configuration(format!(
                    "standard deviation for '{}' must be finite and non-zero, got {}",
                    vital, entry.std
                )));
            }

            tracing::debug!(vital = %vital, mean = entry.mean, std = entry.std, "resolved zmuv stats");
            resolved.push(*entry);
        }

        Ok(Self {
            columns: vitals.iter().map(|v| LabelConfig::target_column(v)).collect(),
            stats: resolved,
        })
    }

    pub fn target_columns(&self) -> &[String] {
        &self.columns
    }

    pub fn normalize_value(&self, index: usize, raw: f64) -> f64 {
        let stats = &self.stats[index];
        (raw - stats.mean) / stats.std
    }

    /// Normalize window means into target vectors
    pub fn normalize(&self, means: Vec<WindowMean>) -> TargetSet {
        let vectors = means
            .into_iter()
            .map(|mean| TargetVector {
                values: mean
                    .means
                    .iter()
                    .enumerate()
                    .map(|(i, raw)| raw.map(|v| self.normalize_value(i, v)))
                    .collect(),
                encounter: mean.encounter,
                episode: mean.episode,
            })
            .collect();

        TargetSet {
            columns: self.columns.clone(),
            vectors,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::{parse_timestamp, Episode};

    fn make_mean(means: Vec<Option<f64>>) -> WindowMean {
        let start = parse_timestamp("2024-01-15 00:00:00").unwrap();
        let end = parse_timestamp("2024-01-15 20:00:00").unwrap();
        WindowMean {
            encounter: "a".to_string(),
            episode: Episode::new(start, end),
            means,
            samples: 3,
        }
    }

    fn vitals() -> Vec<String> {
        vec!["Heart Rate".to_string(), "Respiratory Rate".to_string()]
    }

    #[test]
    fn test_zmuv_and_column_names() {
        let stats: NormalizationStats =
            [("Heart Rate", 80.0, 10.0), ("Respiratory Rate", 16.0, 4.0)]
                .into_iter()
                .collect();
        let normalizer = Normalizer::new(&vitals(), &stats).unwrap();

        let targets = normalizer.normalize(vec![make_mean(vec![Some(95.0), None])]);

        assert_eq!(
            targets.columns,
            vec!["target_Heart Rate", "target_Respiratory Rate"]
        );
        assert_eq!(targets.vectors[0].values, vec![Some(1.5), None]);
    }

    #[test]
    fn test_unit_stats_leave_values_unchanged() {
        let stats: NormalizationStats = [("Heart Rate", 0.0, 1.0), ("Respiratory Rate", 0.0, 1.0)]
            .into_iter()
            .collect();
        let normalizer = Normalizer::new(&vitals(), &stats).unwrap();

        let targets = normalizer.normalize(vec![make_mean(vec![Some(91.25), Some(18.0)])]);

        assert_eq!(targets.vectors[0].values, vec![Some(91.25), Some(18.0)]);
    }

    #[test]
    fn test_missing_stats_is_configuration_error() {
        let stats: NormalizationStats = [("Heart Rate", 80.0, 10.0)].into_iter().collect();

        let err = Normalizer::new(&vitals(), &stats).unwrap_err();
        assert!(matches!(err, LabelError::Configuration(_)));
        assert!(err.to_string().contains("Respiratory Rate"));
    }

    #[test]
    fn test_zero_std_is_configuration_error() {
        let stats: NormalizationStats = [("Heart Rate", 80.0, 10.0), ("Respiratory Rate", 16.0, 0.0)]
            .into_iter()
            .collect();

        assert!(matches!(
            Normalizer::new(&vitals(), &stats),
            Err(LabelError::Configuration(_))
        ));
    }
}
