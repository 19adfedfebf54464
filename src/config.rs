//! Run configuration
//!
//! Defaults are the extubation-pass cohort constants: a 12 hour minimum
//! ventilation span, a 6 hour pre-extubation window and a 5 minute exclusion
//! buffer next to extubation.

use crate::error::LabelError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Minimum hours on the ventilator before an encounter is eligible
pub const DEFAULT_MIN_INT_OBS_HOURS: f64 = 12.0;

/// Hours immediately before extubation excluded from aggregation
pub const DEFAULT_EXCLUSION_WIN_HOURS: f64 = 0.0833;

/// Lookback window (hours) before extubation used for aggregation
pub const DEFAULT_EXTUBATION_WIN_HOURS: f64 = 6.0;

/// Vitals summarized into targets, by column name
pub const DEFAULT_VITALS: [&str; 5] = [
    "Heart Rate",
    "Diastolic Blood Pressure",
    "Systolic Blood Pressure",
    "Respiratory Rate",
    "Bicarbonate Serum",
];

/// Dataset split to process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dataset {
    Train,
    #[default]
    Valid,
    Test,
}

impl Dataset {
    pub fn as_str(&self) -> &'static str {
        match self {
            Dataset::Train => "train",
            Dataset::Valid => "valid",
            Dataset::Test => "test",
        }
    }
}

impl std::str::FromStr for Dataset {
    type Err = LabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "train" => Ok(Dataset::Train),
            "valid" => Ok(Dataset::Valid),
            "test" => Ok(Dataset::Test),
            other => Err(LabelError::Configuration(format!(
                "unknown dataset split '{}'",
                other
            ))),
        }
    }
}

/// Labeling constants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelConfig {
    /// Eligibility threshold on max hours since intubation (strict `>`)
    pub min_int_obs_hours: f64,
    /// Buffer before extubation excluded from the aggregation window
    pub exclusion_win_hours: f64,
    /// Aggregation lookback before extubation; also the masking horizon
    pub extubation_win_hours: f64,
    /// Vital columns to aggregate into targets
    pub vitals: Vec<String>,
    /// Split being processed
    pub dataset: Dataset,
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self {
            min_int_obs_hours: DEFAULT_MIN_INT_OBS_HOURS,
            exclusion_win_hours: DEFAULT_EXCLUSION_WIN_HOURS,
            extubation_win_hours: DEFAULT_EXTUBATION_WIN_HOURS,
            vitals: DEFAULT_VITALS.iter().map(|v| v.to_string()).collect(),
            dataset: Dataset::default(),
        }
    }
}

impl LabelConfig {
    /// Reject window settings that would make the aggregation window empty
    /// or ill-defined.
    pub fn validate(&self) -> Result<(), LabelError> {
        for (name, value) in [
            ("min_int_obs_hours", self.min_int_obs_hours),
            ("exclusion_win_hours", self.exclusion_win_hours),
            ("extubation_win_hours", self.extubation_win_hours),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(LabelError::Configuration(format!(
                    "{} must be a non-negative number, got {}",
                    name, value
                )));
            }
        }

        if self.exclusion_win_hours >= self.extubation_win_hours {
            return Err(LabelError::Configuration(format!(
                "exclusion window ({}h) must be shorter than extubation window ({}h)",
                self.exclusion_win_hours, self.extubation_win_hours
            )));
        }

        if self.vitals.is_empty() {
            return Err(LabelError::Configuration(
                "at least one vital is required".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for vital in &self.vitals {
            if !seen.insert(vital.as_str()) {
                return Err(LabelError::Configuration(format!(
                    "vital '{}' listed more than once",
                    vital
                )));
            }
        }

        Ok(())
    }

    /// Target column name for a vital
    pub fn target_column(vital: &str) -> String {
        format!("target_{}", vital)
    }

    /// Output file name, following the `{split}_Patients_zmuv_PASS_...` convention
    pub fn output_file_name(&self) -> String {
        format!(
            "{}_Patients_zmuv_PASS_{}_minObs_{}_extWin.csv",
            self.dataset.as_str(),
            self.min_int_obs_hours,
            self.extubation_win_hours
        )
    }
}

/// Locations of the four inputs and the output directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataPaths {
    /// Ventilation events CSV
    pub events: PathBuf,
    /// Directory holding `{split}Patients.csv` raw series
    pub raw_dir: PathBuf,
    /// Directory holding `{split}Patients_zmuv_zffill.csv` preprocessed series
    pub preprocessed_dir: PathBuf,
    /// Per-feature mean/std CSV
    pub normalization_stats: PathBuf,
    /// Directory the labeled table is written to
    pub output_dir: PathBuf,
}

impl Default for DataPaths {
    fn default() -> Self {
        let data_dir = PathBuf::from("data");
        Self {
            events: data_dir.join("raw").join("o2_vent_events.csv"),
            raw_dir: data_dir.join("icu"),
            preprocessed_dir: data_dir.join("icu").join("preprocessed"),
            normalization_stats: data_dir.join("settings").join("zmuv_info.csv"),
            output_dir: data_dir.join("extubation_pass"),
        }
    }
}

impl DataPaths {
    pub fn raw_series(&self, dataset: Dataset) -> PathBuf {
        self.raw_dir
            .join(format!("{}Patients.csv", dataset.as_str()))
    }

    pub fn preprocessed_series(&self, dataset: Dataset) -> PathBuf {
        self.preprocessed_dir
            .join(format!("{}Patients_zmuv_zffill.csv", dataset.as_str()))
    }

    pub fn output(&self, config: &LabelConfig) -> PathBuf {
        self.output_dir.join(config.output_file_name())
    }
}

/// Full run configuration as stored on disk
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub labels: LabelConfig,
    pub paths: DataPaths,
}

impl RunConfig {
    /// Load a JSON configuration file; absent fields keep their defaults.
    pub fn load(path: &Path) -> Result<Self, LabelError> {
        let content = std::fs::read_to_string(path)?;
        let config: RunConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, LabelError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_constants() {
        let config = LabelConfig::default();
        assert_eq!(config.min_int_obs_hours, 12.0);
        assert_eq!(config.exclusion_win_hours, 0.0833);
        assert_eq!(config.extubation_win_hours, 6.0);
        assert_eq!(config.vitals.len(), 5);
        assert_eq!(config.dataset, Dataset::Valid);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_output_file_name() {
        let config = LabelConfig::default();
        assert_eq!(
            config.output_file_name(),
            "valid_Patients_zmuv_PASS_12_minObs_6_extWin.csv"
        );
    }

    #[test]
    fn test_validate_rejects_inverted_windows() {
        let config = LabelConfig {
            exclusion_win_hours: 6.0,
            extubation_win_hours: 6.0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(LabelError::Configuration(_))
        ));
    }

    #[test]
    fn test_validate_rejects_negative_and_duplicates() {
        let negative = LabelConfig {
            min_int_obs_hours: -1.0,
            ..Default::default()
        };
        assert!(negative.validate().is_err());

        let duplicated = LabelConfig {
            vitals: vec!["Heart Rate".to_string(), "Heart Rate".to_string()],
            ..Default::default()
        };
        assert!(duplicated.validate().is_err());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let json = r#"{ "labels": { "dataset": "test", "min_int_obs_hours": 24 } }"#;
        let config: RunConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.labels.dataset, Dataset::Test);
        assert_eq!(config.labels.min_int_obs_hours, 24.0);
        assert_eq!(config.labels.extubation_win_hours, 6.0);
        assert_eq!(config.paths, DataPaths::default());
        assert_eq!(
            config.paths.raw_series(Dataset::Test).file_name().unwrap(),
            "testPatients.csv"
        );
    }

    #[test]
    fn test_dataset_from_str() {
        assert_eq!("TRAIN".parse::<Dataset>().unwrap(), Dataset::Train);
        assert!("holdout".parse::<Dataset>().is_err());
    }
}
