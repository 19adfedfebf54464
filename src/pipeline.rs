//! Pipeline orchestration
//!
//! This module provides the public API for label extraction.
//! It threads the inputs through every stage, from ventilation events and
//! raw vitals to the masked, labeled per-timestep table.

use crate::aggregator::Aggregator;
use crate::aligner::{forward_fill_by_encounter, TimeAligner};
use crate::config::{LabelConfig, RunConfig};
use crate::eligibility::EligibilityFilter;
use crate::error::LabelError;
use crate::io::{
    load_events, load_normalization_stats, load_timestep_table, load_vital_series, output_columns,
    Persister,
};
use crate::masker::TemporalMasker;
use crate::merger::Merger;
use crate::normalizer::Normalizer;
use crate::selector::EventSelector;
use crate::types::{
    distinct_encounters, CohortAudit, LabeledTable, NormalizationStats, TimestepTable,
    VentilationEvent,
};
use crate::window::WindowExtractor;
use std::path::PathBuf;

/// Everything a run reads
#[derive(Debug, Clone, Default)]
pub struct LabelInputs {
    /// Input A
    pub events: Vec<VentilationEvent>,
    /// Input B, raw (not forward-filled) vitals; must hold every configured vital
    pub raw: TimestepTable,
    /// Input C, the table labels are attached to
    pub preprocessed: TimestepTable,
    /// Input D
    pub stats: NormalizationStats,
}

/// Labeled table plus the cohort accounting that produced it
#[derive(Debug, Clone)]
pub struct LabelOutput {
    pub table: LabeledTable,
    pub audit: CohortAudit,
}

/// Run every stage over in-memory inputs.
///
/// Pipeline stages:
/// 1. EventSelector - First ventilation episode per encounter, successful only
/// 2. TimeAligner - Forward-fill vitals, join to episodes, compute offsets
/// 3. EligibilityFilter - Require more than `min_int_obs_hours` on the ventilator
/// 4. WindowExtractor - Restrict to the pre-extubation window
/// 5. Aggregator - Mean of each vital over the window
/// 6. Normalizer - ZMUV with external stats, `target_` columns
/// 7. Merger - Attach targets to the preprocessed table
/// 8. TemporalMasker - Hide targets outside the visibility window
pub fn extract_labels(inputs: LabelInputs, config: &LabelConfig) -> Result<LabelOutput, LabelError> {
    config.validate()?;
    let normalizer = Normalizer::new(&config.vitals, &inputs.stats)?;
    output_columns(&inputs.preprocessed.columns, normalizer.target_columns())?;

    // Stage 1: Select first successful episodes
    let selection = EventSelector::select(&inputs.events);

    // Stage 2: Align forward-filled vitals to episodes
    let vitals = inputs.raw.project(&config.vitals, "raw time series")?;
    let aligned = TimeAligner::align(forward_fill_by_encounter(vitals), &selection.events)?;
    let aligned_encounters = distinct_encounters(aligned.iter().map(|r| r.encounter()));

    // Stage 3: Minimum observation span
    let eligible = EligibilityFilter::new(config.min_int_obs_hours).filter(aligned);
    let eligible_encounters = distinct_encounters(eligible.iter().map(|r| r.encounter()));

    // Stage 4: Aggregation window
    let window =
        WindowExtractor::new(config.extubation_win_hours, config.exclusion_win_hours).extract(eligible);

    // Stage 5: Window means
    let means = Aggregator::aggregate(&window);

    // Stage 6: Normalize into targets
    let targets = normalizer.normalize(means);

    // Stage 7: Merge onto the preprocessed table
    let merged = Merger::merge(inputs.preprocessed, &targets);

    // Stage 8: Mask
    let mut table = TemporalMasker::new(config.extubation_win_hours).mask(merged);
    table.sort_by_index();

    let labeled_encounters = table.encounter_count();
    let audit = CohortAudit {
        events_encounters: selection.encounters_seen,
        no_successful_first_episode: selection.unsuccessful,
        no_vital_rows: selection.events.len().saturating_sub(aligned_encounters),
        insufficient_observation: aligned_encounters.saturating_sub(eligible_encounters),
        empty_window: eligible_encounters.saturating_sub(targets.vectors.len()),
        missing_features: targets.vectors.len().saturating_sub(labeled_encounters),
        labeled_encounters,
        labeled_rows: table.rows.len(),
        visible_label_rows: table
            .rows
            .iter()
            .filter(|r| r.targets.iter().any(|t| t.is_some()))
            .count(),
    };
    audit.log();

    Ok(LabelOutput { table, audit })
}

/// Result of a persisted run
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub output_path: PathBuf,
    pub audit: CohortAudit,
}

/// File-backed pipeline: load the four inputs, extract labels, persist.
pub struct LabelPipeline {
    config: RunConfig,
}

impl LabelPipeline {
    pub fn new(config: RunConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn output_path(&self) -> PathBuf {
        self.config.paths.output(&self.config.labels)
    }

    pub fn load_inputs(&self) -> Result<LabelInputs, LabelError> {
        let paths = &self.config.paths;
        let dataset = self.config.labels.dataset;

        tracing::info!(path = %paths.events.display(), "reading ventilation events");
        let events = load_events(&paths.events)?;

        let raw_path = paths.raw_series(dataset);
        tracing::info!(path = %raw_path.display(), "reading raw time series");
        let raw = load_vital_series(&raw_path, &self.config.labels.vitals)?;

        let preprocessed_path = paths.preprocessed_series(dataset);
        tracing::info!(path = %preprocessed_path.display(), "reading preprocessed time series");
        let preprocessed = load_timestep_table(&preprocessed_path)?;

        tracing::info!(path = %paths.normalization_stats.display(), "reading normalization stats");
        let stats = load_normalization_stats(&paths.normalization_stats)?;

        Ok(LabelInputs {
            events,
            raw,
            preprocessed,
            stats,
        })
    }

    /// Run end to end. Nothing is written unless every stage succeeds.
    pub fn run(&self) -> Result<RunSummary, LabelError> {
        self.config.labels.validate()?;
        let inputs = self.load_inputs()?;
        let output = extract_labels(inputs, &self.config.labels)?;

        let output_path = self.output_path();
        Persister::new(&output_path).write(&output.table)?;

        Ok(RunSummary {
            output_path,
            audit: output.audit,
        })
    }
}
