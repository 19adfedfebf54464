//! Extubation Labels - Leakage-safe extubation-pass targets for ICU time series
//!
//! For every encounter whose first mechanical-ventilation episode ended in a
//! successful extubation, the pipeline summarizes vitals observed shortly
//! before extubation into a normalized target vector and attaches it to the
//! per-timestep feature table, masked wherever the label would leak:
//! episode selection → alignment → eligibility → window → aggregation
//! → normalization → merge → masking.
//!
//! ## Modules
//!
//! - **Stages**: `selector`, `aligner`, `eligibility`, `window`, `aggregator`,
//!   `normalizer`, `merger`, `masker`
//! - **Plumbing**: `timeline` (episode-relative time), `io` (CSV tables),
//!   `config`, `pipeline`

pub mod aggregator;
pub mod aligner;
pub mod config;
pub mod eligibility;
pub mod error;
pub mod io;
pub mod masker;
pub mod merger;
pub mod normalizer;
pub mod pipeline;
pub mod selector;
pub mod timeline;
pub mod types;
pub mod window;

pub use config::{DataPaths, Dataset, LabelConfig, RunConfig};
pub use error::LabelError;
pub use pipeline::{extract_labels, LabelInputs, LabelOutput, LabelPipeline, RunSummary};
pub use types::{CohortAudit, LabeledTable, NormalizationStats, TimestepTable, VentilationEvent};

/// Crate version, reported by the CLI
pub const CRATE_VERSION: &str = env!("CARGO_PKG_VERSION");
