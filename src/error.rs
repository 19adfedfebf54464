//! Error types for extubation label extraction

use thiserror::Error;

/// Errors that abort a labeling run.
///
/// Encounters dropped for data-quality reasons are not errors; they are
/// counted in [`crate::types::CohortAudit`] instead.
#[derive(Debug, Error)]
pub enum LabelError {
    #[error("Missing required column '{column}' in {input}")]
    MissingColumn { column: String, input: String },

    #[error("Column '{column}' in {input} collides with an output column")]
    ColumnConflict { column: String, input: String },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Time parse error: {0}")]
    TimeParse(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl LabelError {
    pub(crate) fn missing_column(column: &str, input: &str) -> Self {
        LabelError::MissingColumn {
            column: column.to_string(),
            input: input.to_string(),
        }
    }
}
