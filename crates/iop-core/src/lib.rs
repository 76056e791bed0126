//! # IOp Core
//!
//! Deterministic cleaning and statistical comparison engine for the
//! Inequality of Opportunity (IOp) expert survey.
//!
//! The pipeline is linear:
//!
//! ```text
//! RawTable ──corrections──► Dataset ──exclusions + rescaling──► clean Dataset
//!                                                                    │
//!                 ReferenceSummary (published) ──────────────┐       ▼
//!                                                            ├─► AnalysisReport ──► Tables
//!                                    descriptives + tests ◄──┘
//! ```
//!
//! This crate never touches the file system and never logs. Callers feed it
//! text and receive values; the `iop` binary owns I/O and logging.

pub mod analysis;
pub mod cleaning;
pub mod config;
pub mod formats;
pub mod inference;
pub mod model;
pub mod report;
pub mod stats;
pub mod tables;

pub use analysis::{AnalysisReport, analyze};
pub use cleaning::{CleaningLog, CleaningOutcome, clean};
pub use config::AnalysisConfig;
pub use formats::{RawRecord, RawTable};
pub use inference::{Adjustment, ReferenceSummary};
pub use model::{Dataset, Field, Response, VignetteAnswer, VignetteSpec};
pub use tables::{Table, Tabulator};

use thiserror::Error;

// =============================================================================
// ERROR TYPE
// =============================================================================

/// Errors produced by the analysis engine.
///
/// Missing values are not errors; they are filtered per analysis.
#[derive(Debug, Error)]
pub enum Error {
    /// Underlying I/O failure while reading or writing delimited text.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Delimited text could not be read or written.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The analysis configuration is invalid.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The input table does not have the expected shape.
    #[error("schema error: {0}")]
    Schema(String),

    /// A cell could not be parsed.
    #[error("line {row}, column '{column}': {message}")]
    Data {
        row: usize,
        column: String,
        message: String,
    },

    /// A row does not fit the header.
    #[error("line {row}: {message}")]
    Shape { row: usize, message: String },

    /// The published summary statistics are unusable.
    #[error("invalid reference statistics: {0}")]
    Reference(String),
}

/// Result alias for this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Read, correct, type and clean survey text.
///
/// Corrections are applied to the raw cells before typing; their report
/// ends up in the returned log.
pub fn clean_text(input: &str, config: &AnalysisConfig) -> Result<CleaningOutcome> {
    config.validate()?;
    let mut raw = formats::read_table(input.as_bytes(), &config.input)?;
    let corrections = cleaning::apply_corrections(
        &mut raw,
        &config.columns.response_id,
        &config.cleaning.corrections,
    );
    let dataset = Dataset::from_raw(&raw, config)?;
    Ok(clean(dataset, &config.cleaning, &config.analysis, corrections))
}

/// Run the whole pipeline on already-read survey text.
///
/// Convenience for callers that do not need intermediate values.
pub fn run_pipeline(
    input: &str,
    config: &AnalysisConfig,
) -> Result<(CleaningOutcome, AnalysisReport)> {
    let outcome = clean_text(input, config)?;
    let report = analyze(&outcome.dataset, &outcome.log, config);
    Ok((outcome, report))
}

// =============================================================================
// TESTS
// =============================================================================
