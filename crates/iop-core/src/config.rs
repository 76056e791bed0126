//! # Config Module
//!
//! Analysis configuration, loaded from JSON.
//!
//! Every field has a default, so an empty object `{}` is a valid config.
//! The defaults describe the expert questionnaire: four allocation
//! vignettes with a fairness rating each, a 17% equal-split
//! redistribution threshold and Holm-adjusted two-sided tests.

use crate::inference::{Adjustment, ReferenceSummary};
use crate::model::{Field, VignetteSpec};
use crate::stats::IntervalMethod;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Equal split among six recipients, rounded: 100 / 6 ≈ 17.
pub const DEFAULT_REDISTRIBUTION_THRESHOLD: f64 = 17.0;

// =============================================================================
// TOP-LEVEL CONFIG
// =============================================================================

/// Complete analysis configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub input: InputOptions,
    pub columns: ColumnMap,
    pub vignettes: Vec<VignetteSpec>,
    pub cleaning: CleaningRules,
    pub analysis: AnalysisOptions,
    /// Published summary statistics of the comparison sample.
    pub reference: Option<ReferenceSummary>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            input: InputOptions::default(),
            columns: ColumnMap::default(),
            vignettes: default_vignettes(),
            cleaning: CleaningRules::default(),
            analysis: AnalysisOptions::default(),
            reference: None,
        }
    }
}

fn default_vignettes() -> Vec<VignetteSpec> {
    [
        ("V1", "Effort"),
        ("V2", "Luck"),
        ("V3", "Family background"),
        ("V4", "Talent"),
    ]
    .iter()
    .enumerate()
    .map(|(i, (id, label))| {
        let n = i + 1;
        VignetteSpec::new(
            *id,
            *label,
            format!("v{}_share", n),
            Some(format!("v{}_fair", n)),
        )
    })
    .collect()
}

impl AnalysisConfig {
    /// Parse a config from JSON text.
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        Ok(config)
    }

    /// Serialize as pretty-printed JSON.
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check that every option is usable before running anything.
    pub fn validate(&self) -> Result<()> {
        let opts = &self.analysis;

        if !(opts.confidence_level > 0.0 && opts.confidence_level < 1.0) {
            return Err(Error::Config(format!(
                "confidence_level must be in (0, 1), got {}",
                opts.confidence_level
            )));
        }
        if !(opts.alpha > 0.0 && opts.alpha < 1.0) {
            return Err(Error::Config(format!(
                "alpha must be in (0, 1), got {}",
                opts.alpha
            )));
        }
        if !(0.0..=100.0).contains(&opts.redistribution_threshold) {
            return Err(Error::Config(format!(
                "redistribution_threshold must be a percentage, got {}",
                opts.redistribution_threshold
            )));
        }
        if opts.fairness_scale.min >= opts.fairness_scale.max {
            return Err(Error::Config(format!(
                "fairness_scale min ({}) must be below max ({})",
                opts.fairness_scale.min, opts.fairness_scale.max
            )));
        }
        if self.columns.response_id.trim().is_empty() {
            return Err(Error::Config("columns.response_id is empty".to_string()));
        }

        if self.vignettes.is_empty() {
            return Err(Error::Config("at least one vignette is required".to_string()));
        }
        let mut seen = BTreeSet::new();
        for vignette in &self.vignettes {
            if vignette.id.trim().is_empty() {
                return Err(Error::Config("vignette id is empty".to_string()));
            }
            if !seen.insert(vignette.id.as_str()) {
                return Err(Error::Config(format!("duplicate vignette id '{}'", vignette.id)));
            }
            if !(vignette.stake.is_finite() && vignette.stake > 0.0) {
                return Err(Error::Config(format!(
                    "vignette '{}' stake must be positive, got {}",
                    vignette.id, vignette.stake
                )));
            }
        }

        if let Some(min) = self.cleaning.min_duration_secs {
            if !(min.is_finite() && min >= 0.0) {
                return Err(Error::Config(format!(
                    "min_duration_secs must be non-negative, got {}",
                    min
                )));
            }
        }

        if let Some(reference) = &self.reference {
            reference.validate()?;
            if let Some(unknown) = reference
                .vignettes
                .keys()
                .find(|id| !seen.contains(id.as_str()))
            {
                return Err(Error::Reference(format!(
                    "reference vignette '{}' is not configured",
                    unknown
                )));
            }
        }

        Ok(())
    }
}

// =============================================================================
// SECTIONS
// =============================================================================

/// How the delimited input is read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputOptions {
    pub delimiter: char,
    /// Rows to skip after the header (survey exports add label rows).
    pub skip_rows: usize,
    /// Cell values treated as missing, in addition to empty cells.
    pub missing_tokens: Vec<String>,
}

impl Default for InputOptions {
    fn default() -> Self {
        Self {
            delimiter: ',',
            skip_rows: 0,
            missing_tokens: ["NA", "N/A", ".", "-99"]
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
        }
    }
}

/// Where the respondent-level variables live. `None` means the survey
/// does not have that column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnMap {
    pub response_id: String,
    pub status: Option<String>,
    pub finished: Option<String>,
    pub progress: Option<String>,
    pub duration: Option<String>,
    pub consent: Option<String>,
    pub attention: Option<String>,
    pub field: Option<String>,
}

impl Default for ColumnMap {
    fn default() -> Self {
        Self {
            response_id: "response_id".to_string(),
            status: Some("status".to_string()),
            finished: Some("finished".to_string()),
            progress: Some("progress".to_string()),
            duration: Some("duration".to_string()),
            consent: Some("consent".to_string()),
            attention: Some("attention".to_string()),
            field: Some("field".to_string()),
        }
    }
}

/// A documented, hand-made fix of one cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Correction {
    pub response_id: String,
    pub column: String,
    pub value: String,
    #[serde(default)]
    pub note: String,
}

/// Exclusion criteria and corrections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleaningRules {
    pub excluded_statuses: Vec<String>,
    pub require_consent: bool,
    pub require_finished: bool,
    pub min_progress: f64,
    pub drop_duplicates: bool,
    /// Expected answer of the attention check; `None` disables the rule.
    pub attention_expected: Option<String>,
    /// Minimum completion time; `None` disables the rule.
    pub min_duration_secs: Option<f64>,
    pub excluded_fields: Vec<Field>,
    pub corrections: Vec<Correction>,
}

impl Default for CleaningRules {
    fn default() -> Self {
        Self {
            excluded_statuses: vec!["Survey Preview".to_string(), "Spam".to_string()],
            require_consent: true,
            require_finished: true,
            min_progress: 100.0,
            drop_duplicates: true,
            attention_expected: None,
            min_duration_secs: None,
            excluded_fields: Vec::new(),
            corrections: Vec::new(),
        }
    }
}

/// Inclusive Likert scale bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LikertScale {
    pub min: u8,
    pub max: u8,
}

impl LikertScale {
    #[must_use]
    pub fn contains(&self, rating: i32) -> bool {
        (i32::from(self.min)..=i32::from(self.max)).contains(&rating)
    }
}

impl Default for LikertScale {
    fn default() -> Self {
        Self { min: 1, max: 7 }
    }
}

/// Statistical options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisOptions {
    /// Share (in percent) at or above which a response counts as redistributing.
    pub redistribution_threshold: f64,
    pub confidence_level: f64,
    pub alpha: f64,
    pub adjustment: Adjustment,
    pub proportion_interval: IntervalMethod,
    pub fairness_scale: LikertScale,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            redistribution_threshold: DEFAULT_REDISTRIBUTION_THRESHOLD,
            confidence_level: 0.95,
            alpha: 0.05,
            adjustment: Adjustment::Holm,
            proportion_interval: IntervalMethod::Wald,
            fairness_scale: LikertScale::default(),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
