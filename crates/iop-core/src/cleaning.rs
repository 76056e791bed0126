//! # Cleaning Module
//!
//! Documented exclusion and correction rules.
//!
//! Order of operations:
//! 1. Hand-made corrections on the raw table (before typing)
//! 2. Exclusion rules, one at a time, each logged with counts
//! 3. Absolute-value detection and rescaling
//! 4. Out-of-range values set to missing
//! 5. Responses left without any usable share are excluded
//!
//! Nothing is silently dropped: every excluded response id, rescaled
//! response and unmatched correction ends up in the `CleaningLog`.

use crate::config::{AnalysisOptions, CleaningRules, Correction, LikertScale};
use crate::formats::RawTable;
use crate::model::{Dataset, Response};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Shares above this are taken as absolute amounts, not percentages.
pub const PERCENT_CEILING: f64 = 100.0;

// =============================================================================
// RULES
// =============================================================================

/// An exclusion criterion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExclusionRule {
    Status,
    Consent,
    Incomplete,
    MissingId,
    Duplicate,
    Attention,
    Speeder,
    Field,
    NoVignetteData,
}

impl ExclusionRule {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            ExclusionRule::Status => "status",
            ExclusionRule::Consent => "consent",
            ExclusionRule::Incomplete => "incomplete",
            ExclusionRule::MissingId => "missing_id",
            ExclusionRule::Duplicate => "duplicate",
            ExclusionRule::Attention => "attention",
            ExclusionRule::Speeder => "speeder",
            ExclusionRule::Field => "field",
            ExclusionRule::NoVignetteData => "no_vignette_data",
        }
    }

    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            ExclusionRule::Status => "preview or flagged response",
            ExclusionRule::Consent => "consent not given",
            ExclusionRule::Incomplete => "survey not finished",
            ExclusionRule::MissingId => "no response id",
            ExclusionRule::Duplicate => "repeated response id",
            ExclusionRule::Attention => "failed attention check",
            ExclusionRule::Speeder => "completed too fast",
            ExclusionRule::Field => "field outside the expert sample",
            ExclusionRule::NoVignetteData => "no usable vignette answer",
        }
    }
}

impl fmt::Display for ExclusionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// =============================================================================
// LOG
// =============================================================================

/// Result of one exclusion rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExclusionStep {
    pub rule: ExclusionRule,
    pub excluded: usize,
    pub remaining: usize,
    pub excluded_ids: Vec<String>,
}

/// Corrections applied to the raw table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrectionReport {
    /// Number of cells overwritten.
    pub applied: usize,
    /// Corrections whose response id or column was not found.
    pub unmatched: Vec<Correction>,
}

/// Audit trail of the cleaning stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CleaningLog {
    pub initial: usize,
    pub steps: Vec<ExclusionStep>,
    /// Responses whose shares were entered as amounts and rescaled.
    pub rescaled_ids: Vec<String>,
    /// Shares or ratings set to missing for being out of range.
    pub invalidated_values: usize,
    pub corrections: CorrectionReport,
    pub final_count: usize,
}

impl CleaningLog {
    /// Total excluded across all rules.
    #[must_use]
    pub fn total_excluded(&self) -> usize {
        self.steps.iter().map(|s| s.excluded).sum()
    }

    /// The step for a rule, if it ran.
    #[must_use]
    pub fn step(&self, rule: ExclusionRule) -> Option<&ExclusionStep> {
        self.steps.iter().find(|s| s.rule == rule)
    }
}

/// Clean dataset plus its audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleaningOutcome {
    pub dataset: Dataset,
    pub log: CleaningLog,
}

// =============================================================================
// CORRECTIONS
// =============================================================================

/// Overwrite raw cells as listed in the config.
///
/// A correction applies to every row carrying its response id.
pub fn apply_corrections(
    raw: &mut RawTable,
    id_column: &str,
    corrections: &[Correction],
) -> CorrectionReport {
    let mut report = CorrectionReport::default();
    let Some(id_col) = raw.column_index(id_column) else {
        report.unmatched = corrections.to_vec();
        return report;
    };

    for correction in corrections {
        let rows: Vec<usize> = raw
            .rows
            .iter()
            .enumerate()
            .filter(|(_, r)| {
                r.values
                    .get(id_col)
                    .is_some_and(|v| v.trim() == correction.response_id.trim())
            })
            .map(|(i, _)| i)
            .collect();

        let mut hit = false;
        for row in rows {
            hit |= raw.set(row, &correction.column, correction.value.clone());
        }
        if hit {
            report.applied += 1;
        } else {
            report.unmatched.push(correction.clone());
        }
    }
    report
}

// =============================================================================
// CLEANING
// =============================================================================

/// Apply exclusions, rescale absolute answers and drop out-of-range values.
#[must_use]
pub fn clean(
    mut dataset: Dataset,
    rules: &CleaningRules,
    options: &AnalysisOptions,
    corrections: CorrectionReport,
) -> CleaningOutcome {
    let mut log = CleaningLog {
        initial: dataset.len(),
        corrections,
        ..CleaningLog::default()
    };
    let responses = &mut dataset.responses;

    let excluded_statuses: Vec<String> = rules
        .excluded_statuses
        .iter()
        .map(|s| s.trim().to_lowercase())
        .collect();
    exclude(responses, ExclusionRule::Status, &mut log, |r| {
        r.status
            .as_ref()
            .is_some_and(|s| excluded_statuses.contains(&s.trim().to_lowercase()))
    });

    if rules.require_consent {
        exclude(responses, ExclusionRule::Consent, &mut log, |r| {
            r.consent != Some(true)
        });
    }

    exclude(responses, ExclusionRule::Incomplete, &mut log, |r| {
        let unfinished = rules.require_finished && r.finished == Some(false);
        let partial = r.progress.is_some_and(|p| p < rules.min_progress);
        unfinished || partial
    });

    exclude(responses, ExclusionRule::MissingId, &mut log, |r| {
        r.response_id.trim().is_empty()
    });

    if rules.drop_duplicates {
        let mut seen = BTreeSet::new();
        exclude(responses, ExclusionRule::Duplicate, &mut log, |r| {
            !seen.insert(r.response_id.clone())
        });
    }

    if let Some(expected) = &rules.attention_expected {
        let expected = expected.trim();
        exclude(responses, ExclusionRule::Attention, &mut log, |r| {
            !r.attention
                .as_deref()
                .is_some_and(|a| a.trim().eq_ignore_ascii_case(expected))
        });
    }

    if let Some(min) = rules.min_duration_secs {
        exclude(responses, ExclusionRule::Speeder, &mut log, |r| {
            r.duration_secs.is_some_and(|d| d < min)
        });
    }

    if !rules.excluded_fields.is_empty() {
        exclude(responses, ExclusionRule::Field, &mut log, |r| {
            r.field.is_some_and(|f| rules.excluded_fields.contains(&f))
        });
    }

    log.rescaled_ids = rescale_absolute_answers(&mut dataset);
    log.invalidated_values = invalidate_out_of_range(&mut dataset, options.fairness_scale);

    exclude(
        &mut dataset.responses,
        ExclusionRule::NoVignetteData,
        &mut log,
        |r| !r.has_share(),
    );

    log.final_count = dataset.len();
    CleaningOutcome { dataset, log }
}

/// Drop responses matching `excluded` and record the step.
fn exclude<F>(responses: &mut Vec<Response>, rule: ExclusionRule, log: &mut CleaningLog, mut excluded: F)
where
    F: FnMut(&Response) -> bool,
{
    let mut excluded_ids = Vec::new();
    responses.retain(|r| {
        if excluded(r) {
            excluded_ids.push(log_id(r));
            false
        } else {
            true
        }
    });
    log.steps.push(ExclusionStep {
        rule,
        excluded: excluded_ids.len(),
        remaining: responses.len(),
        excluded_ids,
    });
}

/// Id for the log; responses without one are named by source line.
fn log_id(response: &Response) -> String {
    if response.response_id.trim().is_empty() {
        format!("line {}", response.line)
    } else {
        response.response_id.clone()
    }
}

// =============================================================================
// ABSOLUTE-VALUE ANOMALY
// =============================================================================

/// Whether a response entered amounts instead of percentages: any share
/// above 100.
#[must_use]
pub fn entered_absolute_values(response: &Response) -> bool {
    response
        .answers
        .iter()
        .any(|a| a.share.is_some_and(|s| s > PERCENT_CEILING))
}

/// Rescale every share of flagged responses to percent of the vignette
/// stake. Returns the ids of rescaled responses.
pub fn rescale_absolute_answers(dataset: &mut Dataset) -> Vec<String> {
    let stakes: Vec<f64> = dataset.vignettes.iter().map(|v| v.stake).collect();
    let mut rescaled = Vec::new();

    for response in &mut dataset.responses {
        if !entered_absolute_values(response) {
            continue;
        }
        for (answer, &stake) in response.answers.iter_mut().zip(&stakes) {
            if let Some(share) = answer.share.as_mut() {
                *share = *share * PERCENT_CEILING / stake;
            }
        }
        response.rescaled = true;
        rescaled.push(response.response_id.clone());
    }
    rescaled
}

/// Set shares outside [0, 100] and ratings outside the scale to missing.
/// Returns how many values were dropped.
pub fn invalidate_out_of_range(dataset: &mut Dataset, scale: LikertScale) -> usize {
    let mut dropped = 0;
    for response in &mut dataset.responses {
        for answer in &mut response.answers {
            if answer
                .share
                .is_some_and(|s| !(0.0..=PERCENT_CEILING).contains(&s))
            {
                answer.share = None;
                dropped += 1;
            }
            if answer.fairness.is_some_and(|f| !scale.contains(f)) {
                answer.fairness = None;
                dropped += 1;
            }
        }
    }
    dropped
}

// =============================================================================
// TESTS
// =============================================================================
