//! # Analysis Module
//!
//! Descriptive statistics of the clean expert sample and its comparison
//! with the published reference sample.

use crate::cleaning::CleaningLog;
use crate::config::AnalysisConfig;
use crate::inference::{
    Adjustment, MeanSummary, Measure, ProportionSummary, ReferenceVignette, TestOutcome,
    TestResult, adjust_p_values, two_proportion_z_test, welch_t_test_summary,
};
use crate::model::{Dataset, Field};
use crate::stats::{IntervalMethod, MeanEstimate, ProportionEstimate};
use serde::{Deserialize, Serialize};

// =============================================================================
// REPORT TYPES
// =============================================================================

/// Respondents per field in the clean sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositionRow {
    /// `None` for respondents who did not report a field.
    pub field: Option<Field>,
    pub count: usize,
    /// Percent of the clean sample.
    pub percent: f64,
}

impl CompositionRow {
    #[must_use]
    pub fn label(&self) -> &'static str {
        self.field.map_or("Missing", Field::label)
    }
}

/// Descriptives for one vignette.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VignetteSummary {
    pub id: String,
    pub label: String,
    pub share: Option<MeanEstimate>,
    pub redistributing: Option<ProportionEstimate>,
    pub fairness: Option<MeanEstimate>,
}

/// A computed test with its adjusted p-value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    pub vignette: String,
    pub measure: Measure,
    pub result: TestResult,
    pub p_adjusted: f64,
    pub significant: bool,
}

/// A test that could not be run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedTest {
    pub vignette: String,
    pub measure: Measure,
    pub reason: String,
}

/// Options the report was produced with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportOptions {
    pub redistribution_threshold: f64,
    pub confidence_level: f64,
    pub alpha: f64,
    pub adjustment: Adjustment,
    pub proportion_interval: IntervalMethod,
}

/// Everything the analysis produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub initial_size: usize,
    pub sample_size: usize,
    pub rescaled: usize,
    pub options: ReportOptions,
    pub composition: Vec<CompositionRow>,
    pub vignettes: Vec<VignetteSummary>,
    /// Source of the published statistics, if any were configured.
    pub reference_source: Option<String>,
    pub comparisons: Vec<Comparison>,
    pub skipped: Vec<SkippedTest>,
}

impl AnalysisReport {
    /// Number of comparisons significant after adjustment.
    #[must_use]
    pub fn significant_count(&self) -> usize {
        self.comparisons.iter().filter(|c| c.significant).count()
    }
}

// =============================================================================
// ANALYSIS
// =============================================================================

/// Shares as compared with the redistribution threshold. Rescaled amounts
/// are rounded to whole percent, matching the precision of typed answers.
fn classified_shares(dataset: &Dataset, index: usize) -> impl Iterator<Item = f64> + '_ {
    dataset.responses.iter().filter_map(move |r| {
        let share = r.answers.get(index)?.share?;
        Some(if r.rescaled { share.round() } else { share })
    })
}

/// Describe the clean sample and, when a reference is configured, test it.
#[must_use]
pub fn analyze(dataset: &Dataset, log: &CleaningLog, config: &AnalysisConfig) -> AnalysisReport {
    let opts = &config.analysis;

    let vignettes: Vec<VignetteSummary> = dataset
        .vignettes
        .iter()
        .enumerate()
        .map(|(index, spec)| {
            let shares: Vec<f64> = dataset.shares(index).collect();
            let fairness: Vec<f64> = dataset.fairness(index).collect();
            let redistributing = classified_shares(dataset, index)
                .filter(|&s| s >= opts.redistribution_threshold)
                .count();

            VignetteSummary {
                id: spec.id.clone(),
                label: spec.label.clone(),
                share: MeanEstimate::from_values(&shares, opts.confidence_level),
                redistributing: ProportionEstimate::from_counts(
                    redistributing,
                    shares.len(),
                    opts.confidence_level,
                    opts.proportion_interval,
                ),
                fairness: MeanEstimate::from_values(&fairness, opts.confidence_level),
            }
        })
        .collect();

    let (comparisons, skipped) = match &config.reference {
        Some(reference) => {
            let mut outcomes = Vec::new();
            let mut skipped = Vec::new();
            for summary in &vignettes {
                let published = reference.vignettes.get(&summary.id);
                for measure in Measure::ALL {
                    match compare(summary, published, measure, opts.confidence_level) {
                        Some(TestOutcome::Computed(result)) => {
                            outcomes.push((summary.id.clone(), measure, result));
                        }
                        Some(TestOutcome::Skipped { reason }) => skipped.push(SkippedTest {
                            vignette: summary.id.clone(),
                            measure,
                            reason,
                        }),
                        None => {}
                    }
                }
            }
            (adjust(outcomes, opts.adjustment, opts.alpha), skipped)
        }
        None => (Vec::new(), Vec::new()),
    };

    AnalysisReport {
        initial_size: log.initial,
        sample_size: dataset.len(),
        rescaled: log.rescaled_ids.len(),
        options: ReportOptions {
            redistribution_threshold: opts.redistribution_threshold,
            confidence_level: opts.confidence_level,
            alpha: opts.alpha,
            adjustment: opts.adjustment,
            proportion_interval: opts.proportion_interval,
        },
        composition: composition(dataset),
        vignettes,
        reference_source: config.reference.as_ref().map(|r| r.source.clone()),
        comparisons,
        skipped,
    }
}

/// Field counts in the fixed `Field` order, plus a missing row if needed.
#[must_use]
pub fn composition(dataset: &Dataset) -> Vec<CompositionRow> {
    let total = dataset.len();
    let percent = |count: usize| {
        if total == 0 {
            0.0
        } else {
            100.0 * count as f64 / total as f64
        }
    };

    let mut rows: Vec<CompositionRow> = Field::ALL
        .iter()
        .map(|&field| {
            let count = dataset
                .responses
                .iter()
                .filter(|r| r.field == Some(field))
                .count();
            CompositionRow {
                field: Some(field),
                count,
                percent: percent(count),
            }
        })
        .collect();

    let missing = dataset.responses.iter().filter(|r| r.field.is_none()).count();
    if missing > 0 {
        rows.push(CompositionRow {
            field: None,
            count: missing,
            percent: percent(missing),
        });
    }
    rows
}

/// One test, or why it cannot run. `None` when neither side has the measure.
fn compare(
    summary: &VignetteSummary,
    published: Option<&ReferenceVignette>,
    measure: Measure,
    confidence: f64,
) -> Option<TestOutcome> {
    let skipped = |reason: &str| {
        Some(TestOutcome::Skipped {
            reason: reason.to_string(),
        })
    };

    match measure {
        Measure::Redistributing => {
            let expert = summary.redistributing.as_ref().map(ProportionSummary::from);
            let reference = published.and_then(|p| p.redistributing);
            match (expert, reference) {
                (Some(e), Some(r)) => Some(two_proportion_z_test(&e, &r, confidence)),
                (Some(_), None) => skipped("no published statistics"),
                (None, Some(_)) => skipped("no expert observations"),
                (None, None) => None,
            }
        }
        Measure::Share | Measure::Fairness => {
            let (expert, reference) = if measure == Measure::Share {
                (summary.share.as_ref(), published.and_then(|p| p.share))
            } else {
                (summary.fairness.as_ref(), published.and_then(|p| p.fairness))
            };
            match (expert.map(MeanSummary::from), reference) {
                (Some(e), Some(r)) => Some(welch_t_test_summary(&e, &r, confidence)),
                (Some(_), None) => skipped("no published statistics"),
                (None, Some(_)) => skipped("no expert observations"),
                (None, None) => None,
            }
        }
    }
}

fn adjust(
    outcomes: Vec<(String, Measure, TestResult)>,
    method: Adjustment,
    alpha: f64,
) -> Vec<Comparison> {
    let raw: Vec<f64> = outcomes.iter().map(|(_, _, r)| r.p_value).collect();
    let adjusted = adjust_p_values(&raw, method);

    outcomes
        .into_iter()
        .zip(adjusted)
        .map(|((vignette, measure, result), p_adjusted)| Comparison {
            vignette,
            measure,
            result,
            p_adjusted,
            significant: p_adjusted < alpha,
        })
        .collect()
}

// =============================================================================
// TESTS
// =============================================================================
