//! # Tables Module
//!
//! Result table assembly for export and console output.
//!
//! Tables are raw structure only:
//! - String cells, no alignment or styling
//! - Numbers at full working precision (6 decimals)
//! - Rendering lives in `report`, serialization in `formats`

use crate::analysis::AnalysisReport;
use crate::cleaning::CleaningLog;
use crate::inference::TestResult;
use crate::model::Dataset;
use crate::stats::{MeanEstimate, ProportionEstimate};
use serde::{Deserialize, Serialize};

/// A named, rectangular table of string cells.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    /// File stem when exported (`<name>.csv`).
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Create an empty table.
    #[must_use]
    pub fn new<I, S>(name: impl Into<String>, headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            headers: headers.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Append a row. Short rows are padded, long rows truncated, to the
    /// header width.
    pub fn push_row(&mut self, mut row: Vec<String>) {
        row.resize(self.headers.len(), String::new());
        self.rows.push(row);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Cells of a column by header name.
    #[must_use]
    pub fn column(&self, header: &str) -> Option<Vec<&str>> {
        let idx = self.headers.iter().position(|h| h == header)?;
        Some(
            self.rows
                .iter()
                .map(|r| r.get(idx).map_or("", String::as_str))
                .collect(),
        )
    }
}

fn num(x: f64) -> String {
    if x.is_finite() {
        format!("{:.6}", x)
    } else {
        String::new()
    }
}

fn opt_num(x: Option<f64>) -> String {
    x.map(num).unwrap_or_default()
}

/// Builds the result tables.
///
/// Does NOT format for display; see `report` for that.
pub struct Tabulator;

impl Tabulator {
    /// Every table of a full run, in export order.
    #[must_use]
    pub fn all(dataset: &Dataset, log: &CleaningLog, report: &AnalysisReport) -> Vec<Table> {
        vec![
            Self::cleaning_log(log),
            Self::composition(report),
            Self::descriptives(report),
            Self::tests(report),
            Self::cleaned_data(dataset),
        ]
    }

    /// Sample flow: start, each exclusion rule, corrections, end.
    #[must_use]
    pub fn cleaning_log(log: &CleaningLog) -> Table {
        let mut table = Table::new("cleaning_log", ["stage", "description", "excluded", "remaining"]);

        table.push_row(vec![
            "initial".to_string(),
            "responses read".to_string(),
            "0".to_string(),
            log.initial.to_string(),
        ]);
        for step in &log.steps {
            table.push_row(vec![
                step.rule.label().to_string(),
                step.rule.description().to_string(),
                step.excluded.to_string(),
                step.remaining.to_string(),
            ]);
        }
        table.push_row(vec![
            "corrections".to_string(),
            format!(
                "{} applied, {} unmatched",
                log.corrections.applied,
                log.corrections.unmatched.len()
            ),
            String::new(),
            String::new(),
        ]);
        table.push_row(vec![
            "rescaled".to_string(),
            format!(
                "{} responses entered amounts instead of percentages",
                log.rescaled_ids.len()
            ),
            String::new(),
            String::new(),
        ]);
        table.push_row(vec![
            "invalidated".to_string(),
            format!("{} out-of-range values set to missing", log.invalidated_values),
            String::new(),
            String::new(),
        ]);
        table.push_row(vec![
            "final".to_string(),
            "analysis sample".to_string(),
            log.total_excluded().to_string(),
            log.final_count.to_string(),
        ]);
        table
    }

    /// Respondents per field.
    #[must_use]
    pub fn composition(report: &AnalysisReport) -> Table {
        let mut table = Table::new("composition", ["field", "count", "percent"]);
        for row in &report.composition {
            table.push_row(vec![
                row.label().to_string(),
                row.count.to_string(),
                num(row.percent),
            ]);
        }
        table
    }

    /// One row per vignette and measure.
    #[must_use]
    pub fn descriptives(report: &AnalysisReport) -> Table {
        let mut table = Table::new(
            "descriptives",
            [
                "vignette", "label", "measure", "n", "estimate", "sd", "ci_low", "ci_high",
                "median",
            ],
        );

        let mean_row = |id: &str, label: &str, measure: &str, est: &MeanEstimate| {
            vec![
                id.to_string(),
                label.to_string(),
                measure.to_string(),
                est.n.to_string(),
                num(est.mean),
                num(est.sd),
                num(est.ci_low),
                num(est.ci_high),
                num(est.median),
            ]
        };
        let prop_row = |id: &str, label: &str, est: &ProportionEstimate| {
            vec![
                id.to_string(),
                label.to_string(),
                "redistributing".to_string(),
                est.n.to_string(),
                num(est.proportion),
                String::new(),
                num(est.ci_low),
                num(est.ci_high),
                String::new(),
            ]
        };

        for v in &report.vignettes {
            if let Some(est) = &v.share {
                table.push_row(mean_row(&v.id, &v.label, "share", est));
            }
            if let Some(est) = &v.redistributing {
                table.push_row(prop_row(&v.id, &v.label, est));
            }
            if let Some(est) = &v.fairness {
                table.push_row(mean_row(&v.id, &v.label, "fairness", est));
            }
        }
        table
    }

    /// Computed comparisons followed by skipped ones.
    #[must_use]
    pub fn tests(report: &AnalysisReport) -> Table {
        let mut table = Table::new(
            "tests",
            [
                "vignette",
                "measure",
                "status",
                "test",
                "expert_estimate",
                "expert_n",
                "reference_estimate",
                "reference_n",
                "difference",
                "ci_low",
                "ci_high",
                "statistic",
                "df",
                "p_value",
                "p_adjusted",
                "significant",
                "effect_size_name",
                "effect_size",
                "note",
            ],
        );

        for c in &report.comparisons {
            let r: &TestResult = &c.result;
            table.push_row(vec![
                c.vignette.clone(),
                c.measure.label().to_string(),
                "computed".to_string(),
                r.kind.label().to_string(),
                num(r.expert_estimate),
                r.expert_n.to_string(),
                num(r.reference_estimate),
                r.reference_n.to_string(),
                num(r.difference),
                num(r.ci_low),
                num(r.ci_high),
                num(r.statistic),
                opt_num(r.df),
                num(r.p_value),
                num(c.p_adjusted),
                c.significant.to_string(),
                r.kind.effect_size_name().to_string(),
                opt_num(r.effect_size),
                String::new(),
            ]);
        }
        for s in &report.skipped {
            let mut row = vec![
                s.vignette.clone(),
                s.measure.label().to_string(),
                "skipped".to_string(),
            ];
            row.resize(table.headers.len() - 1, String::new());
            row.push(s.reason.clone());
            table.push_row(row);
        }
        table
    }

    /// The clean, rescaled respondent-level data.
    #[must_use]
    pub fn cleaned_data(dataset: &Dataset) -> Table {
        let mut headers = vec![
            "response_id".to_string(),
            "field".to_string(),
            "rescaled".to_string(),
        ];
        for v in &dataset.vignettes {
            headers.push(v.share_column.clone());
            if let Some(col) = &v.fairness_column {
                headers.push(col.clone());
            }
        }
        let mut table = Table::new("cleaned_data", headers);

        for r in &dataset.responses {
            let mut row = vec![
                r.response_id.clone(),
                r.field.map(|f| f.label().to_string()).unwrap_or_default(),
                r.rescaled.to_string(),
            ];
            for (spec, answer) in dataset.vignettes.iter().zip(&r.answers) {
                row.push(opt_num(answer.share));
                if spec.fairness_column.is_some() {
                    row.push(answer.fairness.map(|f| f.to_string()).unwrap_or_default());
                }
            }
            table.push_row(row);
        }
        table
    }
}

// =============================================================================
// TESTS
// =============================================================================
