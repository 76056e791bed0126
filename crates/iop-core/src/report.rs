//! # Report Module
//!
//! Plain-text console report.
//!
//! Layout:
//! - One frame, one section per stage, box-drawing borders
//! - Tabular sections with aligned columns (labels left, numbers right)
//! - Fixed precision: proportions 3 dp, means 2 dp, p-values 4 dp
//! - Every skipped test is listed with its reason

use crate::analysis::AnalysisReport;
use crate::cleaning::CleaningLog;
use crate::inference::Measure;

/// Smallest p-value printed as a number.
const P_FLOOR: f64 = 0.0001;

// =============================================================================
// NUMBER FORMATTING
// =============================================================================

#[must_use]
pub fn fmt_proportion(x: f64) -> String {
    format!("{:.3}", x)
}

#[must_use]
pub fn fmt_mean(x: f64) -> String {
    format!("{:.2}", x)
}

/// p-value with 4 decimals, `<0.0001` below that.
#[must_use]
pub fn fmt_p(p: f64) -> String {
    if p < P_FLOOR {
        "<0.0001".to_string()
    } else {
        format!("{:.4}", p)
    }
}

fn fmt_interval(low: String, high: String) -> String {
    format!("[{}, {}]", low, high)
}

// =============================================================================
// SECTIONS
// =============================================================================

/// A titled block of report lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub title: String,
    pub lines: Vec<String>,
}

impl Section {
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            lines: Vec::new(),
        }
    }

    pub fn line(&mut self, text: impl Into<String>) {
        self.lines.push(text.into());
    }

    /// Append rows as aligned columns under a header row.
    pub fn grid(&mut self, headers: &[&str], rows: &[Vec<String>]) {
        let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
        for row in rows {
            for (i, cell) in row.iter().enumerate().take(widths.len()) {
                widths[i] = widths[i].max(cell.chars().count());
            }
        }

        let render = |cells: Vec<&str>| {
            cells
                .iter()
                .enumerate()
                .map(|(i, cell)| {
                    let pad = widths[i].saturating_sub(cell.chars().count());
                    if i == 0 {
                        format!("{}{}", cell, " ".repeat(pad))
                    } else {
                        format!("{}{}", " ".repeat(pad), cell)
                    }
                })
                .collect::<Vec<_>>()
                .join("  ")
        };

        self.lines.push(render(headers.to_vec()));
        for row in rows {
            self.lines
                .push(render(row.iter().map(String::as_str).collect()));
        }
    }
}

/// Sample flow through the cleaning rules.
#[must_use]
pub fn cleaning_section(log: &CleaningLog) -> Section {
    let mut section = Section::new("SAMPLE");
    let mut rows = vec![vec![
        "responses read".to_string(),
        String::new(),
        log.initial.to_string(),
    ]];
    for step in &log.steps {
        rows.push(vec![
            step.rule.description().to_string(),
            format!("-{}", step.excluded),
            step.remaining.to_string(),
        ]);
    }
    section.grid(&["step", "excluded", "remaining"], &rows);

    section.line(format!(
        "final sample: {} of {} ({} excluded)",
        log.final_count,
        log.initial,
        log.total_excluded()
    ));
    if !log.rescaled_ids.is_empty() {
        section.line(format!(
            "rescaled from amounts to percentages: {}",
            log.rescaled_ids.len()
        ));
    }
    if log.invalidated_values > 0 {
        section.line(format!(
            "out-of-range values set to missing: {}",
            log.invalidated_values
        ));
    }
    if log.corrections.applied > 0 || !log.corrections.unmatched.is_empty() {
        section.line(format!(
            "corrections: {} applied, {} unmatched",
            log.corrections.applied,
            log.corrections.unmatched.len()
        ));
    }
    section
}

/// Respondents per field.
#[must_use]
pub fn composition_section(report: &AnalysisReport) -> Section {
    let mut section = Section::new("COMPOSITION");
    let rows: Vec<Vec<String>> = report
        .composition
        .iter()
        .map(|r| {
            vec![
                r.label().to_string(),
                r.count.to_string(),
                format!("{:.1}%", r.percent),
            ]
        })
        .collect();
    section.grid(&["field", "n", "percent"], &rows);
    section
}

/// Shares, redistribution rates and fairness ratings per vignette.
#[must_use]
pub fn descriptives_section(report: &AnalysisReport) -> Section {
    let opts = &report.options;
    let mut section = Section::new(format!(
        "DESCRIPTIVES ({:.0}% CI)",
        opts.confidence_level * 100.0
    ));

    let mut rows = Vec::new();
    for v in &report.vignettes {
        let name = format!("{} {}", v.id, v.label);
        match &v.share {
            Some(est) => rows.push(vec![
                name,
                "mean share".to_string(),
                est.n.to_string(),
                fmt_mean(est.mean),
                fmt_interval(fmt_mean(est.ci_low), fmt_mean(est.ci_high)),
            ]),
            None => rows.push(vec![
                name,
                "mean share".to_string(),
                "0".to_string(),
                "-".to_string(),
                String::new(),
            ]),
        }
        if let Some(est) = &v.redistributing {
            rows.push(vec![
                String::new(),
                format!("share >= {}", opts.redistribution_threshold),
                est.n.to_string(),
                fmt_proportion(est.proportion),
                fmt_interval(fmt_proportion(est.ci_low), fmt_proportion(est.ci_high)),
            ]);
        }
        if let Some(est) = &v.fairness {
            rows.push(vec![
                String::new(),
                "mean fairness".to_string(),
                est.n.to_string(),
                fmt_mean(est.mean),
                fmt_interval(fmt_mean(est.ci_low), fmt_mean(est.ci_high)),
            ]);
        }
    }
    section.grid(&["vignette", "measure", "n", "estimate", "ci"], &rows);
    section.line(format!(
        "proportion intervals: {}",
        opts.proportion_interval.label()
    ));
    section
}

/// Expert versus reference tests, after correction.
#[must_use]
pub fn comparisons_section(report: &AnalysisReport) -> Section {
    let opts = &report.options;
    let mut section = Section::new(format!(
        "COMPARISON WITH {}",
        report.reference_source.as_deref().unwrap_or("REFERENCE")
    ));

    if report.comparisons.is_empty() {
        section.line("- (no tests computed)");
    } else {
        let rows: Vec<Vec<String>> = report
            .comparisons
            .iter()
            .map(|c| {
                let r = &c.result;
                let fmt = |x: f64| match c.measure {
                    Measure::Redistributing => fmt_proportion(x),
                    _ => fmt_mean(x),
                };
                vec![
                    c.vignette.clone(),
                    c.measure.label().to_string(),
                    fmt(r.expert_estimate),
                    fmt(r.reference_estimate),
                    fmt(r.difference),
                    format!("{:.3}", r.statistic),
                    fmt_p(r.p_value),
                    fmt_p(c.p_adjusted),
                    r.effect_size.map(|e| format!("{:.3}", e)).unwrap_or_default(),
                    if c.significant { "*" } else { "" }.to_string(),
                ]
            })
            .collect();
        section.grid(
            &[
                "vignette", "measure", "expert", "ref", "diff", "stat", "p", "p_adj", "effect",
                "",
            ],
            &rows,
        );
        section.line(format!(
            "{} of {} significant at alpha = {} ({} correction)",
            report.significant_count(),
            report.comparisons.len(),
            opts.alpha,
            opts.adjustment.label()
        ));
    }

    for s in &report.skipped {
        section.line(format!(
            "skipped {} {}: {}",
            s.vignette,
            s.measure.label(),
            s.reason
        ));
    }
    section
}

// =============================================================================
// RENDERING
// =============================================================================

/// Draw sections in one frame.
#[must_use]
pub fn render(sections: &[Section]) -> String {
    let width = sections
        .iter()
        .flat_map(|s| std::iter::once(&s.title).chain(s.lines.iter()))
        .map(|l| l.chars().count())
        .max()
        .unwrap_or(0);
    let rule = "─".repeat(width + 2);
    let boxed = |text: &str| {
        let pad = width - text.chars().count();
        format!("│ {}{} │\n", text, " ".repeat(pad))
    };

    let mut output = String::new();
    output.push_str(&format!("┌{}┐\n", rule));
    for (i, section) in sections.iter().enumerate() {
        if i > 0 {
            output.push_str(&format!("├{}┤\n", rule));
        }
        output.push_str(&boxed(&section.title));
        for line in &section.lines {
            output.push_str(&boxed(line));
        }
    }
    output.push_str(&format!("└{}┘\n", rule));
    output
}

/// Full report: sample, composition, descriptives and, if a reference is
/// configured, the comparison.
#[must_use]
pub fn full_report(log: &CleaningLog, report: &AnalysisReport) -> String {
    let mut sections = vec![
        cleaning_section(log),
        composition_section(report),
        descriptives_section(report),
    ];
    if report.reference_source.is_some() {
        sections.push(comparisons_section(report));
    }
    render(&sections)
}

// =============================================================================
// TESTS
// =============================================================================
