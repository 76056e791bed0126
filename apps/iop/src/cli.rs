//! # CLI Module
//!
//! Command implementations for the `iop` binary.
//!
//! Each `cmd_*` function reads its inputs from disk, runs the core pipeline
//! and writes the report to `out` (stdout in the binary). Logs go through
//! `tracing`; the report and JSON output never do.

use crate::export::export_tables;
use iop_core::report::{
    Section, cleaning_section, comparisons_section, composition_section, descriptives_section,
    full_report, render,
};
use iop_core::{
    AnalysisConfig, AnalysisReport, CleaningLog, CleaningOutcome, Error, ReferenceSummary,
    Result, Tabulator, analyze,
};
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

// =============================================================================
// INPUTS
// =============================================================================

/// Where a command reads its data and settings from.
#[derive(Debug, Clone, Default)]
pub struct Inputs {
    /// Survey export (CSV, or TSV by extension).
    pub data: PathBuf,
    /// Analysis config; defaults apply when absent.
    pub config: Option<PathBuf>,
    /// Published statistics; replaces `reference` from the config.
    pub reference: Option<PathBuf>,
    /// Overrides the configured delimiter.
    pub delimiter: Option<char>,
}

impl Inputs {
    #[must_use]
    pub fn new(data: impl Into<PathBuf>) -> Self {
        Self {
            data: data.into(),
            ..Self::default()
        }
    }
}

fn read_text(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| {
        Error::Io(std::io::Error::new(
            e.kind(),
            format!("{}: {}", path.display(), e),
        ))
    })
}

/// Load a config file, or the defaults when no path is given.
pub fn load_config(path: Option<&Path>) -> Result<AnalysisConfig> {
    match path {
        Some(path) => {
            let config = AnalysisConfig::from_json(&read_text(path)?)?;
            debug!(path = %path.display(), "config loaded");
            Ok(config)
        }
        None => {
            debug!("no config given, using defaults");
            Ok(AnalysisConfig::default())
        }
    }
}

/// Resolve the effective config for a data command.
pub fn resolve_config(inputs: &Inputs) -> Result<AnalysisConfig> {
    let mut config = load_config(inputs.config.as_deref())?;

    if let Some(path) = &inputs.reference {
        let reference = ReferenceSummary::from_json(&read_text(path)?)?;
        info!(
            path = %path.display(),
            source = %reference.source,
            vignettes = reference.vignettes.len(),
            "reference statistics loaded"
        );
        config.reference = Some(reference);
    }

    if let Some(delimiter) = inputs.delimiter {
        config.input.delimiter = delimiter;
    } else if inputs
        .data
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("tsv"))
    {
        config.input.delimiter = '\t';
    }

    config.validate()?;
    Ok(config)
}

// =============================================================================
// PIPELINE STAGES
// =============================================================================

/// Read, correct, type and clean the survey.
pub fn clean_survey(inputs: &Inputs, config: &AnalysisConfig) -> Result<CleaningOutcome> {
    let text = read_text(&inputs.data)?;
    debug!(path = %inputs.data.display(), bytes = text.len(), "survey read");

    let outcome = iop_core::clean_text(&text, config)?;
    log_cleaning(&outcome.log);
    Ok(outcome)
}

fn log_cleaning(log: &CleaningLog) {
    if log.corrections.applied > 0 {
        info!(applied = log.corrections.applied, "corrections applied");
    }
    for unmatched in &log.corrections.unmatched {
        warn!(
            response_id = %unmatched.response_id,
            column = %unmatched.column,
            "correction matched no cell"
        );
    }
    for step in &log.steps {
        debug!(
            rule = %step.rule,
            excluded = step.excluded,
            remaining = step.remaining,
            "exclusion rule"
        );
    }
    if !log.rescaled_ids.is_empty() {
        info!(
            count = log.rescaled_ids.len(),
            ids = ?log.rescaled_ids,
            "absolute amounts rescaled to percentages"
        );
    }
    if log.invalidated_values > 0 {
        info!(count = log.invalidated_values, "out-of-range values set to missing");
    }
    info!(
        initial = log.initial,
        excluded = log.total_excluded(),
        final_count = log.final_count,
        "cleaning complete"
    );
    if log.final_count == 0 {
        warn!("no responses left after cleaning");
    }
}

fn analyze_logged(outcome: &CleaningOutcome, config: &AnalysisConfig) -> AnalysisReport {
    let report = analyze(&outcome.dataset, &outcome.log, config);
    for skipped in &report.skipped {
        warn!(
            vignette = %skipped.vignette,
            measure = %skipped.measure,
            reason = %skipped.reason,
            "test skipped"
        );
    }
    if !report.comparisons.is_empty() {
        info!(
            tests = report.comparisons.len(),
            significant = report.significant_count(),
            adjustment = %report.options.adjustment,
            "comparison complete"
        );
    }
    report
}

#[derive(Serialize)]
struct RunOutput<'a> {
    cleaning: &'a CleaningLog,
    report: &'a AnalysisReport,
}

fn write_json<T: Serialize>(out: &mut dyn Write, value: &T) -> Result<()> {
    writeln!(out, "{}", serde_json::to_string_pretty(value)?)?;
    Ok(())
}

// =============================================================================
// COMMANDS
// =============================================================================

/// Full pipeline: clean, describe, compare, optionally export.
pub fn cmd_run(out: &mut dyn Write, inputs: &Inputs, out_dir: Option<&Path>, json: bool) -> Result<()> {
    let config = resolve_config(inputs)?;
    let outcome = clean_survey(inputs, &config)?;
    let report = analyze_logged(&outcome, &config);

    if let Some(dir) = out_dir {
        let tables = Tabulator::all(&outcome.dataset, &outcome.log, &report);
        export_tables(dir, &tables, &inputs.data)?;
    }

    if json {
        write_json(
            out,
            &RunOutput {
                cleaning: &outcome.log,
                report: &report,
            },
        )
    } else {
        write!(out, "{}", full_report(&outcome.log, &report))?;
        Ok(())
    }
}

/// Cleaning only; writes the clean data and the cleaning log.
pub fn cmd_clean(out: &mut dyn Write, inputs: &Inputs, out_dir: &Path, json: bool) -> Result<()> {
    let config = resolve_config(inputs)?;
    let outcome = clean_survey(inputs, &config)?;

    let tables = [
        Tabulator::cleaning_log(&outcome.log),
        Tabulator::cleaned_data(&outcome.dataset),
    ];
    export_tables(out_dir, &tables, &inputs.data)?;

    if json {
        write_json(out, &outcome.log)
    } else {
        write!(out, "{}", render(&[cleaning_section(&outcome.log)]))?;
        Ok(())
    }
}

/// Cleaning plus descriptive statistics, without tests.
pub fn cmd_describe(out: &mut dyn Write, inputs: &Inputs, json: bool) -> Result<()> {
    let mut config = resolve_config(inputs)?;
    config.reference = None;
    let outcome = clean_survey(inputs, &config)?;
    let report = analyze_logged(&outcome, &config);

    if json {
        write_json(
            out,
            &RunOutput {
                cleaning: &outcome.log,
                report: &report,
            },
        )
    } else {
        let sections = [
            cleaning_section(&outcome.log),
            composition_section(&report),
            descriptives_section(&report),
        ];
        write!(out, "{}", render(&sections))?;
        Ok(())
    }
}

/// Expert versus reference tests only.
pub fn cmd_compare(out: &mut dyn Write, inputs: &Inputs, json: bool) -> Result<()> {
    let config = resolve_config(inputs)?;
    if config.reference.is_none() {
        return Err(Error::Config(
            "no reference statistics configured (use --reference or the config's reference section)"
                .to_string(),
        ));
    }
    let outcome = clean_survey(inputs, &config)?;
    let report = analyze_logged(&outcome, &config);

    if json {
        #[derive(Serialize)]
        struct CompareOutput<'a> {
            reference_source: Option<&'a str>,
            comparisons: &'a [iop_core::analysis::Comparison],
            skipped: &'a [iop_core::analysis::SkippedTest],
        }
        write_json(
            out,
            &CompareOutput {
                reference_source: report.reference_source.as_deref(),
                comparisons: &report.comparisons,
                skipped: &report.skipped,
            },
        )
    } else {
        write!(out, "{}", render(&[comparisons_section(&report)]))?;
        Ok(())
    }
}

/// Write the default config to `path`.
pub fn cmd_init_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        return Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            format!("{} already exists (use --force to overwrite)", path.display()),
        )));
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, AnalysisConfig::default().to_json_pretty()?)?;
    info!(path = %path.display(), "default config written");
    Ok(())
}

/// Validate a config file and summarize it.
pub fn cmd_check_config(out: &mut dyn Write, path: &Path, json: bool) -> Result<()> {
    let config = load_config(Some(path))?;
    config.validate()?;

    if json {
        return write_json(out, &config);
    }

    let opts = &config.analysis;
    let mut section = Section::new(format!("CONFIG {}", path.display()));
    section.line("valid");
    section.line(format!("vignettes: {}", config.vignettes.len()));
    for v in &config.vignettes {
        section.line(format!(
            "  {} {} (share: {}, fairness: {}, stake: {})",
            v.id,
            v.label,
            v.share_column,
            v.fairness_column.as_deref().unwrap_or("-"),
            v.stake
        ));
    }
    section.line(format!(
        "redistribution threshold: {}%",
        opts.redistribution_threshold
    ));
    section.line(format!(
        "confidence level: {}, alpha: {}, adjustment: {}",
        opts.confidence_level, opts.alpha, opts.adjustment
    ));
    section.line(format!("corrections: {}", config.cleaning.corrections.len()));
    section.line(format!(
        "reference: {}",
        config
            .reference
            .as_ref()
            .map_or("none", |r| r.source.as_str())
    ));
    write!(out, "{}", render(&[section]))?;
    Ok(())
}
