//! # Model Module
//!
//! Survey response rows and the vocabulary they are parsed into.
//!
//! A `Dataset` is built from a `RawTable` using the column mapping of an
//! `AnalysisConfig`. Parsing is strict: an unparseable cell is an error,
//! a missing-value token is `None`.

use crate::config::AnalysisConfig;
use crate::formats::RawTable;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// =============================================================================
// FIELD
// =============================================================================

/// Respondent discipline. Fixed, small set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Economics,
    Sociology,
    Philosophy,
    PoliticalScience,
    Other,
}

impl Field {
    /// All fields in reporting order.
    pub const ALL: [Field; 5] = [
        Field::Economics,
        Field::Sociology,
        Field::Philosophy,
        Field::PoliticalScience,
        Field::Other,
    ];

    /// Human-readable label.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Field::Economics => "Economics",
            Field::Sociology => "Sociology",
            Field::Philosophy => "Philosophy",
            Field::PoliticalScience => "Political science",
            Field::Other => "Other",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Field {
    type Err = String;

    /// Accepts labels (case-insensitive) or the survey's numeric codes 1-5.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['_', '-'], " ");
        match normalized.as_str() {
            "1" | "economics" | "economist" | "econ" => Ok(Field::Economics),
            "2" | "sociology" | "sociologist" => Ok(Field::Sociology),
            "3" | "philosophy" | "philosopher" => Ok(Field::Philosophy),
            "4" | "political science" | "politicalscience" | "politics" => {
                Ok(Field::PoliticalScience)
            }
            "5" | "other" => Ok(Field::Other),
            _ => Err(format!("unknown field label '{}'", s.trim())),
        }
    }
}

// =============================================================================
// VIGNETTES
// =============================================================================

/// One vignette of the questionnaire and where its answers live.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VignetteSpec {
    /// Short identifier, also used to key reference statistics (e.g. "V1").
    pub id: String,
    /// Descriptive label of the scenario.
    #[serde(default)]
    pub label: String,
    /// Column holding the allocated share, in percent.
    pub share_column: String,
    /// Column holding the fairness rating, if the vignette asks for one.
    #[serde(default)]
    pub fairness_column: Option<String>,
    /// Absolute amount the percentage refers to. Used to rescale answers
    /// that were entered as amounts instead of percentages.
    #[serde(default = "default_stake")]
    pub stake: f64,
}

fn default_stake() -> f64 {
    600.0
}

impl VignetteSpec {
    /// Create a vignette with the default stake.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        label: impl Into<String>,
        share_column: impl Into<String>,
        fairness_column: Option<String>,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            share_column: share_column.into(),
            fairness_column,
            stake: default_stake(),
        }
    }
}

/// A respondent's answer to one vignette.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct VignetteAnswer {
    /// Share allocated to the disadvantaged party, in percent.
    pub share: Option<f64>,
    /// Fairness rating. Values off the configured scale are set to missing
    /// during cleaning.
    pub fairness: Option<i32>,
}

// =============================================================================
// RESPONSE
// =============================================================================

/// One survey response row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub response_id: String,
    /// 1-based line in the source file.
    pub line: usize,
    pub status: Option<String>,
    pub finished: Option<bool>,
    pub progress: Option<f64>,
    pub duration_secs: Option<f64>,
    pub consent: Option<bool>,
    pub attention: Option<String>,
    pub field: Option<Field>,
    /// Aligned with `Dataset::vignettes`.
    pub answers: Vec<VignetteAnswer>,
    /// Set when the shares were entered as absolute amounts and rescaled.
    pub rescaled: bool,
}

impl Response {
    /// Create a response with only an id and answers.
    #[must_use]
    pub fn new(response_id: impl Into<String>, answers: Vec<VignetteAnswer>) -> Self {
        Self {
            response_id: response_id.into(),
            line: 0,
            status: None,
            finished: None,
            progress: None,
            duration_secs: None,
            consent: None,
            attention: None,
            field: None,
            answers,
            rescaled: false,
        }
    }

    /// Whether at least one vignette has a usable share.
    #[must_use]
    pub fn has_share(&self) -> bool {
        self.answers.iter().any(|a| a.share.is_some())
    }
}

// =============================================================================
// DATASET
// =============================================================================

/// Typed survey responses plus the vignettes they answer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub vignettes: Vec<VignetteSpec>,
    pub responses: Vec<Response>,
}

impl Dataset {
    /// Create a dataset from already-typed parts.
    #[must_use]
    pub fn new(vignettes: Vec<VignetteSpec>, responses: Vec<Response>) -> Self {
        Self {
            vignettes,
            responses,
        }
    }

    /// Number of responses.
    #[must_use]
    pub fn len(&self) -> usize {
        self.responses.len()
    }

    /// Whether there are no responses.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.responses.is_empty()
    }

    /// Valid shares for the vignette at `index`.
    pub fn shares(&self, index: usize) -> impl Iterator<Item = f64> + '_ {
        self.responses
            .iter()
            .filter_map(move |r| r.answers.get(index).and_then(|a| a.share))
    }

    /// Valid fairness ratings for the vignette at `index`.
    pub fn fairness(&self, index: usize) -> impl Iterator<Item = f64> + '_ {
        self.responses
            .iter()
            .filter_map(move |r| r.answers.get(index).and_then(|a| a.fairness))
            .map(f64::from)
    }

    /// Type the rows of a raw table using the configured column mapping.
    pub fn from_raw(raw: &RawTable, config: &AnalysisConfig) -> Result<Self> {
        let columns = &config.columns;
        let missing = &config.input.missing_tokens;

        let id_col = raw.require_column(&columns.response_id)?;
        let status_col = raw.optional_column(columns.status.as_deref())?;
        let finished_col = raw.optional_column(columns.finished.as_deref())?;
        let progress_col = raw.optional_column(columns.progress.as_deref())?;
        let duration_col = raw.optional_column(columns.duration.as_deref())?;
        let consent_col = raw.optional_column(columns.consent.as_deref())?;
        let attention_col = raw.optional_column(columns.attention.as_deref())?;
        let field_col = raw.optional_column(columns.field.as_deref())?;

        let mut vignette_cols = Vec::with_capacity(config.vignettes.len());
        for vignette in &config.vignettes {
            let share = raw.require_column(&vignette.share_column)?;
            let fairness = raw.optional_column(vignette.fairness_column.as_deref())?;
            vignette_cols.push((share, fairness));
        }

        let mut responses = Vec::with_capacity(raw.rows.len());
        for record in &raw.rows {
            let cell = |col: Option<usize>| present_cell(&record.values, col, missing);
            let parse_err = |col: Option<usize>, message: String| Error::Data {
                row: record.line,
                column: col
                    .and_then(|i| raw.headers.get(i))
                    .cloned()
                    .unwrap_or_default(),
                message,
            };

            let response_id = cell(Some(id_col)).unwrap_or_default().to_string();

            let finished = cell(finished_col)
                .map(|v| parse_bool(v).map_err(|m| parse_err(finished_col, m)))
                .transpose()?;
            let consent = cell(consent_col)
                .map(|v| parse_bool(v).map_err(|m| parse_err(consent_col, m)))
                .transpose()?;
            let progress = cell(progress_col)
                .map(|v| parse_number(v).map_err(|m| parse_err(progress_col, m)))
                .transpose()?;
            let duration_secs = cell(duration_col)
                .map(|v| parse_number(v).map_err(|m| parse_err(duration_col, m)))
                .transpose()?;
            let field = cell(field_col)
                .map(|v| v.parse::<Field>().map_err(|m| parse_err(field_col, m)))
                .transpose()?;

            let mut answers = Vec::with_capacity(vignette_cols.len());
            for &(share_col, fairness_col) in &vignette_cols {
                let share = cell(Some(share_col))
                    .map(|v| parse_number(v).map_err(|m| parse_err(Some(share_col), m)))
                    .transpose()?;
                let fairness = cell(fairness_col)
                    .map(|v| parse_rating(v).map_err(|m| parse_err(fairness_col, m)))
                    .transpose()?;
                answers.push(VignetteAnswer { share, fairness });
            }

            responses.push(Response {
                response_id,
                line: record.line,
                status: cell(status_col).map(str::to_string),
                finished,
                progress,
                duration_secs,
                consent,
                attention: cell(attention_col).map(str::to_string),
                field,
                answers,
                rescaled: false,
            });
        }

        Ok(Self::new(config.vignettes.clone(), responses))
    }
}

// =============================================================================
// CELL PARSING
// =============================================================================

fn present_cell<'a>(values: &'a [String], col: Option<usize>, missing: &[String]) -> Option<&'a str> {
    col.and_then(|i| values.get(i))
        .map(|v| v.trim())
        .filter(|v| !is_missing(v, missing))
}

/// Whether a trimmed cell is one of the missing-value tokens.
#[must_use]
pub fn is_missing(value: &str, tokens: &[String]) -> bool {
    value.is_empty() || tokens.iter().any(|t| t.eq_ignore_ascii_case(value))
}

/// Parse a survey boolean (1/0, true/false, yes/no, y/n).
pub fn parse_bool(value: &str) -> std::result::Result<bool, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" => Ok(true),
        "0" | "false" | "no" | "n" => Ok(false),
        other => Err(format!("expected a yes/no value, got '{}'", other)),
    }
}

/// Parse a finite number. A trailing percent sign and a decimal comma are
/// tolerated.
pub fn parse_number(value: &str) -> std::result::Result<f64, String> {
    let cleaned = value.trim().trim_end_matches('%').trim().replace(',', ".");
    match cleaned.parse::<f64>() {
        Ok(n) if n.is_finite() => Ok(n),
        _ => Err(format!("expected a number, got '{}'", value.trim())),
    }
}

/// Parse a Likert rating. Any integer is accepted; range checks happen
/// during cleaning.
pub fn parse_rating(value: &str) -> std::result::Result<i32, String> {
    let n = parse_number(value)?;
    if n.fract() != 0.0 || !(f64::from(i32::MIN)..=f64::from(i32::MAX)).contains(&n) {
        return Err(format!("expected an integer rating, got '{}'", value.trim()));
    }
    Ok(n as i32)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::read_table;

    fn sample_config() -> AnalysisConfig {
        let mut config = AnalysisConfig::default();
        config.vignettes = vec![
            VignetteSpec::new("V1", "Effort", "v1_share", Some("v1_fair".to_string())),
            VignetteSpec::new("V2", "Luck", "v2_share", None),
        ];
        config.columns.status = None;
        config.columns.progress = None;
        config.columns.duration = None;
        config.columns.attention = None;
        config
    }

    #[test]
    fn field_parses_labels_and_codes() {
        assert_eq!("Economics".parse::<Field>(), Ok(Field::Economics));
        assert_eq!(" econ ".parse::<Field>(), Ok(Field::Economics));
        assert_eq!("political_science".parse::<Field>(), Ok(Field::PoliticalScience));
        assert_eq!("3".parse::<Field>(), Ok(Field::Philosophy));
        assert!("astrology".parse::<Field>().is_err());
    }

    #[test]
    fn bool_and_number_parsing() {
        assert_eq!(parse_bool("TRUE"), Ok(true));
        assert_eq!(parse_bool("n"), Ok(false));
        assert!(parse_bool("maybe").is_err());

        assert_eq!(parse_number("17%"), Ok(17.0));
        assert_eq!(parse_number("12,5"), Ok(12.5));
        assert!(parse_number("abc").is_err());
        assert!(parse_number("inf").is_err());
    }

    #[test]
    fn rating_rejects_fractions_only() {
        assert_eq!(parse_rating("4"), Ok(4));
        assert_eq!(parse_rating("-1"), Ok(-1));
        assert_eq!(parse_rating("300"), Ok(300));
        assert!(parse_rating("4.5").is_err());
        assert!(parse_rating("very fair").is_err());
    }

    #[test]
    fn missing_tokens_are_case_insensitive() {
        let tokens = vec!["NA".to_string(), "-99".to_string()];
        assert!(is_missing("", &tokens));
        assert!(is_missing("na", &tokens));
        assert!(is_missing("-99", &tokens));
        assert!(!is_missing("0", &tokens));
    }

    #[test]
    fn from_raw_types_rows() {
        let config = sample_config();
        let text = "response_id,finished,consent,field,v1_share,v1_fair,v2_share\n\
                    R1,1,yes,economics,20,5,NA\n\
                    R2,0,no,2,,,40\n";
        let raw = read_table(text.as_bytes(), &config.input).unwrap_or_default();
        let dataset = Dataset::from_raw(&raw, &config);
        assert!(dataset.is_ok());
        let dataset = dataset.unwrap_or_default();

        assert_eq!(dataset.len(), 2);
        let r1 = &dataset.responses[0];
        assert_eq!(r1.response_id, "R1");
        assert_eq!(r1.line, 2);
        assert_eq!(r1.finished, Some(true));
        assert_eq!(r1.field, Some(Field::Economics));
        assert_eq!(r1.answers[0].share, Some(20.0));
        assert_eq!(r1.answers[0].fairness, Some(5));
        assert_eq!(r1.answers[1].share, None);

        let r2 = &dataset.responses[1];
        assert_eq!(r2.consent, Some(false));
        assert_eq!(r2.field, Some(Field::Sociology));
        assert!(r2.has_share());
        assert_eq!(dataset.shares(1).collect::<Vec<_>>(), vec![40.0]);
    }

    #[test]
    fn from_raw_reports_bad_cells() {
        let config = sample_config();
        let text = "response_id,finished,consent,field,v1_share,v1_fair,v2_share\n\
                    R1,1,yes,economics,twenty,5,10\n";
        let raw = read_table(text.as_bytes(), &config.input).unwrap_or_default();
        let result = Dataset::from_raw(&raw, &config);
        assert!(matches!(
            result,
            Err(Error::Data { row: 2, ref column, .. }) if column == "v1_share"
        ));
    }

    #[test]
    fn from_raw_requires_share_columns() {
        let config = sample_config();
        let text = "response_id,finished,consent,field,v1_share,v1_fair\nR1,1,1,1,10,4\n";
        let raw = read_table(text.as_bytes(), &config.input).unwrap_or_default();
        assert!(matches!(
            Dataset::from_raw(&raw, &config),
            Err(Error::Schema(_))
        ));
    }
}
