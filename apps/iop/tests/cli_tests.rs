//! Integration tests for iop CLI commands.
//!
//! Uses tempfile for testing file-based operations.

// Allow unwrap and panic in tests - these are standard for test code
#![allow(clippy::unwrap_used, clippy::panic)]

use iop::cli::{
    Inputs, cmd_check_config, cmd_clean, cmd_compare, cmd_describe, cmd_init_config, cmd_run,
    load_config,
};
use iop::export::{MANIFEST_FILE, Manifest};
use iop_core::Error;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

const HEADER: &str = "response_id,status,finished,progress,duration,consent,attention,field,\
v1_share,v1_fair,v2_share,v2_fair,v3_share,v3_fair,v4_share,v4_fair";

/// Seven responses: one preview, one without consent, one unfinished, one
/// repeated id, and one that entered amounts out of 600 instead of percents.
const ROWS: &[&str] = &[
    "R1,IP Address,1,100,600,1,,Economics,10,5,30,3,40,2,20,4",
    "R2,IP Address,1,100,500,1,,Sociology,20,4,25,4,50,2,0,6",
    "R3,Survey Preview,1,100,300,1,,Economics,50,5,50,5,50,5,50,5",
    "R4,IP Address,0,40,100,1,,Philosophy,,,,,,,,",
    "R5,IP Address,1,100,450,0,,Economics,15,3,15,3,15,3,15,3",
    "R6,IP Address,1,100,800,1,,Political science,120,6,300,3,60,9,0,5",
    "R1,IP Address,1,100,610,1,,Economics,10,5,30,3,40,2,20,4",
];

/// Create a temporary directory for tests.
fn create_temp_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

fn write_file(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, content).unwrap();
    path
}

/// Create the sample survey with a given delimiter.
fn create_survey(dir: &TempDir, name: &str, delimiter: char) -> PathBuf {
    let mut text = String::new();
    for line in std::iter::once(HEADER).chain(ROWS.iter().copied()) {
        text.push_str(&line.replace(',', &delimiter.to_string()));
        text.push('\n');
    }
    write_file(dir, name, &text)
}

/// Create published statistics for V1 only.
fn create_reference(dir: &TempDir) -> PathBuf {
    write_file(
        dir,
        "reference.json",
        r#"{
            "source": "Population survey",
            "vignettes": {
                "V1": {
                    "redistributing": {"proportion": 0.4, "n": 1000},
                    "share": {"mean": 15.0, "sd": 10.0, "n": 1000},
                    "fairness": {"mean": 4.0, "sd": 1.5, "n": 1000}
                }
            }
        }"#,
    )
}

fn output_of<F>(f: F) -> String
where
    F: FnOnce(&mut Vec<u8>) -> iop_core::Result<()>,
{
    let mut buf = Vec::new();
    f(&mut buf).unwrap();
    String::from_utf8(buf).unwrap()
}

fn read_csv_lines(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

// =============================================================================
// CONFIG COMMAND TESTS
// =============================================================================

#[test]
fn test_init_config_creates_loadable_file() {
    let temp = create_temp_dir();
    let path = temp.path().join("conf").join("iop.json");

    let result = cmd_init_config(&path, false);
    assert!(result.is_ok());
    assert!(path.exists());

    let config = load_config(Some(&path)).unwrap();
    assert_eq!(config, iop_core::AnalysisConfig::default());
}

#[test]
fn test_init_config_fails_if_exists_without_force() {
    let temp = create_temp_dir();
    let path = temp.path().join("iop.json");

    cmd_init_config(&path, false).unwrap();

    let result = cmd_init_config(&path, false);
    assert!(result.is_err());
}

#[test]
fn test_init_config_succeeds_with_force() {
    let temp = create_temp_dir();
    let path = write_file(&temp, "iop.json", "not json");

    let result = cmd_init_config(&path, true);
    assert!(result.is_ok());
    assert!(load_config(Some(&path)).is_ok());
}

#[test]
fn test_check_config_summarizes_valid_config() {
    let temp = create_temp_dir();
    let path = write_file(&temp, "iop.json", r#"{"analysis": {"adjustment": "bonferroni"}}"#);

    let text = output_of(|out| cmd_check_config(out, &path, false));
    assert!(text.contains("valid"));
    assert!(text.contains("vignettes: 4"));
    assert!(text.contains("V3 Family background"));
    assert!(text.contains("adjustment: bonferroni"));
    assert!(text.contains("reference: none"));
}

#[test]
fn test_check_config_rejects_invalid_config() {
    let temp = create_temp_dir();
    let path = write_file(&temp, "iop.json", r#"{"analysis": {"alpha": 2.0}}"#);

    let mut out = Vec::new();
    let result = cmd_check_config(&mut out, &path, false);
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn test_check_config_rejects_malformed_json() {
    let temp = create_temp_dir();
    let path = write_file(&temp, "iop.json", "{ not json");

    let mut out = Vec::new();
    let result = cmd_check_config(&mut out, &path, false);
    assert!(matches!(result, Err(Error::Json(_))));
}

// =============================================================================
// RUN COMMAND TESTS
// =============================================================================

#[test]
fn test_run_prints_report() {
    let temp = create_temp_dir();
    let inputs = Inputs::new(create_survey(&temp, "survey.csv", ','));

    let text = output_of(|out| cmd_run(out, &inputs, None, false));
    assert!(text.contains("final sample: 3 of 7 (4 excluded)"));
    assert!(text.contains("rescaled from amounts to percentages: 1"));
    assert!(text.contains("out-of-range values set to missing: 1"));
    assert!(text.contains("DESCRIPTIVES"));
    assert!(!text.contains("COMPARISON"));
}

#[test]
fn test_run_with_reference_compares() {
    let temp = create_temp_dir();
    let mut inputs = Inputs::new(create_survey(&temp, "survey.csv", ','));
    inputs.reference = Some(create_reference(&temp));

    let text = output_of(|out| cmd_run(out, &inputs, None, false));
    assert!(text.contains("COMPARISON WITH Population survey"));
    assert!(text.contains("skipped V2 share: no published statistics"));
}

#[test]
fn test_run_json_mode() {
    let temp = create_temp_dir();
    let mut inputs = Inputs::new(create_survey(&temp, "survey.csv", ','));
    inputs.reference = Some(create_reference(&temp));

    let text = output_of(|out| cmd_run(out, &inputs, None, true));
    let json: serde_json::Value = serde_json::from_str(&text).unwrap();

    assert_eq!(json["cleaning"]["initial"], 7);
    assert_eq!(json["cleaning"]["final_count"], 3);
    assert_eq!(json["cleaning"]["rescaled_ids"], serde_json::json!(["R6"]));
    assert_eq!(json["report"]["sample_size"], 3);
    assert_eq!(json["report"]["comparisons"].as_array().map(Vec::len), Some(3));
}

#[test]
fn test_run_exports_tables_and_manifest() {
    let temp = create_temp_dir();
    let out_dir = temp.path().join("results");
    let inputs = Inputs::new(create_survey(&temp, "survey.csv", ','));

    let mut out = Vec::new();
    cmd_run(&mut out, &inputs, Some(&out_dir), false).unwrap();

    for name in [
        "cleaning_log.csv",
        "composition.csv",
        "descriptives.csv",
        "tests.csv",
        "cleaned_data.csv",
        MANIFEST_FILE,
    ] {
        assert!(out_dir.join(name).exists(), "{name} missing");
    }

    let manifest: Manifest =
        serde_json::from_str(&std::fs::read_to_string(out_dir.join(MANIFEST_FILE)).unwrap())
            .unwrap();
    assert_eq!(manifest.files.len(), 5);
    let cleaned = manifest
        .files
        .iter()
        .find(|f| f.file == "cleaned_data.csv")
        .unwrap();
    assert_eq!(cleaned.rows, 3);
    assert!(manifest.input.ends_with("survey.csv"));
}

#[test]
fn test_run_reads_tsv_by_extension() {
    let temp = create_temp_dir();
    let inputs = Inputs::new(create_survey(&temp, "survey.tsv", '\t'));

    let text = output_of(|out| cmd_run(out, &inputs, None, false));
    assert!(text.contains("final sample: 3 of 7"));
}

#[test]
fn test_run_with_explicit_delimiter() {
    let temp = create_temp_dir();
    let mut inputs = Inputs::new(create_survey(&temp, "survey.txt", ';'));
    inputs.delimiter = Some(';');

    let text = output_of(|out| cmd_run(out, &inputs, None, false));
    assert!(text.contains("final sample: 3 of 7"));
}

#[test]
fn test_run_missing_data_file() {
    let temp = create_temp_dir();
    let inputs = Inputs::new(temp.path().join("nonexistent.csv"));

    let mut out = Vec::new();
    let result = cmd_run(&mut out, &inputs, None, false);
    assert!(matches!(result, Err(Error::Io(_))));
}

#[test]
fn test_run_missing_column_is_schema_error() {
    let temp = create_temp_dir();
    let data = write_file(&temp, "survey.csv", "response_id,v1_share\nR1,10\n");
    let inputs = Inputs::new(data);

    let mut out = Vec::new();
    let result = cmd_run(&mut out, &inputs, None, false);
    assert!(matches!(result, Err(Error::Schema(_))));
}

#[test]
fn test_run_unparseable_cell_then_corrected() {
    let temp = create_temp_dir();
    let mut text = String::from(HEADER);
    text.push('\n');
    for row in ROWS {
        text.push_str(&row.replace("R2,IP Address,1,100,500,1,,Sociology,20", "R2,IP Address,1,100,500,1,,Sociology,twenty"));
        text.push('\n');
    }
    let data = write_file(&temp, "survey.csv", &text);

    let mut out = Vec::new();
    let result = cmd_run(&mut out, &Inputs::new(&data), None, false);
    assert!(matches!(
        result,
        Err(Error::Data { ref column, .. }) if column == "v1_share"
    ));

    let config = write_file(
        &temp,
        "iop.json",
        r#"{"cleaning": {"corrections": [
            {"response_id": "R2", "column": "v1_share", "value": "20", "note": "typed as words"},
            {"response_id": "R99", "column": "v1_share", "value": "1"}
        ]}}"#,
    );
    let mut inputs = Inputs::new(&data);
    inputs.config = Some(config);

    let text = output_of(|out| cmd_run(out, &inputs, None, false));
    assert!(text.contains("corrections: 1 applied, 1 unmatched"));
    assert!(text.contains("final sample: 3 of 7"));
}

// =============================================================================
// CLEAN / DESCRIBE / COMPARE TESTS
// =============================================================================

#[test]
fn test_clean_writes_clean_data() {
    let temp = create_temp_dir();
    let out_dir = temp.path().join("clean");
    let inputs = Inputs::new(create_survey(&temp, "survey.csv", ','));

    let text = output_of(|out| cmd_clean(out, &inputs, &out_dir, false));
    assert!(text.contains("SAMPLE"));

    let lines = read_csv_lines(&out_dir.join("cleaned_data.csv"));
    assert_eq!(lines.len(), 4);
    assert!(lines[0].starts_with("response_id,field,rescaled,v1_share,v1_fair"));
    assert_eq!(lines[1], "R1,Economics,false,10.000000,5,30.000000,3,40.000000,2,20.000000,4");
    assert_eq!(
        lines[3],
        "R6,Political science,true,20.000000,6,50.000000,3,10.000000,,0.000000,5"
    );

    let log = read_csv_lines(&out_dir.join("cleaning_log.csv"));
    assert!(log.iter().any(|l| l.starts_with("duplicate,repeated response id,1,3")));
    assert!(!out_dir.join("tests.csv").exists());
}

#[test]
fn test_clean_json_mode() {
    let temp = create_temp_dir();
    let out_dir = temp.path().join("clean");
    let inputs = Inputs::new(create_survey(&temp, "survey.csv", ','));

    let text = output_of(|out| cmd_clean(out, &inputs, &out_dir, true));
    let json: serde_json::Value = serde_json::from_str(&text).unwrap();
    let rules: Vec<&str> = json["steps"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["rule"].as_str().unwrap())
        .collect();
    assert_eq!(
        rules,
        vec!["status", "consent", "incomplete", "missing_id", "duplicate", "no_vignette_data"]
    );
}

#[test]
fn test_describe_ignores_reference() {
    let temp = create_temp_dir();
    let mut inputs = Inputs::new(create_survey(&temp, "survey.csv", ','));
    inputs.reference = Some(create_reference(&temp));

    let text = output_of(|out| cmd_describe(out, &inputs, false));
    assert!(text.contains("COMPOSITION"));
    assert!(text.contains("V1 Effort"));
    assert!(!text.contains("COMPARISON"));
}

#[test]
fn test_compare_requires_reference() {
    let temp = create_temp_dir();
    let inputs = Inputs::new(create_survey(&temp, "survey.csv", ','));

    let mut out = Vec::new();
    let result = cmd_compare(&mut out, &inputs, false);
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn test_compare_with_reference() {
    let temp = create_temp_dir();
    let mut inputs = Inputs::new(create_survey(&temp, "survey.csv", ','));
    inputs.reference = Some(create_reference(&temp));

    let text = output_of(|out| cmd_compare(out, &inputs, false));
    assert!(text.contains("COMPARISON WITH Population survey"));
    assert!(!text.contains("DESCRIPTIVES"));

    let json = output_of(|out| cmd_compare(out, &inputs, true));
    let json: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(json["reference_source"], "Population survey");
    assert_eq!(json["comparisons"].as_array().map(Vec::len), Some(3));
}

#[test]
fn test_reference_for_unknown_vignette_is_rejected() {
    let temp = create_temp_dir();
    let mut inputs = Inputs::new(create_survey(&temp, "survey.csv", ','));
    inputs.reference = Some(write_file(
        &temp,
        "reference.json",
        r#"{"source": "x", "vignettes": {"V9": {"share": {"mean": 1.0, "sd": 1.0, "n": 10}}}}"#,
    ));

    let mut out = Vec::new();
    let result = cmd_compare(&mut out, &inputs, false);
    assert!(matches!(result, Err(Error::Reference(_))));
}

// =============================================================================
// BUNDLED SAMPLE DATA
// =============================================================================

#[test]
fn test_run_on_bundled_sample() {
    let data_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../data");
    let mut inputs = Inputs::new(data_dir.join("sample_survey.csv"));
    inputs.reference = Some(data_dir.join("reference_example.json"));

    let text = output_of(|out| cmd_run(out, &inputs, None, false));
    assert!(text.contains("final sample: 8 of 12 (4 excluded)"));
    assert!(text.contains("rescaled from amounts to percentages: 1"));
    assert!(text.contains("skipped V4 fairness: no published statistics"));
}
