//! E2E tests for the command line

use std::io::Write;
use std::process::{Command, Output, Stdio};

fn classtrib(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_classtrib"))
        .args(args)
        .output()
        .expect("Failed to execute command")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn resolve_lists_every_annex() {
    let output = classtrib(&["resolve", "0102.21.10", "-c", "tests/data/catalog.csv"]);
    assert!(output.status.success(), "Command failed: {:?}", output);

    let stdout = stdout(&output);
    assert!(stdout.contains("01022110"));
    assert!(stdout.contains("ANEXO_I"));
    assert!(stdout.contains("ANEXO_VII"));
    assert!(stdout.contains("Multiple annexes"));
}

#[test]
fn resolve_restores_leading_zero_of_ledger_code() {
    let output = classtrib(&["resolve", "1022110", "-c", "tests/data/catalog.csv", "--json"]);
    assert!(output.status.success(), "Command failed: {:?}", output);

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["code"]["canonical"], "01022110");
    assert_eq!(json["multi_enquadramento"], true);
}

#[test]
fn resolve_json() {
    let output = classtrib(&[
        "resolve",
        "3101.00.00",
        "-c",
        "tests/data/catalog.csv",
        "--json",
    ]);
    assert!(output.status.success(), "Command failed: {:?}", output);

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["code"]["canonical"], "31010000");
    assert_eq!(json["multi_enquadramento"], false);
    assert_eq!(json["matches"][0]["annex"], "ANEXO_IX");
}

#[test]
fn resolve_accepts_json_catalog() {
    let output = classtrib(&["resolve", "01022110", "-c", "tests/data/catalog.json"]);
    assert!(output.status.success(), "Command failed: {:?}", output);
    assert!(stdout(&output).contains("ANEXO_VII"));
}

#[test]
fn resolve_rejects_invalid_code() {
    let output = classtrib(&["resolve", "abc", "-c", "tests/data/catalog.csv"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("contains no digits"));
}

#[test]
fn batch_reports_triage_counts() {
    let output = classtrib(&[
        "batch",
        "tests/data/codes.txt",
        "-c",
        "tests/data/catalog.csv",
        "--json",
    ]);
    assert!(output.status.success(), "Command failed: {:?}", output);

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let entries = json["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 6);
    assert_eq!(entries[0]["raw"], "0102.21.10");
    assert_eq!(entries[3]["status"], "invalid");
    assert_eq!(json["clean_count"], 2);
    assert_eq!(json["ambiguous_count"], 2);
    assert_eq!(json["service_count"], 1);
    assert_eq!(json["failure_count"], 1);
}

#[test]
fn batch_reads_stdin_and_applies_principal_annex() {
    let mut child = Command::new(env!("CARGO_BIN_EXE_classtrib"))
        .args([
            "batch",
            "-c",
            "tests/data/catalog.csv",
            "--principal",
            "anexo vii",
            "--csv",
        ])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .expect("Failed to spawn command");
    child
        .stdin
        .take()
        .unwrap()
        .write_all(b"0102.21.10\n3004.90.99\n")
        .unwrap();
    let output = child.wait_with_output().unwrap();
    assert!(output.status.success(), "Command failed: {:?}", output);

    let stdout = stdout(&output);
    let lines: Vec<_> = stdout.lines().collect();
    assert!(lines[0].starts_with("row_num,input,code"));
    assert!(lines[1].contains("ANEXO_VII,60%"));
    assert!(!lines[2].contains("ANEXO_VII"));
}

#[test]
fn classify_repair_shipment_is_tier_one() {
    let output = classtrib(&["classify", "5915", "RED_60_ALIMENTOS", "000", "--json"]);
    assert!(output.status.success(), "Command failed: {:?}", output);

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["tier"], "NonOnerous");
    assert_eq!(json["code"], "410999");
}

#[test]
fn classify_unclassified_still_renders() {
    let output = classtrib(&["classify", "5102", "UNKNOWN", "410"]);
    assert!(output.status.success(), "Command failed: {:?}", output);
    assert!(stdout(&output).contains("Unclassified"));
}

#[test]
fn assess_requires_principal_for_ambiguous_code() {
    let output = classtrib(&["assess", "3004.90.99", "-c", "tests/data/catalog.csv"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("principal annex"));

    let output = classtrib(&[
        "assess",
        "3004.90.99",
        "-c",
        "tests/data/catalog.csv",
        "-p",
        "ANEXO_XIV",
        "--json",
    ]);
    assert!(output.status.success(), "Command failed: {:?}", output);
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["regime"], "ALIQ_ZERO_CESTA_BASICA_NACIONAL");
    assert_eq!(json["classification"]["code"], "200003");
}

#[test]
fn assess_prints_rates() {
    let output = classtrib(&["assess", "31010000", "-c", "tests/data/catalog.csv"]);
    assert!(output.status.success(), "Command failed: {:?}", output);

    let stdout = stdout(&output);
    assert!(stdout.contains("RED_60_ESSENCIALIDADE"));
    assert!(stdout.contains("0.36%"));
    assert!(stdout.contains("200034"));
}

#[test]
fn enrich_whole_table() {
    let output = classtrib(&["enrich", "-n", "tests/data/nomenclature.csv"]);
    assert!(output.status.success(), "Command failed: {:?}", output);

    let stdout = stdout(&output);
    assert!(stdout.starts_with("code,description"));
    assert!(stdout.contains(
        "10062010,Cereais. > Arroz. > Arroz descascado (arroz cargo ou castanho) > Parboilizado"
    ));
    assert!(!stdout.contains("\n01,"));
}

#[test]
fn enrich_single_code_with_leaf() {
    let output = classtrib(&[
        "enrich",
        "-n",
        "tests/data/nomenclature.csv",
        "0102.21.90",
        "--leaf=-- Outros",
    ]);
    assert!(output.status.success(), "Command failed: {:?}", output);
    assert_eq!(
        stdout(&output).trim(),
        "Animais vivos. > Animais vivos da espécie bovina. > Reprodutores de raça pura > Outros"
    );
}

#[test]
fn validate_passes_good_sources() {
    let output = classtrib(&["validate", "-c", "tests/data/catalog.csv"]);
    assert!(output.status.success(), "Command failed: {:?}", output);

    let stdout = stdout(&output);
    assert!(stdout.contains("No issues found"));
    assert!(stdout.contains("Service codes excluded at rows: 9"));
}

#[test]
fn validate_fails_bad_catalog() {
    let output = classtrib(&["validate", "-c", "tests/data/bad_catalog.csv", "--json"]);
    assert_eq!(output.status.code(), Some(1));

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["issue_count"], 1);
    assert_eq!(json["issues"][0]["source"], "catalog");
    assert!(json["issues"][0]["message"]
        .as_str()
        .unwrap()
        .contains("row 2"));
}

#[test]
fn schema_outputs() {
    let output = classtrib(&["schema", "rules"]);
    assert!(output.status.success(), "Command failed: {:?}", output);
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["title"], "RuleTables");

    let output = classtrib(&["schema", "csv-header"]);
    assert_eq!(
        stdout(&output).trim(),
        "pattern,annex,description,reduction_fraction"
    );
}
