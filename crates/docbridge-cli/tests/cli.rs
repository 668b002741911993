use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use pretty_assertions::assert_eq;
use serde_json::Value;
use tempfile::{tempdir, TempDir};

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

fn setup_document(name: &str) -> (TempDir, PathBuf) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("report.txt");
    fs::copy(fixture(name), &path).unwrap();
    (dir, path)
}

fn docbridge(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("docbridge").unwrap();
    cmd.current_dir(dir).env_remove("DOCBRIDGE_LOG");
    cmd
}

fn result_lines(stdout: &[u8]) -> Vec<Value> {
    String::from_utf8_lossy(stdout)
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

#[test]
fn replays_script_and_prints_results() {
    let (dir, path) = setup_document("report.txt");

    let output = docbridge(dir.path())
        .arg(&path)
        .arg("--script")
        .arg(fixture("bump-year.ndjson"))
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let results = result_lines(&output);
    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["ok"], Value::Bool(true));
    assert_eq!(results[0]["data"]["replacedCount"], Value::from(3));
    assert_eq!(results[1]["data"]["results"], Value::Array(Vec::new()));

    let untouched = fs::read_to_string(&path).unwrap();
    assert!(untouched.contains("2024"));
}

#[test]
fn in_place_writes_document_and_backup() {
    let (dir, path) = setup_document("report.txt");
    let original = fs::read_to_string(&path).unwrap();

    docbridge(dir.path())
        .arg(&path)
        .arg("--script")
        .arg(fixture("bump-year.ndjson"))
        .arg("--in-place")
        .arg("--quiet")
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    let updated = fs::read_to_string(&path).unwrap();
    assert_eq!(updated, original.replace("2024", "2025"));
    assert_eq!(
        fs::read_to_string(path.with_extension("bak")).unwrap(),
        original
    );
}

#[test]
fn no_backup_skips_bak_file() {
    let (dir, path) = setup_document("report.txt");

    docbridge(dir.path())
        .arg(&path)
        .arg("--script")
        .arg(fixture("bump-year.ndjson"))
        .arg("--in-place")
        .arg("--no-backup")
        .assert()
        .success();

    assert!(!path.with_extension("bak").exists());
}

#[test]
fn diff_goes_to_stderr() {
    let (dir, path) = setup_document("report.txt");

    docbridge(dir.path())
        .arg(&path)
        .arg("--script")
        .arg(fixture("bump-year.ndjson"))
        .arg("--diff")
        .arg("--quiet")
        .assert()
        .success()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("-Annual report 2024"))
        .stderr(predicate::str::contains("+Annual report 2025"));
}

#[test]
fn reads_script_from_stdin_with_selection() {
    let (dir, path) = setup_document("report.txt");

    let output = docbridge(dir.path())
        .arg(&path)
        .arg("--select")
        .arg("0:6")
        .write_stdin("{\"opcode\":\"getSelection\"}\n")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let results = result_lines(&output);
    assert_eq!(results[0]["data"]["text"], Value::from("Annual"));
    assert_eq!(results[0]["data"]["start"], Value::from(0));
    assert_eq!(results[0]["data"]["end"], Value::from(6));
}

#[test]
fn exit_code_follows_last_failure() {
    let (dir, path) = setup_document("report.txt");

    let output = docbridge(dir.path())
        .arg(&path)
        .write_stdin(
            "{\"opcode\":\"getText\",\"args\":{\"scope\":\"range:gone-abcdef\"}}\n\
             {\"opcode\":\"getText\"}\n",
        )
        .assert()
        .code(1)
        .get_output()
        .stdout
        .clone();

    let results = result_lines(&output);
    assert_eq!(results[0]["code"], Value::from("NotFound"));
    assert_eq!(results[1]["ok"], Value::Bool(true));
}

#[test]
fn malformed_script_line_is_invalid_argument() {
    let (dir, path) = setup_document("report.txt");

    docbridge(dir.path())
        .arg(&path)
        .write_stdin("not json\n")
        .assert()
        .code(3)
        .stdout(predicate::str::contains("\"code\":\"InvalidArgument\""));
}

#[test]
fn unknown_opcode_is_reported() {
    let (dir, path) = setup_document("report.txt");

    docbridge(dir.path())
        .arg(&path)
        .write_stdin("{\"opcode\":\"deleteEverything\"}\n")
        .assert()
        .code(3)
        .stdout(predicate::str::contains("unknown opcode"));
}

#[test]
fn config_override_caps_search_results() {
    let (dir, path) = setup_document("report.txt");
    let config = dir.path().join("custom.toml");
    fs::write(&config, "[search]\nmax_results = 1\nmax_results_cap = 2\n").unwrap();

    let output = docbridge(dir.path())
        .arg(&path)
        .arg("--config")
        .arg(&config)
        .write_stdin("{\"opcode\":\"search\",\"args\":{\"query\":\"2024\"}}\n")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let results = result_lines(&output);
    assert_eq!(results[0]["data"]["results"].as_array().unwrap().len(), 1);
}

#[test]
fn invalid_config_fails_before_running() {
    let (dir, path) = setup_document("report.txt");
    let config = dir.path().join("broken.toml");
    fs::write(&config, "[search]\nmax_results = 0\n").unwrap();

    docbridge(dir.path())
        .arg(&path)
        .arg("--config")
        .arg(&config)
        .write_stdin("")
        .assert()
        .code(4)
        .stderr(predicate::str::contains("failed to load configuration"));
}

#[test]
fn missing_document_is_runtime_error() {
    let dir = tempdir().unwrap();

    docbridge(dir.path())
        .arg(dir.path().join("absent.txt"))
        .write_stdin("")
        .assert()
        .code(4)
        .stderr(predicate::str::contains("failed to read"));
}
