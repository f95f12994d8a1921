use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::path::PathBuf;
use std::process::Command;

const EQUINOX: &str = "2024-03-20";

fn zman() -> Command {
    let mut cmd = Command::cargo_bin("zman").unwrap();
    for var in ["ZMAN_LATITUDE", "ZMAN_LONGITUDE", "ZMAN_ELEVATION", "ZMAN_TIMEZONE", "ZMAN_DATE", "RUST_LOG"] {
        cmd.env_remove(var);
    }
    cmd
}

fn write_set(dir: &tempfile::TempDir, json: &str) -> PathBuf {
    let path = dir.path().join("zmanim.json");
    std::fs::write(&path, json).unwrap();
    path
}

#[test]
fn tokens_lists_every_token() {
    zman()
        .args(["tokens", "solar(16.1, before_sunrise)"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Function"))
        .stdout(predicate::str::contains("Direction"))
        .stdout(predicate::str::contains("16.1"))
        .stdout(predicate::str::contains("Eof"));
}

#[test]
fn parse_prints_canonical_form_and_type() {
    zman()
        .args(["parse", "sunset+18min"])
        .assert()
        .success()
        .stdout(predicate::str::contains("sunset + 18min"))
        .stdout(predicate::str::contains("Time"));
}

#[test]
fn parse_error_is_nonzero() {
    zman()
        .args(["parse", "sunrise +"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Syntax error"));
}

#[test]
fn validate_accepts_good_formula() {
    zman()
        .args(["validate", "proportional_hours(3, gra)"])
        .assert()
        .success()
        .stdout(predicate::str::contains("valid"));
}

#[test]
fn validate_reports_undefined_reference_with_available_keys() {
    zman()
        .args(["validate", "@netz + 10min", "--keys", "alos,tzeis"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("undefined reference @netz"))
        .stderr(predicate::str::contains("alos, tzeis"));
}

#[test]
fn validate_rejects_self_reference() {
    zman()
        .args(["validate", "@alos - 10min", "--key", "alos", "--keys", "alos,tzeis"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot reference itself"));
}

#[test]
fn validate_reads_formula_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("alos.zman");
    std::fs::write(&path, "// dawn\nsolar(100, before_sunrise)\n").unwrap();

    zman()
        .arg("validate")
        .arg("--file")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("between 0 and 90"))
        .stderr(predicate::str::contains("line 2"));
}

#[test]
fn eval_prints_local_time() {
    zman()
        .args(["eval", "sunrise - 72min", "--date", EQUINOX, "--timezone", "+02:00"])
        .assert()
        .success()
        .stdout(predicate::str::is_match(r"^04:[0-9]{2}:[0-9]{2}\n$").unwrap());
}

#[test]
fn eval_reads_context_from_environment() {
    zman()
        .args(["eval", "sunset", "--json"])
        .env("ZMAN_DATE", "2024-06-21")
        .env("ZMAN_TIMEZONE", "+03:00")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"date\": \"2024-06-21\""))
        .stdout(predicate::str::contains("+03:00"));
}

#[test]
fn eval_breakdown_lists_intermediate_times() {
    zman()
        .args(["eval", "midpoint(sunrise, sunset)", "--breakdown", "--date", EQUINOX])
        .assert()
        .success()
        .stdout(predicate::str::contains("sunrise"))
        .stdout(predicate::str::contains("sunset"))
        .stdout(predicate::str::contains("midpoint(sunrise, sunset)"));
}

#[test]
fn eval_rejects_invalid_formula_before_running() {
    zman()
        .args(["eval", "solar(100, before_sunrise)", "--date", EQUINOX])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Semantic error"))
        .stderr(predicate::str::contains("between 0 and 90"));
}

#[test]
fn eval_reports_runtime_failure() {
    zman()
        .args(["eval", "sunrise + 1min / 0", "--date", EQUINOX])
        .assert()
        .failure()
        .stderr(predicate::str::contains("division by zero"));
}

#[test]
fn eval_resolves_references_from_formula_set() {
    let dir = tempfile::tempdir().unwrap();
    let set = write_set(&dir, r#"{"alos": "sunrise - 72min"}"#);

    zman()
        .args(["eval", "@alos + 72min", "--json", "--date", EQUINOX])
        .arg("--formulas")
        .arg(&set)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"result\""));
}

#[test]
fn batch_evaluates_in_dependency_order_and_prints_in_file_order() {
    let dir = tempfile::tempdir().unwrap();
    let set = write_set(
        &dir,
        r#"{
            "tzeis": "@shkia + 18min",
            "alos": "solar(16.1, before_sunrise)",
            "shkia": "sunset"
        }"#,
    );

    zman()
        .arg("batch")
        .arg(&set)
        .args(["--date", EQUINOX])
        .assert()
        .success()
        .stdout(predicate::str::is_match(r"(?s)^tzeis .*\nalos .*\nshkia ").unwrap());
}

#[test]
fn batch_reports_every_invalid_formula() {
    let dir = tempfile::tempdir().unwrap();
    let set = write_set(
        &dir,
        r#"{"a": "solar(100, before_sunrise)", "b": "@missing + 1min"}"#,
    );

    zman()
        .arg("batch")
        .arg(&set)
        .assert()
        .failure()
        .stderr(predicate::str::contains("between 0 and 90"))
        .stderr(predicate::str::contains("undefined reference @missing"));
}

#[test]
fn order_prints_dependencies_first() {
    let dir = tempfile::tempdir().unwrap();
    let set = write_set(&dir, r#"{"tzeis": "@shkia + 18min", "shkia": "sunset"}"#);

    zman()
        .arg("order")
        .arg(&set)
        .assert()
        .success()
        .stdout("shkia\ntzeis\n");
}

#[test]
fn order_reports_cycles() {
    let dir = tempfile::tempdir().unwrap();
    let set = write_set(&dir, r#"{"a": "@b + 1min", "b": "@a - 1min"}"#);

    zman()
        .arg("order")
        .arg(&set)
        .assert()
        .failure()
        .stderr(predicate::str::contains("circular dependency"));
}

#[test]
fn missing_file_is_reported() {
    zman()
        .args(["batch", "does-not-exist.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("File not found"));
}

#[test]
fn bad_timezone_is_rejected_by_argument_parsing() {
    zman()
        .args(["eval", "sunrise", "--timezone", "Jerusalem"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid UTC offset"));
}

#[test]
fn repl_defines_and_references_formulas() {
    assert_cmd::Command::from_std(zman())
        .args(["repl", "--date", EQUINOX])
        .write_stdin(":let alos = sunrise - 72min\n@alos + 72min\n:keys\n:quit\n")
        .assert()
        .success()
        .stdout(predicate::str::is_match(r"alos\S* = \S*04:[0-9]{2}").unwrap())
        .stdout(predicate::str::contains("05:"))
        .stdout(predicate::str::contains("Goodbye."));
}

#[test]
fn repl_reports_errors_and_keeps_going() {
    assert_cmd::Command::from_std(zman())
        .args(["repl", "--date", EQUINOX])
        .write_stdin("solar(100, before_sunrise)\n:set date 2024-06-21\nsunrise\n")
        .assert()
        .success()
        .stderr(predicate::str::contains("between 0 and 90"))
        .stdout(predicate::str::contains("2024-06-21"));
}
