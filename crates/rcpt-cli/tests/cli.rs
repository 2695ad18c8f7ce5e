use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const RECEIPT: &str = "\
CORNER STORE
Date: 05/03/2024
MILK 2 1.50 3.00
BREAD 1 2.25 2.25
TOTAL: $5.25
Paid by cash
";

/// `rcpt` with the user config directory pointed into `home`.
fn rcpt(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("rcpt").unwrap();
    cmd.env("XDG_CONFIG_HOME", home.path()).env("HOME", home.path());
    cmd
}

#[test]
fn help_lists_subcommands() {
    let home = TempDir::new().unwrap();
    rcpt(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("scan"))
        .stdout(predicate::str::contains("batch"))
        .stdout(predicate::str::contains("extract"));
}

#[test]
fn extract_from_file_prints_json() {
    let home = TempDir::new().unwrap();
    let input = home.path().join("receipt.txt");
    fs::write(&input, RECEIPT).unwrap();

    rcpt(&home)
        .arg("extract")
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"total\": 5.25"))
        .stdout(predicate::str::contains("\"paymentMethod\": \"cash\""))
        .stdout(predicate::str::contains("\"date\": \"2024-03-05\""));
}

#[test]
fn extract_from_stdin_as_csv() {
    let home = TempDir::new().unwrap();
    rcpt(&home)
        .args(["extract", "-", "--format", "csv"])
        .write_stdin(RECEIPT)
        .assert()
        .success()
        .stdout(predicate::str::starts_with("merchant,date,total"))
        .stdout(predicate::str::contains("2024-03-05,5.25"));
}

#[test]
fn extract_writes_output_file() {
    let home = TempDir::new().unwrap();
    let out = home.path().join("receipt.txt.out");

    rcpt(&home)
        .args(["extract", "-", "--format", "text", "-o"])
        .arg(&out)
        .write_stdin(RECEIPT)
        .assert()
        .success();

    let text = fs::read_to_string(&out).unwrap();
    assert!(text.contains("Total:    5.25"));
    assert!(text.contains("Paid by cash"));
}

#[test]
fn scan_missing_file_fails() {
    let home = TempDir::new().unwrap();
    rcpt(&home)
        .args(["scan", "does-not-exist.png"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Input file not found"));
}

#[test]
fn scan_garbage_is_unreadable() {
    let home = TempDir::new().unwrap();
    let input = home.path().join("broken.png");
    fs::write(&input, b"not really a png").unwrap();

    rcpt(&home)
        .arg("scan")
        .arg(&input)
        .assert()
        .failure()
        .stderr(predicate::str::contains("unreadable image"));
}

#[test]
fn batch_without_matches_fails() {
    let home = TempDir::new().unwrap();
    let pattern = home.path().join("*.png");

    rcpt(&home)
        .arg("batch")
        .arg(pattern.to_string_lossy().as_ref())
        .assert()
        .failure()
        .stderr(predicate::str::contains("No matching images"));
}

#[test]
fn batch_continues_past_unreadable_files() {
    let home = TempDir::new().unwrap();
    let out = home.path().join("out");
    fs::write(home.path().join("a.png"), b"junk").unwrap();
    fs::write(home.path().join("b.jpg"), b"junk").unwrap();

    rcpt(&home)
        .arg("batch")
        .arg(home.path().join("*.*").to_string_lossy().as_ref())
        .arg("-o")
        .arg(&out)
        .args(["--summary", "--items-csv", "--continue-on-error"])
        .assert()
        .success()
        .stdout(predicate::str::contains("2 failed"));

    let summary = fs::read_to_string(out.join("summary.csv")).unwrap();
    assert_eq!(summary.lines().count(), 3);
    assert!(summary.contains("unreadable image"));
    assert_eq!(fs::read_to_string(out.join("items.csv")).unwrap().lines().count(), 1);
}

#[test]
fn config_init_get_set() {
    let home = TempDir::new().unwrap();

    rcpt(&home)
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("not created"));

    rcpt(&home).args(["config", "init"]).assert().success();
    rcpt(&home)
        .args(["config", "init"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));

    rcpt(&home)
        .args(["config", "get", "ocr.language"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"eng\""));

    rcpt(&home)
        .args(["config", "set", "ocr.language", "eng+hin"])
        .assert()
        .success();
    rcpt(&home)
        .args(["config", "get", "ocr.language"])
        .assert()
        .success()
        .stdout(predicate::str::contains("eng+hin"));

    rcpt(&home)
        .args(["config", "set", "ocr.attempt_timeout_secs", "soon"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid value"));
}
