use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::{Command, Stdio};

#[test]
fn cli_shows_help() {
    let mut cmd = Command::cargo_bin("covid-stats").unwrap();
    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("history"))
        .stdout(predicate::str::contains("ratios"));
}

#[test]
fn invalid_region_is_rejected_before_any_request() {
    let mut cmd = Command::cargo_bin("covid-stats").unwrap();
    cmd.args(["history", "--iso", "U S!", "--api-base", "http://127.0.0.1:9"]);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("invalid --iso"));
}

#[test]
fn stored_needs_a_store() {
    let mut cmd = Command::cargo_bin("covid-stats").unwrap();
    cmd.env_remove("COVID_STORE_URL")
        .env_remove("COVID_STORE_FILE")
        .args(["stored", "--iso", "USA"]);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("no store configured"));
}

#[test]
fn stored_reads_a_jsonl_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("h.jsonl");
    std::fs::write(
        &path,
        concat!(
            "{\"iso\":\"USA\",\"date\":\"2020-03-02\",\"confirmed\":30,\"deaths\":2}\n",
            "{\"iso\":\"USA\",\"date\":\"2020-03-01\",\"confirmed\":10,\"deaths\":1}\n",
        ),
    )
    .unwrap();
    let mut cmd = Command::cargo_bin("covid-stats").unwrap();
    cmd.env_remove("COVID_STORE_URL")
        .args(["stored", "--iso", "usa", "--store-file"])
        .arg(&path);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("2020-03-01"))
        .stdout(predicate::str::contains("2 stored day(s)"))
        .stdout(predicate::str::contains("Average"));
}

#[test]
fn unreachable_api_fails_cleanly() {
    let mut cmd = Command::cargo_bin("covid-stats").unwrap();
    cmd.args([
        "countries",
        "--api-base",
        "http://127.0.0.1:9",
        "--timeout-secs",
        "2",
    ]);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("data unavailable"));
}

#[test]
fn watch_with_closed_input_still_shows_the_first_cycle() {
    let mut cmd = Command::cargo_bin("covid-stats").unwrap();
    cmd.env_remove("COVID_STORE_URL")
        .env_remove("COVID_STORE_FILE")
        .stdin(Stdio::null())
        .args([
            "watch",
            "--api-base",
            "http://127.0.0.1:9",
            "--timeout-secs",
            "1",
        ]);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Data unavailable"));
}
