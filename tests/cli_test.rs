mod common;

use assert_cmd::prelude::*;
use common::crowdfunding;
use predicates::prelude::*;
use std::path::Path;

#[test]
fn test_cli_end_to_end() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = crowdfunding(Path::new("tests/fixtures/events.csv"));
    cmd.arg("--config").arg("tests/fixtures/params.json");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains(
            "project,goal,funded,percent,funders,days_left,state",
        ))
        // T1 and T2 count, T3 is below the reward amount, T5 has the wrong currency
        .stdout(predicate::str::contains("1,200,80,40,2,7,active"))
        // Flexible campaign past its end date with some funding
        .stdout(predicate::str::contains("2,1000,120,12,1,0,successful"));

    Ok(())
}

#[test]
fn test_cli_requires_seed() {
    let mut cmd = std::process::Command::new(assert_cmd::cargo_bin!("crowdfunding"));
    cmd.arg("tests/fixtures/events.csv");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("--seed"));
}

#[test]
fn test_cli_log_file_receives_activity_log() {
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("crowdfunding-payments.log");

    let mut cmd = crowdfunding(Path::new("tests/fixtures/events.csv"));
    cmd.arg("--log-file").arg(&log_path);
    cmd.assert()
        .success()
        .stderr(predicate::str::contains("lower than the reward amount").not());

    let log = std::fs::read_to_string(&log_path).unwrap();
    assert!(log.contains("Amount 10 is lower than the reward amount 25"));
    assert!(log.contains("Currency EUR does not match the project currency USD"));
}
