mod common;

use assert_cmd::prelude::*;
use common::{crowdfunding, events_file};
use predicates::prelude::*;

#[test]
fn test_malformed_csv_handling() {
    let events = events_file(&[
        // Valid pledge
        "notify, manual, R1, 1, , 5, completed, 1.0",
        // Invalid type
        "refund, manual, R2, 1, , 5, completed, 1.0, USD",
        // Amount is not a number
        "notify, manual, R3, 1, , 5, completed, lots, USD",
        // Project id is not a number
        "notify, manual, R4, abc, , 5, completed, 1.0, USD",
        // Valid pledge again
        "notify, manual, R5, 1, , 5, completed, 2.0, USD",
    ]);

    crowdfunding(events.path())
        .assert()
        .success()
        .stderr(predicate::str::contains("Error reading event"))
        .stdout(predicate::str::contains("1,200,3,2,2,7,active"));
}

#[test]
fn test_status_change_for_unknown_transaction() {
    let events = events_file(&[
        "status, manual, NOPE, , , , completed, ,",
        "notify, manual, R6, 1, , 5, pending, 40, USD",
        "status, manual, R6, , , , completed, ,",
    ]);

    crowdfunding(events.path())
        .assert()
        .success()
        .stderr(predicate::str::contains("Error changing status of NOPE"))
        .stdout(predicate::str::contains("1,200,40,20,1,7,active"));
}

#[test]
fn test_non_positive_amount_is_rejected() {
    let events = events_file(&[
        "notify, manual, R7, 1, , 5, completed, 0, USD",
        "notify, manual, R8, 1, , 5, completed, -5, USD",
    ]);

    crowdfunding(events.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("1,200,0,0,0,7,active"));
}
