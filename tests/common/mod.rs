#![allow(dead_code)]

use assert_cmd::cargo_bin;
use std::io::Write;
use std::path::Path;
use std::process::Command;
use tempfile::NamedTempFile;

pub const SEED: &str = "tests/fixtures/seed.json";
pub const TODAY: &str = "2024-03-04";
pub const HEADER: &str = "type, gateway, txn_id, project, reward, investor, status, amount, currency";

/// An events file with the header followed by `rows`.
pub fn events_file(rows: &[&str]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "{HEADER}").unwrap();
    for row in rows {
        writeln!(file, "{row}").unwrap();
    }
    file
}

/// The CLI seeded from the shared fixture and pinned to `TODAY`.
pub fn crowdfunding(events: &Path) -> Command {
    let mut cmd = Command::new(cargo_bin!("crowdfunding"));
    cmd.arg(events)
        .arg("--seed")
        .arg(SEED)
        .arg("--today")
        .arg(TODAY);
    cmd
}
