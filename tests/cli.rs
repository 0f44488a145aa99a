use std::fs;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::tempdir;

fn single_day_json() -> &'static str {
    r#"
{
  "version": 1,
  "settings": { "prebell_minutes": 10 },
  "days": {
    "monday": [
      { "name": "Homeroom", "start": "07:45", "end": "08:05" },
      { "name": "Chemistry", "start": "08:10", "end": "09:00" }
    ]
  }
}
"#
}

#[test]
fn diagnostics_uses_builtin_catalog_by_default() {
    let mut cmd = cargo_bin_cmd!("bellschedule");
    cmd.arg("--diagnostics")
        .arg("--simulate-at")
        .arg("2026-10-19T08:30")
        .assert()
        .success()
        .stdout(predicate::str::contains("Clock source: SIMULATED"))
        .stdout(predicate::str::contains(
            "Effective schedule: Monday (8 periods)",
        ))
        .stdout(predicate::str::contains(
            "Current period: Period 1 (0h 20m remaining)",
        ));
}

#[test]
fn diagnostics_honours_initial_override() {
    let mut cmd = cargo_bin_cmd!("bellschedule");
    cmd.arg("--diagnostics")
        .arg("--simulate-at")
        .arg("2026-10-19T08:52")
        .arg("--override")
        .arg("friday")
        .assert()
        .success()
        .stdout(predicate::str::contains("Override: Friday"))
        .stdout(predicate::str::contains(
            "Effective schedule: Friday (5 periods)",
        ))
        .stdout(predicate::str::contains("Next period: Period 2"));
}

#[test]
fn diagnostics_reads_custom_schedule_file() {
    let dir = tempdir().expect("tempdir");
    let schedule = dir.path().join("schedule.json");
    fs::write(&schedule, single_day_json()).expect("write json");

    let mut cmd = cargo_bin_cmd!("bellschedule");
    cmd.arg("--diagnostics")
        .arg("--schedule")
        .arg(&schedule)
        .arg("--simulate-at")
        .arg("2026-10-19T07:30")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Effective schedule: Monday (2 periods)",
        ))
        .stdout(predicate::str::contains(
            "Next event: pre-bell for Homeroom at 2026-10-19 07:35",
        ));
}

#[test]
fn weekend_without_override_has_no_bells() {
    let mut cmd = cargo_bin_cmd!("bellschedule");
    cmd.arg("--diagnostics")
        .arg("--simulate-at")
        .arg("2026-10-24T10:00")
        .assert()
        .success()
        .stdout(predicate::str::contains("Effective schedule: none (0 periods)"))
        .stdout(predicate::str::contains("Next event: none scheduled"));
}

#[test]
fn malformed_json_fails_with_clear_error() {
    let dir = tempdir().expect("tempdir");
    let schedule = dir.path().join("schedule.json");
    fs::write(&schedule, "{ not-valid-json ").expect("write invalid json");

    let mut cmd = cargo_bin_cmd!("bellschedule");
    cmd.arg("--diagnostics")
        .arg("--schedule")
        .arg(schedule)
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid JSON"));
}

#[test]
fn overlapping_periods_are_rejected_at_startup() {
    let dir = tempdir().expect("tempdir");
    let schedule = dir.path().join("schedule.json");
    fs::write(
        &schedule,
        r#"{"version":1,"days":{"tuesday":[
            {"name":"A","start":"09:00","end":"10:00"},
            {"name":"B","start":"09:30","end":"10:30"}]}}"#,
    )
    .expect("write json");

    let mut cmd = cargo_bin_cmd!("bellschedule");
    cmd.arg("--diagnostics")
        .arg("--schedule")
        .arg(schedule)
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid schedule for tuesday"))
        .stderr(predicate::str::contains("before 'A' ends at 10:00"));
}

#[test]
fn unknown_override_day_is_rejected() {
    let mut cmd = cargo_bin_cmd!("bellschedule");
    cmd.arg("--diagnostics")
        .arg("--override")
        .arg("sunday")
        .assert()
        .failure()
        .stderr(predicate::str::contains("sunday"));
}

#[test]
fn malformed_simulated_start_is_rejected() {
    let mut cmd = cargo_bin_cmd!("bellschedule");
    cmd.arg("--diagnostics")
        .arg("--simulate-at")
        .arg("next tuesday")
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid --simulate-at"));
}
