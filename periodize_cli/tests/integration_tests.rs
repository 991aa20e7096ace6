//! Integration tests for the periodize binary.
//!
//! These tests drive the CLI end to end:
//! - Prescription output
//! - Program creation, generation and assignment
//! - Scheduling and overlap policies
//! - Lifecycle transitions and the journal
//! - CSV export

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn setup_test_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

/// CLI bound to `data_dir`, with config lookups kept inside it too
fn cli(data_dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("periodize"));
    cmd.env("XDG_CONFIG_HOME", data_dir.join("config"))
        .arg("--data-dir")
        .arg(data_dir);
    cmd
}

fn stdout_of(cmd: &mut Command) -> String {
    let output = cmd.assert().success().get_output().stdout.clone();
    String::from_utf8(output).expect("stdout is not UTF-8")
}

/// Scheduled workouts as JSON, in list order
fn list_json(data_dir: &Path, extra: &[&str]) -> Vec<serde_json::Value> {
    let out = stdout_of(cli(data_dir).arg("list").arg("--json").args(extra));
    serde_json::from_str(&out).expect("list --json is not JSON")
}

/// Create a 4-week, 3-day linear program and generate its templates
fn seed_program(data_dir: &Path) {
    cli(data_dir)
        .args(["program", "create", "--name", "Base", "--weeks", "4"])
        .args(["--days", "3", "--strategy", "linear"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created program 'Base'"));

    cli(data_dir)
        .args(["program", "generate", "Base"])
        .args(["--exercise", "back_squat=140", "--exercise", "bench_press"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Generated 4 templates"));
}

#[test]
fn test_cli_help() {
    let temp_dir = setup_test_dir();
    cli(temp_dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Training program periodization and scheduling",
        ));
}

#[test]
fn test_prescribe_text() {
    let temp_dir = setup_test_dir();
    cli(temp_dir.path())
        .args(["prescribe", "--strategy", "linear", "--weeks", "12"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Back Squat"))
        .stdout(predicate::str::contains("67.5%"));
}

#[test]
fn test_prescribe_json_linear_progression() {
    let temp_dir = setup_test_dir();

    let first: Vec<serde_json::Value> = serde_json::from_str(&stdout_of(
        cli(temp_dir.path()).args(["prescribe", "--strategy", "linear", "--weeks", "12", "--json"]),
    ))
    .unwrap();
    let last: Vec<serde_json::Value> = serde_json::from_str(&stdout_of(
        cli(temp_dir.path())
            .args(["prescribe", "--strategy", "linear", "--weeks", "12"])
            .args(["--week", "12", "--json"]),
    ))
    .unwrap();

    assert_eq!(first.len(), 4);
    assert_eq!(first[0]["reps"], 10);
    assert_eq!(first[0]["weight"]["kind"], "percentage");
    assert_eq!(first[0]["set_number"], 1);
    assert_eq!(first[3]["set_number"], 4);

    assert_eq!(last.len(), 3);
    assert_eq!(last[0]["reps"], 3);
    assert!(
        last[0]["weight"]["value"].as_f64().unwrap() > first[0]["weight"]["value"].as_f64().unwrap()
    );
}

#[test]
fn test_prescribe_training_max_gives_kg() {
    let temp_dir = setup_test_dir();
    cli(temp_dir.path())
        .args(["prescribe", "--strategy", "block", "--weeks", "8"])
        .args(["--exercise", "deadlift", "--training-max", "200"])
        .assert()
        .success()
        .stdout(predicate::str::contains("kg"));
}

#[test]
fn test_prescribe_rejects_bad_input() {
    let temp_dir = setup_test_dir();

    cli(temp_dir.path())
        .args(["prescribe", "--strategy", "zigzag", "--weeks", "4"])
        .assert()
        .failure();

    cli(temp_dir.path())
        .args(["prescribe", "--strategy", "linear", "--weeks", "4", "--week", "5"])
        .assert()
        .failure();

    cli(temp_dir.path())
        .args(["prescribe", "--strategy", "linear", "--weeks", "4"])
        .args(["--exercise", "underwater_basket_weaving"])
        .assert()
        .failure();
}

#[test]
fn test_program_show_and_list() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();
    seed_program(data_dir);

    cli(data_dir)
        .args(["program", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Base"))
        .stdout(predicate::str::contains("linear"));

    cli(data_dir)
        .args(["program", "show", "Base"])
        .assert()
        .success()
        .stdout(predicate::str::contains("W1 D1"))
        .stdout(predicate::str::contains("W4 D3"))
        .stdout(predicate::str::contains("Base W4"));

    cli(data_dir)
        .args(["template", "show", "Base W1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("back_squat"))
        .stdout(predicate::str::contains("bench_press"));

    // a second generation would double-assign every cell
    cli(data_dir)
        .args(["program", "generate", "Base", "--exercise", "deadlift"])
        .assert()
        .failure();
}

#[test]
fn test_full_lifecycle_flow() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();
    seed_program(data_dir);

    cli(data_dir)
        .args(["schedule", "Base", "--start", "2025-01-06"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Scheduled 12 workouts"));

    let rows = list_json(data_dir, &[]);
    assert_eq!(rows.len(), 12);
    assert_eq!(rows[0]["scheduled_date"], "2025-01-06");
    assert_eq!(rows[1]["scheduled_date"], "2025-01-07");
    assert_eq!(rows[3]["scheduled_date"], "2025-01-13");
    assert!(rows.iter().all(|r| r["status"] == "scheduled"));

    let first = rows[0]["id"].as_str().unwrap().to_string();
    let second = rows[1]["id"].as_str().unwrap().to_string();
    let session = "7d444840-9dc0-11d1-b245-5ffdce74fad2";

    cli(data_dir)
        .args(["start", &first[..8]])
        .assert()
        .success()
        .stdout(predicate::str::contains("scheduled -> in_progress"));

    // start twice is not a legal transition
    cli(data_dir).args(["start", &first]).assert().failure();

    cli(data_dir)
        .args(["complete", &first, "--session", session])
        .assert()
        .success()
        .stdout(predicate::str::contains("in_progress -> completed"))
        .stdout(predicate::str::contains(session));

    // terminal: nothing else applies
    cli(data_dir).args(["skip", &first]).assert().failure();
    cli(data_dir)
        .args(["complete", &first, "--session", session])
        .assert()
        .failure();

    cli(data_dir)
        .args(["skip", &second])
        .assert()
        .success()
        .stdout(predicate::str::contains("scheduled -> skipped"));

    let completed = list_json(data_dir, &["--status", "completed"]);
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0]["completed_session_id"], session);

    let skipped = list_json(data_dir, &["--status", "skipped"]);
    assert_eq!(skipped.len(), 1);
    assert!(skipped[0]["completed_session_id"].is_null());

    let journal = fs::read_to_string(data_dir.join("transitions.jsonl")).unwrap();
    assert_eq!(journal.lines().count(), 3);
}

#[test]
fn test_complete_requires_valid_session() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();
    seed_program(data_dir);
    cli(data_dir)
        .args(["schedule", "Base", "--start", "2025-01-06"])
        .assert()
        .success();

    let id = list_json(data_dir, &[])[0]["id"].as_str().unwrap().to_string();

    cli(data_dir).args(["complete", &id]).assert().failure();
    cli(data_dir)
        .args(["complete", &id, "--session", "00000000-0000-0000-0000-000000000000"])
        .assert()
        .failure();

    let rows = list_json(data_dir, &["--status", "scheduled"]);
    assert_eq!(rows.len(), 12);
}

#[test]
fn test_schedule_overlap_policies() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();
    seed_program(data_dir);

    cli(data_dir)
        .args(["schedule", "Base", "--start", "2025-01-06"])
        .assert()
        .success();

    // default policy rejects a second materialization over the same window
    cli(data_dir)
        .args(["schedule", "Base", "--start", "2025-01-06"])
        .assert()
        .failure();
    assert_eq!(list_json(data_dir, &[]).len(), 12);

    let id = list_json(data_dir, &[])[0]["id"].as_str().unwrap().to_string();
    cli(data_dir).args(["skip", &id]).assert().success();

    cli(data_dir)
        .args(["schedule", "Base", "--start", "2025-01-06", "--policy", "replace"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Replaced 11 unstarted workouts"))
        .stdout(predicate::str::contains("Kept 1 overlapping workouts"));
    assert_eq!(list_json(data_dir, &[]).len(), 13);

    cli(data_dir)
        .args(["schedule", "Base", "--start", "2025-01-06", "--policy", "allow"])
        .assert()
        .success();
    assert_eq!(list_json(data_dir, &[]).len(), 25);
}

#[test]
fn test_schedule_empty_program_fails() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();

    cli(data_dir)
        .args(["program", "create", "--name", "Empty", "--weeks", "2"])
        .args(["--days", "2", "--strategy", "block"])
        .assert()
        .success();

    cli(data_dir)
        .args(["schedule", "Empty", "--start", "2025-01-06"])
        .assert()
        .failure();
}

#[test]
fn test_sparse_week_assignment() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();
    seed_program(data_dir);

    cli(data_dir)
        .args(["program", "create", "--name", "Sparse", "--weeks", "4"])
        .args(["--days", "3", "--strategy", "linear"])
        .assert()
        .success();
    for week in ["1", "3"] {
        cli(data_dir)
            .args(["program", "assign", "Sparse", "--week", week, "--template", "Base W1"])
            .assert()
            .success();
    }

    cli(data_dir)
        .args(["schedule", "Sparse", "--start", "2025-01-06"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Scheduled 2 workouts"));

    let rows = list_json(data_dir, &["--program", "Sparse"]);
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["scheduled_date"], "2025-01-06");
    assert_eq!(rows[1]["scheduled_date"], "2025-01-20");
}

#[test]
fn test_week_modifiers_validation() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();
    seed_program(data_dir);

    cli(data_dir)
        .args(["program", "modifiers", "Base", "--week", "4", "--volume", "0.5"])
        .assert()
        .success()
        .stdout(predicate::str::contains("volume x0.5"));

    cli(data_dir)
        .args(["program", "modifiers", "Base", "--week", "4", "--intensity", "3"])
        .assert()
        .failure();

    cli(data_dir)
        .args(["program", "modifiers", "Base", "--week", "9", "--volume", "1.1"])
        .assert()
        .failure();
}

#[test]
fn test_list_date_range() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();
    seed_program(data_dir);
    cli(data_dir)
        .args(["schedule", "Base", "--start", "2025-01-06"])
        .assert()
        .success();

    let week2 = list_json(data_dir, &["--from", "2025-01-13", "--to", "2025-01-19"]);
    assert_eq!(week2.len(), 3);
    assert!(week2.iter().all(|r| r["program_week"] == 2));
}

#[test]
fn test_export_csv() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();
    seed_program(data_dir);
    cli(data_dir)
        .args(["schedule", "Base", "--start", "2025-01-06"])
        .assert()
        .success();

    let out = data_dir.join("export/schedule.csv");
    cli(data_dir)
        .arg("export")
        .arg("--out")
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("Exported 12 workouts"));

    let csv_content = fs::read_to_string(&out).expect("Failed to read CSV");
    assert!(csv_content.starts_with("id,scheduled_date,status"));
    assert_eq!(csv_content.lines().count(), 13);
    assert!(csv_content.contains("Base W1"));
}

#[test]
fn test_corrupted_plan_is_not_reset() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();
    fs::write(data_dir.join("plan.json"), "{ not json").unwrap();

    cli(data_dir).arg("list").assert().failure();
    assert_eq!(
        fs::read_to_string(data_dir.join("plan.json")).unwrap(),
        "{ not json"
    );
}

#[test]
fn test_config_overlap_policy() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();
    let config_dir = data_dir.join("config/periodize");
    fs::create_dir_all(&config_dir).unwrap();
    fs::write(
        config_dir.join("config.toml"),
        "[schedule]\noverlap_policy = \"allow\"\n\n[user]\nowner = \"sam\"\n",
    )
    .unwrap();

    seed_program(data_dir);
    for _ in 0..2 {
        cli(data_dir)
            .args(["schedule", "Base", "--start", "2025-01-06"])
            .assert()
            .success();
    }

    let rows = list_json(data_dir, &[]);
    assert_eq!(rows.len(), 24);
    assert!(rows.iter().all(|r| r["owner"] == "sam"));
}

#[test]
fn test_oversized_program_is_rejected() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();

    cli(data_dir)
        .args(["prescribe", "--strategy", "linear"])
        .args(["--weeks", "2000000000", "--week", "2000000000"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("panicked").not());

    cli(data_dir)
        .args(["program", "create", "--name", "Forever", "--weeks", "2000000000"])
        .args(["--days", "3", "--strategy", "linear"])
        .assert()
        .failure();
    assert!(!data_dir.join("plan.json").exists());
}

#[test]
fn test_config_with_rising_linear_volume_is_rejected() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();
    let config_dir = data_dir.join("config/periodize");
    fs::create_dir_all(&config_dir).unwrap();
    fs::write(
        config_dir.join("config.toml"),
        "[periodization.linear.minimal]\nsets = 10\nreps = 10\nrest_seconds = 240\n",
    )
    .unwrap();

    cli(data_dir)
        .args(["prescribe", "--strategy", "linear", "--weeks", "9", "--week", "9"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("volume"));
}

#[test]
fn test_add_standalone_workout() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();
    seed_program(data_dir);

    cli(data_dir)
        .args(["add", "Base W2", "--date", "2025-03-01", "--notes", "hotel gym"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Scheduled"));

    let rows = list_json(data_dir, &[]);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["scheduled_date"], "2025-03-01");
    assert_eq!(rows[0]["status"], "scheduled");
    assert_eq!(rows[0]["notes"], "hotel gym");
    assert!(rows[0]["program_id"].is_null());

    cli(data_dir)
        .args(["add", "No Such Template", "--date", "2025-03-02"])
        .assert()
        .failure();
    assert_eq!(list_json(data_dir, &[]).len(), 1);

    let id = rows[0]["id"].as_str().unwrap();
    cli(data_dir).args(["start", id]).assert().success();
    assert_eq!(list_json(data_dir, &["--status", "in_progress"]).len(), 1);
}

#[test]
fn test_note_and_remove_workout() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();
    seed_program(data_dir);
    cli(data_dir)
        .args(["schedule", "Base", "--start", "2025-01-06"])
        .assert()
        .success();

    let rows = list_json(data_dir, &[]);
    let id = rows[0]["id"].as_str().unwrap().to_string();

    cli(data_dir)
        .args(["note", &id, "swap bench for dips"])
        .assert()
        .success();
    let rows = list_json(data_dir, &[]);
    assert_eq!(rows[0]["notes"], "swap bench for dips");
    cli(data_dir)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("(swap bench for dips)"));

    cli(data_dir)
        .args(["note", &id])
        .assert()
        .success()
        .stdout(predicate::str::contains("notes cleared"));
    assert!(list_json(data_dir, &[])[0]["notes"].is_null());

    cli(data_dir).args(["skip", &id]).assert().success();
    cli(data_dir).args(["remove", &id]).assert().success();

    let remaining = list_json(data_dir, &[]);
    assert_eq!(remaining.len(), 11);
    assert!(remaining.iter().all(|r| r["id"] != id.as_str()));

    cli(data_dir).args(["remove", &id]).assert().failure();
}

#[test]
fn test_program_activate_and_deactivate() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();
    seed_program(data_dir);

    cli(data_dir)
        .args(["program", "deactivate", "Base"])
        .assert()
        .success()
        .stdout(predicate::str::contains("'Base' is now inactive"));
    cli(data_dir)
        .args(["program", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("(inactive)"));

    // Retired programs can still be scheduled.
    cli(data_dir)
        .args(["schedule", "Base", "--start", "2025-01-06"])
        .assert()
        .success();

    cli(data_dir)
        .args(["program", "activate", "Base"])
        .assert()
        .success();
    cli(data_dir)
        .args(["program", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("(inactive)").not());
}
