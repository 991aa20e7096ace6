//! Concurrency tests for the periodize binary.
//!
//! These tests verify that multiple processes:
//! - Cannot both complete the same workout
//! - Serialize writes to the plan store without losing updates
//! - Leave the journal as valid JSON lines

use assert_cmd::Command;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

fn cli(data_dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("periodize"));
    cmd.env("XDG_CONFIG_HOME", data_dir.join("config"))
        .arg("--data-dir")
        .arg(data_dir);
    cmd
}

fn setup_test_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

fn scheduled_ids(data_dir: &Path) -> Vec<String> {
    let output = cli(data_dir)
        .args(["list", "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let rows: Vec<serde_json::Value> = serde_json::from_slice(&output).unwrap();
    rows.iter()
        .map(|r| r["id"].as_str().unwrap().to_string())
        .collect()
}

fn seed_schedule(data_dir: &Path) {
    cli(data_dir)
        .args(["program", "create", "--name", "Race", "--weeks", "2"])
        .args(["--days", "3", "--strategy", "undulating"])
        .assert()
        .success();
    cli(data_dir)
        .args(["program", "generate", "Race", "--exercise", "front_squat"])
        .assert()
        .success();
    cli(data_dir)
        .args(["schedule", "Race", "--start", "2025-06-02"])
        .assert()
        .success();
}

#[test]
fn test_concurrent_complete_only_one_wins() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().to_path_buf();
    seed_schedule(&data_dir);

    let id = scheduled_ids(&data_dir)[0].clone();
    let sessions = [
        "1b4e28ba-2fa1-11d2-883f-0016d3cca427",
        "6fa459ea-ee8a-3ca4-894e-db77e160355e",
    ];

    let handles: Vec<_> = sessions
        .iter()
        .map(|session| {
            let data_dir = data_dir.clone();
            let id = id.clone();
            let session = session.to_string();
            thread::spawn(move || {
                cli(&data_dir)
                    .args(["complete", &id, "--session", &session])
                    .timeout(Duration::from_secs(10))
                    .output()
                    .expect("Failed to run periodize")
                    .status
                    .success()
            })
        })
        .collect();

    let successes = handles
        .into_iter()
        .map(|h| h.join().expect("Thread panicked"))
        .filter(|ok| *ok)
        .count();
    assert_eq!(successes, 1, "exactly one completion must win");

    let output = cli(&data_dir)
        .args(["list", "--json", "--status", "completed"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let completed: Vec<serde_json::Value> = serde_json::from_slice(&output).unwrap();
    assert_eq!(completed.len(), 1);
    let linked = completed[0]["completed_session_id"].as_str().unwrap();
    assert!(sessions.contains(&linked));

    let journal = std::fs::read_to_string(data_dir.join("transitions.jsonl")).unwrap();
    assert_eq!(journal.lines().count(), 1);
}

#[test]
fn test_concurrent_transitions_on_different_workouts() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().to_path_buf();
    seed_schedule(&data_dir);

    let ids = scheduled_ids(&data_dir);
    assert_eq!(ids.len(), 6);

    let handles: Vec<_> = ids
        .iter()
        .enumerate()
        .map(|(i, id)| {
            let data_dir: PathBuf = data_dir.clone();
            let id = id.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(i as u64 * 5));
                cli(&data_dir)
                    .args(["skip", &id])
                    .timeout(Duration::from_secs(10))
                    .assert()
                    .success();
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    // No update may be lost: every workout ends up skipped.
    let output = cli(&data_dir)
        .args(["list", "--json", "--status", "skipped"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let skipped: Vec<serde_json::Value> = serde_json::from_slice(&output).unwrap();
    assert_eq!(skipped.len(), 6);

    let journal = std::fs::read_to_string(data_dir.join("transitions.jsonl")).unwrap();
    let mut valid = 0;
    for line in journal.lines().filter(|l| !l.is_empty()) {
        let parsed: Result<serde_json::Value, _> = serde_json::from_str(line);
        assert!(parsed.is_ok(), "journal contains invalid JSON line: {}", line);
        valid += 1;
    }
    assert_eq!(valid, 6);
}

#[test]
fn test_readers_during_writes() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().to_path_buf();
    seed_schedule(&data_dir);

    let writer_dir = data_dir.clone();
    let writer = thread::spawn(move || {
        for id in scheduled_ids(&writer_dir) {
            cli(&writer_dir).args(["start", &id]).assert().success();
        }
    });

    for _ in 0..5 {
        cli(&data_dir).arg("list").assert().success();
        thread::sleep(Duration::from_millis(5));
    }

    writer.join().expect("Writer thread panicked");

    let output = cli(&data_dir)
        .args(["list", "--json", "--status", "in_progress"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let started: Vec<serde_json::Value> = serde_json::from_slice(&output).unwrap();
    assert_eq!(started.len(), 6);
}
