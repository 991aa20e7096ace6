//! Append-only journal of lifecycle transitions.
//!
//! Every applied transition is appended as one JSON line under an
//! exclusive lock. The journal is an audit trail; the plan store stays
//! the source of truth for current status.

use crate::lifecycle::TransitionRecord;
use crate::Result;
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Destination for transition records
pub trait TransitionSink {
    fn append(&mut self, record: &TransitionRecord) -> Result<()>;
}

/// JSONL journal file with file locking
pub struct JsonlJournal {
    path: PathBuf,
}

impl JsonlJournal {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn ensure_parent_dir(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}

impl TransitionSink for JsonlJournal {
    fn append(&mut self, record: &TransitionRecord) -> Result<()> {
        self.ensure_parent_dir()?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.lock_exclusive()?;

        let mut writer = std::io::BufWriter::new(&file);
        let line = serde_json::to_string(record)?;
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()?;

        file.unlock()?;

        tracing::debug!(
            "Journaled {} -> {} for workout {}",
            record.from,
            record.to,
            record.workout_id
        );
        Ok(())
    }
}

/// In-memory sink, mostly for tests and dry runs
#[derive(Debug, Default)]
pub struct MemoryJournal {
    records: Vec<TransitionRecord>,
}

impl MemoryJournal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[TransitionRecord] {
        &self.records
    }
}

impl TransitionSink for MemoryJournal {
    fn append(&mut self, record: &TransitionRecord) -> Result<()> {
        self.records.push(record.clone());
        Ok(())
    }
}

/// Read every record from a journal file
///
/// Unparseable lines are skipped with a warning.
pub fn read_journal(path: &Path) -> Result<Vec<TransitionRecord>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let file = File::open(path)?;
    file.lock_shared()?;

    let reader = BufReader::new(&file);
    let mut records = Vec::new();

    for (line_num, line_result) in reader.lines().enumerate() {
        let line = line_result?;
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<TransitionRecord>(&line) {
            Ok(record) => records.push(record),
            Err(e) => {
                tracing::warn!("Skipping journal line {}: {}", line_num + 1, e);
            }
        }
    }

    file.unlock()?;
    tracing::debug!("Read {} transitions from {:?}", records.len(), path);
    Ok(records)
}

/// Journal entries for one workout, oldest first
pub fn history_for(path: &Path, workout_id: Uuid) -> Result<Vec<TransitionRecord>> {
    let mut records: Vec<TransitionRecord> = read_journal(path)?
        .into_iter()
        .filter(|r| r.workout_id == workout_id)
        .collect();
    records.sort_by_key(|r| r.at);
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::{ScheduledWorkout, WorkoutEvent, WorkoutStatus};
    use chrono::NaiveDate;

    fn workout() -> ScheduledWorkout {
        ScheduledWorkout::new(
            "athlete",
            Uuid::new_v4(),
            NaiveDate::from_ymd_opt(2025, 3, 3).unwrap(),
        )
    }

    #[test]
    fn test_append_and_read() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("transitions.jsonl");
        let mut journal = JsonlJournal::new(&path);

        let mut w = workout();
        journal.append(&w.apply(WorkoutEvent::Start).unwrap()).unwrap();
        let session = Uuid::new_v4();
        journal
            .append(&w.apply(WorkoutEvent::Complete { session_id: session }).unwrap())
            .unwrap();

        let records = read_journal(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].to, WorkoutStatus::InProgress);
        assert_eq!(records[1].to, WorkoutStatus::Completed);
        assert_eq!(records[1].session_id, Some(session));
    }

    #[test]
    fn test_missing_journal_is_empty() {
        let temp_dir = tempfile::tempdir().unwrap();
        let records = read_journal(&temp_dir.path().join("none.jsonl")).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_bad_lines_are_skipped() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("transitions.jsonl");
        let mut journal = JsonlJournal::new(&path);
        let mut w = workout();
        journal.append(&w.apply(WorkoutEvent::Skip).unwrap()).unwrap();

        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(file, "{{ not json").unwrap();

        let records = read_journal(&path).unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_history_filters_by_workout() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("transitions.jsonl");
        let mut journal = JsonlJournal::new(&path);

        let mut a = workout();
        let mut b = workout();
        journal.append(&a.apply(WorkoutEvent::Start).unwrap()).unwrap();
        journal.append(&b.apply(WorkoutEvent::Skip).unwrap()).unwrap();
        journal.append(&a.apply(WorkoutEvent::Skip).unwrap()).unwrap();

        let history = history_for(&path, a.id).unwrap();
        assert_eq!(history.len(), 2);
        assert!(history.iter().all(|r| r.workout_id == a.id));
    }

    #[test]
    fn test_memory_journal_collects_records() {
        let mut sink = MemoryJournal::new();
        let mut w = workout();
        sink.append(&w.apply(WorkoutEvent::Start).unwrap()).unwrap();
        sink.append(&w.apply(WorkoutEvent::Skip).unwrap()).unwrap();

        let records = sink.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].to, WorkoutStatus::InProgress);
        assert_eq!(records[1].to, WorkoutStatus::Skipped);
    }
}
