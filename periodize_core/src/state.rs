//! Plan store: programs, templates and scheduled workouts on disk.
//!
//! A single JSON file holds the whole plan. Reads take a shared lock,
//! saves go through a temp file that is synced and renamed over the
//! original. `PlanState::update` additionally holds an exclusive lock on
//! a sidecar `.lock` file for the whole load-modify-save, so concurrent
//! writers are serialized and a compare-and-set transition sees the
//! status the previous writer left behind.

use crate::journal::TransitionSink;
use crate::lifecycle::{ScheduledWorkout, TransitionRecord, WorkoutEvent, WorkoutStatus};
use crate::program::Program;
use crate::schedule::{merge_schedule, schedule_program, OverlapPolicy, ScheduleMerge, ScheduleQuery};
use crate::template::WorkoutTemplate;
use crate::{Error, Result};
use chrono::NaiveDate;
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use uuid::Uuid;

/// File name of the plan store inside the data directory
pub const PLAN_FILE: &str = "plan.json";
/// File name of the transition journal inside the data directory
pub const JOURNAL_FILE: &str = "transitions.jsonl";

pub fn plan_path(data_dir: &Path) -> PathBuf {
    data_dir.join(PLAN_FILE)
}

pub fn journal_path(data_dir: &Path) -> PathBuf {
    data_dir.join(JOURNAL_FILE)
}

/// Everything the planner persists
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PlanState {
    #[serde(default)]
    pub programs: Vec<Program>,
    #[serde(default)]
    pub templates: Vec<WorkoutTemplate>,
    #[serde(default)]
    pub scheduled: Vec<ScheduledWorkout>,
}

impl PlanState {
    /// Load the plan with shared locking
    ///
    /// A missing file is an empty plan. A file that fails to parse or
    /// violates an invariant is an error; the store is never silently
    /// reset.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::info!("No plan file at {:?}, starting empty", path);
            return Ok(Self::default());
        }

        let file = File::open(path)?;
        file.lock_shared()?;

        let mut contents = String::new();
        let read = std::io::BufReader::new(&file).read_to_string(&mut contents);
        file.unlock()?;
        read?;

        let state: PlanState = serde_json::from_str(&contents)?;
        state.validate()?;

        tracing::debug!(
            "Loaded plan from {:?}: {} programs, {} templates, {} scheduled",
            path,
            state.programs.len(),
            state.templates.len(),
            state.scheduled.len()
        );
        Ok(state)
    }

    /// Save atomically: temp file, fsync, rename
    pub fn save(&self, path: &Path) -> Result<()> {
        let parent = path.parent().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::Other, "plan path missing parent")
        })?;
        std::fs::create_dir_all(parent)?;

        let temp = NamedTempFile::new_in(parent)?;
        temp.as_file().lock_exclusive()?;

        {
            let mut writer = std::io::BufWriter::new(temp.as_file());
            let contents = serde_json::to_string_pretty(self)?;
            writer.write_all(contents.as_bytes())?;
            writer.flush()?;
        }

        temp.as_file().sync_all()?;
        temp.as_file().unlock()?;

        temp.persist(path).map_err(|e| Error::Io(e.error))?;

        tracing::debug!("Saved plan to {:?}", path);
        Ok(())
    }

    /// Load, modify and save while holding the store's exclusive lock
    ///
    /// Nothing is written when `f` fails.
    pub fn update<T, F>(path: &Path, f: F) -> Result<T>
    where
        F: FnOnce(&mut PlanState) -> Result<T>,
    {
        let lock = acquire_lock(path)?;

        let outcome = (|| -> Result<T> {
            let mut state = Self::load(path)?;
            let value = f(&mut state)?;
            state.save(path)?;
            Ok(value)
        })();

        lock.unlock()?;
        outcome
    }

    /// Structural checks run after every load
    pub fn validate(&self) -> Result<()> {
        for program in &self.programs {
            program.validate()?;
        }
        for template in &self.templates {
            template.validate()?;
        }
        Ok(())
    }

    pub fn program(&self, id: Uuid) -> Option<&Program> {
        self.programs.iter().find(|p| p.id == id)
    }

    pub fn template(&self, id: Uuid) -> Option<&WorkoutTemplate> {
        self.templates.iter().find(|t| t.id == id)
    }

    /// Find a program by exact name or by id prefix
    pub fn resolve_program(&self, key: &str) -> Result<&Program> {
        let idx = resolve_index(&self.programs, key, "program", |p| (p.id, p.name.as_str()))?;
        Ok(&self.programs[idx])
    }

    pub fn resolve_program_mut(&mut self, key: &str) -> Result<&mut Program> {
        let idx = resolve_index(&self.programs, key, "program", |p| (p.id, p.name.as_str()))?;
        Ok(&mut self.programs[idx])
    }

    /// Find a template by exact name or by id prefix
    pub fn resolve_template(&self, key: &str) -> Result<&WorkoutTemplate> {
        let idx = resolve_index(&self.templates, key, "template", |t| (t.id, t.name.as_str()))?;
        Ok(&self.templates[idx])
    }

    /// Find a scheduled workout by id prefix
    pub fn resolve_scheduled(&self, key: &str) -> Result<&ScheduledWorkout> {
        let idx = resolve_index(&self.scheduled, key, "scheduled workout", |w| (w.id, ""))?;
        Ok(&self.scheduled[idx])
    }

    /// Materialize a stored program and merge it into the schedule
    ///
    /// Every template the program references must exist in the store.
    pub fn schedule(
        &mut self,
        program_key: &str,
        start_date: NaiveDate,
        owner: &str,
        policy: OverlapPolicy,
    ) -> Result<ScheduleMerge> {
        let program = self.resolve_program(program_key)?;
        if let Some(missing) = program
            .template_ids()
            .into_iter()
            .find(|id| self.template(*id).is_none())
        {
            return Err(Error::NotFound(format!(
                "template {} referenced by program '{}'",
                missing, program.name
            )));
        }

        let rows = schedule_program(program, start_date, owner)?;
        merge_schedule(&mut self.scheduled, rows, policy)
    }

    /// Schedule one workout directly, outside any program
    pub fn add_workout(
        &mut self,
        template_key: &str,
        date: NaiveDate,
        owner: &str,
        notes: Option<String>,
    ) -> Result<ScheduledWorkout> {
        if owner.trim().is_empty() {
            return Err(Error::Validation("workout owner must not be empty".into()));
        }
        let template_id = self.resolve_template(template_key)?.id;

        let mut workout = ScheduledWorkout::new(owner, template_id, date);
        if notes.is_some() {
            workout.set_notes(notes);
        }
        tracing::info!(
            "Scheduled standalone workout {} on {} (template {})",
            workout.id,
            date,
            template_id
        );

        self.scheduled.push(workout.clone());
        Ok(workout)
    }

    /// Delete a scheduled workout in any status
    ///
    /// The journal keeps its past transitions.
    pub fn remove_workout(&mut self, key: &str) -> Result<ScheduledWorkout> {
        let idx = resolve_index(&self.scheduled, key, "scheduled workout", |w| (w.id, ""))?;
        let removed = self.scheduled.remove(idx);
        tracing::info!(
            "Removed scheduled workout {} ({}, {})",
            removed.id,
            removed.scheduled_date,
            removed.status()
        );
        Ok(removed)
    }

    /// Replace or clear the notes of a scheduled workout
    pub fn set_workout_notes(
        &mut self,
        key: &str,
        notes: Option<String>,
    ) -> Result<&ScheduledWorkout> {
        let idx = resolve_index(&self.scheduled, key, "scheduled workout", |w| (w.id, ""))?;
        self.scheduled[idx].set_notes(notes);
        Ok(&self.scheduled[idx])
    }

    pub fn query(&self, query: &ScheduleQuery) -> Vec<&ScheduledWorkout> {
        query.apply(&self.scheduled)
    }
}

/// Apply a lifecycle event to a stored workout and journal it
///
/// With `expected` set, the transition is a compare-and-set against the
/// status currently on disk. The journal is written only after the plan
/// has been saved. Once the save succeeds the transition is committed: a
/// journal write failure is logged and the committed result is still
/// returned.
pub fn transition_workout<S: TransitionSink + ?Sized>(
    path: &Path,
    journal: &mut S,
    key: &str,
    expected: Option<WorkoutStatus>,
    event: WorkoutEvent,
) -> Result<(ScheduledWorkout, TransitionRecord)> {
    let (workout, record) = PlanState::update(path, |state| {
        let idx = resolve_index(&state.scheduled, key, "scheduled workout", |w| (w.id, ""))?;
        let workout = &mut state.scheduled[idx];
        let record = match expected {
            Some(expected) => workout.apply_if(expected, event)?,
            None => workout.apply(event)?,
        };
        Ok((workout.clone(), record))
    })?;

    if let Err(e) = journal.append(&record) {
        tracing::warn!(
            "Workout {} moved {} -> {} but the journal write failed: {}",
            record.workout_id,
            record.from,
            record.to,
            e
        );
    }
    Ok((workout, record))
}

fn acquire_lock(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let lock_path = path.with_extension("lock");
    let file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(&lock_path)?;
    file.lock_exclusive()?;
    tracing::debug!("Acquired store lock {:?}", lock_path);
    Ok(file)
}

/// Index of the single item whose name equals `key` or, failing that,
/// whose id starts with it
fn resolve_index<T, F>(items: &[T], key: &str, kind: &str, ident: F) -> Result<usize>
where
    F: Fn(&T) -> (Uuid, &str),
{
    let key = key.trim();
    if key.is_empty() {
        return Err(Error::Validation(format!("empty {} reference", kind)));
    }

    let named: Vec<usize> = items
        .iter()
        .enumerate()
        .filter(|(_, item)| ident(item).1 == key)
        .map(|(idx, _)| idx)
        .collect();
    match named.as_slice() {
        [idx] => return Ok(*idx),
        [] => {}
        many => {
            return Err(Error::Validation(format!(
                "{} name '{}' is ambiguous ({} matches); use an id prefix",
                kind,
                key,
                many.len()
            )))
        }
    }

    let needle = key.to_lowercase();
    let matches: Vec<usize> = items
        .iter()
        .enumerate()
        .filter(|(_, item)| ident(item).0.to_string().starts_with(&needle))
        .map(|(idx, _)| idx)
        .collect();

    match matches.as_slice() {
        [idx] => Ok(*idx),
        [] => Err(Error::NotFound(format!("{} '{}'", kind, key))),
        many => Err(Error::Validation(format!(
            "{} reference '{}' is ambiguous ({} matches)",
            kind,
            key,
            many.len()
        ))),
    }
}
