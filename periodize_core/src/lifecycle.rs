//! Scheduled workout lifecycle.
//!
//! ```text
//! scheduled ──start──▶ in_progress
//!     │                    │
//!     ├──complete(id)──────┼──▶ completed   (terminal)
//!     └──skip──────────────┴──▶ skipped     (terminal)
//! ```
//!
//! `status` and `completed_session_id` live in one private state value,
//! so the only way to change either is through `transition`/`apply`.
//! A completed workout always carries its session id and no other state
//! can hold one.

use crate::{Error, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Externally visible status of a scheduled workout
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum WorkoutStatus {
    Scheduled,
    InProgress,
    Completed,
    Skipped,
}

impl WorkoutStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, WorkoutStatus::Completed | WorkoutStatus::Skipped)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            WorkoutStatus::Scheduled => "scheduled",
            WorkoutStatus::InProgress => "in_progress",
            WorkoutStatus::Completed => "completed",
            WorkoutStatus::Skipped => "skipped",
        }
    }
}

impl fmt::Display for WorkoutStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkoutStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "scheduled" => Ok(WorkoutStatus::Scheduled),
            "in_progress" | "in-progress" => Ok(WorkoutStatus::InProgress),
            "completed" => Ok(WorkoutStatus::Completed),
            "skipped" => Ok(WorkoutStatus::Skipped),
            other => Err(Error::Validation(format!("Unknown workout status: {}", other))),
        }
    }
}

/// Internal state; completion carries the session that fulfilled it
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum WorkoutState {
    Scheduled,
    InProgress,
    Completed { session_id: Uuid },
    Skipped,
}

impl WorkoutState {
    fn status(self) -> WorkoutStatus {
        match self {
            WorkoutState::Scheduled => WorkoutStatus::Scheduled,
            WorkoutState::InProgress => WorkoutStatus::InProgress,
            WorkoutState::Completed { .. } => WorkoutStatus::Completed,
            WorkoutState::Skipped => WorkoutStatus::Skipped,
        }
    }
}

/// Something that happened to a scheduled workout
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkoutEvent {
    /// User began logging against this workout
    Start,
    /// User finished; `session_id` is the logged session
    Complete { session_id: Uuid },
    /// Workout will not be done on this date
    Skip,
}

impl WorkoutEvent {
    /// Completion event from a possibly-missing session id
    pub fn complete(session_id: Option<Uuid>) -> Result<Self> {
        match session_id {
            Some(id) if !id.is_nil() => Ok(WorkoutEvent::Complete { session_id: id }),
            _ => Err(Error::MissingSessionId),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            WorkoutEvent::Start => "start",
            WorkoutEvent::Complete { .. } => "complete",
            WorkoutEvent::Skip => "skip",
        }
    }
}

fn next_state(state: WorkoutState, event: WorkoutEvent) -> Result<WorkoutState> {
    use WorkoutState::*;

    match (state, event) {
        (Scheduled, WorkoutEvent::Start) => Ok(InProgress),
        (Scheduled | InProgress, WorkoutEvent::Complete { session_id }) => {
            if session_id.is_nil() {
                Err(Error::MissingSessionId)
            } else {
                Ok(Completed { session_id })
            }
        }
        (Scheduled | InProgress, WorkoutEvent::Skip) => Ok(Skipped),
        (from, event) => Err(Error::InvalidTransition {
            from: from.status(),
            event: event.name(),
        }),
    }
}

/// Audit entry for one applied transition
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TransitionRecord {
    pub workout_id: Uuid,
    pub from: WorkoutStatus,
    pub to: WorkoutStatus,
    #[serde(default)]
    pub session_id: Option<Uuid>,
    pub at: DateTime<Utc>,
}

/// A date-stamped instance of a template
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(try_from = "ScheduledWorkoutRecord", into = "ScheduledWorkoutRecord")]
pub struct ScheduledWorkout {
    pub id: Uuid,
    pub owner: String,
    pub template_id: Uuid,
    /// Calendar date in the owner's local calendar; no time of day
    pub scheduled_date: NaiveDate,
    pub program_id: Option<Uuid>,
    pub program_week: Option<u32>,
    pub program_day: Option<u8>,
    state: WorkoutState,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
}

impl ScheduledWorkout {
    /// A standalone workout scheduled directly by the user
    pub fn new(owner: impl Into<String>, template_id: Uuid, scheduled_date: NaiveDate) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner: owner.into(),
            template_id,
            scheduled_date,
            program_id: None,
            program_week: None,
            program_day: None,
            state: WorkoutState::Scheduled,
            notes: None,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    /// Record which program cell this workout was materialized from
    pub fn with_program(mut self, program_id: Uuid, week: u32, day: u8) -> Self {
        self.program_id = Some(program_id);
        self.program_week = Some(week);
        self.program_day = Some(day);
        self
    }

    pub fn status(&self) -> WorkoutStatus {
        self.state.status()
    }

    pub fn completed_session_id(&self) -> Option<Uuid> {
        match self.state {
            WorkoutState::Completed { session_id } => Some(session_id),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status().is_terminal()
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    /// Replace the free-text notes; blank text clears them
    ///
    /// Notes are not part of the lifecycle and may change in any status.
    pub fn set_notes(&mut self, notes: Option<String>) {
        self.notes = notes
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());
        self.updated_at = Some(Utc::now());
    }

    /// Apply an event in place
    ///
    /// On error the workout is unchanged.
    pub fn apply(&mut self, event: WorkoutEvent) -> Result<TransitionRecord> {
        let from = self.status();
        let next = next_state(self.state, event)?;
        let now = Utc::now();

        self.state = next;
        self.updated_at = Some(now);

        tracing::info!(
            "Scheduled workout {}: {} -> {} ({})",
            self.id,
            from,
            next.status(),
            event.name()
        );

        Ok(TransitionRecord {
            workout_id: self.id,
            from,
            to: next.status(),
            session_id: self.completed_session_id(),
            at: now,
        })
    }

    /// Compare-and-set: apply only if the status is still `expected`
    ///
    /// Guards against two writers that both read the same status and
    /// race to move the workout.
    pub fn apply_if(
        &mut self,
        expected: WorkoutStatus,
        event: WorkoutEvent,
    ) -> Result<TransitionRecord> {
        let actual = self.status();
        if actual != expected {
            return Err(Error::StaleState { expected, actual });
        }
        self.apply(event)
    }
}

/// Pure transition: the workout after `event`, leaving the input intact
pub fn transition(workout: &ScheduledWorkout, event: WorkoutEvent) -> Result<ScheduledWorkout> {
    let mut next = workout.clone();
    next.apply(event)?;
    Ok(next)
}

/// Serialized shape: flat `status` plus nullable `completed_session_id`
#[derive(Clone, Debug, Serialize, Deserialize)]
struct ScheduledWorkoutRecord {
    id: Uuid,
    owner: String,
    template_id: Uuid,
    scheduled_date: NaiveDate,
    #[serde(default)]
    program_id: Option<Uuid>,
    #[serde(default)]
    program_week: Option<u32>,
    #[serde(default)]
    program_day: Option<u8>,
    status: WorkoutStatus,
    #[serde(default)]
    completed_session_id: Option<Uuid>,
    #[serde(default)]
    notes: Option<String>,
    created_at: DateTime<Utc>,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
}

impl TryFrom<ScheduledWorkoutRecord> for ScheduledWorkout {
    type Error = Error;

    fn try_from(record: ScheduledWorkoutRecord) -> Result<Self> {
        let state = match (record.status, record.completed_session_id) {
            (WorkoutStatus::Completed, Some(session_id)) if !session_id.is_nil() => {
                WorkoutState::Completed { session_id }
            }
            (WorkoutStatus::Completed, _) => {
                return Err(Error::Validation(format!(
                    "scheduled workout {} is completed without a session id",
                    record.id
                )))
            }
            (status, Some(_)) => {
                return Err(Error::Validation(format!(
                    "scheduled workout {} is {} but carries a session id",
                    record.id, status
                )))
            }
            (WorkoutStatus::Scheduled, None) => WorkoutState::Scheduled,
            (WorkoutStatus::InProgress, None) => WorkoutState::InProgress,
            (WorkoutStatus::Skipped, None) => WorkoutState::Skipped,
        };

        Ok(ScheduledWorkout {
            id: record.id,
            owner: record.owner,
            template_id: record.template_id,
            scheduled_date: record.scheduled_date,
            program_id: record.program_id,
            program_week: record.program_week,
            program_day: record.program_day,
            state,
            notes: record.notes,
            created_at: record.created_at,
            updated_at: record.updated_at,
        })
    }
}

impl From<ScheduledWorkout> for ScheduledWorkoutRecord {
    fn from(workout: ScheduledWorkout) -> Self {
        ScheduledWorkoutRecord {
            id: workout.id,
            owner: workout.owner.clone(),
            template_id: workout.template_id,
            scheduled_date: workout.scheduled_date,
            program_id: workout.program_id,
            program_week: workout.program_week,
            program_day: workout.program_day,
            status: workout.status(),
            completed_session_id: workout.completed_session_id(),
            notes: workout.notes.clone(),
            created_at: workout.created_at,
            updated_at: workout.updated_at,
        }
    }
}
