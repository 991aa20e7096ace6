#![forbid(unsafe_code)]

//! Core domain model and engine for the Periodize planner.
//!
//! This crate provides:
//! - Domain types (exercises, set prescriptions, weight specs)
//! - Periodization strategies (linear, undulating, block)
//! - Program structure and template assembly
//! - Schedule materialization and the scheduled-workout lifecycle
//! - Persistence (plan store, transition journal, CSV export)

pub mod types;
pub mod error;
pub mod catalog;
pub mod config;
pub mod logging;
pub mod periodization;
pub mod program;
pub mod template;
pub mod schedule;
pub mod lifecycle;
pub mod journal;
pub mod state;
pub mod export;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use catalog::{build_default_catalog, get_default_catalog, ExerciseCatalog};
pub use config::{Config, PeriodizationConfig};
pub use periodization::{generate_prescriptions, ExerciseSlot, LoadBasis, Prescription};
pub use program::Program;
pub use template::{ExerciseSelection, TemplateAssembler, TemplatePosition, WorkoutTemplate};
pub use schedule::{schedule_program, OverlapPolicy, ScheduleQuery};
pub use lifecycle::{transition, ScheduledWorkout, TransitionRecord, WorkoutEvent, WorkoutStatus};
pub use journal::{JsonlJournal, MemoryJournal, TransitionSink};
pub use state::PlanState;
pub use export::export_schedule;
