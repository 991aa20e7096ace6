//! Error types for the periodize_core library.

use crate::lifecycle::WorkoutStatus;
use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for periodize_core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization error
    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Catalog validation error
    #[error("Catalog validation error: {0}")]
    CatalogValidation(String),

    /// Input would violate a structural invariant (ranges, weight spec, ordering)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Lifecycle event not permitted from the current status
    #[error("Invalid transition: cannot {event} a workout that is {from}")]
    InvalidTransition {
        from: WorkoutStatus,
        event: &'static str,
    },

    /// Completion attempted without a logged session to link
    #[error("Completing a scheduled workout requires a completed session id")]
    MissingSessionId,

    /// Compare-and-set failed because another writer moved the workout first
    #[error("Stale state: expected workout to be {expected}, found {actual}")]
    StaleState {
        expected: WorkoutStatus,
        actual: WorkoutStatus,
    },

    /// Program has nothing to materialize
    #[error("Nothing to schedule: {0}")]
    EmptySchedule(String),

    /// New schedule overlaps an existing one and the policy forbids it
    #[error("Schedule conflict: {0}")]
    ScheduleConflict(String),

    /// Referenced entity does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}
