//! Core domain types for the periodization engine.
//!
//! This module defines the leaf types shared by every component:
//! - Exercise definitions and the catalog they live in
//! - Periodization strategy kinds
//! - Weight specifications and per-set prescriptions

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Exercise Types
// ============================================================================

/// Broad classification of an exercise
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExerciseCategory {
    Compound,
    Accessory,
    Bodyweight,
}

/// An exercise definition (e.g., "Back Squat")
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Exercise {
    pub id: String,
    pub name: String,
    pub category: ExerciseCategory,
    pub equipment: Vec<String>,
    pub muscle_groups: Vec<String>,
    pub reference_url: Option<String>,
}

/// The set of exercises prescriptions may reference
#[derive(Clone, Debug, Default)]
pub struct Catalog {
    pub exercises: HashMap<String, Exercise>,
}

// ============================================================================
// Periodization Strategy
// ============================================================================

/// How volume and intensity change over the life of a program
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PeriodizationStrategy {
    Linear,
    Undulating,
    Block,
}

impl fmt::Display for PeriodizationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Linear => write!(f, "linear"),
            Self::Undulating => write!(f, "undulating"),
            Self::Block => write!(f, "block"),
        }
    }
}

impl FromStr for PeriodizationStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "linear" => Ok(Self::Linear),
            "undulating" | "dup" => Ok(Self::Undulating),
            "block" => Ok(Self::Block),
            other => Err(Error::Validation(format!(
                "Unknown periodization strategy '{}' (expected linear, undulating or block)",
                other
            ))),
        }
    }
}

// ============================================================================
// Prescription Types
// ============================================================================

/// Load for a single set, either absolute or relative to a max
///
/// The two kinds are mutually exclusive by construction.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WeightSpec {
    /// Kilograms on the bar, > 0
    Absolute { value: f64 },
    /// Percentage of one-rep max, in (0, 100]
    Percentage { value: f64 },
}

impl WeightSpec {
    pub fn validate(&self) -> Result<()> {
        match *self {
            WeightSpec::Absolute { value } => {
                if !(value.is_finite() && value > 0.0) {
                    return Err(Error::Validation(format!(
                        "Absolute weight must be > 0 kg, got {}",
                        value
                    )));
                }
            }
            WeightSpec::Percentage { value } => {
                if !(value.is_finite() && value > 0.0 && value <= 100.0) {
                    return Err(Error::Validation(format!(
                        "Percentage of max must be in (0, 100], got {}",
                        value
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn value(&self) -> f64 {
        match *self {
            WeightSpec::Absolute { value } | WeightSpec::Percentage { value } => value,
        }
    }
}

impl fmt::Display for WeightSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WeightSpec::Absolute { value } => write!(f, "{} kg", value),
            WeightSpec::Percentage { value } => write!(f, "{}%", value),
        }
    }
}

/// One planned set: the prescription unit
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
pub struct TemplateSetEntry {
    pub set_number: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<WeightSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reps: Option<u32>,
    /// Reps in reserve (0-5)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rir: Option<u8>,
    /// Rate of perceived exertion (1.0-10.0, one decimal)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rpe: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rest_seconds: Option<u32>,
    /// Cadence such as "3-1-1-0"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tempo: Option<String>,
    #[serde(default)]
    pub is_warmup: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl TemplateSetEntry {
    /// Check the per-set invariants
    ///
    /// RIR and RPE are both advisory; they are range-checked but never
    /// compared against each other.
    pub fn validate(&self) -> Result<()> {
        if self.set_number == 0 {
            return Err(Error::Validation("set_number must be >= 1".into()));
        }
        if let Some(weight) = &self.weight {
            weight.validate()?;
        }
        if self.reps == Some(0) {
            return Err(Error::Validation(format!(
                "Set {}: reps must be > 0",
                self.set_number
            )));
        }
        if let Some(rir) = self.rir {
            if rir > 5 {
                return Err(Error::Validation(format!(
                    "Set {}: RIR must be 0-5, got {}",
                    self.set_number, rir
                )));
            }
        }
        if let Some(rpe) = self.rpe {
            if !(1.0..=10.0).contains(&rpe) {
                return Err(Error::Validation(format!(
                    "Set {}: RPE must be 1.0-10.0, got {}",
                    self.set_number, rpe
                )));
            }
            if ((rpe * 10.0).round() - rpe * 10.0).abs() > 1e-6 {
                return Err(Error::Validation(format!(
                    "Set {}: RPE allows at most one decimal, got {}",
                    self.set_number, rpe
                )));
            }
        }
        if self.rest_seconds == Some(0) {
            return Err(Error::Validation(format!(
                "Set {}: rest_seconds must be > 0",
                self.set_number
            )));
        }
        Ok(())
    }
}

/// Check that set numbers run 1..=k with no gaps or duplicates
pub(crate) fn check_dense_set_numbers(sets: &[TemplateSetEntry]) -> Result<()> {
    for (idx, set) in sets.iter().enumerate() {
        let expected = idx as u32 + 1;
        if set.set_number != expected {
            return Err(Error::Validation(format!(
                "Set numbers must be contiguous from 1: position {} has set_number {}",
                expected, set.set_number
            )));
        }
    }
    Ok(())
}

/// Reassign set numbers 1..=k in list order
pub(crate) fn renumber_sets(sets: &mut [TemplateSetEntry]) {
    for (idx, set) in sets.iter_mut().enumerate() {
        set.set_number = idx as u32 + 1;
    }
}
