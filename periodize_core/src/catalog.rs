//! Exercise catalog lookup.
//!
//! The exercise catalog is owned by another subsystem; the engine only
//! needs read access by id. A small built-in catalog of barbell and
//! bodyweight lifts covers the CLI, and `config.toml` can add more.

use crate::config::CatalogConfig;
use crate::types::*;
use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Read-only `exercise id -> metadata` lookup
pub trait ExerciseCatalog {
    fn exercise(&self, id: &str) -> Option<&Exercise>;

    fn contains(&self, id: &str) -> bool {
        self.exercise(id).is_some()
    }
}

impl ExerciseCatalog for Catalog {
    fn exercise(&self, id: &str) -> Option<&Exercise> {
        self.exercises.get(id)
    }
}

/// Cached default catalog - built once and reused across all operations
static DEFAULT_CATALOG: Lazy<Catalog> = Lazy::new(build_default_catalog);

/// Get a reference to the cached default catalog
pub fn get_default_catalog() -> &'static Catalog {
    &DEFAULT_CATALOG
}

fn lift(
    id: &str,
    name: &str,
    category: ExerciseCategory,
    equipment: &[&str],
    muscle_groups: &[&str],
) -> Exercise {
    Exercise {
        id: id.into(),
        name: name.into(),
        category,
        equipment: equipment.iter().map(|e| e.to_string()).collect(),
        muscle_groups: muscle_groups.iter().map(|m| m.to_string()).collect(),
        reference_url: None,
    }
}

/// Builds the default catalog of built-in exercises
///
/// Prefer `get_default_catalog()` when no custom exercises are needed.
pub fn build_default_catalog() -> Catalog {
    let exercises = [
        lift(
            "back_squat",
            "Back Squat",
            ExerciseCategory::Compound,
            &["barbell", "rack"],
            &["quadriceps", "glutes"],
        ),
        lift(
            "front_squat",
            "Front Squat",
            ExerciseCategory::Compound,
            &["barbell", "rack"],
            &["quadriceps", "upper_back"],
        ),
        lift(
            "bench_press",
            "Bench Press",
            ExerciseCategory::Compound,
            &["barbell", "bench"],
            &["chest", "triceps"],
        ),
        lift(
            "overhead_press",
            "Overhead Press",
            ExerciseCategory::Compound,
            &["barbell"],
            &["shoulders", "triceps"],
        ),
        lift(
            "deadlift",
            "Deadlift",
            ExerciseCategory::Compound,
            &["barbell"],
            &["hamstrings", "glutes", "lower_back"],
        ),
        lift(
            "romanian_deadlift",
            "Romanian Deadlift",
            ExerciseCategory::Compound,
            &["barbell"],
            &["hamstrings", "glutes"],
        ),
        lift(
            "barbell_row",
            "Barbell Row",
            ExerciseCategory::Compound,
            &["barbell"],
            &["lats", "upper_back"],
        ),
        lift(
            "pullup",
            "Pull-up",
            ExerciseCategory::Bodyweight,
            &["pullup_bar"],
            &["lats", "biceps"],
        ),
        lift(
            "dip",
            "Dip",
            ExerciseCategory::Bodyweight,
            &["dip_bars"],
            &["chest", "triceps"],
        ),
        lift(
            "lunge",
            "Walking Lunge",
            ExerciseCategory::Accessory,
            &["dumbbell"],
            &["quadriceps", "glutes"],
        ),
    ];

    Catalog {
        exercises: exercises
            .into_iter()
            .map(|exercise| (exercise.id.clone(), exercise))
            .collect::<HashMap<_, _>>(),
    }
}

impl Catalog {
    /// Default catalog extended with exercises declared in config
    ///
    /// A custom entry with a built-in id replaces the built-in one.
    pub fn with_custom(custom: &CatalogConfig) -> Catalog {
        let mut catalog = get_default_catalog().clone();
        for entry in &custom.custom {
            if catalog.exercises.contains_key(&entry.id) {
                tracing::warn!("Custom exercise '{}' overrides a built-in", entry.id);
            }
            catalog.exercises.insert(
                entry.id.clone(),
                Exercise {
                    id: entry.id.clone(),
                    name: entry.name.clone(),
                    category: entry.category.clone(),
                    equipment: Vec::new(),
                    muscle_groups: Vec::new(),
                    reference_url: entry.url.clone(),
                },
            );
        }
        catalog
    }

    /// Exercise ids in sorted order
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.exercises.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Validate the catalog, returning one message per problem found
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        for (id, exercise) in &self.exercises {
            if id.is_empty() || exercise.id.is_empty() {
                errors.push("Exercise has empty ID".to_string());
            }
            if id != &exercise.id {
                errors.push(format!(
                    "Exercise key '{}' doesn't match exercise.id '{}'",
                    id, exercise.id
                ));
            }
            if exercise.name.trim().is_empty() {
                errors.push(format!("Exercise '{}' has empty name", id));
            }
        }

        errors
    }
}
