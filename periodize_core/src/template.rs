//! Workout templates and the assembler that seeds them.
//!
//! A template is prescription data only. Its exercise `order` values stay
//! a dense 0-based sequence and each exercise's `set_number` values stay
//! dense from 1; every mutation below renumbers before returning, so a
//! caller never observes a gap or duplicate.

use crate::catalog::ExerciseCatalog;
use crate::config::PeriodizationConfig;
use crate::periodization::{apply_week_modifiers, generate_prescriptions, ExerciseSlot, LoadBasis};
use crate::program::Program;
use crate::types::{check_dense_set_numbers, renumber_sets, PeriodizationStrategy, TemplateSetEntry};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One exercise of a template with its planned sets
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TemplateExerciseEntry {
    pub exercise_id: String,
    order: u32,
    #[serde(default)]
    pub notes: Option<String>,
    sets: Vec<TemplateSetEntry>,
}

impl TemplateExerciseEntry {
    pub fn order(&self) -> u32 {
        self.order
    }

    pub fn sets(&self) -> &[TemplateSetEntry] {
        &self.sets
    }

    pub fn set(&self, set_number: u32) -> Option<&TemplateSetEntry> {
        self.sets.iter().find(|s| s.set_number == set_number)
    }
}

/// Reusable, not-yet-executed workout
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorkoutTemplate {
    pub id: Uuid,
    /// None = shared/public template
    #[serde(default)]
    pub owner: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub estimated_duration_minutes: Option<u32>,
    #[serde(default)]
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    exercises: Vec<TemplateExerciseEntry>,
}

impl WorkoutTemplate {
    pub fn new(name: impl Into<String>, owner: Option<String>) -> Result<Self> {
        let name = name.into();
        check_name(&name)?;
        Ok(Self {
            id: Uuid::new_v4(),
            owner,
            name,
            description: None,
            estimated_duration_minutes: None,
            is_public: false,
            created_at: Utc::now(),
            updated_at: None,
            exercises: Vec::new(),
        })
    }

    pub fn exercises(&self) -> &[TemplateExerciseEntry] {
        &self.exercises
    }

    pub fn exercise(&self, order: u32) -> Option<&TemplateExerciseEntry> {
        self.exercises.get(order as usize)
    }

    fn exercise_mut(&mut self, order: u32) -> Result<&mut TemplateExerciseEntry> {
        let template_id = self.id;
        self.exercises.get_mut(order as usize).ok_or_else(|| {
            Error::NotFound(format!("exercise #{} in template {}", order, template_id))
        })
    }

    fn touch(&mut self) {
        self.updated_at = Some(Utc::now());
    }

    fn renumber_exercises(&mut self) {
        for (idx, entry) in self.exercises.iter_mut().enumerate() {
            entry.order = idx as u32;
        }
    }

    /// Append an exercise with its sets, returning its order
    ///
    /// The sets are renumbered 1..=k in the given order and validated
    /// before the template changes.
    pub fn add_exercise(
        &mut self,
        exercise_id: impl Into<String>,
        mut sets: Vec<TemplateSetEntry>,
        notes: Option<String>,
    ) -> Result<u32> {
        let exercise_id = exercise_id.into();
        if exercise_id.trim().is_empty() {
            return Err(Error::Validation("exercise id must not be empty".into()));
        }
        renumber_sets(&mut sets);
        for set in &sets {
            set.validate()?;
        }

        let order = self.exercises.len() as u32;
        self.exercises.push(TemplateExerciseEntry {
            exercise_id,
            order,
            notes,
            sets,
        });
        self.touch();
        Ok(order)
    }

    /// Remove the exercise at `order`; later exercises shift down by one
    pub fn remove_exercise(&mut self, order: u32) -> Result<TemplateExerciseEntry> {
        self.exercise_mut(order)?;
        let removed = self.exercises.remove(order as usize);
        self.renumber_exercises();
        self.touch();
        Ok(removed)
    }

    /// Move the exercise at `from` to position `to`
    pub fn move_exercise(&mut self, from: u32, to: u32) -> Result<()> {
        self.exercise_mut(from)?;
        if to as usize >= self.exercises.len() {
            return Err(Error::Validation(format!(
                "cannot move exercise to position {} of {}",
                to,
                self.exercises.len()
            )));
        }
        let entry = self.exercises.remove(from as usize);
        self.exercises.insert(to as usize, entry);
        self.renumber_exercises();
        self.touch();
        Ok(())
    }

    /// Append a set to an exercise, returning its assigned set number
    pub fn add_set(&mut self, order: u32, mut set: TemplateSetEntry) -> Result<u32> {
        let entry = self.exercise_mut(order)?;
        set.set_number = entry.sets.len() as u32 + 1;
        set.validate()?;
        let set_number = set.set_number;
        entry.sets.push(set);
        self.touch();
        Ok(set_number)
    }

    /// Remove a set; later sets of the exercise shift down by one
    pub fn remove_set(&mut self, order: u32, set_number: u32) -> Result<TemplateSetEntry> {
        let entry = self.exercise_mut(order)?;
        let idx = entry
            .sets
            .iter()
            .position(|s| s.set_number == set_number)
            .ok_or_else(|| Error::NotFound(format!("set {} of exercise #{}", set_number, order)))?;
        let removed = entry.sets.remove(idx);
        renumber_sets(&mut entry.sets);
        self.touch();
        Ok(removed)
    }

    /// Edit a set in place
    ///
    /// The edit is validated on a copy; on failure the template is left
    /// untouched. The set number cannot be changed this way.
    pub fn edit_set<F>(&mut self, order: u32, set_number: u32, f: F) -> Result<()>
    where
        F: FnOnce(&mut TemplateSetEntry),
    {
        let entry = self.exercise_mut(order)?;
        let slot = entry
            .sets
            .iter_mut()
            .find(|s| s.set_number == set_number)
            .ok_or_else(|| Error::NotFound(format!("set {} of exercise #{}", set_number, order)))?;

        let mut edited = slot.clone();
        f(&mut edited);
        edited.set_number = set_number;
        edited.validate()?;
        *slot = edited;
        self.touch();
        Ok(())
    }

    /// Check ordering density and every set (used after deserializing)
    pub fn validate(&self) -> Result<()> {
        check_name(&self.name)?;
        if self.estimated_duration_minutes == Some(0) {
            return Err(Error::Validation(
                "estimated_duration_minutes must be > 0".into(),
            ));
        }
        for (idx, entry) in self.exercises.iter().enumerate() {
            if entry.order != idx as u32 {
                return Err(Error::Validation(format!(
                    "template '{}': exercise order must be dense from 0 (position {} has order {})",
                    self.name, idx, entry.order
                )));
            }
            if entry.exercise_id.trim().is_empty() {
                return Err(Error::Validation("exercise id must not be empty".into()));
            }
            check_dense_set_numbers(&entry.sets)?;
            for set in &entry.sets {
                set.validate()?;
            }
        }
        Ok(())
    }
}

fn check_name(name: &str) -> Result<()> {
    let trimmed = name.trim();
    if trimmed.is_empty() || trimmed.chars().count() > 100 {
        return Err(Error::Validation(
            "template name must be 1-100 characters".into(),
        ));
    }
    Ok(())
}

/// An exercise to seed into a template
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ExerciseSelection {
    pub exercise_id: String,
    #[serde(default)]
    pub load: LoadBasis,
    #[serde(default)]
    pub notes: Option<String>,
}

impl ExerciseSelection {
    pub fn new(exercise_id: impl Into<String>) -> Self {
        Self {
            exercise_id: exercise_id.into(),
            load: LoadBasis::Relative,
            notes: None,
        }
    }

    pub fn with_training_max(mut self, kg: f64) -> Self {
        self.load = LoadBasis::TrainingMax { kg };
        self
    }
}

/// Where in a program the template being built sits
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TemplatePosition {
    pub week: u32,
    pub total_weeks: u32,
    pub session: u32,
    pub sessions_per_week: u32,
    pub volume_modifier: Option<f64>,
    pub intensity_modifier: Option<f64>,
}

impl TemplatePosition {
    pub fn new(week: u32, total_weeks: u32) -> Self {
        Self {
            week,
            total_weeks,
            session: 1,
            sessions_per_week: 1,
            volume_modifier: None,
            intensity_modifier: None,
        }
    }

    pub fn session(mut self, session: u32, sessions_per_week: u32) -> Self {
        self.session = session;
        self.sessions_per_week = sessions_per_week;
        self
    }
}

/// Builds templates from periodization output
pub struct TemplateAssembler<'a, C: ExerciseCatalog + ?Sized> {
    catalog: &'a C,
    config: &'a PeriodizationConfig,
}

impl<'a, C: ExerciseCatalog + ?Sized> TemplateAssembler<'a, C> {
    pub fn new(catalog: &'a C, config: &'a PeriodizationConfig) -> Self {
        Self { catalog, config }
    }

    /// Create a template whose sets are seeded by one generator call per
    /// selection
    ///
    /// The seeded sets are defaults only; callers edit them freely after.
    pub fn create_template(
        &self,
        name: impl Into<String>,
        owner: Option<String>,
        strategy: PeriodizationStrategy,
        position: TemplatePosition,
        selections: &[ExerciseSelection],
    ) -> Result<WorkoutTemplate> {
        let mut template = WorkoutTemplate::new(name, owner)?;

        for selection in selections {
            if !self.catalog.contains(&selection.exercise_id) {
                return Err(Error::NotFound(format!(
                    "exercise '{}' is not in the catalog",
                    selection.exercise_id
                )));
            }

            let slot = ExerciseSlot::new(selection.exercise_id.clone())
                .at_week(position.week)
                .at_session(position.session, position.sessions_per_week)
                .with_load(selection.load);

            let mut sets =
                generate_prescriptions(strategy, &slot, position.total_weeks, self.config)?;
            if position.volume_modifier.is_some() || position.intensity_modifier.is_some() {
                apply_week_modifiers(
                    &mut sets,
                    position.volume_modifier,
                    position.intensity_modifier,
                    self.config,
                )?;
            }

            template.add_exercise(selection.exercise_id.clone(), sets, selection.notes.clone())?;
        }

        tracing::info!(
            "Assembled template '{}' with {} exercises ({} week {}/{})",
            template.name,
            template.exercises.len(),
            strategy,
            position.week,
            position.total_weeks
        );
        Ok(template)
    }

    /// Generate and assign every template a program needs
    ///
    /// Undulating programs get one template per training day (each
    /// session sits at a different point of the week's wave); linear and
    /// block programs get one template per week, placed on every training
    /// day. Each week's volume/intensity modifiers are applied. The
    /// program only changes if every template was built.
    pub fn assemble_program(
        &self,
        program: &mut Program,
        selections: &[ExerciseSelection],
    ) -> Result<Vec<WorkoutTemplate>> {
        if selections.is_empty() {
            return Err(Error::Validation(
                "assembling a program needs at least one exercise".into(),
            ));
        }

        let mut staged = program.clone();
        let mut templates = Vec::new();
        let total_weeks = program.duration_weeks();
        let days = program.days_per_week();

        for week in 1..=total_weeks {
            let (volume_modifier, intensity_modifier) = program
                .week(week)
                .map(|w| (w.volume_modifier, w.intensity_modifier))
                .unwrap_or((None, None));

            let base = TemplatePosition {
                volume_modifier,
                intensity_modifier,
                ..TemplatePosition::new(week, total_weeks)
            };

            match program.strategy {
                PeriodizationStrategy::Undulating => {
                    for day in 1..=days {
                        let template = self.create_template(
                            format!("{} W{} D{}", program.name, week, day),
                            program.owner.clone(),
                            program.strategy,
                            base.session(day as u32, days as u32),
                            selections,
                        )?;
                        staged.assign_day(week, day, template.id)?;
                        templates.push(template);
                    }
                }
                PeriodizationStrategy::Linear | PeriodizationStrategy::Block => {
                    let template = self.create_template(
                        format!("{} W{}", program.name, week),
                        program.owner.clone(),
                        program.strategy,
                        base.session(1, days as u32),
                        selections,
                    )?;
                    for day in 1..=days {
                        staged.assign_day(week, day, template.id)?;
                    }
                    templates.push(template);
                }
            }
        }

        *program = staged;
        tracing::info!(
            "Assembled {} templates for program '{}'",
            templates.len(),
            program.name
        );
        Ok(templates)
    }
}
