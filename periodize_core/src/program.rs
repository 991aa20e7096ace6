//! Program structure: a week x day grid of template assignments.
//!
//! Two granularities coexist on one program:
//! - week-level: at most one template per week (`ProgramWeek`)
//! - day-level: an ordered list of templates per (week, day) cell
//!   (`DayAssignment`), for multi-session days
//!
//! Every mutation validates ranges against `duration_weeks` and
//! `days_per_week` before touching the grid.

use crate::periodization::{check_modifier, check_program_weeks};
use crate::types::PeriodizationStrategy;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

/// Week of a program with its optional template and periodization tweaks
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ProgramWeek {
    pub week_number: u32,
    #[serde(default)]
    pub template_id: Option<Uuid>,
    /// Scales working-set count, e.g. 0.6 for a deload
    #[serde(default)]
    pub volume_modifier: Option<f64>,
    /// Scales load, e.g. 0.9 for a deload
    #[serde(default)]
    pub intensity_modifier: Option<f64>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl ProgramWeek {
    fn empty(week_number: u32) -> Self {
        Self {
            week_number,
            template_id: None,
            volume_modifier: None,
            intensity_modifier: None,
            notes: None,
        }
    }
}

/// Template placed on one day of one week
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DayAssignment {
    pub week_number: u32,
    pub day_number: u8,
    pub template_id: Uuid,
    /// Position among templates sharing this (week, day), from 0
    pub order: u32,
}

/// Where a populated grid cell came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CellSource {
    Week,
    Day,
}

/// A populated cell of the program grid, ready to be dated
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GridCell {
    pub week: u32,
    pub day: u8,
    pub template_id: Uuid,
    pub source: CellSource,
}

/// Multi-week training program
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Program {
    pub id: Uuid,
    /// None = public program
    #[serde(default)]
    pub owner: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    duration_weeks: u32,
    days_per_week: u8,
    pub strategy: PeriodizationStrategy,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    weeks: Vec<ProgramWeek>,
    #[serde(default)]
    days: Vec<DayAssignment>,
}

fn default_true() -> bool {
    true
}

impl Program {
    pub fn new(
        name: impl Into<String>,
        duration_weeks: u32,
        days_per_week: u8,
        strategy: PeriodizationStrategy,
    ) -> Result<Self> {
        let program = Self {
            id: Uuid::new_v4(),
            owner: None,
            name: name.into(),
            description: None,
            duration_weeks,
            days_per_week,
            strategy,
            is_active: true,
            is_public: false,
            created_at: Utc::now(),
            updated_at: None,
            weeks: Vec::new(),
            days: Vec::new(),
        };
        program.validate()?;
        Ok(program)
    }

    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    /// Mark the program active or retired; scheduling a retired program
    /// still works but is logged
    pub fn set_active(&mut self, active: bool) {
        if self.is_active != active {
            self.is_active = active;
            self.updated_at = Some(Utc::now());
            tracing::info!(
                "Program '{}' is now {}",
                self.name,
                if active { "active" } else { "inactive" }
            );
        }
    }

    pub fn duration_weeks(&self) -> u32 {
        self.duration_weeks
    }

    pub fn days_per_week(&self) -> u8 {
        self.days_per_week
    }

    /// Weeks that carry a template, modifiers or notes, by week number
    pub fn weeks(&self) -> &[ProgramWeek] {
        &self.weeks
    }

    pub fn week(&self, week_number: u32) -> Option<&ProgramWeek> {
        self.weeks.iter().find(|w| w.week_number == week_number)
    }

    /// Day assignments in grid order
    pub fn day_assignments(&self) -> &[DayAssignment] {
        &self.days
    }

    /// Check every structural invariant (used after deserializing)
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::Validation("program name must not be empty".into()));
        }
        check_program_weeks(self.duration_weeks)?;
        if !(1..=7).contains(&self.days_per_week) {
            return Err(Error::Validation(format!(
                "days_per_week must be 1-7, got {}",
                self.days_per_week
            )));
        }

        let mut seen_weeks = HashSet::new();
        for week in &self.weeks {
            self.check_week(week.week_number)?;
            if !seen_weeks.insert(week.week_number) {
                return Err(Error::Validation(format!(
                    "week {} appears more than once",
                    week.week_number
                )));
            }
            if let Some(v) = week.volume_modifier {
                check_modifier("volume", v)?;
            }
            if let Some(i) = week.intensity_modifier {
                check_modifier("intensity", i)?;
            }
        }

        for assignment in &self.days {
            self.check_week(assignment.week_number)?;
            self.check_day(assignment.day_number)?;
            let mut orders: Vec<u32> = self
                .cell(assignment.week_number, assignment.day_number)
                .map(|a| a.order)
                .collect();
            orders.sort_unstable();
            if orders.iter().zip(0u32..).any(|(order, expected)| *order != expected) {
                return Err(Error::Validation(format!(
                    "week {} day {}: assignment order must be dense from 0",
                    assignment.week_number, assignment.day_number
                )));
            }
        }

        Ok(())
    }

    fn check_week(&self, week_number: u32) -> Result<()> {
        if week_number < 1 || week_number > self.duration_weeks {
            return Err(Error::Validation(format!(
                "week {} is outside 1..={}",
                week_number, self.duration_weeks
            )));
        }
        Ok(())
    }

    fn check_day(&self, day_number: u8) -> Result<()> {
        if day_number < 1 || day_number > self.days_per_week {
            return Err(Error::Validation(format!(
                "day {} is outside 1..={}",
                day_number, self.days_per_week
            )));
        }
        Ok(())
    }

    fn cell(&self, week_number: u32, day_number: u8) -> impl Iterator<Item = &DayAssignment> {
        self.days
            .iter()
            .filter(move |a| a.week_number == week_number && a.day_number == day_number)
    }

    fn week_entry(&mut self, week_number: u32) -> &mut ProgramWeek {
        let idx = match self.weeks.iter().position(|w| w.week_number == week_number) {
            Some(idx) => idx,
            None => {
                let idx = self
                    .weeks
                    .partition_point(|w| w.week_number < week_number);
                self.weeks.insert(idx, ProgramWeek::empty(week_number));
                idx
            }
        };
        &mut self.weeks[idx]
    }

    /// Assign (or replace) the week-level template
    pub fn assign_week(&mut self, week_number: u32, template_id: Uuid) -> Result<()> {
        self.check_week(week_number)?;
        self.week_entry(week_number).template_id = Some(template_id);
        self.updated_at = Some(Utc::now());
        tracing::debug!("Program {}: week {} -> template {}", self.id, week_number, template_id);
        Ok(())
    }

    /// Remove the week-level template, keeping modifiers and notes
    pub fn clear_week(&mut self, week_number: u32) -> Result<()> {
        self.check_week(week_number)?;
        if let Some(week) = self.weeks.iter_mut().find(|w| w.week_number == week_number) {
            week.template_id = None;
            self.updated_at = Some(Utc::now());
        }
        Ok(())
    }

    pub fn set_week_modifiers(
        &mut self,
        week_number: u32,
        volume: Option<f64>,
        intensity: Option<f64>,
    ) -> Result<()> {
        self.check_week(week_number)?;
        if let Some(v) = volume {
            check_modifier("volume", v)?;
        }
        if let Some(i) = intensity {
            check_modifier("intensity", i)?;
        }
        let week = self.week_entry(week_number);
        week.volume_modifier = volume;
        week.intensity_modifier = intensity;
        self.updated_at = Some(Utc::now());
        Ok(())
    }

    pub fn set_week_notes(&mut self, week_number: u32, notes: Option<String>) -> Result<()> {
        self.check_week(week_number)?;
        self.week_entry(week_number).notes = notes;
        self.updated_at = Some(Utc::now());
        Ok(())
    }

    /// Append a template to a (week, day) cell, returning its order
    pub fn assign_day(&mut self, week_number: u32, day_number: u8, template_id: Uuid) -> Result<u32> {
        self.check_week(week_number)?;
        self.check_day(day_number)?;

        let order = self.cell(week_number, day_number).count() as u32;
        let idx = self
            .days
            .partition_point(|a| (a.week_number, a.day_number, a.order) < (week_number, day_number, order));
        self.days.insert(
            idx,
            DayAssignment {
                week_number,
                day_number,
                template_id,
                order,
            },
        );
        self.updated_at = Some(Utc::now());

        tracing::debug!(
            "Program {}: week {} day {} #{} -> template {}",
            self.id,
            week_number,
            day_number,
            order,
            template_id
        );
        Ok(order)
    }

    /// Remove one assignment and close the gap in its cell's order
    pub fn remove_day_assignment(
        &mut self,
        week_number: u32,
        day_number: u8,
        order: u32,
    ) -> Result<DayAssignment> {
        let idx = self
            .days
            .iter()
            .position(|a| a.week_number == week_number && a.day_number == day_number && a.order == order)
            .ok_or_else(|| {
                Error::NotFound(format!(
                    "assignment #{} on week {} day {}",
                    order, week_number, day_number
                ))
            })?;

        let removed = self.days.remove(idx);
        for assignment in self
            .days
            .iter_mut()
            .filter(|a| a.week_number == week_number && a.day_number == day_number && a.order > order)
        {
            assignment.order -= 1;
        }
        self.updated_at = Some(Utc::now());
        Ok(removed)
    }

    /// Every template-bearing cell, in week, day, then order sequence
    ///
    /// A week-level template sits on day 1 ahead of that day's own
    /// assignments.
    pub fn populated_cells(&self) -> Vec<GridCell> {
        let mut cells: Vec<(u32, u8, u32, GridCell)> = Vec::new();

        for week in &self.weeks {
            if let Some(template_id) = week.template_id {
                cells.push((
                    week.week_number,
                    1,
                    0,
                    GridCell {
                        week: week.week_number,
                        day: 1,
                        template_id,
                        source: CellSource::Week,
                    },
                ));
            }
        }

        for assignment in &self.days {
            cells.push((
                assignment.week_number,
                assignment.day_number,
                assignment.order + 1,
                GridCell {
                    week: assignment.week_number,
                    day: assignment.day_number,
                    template_id: assignment.template_id,
                    source: CellSource::Day,
                },
            ));
        }

        cells.sort_by_key(|(week, day, rank, _)| (*week, *day, *rank));
        cells.into_iter().map(|(_, _, _, cell)| cell).collect()
    }

    /// Every template id the program references
    pub fn template_ids(&self) -> HashSet<Uuid> {
        self.populated_cells()
            .into_iter()
            .map(|cell| cell.template_id)
            .collect()
    }
}
