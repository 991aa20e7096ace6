//! Schedule materialization: program grid -> dated workouts.
//!
//! Week `w`, day `d` of a program started on `start` lands on
//! `start + (w - 1) * 7 + (d - 1)` days. Dates are plain calendar dates
//! in the caller's local calendar; no timezone or DST handling happens
//! here.
//!
//! The materializer never deduplicates. Callers that care about a
//! previous materialization use `find_overlaps` / `merge_schedule` with
//! an explicit `OverlapPolicy`.

use crate::lifecycle::{ScheduledWorkout, WorkoutStatus};
use crate::program::Program;
use crate::{Error, Result};
use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Calendar date of a (week, day) cell
pub fn cell_date(start_date: NaiveDate, week: u32, day: u8) -> Result<NaiveDate> {
    if week < 1 || day < 1 {
        return Err(Error::Validation(format!(
            "week and day are 1-based, got week {} day {}",
            week, day
        )));
    }
    let offset = u64::from(week - 1) * 7 + u64::from(day - 1);
    start_date.checked_add_days(Days::new(offset)).ok_or_else(|| {
        Error::Validation(format!(
            "week {} day {} from {} is beyond the supported calendar",
            week, day, start_date
        ))
    })
}

/// Materialize one scheduled workout per populated program cell
///
/// Rows come back in grid order (week, then day, then in-cell order) and
/// are identical in order and dates for identical inputs. A program with
/// no populated cells is an error rather than an empty success.
pub fn schedule_program(
    program: &Program,
    start_date: NaiveDate,
    owner: &str,
) -> Result<Vec<ScheduledWorkout>> {
    let cells = program.populated_cells();
    if cells.is_empty() {
        return Err(Error::EmptySchedule(format!(
            "program '{}' has no templates assigned to any week or day",
            program.name
        )));
    }
    if !program.is_active {
        tracing::warn!("Scheduling inactive program '{}'", program.name);
    }
    if start_date < chrono::Local::now().date_naive() {
        tracing::debug!("Start date {} is in the past", start_date);
    }

    let mut scheduled = Vec::with_capacity(cells.len());
    for cell in cells {
        let date = cell_date(start_date, cell.week, cell.day)?;
        scheduled.push(
            ScheduledWorkout::new(owner, cell.template_id, date)
                .with_program(program.id, cell.week, cell.day),
        );
    }

    tracing::info!(
        "Materialized {} workouts for program '{}' starting {}",
        scheduled.len(),
        program.name,
        start_date
    );
    Ok(scheduled)
}

/// Inclusive date range covered by a set of scheduled workouts
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct ScheduleWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl ScheduleWindow {
    /// Window spanning `rows`, or None if there are none
    pub fn of(rows: &[ScheduledWorkout]) -> Option<Self> {
        let start = rows.iter().map(|r| r.scheduled_date).min()?;
        let end = rows.iter().map(|r| r.scheduled_date).max()?;
        Some(Self { start, end })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

impl fmt::Display for ScheduleWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.start, self.end)
    }
}

/// Existing rows of `program_id` dated inside `window`
pub fn find_overlaps(
    existing: &[ScheduledWorkout],
    program_id: Uuid,
    window: ScheduleWindow,
) -> Vec<&ScheduledWorkout> {
    existing
        .iter()
        .filter(|w| w.program_id == Some(program_id) && window.contains(w.scheduled_date))
        .collect()
}

/// What to do when a new materialization overlaps an earlier one of the
/// same program
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum OverlapPolicy {
    /// Refuse the new schedule
    #[default]
    Reject,
    /// Drop the earlier rows that have not been started, then add
    Replace,
    /// Keep both
    Allow,
}

impl FromStr for OverlapPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "reject" => Ok(OverlapPolicy::Reject),
            "replace" => Ok(OverlapPolicy::Replace),
            "allow" => Ok(OverlapPolicy::Allow),
            other => Err(Error::Validation(format!(
                "Unknown overlap policy '{}' (expected reject, replace or allow)",
                other
            ))),
        }
    }
}

/// Outcome of `merge_schedule`
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ScheduleMerge {
    pub added: Vec<Uuid>,
    pub replaced: Vec<Uuid>,
    /// Overlapping rows kept because they were already started or closed
    pub kept: Vec<Uuid>,
}

/// Add a fresh materialization to `existing` under `policy`
///
/// Only rows of the same program inside the new rows' date window count
/// as overlaps. Under `Replace`, rows that were started, completed or
/// skipped are history and stay.
pub fn merge_schedule(
    existing: &mut Vec<ScheduledWorkout>,
    new_rows: Vec<ScheduledWorkout>,
    policy: OverlapPolicy,
) -> Result<ScheduleMerge> {
    let mut merge = ScheduleMerge::default();
    let Some(window) = ScheduleWindow::of(&new_rows) else {
        return Ok(merge);
    };

    let program_ids: Vec<Uuid> = {
        let mut ids: Vec<Uuid> = new_rows.iter().filter_map(|w| w.program_id).collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    };

    let current: &[ScheduledWorkout] = existing;
    let overlapping: Vec<Uuid> = program_ids
        .iter()
        .flat_map(|pid| find_overlaps(current, *pid, window))
        .map(|w| w.id)
        .collect();

    match policy {
        OverlapPolicy::Reject if !overlapping.is_empty() => {
            return Err(Error::ScheduleConflict(format!(
                "{} workouts of this program are already scheduled within {}",
                overlapping.len(),
                window
            )));
        }
        OverlapPolicy::Replace => {
            existing.retain(|w| {
                if !overlapping.contains(&w.id) {
                    return true;
                }
                if w.status() == WorkoutStatus::Scheduled {
                    merge.replaced.push(w.id);
                    false
                } else {
                    merge.kept.push(w.id);
                    true
                }
            });
        }
        _ => {
            merge.kept.extend(overlapping.iter().copied());
        }
    }

    merge.added = new_rows.iter().map(|w| w.id).collect();
    existing.extend(new_rows);

    tracing::info!(
        "Merged schedule ({:?}): {} added, {} replaced, {} kept in {}",
        policy,
        merge.added.len(),
        merge.replaced.len(),
        merge.kept.len(),
        window
    );
    Ok(merge)
}

/// Filter for listing scheduled workouts
#[derive(Clone, Debug, Default)]
pub struct ScheduleQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub status: Option<WorkoutStatus>,
    pub program_id: Option<Uuid>,
    pub owner: Option<String>,
}

impl ScheduleQuery {
    pub fn matches(&self, workout: &ScheduledWorkout) -> bool {
        self.from.map_or(true, |from| workout.scheduled_date >= from)
            && self.to.map_or(true, |to| workout.scheduled_date <= to)
            && self.status.map_or(true, |s| workout.status() == s)
            && self.program_id.map_or(true, |p| workout.program_id == Some(p))
            && self.owner.as_deref().map_or(true, |o| workout.owner == o)
    }

    /// Matching rows by date ascending; same-date rows keep their
    /// creation order
    pub fn apply<'a>(&self, rows: &'a [ScheduledWorkout]) -> Vec<&'a ScheduledWorkout> {
        let mut matched: Vec<&ScheduledWorkout> = rows.iter().filter(|w| self.matches(w)).collect();
        matched.sort_by_key(|w| w.scheduled_date);
        matched
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::WorkoutEvent;
    use crate::types::PeriodizationStrategy;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn program_with_weeks(weeks: &[u32]) -> Program {
        let mut program = Program::new("Block A", 4, 3, PeriodizationStrategy::Block).unwrap();
        for week in weeks {
            program.assign_week(*week, Uuid::new_v4()).unwrap();
        }
        program
    }

    #[test]
    fn test_sparse_weeks_schedule() {
        let program = program_with_weeks(&[1, 3]);
        let start = date(2025, 1, 6);

        let rows = schedule_program(&program, start, "athlete").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].scheduled_date, start);
        assert_eq!(rows[1].scheduled_date, date(2025, 1, 20));
        assert_eq!(rows[0].program_week, Some(1));
        assert_eq!(rows[1].program_week, Some(3));
        assert!(rows.iter().all(|r| r.status() == WorkoutStatus::Scheduled));
        assert!(rows.iter().all(|r| r.completed_session_id().is_none()));
    }

    #[test]
    fn test_day_assignments_dated_by_day() {
        let mut program = Program::new("Split", 2, 4, PeriodizationStrategy::Linear).unwrap();
        let upper = Uuid::new_v4();
        let lower = Uuid::new_v4();
        let conditioning = Uuid::new_v4();

        program.assign_day(2, 4, lower).unwrap();
        program.assign_day(1, 2, upper).unwrap();
        program.assign_day(1, 2, conditioning).unwrap();

        let rows = schedule_program(&program, date(2025, 2, 27), "athlete").unwrap();
        let summary: Vec<(NaiveDate, Uuid, Option<u8>)> = rows
            .iter()
            .map(|r| (r.scheduled_date, r.template_id, r.program_day))
            .collect();

        // Crosses the end of February in a non-leap year.
        assert_eq!(
            summary,
            vec![
                (date(2025, 2, 28), upper, Some(2)),
                (date(2025, 2, 28), conditioning, Some(2)),
                (date(2025, 3, 9), lower, Some(4)),
            ]
        );
    }

    #[test]
    fn test_empty_grid_is_an_error() {
        let program = program_with_weeks(&[]);
        assert!(matches!(
            schedule_program(&program, date(2025, 1, 6), "athlete"),
            Err(Error::EmptySchedule(_))
        ));
    }

    #[test]
    fn test_schedule_is_deterministic() {
        let program = program_with_weeks(&[4, 1, 2]);
        let start = date(2024, 12, 30);

        let a = schedule_program(&program, start, "athlete").unwrap();
        let b = schedule_program(&program, start, "athlete").unwrap();

        let shape = |rows: &[ScheduledWorkout]| {
            rows.iter()
                .map(|r| (r.scheduled_date, r.template_id, r.program_week))
                .collect::<Vec<_>>()
        };
        assert_eq!(shape(&a), shape(&b));
        // fresh rows each time; the engine does not deduplicate
        assert_ne!(a[0].id, b[0].id);
    }

    #[test]
    fn test_past_start_date_is_accepted() {
        let program = program_with_weeks(&[1]);
        let rows = schedule_program(&program, date(2001, 1, 1), "athlete").unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn test_cell_date_rejects_zero() {
        assert!(cell_date(date(2025, 1, 1), 0, 1).is_err());
        assert!(cell_date(date(2025, 1, 1), 1, 0).is_err());
        assert_eq!(cell_date(date(2025, 1, 1), 2, 3).unwrap(), date(2025, 1, 10));
    }

    #[test]
    fn test_reject_policy_detects_prior_materialization() {
        let program = program_with_weeks(&[1, 2]);
        let start = date(2025, 1, 6);
        let mut existing = Vec::new();

        merge_schedule(
            &mut existing,
            schedule_program(&program, start, "athlete").unwrap(),
            OverlapPolicy::Reject,
        )
        .unwrap();

        let again = schedule_program(&program, start, "athlete").unwrap();
        let window = ScheduleWindow::of(&again).unwrap();
        assert_eq!(find_overlaps(&existing, program.id, window).len(), 2);

        let result = merge_schedule(&mut existing, again, OverlapPolicy::Reject);
        assert!(matches!(result, Err(Error::ScheduleConflict(_))));
        assert_eq!(existing.len(), 2);
    }

    #[test]
    fn test_replace_policy_keeps_history() {
        let program = program_with_weeks(&[1, 2]);
        let start = date(2025, 1, 6);
        let mut existing = schedule_program(&program, start, "athlete").unwrap();
        existing[0]
            .apply(WorkoutEvent::Complete {
                session_id: Uuid::new_v4(),
            })
            .unwrap();
        let done_id = existing[0].id;
        let pending_id = existing[1].id;

        let merge = merge_schedule(
            &mut existing,
            schedule_program(&program, start, "athlete").unwrap(),
            OverlapPolicy::Replace,
        )
        .unwrap();

        assert_eq!(merge.replaced, vec![pending_id]);
        assert_eq!(merge.kept, vec![done_id]);
        assert_eq!(merge.added.len(), 2);
        assert_eq!(existing.len(), 3);
    }

    #[test]
    fn test_allow_policy_duplicates() {
        let program = program_with_weeks(&[1]);
        let start = date(2025, 1, 6);
        let mut existing = schedule_program(&program, start, "athlete").unwrap();

        let merge = merge_schedule(
            &mut existing,
            schedule_program(&program, start, "athlete").unwrap(),
            OverlapPolicy::Allow,
        )
        .unwrap();
        assert_eq!(merge.kept.len(), 1);
        assert_eq!(existing.len(), 2);
    }

    #[test]
    fn test_other_programs_do_not_overlap() {
        let a = program_with_weeks(&[1]);
        let b = program_with_weeks(&[1]);
        let start = date(2025, 1, 6);
        let mut existing = schedule_program(&a, start, "athlete").unwrap();

        merge_schedule(
            &mut existing,
            schedule_program(&b, start, "athlete").unwrap(),
            OverlapPolicy::Reject,
        )
        .unwrap();
        assert_eq!(existing.len(), 2);
    }

    #[test]
    fn test_query_filters_and_sorts() {
        let mut program = Program::new("Q", 3, 2, PeriodizationStrategy::Linear).unwrap();
        for week in 1..=3 {
            program.assign_day(week, 2, Uuid::new_v4()).unwrap();
            program.assign_day(week, 1, Uuid::new_v4()).unwrap();
        }
        let mut rows = schedule_program(&program, date(2025, 1, 6), "athlete").unwrap();
        rows.reverse();
        rows[0].apply(WorkoutEvent::Skip).unwrap();

        let all = ScheduleQuery::default().apply(&rows);
        assert_eq!(all.len(), 6);
        assert!(all.windows(2).all(|w| w[0].scheduled_date <= w[1].scheduled_date));

        let week2 = ScheduleQuery {
            from: Some(date(2025, 1, 13)),
            to: Some(date(2025, 1, 19)),
            ..Default::default()
        };
        assert_eq!(week2.apply(&rows).len(), 2);

        let skipped = ScheduleQuery {
            status: Some(WorkoutStatus::Skipped),
            ..Default::default()
        };
        assert_eq!(skipped.apply(&rows).len(), 1);

        let someone_else = ScheduleQuery {
            owner: Some("coach".into()),
            ..Default::default()
        };
        assert!(someone_else.apply(&rows).is_empty());
    }
}
