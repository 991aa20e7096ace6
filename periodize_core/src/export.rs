//! CSV export of scheduled workouts.

use crate::lifecycle::ScheduledWorkout;
use crate::schedule::ScheduleQuery;
use crate::state::PlanState;
use crate::Result;
use std::fs::File;
use std::path::Path;

/// A row in the CSV output
#[derive(Debug, serde::Serialize)]
struct CsvRow {
    id: String,
    scheduled_date: String,
    status: &'static str,
    owner: String,
    template_id: String,
    template_name: Option<String>,
    program_id: Option<String>,
    program_name: Option<String>,
    program_week: Option<u32>,
    program_day: Option<u8>,
    completed_session_id: Option<String>,
    notes: Option<String>,
}

impl From<&ScheduledWorkout> for CsvRow {
    fn from(workout: &ScheduledWorkout) -> Self {
        CsvRow {
            id: workout.id.to_string(),
            scheduled_date: workout.scheduled_date.to_string(),
            status: workout.status().as_str(),
            owner: workout.owner.clone(),
            template_id: workout.template_id.to_string(),
            template_name: None,
            program_id: workout.program_id.map(|id| id.to_string()),
            program_name: None,
            program_week: workout.program_week,
            program_day: workout.program_day,
            completed_session_id: workout.completed_session_id().map(|id| id.to_string()),
            notes: workout.notes.clone(),
        }
    }
}

/// Write the workouts matching `query` to `csv_path`, replacing the file
///
/// Template and program names are resolved from `state`. Returns the
/// number of rows written.
pub fn export_schedule(csv_path: &Path, state: &PlanState, query: &ScheduleQuery) -> Result<usize> {
    if let Some(parent) = csv_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let rows: Vec<CsvRow> = query
        .apply(&state.scheduled)
        .into_iter()
        .map(|workout| {
            let mut row = CsvRow::from(workout);
            row.template_name = state.template(workout.template_id).map(|t| t.name.clone());
            row.program_name = workout
                .program_id
                .and_then(|id| state.program(id))
                .map(|p| p.name.clone());
            row
        })
        .collect();

    let file = File::create(csv_path)?;
    let mut writer = csv::Writer::from_writer(file);
    for row in &rows {
        writer.serialize(row)?;
    }

    writer.flush()?;
    let file = writer
        .into_inner()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
    file.sync_all()?;

    tracing::info!("Exported {} scheduled workouts to {:?}", rows.len(), csv_path);
    Ok(rows.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::{WorkoutEvent, WorkoutStatus};
    use crate::program::Program;
    use crate::schedule::OverlapPolicy;
    use crate::template::WorkoutTemplate;
    use crate::types::PeriodizationStrategy;
    use chrono::NaiveDate;
    use uuid::Uuid;

    fn scheduled_state() -> PlanState {
        let template = WorkoutTemplate::new("Upper B", None).unwrap();
        let mut program = Program::new("Peak", 3, 2, PeriodizationStrategy::Block).unwrap();
        for week in 1..=3 {
            program.assign_week(week, template.id).unwrap();
        }
        let mut state = PlanState {
            programs: vec![program],
            templates: vec![template],
            scheduled: Vec::new(),
        };
        state
            .schedule(
                "Peak",
                NaiveDate::from_ymd_opt(2025, 4, 7).unwrap(),
                "athlete",
                OverlapPolicy::Reject,
            )
            .unwrap();
        state
    }

    #[test]
    fn test_one_row_per_workout() {
        let temp_dir = tempfile::tempdir().unwrap();
        let csv_path = temp_dir.path().join("out/schedule.csv");

        let mut state = scheduled_state();
        let session = Uuid::new_v4();
        state.scheduled[0]
            .apply(WorkoutEvent::Complete { session_id: session })
            .unwrap();

        let count = export_schedule(&csv_path, &state, &ScheduleQuery::default()).unwrap();
        assert_eq!(count, 3);

        let mut reader = csv::Reader::from_path(&csv_path).unwrap();
        let headers = reader.headers().unwrap().clone();
        assert_eq!(&headers[0], "id");
        assert_eq!(&headers[2], "status");

        let records: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(records.len(), 3);
        assert_eq!(&records[0][1], "2025-04-07");
        assert_eq!(&records[0][2], "completed");
        assert_eq!(&records[0][5], "Upper B");
        assert_eq!(&records[0][7], "Peak");
        assert_eq!(&records[0][10], session.to_string().as_str());
        assert_eq!(&records[1][10], "");
    }

    #[test]
    fn test_export_respects_query() {
        let temp_dir = tempfile::tempdir().unwrap();
        let csv_path = temp_dir.path().join("skipped.csv");

        let mut state = scheduled_state();
        state.scheduled[2].apply(WorkoutEvent::Skip).unwrap();

        let query = ScheduleQuery {
            status: Some(WorkoutStatus::Skipped),
            ..Default::default()
        };
        assert_eq!(export_schedule(&csv_path, &state, &query).unwrap(), 1);
    }

    #[test]
    fn test_export_overwrites() {
        let temp_dir = tempfile::tempdir().unwrap();
        let csv_path = temp_dir.path().join("schedule.csv");
        let state = scheduled_state();

        export_schedule(&csv_path, &state, &ScheduleQuery::default()).unwrap();
        export_schedule(&csv_path, &state, &ScheduleQuery::default()).unwrap();

        let reader = csv::Reader::from_path(&csv_path).unwrap();
        assert_eq!(reader.into_records().count(), 3);
    }
}
