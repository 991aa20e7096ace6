use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use periodize_core::program::CellSource;
use periodize_core::state::{journal_path, plan_path, transition_workout};
use periodize_core::*;
use std::path::{Path, PathBuf};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "periodize")]
#[command(about = "Training program periodization and scheduling", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the generated sets for one exercise slot
    Prescribe {
        /// linear, undulating or block
        #[arg(long)]
        strategy: String,

        /// Total weeks in the program
        #[arg(long)]
        weeks: u32,

        #[arg(long, default_value_t = 1)]
        week: u32,

        #[arg(long, default_value_t = 1)]
        session: u32,

        #[arg(long, default_value_t = 1)]
        sessions_per_week: u32,

        #[arg(long, default_value = "back_squat")]
        exercise: String,

        /// Compute kg loads from this training max
        #[arg(long)]
        training_max: Option<f64>,

        /// Print the sets as JSON
        #[arg(long)]
        json: bool,
    },

    /// Create and edit programs
    #[command(subcommand)]
    Program(ProgramCommand),

    /// Inspect templates
    #[command(subcommand)]
    Template(TemplateCommand),

    /// Materialize a program onto the calendar
    Schedule {
        /// Program name or id prefix
        program: String,

        /// First day of week 1 (YYYY-MM-DD)
        #[arg(long)]
        start: NaiveDate,

        /// reject, replace or allow (defaults to config)
        #[arg(long)]
        policy: Option<String>,
    },

    /// Schedule one workout outside any program
    Add {
        /// Template name or id prefix
        template: String,

        /// Day to train (YYYY-MM-DD)
        #[arg(long)]
        date: NaiveDate,

        #[arg(long)]
        notes: Option<String>,
    },

    /// Delete a scheduled workout
    Remove { id: String },

    /// Set a workout's notes; omit the text to clear them
    Note { id: String, text: Option<String> },

    /// List scheduled workouts
    List {
        #[command(flatten)]
        filter: FilterArgs,

        #[arg(long)]
        json: bool,
    },

    /// Start a scheduled workout
    Start { id: String },

    /// Complete a workout, linking the logged session
    Complete {
        id: String,

        /// Id of the logged session
        #[arg(long)]
        session: Uuid,
    },

    /// Skip a scheduled workout
    Skip { id: String },

    /// Export scheduled workouts to CSV
    Export {
        #[arg(long)]
        out: PathBuf,

        #[command(flatten)]
        filter: FilterArgs,
    },
}

#[derive(Subcommand)]
enum ProgramCommand {
    /// Create an empty program
    Create {
        #[arg(long)]
        name: String,

        #[arg(long)]
        weeks: u32,

        #[arg(long)]
        days: u8,

        #[arg(long)]
        strategy: String,

        #[arg(long)]
        description: Option<String>,
    },

    /// Generate and assign templates for every week
    Generate {
        program: String,

        /// Exercise id, optionally with a training max: back_squat=140
        #[arg(long = "exercise", required = true)]
        exercises: Vec<String>,
    },

    /// Put a template on a week, or on one day of a week
    Assign {
        program: String,

        #[arg(long)]
        week: u32,

        #[arg(long)]
        day: Option<u8>,

        /// Template name or id prefix
        #[arg(long)]
        template: String,
    },

    /// Set a week's volume and intensity multipliers
    Modifiers {
        program: String,

        #[arg(long)]
        week: u32,

        #[arg(long)]
        volume: Option<f64>,

        #[arg(long)]
        intensity: Option<f64>,
    },

    /// Mark a program as in use
    Activate { program: String },

    /// Retire a program without deleting it
    Deactivate { program: String },

    Show { program: String },

    List,
}

#[derive(Subcommand)]
enum TemplateCommand {
    Show { template: String },

    List,
}

#[derive(Args, Clone, Default)]
struct FilterArgs {
    #[arg(long)]
    from: Option<NaiveDate>,

    #[arg(long)]
    to: Option<NaiveDate>,

    /// scheduled, in_progress, completed or skipped
    #[arg(long)]
    status: Option<String>,

    /// Program name or id prefix
    #[arg(long)]
    program: Option<String>,
}

fn main() -> Result<()> {
    periodize_core::logging::init();

    let cli = Cli::parse();

    let config = Config::load()?;
    let data_dir = cli.data_dir.unwrap_or_else(|| config.data.data_dir.clone());
    tracing::debug!("Using data directory {:?}", data_dir);

    match cli.command {
        Some(Commands::Prescribe {
            strategy,
            weeks,
            week,
            session,
            sessions_per_week,
            exercise,
            training_max,
            json,
        }) => cmd_prescribe(
            &config,
            &strategy,
            weeks,
            ExerciseSlot::new(exercise)
                .at_week(week)
                .at_session(session, sessions_per_week),
            training_max,
            json,
        ),
        Some(Commands::Program(command)) => cmd_program(&data_dir, &config, command),
        Some(Commands::Template(command)) => cmd_template(&data_dir, command),
        Some(Commands::Schedule {
            program,
            start,
            policy,
        }) => cmd_schedule(&data_dir, &config, &program, start, policy.as_deref()),
        Some(Commands::Add {
            template,
            date,
            notes,
        }) => cmd_add(&data_dir, &config, &template, date, notes),
        Some(Commands::Remove { id }) => cmd_remove(&data_dir, &id),
        Some(Commands::Note { id, text }) => cmd_note(&data_dir, &id, text),
        Some(Commands::List { filter, json }) => cmd_list(&data_dir, &filter, json),
        Some(Commands::Start { id }) => cmd_transition(&data_dir, &id, WorkoutEvent::Start),
        Some(Commands::Complete { id, session }) => {
            let event = WorkoutEvent::complete(Some(session))?;
            cmd_transition(&data_dir, &id, event)
        }
        Some(Commands::Skip { id }) => cmd_transition(&data_dir, &id, WorkoutEvent::Skip),
        Some(Commands::Export { out, filter }) => cmd_export(&data_dir, &out, &filter),
        None => {
            // Default to listing what is coming up
            cmd_list(&data_dir, &FilterArgs::default(), false)
        }
    }
}

fn cmd_prescribe(
    config: &Config,
    strategy: &str,
    weeks: u32,
    slot: ExerciseSlot,
    training_max: Option<f64>,
    json: bool,
) -> Result<()> {
    let strategy: PeriodizationStrategy = strategy.parse()?;
    let catalog = load_catalog(config)?;
    let exercise = catalog
        .exercise(&slot.exercise_id)
        .ok_or_else(|| Error::NotFound(format!("exercise '{}'", slot.exercise_id)))?
        .clone();

    let slot = match training_max {
        Some(kg) => slot.with_load(LoadBasis::TrainingMax { kg }),
        None => slot,
    };
    let sets = generate_prescriptions(strategy, &slot, weeks, &config.periodization)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&sets)?);
        return Ok(());
    }

    println!(
        "{} ({} week {}/{}, session {}/{})",
        exercise.name, strategy, slot.week, weeks, slot.session, slot.sessions_per_week
    );
    print_sets(&sets);
    Ok(())
}

fn cmd_program(data_dir: &Path, config: &Config, command: ProgramCommand) -> Result<()> {
    let plan = plan_path(data_dir);

    match command {
        ProgramCommand::Create {
            name,
            weeks,
            days,
            strategy,
            description,
        } => {
            let strategy: PeriodizationStrategy = strategy.parse()?;
            let mut program =
                Program::new(name, weeks, days, strategy)?.with_owner(config.user.owner.clone());
            program.description = description;

            let (id, name) = (program.id, program.name.clone());
            PlanState::update(&plan, |state| {
                if state.programs.iter().any(|p| p.name == program.name) {
                    return Err(Error::Validation(format!(
                        "a program named '{}' already exists",
                        program.name
                    )));
                }
                state.programs.push(program);
                Ok(())
            })?;

            println!("✓ Created program '{}'", name);
            println!("  id: {}", id);
        }

        ProgramCommand::Generate { program, exercises } => {
            let selections = exercises
                .iter()
                .map(|arg| parse_selection(arg))
                .collect::<Result<Vec<_>>>()?;
            let catalog = load_catalog(config)?;
            let assembler = TemplateAssembler::new(&catalog, &config.periodization);

            let (name, count) = PlanState::update(&plan, |state| {
                let program = state.resolve_program_mut(&program)?;
                if !program.populated_cells().is_empty() {
                    return Err(Error::Validation(format!(
                        "program '{}' already has templates assigned",
                        program.name
                    )));
                }
                let templates = assembler.assemble_program(program, &selections)?;
                let name = program.name.clone();
                let count = templates.len();
                state.templates.extend(templates);
                Ok((name, count))
            })?;

            println!("✓ Generated {} templates for '{}'", count, name);
        }

        ProgramCommand::Assign {
            program,
            week,
            day,
            template,
        } => {
            let (program_name, template_name) = PlanState::update(&plan, |state| {
                let template = state.resolve_template(&template)?;
                let (template_id, template_name) = (template.id, template.name.clone());
                let program = state.resolve_program_mut(&program)?;
                match day {
                    Some(day) => {
                        program.assign_day(week, day, template_id)?;
                    }
                    None => program.assign_week(week, template_id)?,
                }
                Ok((program.name.clone(), template_name))
            })?;

            match day {
                Some(day) => println!(
                    "✓ '{}' week {} day {} -> '{}'",
                    program_name, week, day, template_name
                ),
                None => println!("✓ '{}' week {} -> '{}'", program_name, week, template_name),
            }
        }

        ProgramCommand::Modifiers {
            program,
            week,
            volume,
            intensity,
        } => {
            let name = PlanState::update(&plan, |state| {
                let program = state.resolve_program_mut(&program)?;
                program.set_week_modifiers(week, volume, intensity)?;
                Ok(program.name.clone())
            })?;
            println!(
                "✓ '{}' week {}: volume {}, intensity {}",
                name,
                week,
                format_modifier(volume),
                format_modifier(intensity)
            );
        }

        ProgramCommand::Activate { program } => set_program_active(&plan, &program, true)?,

        ProgramCommand::Deactivate { program } => set_program_active(&plan, &program, false)?,

        ProgramCommand::Show { program } => {
            let state = PlanState::load(&plan)?;
            let program = state.resolve_program(&program)?;
            display_program(&state, program);
        }

        ProgramCommand::List => {
            let state = PlanState::load(&plan)?;
            if state.programs.is_empty() {
                println!("No programs yet.");
            }
            for program in &state.programs {
                println!(
                    "{}  {:<24} {:>2} weeks x {} days  {}{}",
                    short_id(program.id),
                    program.name,
                    program.duration_weeks(),
                    program.days_per_week(),
                    program.strategy,
                    if program.is_active { "" } else { "  (inactive)" }
                );
            }
        }
    }

    Ok(())
}

fn set_program_active(plan: &Path, key: &str, active: bool) -> Result<()> {
    let name = PlanState::update(plan, |state| {
        let program = state.resolve_program_mut(key)?;
        program.set_active(active);
        Ok(program.name.clone())
    })?;
    println!(
        "✓ '{}' is now {}",
        name,
        if active { "active" } else { "inactive" }
    );
    Ok(())
}

fn cmd_template(data_dir: &Path, command: TemplateCommand) -> Result<()> {
    let state = PlanState::load(&plan_path(data_dir))?;

    match command {
        TemplateCommand::Show { template } => {
            let template = state.resolve_template(&template)?;
            println!("{}  ({})", template.name, template.id);
            if let Some(ref description) = template.description {
                println!("  {}", description);
            }
            for entry in template.exercises() {
                println!();
                println!("  {}. {}", entry.order() + 1, entry.exercise_id);
                print_sets(entry.sets());
            }
        }

        TemplateCommand::List => {
            if state.templates.is_empty() {
                println!("No templates yet.");
            }
            for template in &state.templates {
                println!(
                    "{}  {:<32} {} exercises",
                    short_id(template.id),
                    template.name,
                    template.exercises().len()
                );
            }
        }
    }

    Ok(())
}

fn cmd_schedule(
    data_dir: &Path,
    config: &Config,
    program: &str,
    start: NaiveDate,
    policy: Option<&str>,
) -> Result<()> {
    let policy: OverlapPolicy = match policy {
        Some(p) => p.parse()?,
        None => config.schedule.overlap_policy,
    };

    let merge = PlanState::update(&plan_path(data_dir), |state| {
        state.schedule(program, start, &config.user.owner, policy)
    })?;

    println!("✓ Scheduled {} workouts from {}", merge.added.len(), start);
    if !merge.replaced.is_empty() {
        println!("  Replaced {} unstarted workouts", merge.replaced.len());
    }
    if !merge.kept.is_empty() {
        println!("  Kept {} overlapping workouts", merge.kept.len());
    }
    Ok(())
}

fn cmd_add(
    data_dir: &Path,
    config: &Config,
    template: &str,
    date: NaiveDate,
    notes: Option<String>,
) -> Result<()> {
    let workout = PlanState::update(&plan_path(data_dir), |state| {
        state.add_workout(template, date, &config.user.owner, notes)
    })?;

    println!("✓ Scheduled {} on {}", short_id(workout.id), workout.scheduled_date);
    println!("  id: {}", workout.id);
    Ok(())
}

fn cmd_remove(data_dir: &Path, key: &str) -> Result<()> {
    let removed = PlanState::update(&plan_path(data_dir), |state| state.remove_workout(key))?;
    println!(
        "✓ Removed {} {} ({})",
        removed.scheduled_date,
        short_id(removed.id),
        removed.status()
    );
    Ok(())
}

fn cmd_note(data_dir: &Path, key: &str, text: Option<String>) -> Result<()> {
    let (id, notes) = PlanState::update(&plan_path(data_dir), |state| {
        let workout = state.set_workout_notes(key, text)?;
        Ok((workout.id, workout.notes.clone()))
    })?;
    match notes {
        Some(notes) => println!("✓ {}: {}", short_id(id), notes),
        None => println!("✓ {}: notes cleared", short_id(id)),
    }
    Ok(())
}

fn cmd_list(data_dir: &Path, filter: &FilterArgs, json: bool) -> Result<()> {
    let state = PlanState::load(&plan_path(data_dir))?;
    let query = build_query(&state, filter)?;
    let rows = state.query(&query);

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if rows.is_empty() {
        println!("No scheduled workouts.");
        return Ok(());
    }

    for workout in rows {
        let template = state
            .template(workout.template_id)
            .map(|t| t.name.as_str())
            .unwrap_or("?");
        println!(
            "{}  {}  {:<11}  {}{}",
            short_id(workout.id),
            workout.scheduled_date,
            workout.status(),
            template,
            workout
                .notes
                .as_deref()
                .map(|n| format!("  ({})", n))
                .unwrap_or_default()
        );
    }
    Ok(())
}

fn cmd_transition(data_dir: &Path, key: &str, event: WorkoutEvent) -> Result<()> {
    let plan = plan_path(data_dir);

    // Read the status we expect, then compare-and-set under the store lock.
    let current = PlanState::load(&plan)?;
    let workout = current.resolve_scheduled(key)?;
    let (id, expected) = (workout.id, workout.status());

    let mut journal = JsonlJournal::new(journal_path(data_dir));
    let (workout, record) =
        transition_workout(&plan, &mut journal, &id.to_string(), Some(expected), event)?;

    println!(
        "✓ {} {}: {} -> {}",
        workout.scheduled_date,
        short_id(workout.id),
        record.from,
        record.to
    );
    if let Some(session) = workout.completed_session_id() {
        println!("  session: {}", session);
    }
    Ok(())
}

fn cmd_export(data_dir: &Path, out: &Path, filter: &FilterArgs) -> Result<()> {
    let state = PlanState::load(&plan_path(data_dir))?;
    let query = build_query(&state, filter)?;
    let count = export_schedule(out, &state, &query)?;

    println!("✓ Exported {} workouts", count);
    println!("  CSV: {}", out.display());
    Ok(())
}

fn load_catalog(config: &Config) -> Result<Catalog> {
    let catalog = Catalog::with_custom(&config.catalog);
    let errors = catalog.validate();
    if !errors.is_empty() {
        eprintln!("Catalog validation errors:");
        for error in errors {
            eprintln!("  - {}", error);
        }
        return Err(Error::CatalogValidation("Invalid catalog".into()));
    }
    Ok(catalog)
}

/// `back_squat` or `back_squat=140`
fn parse_selection(arg: &str) -> Result<ExerciseSelection> {
    match arg.split_once('=') {
        None => Ok(ExerciseSelection::new(arg.trim())),
        Some((id, kg)) => {
            let kg: f64 = kg.trim().parse().map_err(|_| {
                Error::Validation(format!("training max in '{}' is not a number", arg))
            })?;
            Ok(ExerciseSelection::new(id.trim()).with_training_max(kg))
        }
    }
}

fn build_query(state: &PlanState, filter: &FilterArgs) -> Result<ScheduleQuery> {
    let status = filter
        .status
        .as_deref()
        .map(str::parse::<WorkoutStatus>)
        .transpose()?;
    let program_id = filter
        .program
        .as_deref()
        .map(|key| state.resolve_program(key).map(|p| p.id))
        .transpose()?;

    Ok(ScheduleQuery {
        from: filter.from,
        to: filter.to,
        status,
        program_id,
        owner: None,
    })
}

fn display_program(state: &PlanState, program: &Program) {
    let template_name = |id: Uuid| {
        state
            .template(id)
            .map(|t| t.name.clone())
            .unwrap_or_else(|| format!("<missing {}>", short_id(id)))
    };

    println!("{}  ({})", program.name, program.id);
    println!(
        "  {} | {} weeks x {} days{}",
        program.strategy,
        program.duration_weeks(),
        program.days_per_week(),
        if program.is_active { "" } else { " | inactive" }
    );
    if let Some(ref description) = program.description {
        println!("  {}", description);
    }

    for week in program.weeks() {
        if week.volume_modifier.is_some() || week.intensity_modifier.is_some() {
            println!(
                "  Week {}: volume {}, intensity {}",
                week.week_number,
                format_modifier(week.volume_modifier),
                format_modifier(week.intensity_modifier)
            );
        }
    }

    let cells = program.populated_cells();
    if cells.is_empty() {
        println!("  (no templates assigned)");
        return;
    }
    for cell in cells {
        let scope = match cell.source {
            CellSource::Week => "week",
            CellSource::Day => "day",
        };
        println!(
            "  W{} D{}  {:<4}  {}",
            cell.week,
            cell.day,
            scope,
            template_name(cell.template_id)
        );
    }
}

fn print_sets(sets: &[TemplateSetEntry]) {
    for set in sets {
        let weight = set
            .weight
            .map(|w| w.to_string())
            .unwrap_or_else(|| "-".into());
        let reps = set.reps.map(|r| r.to_string()).unwrap_or_else(|| "-".into());
        let rest = set
            .rest_seconds
            .map(|r| format!("{}s", r))
            .unwrap_or_else(|| "-".into());
        let rir = set.rir.map(|r| format!("RIR {}", r)).unwrap_or_default();
        println!(
            "    {:>2}{} {:>9} x {:<3} rest {:<5} {}",
            set.set_number,
            if set.is_warmup { "w" } else { " " },
            weight,
            reps,
            rest,
            rir
        );
    }
}

fn format_modifier(value: Option<f64>) -> String {
    value
        .map(|v| format!("x{}", v))
        .unwrap_or_else(|| "-".into())
}

fn short_id(id: Uuid) -> String {
    id.to_string()[..8].to_string()
}
