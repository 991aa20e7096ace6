//! Prescription generation for the three periodization strategies.
//!
//! Each strategy resolves an exercise slot (where in the program we are)
//! to a single `Prescription` point, which is then expanded into numbered
//! set entries:
//! - Linear: three volume bands, intensity ramps from start to peak
//! - Undulating: volume/intensity shift between sessions of one week
//! - Block: accumulation, transmutation, realization phases
//!
//! Everything here is pure: the same inputs always give the same sets.

use crate::config::{BlockConfig, PeriodizationConfig, PhaseParams, VolumeBand};
use crate::types::{renumber_sets, PeriodizationStrategy, TemplateSetEntry, WeightSpec};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Longest program span, in weeks, accepted anywhere in the planner
pub const MAX_PROGRAM_WEEKS: u32 = 104;

/// What the generated loads are expressed against
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LoadBasis {
    /// Weights as percentage of max
    #[default]
    Relative,
    /// Weights in kg computed from a known training max
    TrainingMax { kg: f64 },
}

/// One exercise at one point of a program
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ExerciseSlot {
    pub exercise_id: String,
    /// 1-based week of the program
    pub week: u32,
    /// 1-based session within the week
    pub session: u32,
    pub sessions_per_week: u32,
    #[serde(default)]
    pub load: LoadBasis,
}

impl ExerciseSlot {
    /// Slot for week 1, session 1 of a one-session week
    pub fn new(exercise_id: impl Into<String>) -> Self {
        Self {
            exercise_id: exercise_id.into(),
            week: 1,
            session: 1,
            sessions_per_week: 1,
            load: LoadBasis::Relative,
        }
    }

    pub fn at_week(mut self, week: u32) -> Self {
        self.week = week;
        self
    }

    pub fn at_session(mut self, session: u32, sessions_per_week: u32) -> Self {
        self.session = session;
        self.sessions_per_week = sessions_per_week;
        self
    }

    pub fn with_load(mut self, load: LoadBasis) -> Self {
        self.load = load;
        self
    }

    fn validate(&self, total_weeks: u32) -> Result<()> {
        if self.exercise_id.trim().is_empty() {
            return Err(Error::Validation("exercise id must not be empty".into()));
        }
        check_program_weeks(total_weeks)?;
        if self.week < 1 || self.week > total_weeks {
            return Err(Error::Validation(format!(
                "week {} is outside 1..={}",
                self.week, total_weeks
            )));
        }
        if self.sessions_per_week < 1 || self.sessions_per_week > 7 {
            return Err(Error::Validation(format!(
                "sessions_per_week must be 1-7, got {}",
                self.sessions_per_week
            )));
        }
        if self.session < 1 || self.session > self.sessions_per_week {
            return Err(Error::Validation(format!(
                "session {} is outside 1..={}",
                self.session, self.sessions_per_week
            )));
        }
        if let LoadBasis::TrainingMax { kg } = self.load {
            if !(kg.is_finite() && kg > 0.0) {
                return Err(Error::Validation(format!(
                    "training max must be > 0 kg, got {}",
                    kg
                )));
            }
        }
        Ok(())
    }
}

/// Reject program spans outside `1..=MAX_PROGRAM_WEEKS`
pub fn check_program_weeks(total_weeks: u32) -> Result<()> {
    if !(1..=MAX_PROGRAM_WEEKS).contains(&total_weeks) {
        return Err(Error::Validation(format!(
            "program length must be 1-{} weeks, got {}",
            MAX_PROGRAM_WEEKS, total_weeks
        )));
    }
    Ok(())
}

/// Working-set parameters resolved for one slot
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Prescription {
    pub sets: u32,
    pub reps: u32,
    pub percentage: f64,
    pub rest_seconds: u32,
    pub rir: Option<u8>,
}

impl Prescription {
    fn from_phase(phase: &PhaseParams) -> Self {
        Self {
            sets: phase.sets,
            reps: phase.reps,
            percentage: phase.percentage,
            rest_seconds: phase.rest_seconds,
            rir: phase.rir,
        }
    }

    fn from_band(band: &VolumeBand, percentage: f64) -> Self {
        Self {
            sets: band.sets,
            reps: band.reps,
            percentage,
            rest_seconds: band.rest_seconds,
            rir: band.rir,
        }
    }

    /// Total working reps (sets x reps)
    pub fn volume(&self) -> u32 {
        self.sets * self.reps
    }
}

/// Band of a linear progression
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinearBand {
    Moderate,
    Reduced,
    Minimal,
}

/// Band for `week` of a `total_weeks` linear progression (thirds of the span)
pub fn linear_band(week: u32, total_weeks: u32) -> LinearBand {
    let elapsed = u64::from(week.saturating_sub(1));
    match (elapsed * 3 / u64::from(total_weeks.max(1))).min(2) {
        0 => LinearBand::Moderate,
        1 => LinearBand::Reduced,
        _ => LinearBand::Minimal,
    }
}

/// Phase of a block progression
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockPhase {
    Accumulation,
    Transmutation,
    Realization,
}

/// Number of weeks in each block phase
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockPhases {
    pub accumulation: u32,
    pub transmutation: u32,
    pub realization: u32,
}

impl BlockPhases {
    /// Split `total_weeks` into phases proportional to the configured shares
    ///
    /// Accumulation always gets at least one week; from two weeks on,
    /// realization does too, taking weeks from transmutation first.
    pub fn split(total_weeks: u32, block: &BlockConfig) -> Self {
        let total = total_weeks.max(1);
        let mut accumulation = ((total as f64 * block.accumulation_share).floor() as u32).max(1);
        let mut transmutation = (total as f64 * block.transmutation_share).round() as u32;

        if total == 1 {
            return Self {
                accumulation: 1,
                transmutation: 0,
                realization: 0,
            };
        }

        while accumulation + transmutation >= total {
            if transmutation > 0 {
                transmutation -= 1;
            } else {
                accumulation -= 1;
            }
        }

        Self {
            accumulation,
            transmutation,
            realization: total - accumulation - transmutation,
        }
    }

    /// Phase containing `week`, with the 0-based week offset inside it
    pub fn phase_of(&self, week: u32) -> (BlockPhase, u32) {
        let offset = week.saturating_sub(1);
        if offset < self.accumulation {
            (BlockPhase::Accumulation, offset)
        } else if offset < self.accumulation + self.transmutation {
            (BlockPhase::Transmutation, offset - self.accumulation)
        } else {
            (
                BlockPhase::Realization,
                offset - self.accumulation - self.transmutation,
            )
        }
    }
}

/// Resolve the working-set prescription for a slot
pub fn prescription_point(
    strategy: PeriodizationStrategy,
    slot: &ExerciseSlot,
    total_weeks: u32,
    config: &PeriodizationConfig,
) -> Result<Prescription> {
    slot.validate(total_weeks)?;

    // A one-week program has no span to progress across.
    if total_weeks == 1 {
        return Ok(Prescription::from_phase(&config.single_week));
    }

    let point = match strategy {
        PeriodizationStrategy::Linear => linear_point(slot.week, total_weeks, config),
        PeriodizationStrategy::Undulating => {
            undulating_point(slot.session, slot.sessions_per_week, config)
        }
        PeriodizationStrategy::Block => block_point(slot.week, total_weeks, config),
    };

    Ok(point)
}

fn linear_point(week: u32, total_weeks: u32, config: &PeriodizationConfig) -> Prescription {
    let linear = &config.linear;
    let progress = (week - 1) as f64 / (total_weeks - 1) as f64;
    let percentage =
        linear.start_percentage + (linear.peak_percentage - linear.start_percentage) * progress;

    let band = match linear_band(week, total_weeks) {
        LinearBand::Moderate => &linear.moderate,
        LinearBand::Reduced => &linear.reduced,
        LinearBand::Minimal => &linear.minimal,
    };

    Prescription::from_band(band, round_half(percentage))
}

fn undulating_point(session: u32, sessions_per_week: u32, config: &PeriodizationConfig) -> Prescription {
    let volume = &config.undulating.volume;
    let intensity = &config.undulating.intensity;

    let t = if sessions_per_week == 1 {
        0.5
    } else {
        (session - 1) as f64 / (sessions_per_week - 1) as f64
    };

    let rir = match (volume.rir, intensity.rir) {
        (Some(a), Some(b)) => Some(lerp(a as f64, b as f64, t).round() as u8),
        (a, b) => a.or(b),
    };

    Prescription {
        sets: (lerp(volume.sets as f64, intensity.sets as f64, t).round() as u32).max(1),
        reps: (lerp(volume.reps as f64, intensity.reps as f64, t).round() as u32).max(1),
        percentage: round_half(lerp(volume.percentage, intensity.percentage, t)),
        rest_seconds: (lerp(volume.rest_seconds as f64, intensity.rest_seconds as f64, t).round()
            as u32)
            .max(1),
        rir,
    }
}

fn block_point(week: u32, total_weeks: u32, config: &PeriodizationConfig) -> Prescription {
    let block = &config.block;
    let phases = BlockPhases::split(total_weeks, block);
    let (phase, offset) = phases.phase_of(week);

    let params = match phase {
        BlockPhase::Accumulation => &block.accumulation,
        BlockPhase::Transmutation => &block.transmutation,
        BlockPhase::Realization => &block.realization,
    };

    let mut point = Prescription::from_phase(params);
    point.percentage = round_half((params.percentage + block.weekly_step * offset as f64).min(100.0));
    point
}

/// Generate the ordered set prescriptions for one exercise slot
///
/// Warm-up sets (if configured) come first; set numbers always run
/// 1..=k. Every returned entry passes `TemplateSetEntry::validate`.
pub fn generate_prescriptions(
    strategy: PeriodizationStrategy,
    slot: &ExerciseSlot,
    total_weeks: u32,
    config: &PeriodizationConfig,
) -> Result<Vec<TemplateSetEntry>> {
    let point = prescription_point(strategy, slot, total_weeks, config)?;
    let mut sets = Vec::with_capacity(config.warmup_sets.saturating_add(point.sets) as usize);

    for i in 1..=config.warmup_sets {
        let fraction = f64::from(i) / (f64::from(config.warmup_sets) + 1.0);
        sets.push(TemplateSetEntry {
            weight: Some(weight_for(point.percentage * fraction, slot.load, config)),
            reps: Some(config.warmup_reps),
            rest_seconds: Some(config.warmup_rest_seconds),
            is_warmup: true,
            ..Default::default()
        });
    }

    for _ in 0..point.sets {
        sets.push(TemplateSetEntry {
            weight: Some(weight_for(point.percentage, slot.load, config)),
            reps: Some(point.reps),
            rir: point.rir,
            rest_seconds: Some(point.rest_seconds),
            tempo: config.tempo.clone(),
            ..Default::default()
        });
    }

    renumber_sets(&mut sets);
    for set in &sets {
        set.validate()?;
    }

    tracing::debug!(
        "Generated {} sets for {} ({} week {}/{} session {}/{}): {} x {} @ {}%",
        sets.len(),
        slot.exercise_id,
        strategy,
        slot.week,
        total_weeks,
        slot.session,
        slot.sessions_per_week,
        point.sets,
        point.reps,
        point.percentage
    );

    Ok(sets)
}

/// Scale a set list by a program week's volume and intensity modifiers
///
/// Volume changes the number of working sets (never below one); warm-ups
/// are untouched. Intensity scales every load, percentages capped at 100.
pub fn apply_week_modifiers(
    sets: &mut Vec<TemplateSetEntry>,
    volume: Option<f64>,
    intensity: Option<f64>,
    config: &PeriodizationConfig,
) -> Result<()> {
    for (label, modifier) in [("volume", volume), ("intensity", intensity)] {
        if let Some(m) = modifier {
            check_modifier(label, m)?;
        }
    }

    if let Some(factor) = volume {
        let warmups = sets.iter().filter(|s| s.is_warmup).count();
        let working = sets.len() - warmups;
        if working > 0 {
            let target = ((working as f64 * factor).round() as usize).max(1);
            if target < working {
                sets.truncate(warmups + target);
            } else if let Some(last) = sets.last().cloned() {
                sets.extend(std::iter::repeat(last).take(target - working));
            }
        }
    }

    if let Some(factor) = intensity {
        for set in sets.iter_mut() {
            set.weight = set.weight.map(|weight| match weight {
                WeightSpec::Percentage { value } => WeightSpec::Percentage {
                    value: round_half(value * factor).clamp(0.5, 100.0),
                },
                WeightSpec::Absolute { value } => WeightSpec::Absolute {
                    value: round_to(value * factor, config.load_increment_kg)
                        .max(config.load_increment_kg),
                },
            });
        }
    }

    renumber_sets(sets);
    Ok(())
}

/// Check a week modifier lies in (0, 2.0]
pub fn check_modifier(label: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 && value <= 2.0 {
        Ok(())
    } else {
        Err(Error::Validation(format!(
            "{} modifier must be in (0, 2.0], got {}",
            label, value
        )))
    }
}

fn weight_for(percentage: f64, load: LoadBasis, config: &PeriodizationConfig) -> WeightSpec {
    match load {
        LoadBasis::Relative => WeightSpec::Percentage {
            value: round_half(percentage).clamp(0.5, 100.0),
        },
        LoadBasis::TrainingMax { kg } => WeightSpec::Absolute {
            value: round_to(kg * percentage / 100.0, config.load_increment_kg)
                .max(config.load_increment_kg),
        },
    }
}

fn lerp(from: f64, to: f64, t: f64) -> f64 {
    from + (to - from) * t
}

fn round_half(value: f64) -> f64 {
    (value * 2.0).round() / 2.0
}

fn round_to(value: f64, increment: f64) -> f64 {
    (value / increment).round() * increment
}
