//! Configuration file support for Periodize.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/periodize/config.toml`.
//! Every section is optional; missing values fall back to defaults.

use crate::schedule::OverlapPolicy;
use crate::types::ExerciseCategory;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Upper bound on generated warm-up sets per exercise
pub const MAX_WARMUP_SETS: u32 = 5;
/// Upper bound on working sets in any configured phase or band
pub const MAX_WORKING_SETS: u32 = 20;
/// Upper bound on reps per set in any configured phase or band
pub const MAX_REPS: u32 = 100;

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub user: UserConfig,

    #[serde(default)]
    pub periodization: PeriodizationConfig,

    #[serde(default)]
    pub schedule: ScheduleConfig,

    #[serde(default)]
    pub catalog: CatalogConfig,
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Identity stamped on programs, templates and scheduled workouts
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UserConfig {
    #[serde(default = "default_owner")]
    pub owner: String,
}

impl Default for UserConfig {
    fn default() -> Self {
        Self {
            owner: default_owner(),
        }
    }
}

/// Sets, reps, load and rest for one point of a progression
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PhaseParams {
    pub sets: u32,
    pub reps: u32,
    /// Working-set percentage of max
    pub percentage: f64,
    pub rest_seconds: u32,
    #[serde(default)]
    pub rir: Option<u8>,
}

impl PhaseParams {
    fn validate(&self, label: &str) -> Result<()> {
        if self.sets == 0 || self.reps == 0 || self.rest_seconds == 0 {
            return Err(Error::Config(format!(
                "{}: sets, reps and rest_seconds must be > 0",
                label
            )));
        }
        check_set_shape(self.sets, self.reps, label)?;
        check_percentage(self.percentage, label)?;
        check_rir(self.rir, label)
    }

    /// Working reps across the phase (sets x reps)
    pub fn volume(&self) -> u64 {
        u64::from(self.sets) * u64::from(self.reps)
    }
}

/// Volume shape of one linear band (intensity is interpolated separately)
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct VolumeBand {
    pub sets: u32,
    pub reps: u32,
    pub rest_seconds: u32,
    #[serde(default)]
    pub rir: Option<u8>,
}

impl VolumeBand {
    fn validate(&self, label: &str) -> Result<()> {
        if self.sets == 0 || self.reps == 0 || self.rest_seconds == 0 {
            return Err(Error::Config(format!(
                "{}: sets, reps and rest_seconds must be > 0",
                label
            )));
        }
        check_set_shape(self.sets, self.reps, label)?;
        check_rir(self.rir, label)
    }

    /// Working reps across the band (sets x reps)
    pub fn volume(&self) -> u64 {
        u64::from(self.sets) * u64::from(self.reps)
    }
}

/// Linear periodization: three volume bands, intensity ramps start -> peak
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LinearConfig {
    pub start_percentage: f64,
    pub peak_percentage: f64,
    pub moderate: VolumeBand,
    pub reduced: VolumeBand,
    pub minimal: VolumeBand,
}

impl Default for LinearConfig {
    fn default() -> Self {
        Self {
            start_percentage: 67.5,
            peak_percentage: 90.0,
            moderate: VolumeBand {
                sets: 4,
                reps: 10,
                rest_seconds: 90,
                rir: Some(3),
            },
            reduced: VolumeBand {
                sets: 4,
                reps: 6,
                rest_seconds: 150,
                rir: Some(2),
            },
            minimal: VolumeBand {
                sets: 3,
                reps: 3,
                rest_seconds: 210,
                rir: Some(1),
            },
        }
    }
}

/// Daily undulating periodization: first session of the week sits at the
/// volume end, the last at the intensity end
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct UndulatingConfig {
    pub volume: PhaseParams,
    pub intensity: PhaseParams,
}

impl Default for UndulatingConfig {
    fn default() -> Self {
        Self {
            volume: PhaseParams {
                sets: 4,
                reps: 10,
                percentage: 65.0,
                rest_seconds: 90,
                rir: Some(3),
            },
            intensity: PhaseParams {
                sets: 5,
                reps: 3,
                percentage: 85.0,
                rest_seconds: 210,
                rir: Some(1),
            },
        }
    }
}

/// Block periodization: accumulation, transmutation, realization
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BlockConfig {
    /// Fraction of the program spent accumulating (floored, at least one week)
    pub accumulation_share: f64,
    /// Fraction of the program spent in transmutation (rounded)
    pub transmutation_share: f64,
    /// Percentage added per week inside a phase
    pub weekly_step: f64,
    pub accumulation: PhaseParams,
    pub transmutation: PhaseParams,
    pub realization: PhaseParams,
}

impl Default for BlockConfig {
    fn default() -> Self {
        Self {
            accumulation_share: 0.5,
            transmutation_share: 0.33,
            weekly_step: 2.5,
            accumulation: PhaseParams {
                sets: 5,
                reps: 10,
                percentage: 65.0,
                rest_seconds: 90,
                rir: Some(3),
            },
            transmutation: PhaseParams {
                sets: 4,
                reps: 6,
                percentage: 77.5,
                rest_seconds: 150,
                rir: Some(2),
            },
            realization: PhaseParams {
                sets: 3,
                reps: 2,
                percentage: 90.0,
                rest_seconds: 240,
                rir: Some(1),
            },
        }
    }
}

/// Tunables for prescription generation
///
/// Passed explicitly into `generate_prescriptions`; nothing reads it from
/// global state.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PeriodizationConfig {
    /// Absolute loads are rounded to this plate increment
    pub load_increment_kg: f64,
    /// Warm-up sets generated ahead of the working sets
    pub warmup_sets: u32,
    pub warmup_reps: u32,
    pub warmup_rest_seconds: u32,
    /// Tempo stamped on every generated working set
    pub tempo: Option<String>,
    /// Prescription used when a program is a single week long
    pub single_week: PhaseParams,
    pub linear: LinearConfig,
    pub undulating: UndulatingConfig,
    pub block: BlockConfig,
}

impl Default for PeriodizationConfig {
    fn default() -> Self {
        Self {
            load_increment_kg: 2.5,
            warmup_sets: 0,
            warmup_reps: 5,
            warmup_rest_seconds: 60,
            tempo: None,
            single_week: PhaseParams {
                sets: 3,
                reps: 5,
                percentage: 75.0,
                rest_seconds: 180,
                rir: Some(2),
            },
            linear: LinearConfig::default(),
            undulating: UndulatingConfig::default(),
            block: BlockConfig::default(),
        }
    }
}

impl PeriodizationConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.load_increment_kg.is_finite() && self.load_increment_kg > 0.0) {
            return Err(Error::Config("load_increment_kg must be > 0".into()));
        }
        if self.warmup_sets > MAX_WARMUP_SETS {
            return Err(Error::Config(format!(
                "warmup_sets must be at most {}, got {}",
                MAX_WARMUP_SETS, self.warmup_sets
            )));
        }
        if self.warmup_sets > 0 && (self.warmup_reps == 0 || self.warmup_rest_seconds == 0) {
            return Err(Error::Config(
                "warmup_reps and warmup_rest_seconds must be > 0 when warm-ups are enabled".into(),
            ));
        }

        self.single_week.validate("periodization.single_week")?;

        let linear = &self.linear;
        check_percentage(linear.start_percentage, "periodization.linear.start_percentage")?;
        check_percentage(linear.peak_percentage, "periodization.linear.peak_percentage")?;
        if linear.peak_percentage <= linear.start_percentage {
            return Err(Error::Config(
                "periodization.linear: peak_percentage must exceed start_percentage".into(),
            ));
        }
        linear.moderate.validate("periodization.linear.moderate")?;
        linear.reduced.validate("periodization.linear.reduced")?;
        linear.minimal.validate("periodization.linear.minimal")?;
        let (moderate, reduced, minimal) = (
            linear.moderate.volume(),
            linear.reduced.volume(),
            linear.minimal.volume(),
        );
        if !(moderate >= reduced && reduced >= minimal && moderate > minimal) {
            return Err(Error::Config(format!(
                "periodization.linear: volume must fall from moderate to minimal, got {} / {} / {}",
                moderate, reduced, minimal
            )));
        }

        self.undulating.volume.validate("periodization.undulating.volume")?;
        self.undulating
            .intensity
            .validate("periodization.undulating.intensity")?;

        let block = &self.block;
        let shares_ok = block.accumulation_share > 0.0
            && block.transmutation_share >= 0.0
            && block.accumulation_share + block.transmutation_share < 1.0;
        if !shares_ok {
            return Err(Error::Config(
                "periodization.block: shares must be positive and sum to less than 1".into(),
            ));
        }
        if !(block.weekly_step.is_finite() && block.weekly_step >= 0.0) {
            return Err(Error::Config(
                "periodization.block.weekly_step must be >= 0".into(),
            ));
        }
        block.accumulation.validate("periodization.block.accumulation")?;
        block.transmutation.validate("periodization.block.transmutation")?;
        block.realization.validate("periodization.block.realization")?;
        if block.accumulation.volume() <= block.realization.volume() {
            return Err(Error::Config(format!(
                "periodization.block: accumulation volume ({}) must exceed realization volume ({})",
                block.accumulation.volume(),
                block.realization.volume()
            )));
        }

        Ok(())
    }
}

/// Schedule materialization policy
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct ScheduleConfig {
    #[serde(default)]
    pub overlap_policy: OverlapPolicy,
}

/// Custom exercise definition
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CustomExercise {
    pub id: String,
    pub name: String,
    #[serde(default = "default_custom_category")]
    pub category: ExerciseCategory,
    pub url: Option<String>,
}

/// Exercise catalog configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct CatalogConfig {
    #[serde(default)]
    pub custom: Vec<CustomExercise>,
}

fn check_percentage(value: f64, label: &str) -> Result<()> {
    if value.is_finite() && value > 0.0 && value <= 100.0 {
        Ok(())
    } else {
        Err(Error::Config(format!(
            "{}: percentage must be in (0, 100], got {}",
            label, value
        )))
    }
}

fn check_set_shape(sets: u32, reps: u32, label: &str) -> Result<()> {
    if sets > MAX_WORKING_SETS || reps > MAX_REPS {
        return Err(Error::Config(format!(
            "{}: at most {} sets of {} reps, got {} x {}",
            label, MAX_WORKING_SETS, MAX_REPS, sets, reps
        )));
    }
    Ok(())
}

fn check_rir(rir: Option<u8>, label: &str) -> Result<()> {
    match rir {
        Some(r) if r > 5 => Err(Error::Config(format!(
            "{}: rir must be 0-5, got {}",
            label, r
        ))),
        _ => Ok(()),
    }
}

// Default value functions
fn home_dir_fallback() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
}

fn default_data_dir() -> PathBuf {
    let base = dirs::data_local_dir().unwrap_or_else(|| home_dir_fallback().join(".local/share"));
    base.join("periodize")
}

fn default_owner() -> String {
    "local".into()
}

fn default_custom_category() -> ExerciseCategory {
    ExerciseCategory::Accessory
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::info!(
                "No config file found at {:?}, using defaults",
                config_path
            );
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Check cross-field constraints serde cannot express
    pub fn validate(&self) -> Result<()> {
        if self.user.owner.trim().is_empty() {
            return Err(Error::Config("user.owner must not be empty".into()));
        }
        for custom in &self.catalog.custom {
            if custom.id.trim().is_empty() || custom.name.trim().is_empty() {
                return Err(Error::Config(
                    "catalog.custom entries need a non-empty id and name".into(),
                ));
            }
        }
        self.periodization.validate()
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        let base = dirs::config_dir().unwrap_or_else(|| home_dir_fallback().join(".config"));
        base.join("periodize").join("config.toml")
    }

    /// Save the current configuration to the default path
    pub fn save(&self) -> Result<()> {
        let config_path = Self::default_config_path();
        self.save_to(&config_path)
    }

    /// Save the current configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }
}
