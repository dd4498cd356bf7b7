//! Run configuration
//!
//! All sections have defaults matching the standard experiment folder layout,
//! so a run works with no config file at all. A JSON file can override any
//! subset of fields.

use crate::error::PipelineError;
use crate::types::NominalSpeed;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub paths: PathConfig,
    pub vehicle: VehicleGeometry,
    pub logging: LoggingConfig,
    pub trial_source: TrialSource,
    pub failure_policy: FailurePolicy,
}

impl Config {
    /// Load a JSON config file; missing fields fall back to defaults
    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        let content = fs::read_to_string(path).map_err(|e| {
            PipelineError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(json: &str) -> Result<Self, PipelineError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, PipelineError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Folder and file locations, all relative to `base_dir`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathConfig {
    pub base_dir: PathBuf,
    /// Master roster, relative to `base_dir`
    pub roster: PathBuf,
    /// Folder holding raw trial recordings
    pub simout_dir: PathBuf,
    pub output_dir: PathBuf,
    pub subject_results_dir: PathBuf,
    /// Cohort summary file
    pub cohort_results: PathBuf,
    pub log_dir: PathBuf,
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("."),
            roster: PathBuf::from("config/Subjects_MASTER.csv"),
            simout_dir: PathBuf::from("simout"),
            output_dir: PathBuf::from("output"),
            subject_results_dir: PathBuf::from("output/subject_results"),
            cohort_results: PathBuf::from("output/all_subjects_results.csv"),
            log_dir: PathBuf::from("output/log"),
        }
    }
}

impl PathConfig {
    /// Default layout rooted at `base_dir`
    pub fn rooted_at(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            ..Self::default()
        }
    }

    fn resolve(&self, relative: &Path) -> PathBuf {
        self.base_dir.join(relative)
    }

    pub fn roster_path(&self) -> PathBuf {
        self.resolve(&self.roster)
    }

    pub fn simout_dir_path(&self) -> PathBuf {
        self.resolve(&self.simout_dir)
    }

    pub fn output_dir_path(&self) -> PathBuf {
        self.resolve(&self.output_dir)
    }

    pub fn subject_results_dir_path(&self) -> PathBuf {
        self.resolve(&self.subject_results_dir)
    }

    pub fn log_dir_path(&self) -> PathBuf {
        self.resolve(&self.log_dir)
    }

    pub fn simout_path(&self, file_name: &str) -> PathBuf {
        self.simout_dir_path().join(file_name)
    }

    pub fn subject_results_path(&self, file_name: &str) -> PathBuf {
        self.subject_results_dir_path().join(file_name)
    }

    pub fn cohort_path(&self) -> PathBuf {
        self.resolve(&self.cohort_results)
    }

    pub fn log_path(&self, file_name: &str) -> PathBuf {
        self.log_dir_path().join(file_name)
    }

    /// Sorted `.csv` file names in the trial folder
    pub fn simout_file_names(&self) -> std::io::Result<Vec<String>> {
        csv_file_names(&self.simout_dir_path())
    }

    /// Sorted `.csv` file names in the subject results folder
    pub fn subject_result_file_names(&self) -> std::io::Result<Vec<String>> {
        csv_file_names(&self.subject_results_dir_path())
    }
}

fn csv_file_names(dir: &Path) -> std::io::Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.to_ascii_lowercase().ends_with(".csv") {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}

/// Ego vehicle body geometry (meters)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VehicleGeometry {
    /// Body length
    pub ego_length: f64,
    /// Longitudinal offset of the tracked point from the rear
    pub poi_y: f64,
    /// Body width
    pub ego_width: f64,
}

impl Default for VehicleGeometry {
    fn default() -> Self {
        Self {
            ego_length: 3.99,
            poi_y: 1.931,
            ego_width: 1.70,
        }
    }
}

impl VehicleGeometry {
    /// Distance from the tracked point forward to the front bumper
    pub fn front_offset(&self) -> f64 {
        self.ego_length - self.poi_y
    }

    pub fn half_width(&self) -> f64 {
        self.ego_width / 2.0
    }
}

/// Logging output settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    pub level: String,
    /// Also write cohort runs to a timestamped file under `paths.log_dir`
    pub to_file: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            to_file: false,
        }
    }
}

/// Which recording a subject's order slot is computed from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrialSource {
    /// Every order slot reads the 60 km/h recording
    #[default]
    AlwaysSixty,
    /// Each order slot reads the recording of its own nominal speed
    MatchNominal,
}

impl TrialSource {
    /// Speed whose file name is read for a slot of nominal speed `nominal`
    pub fn file_speed(&self, nominal: NominalSpeed) -> NominalSpeed {
        match self {
            TrialSource::AlwaysSixty => NominalSpeed::Kmh60,
            TrialSource::MatchNominal => nominal,
        }
    }
}

/// What a cohort run does when one subject fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Abort the run; no cohort file is written
    #[default]
    FailFast,
    /// Log the failure, leave the subject out and continue
    SkipSubject,
}
