//! Single-trial processing
//!
//! A `TrialProcessor` owns one recording: it loads the series, derives the
//! sample interval and the front-left corner of the ego body, and reduces the
//! series to a one-row `TrialSummary`.

use crate::config::{Config, VehicleGeometry};
use crate::error::TrialLoadError;
use crate::metrics::MetricCalculator;
use crate::report::RunLog;
use crate::series::TrialSeries;
use crate::summary::TrialSummary;
use crate::types::{parse_integral, NominalSpeed, SubjectId};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Processor for one trial recording
pub struct TrialProcessor<'a> {
    calculator: &'a MetricCalculator,
    log: &'a dyn RunLog,
    path: PathBuf,
    file_name: String,
    nominal: NominalSpeed,
    condition: Option<String>,
    series: TrialSeries,
    dt: f64,
}

impl<'a> TrialProcessor<'a> {
    /// Load `file_name` from the configured trial folder.
    ///
    /// Fails if no file name is given, the file is missing or unparsable, or
    /// the series does not yield a positive sample interval.
    pub fn new(
        config: &Config,
        calculator: &'a MetricCalculator,
        file_name: Option<&str>,
        nominal: NominalSpeed,
        condition: Option<String>,
        log: &'a dyn RunLog,
    ) -> Result<Self, TrialLoadError> {
        let file_name = match file_name {
            Some(name) => name,
            None => {
                log.error(&format!("No trial file name for the {} km/h trial", nominal));
                return Err(TrialLoadError::MissingFileName);
            }
        };

        let path = config.paths.simout_path(file_name);
        log.debug(&format!("Loading trial file '{}'", path.display()));

        let series = TrialSeries::load(&path).map_err(|e| {
            log.error(&format!("Failed to load trial '{}': {}", file_name, e));
            e
        })?;

        Self::from_series(
            &config.vehicle,
            calculator,
            file_name,
            &path,
            series,
            nominal,
            condition,
            log,
        )
    }

    /// Build a processor around an already loaded series
    #[allow(clippy::too_many_arguments)]
    pub fn from_series(
        geometry: &VehicleGeometry,
        calculator: &'a MetricCalculator,
        file_name: &str,
        path: &Path,
        mut series: TrialSeries,
        nominal: NominalSpeed,
        condition: Option<String>,
        log: &'a dyn RunLog,
    ) -> Result<Self, TrialLoadError> {
        let dt = match series.sample_interval() {
            Some(dt) => dt,
            None => {
                log.error(&format!(
                    "Trial '{}' has {} samples, cannot derive dt",
                    file_name,
                    series.len()
                ));
                return Err(TrialLoadError::InsufficientSamples {
                    path: path.to_path_buf(),
                    count: series.len(),
                });
            }
        };
        if !(dt.is_finite() && dt > 0.0) {
            log.error(&format!("Trial '{}' has non-positive dt={}", file_name, dt));
            return Err(TrialLoadError::NonPositiveInterval {
                path: path.to_path_buf(),
                dt,
            });
        }

        add_ego_corner_coordinates(&mut series, geometry);
        log.debug(&format!(
            "Loaded trial '{}': {} samples, dt={}",
            file_name,
            series.len(),
            dt
        ));

        Ok(Self {
            calculator,
            log,
            path: path.to_path_buf(),
            file_name: file_name.to_string(),
            nominal,
            condition,
            series,
            dt,
        })
    }

    /// Compute the trial's summary row.
    ///
    /// Identity tags (experiment number, subject, date) are left empty for
    /// the owning subject to fill in.
    pub fn process(&mut self) -> TrialSummary {
        let average_velocity = self.calculator.average_velocity(&self.series);
        let total_mileage = self.calculator.total_mileage(self.dt, &mut self.series);
        let pedals = self.calculator.sum_brake_and_gas(self.dt, &mut self.series);

        self.log.debug(&format!(
            "Trial '{}' ({} km/h): v_avg={:.3}, mileage={:.3}",
            self.file_name, self.nominal, average_velocity, total_mileage
        ));

        TrialSummary {
            simout_file: self.file_name.clone(),
            experiment_condition: self.condition.clone(),
            average_velocity,
            total_mileage,
            brake_out_sum: pedals.brake_out_sum,
            gas_out_sum: pedals.gas_out_sum,
            experiment_number: None,
            subject_id: None,
            experiment_date: None,
        }
    }

    pub fn nominal(&self) -> NominalSpeed {
        self.nominal
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn dt(&self) -> f64 {
        self.dt
    }

    pub fn series(&self) -> &TrialSeries {
        &self.series
    }
}

/// Add the front-left corner of the ego body to the series.
///
/// ```text
/// x_fl = x + (L - PoI_y) cos(psi) - (W / 2) sin(psi)
/// y_fl = y + (L - PoI_y) sin(psi) + (W / 2) cos(psi)
/// ```
pub fn add_ego_corner_coordinates(series: &mut TrialSeries, geometry: &VehicleGeometry) {
    let forward = geometry.front_offset();
    let half_width = geometry.half_width();

    let (xs, ys): (Vec<f64>, Vec<f64>) = series
        .ego_x
        .iter()
        .zip(&series.ego_y)
        .zip(&series.psi)
        .map(|((x, y), psi)| {
            let (sin, cos) = psi.sin_cos();
            (
                x + forward * cos - half_width * sin,
                y + forward * sin + half_width * cos,
            )
        })
        .unzip();

    series.front_left_x = Some(xs);
    series.front_left_y = Some(ys);
}

/// Metadata encoded in a recording's file name:
/// `{prefix}_{subject}_{speed}_{condition}[_...].csv`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrialFileName {
    pub file_name: String,
    pub subject_id: SubjectId,
    /// Speed as written in the file name
    pub recorded_speed: u32,
    pub condition: String,
}

impl TrialFileName {
    /// Parse a file name; `None` if it does not follow the naming scheme
    pub fn parse(file_name: &str) -> Option<Self> {
        let stem = Path::new(file_name).file_stem()?.to_str()?;
        let parts: Vec<&str> = stem.split('_').collect();
        if parts.len() < 4 {
            return None;
        }
        let subject_id = parts[1].parse::<SubjectId>().ok()?;
        let recorded_speed = u32::try_from(parse_integral(parts[2])?).ok()?;
        let condition = parts[3].trim();
        if condition.is_empty() {
            return None;
        }

        Some(Self {
            file_name: file_name.to_string(),
            subject_id,
            recorded_speed,
            condition: condition.to_string(),
        })
    }

    /// Nominal speed of the recording; 70 km/h runs count as the 60 km/h trial
    pub fn nominal(&self) -> Option<NominalSpeed> {
        NominalSpeed::from_recorded_kmh(u64::from(self.recorded_speed))
    }
}

/// Group parseable file names by subject; unparseable names are returned apart
pub fn group_by_subject<S: AsRef<str>>(
    file_names: &[S],
) -> (BTreeMap<SubjectId, Vec<TrialFileName>>, Vec<String>) {
    let mut grouped: BTreeMap<SubjectId, Vec<TrialFileName>> = BTreeMap::new();
    let mut unmatched = Vec::new();
    for name in file_names {
        match TrialFileName::parse(name.as_ref()) {
            Some(parsed) => grouped.entry(parsed.subject_id).or_default().push(parsed),
            None => unmatched.push(name.as_ref().to_string()),
        }
    }
    (grouped, unmatched)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PathConfig;
    use crate::report::{Level, MemoryLog};
    use crate::series::Sample;
    use std::f64::consts::FRAC_PI_2;
    use std::fs;

    fn two_sample_series(v: f64) -> TrialSeries {
        TrialSeries::from_samples(&[
            Sample {
                time: 0.0,
                ego_v: v,
                ..Default::default()
            },
            Sample {
                time: 0.1,
                ego_v: v,
                ..Default::default()
            },
        ])
    }

    #[test]
    fn test_corner_at_zero_heading() {
        let mut series = TrialSeries::from_samples(&[Sample {
            ego_x: 10.0,
            ego_y: 5.0,
            ..Default::default()
        }]);
        let geometry = VehicleGeometry::default();
        add_ego_corner_coordinates(&mut series, &geometry);

        let x = series.front_left_x.unwrap()[0];
        let y = series.front_left_y.unwrap()[0];
        assert!((x - (10.0 + 2.059)).abs() < 1e-9);
        assert!((y - (5.0 + 0.85)).abs() < 1e-9);
    }

    #[test]
    fn test_corner_at_quarter_turn() {
        let mut series = TrialSeries::from_samples(&[Sample {
            psi: FRAC_PI_2,
            ..Default::default()
        }]);
        add_ego_corner_coordinates(&mut series, &VehicleGeometry::default());

        // heading +y: forward offset moves y, left is -x
        let x = series.front_left_x.unwrap()[0];
        let y = series.front_left_y.unwrap()[0];
        assert!((x + 0.85).abs() < 1e-9);
        assert!((y - 2.059).abs() < 1e-9);
    }

    #[test]
    fn test_process_two_samples() {
        let log = MemoryLog::new();
        let calc = MetricCalculator::new();
        let mut processor = TrialProcessor::from_series(
            &VehicleGeometry::default(),
            &calc,
            "sim_01_60_A.csv",
            Path::new("sim_01_60_A.csv"),
            two_sample_series(10.0),
            NominalSpeed::Kmh60,
            Some("A".to_string()),
            &log,
        )
        .unwrap();

        assert!((processor.dt() - 0.1).abs() < 1e-12);
        let summary = processor.process();
        assert_eq!(summary.simout_file, "sim_01_60_A.csv");
        assert_eq!(summary.experiment_condition.as_deref(), Some("A"));
        assert!((summary.average_velocity - 10.0).abs() < 1e-12);
        assert!((summary.total_mileage - 2.0).abs() < 1e-9);
        assert_eq!(summary.brake_out_sum, 0.0);
        assert_eq!(summary.gas_out_sum, 0.0);
        assert_eq!(summary.experiment_number, None);
        assert!(processor.series().velocity_times_dt.is_some());
        assert!(processor.series().front_left_x.is_some());
    }

    #[test]
    fn test_rejects_single_sample() {
        let log = MemoryLog::new();
        let calc = MetricCalculator::new();
        let series = TrialSeries::from_samples(&[Sample::default()]);
        let result = TrialProcessor::from_series(
            &VehicleGeometry::default(),
            &calc,
            "one.csv",
            Path::new("one.csv"),
            series,
            NominalSpeed::Kmh50,
            None,
            &log,
        );
        assert!(matches!(result, Err(TrialLoadError::InsufficientSamples { count: 1, .. })));
        assert_eq!(log.messages(Level::Error).len(), 1);
    }

    #[test]
    fn test_rejects_non_positive_dt() {
        let log = MemoryLog::new();
        let calc = MetricCalculator::new();
        let series = TrialSeries::from_samples(&[Sample::default(), Sample::default()]);
        let result = TrialProcessor::from_series(
            &VehicleGeometry::default(),
            &calc,
            "dup.csv",
            Path::new("dup.csv"),
            series,
            NominalSpeed::Kmh40,
            None,
            &log,
        );
        assert!(matches!(result, Err(TrialLoadError::NonPositiveInterval { .. })));
    }

    #[test]
    fn test_new_loads_from_simout_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            paths: PathConfig::rooted_at(dir.path()),
            ..Default::default()
        };
        fs::create_dir_all(config.paths.simout_dir_path()).unwrap();
        fs::write(
            config.paths.simout_path("t.csv"),
            "simout1,simout2,simout3,simout4,simout5,simout6,simout7,simout8\n\
             0.0,0,5,0,0,0,1,0\n\
             0.5,0,5,0,0,0,1,0\n",
        )
        .unwrap();

        let log = MemoryLog::new();
        let calc = MetricCalculator::new();
        let mut processor = TrialProcessor::new(
            &config,
            &calc,
            Some("t.csv"),
            NominalSpeed::Kmh60,
            Some("B".to_string()),
            &log,
        )
        .unwrap();
        let summary = processor.process();
        assert!((summary.total_mileage - 5.0).abs() < 1e-9);
        assert!((summary.gas_out_sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_new_missing_file_and_name() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            paths: PathConfig::rooted_at(dir.path()),
            ..Default::default()
        };
        let log = MemoryLog::new();
        let calc = MetricCalculator::new();

        let missing =
            TrialProcessor::new(&config, &calc, Some("nope.csv"), NominalSpeed::Kmh60, None, &log);
        assert!(matches!(missing, Err(TrialLoadError::NotFound { .. })));

        let unnamed = TrialProcessor::new(&config, &calc, None, NominalSpeed::Kmh60, None, &log);
        assert!(matches!(unnamed, Err(TrialLoadError::MissingFileName)));
        assert_eq!(log.messages(Level::Error).len(), 2);
    }

    #[test]
    fn test_parse_file_name() {
        let parsed = TrialFileName::parse("simout_03_50_B.csv").unwrap();
        assert_eq!(parsed.subject_id, SubjectId(3));
        assert_eq!(parsed.recorded_speed, 50);
        assert_eq!(parsed.condition, "B");
        assert_eq!(parsed.nominal(), Some(NominalSpeed::Kmh50));

        let seventy = TrialFileName::parse("simout_03_70_A_retry.csv").unwrap();
        assert_eq!(seventy.condition, "A");
        assert_eq!(seventy.nominal(), Some(NominalSpeed::Kmh60));

        assert_eq!(TrialFileName::parse("notes.csv"), None);
        assert_eq!(TrialFileName::parse("simout_xx_50_B.csv"), None);
    }

    #[test]
    fn test_group_by_subject() {
        let names = ["s_01_60_A.csv", "s_02_60_B.csv", "s_01_50_A.csv", "readme.csv"];
        let (grouped, unmatched) = group_by_subject(&names);

        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped[&SubjectId(1)].len(), 2);
        assert_eq!(unmatched, vec!["readme.csv".to_string()]);
    }
}
