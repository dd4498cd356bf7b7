//! Per-subject processing
//!
//! Maps each filled order slot of a roster record to a trial, runs one
//! `TrialProcessor` per slot and tags the resulting rows with the subject's
//! identity. Which recording a slot reads is decided by `TrialSource`.

use crate::config::Config;
use crate::error::PipelineError;
use crate::metrics::MetricCalculator;
use crate::report::RunLog;
use crate::roster::RosterRecord;
use crate::summary::{save_rows, SubjectSummary};
use crate::trial::TrialProcessor;
use crate::types::{NominalSpeed, OrderSlot, SubjectId, ValidationWarning};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Processor for one roster record
pub struct SubjectProcessor<'a> {
    config: &'a Config,
    calculator: &'a MetricCalculator,
    log: &'a dyn RunLog,
    record: RosterRecord,
    subject_id: SubjectId,
    experiments: BTreeMap<OrderSlot, NominalSpeed>,
    warnings: Vec<ValidationWarning>,
}

impl<'a> SubjectProcessor<'a> {
    /// Returns `None` for a record without a subject id.
    ///
    /// Missing file names, condition or duplicate selections are logged as
    /// warnings and kept in `warnings()`; they do not stop construction.
    pub fn new(
        record: &RosterRecord,
        config: &'a Config,
        calculator: &'a MetricCalculator,
        log: &'a dyn RunLog,
    ) -> Option<Self> {
        let subject_id = record.subject_id?;
        let warnings = record.validate();
        for warning in &warnings {
            log.warn(&warning.to_string());
        }

        let experiments = record.experiments();
        log.debug(&format!(
            "Subject {}: {} of {} order slots filled",
            subject_id,
            experiments.len(),
            OrderSlot::ALL.len()
        ));

        Some(Self {
            config,
            calculator,
            log,
            record: record.clone(),
            subject_id,
            experiments,
            warnings,
        })
    }

    pub fn subject_id(&self) -> SubjectId {
        self.subject_id
    }

    pub fn experiments(&self) -> &BTreeMap<OrderSlot, NominalSpeed> {
        &self.experiments
    }

    pub fn warnings(&self) -> &[ValidationWarning] {
        &self.warnings
    }

    /// Order number of the first slot that drove `speed`
    pub fn experiment_number(&self, speed: NominalSpeed) -> Option<u8> {
        self.experiments
            .iter()
            .find(|(_, s)| **s == speed)
            .map(|(slot, _)| slot.number())
    }

    /// Run every filled order slot, in slot order.
    ///
    /// The first trial that fails to load aborts the subject.
    pub fn process(&self) -> Result<SubjectSummary, PipelineError> {
        let mut rows = Vec::with_capacity(self.experiments.len());

        for (slot, nominal) in &self.experiments {
            let file_speed = self.config.trial_source.file_speed(*nominal);
            let file_name = self.record.file_name(file_speed);
            self.log.debug(&format!(
                "Subject {} slot {}: {} km/h trial from the {} km/h file",
                self.subject_id, slot, nominal, file_speed
            ));

            let mut trial = TrialProcessor::new(
                self.config,
                self.calculator,
                file_name,
                *nominal,
                self.record.experiment_condition.clone(),
                self.log,
            )
            .map_err(|e| {
                self.log.error(&format!(
                    "Subject {} slot {} failed: {}",
                    self.subject_id, slot, e
                ));
                e
            })?;

            let mut row = trial.process();
            row.experiment_number = self.experiment_number(trial.nominal());
            row.subject_id = Some(self.subject_id);
            row.experiment_date = self.record.experiment_date.clone();
            rows.push(row);
        }

        self.log.info(&format!(
            "Subject {}: {} trials processed",
            self.subject_id,
            rows.len()
        ));

        Ok(SubjectSummary {
            subject_id: self.subject_id,
            experiment_date: self.record.experiment_date.clone(),
            rows,
        })
    }

    /// Overwrite `{date}_{id:02}.csv` in the subject results folder
    pub fn save_metrics(&self, summary: &SubjectSummary) -> Result<PathBuf, PipelineError> {
        let file_name = summary.file_name()?;
        let path = self.config.paths.subject_results_path(&file_name);
        save_rows(&summary.rows, &path)?;
        self.log.info(&format!(
            "Saved subject {} results to '{}'",
            summary.subject_id,
            path.display()
        ));
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PathConfig, TrialSource};
    use crate::error::TrialLoadError;
    use crate::report::{Level, MemoryLog};
    use crate::schema::{ColumnSchema, ResultSchema};
    use crate::summary::CohortSummary;
    use pretty_assertions::assert_eq;
    use std::fs;
    use std::path::Path;

    const TRIAL_HEADER: &str = "simout1,simout2,simout3,simout4,simout5,simout6,simout7,simout8";

    fn write_trial(dir: &Path, name: &str, v: f64) {
        let simout = dir.join("simout");
        fs::create_dir_all(&simout).unwrap();
        let body = format!(
            "{TRIAL_HEADER}\n0.0,0.0,{v},0.0,0.0,0.0,0.0,0.0\n0.1,0.0,{v},1.0,0.0,0.0,0.0,0.0\n"
        );
        fs::write(simout.join(name), body).unwrap();
    }

    fn record() -> RosterRecord {
        RosterRecord {
            row: 1,
            subject_id: Some(SubjectId(3)),
            subject_name: Some("Carol".to_string()),
            experiment_date: Some("20240115".to_string()),
            file_name_60: Some("s_03_60_A.csv".to_string()),
            file_name_50: Some("s_03_50_A.csv".to_string()),
            file_name_40: Some("s_03_40_A.csv".to_string()),
            experiment_condition: Some("A".to_string()),
            experiment_1: Some(NominalSpeed::Kmh60),
            experiment_2: Some(NominalSpeed::Kmh50),
            experiment_3: Some(NominalSpeed::Kmh40),
            invalid_cells: Vec::new(),
        }
    }

    fn config(dir: &Path) -> Config {
        Config {
            paths: PathConfig::rooted_at(dir),
            ..Config::default()
        }
    }

    #[test]
    fn test_three_slots_read_the_60_file() {
        let dir = tempfile::tempdir().unwrap();
        write_trial(dir.path(), "s_03_60_A.csv", 10.0);
        let config = config(dir.path());
        let log = MemoryLog::new();
        let calc = MetricCalculator::new();

        let subject = SubjectProcessor::new(&record(), &config, &calc, &log).unwrap();
        let summary = subject.process().unwrap();

        assert_eq!(summary.len(), 3);
        let numbers: Vec<Option<u8>> = summary.rows.iter().map(|r| r.experiment_number).collect();
        assert_eq!(numbers, vec![Some(1), Some(2), Some(3)]);
        for row in &summary.rows {
            assert_eq!(row.simout_file, "s_03_60_A.csv");
            assert!((row.average_velocity - 10.0).abs() < 1e-12);
            assert!((row.total_mileage - 2.0).abs() < 1e-9);
            assert_eq!(row.brake_out_sum, 0.0);
            assert_eq!(row.gas_out_sum, 0.0);
            assert_eq!(row.subject_id, Some(SubjectId(3)));
            assert_eq!(row.experiment_date.as_deref(), Some("20240115"));
            assert_eq!(row.experiment_condition.as_deref(), Some("A"));
        }
        assert!(subject.warnings().is_empty());
    }

    #[test]
    fn test_match_nominal_reads_each_file() {
        let dir = tempfile::tempdir().unwrap();
        write_trial(dir.path(), "s_03_60_A.csv", 16.0);
        write_trial(dir.path(), "s_03_50_A.csv", 14.0);
        write_trial(dir.path(), "s_03_40_A.csv", 11.0);
        let config = Config {
            trial_source: TrialSource::MatchNominal,
            ..config(dir.path())
        };
        let log = MemoryLog::new();
        let calc = MetricCalculator::new();

        let mut rec = record();
        rec.experiment_1 = Some(NominalSpeed::Kmh40);
        rec.experiment_3 = Some(NominalSpeed::Kmh60);
        let summary = SubjectProcessor::new(&rec, &config, &calc, &log)
            .unwrap()
            .process()
            .unwrap();

        let files: Vec<&str> = summary.rows.iter().map(|r| r.simout_file.as_str()).collect();
        assert_eq!(files, vec!["s_03_40_A.csv", "s_03_50_A.csv", "s_03_60_A.csv"]);
        assert!((summary.rows[0].average_velocity - 11.0).abs() < 1e-12);
    }

    #[test]
    fn test_missing_slot_yields_two_rows() {
        let dir = tempfile::tempdir().unwrap();
        write_trial(dir.path(), "s_03_60_A.csv", 10.0);
        let config = config(dir.path());
        let log = MemoryLog::new();
        let calc = MetricCalculator::new();

        let mut rec = record();
        rec.experiment_2 = None;
        let summary = SubjectProcessor::new(&rec, &config, &calc, &log)
            .unwrap()
            .process()
            .unwrap();

        assert_eq!(summary.len(), 2);
        let numbers: Vec<Option<u8>> = summary.rows.iter().map(|r| r.experiment_number).collect();
        assert_eq!(numbers, vec![Some(1), Some(3)]);
    }

    #[test]
    fn test_experiment_number_first_match() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let log = MemoryLog::new();
        let calc = MetricCalculator::new();

        let mut rec = record();
        rec.experiment_2 = Some(NominalSpeed::Kmh60);
        rec.experiment_3 = None;
        let subject = SubjectProcessor::new(&rec, &config, &calc, &log).unwrap();

        assert_eq!(subject.experiment_number(NominalSpeed::Kmh60), Some(1));
        assert_eq!(subject.experiment_number(NominalSpeed::Kmh40), None);
        assert!(subject
            .warnings()
            .contains(&ValidationWarning::DuplicateOrder {
                subject: SubjectId(3),
                speed: NominalSpeed::Kmh60,
            }));
    }

    #[test]
    fn test_missing_subject_id_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let log = MemoryLog::new();
        let calc = MetricCalculator::new();

        let mut rec = record();
        rec.subject_id = None;
        assert!(SubjectProcessor::new(&rec, &config, &calc, &log).is_none());
    }

    #[test]
    fn test_missing_file_propagates_trial_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let log = MemoryLog::new();
        let calc = MetricCalculator::new();

        let result = SubjectProcessor::new(&record(), &config, &calc, &log)
            .unwrap()
            .process();

        assert!(matches!(
            result,
            Err(PipelineError::TrialLoad(TrialLoadError::NotFound { .. }))
        ));
        assert!(!log.messages(Level::Error).is_empty());
    }

    #[test]
    fn test_missing_file_name_warns_then_fails() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            trial_source: TrialSource::MatchNominal,
            ..config(dir.path())
        };
        write_trial(dir.path(), "s_03_60_A.csv", 10.0);
        let log = MemoryLog::new();
        let calc = MetricCalculator::new();

        let mut rec = record();
        rec.file_name_50 = None;
        let subject = SubjectProcessor::new(&rec, &config, &calc, &log).unwrap();
        assert_eq!(log.messages(Level::Warn), vec!["Subject 3: file_name_50 is missing"]);

        let result = subject.process();
        assert!(matches!(
            result,
            Err(PipelineError::TrialLoad(TrialLoadError::MissingFileName))
        ));
    }

    #[test]
    fn test_save_metrics_names_and_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        write_trial(dir.path(), "s_03_60_A.csv", 10.0);
        let config = config(dir.path());
        let log = MemoryLog::new();
        let calc = MetricCalculator::new();

        let subject = SubjectProcessor::new(&record(), &config, &calc, &log).unwrap();
        let summary = subject.process().unwrap();
        let path = subject.save_metrics(&summary).unwrap();
        assert_eq!(
            path,
            dir.path().join("output/subject_results/20240115_03.csv")
        );

        let shorter = SubjectSummary {
            rows: summary.rows[..1].to_vec(),
            ..summary.clone()
        };
        subject.save_metrics(&shorter).unwrap();
        assert_eq!(CohortSummary::load(&path).unwrap().len(), 1);
    }

    #[test]
    fn test_save_metrics_requires_date() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let log = MemoryLog::new();
        let calc = MetricCalculator::new();

        let subject = SubjectProcessor::new(&record(), &config, &calc, &log).unwrap();
        let undated = SubjectSummary {
            subject_id: SubjectId(3),
            experiment_date: None,
            rows: vec![],
        };
        assert!(matches!(
            subject.save_metrics(&undated),
            Err(PipelineError::MissingExperimentDate { .. })
        ));
    }

    #[test]
    fn test_no_filled_slots_saves_header_only() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let log = MemoryLog::new();
        let calc = MetricCalculator::new();

        let mut rec = record();
        rec.experiment_1 = None;
        rec.experiment_2 = None;
        rec.experiment_3 = None;
        let subject = SubjectProcessor::new(&rec, &config, &calc, &log).unwrap();
        let summary = subject.process().unwrap();
        assert_eq!(summary.len(), 0);

        let path = subject.save_metrics(&summary).unwrap();
        assert_eq!(
            path,
            dir.path().join("output/subject_results/20240115_03.csv")
        );
        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.trim(), ResultSchema::columns().join(","));
    }

    #[test]
    fn test_save_metrics_rejects_path_like_date() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let log = MemoryLog::new();
        let calc = MetricCalculator::new();

        let subject = SubjectProcessor::new(&record(), &config, &calc, &log).unwrap();
        let escaping = SubjectSummary {
            subject_id: SubjectId(3),
            experiment_date: Some("../x".to_string()),
            rows: vec![],
        };
        assert!(matches!(
            subject.save_metrics(&escaping),
            Err(PipelineError::InvalidExperimentDate { .. })
        ));
        assert!(!dir.path().join("output/x_03.csv").exists());
    }
}
