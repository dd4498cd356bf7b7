//! Pipeline orchestration
//!
//! This module provides the cohort-level entry point. It drives the full run
//! from the master roster to the cohort result file.

use crate::config::{Config, FailurePolicy};
use crate::error::{PipelineError, RosterLoadError};
use crate::metrics::MetricCalculator;
use crate::report::RunLog;
use crate::roster::{RosterReader, RosterRecord};
use crate::subject::SubjectProcessor;
use crate::summary::{save_rows, CohortSummary};
use crate::types::{SubjectId, ValidationWarning};
use crate::{PRODUCER_NAME, VERSION};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use uuid::Uuid;

/// A subject left out of the cohort under `FailurePolicy::SkipSubject`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubjectFailure {
    pub subject_id: SubjectId,
    pub error: String,
}

/// Outcome of one cohort run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub producer: String,
    pub version: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub roster_path: PathBuf,
    pub cohort_path: Option<PathBuf>,
    pub subjects_processed: usize,
    pub subjects_skipped: usize,
    pub failures: Vec<SubjectFailure>,
    pub rows: usize,
    pub subject_files: Vec<PathBuf>,
    pub warnings: Vec<ValidationWarning>,
}

impl RunReport {
    fn start(roster_path: PathBuf) -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            producer: PRODUCER_NAME.to_string(),
            version: VERSION.to_string(),
            started_at: Utc::now(),
            finished_at: None,
            roster_path,
            cohort_path: None,
            subjects_processed: 0,
            subjects_skipped: 0,
            failures: Vec::new(),
            rows: 0,
            subject_files: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn to_json(&self) -> Result<String, PipelineError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Cohort run over every roster record
pub struct DataManager<'a> {
    config: &'a Config,
    log: &'a dyn RunLog,
    calculator: MetricCalculator,
}

impl<'a> DataManager<'a> {
    pub fn new(config: &'a Config, log: &'a dyn RunLog) -> Self {
        Self {
            config,
            log,
            calculator: MetricCalculator::new(),
        }
    }

    /// Retained roster records, in file order
    pub fn load_data(&self) -> Result<Vec<RosterRecord>, RosterLoadError> {
        RosterReader::new(self.config.paths.roster_path(), self.log).get_subjects()
    }

    /// Process records in order and collect their rows.
    ///
    /// Each subject's result file is written as soon as the subject finishes.
    /// Under `FailFast` the first failing subject ends the run with its error.
    pub fn process_all(
        &self,
        records: &[RosterRecord],
        report: &mut RunReport,
    ) -> Result<CohortSummary, PipelineError> {
        let mut cohort = CohortSummary::new();

        for record in records {
            let processor =
                SubjectProcessor::new(record, self.config, &self.calculator, self.log);
            let subject = match processor {
                Some(subject) => subject,
                None => {
                    for warning in record.validate() {
                        self.log.warn(&warning.to_string());
                        report.warnings.push(warning);
                    }
                    report.subjects_skipped += 1;
                    continue;
                }
            };
            report.warnings.extend(subject.warnings().iter().cloned());

            let outcome = subject
                .process()
                .and_then(|summary| subject.save_metrics(&summary).map(|path| (summary, path)));

            match outcome {
                Ok((summary, path)) => {
                    cohort.append(&summary);
                    report.subjects_processed += 1;
                    report.subject_files.push(path);
                }
                Err(e) => match self.config.failure_policy {
                    FailurePolicy::FailFast => {
                        self.log.error(&format!(
                            "Subject {} failed, aborting run: {}",
                            subject.subject_id(),
                            e
                        ));
                        return Err(e);
                    }
                    FailurePolicy::SkipSubject => {
                        self.log.error(&format!(
                            "Subject {} failed, leaving it out: {}",
                            subject.subject_id(),
                            e
                        ));
                        report.failures.push(SubjectFailure {
                            subject_id: subject.subject_id(),
                            error: e.to_string(),
                        });
                    }
                },
            }
        }

        Ok(cohort)
    }

    /// Overwrite the cohort result file
    pub fn save_metrics(&self, cohort: &CohortSummary) -> Result<PathBuf, PipelineError> {
        let path = self.config.paths.cohort_path();
        save_rows(&cohort.rows, &path)?;
        self.log.info(&format!(
            "Saved {} cohort rows to '{}'",
            cohort.len(),
            path.display()
        ));
        Ok(path)
    }

    /// Run the full cohort.
    ///
    /// Pipeline stages:
    /// 1. RosterReader - Load and filter the master roster
    /// 2. SubjectProcessor - Compute and save each subject's rows
    /// 3. CohortSummary - Concatenate rows in roster order and save
    pub fn run(&self) -> Result<RunReport, PipelineError> {
        let mut report = RunReport::start(self.config.paths.roster_path());
        self.log.info(&format!("Starting run {}", report.run_id));

        // Stage 1: Load roster
        let records = self.load_data()?;

        // Stage 2: Process subjects
        let cohort = self.process_all(&records, &mut report)?;

        // Stage 3: Save cohort
        let path = self.save_metrics(&cohort)?;

        report.rows = cohort.len();
        report.cohort_path = Some(path);
        report.finished_at = Some(Utc::now());

        self.log.info(&format!(
            "Run {} finished: {} subjects, {} skipped, {} failed, {} rows",
            report.run_id,
            report.subjects_processed,
            report.subjects_skipped,
            report.failures.len(),
            report.rows
        ));

        Ok(report)
    }
}
