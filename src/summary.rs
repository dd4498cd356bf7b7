//! Summary rows and result files
//!
//! A `TrialSummary` is one row of a result file. Subject and cohort summaries
//! are ordered concatenations of those rows and share one CSV layout
//! (`ResultSchema`).

use crate::error::PipelineError;
use crate::schema::{ColumnSchema, ResultSchema};
use crate::types::SubjectId;
use csv::{ReaderBuilder, WriterBuilder};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

/// Metrics of one trial, plus the identity tags added by its subject
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialSummary {
    pub simout_file: String,
    pub experiment_condition: Option<String>,
    pub average_velocity: f64,
    pub total_mileage: f64,
    #[serde(rename = "Brake_Out_sum")]
    pub brake_out_sum: f64,
    #[serde(rename = "Gas_Out_sum")]
    pub gas_out_sum: f64,
    pub experiment_number: Option<u8>,
    pub subject_id: Option<SubjectId>,
    pub experiment_date: Option<String>,
}

/// All trial rows of one subject, in order-slot order
#[derive(Debug, Clone, PartialEq)]
pub struct SubjectSummary {
    pub subject_id: SubjectId,
    pub experiment_date: Option<String>,
    pub rows: Vec<TrialSummary>,
}

impl SubjectSummary {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Result file name: `{date}_{subject id padded to 2}.csv`
    ///
    /// The date must be plain digits so the name stays inside the output
    /// directory.
    pub fn file_name(&self) -> Result<String, PipelineError> {
        let date = self.experiment_date.as_deref().ok_or_else(|| {
            PipelineError::MissingExperimentDate {
                subject: self.subject_id.to_string(),
            }
        })?;
        if date.is_empty() || !date.bytes().all(|b| b.is_ascii_digit()) {
            return Err(PipelineError::InvalidExperimentDate {
                subject: self.subject_id.to_string(),
                date: date.to_string(),
            });
        }
        Ok(format!("{}_{}.csv", date, self.subject_id.padded()))
    }
}

/// All subjects' rows in roster encounter order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CohortSummary {
    pub rows: Vec<TrialSummary>,
}

impl CohortSummary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a fully processed subject
    pub fn append(&mut self, subject: &SubjectSummary) {
        self.rows.extend(subject.rows.iter().cloned());
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Read a previously written cohort or subject result file
    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        let file = File::open(path)?;
        read_rows(file)
            .map(|rows| Self { rows })
            .map_err(|e| PipelineError::read(path, e))
    }
}

/// Write rows with a `ResultSchema` header, even when there are no rows
pub fn write_rows<W: Write>(rows: &[TrialSummary], writer: W) -> Result<(), csv::Error> {
    let mut wtr = WriterBuilder::new().has_headers(false).from_writer(writer);
    wtr.write_record(ResultSchema::columns())?;
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Overwrite `path` with the given rows
pub fn save_rows(rows: &[TrialSummary], path: &Path) -> Result<(), PipelineError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let file = File::create(path)?;
    write_rows(rows, file).map_err(|e| PipelineError::write(path, e))
}

pub fn read_rows<R: Read>(reader: R) -> Result<Vec<TrialSummary>, csv::Error> {
    let mut rdr = ReaderBuilder::new().has_headers(true).from_reader(reader);
    rdr.deserialize().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn row(file: &str, number: Option<u8>) -> TrialSummary {
        TrialSummary {
            simout_file: file.to_string(),
            experiment_condition: Some("A".to_string()),
            average_velocity: 10.0,
            total_mileage: 1.0,
            brake_out_sum: 0.0,
            gas_out_sum: 0.25,
            experiment_number: number,
            subject_id: Some(SubjectId(1)),
            experiment_date: Some("20240115".to_string()),
        }
    }

    #[test]
    fn test_header_matches_result_schema() {
        let mut out = Vec::new();
        write_rows(&[row("a.csv", Some(1))], &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let header: Vec<&str> = text.lines().next().unwrap().split(',').collect();

        assert_eq!(header, ResultSchema::columns());
        assert!(ResultSchema::validate_columns(&header));
        assert_eq!(
            text.lines().nth(1).unwrap(),
            "a.csv,A,10.0,1.0,0.0,0.25,1,1,20240115"
        );
    }

    #[test]
    fn test_empty_rows_still_write_header() {
        let mut out = Vec::new();
        write_rows(&[], &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().count(), 1);
    }

    #[test]
    fn test_missing_values_are_empty_cells() {
        let mut r = row("a.csv", None);
        r.experiment_condition = None;
        let mut out = Vec::new();
        write_rows(&[r.clone()], &mut out).unwrap();

        let text = String::from_utf8(out.clone()).unwrap();
        assert_eq!(text.lines().nth(1).unwrap(), "a.csv,,10.0,1.0,0.0,0.25,,1,20240115");

        let back = read_rows(out.as_slice()).unwrap();
        assert_eq!(back, vec![r]);
    }

    #[test]
    fn test_subject_file_name() {
        let summary = SubjectSummary {
            subject_id: SubjectId(7),
            experiment_date: Some("20240115".to_string()),
            rows: vec![],
        };
        assert_eq!(summary.file_name().unwrap(), "20240115_07.csv");

        let slashed = SubjectSummary {
            experiment_date: Some("2024/01/15".to_string()),
            ..summary.clone()
        };
        assert!(matches!(
            slashed.file_name(),
            Err(PipelineError::InvalidExperimentDate { .. })
        ));

        let escaping = SubjectSummary {
            experiment_date: Some("../x".to_string()),
            ..summary.clone()
        };
        assert!(matches!(
            escaping.file_name(),
            Err(PipelineError::InvalidExperimentDate { .. })
        ));

        let undated = SubjectSummary {
            experiment_date: None,
            ..summary
        };
        assert!(matches!(
            undated.file_name(),
            Err(PipelineError::MissingExperimentDate { .. })
        ));
    }

    #[test]
    fn test_cohort_append_preserves_order() {
        let first = SubjectSummary {
            subject_id: SubjectId(1),
            experiment_date: None,
            rows: vec![row("a.csv", Some(1)), row("b.csv", Some(2))],
        };
        let second = SubjectSummary {
            subject_id: SubjectId(2),
            experiment_date: None,
            rows: vec![row("c.csv", Some(1))],
        };
        let mut cohort = CohortSummary::new();
        cohort.append(&first);
        cohort.append(&second);

        assert_eq!(cohort.len(), first.len() + second.len());
        let files: Vec<&str> = cohort.rows.iter().map(|r| r.simout_file.as_str()).collect();
        assert_eq!(files, vec!["a.csv", "b.csv", "c.csv"]);
    }
}
