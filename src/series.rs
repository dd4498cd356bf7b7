//! Trial time series
//!
//! A column-oriented view of one simulator recording. Raw columns are loaded
//! from CSV; derived columns are added in place by the trial processor and the
//! metric calculator and are never written back to the source file.

use crate::error::TrialLoadError;
use crate::schema::{ColumnSchema, ProcessedSchema, SimoutSchema};
use csv::{ReaderBuilder, StringRecord, Trim};
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// Export-only column holding the running sum of `Velocity_times_dt`
pub const DISTANCE_COLUMN: &str = "distance";

/// One raw sample, used to build series in code
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Sample {
    pub time: f64,
    pub ego_a: f64,
    pub ego_v: f64,
    pub ego_x: f64,
    pub ego_y: f64,
    pub psi: f64,
    pub gas_out: f64,
    pub brake_out: f64,
}

/// Raw and derived columns of one trial, all of equal length
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrialSeries {
    pub time: Vec<f64>,
    pub ego_a: Vec<f64>,
    pub ego_v: Vec<f64>,
    pub ego_x: Vec<f64>,
    pub ego_y: Vec<f64>,
    pub psi: Vec<f64>,
    pub gas_out: Vec<f64>,
    pub brake_out: Vec<f64>,

    pub front_left_x: Option<Vec<f64>>,
    pub front_left_y: Option<Vec<f64>>,
    pub velocity_times_dt: Option<Vec<f64>>,
    pub brake_out_times_dt: Option<Vec<f64>>,
    pub gas_out_times_dt: Option<Vec<f64>>,
}

impl TrialSeries {
    pub fn from_samples(samples: &[Sample]) -> Self {
        let mut series = Self::default();
        for s in samples {
            series.push(s);
        }
        series
    }

    fn push(&mut self, s: &Sample) {
        self.time.push(s.time);
        self.ego_a.push(s.ego_a);
        self.ego_v.push(s.ego_v);
        self.ego_x.push(s.ego_x);
        self.ego_y.push(s.ego_y);
        self.psi.push(s.psi);
        self.gas_out.push(s.gas_out);
        self.brake_out.push(s.brake_out);
    }

    /// Load a recording from a CSV file with `SimoutSchema` headers.
    ///
    /// Extra columns are ignored; every schema column must be present.
    pub fn load(path: &Path) -> Result<Self, TrialLoadError> {
        if !path.is_file() {
            return Err(TrialLoadError::NotFound {
                path: path.to_path_buf(),
            });
        }
        let file = File::open(path)?;
        Self::from_reader(file, path)
    }

    /// Parse CSV content; `path` is only used for error context
    pub fn from_reader<R: Read>(reader: R, path: &Path) -> Result<Self, TrialLoadError> {
        let parse_err = |source| TrialLoadError::Parse {
            path: path.to_path_buf(),
            source,
        };

        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .trim(Trim::All)
            .from_reader(reader);
        let headers = rdr.headers().map_err(parse_err)?.clone();
        let header_names: Vec<&str> = headers.iter().collect();

        let missing = SimoutSchema::missing_columns(&header_names);
        if !missing.is_empty() {
            return Err(TrialLoadError::MissingColumns {
                path: path.to_path_buf(),
                columns: missing.iter().map(|c| c.to_string()).collect(),
            });
        }

        let index_of = |column: &str| header_names.iter().position(|h| *h == column).unwrap_or(0);
        let columns = [
            SimoutSchema::TIME,
            SimoutSchema::EGO_A,
            SimoutSchema::EGO_V,
            SimoutSchema::EGO_X,
            SimoutSchema::EGO_Y,
            SimoutSchema::PSI,
            SimoutSchema::GAS_OUT,
            SimoutSchema::BRAKE_OUT,
        ];
        let indices: Vec<usize> = columns.iter().map(|c| index_of(c)).collect();

        let mut series = Self::default();
        for (row, result) in rdr.records().enumerate() {
            let record = result.map_err(parse_err)?;
            let mut values = [0.0f64; 8];
            for (slot, (&column, &index)) in columns.iter().zip(indices.iter()).enumerate() {
                values[slot] = parse_number(&record, index).ok_or_else(|| {
                    TrialLoadError::InvalidNumber {
                        path: path.to_path_buf(),
                        row: row + 1,
                        column: column.to_string(),
                        value: record.get(index).unwrap_or_default().to_string(),
                    }
                })?;
            }
            series.push(&Sample {
                time: values[0],
                ego_a: values[1],
                ego_v: values[2],
                ego_x: values[3],
                ego_y: values[4],
                psi: values[5],
                gas_out: values[6],
                brake_out: values[7],
            });
        }

        Ok(series)
    }

    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    /// Difference between the first two timestamps, `None` below two samples
    pub fn sample_interval(&self) -> Option<f64> {
        match self.time.as_slice() {
            [first, second, ..] => Some(second - first),
            _ => None,
        }
    }

    /// Running sum of the per-step mileage column, if it has been added
    pub fn cumulative_distance(&self) -> Option<Vec<f64>> {
        self.velocity_times_dt.as_ref().map(|steps| {
            steps
                .iter()
                .scan(0.0, |acc, step| {
                    *acc += step;
                    Some(*acc)
                })
                .collect()
        })
    }

    /// Named columns currently held, raw columns first
    pub fn columns(&self) -> Vec<(&'static str, &[f64])> {
        let mut columns: Vec<(&'static str, &[f64])> = vec![
            (SimoutSchema::TIME, &self.time),
            (SimoutSchema::EGO_A, &self.ego_a),
            (SimoutSchema::EGO_V, &self.ego_v),
            (SimoutSchema::EGO_X, &self.ego_x),
            (SimoutSchema::EGO_Y, &self.ego_y),
            (SimoutSchema::PSI, &self.psi),
            (SimoutSchema::GAS_OUT, &self.gas_out),
            (SimoutSchema::BRAKE_OUT, &self.brake_out),
        ];
        let derived = [
            (ProcessedSchema::EGO_FRONT_LEFT_X, &self.front_left_x),
            (ProcessedSchema::EGO_FRONT_LEFT_Y, &self.front_left_y),
            (ProcessedSchema::VELOCITY_TIMES_DT, &self.velocity_times_dt),
            (ProcessedSchema::BRAKE_OUT_TIMES_DT, &self.brake_out_times_dt),
            (ProcessedSchema::GAS_OUT_TIMES_DT, &self.gas_out_times_dt),
        ];
        for (name, values) in derived {
            if let Some(values) = values {
                columns.push((name, values.as_slice()));
            }
        }
        columns
    }

    pub fn headers(&self) -> Vec<&'static str> {
        self.columns().into_iter().map(|(name, _)| name).collect()
    }

    /// Rows whose index passes `keep`, across every held column
    pub(crate) fn select(&self, keep: impl Fn(usize) -> bool) -> Self {
        let pick = |values: &[f64]| -> Vec<f64> {
            values
                .iter()
                .enumerate()
                .filter(|(i, _)| keep(*i))
                .map(|(_, v)| *v)
                .collect()
        };
        let pick_opt = |values: &Option<Vec<f64>>| values.as_deref().map(pick);

        Self {
            time: pick(&self.time),
            ego_a: pick(&self.ego_a),
            ego_v: pick(&self.ego_v),
            ego_x: pick(&self.ego_x),
            ego_y: pick(&self.ego_y),
            psi: pick(&self.psi),
            gas_out: pick(&self.gas_out),
            brake_out: pick(&self.brake_out),
            front_left_x: pick_opt(&self.front_left_x),
            front_left_y: pick_opt(&self.front_left_y),
            velocity_times_dt: pick_opt(&self.velocity_times_dt),
            brake_out_times_dt: pick_opt(&self.brake_out_times_dt),
            gas_out_times_dt: pick_opt(&self.gas_out_times_dt),
        }
    }

    /// Write every held column, plus `distance` when mileage is present
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), csv::Error> {
        let distance = self.cumulative_distance();
        let mut columns = self.columns();
        if let Some(distance) = distance.as_deref() {
            columns.push((DISTANCE_COLUMN, distance));
        }

        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(columns.iter().map(|(name, _)| *name))?;
        for row in 0..self.len() {
            wtr.write_record(columns.iter().map(|(_, values)| values[row].to_string()))?;
        }
        wtr.flush()?;
        Ok(())
    }

    pub fn export(&self, path: &Path) -> Result<(), crate::error::PipelineError> {
        let file = File::create(path)?;
        self.write_csv(file)
            .map_err(|e| crate::error::PipelineError::write(PathBuf::from(path), e))
    }
}

fn parse_number(record: &StringRecord, index: usize) -> Option<f64> {
    record.get(index).and_then(|s| s.trim().parse::<f64>().ok())
}
