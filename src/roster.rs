//! Subject master roster
//!
//! The roster lists one subject per row: identity, experiment date, the three
//! trial recordings keyed by nominal speed, the course condition and the order
//! in which the speeds were driven. Sentinel cells are normalized to absent
//! once, here, so downstream code only ever sees `Option`s.

use crate::error::RosterLoadError;
use crate::report::RunLog;
use crate::schema::{ColumnSchema, RosterSchema};
use crate::types::{
    normalize_cell, normalize_date, parse_integral, NominalSpeed, OrderSlot, SubjectId,
    ValidationWarning,
};
use csv::{ReaderBuilder, StringRecord, Trim};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

/// One roster row with every field optional
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RosterRecord {
    /// 1-based data row in the roster file
    pub row: usize,
    pub subject_id: Option<SubjectId>,
    pub subject_name: Option<String>,
    pub experiment_date: Option<String>,
    pub file_name_60: Option<String>,
    pub file_name_50: Option<String>,
    pub file_name_40: Option<String>,
    pub experiment_condition: Option<String>,
    pub experiment_1: Option<NominalSpeed>,
    pub experiment_2: Option<NominalSpeed>,
    pub experiment_3: Option<NominalSpeed>,
    /// Cells that could not be read and were treated as empty
    pub invalid_cells: Vec<ValidationWarning>,
}

impl RosterRecord {
    /// Recording file name for a nominal speed
    pub fn file_name(&self, speed: NominalSpeed) -> Option<&str> {
        match speed {
            NominalSpeed::Kmh60 => self.file_name_60.as_deref(),
            NominalSpeed::Kmh50 => self.file_name_50.as_deref(),
            NominalSpeed::Kmh40 => self.file_name_40.as_deref(),
        }
    }

    /// Nominal speed driven in an order slot
    pub fn order(&self, slot: OrderSlot) -> Option<NominalSpeed> {
        match slot {
            OrderSlot::First => self.experiment_1,
            OrderSlot::Second => self.experiment_2,
            OrderSlot::Third => self.experiment_3,
        }
    }

    /// Order slots with a recorded speed, in slot order
    pub fn experiments(&self) -> BTreeMap<OrderSlot, NominalSpeed> {
        OrderSlot::ALL
            .iter()
            .filter_map(|slot| self.order(*slot).map(|speed| (*slot, speed)))
            .collect()
    }

    /// Non-fatal findings for this record.
    ///
    /// Unreadable cells come first. Past those, a record without a subject
    /// id only reports that; nothing else about it is meaningful.
    pub fn validate(&self) -> Vec<ValidationWarning> {
        let mut warnings = self.invalid_cells.clone();
        let subject = match self.subject_id {
            Some(id) => id,
            None => {
                warnings.push(ValidationWarning::MissingSubjectId { row: self.row });
                return warnings;
            }
        };

        let required = [
            (RosterSchema::FILE_NAME_60, self.file_name_60.is_some()),
            (RosterSchema::FILE_NAME_50, self.file_name_50.is_some()),
            (RosterSchema::FILE_NAME_40, self.file_name_40.is_some()),
            (RosterSchema::EXPERIMENT_CONDITION, self.experiment_condition.is_some()),
        ];
        for (field, present) in required {
            if !present {
                warnings.push(ValidationWarning::MissingField {
                    subject,
                    field: field.to_string(),
                });
            }
        }

        let mut slots_per_speed: BTreeMap<NominalSpeed, usize> = BTreeMap::new();
        for speed in self.experiments().values() {
            *slots_per_speed.entry(*speed).or_default() += 1;
        }
        for (speed, count) in slots_per_speed {
            if count > 1 {
                warnings.push(ValidationWarning::DuplicateOrder { subject, speed });
            }
        }

        let mut speeds_per_file: BTreeMap<&str, usize> = BTreeMap::new();
        for speed in NominalSpeed::ALL {
            if let Some(name) = self.file_name(speed) {
                *speeds_per_file.entry(name).or_default() += 1;
            }
        }
        for (file_name, count) in speeds_per_file {
            if count > 1 {
                warnings.push(ValidationWarning::DuplicateFileName {
                    subject,
                    file_name: file_name.to_string(),
                });
            }
        }

        warnings
    }
}

/// Retained roster rows
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RosterTable {
    pub records: Vec<RosterRecord>,
    /// Rows dropped because `file_name_60` was absent
    pub dropped: usize,
}

/// Reader for the master roster CSV
pub struct RosterReader<'a> {
    path: PathBuf,
    log: &'a dyn RunLog,
}

impl<'a> RosterReader<'a> {
    pub fn new(path: impl Into<PathBuf>, log: &'a dyn RunLog) -> Self {
        Self {
            path: path.into(),
            log,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the roster, keeping only rows with a 60 km/h file name
    pub fn load(&self) -> Result<RosterTable, RosterLoadError> {
        self.log
            .debug(&format!("Loading roster '{}'", self.path.display()));

        let result = self.read_table();
        match &result {
            Ok(table) => self.log.debug(&format!(
                "Roster loaded: {} records kept, {} dropped",
                table.records.len(),
                table.dropped
            )),
            Err(e) => self.log.error(&format!("Roster load failed: {}", e)),
        }
        result
    }

    /// Retained records in file order
    pub fn get_subjects(&self) -> Result<Vec<RosterRecord>, RosterLoadError> {
        let table = self.load()?;
        self.log
            .debug(&format!("{} subject records available", table.records.len()));
        Ok(table.records)
    }

    fn read_table(&self) -> Result<RosterTable, RosterLoadError> {
        if !self.path.is_file() {
            return Err(RosterLoadError::NotFound {
                path: self.path.clone(),
            });
        }
        let content = fs::read_to_string(&self.path)?;
        let content = content.strip_prefix('\u{feff}').unwrap_or(&content);
        if content.trim().is_empty() {
            return Err(RosterLoadError::Empty {
                path: self.path.clone(),
            });
        }
        parse_roster(content, &self.path, self.log)
    }
}

fn parse_roster(
    content: &str,
    path: &Path,
    log: &dyn RunLog,
) -> Result<RosterTable, RosterLoadError> {
    let parse_err = |source| RosterLoadError::Parse {
        path: path.to_path_buf(),
        source,
    };

    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .from_reader(content.as_bytes());
    let headers = rdr.headers().map_err(parse_err)?.clone();

    if !headers.iter().any(|h| h == RosterSchema::FILE_NAME_60) {
        return Err(RosterLoadError::MissingColumns {
            path: path.to_path_buf(),
            columns: vec![RosterSchema::FILE_NAME_60.to_string()],
        });
    }
    for column in RosterSchema::missing_columns(&headers.iter().collect::<Vec<_>>()) {
        log.warn(&format!("Roster has no '{}' column, treating it as empty", column));
    }

    let index: HashMap<&str, usize> = headers.iter().enumerate().map(|(i, h)| (h, i)).collect();
    let mut table = RosterTable::default();

    for (i, result) in rdr.records().enumerate() {
        let record = result.map_err(parse_err)?;
        let mut cells = Cells {
            record: &record,
            index: &index,
            row: i + 1,
            invalid: Vec::new(),
        };

        let file_name_60 = cells.text(RosterSchema::FILE_NAME_60);
        if file_name_60.is_none() {
            log.debug(&format!("Roster row {} has no file_name_60, dropped", cells.row));
            table.dropped += 1;
            continue;
        }

        let entry = RosterRecord {
            row: cells.row,
            subject_id: cells.parsed(RosterSchema::SUBJECT_ID, |raw| raw.parse().ok()),
            subject_name: cells.text(RosterSchema::SUBJECT_NAME),
            experiment_date: cells.parsed(RosterSchema::EXPERIMENT_DATE, normalize_date),
            file_name_60,
            file_name_50: cells.text(RosterSchema::FILE_NAME_50),
            file_name_40: cells.text(RosterSchema::FILE_NAME_40),
            experiment_condition: cells.text(RosterSchema::EXPERIMENT_CONDITION),
            experiment_1: cells.parsed(RosterSchema::EXPERIMENT_1, parse_speed),
            experiment_2: cells.parsed(RosterSchema::EXPERIMENT_2, parse_speed),
            experiment_3: cells.parsed(RosterSchema::EXPERIMENT_3, parse_speed),
            invalid_cells: cells.invalid,
        };
        for warning in &entry.invalid_cells {
            log.debug(&warning.to_string());
        }
        table.records.push(entry);
    }

    Ok(table)
}

/// Cell access for one roster row
struct Cells<'r> {
    record: &'r StringRecord,
    index: &'r HashMap<&'r str, usize>,
    row: usize,
    invalid: Vec<ValidationWarning>,
}

impl Cells<'_> {
    fn text(&self, column: &str) -> Option<String> {
        self.index
            .get(column)
            .and_then(|&i| self.record.get(i))
            .and_then(normalize_cell)
    }

    /// Parse a present cell; an unreadable one is recorded and read as empty
    fn parsed<T>(&mut self, column: &str, parse: impl Fn(&str) -> Option<T>) -> Option<T> {
        let raw = self.text(column)?;
        let value = parse(&raw);
        if value.is_none() {
            self.invalid.push(ValidationWarning::InvalidValue {
                row: self.row,
                column: column.to_string(),
                value: raw,
            });
        }
        value
    }
}

/// Order cells hold 60, 50 or 40; a 70 km/h run counts as the 60 km/h trial
fn parse_speed(raw: &str) -> Option<NominalSpeed> {
    parse_integral(raw).and_then(NominalSpeed::from_recorded_kmh)
}

/// Validate every record, in roster order
pub fn validate_roster(records: &[RosterRecord]) -> Vec<ValidationWarning> {
    records.iter().flat_map(|r| r.validate()).collect()
}
