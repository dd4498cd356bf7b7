//! Core value types shared by every stage of the metric pipeline
//!
//! Nominal speeds, order slots and subject identifiers are parsed once at
//! roster load time so later stages never re-interpret raw cell text.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Cell literals treated as "absent" in addition to an empty cell
const ABSENT_LITERALS: [&str; 5] = ["none", "nan", "null", "nat", "n/a"];

/// Normalize a raw cell into an optional trimmed string.
///
/// Empty cells and sentinel literals (`None`, `nan`, `null`, ...) are absent.
pub fn normalize_cell(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let lowered = trimmed.to_ascii_lowercase();
    if ABSENT_LITERALS.contains(&lowered.as_str()) {
        return None;
    }
    Some(trimmed.to_string())
}

/// Parse an integral cell, accepting spreadsheet float exports such as `3.0`.
pub fn parse_integral(raw: &str) -> Option<u64> {
    let trimmed = raw.trim();
    if let Ok(value) = trimmed.parse::<u64>() {
        return Some(value);
    }
    let value = trimmed.parse::<f64>().ok()?;
    if value.is_finite() && value >= 0.0 && value.fract() == 0.0 {
        Some(value as u64)
    } else {
        None
    }
}

/// Normalize an experiment date to its digits-only form (`20240115`).
///
/// Accepts integral cells (including `20240115.0`) and calendar dates written
/// as `2024-01-15`, `2024/01/15` or `2024.01.15`, optionally followed by a
/// time. Anything else is `None`.
pub fn normalize_date(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if let Some(value) = parse_integral(trimmed) {
        return Some(value.to_string());
    }
    let date_part = trimmed.split(|c: char| c == ' ' || c == 'T').next()?;
    ["%Y-%m-%d", "%Y/%m/%d", "%Y.%m.%d"]
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(date_part, format).ok())
        .map(|date| date.format("%Y%m%d").to_string())
}

/// Labeled target speed of a trial recording (km/h)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum NominalSpeed {
    #[serde(rename = "60")]
    Kmh60,
    #[serde(rename = "50")]
    Kmh50,
    #[serde(rename = "40")]
    Kmh40,
}

impl NominalSpeed {
    pub const ALL: [NominalSpeed; 3] =
        [NominalSpeed::Kmh60, NominalSpeed::Kmh50, NominalSpeed::Kmh40];

    pub fn kmh(&self) -> u32 {
        match self {
            NominalSpeed::Kmh60 => 60,
            NominalSpeed::Kmh50 => 50,
            NominalSpeed::Kmh40 => 40,
        }
    }

    pub fn from_kmh(kmh: u64) -> Option<Self> {
        match kmh {
            60 => Some(NominalSpeed::Kmh60),
            50 => Some(NominalSpeed::Kmh50),
            40 => Some(NominalSpeed::Kmh40),
            _ => None,
        }
    }

    /// Nominal speed of a recorded speed; 70 km/h runs count as the 60 km/h trial
    pub fn from_recorded_kmh(kmh: u64) -> Option<Self> {
        match kmh {
            70 => Some(NominalSpeed::Kmh60),
            kmh => NominalSpeed::from_kmh(kmh),
        }
    }
}

impl fmt::Display for NominalSpeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kmh())
    }
}

impl FromStr for NominalSpeed {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_integral(s)
            .and_then(NominalSpeed::from_kmh)
            .ok_or_else(|| format!("unknown nominal speed '{}', expected 60, 50 or 40", s.trim()))
    }
}

/// Position in which a subject drove a trial
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum OrderSlot {
    First,
    Second,
    Third,
}

impl OrderSlot {
    pub const ALL: [OrderSlot; 3] = [OrderSlot::First, OrderSlot::Second, OrderSlot::Third];

    /// 1-based experiment number written to result files
    pub fn number(&self) -> u8 {
        match self {
            OrderSlot::First => 1,
            OrderSlot::Second => 2,
            OrderSlot::Third => 3,
        }
    }
}

impl fmt::Display for OrderSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

/// Numeric subject identifier from the roster
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubjectId(pub u32);

impl SubjectId {
    /// Identifier zero-padded to two digits, as used in result file names
    pub fn padded(&self) -> String {
        format!("{:02}", self.0)
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SubjectId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_integral(s)
            .and_then(|v| u32::try_from(v).ok())
            .map(SubjectId)
            .ok_or_else(|| format!("invalid subject id '{}'", s.trim()))
    }
}

/// Non-fatal findings about roster records.
///
/// These are logged and collected in run reports, never raised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationWarning {
    #[error("Roster row {row}: invalid {column} '{value}', treated as empty")]
    InvalidValue {
        row: usize,
        column: String,
        value: String,
    },

    #[error("Roster row {row} has no subject id, record skipped")]
    MissingSubjectId { row: usize },

    #[error("Subject {subject}: {field} is missing")]
    MissingField { subject: SubjectId, field: String },

    #[error("Subject {subject}: speed {speed} is selected for more than one order slot")]
    DuplicateOrder { subject: SubjectId, speed: NominalSpeed },

    #[error("Subject {subject}: file '{file_name}' is assigned to more than one speed")]
    DuplicateFileName { subject: SubjectId, file_name: String },
}
