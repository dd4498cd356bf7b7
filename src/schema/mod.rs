//! Column schemas for every tabular shape in the pipeline
//!
//! Each schema is a fixed mapping from a semantic field name to the literal
//! column name found in (or written to) a CSV file:
//! - raw simulator output (`SimoutSchema`)
//! - derived per-sample columns (`ProcessedSchema`)
//! - per-trial result rows (`ResultSchema`)
//! - the subject master roster (`RosterSchema`)

mod tables;

pub use tables::*;

use std::collections::{HashMap, HashSet};

/// One semantic field and its literal column name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub key: &'static str,
    pub column: &'static str,
}

impl Field {
    pub const fn new(key: &'static str, column: &'static str) -> Self {
        Self { key, column }
    }
}

/// Shared behavior of all column schemas
pub trait ColumnSchema {
    /// Schema name for reports
    const NAME: &'static str;

    /// Fields in declaration order
    const FIELDS: &'static [Field];

    /// Semantic key to literal column name
    fn column_map() -> HashMap<&'static str, &'static str> {
        Self::FIELDS.iter().map(|f| (f.key, f.column)).collect()
    }

    /// Literal column names in declaration order
    fn columns() -> Vec<&'static str> {
        Self::FIELDS.iter().map(|f| f.column).collect()
    }

    /// Look up the literal column name for a semantic key
    fn column(key: &str) -> Option<&'static str> {
        Self::FIELDS.iter().find(|f| f.key == key).map(|f| f.column)
    }

    /// Rename headers from semantic keys to literal names.
    ///
    /// Headers that are not a known semantic key are left untouched.
    fn rename_columns<S: AsRef<str>>(headers: &[S]) -> Vec<String> {
        let map = Self::column_map();
        headers
            .iter()
            .map(|h| {
                let h = h.as_ref();
                map.get(h).map(|c| c.to_string()).unwrap_or_else(|| h.to_string())
            })
            .collect()
    }

    /// True when the header set equals the literal column set exactly
    fn validate_columns<S: AsRef<str>>(headers: &[S]) -> bool {
        let actual: HashSet<&str> = headers.iter().map(|h| h.as_ref()).collect();
        let expected: HashSet<&str> = Self::FIELDS.iter().map(|f| f.column).collect();
        actual == expected
    }

    /// Literal columns absent from the given headers
    fn missing_columns<S: AsRef<str>>(headers: &[S]) -> Vec<&'static str> {
        let actual: HashSet<&str> = headers.iter().map(|h| h.as_ref().trim()).collect();
        Self::FIELDS
            .iter()
            .map(|f| f.column)
            .filter(|c| !actual.contains(c))
            .collect()
    }
}
