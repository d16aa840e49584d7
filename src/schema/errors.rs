//! Validation errors
//!
//! Field coercion failures are collected per record and per field, then
//! raised once for a whole write batch rather than failing on the first
//! bad record.

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

/// One field that failed coercion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    /// Expected type or condition
    pub expected: String,
    /// Actual value or type found
    pub actual: String,
}

impl FieldError {
    pub fn new(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    pub fn missing() -> Self {
        Self::new("value to be present", "missing")
    }

    pub fn null() -> Self {
        Self::new("non-null value", "null")
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "expected {}, got {}", self.expected, self.actual)
    }
}

/// All failures for one record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordErrors {
    /// Record id, when the record had one
    pub id: Option<String>,
    /// Field name → failure
    pub errors: BTreeMap<String, FieldError>,
}

impl RecordErrors {
    pub fn new(id: Option<String>) -> Self {
        Self {
            id,
            errors: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, field: impl Into<String>, error: FieldError) {
        self.errors.insert(field.into(), error);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Raised once per write batch when any record fails coercion
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("validation failed for {type_name}: {} invalid record(s)", .records.len())]
pub struct ValidationError {
    pub type_name: String,
    pub records: Vec<RecordErrors>,
}

impl ValidationError {
    pub fn new(type_name: impl Into<String>, records: Vec<RecordErrors>) -> Self {
        Self {
            type_name: type_name.into(),
            records,
        }
    }

    /// Look up the failure for a field of a record
    pub fn field_error(&self, id: &str, field: &str) -> Option<&FieldError> {
        self.records
            .iter()
            .find(|r| r.id.as_deref() == Some(id))
            .and_then(|r| r.errors.get(field))
    }
}

/// Collects per-record failures during a bulk write
#[derive(Debug, Default)]
pub(crate) struct ErrorCollector {
    records: Vec<RecordErrors>,
}

impl ErrorCollector {
    pub(crate) fn push(&mut self, record: RecordErrors) {
        if !record.is_empty() {
            self.records.push(record);
        }
    }

    /// Ok when nothing was collected
    pub(crate) fn finish(self, type_name: &str) -> Result<(), ValidationError> {
        if self.records.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::new(type_name, self.records))
        }
    }
}
