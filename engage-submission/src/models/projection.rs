//! Projection rows
//!
//! Timestamps and ids are kept as their stored text so that recomputing a
//! projection reproduces it byte for byte.

use serde_json::{Map, Value};

/// Active row-record of a completed upload, with provenance
///
/// Also the row shape of the detailed projection.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectionSourceRow {
    pub data_id: String,
    pub file_id: String,
    pub row_number: i64,
    pub submission_date: Option<String>,
    pub department: Option<String>,
    pub category: Option<String>,
    pub data_fields: Map<String, Value>,
    pub filename: String,
    pub template_id: String,
    pub uploaded_by: String,
    pub uploader_role: String,
    pub uploaded_at: String,
}

/// Detailed row without sensitive fields or uploader identity
#[derive(Debug, Clone, PartialEq)]
pub struct MediumRecord {
    pub data_id: String,
    pub file_id: String,
    pub row_number: i64,
    pub submission_date: Option<String>,
    pub department: Option<String>,
    pub category: Option<String>,
    pub data_fields: Map<String, Value>,
    pub template_id: String,
}

/// Record count for one month/department/category
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryRecord {
    /// `YYYY-MM`
    pub month: Option<String>,
    pub department: Option<String>,
    pub category: Option<String>,
    pub record_count: i64,
}

/// Complete content of all three projections
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectionSet {
    pub detailed: Vec<ProjectionSourceRow>,
    pub medium: Vec<MediumRecord>,
    pub summary: Vec<SummaryRecord>,
}
