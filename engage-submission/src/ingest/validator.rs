//! Row validator
//!
//! Screens one [`RowRecord`] against a [`Template`]. Every template column is
//! checked in declaration order and each failing column contributes one
//! reason. Columns the template does not declare are carried into the
//! document unchanged.

use chrono::NaiveDate;
use engage_common::models::{ColumnSpec, ColumnType, Template};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;

use super::decoder::{number_to_json, CellValue, RowRecord};

/// Fields stored in their own indexed columns instead of the document
pub const SUBMISSION_DATE: &str = "submission_date";
pub const DEPARTMENT: &str = "department";
pub const CATEGORY: &str = "category";

/// Stable rejection codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    MissingRequired,
    TypeMismatch,
    UnrecognizedValue,
}

impl ReasonCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ReasonCode::MissingRequired => "missing_required",
            ReasonCode::TypeMismatch => "type_mismatch",
            ReasonCode::UnrecognizedValue => "unrecognized_value",
        }
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectionReason {
    pub column: String,
    pub code: ReasonCode,
}

/// Accepted row ready for storage
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRow {
    pub row_number: u32,
    pub submission_date: Option<NaiveDate>,
    pub department: Option<String>,
    pub category: Option<String>,
    /// Every other column, keyed by header in source order
    pub data_fields: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Accepted(NormalizedRow),
    Rejected(Vec<RejectionReason>),
}

impl Verdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accepted(_))
    }
}

/// Value after type coercion
#[derive(Debug, Clone, PartialEq)]
enum Typed {
    Text(String),
    Date(NaiveDate),
    Number(f64),
}

impl Typed {
    fn to_json(&self) -> Value {
        match self {
            Typed::Text(s) => Value::String(s.clone()),
            Typed::Date(d) => Value::String(d.format("%Y-%m-%d").to_string()),
            Typed::Number(n) => number_to_json(*n),
        }
    }
}

/// Validator bound to one template and date format
pub struct RowValidator<'a> {
    template: &'a Template,
    date_format: &'a str,
}

impl<'a> RowValidator<'a> {
    pub fn new(template: &'a Template, date_format: &'a str) -> Self {
        Self {
            template,
            date_format,
        }
    }

    pub fn validate(&self, row: &RowRecord) -> Verdict {
        let mut reasons = Vec::new();
        let mut typed: Vec<(&str, Option<Typed>)> = Vec::with_capacity(self.template.columns.len());

        for column in &self.template.columns {
            match self.check_column(column, row.get(&column.name)) {
                Ok(value) => typed.push((column.name.as_str(), value)),
                Err(code) => reasons.push(RejectionReason {
                    column: column.name.clone(),
                    code,
                }),
            }
        }

        if !reasons.is_empty() {
            return Verdict::Rejected(reasons);
        }

        Verdict::Accepted(self.normalize(row, &typed))
    }

    fn check_column(&self, column: &ColumnSpec, cell: Option<&CellValue>) -> Result<Option<Typed>, ReasonCode> {
        let cell = match cell {
            Some(cell) if !cell.is_blank() => cell,
            _ if column.required => return Err(ReasonCode::MissingRequired),
            _ => return Ok(None),
        };

        let value = match column.column_type {
            ColumnType::Text => self.coerce_text(cell)?,
            ColumnType::Date => self.coerce_date(cell)?,
            ColumnType::Number => coerce_number(cell)?,
        };

        if let (Some(allowed), Typed::Text(text)) = (&column.allowed_values, &value) {
            if !allowed.iter().any(|v| v.trim() == text) {
                return Err(ReasonCode::UnrecognizedValue);
            }
        }

        Ok(Some(value))
    }

    fn coerce_text(&self, cell: &CellValue) -> Result<Typed, ReasonCode> {
        match cell {
            CellValue::Error(_) => Err(ReasonCode::UnrecognizedValue),
            other => other
                .as_text()
                .map(Typed::Text)
                .ok_or(ReasonCode::MissingRequired),
        }
    }

    fn coerce_date(&self, cell: &CellValue) -> Result<Typed, ReasonCode> {
        match cell {
            CellValue::Date(d) => Ok(Typed::Date(*d)),
            CellValue::DateTime(dt) => Ok(Typed::Date(dt.date())),
            CellValue::Text(s) => NaiveDate::parse_from_str(s.trim(), self.date_format)
                .map(Typed::Date)
                .map_err(|_| ReasonCode::TypeMismatch),
            CellValue::Error(_) => Err(ReasonCode::UnrecognizedValue),
            _ => Err(ReasonCode::TypeMismatch),
        }
    }

    /// Best-effort date for an undeclared or differently typed `submission_date`
    fn promote_date(&self, cell: &CellValue) -> Option<NaiveDate> {
        match self.coerce_date(cell) {
            Ok(Typed::Date(d)) => Some(d),
            _ => None,
        }
    }

    fn normalize(&self, row: &RowRecord, typed: &[(&str, Option<Typed>)]) -> NormalizedRow {
        let declared = |name: &str| typed.iter().find(|(n, _)| *n == name).map(|(_, v)| v.as_ref());

        let submission_date = match declared(SUBMISSION_DATE) {
            Some(Some(Typed::Date(d))) => Some(*d),
            Some(_) => None,
            None => row.get(SUBMISSION_DATE).and_then(|c| self.promote_date(c)),
        };
        let department = promote_text(declared(DEPARTMENT), row.get(DEPARTMENT));
        let category = promote_text(declared(CATEGORY), row.get(CATEGORY));

        let mut data_fields = Map::new();
        for (header, cell) in row.iter() {
            let promoted = match header {
                SUBMISSION_DATE => submission_date.is_some(),
                DEPARTMENT => department.is_some(),
                CATEGORY => category.is_some(),
                _ => false,
            };
            if promoted {
                continue;
            }

            let value = match declared(header) {
                Some(Some(value)) => value.to_json(),
                Some(None) => Value::Null,
                None => cell.to_json(),
            };
            data_fields.insert(header.to_string(), value);
        }

        NormalizedRow {
            row_number: row.row_number(),
            submission_date,
            department,
            category,
            data_fields,
        }
    }
}

fn promote_text(declared: Option<Option<&Typed>>, cell: Option<&CellValue>) -> Option<String> {
    match declared {
        Some(Some(Typed::Text(s))) => Some(s.clone()),
        Some(Some(other)) => match other.to_json() {
            Value::String(s) => Some(s),
            value => Some(value.to_string()),
        },
        Some(None) => None,
        None => cell.and_then(CellValue::as_text),
    }
}

fn coerce_number(cell: &CellValue) -> Result<Typed, ReasonCode> {
    match cell {
        CellValue::Int(i) => Ok(Typed::Number(*i as f64)),
        CellValue::Float(f) if f.is_finite() => Ok(Typed::Number(*f)),
        CellValue::Text(s) => match s.trim().parse::<f64>() {
            Ok(n) if n.is_finite() => Ok(Typed::Number(n)),
            _ => Err(ReasonCode::TypeMismatch),
        },
        CellValue::Error(_) => Err(ReasonCode::UnrecognizedValue),
        _ => Err(ReasonCode::TypeMismatch),
    }
}
