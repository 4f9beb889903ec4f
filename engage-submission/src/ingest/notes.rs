//! Validation notes accumulated for one upload
//!
//! One line per rejected row, reasons joined with `; `:
//!
//! ```text
//! Row 3: department: missing_required; Row 3: hours: type_mismatch
//! Row 7: category: unrecognized_value
//! ```

use super::validator::RejectionReason;

pub const TRUNCATION_MARKER: &str = "... [truncated]";

/// Length-capped notes text
#[derive(Debug, Clone)]
pub struct ValidationNotes {
    text: String,
    max_len: usize,
    truncated: bool,
}

impl ValidationNotes {
    pub fn new(max_len: usize) -> Self {
        Self {
            text: String::new(),
            max_len,
            truncated: false,
        }
    }

    /// Append the reasons one rejected row failed with
    pub fn record(&mut self, row_number: u32, reasons: &[RejectionReason]) {
        if self.truncated || reasons.is_empty() {
            return;
        }

        let line = reasons
            .iter()
            .map(|r| format!("Row {}: {}: {}", row_number, r.column, r.code))
            .collect::<Vec<_>>()
            .join("; ");

        if !self.text.is_empty() {
            self.text.push('\n');
        }
        self.text.push_str(&line);

        if self.text.len() > self.max_len {
            self.truncate();
        }
    }

    /// Cut to `max_len` bytes including the marker
    ///
    /// A cap shorter than the marker keeps only the marker's prefix.
    fn truncate(&mut self) {
        let marker = &TRUNCATION_MARKER[..TRUNCATION_MARKER.len().min(self.max_len)];
        let mut keep = self.max_len - marker.len();
        while !self.text.is_char_boundary(keep) {
            keep -= 1;
        }
        self.text.truncate(keep);
        self.text.push_str(marker);
        self.truncated = true;
    }

    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// `None` when nothing was recorded
    pub fn into_option(self) -> Option<String> {
        if self.text.is_empty() {
            None
        } else {
            Some(self.text)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::validator::ReasonCode;

    fn reason(column: &str, code: ReasonCode) -> RejectionReason {
        RejectionReason {
            column: column.to_string(),
            code,
        }
    }

    #[test]
    fn test_line_format() {
        let mut notes = ValidationNotes::new(4000);
        notes.record(
            3,
            &[
                reason("department", ReasonCode::MissingRequired),
                reason("hours", ReasonCode::TypeMismatch),
            ],
        );
        notes.record(7, &[reason("category", ReasonCode::UnrecognizedValue)]);

        assert_eq!(
            notes.as_str(),
            "Row 3: department: missing_required; Row 3: hours: type_mismatch\n\
             Row 7: category: unrecognized_value"
        );
    }

    #[test]
    fn test_truncates_at_cap() {
        let mut notes = ValidationNotes::new(60);
        for row in 2..50 {
            notes.record(row, &[reason("department", ReasonCode::MissingRequired)]);
        }

        assert!(notes.is_truncated());
        assert!(notes.as_str().ends_with(TRUNCATION_MARKER));
        assert!(notes.as_str().len() <= 60);
        assert!(notes.as_str().starts_with("Row 2: department: missing_required"));
    }

    #[test]
    fn test_truncation_respects_char_boundaries() {
        let mut notes = ValidationNotes::new(30);
        notes.record(2, &[reason("dépärtément_ñame", ReasonCode::MissingRequired)]);
        assert!(notes.as_str().ends_with(TRUNCATION_MARKER));
    }

    #[test]
    fn test_cap_below_marker_length_never_exceeded() {
        for cap in [0, 1, 5, TRUNCATION_MARKER.len()] {
            let mut notes = ValidationNotes::new(cap);
            notes.record(2, &[reason("department", ReasonCode::MissingRequired)]);
            assert!(notes.is_truncated());
            assert!(notes.as_str().len() <= cap, "cap {} gave {:?}", cap, notes.as_str());
            assert!(TRUNCATION_MARKER.starts_with(notes.as_str()));
        }
    }

    #[test]
    fn test_empty_notes_are_none() {
        assert_eq!(ValidationNotes::new(100).into_option(), None);
    }
}
