//! File ingestion pipeline
//!
//! decode → validate → persist → refresh projections
//!
//! - [`decoder`]: uploaded bytes to an ordered stream of row records
//! - [`validator`]: row record + template to an accept/reject verdict
//! - [`coordinator`]: drives one upload through the pipeline
//! - [`refresher`]: recomputes the dashboard projections

pub mod coordinator;
pub mod decoder;
pub mod notes;
pub mod refresher;
pub mod validator;

pub use coordinator::{IngestCoordinator, SubmittedFile, UploadSummary};
pub use decoder::{CellValue, DecodeError, FileFormat, RowDecoder, RowRecord};
pub use refresher::{ProjectionRefresher, RefreshReport};
pub use validator::{NormalizedRow, ReasonCode, RejectionReason, RowValidator, Verdict};

use thiserror::Error;
use uuid::Uuid;

/// Ingestion failures
///
/// A rejected row is a verdict, not an error: only file-level and caller
/// problems appear here.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum IngestError {
    /// Extension not allowed or content not recognized
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    /// Corrupt container, undecodable text or unusable header row
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    /// More data rows than allowed; rows before the limit are kept
    #[error("Row limit exceeded: file has more than {limit} data rows")]
    RowLimitExceeded { limit: usize },

    /// Storage failed mid-upload; rows already written are kept
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// No active template with this id (no upload is recorded)
    #[error("Template not found or inactive: {0}")]
    TemplateNotFound(Uuid),

    /// Upload larger than the configured maximum (no upload is recorded)
    #[error("File too large: {size} bytes exceeds the limit of {limit} bytes")]
    FileTooLarge { size: u64, limit: u64 },

    /// Zero-byte upload (no upload is recorded)
    #[error("Uploaded file is empty")]
    EmptyFile,
}

impl IngestError {
    /// Failures that are recorded on the upload itself
    pub fn is_file_level(&self) -> bool {
        matches!(
            self,
            IngestError::UnsupportedFormat(_)
                | IngestError::MalformedInput(_)
                | IngestError::RowLimitExceeded { .. }
        )
    }
}

impl From<DecodeError> for IngestError {
    fn from(err: DecodeError) -> Self {
        match err {
            DecodeError::UnsupportedFormat(msg) => IngestError::UnsupportedFormat(msg),
            DecodeError::MalformedInput(msg) => IngestError::MalformedInput(msg),
            DecodeError::RowLimitExceeded { limit } => IngestError::RowLimitExceeded { limit },
        }
    }
}

impl From<engage_common::Error> for IngestError {
    fn from(err: engage_common::Error) -> Self {
        IngestError::StorageUnavailable(err.to_string())
    }
}
