//! Data models for engage-submission

pub mod projection;
pub mod row_record;
pub mod upload;

pub use projection::{MediumRecord, ProjectionSet, ProjectionSourceRow, SummaryRecord};
pub use row_record::StoredRow;
pub use upload::{NewUpload, UploadCompletion, UploadDetail, UploadListQuery, UploadPage};
