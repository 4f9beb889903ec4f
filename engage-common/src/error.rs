//! Storage and configuration errors shared by the Engage services
//!
//! Service crates translate these into HTTP responses; nothing here knows
//! about status codes.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// SQLite failure: connection, constraint, busy timeout or a failed
    /// batch transaction
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Creating the database directory or reading a config file failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed TOML, a bad `ENGAGE_*` value or an unusable ingest limit
    #[error("Configuration error: {0}")]
    Config(String),

    /// No upload, template or row-record with the given id
    #[error("Not found: {0}")]
    NotFound(String),

    /// Unknown role or status text, or a rejected template definition
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A stored value that no longer decodes, such as a `data_fields`
    /// document or template column list
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Internal(format!("JSON serialization failed: {}", err))
    }
}
