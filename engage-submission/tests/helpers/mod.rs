//! Test Helper Utilities
//!
//! Shared utilities for testing engage-submission

#![allow(dead_code)]

pub mod db_utils;
pub mod fixtures;

// Re-export commonly used items
pub use db_utils::{
    count_rows, create_test_db, create_test_state, ingest_config, projection_snapshot, scalar_text,
};
pub use fixtures::{
    admin, csv_file, multipart_body, public_user, staff, with_identity, xlsx_file, XlsxCell,
    MULTIPART_BOUNDARY,
};
