//! # Engage Common Library
//!
//! Shared code for the Engage submission and dashboard services:
//! - Error type used by storage and configuration code
//! - Configuration loading (TOML + environment + compiled defaults)
//! - Database schema initialization
//! - Shared models (roles, upload status, templates)
//! - Caller identity supplied by the authenticating gateway

pub mod api;
pub mod config;
#[cfg(feature = "sqlx")]
pub mod db;
pub mod error;
pub mod models;

pub use error::{Error, Result};
