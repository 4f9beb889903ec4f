//! Shared HTTP API functionality
//!
//! Both Engage services sit behind an authenticating gateway. This module
//! holds the pieces they share for reading what the gateway forwards.

pub mod identity;

pub use identity::{CallerIdentity, IdentityRejection, ROLE_HEADER, USER_HEADER};
