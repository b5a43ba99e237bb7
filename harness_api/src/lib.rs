//! Types shared by the harness binary and its helper crates: the structured
//! error, the test configuration, well-known constants and Debian version
//! checks.

pub mod config;
pub mod constants;
pub mod error;
pub mod version;
