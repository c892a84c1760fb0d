//! Stable DTOs shared across the tfguard workspace.
//!
//! This crate is intentionally boring:
//! - diagnostic records emitted by the assertion chain and the resolver
//! - the scan report envelope written by the CLI

#![forbid(unsafe_code)]

pub mod diagnostic;
pub mod report;

pub use diagnostic::{Diagnostic, Severity, UNKNOWN_LOCATION, Waived};
pub use report::{SCHEMA_REPORT_V1, ScanReport, ScanSummary, ToolMeta, Verdict};
