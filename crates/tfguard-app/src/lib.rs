//! Use case orchestration for tfguard.
//!
//! This crate provides the application layer: use cases that coordinate the domain, repo and
//! settings layers. It is intentionally thin.
//!
//! The CLI crate depends on this; it only handles argument parsing and I/O.

#![forbid(unsafe_code)]

mod report;
mod rules;
mod scan;

pub use report::{format_rule_list, parse_report_json, report_schema, serialize_report};
pub use rules::{BUILTIN_RULES, select_rules};
pub use scan::{ScanInput, ScanOutput, error_exit_code, run_scan, verdict_exit_code};
