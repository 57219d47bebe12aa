//! Configuration validation.
//!
//! Errors make a run impossible and abort with the configuration exit code.
//! Warnings describe settings that are legal but probably not what was meant.
//!
//! # Example
//!
//! ```rust
//! use diffgate::config::{validate, RunConfig};
//!
//! let mut config = RunConfig::default();
//! config.coverage.threshold = 120.0;
//!
//! let report = validate(&config);
//! assert!(!report.is_valid());
//! assert_eq!(report.exit_code(), 7);
//! ```

use std::path::{Component, Path};

use serde::Serialize;

use super::RunConfig;
use crate::error::CONFIG_EXIT_CODE;

/// Result of configuration validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    /// Problems that prevent a run.
    pub errors: Vec<String>,
    /// Suspicious but legal settings.
    pub warnings: Vec<String>,
}

impl ValidationReport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// True when there are no errors. Warnings do not affect validity.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// 0 if valid, 7 (configuration error) otherwise.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        if self.is_valid() {
            0
        } else {
            CONFIG_EXIT_CODE
        }
    }

    /// One-line summary.
    #[must_use]
    pub fn summary(&self) -> String {
        if self.is_valid() {
            if self.warnings.is_empty() {
                "Configuration is valid.".to_string()
            } else {
                format!(
                    "Configuration is valid with {} warning(s).",
                    self.warnings.len()
                )
            }
        } else {
            format!(
                "Configuration is invalid with {} error(s).",
                self.errors.len()
            )
        }
    }
}

/// Check a fully layered configuration.
#[must_use]
pub fn validate(config: &RunConfig) -> ValidationReport {
    let mut report = ValidationReport::new();

    let threshold = config.coverage.threshold;
    if !threshold.is_finite() || !(0.0..=100.0).contains(&threshold) {
        report.errors.push(format!(
            "coverage.threshold must be between 0 and 100, got {}",
            config.coverage.threshold
        ));
    }

    if config.branches.target.trim().is_empty() {
        report
            .errors
            .push("branches.target must not be empty".to_string());
    }

    if config.branches.branch_deploy && config.branches.mainline.trim().is_empty() {
        report
            .errors
            .push("branches.mainline must not be empty in branch-deploy mode".to_string());
    }

    if config.scope.directories.is_empty() {
        report
            .errors
            .push("scope.directories must list at least one directory".to_string());
    }

    for dir in &config.scope.directories {
        if let Some(problem) = directory_problem(dir) {
            report
                .errors
                .push(format!("scope.directories entry '{}' {}", dir, problem));
        }
    }

    if config.scope.extensions.iter().all(|e| e.trim().trim_start_matches('.').is_empty()) {
        report
            .errors
            .push("scope.extensions must list at least one extension".to_string());
    }

    if !config.lint.enabled && !config.type_check.enabled && !config.coverage.enabled {
        report
            .warnings
            .push("all checkers are disabled; the run will always pass".to_string());
    }

    report
}

fn directory_problem(dir: &str) -> Option<&'static str> {
    let path = Path::new(dir.trim());
    if path.is_absolute() || dir.trim().starts_with('/') {
        Some("must be relative to the project root")
    } else if path.components().any(|c| c == Component::ParentDir) {
        Some("must not leave the project root")
    } else {
        None
    }
}
