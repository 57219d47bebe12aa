//! Aggregate run report.

use chrono::{DateTime, Utc};
use colored::Colorize;
use serde::Serialize;

use super::checkers::{CheckOutcome, OutcomeStatus};
use crate::changes::{NoteLevel, Resolution};
use crate::error::Result;

/// Everything a gate run produced.
#[derive(Debug, Clone, Serialize)]
pub struct AggregateReport {
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    /// In execution order.
    pub outcomes: Vec<CheckOutcome>,
    /// AND over every non-skipped outcome.
    pub overall_success: bool,
    /// Sum over non-skipped outcomes.
    pub total_errors: u32,
    pub total_warnings: u32,
    /// The incremental resolution, when any checker needed one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<Resolution>,
}

impl AggregateReport {
    /// Aggregate outcomes. Skipped outcomes are excluded from totals.
    #[must_use]
    pub fn new(started_at: DateTime<Utc>, outcomes: Vec<CheckOutcome>) -> Self {
        let counted = || outcomes.iter().filter(|o| o.is_counted());
        let overall_success = counted().all(|o| o.success);
        let total_errors = counted().fold(0u32, |sum, o| sum.saturating_add(o.error_count));
        let total_warnings = counted().fold(0u32, |sum, o| sum.saturating_add(o.warning_count));
        let duration_ms = u64::try_from((Utc::now() - started_at).num_milliseconds()).unwrap_or(0);

        Self {
            started_at,
            duration_ms,
            outcomes,
            overall_success,
            total_errors,
            total_warnings,
            resolution: None,
        }
    }

    /// Attach the change-set resolution that fed the run.
    #[must_use]
    pub fn with_resolution(mut self, resolution: Option<Resolution>) -> Self {
        self.resolution = resolution;
        self
    }

    /// Process exit code: 0 on overall success, 1 otherwise.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        if self.overall_success {
            0
        } else {
            1
        }
    }

    /// Outcomes that failed or errored.
    #[must_use]
    pub fn failures(&self) -> Vec<&CheckOutcome> {
        self.outcomes.iter().filter(|o| !o.success).collect()
    }

    /// Human-readable summary block.
    #[must_use]
    pub fn format(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!("{}\n\n", "## Quality Gate Summary".bold()));

        if let Some(resolution) = &self.resolution {
            let files = resolution.change_set().map_or(0, |c| c.len());
            output.push_str(&format!(
                "Change set: {} file(s) via {:?}\n",
                files, resolution.strategy
            ));
            for note in resolution.notes.iter().filter(|n| n.level >= NoteLevel::Warning) {
                output.push_str(&format!("  {}\n", note.to_string().yellow()));
            }
            output.push('\n');
        }

        for outcome in &self.outcomes {
            let marker = match outcome.status {
                OutcomeStatus::Passed => "✔".green(),
                OutcomeStatus::Failed => "✘".red(),
                OutcomeStatus::Skipped => "-".dimmed(),
                OutcomeStatus::Errored => "!".red().bold(),
            };
            output.push_str(&format!("{} {}\n", marker, outcome.summary()));
        }

        output.push_str(&format!(
            "\nTotal: {} errors, {} warnings in {}ms\n",
            self.total_errors, self.total_warnings, self.duration_ms
        ));

        if self.overall_success {
            output.push_str(&format!("{}\n", "All checks passed".green().bold()));
        } else {
            output.push_str(&format!(
                "{}\n",
                format!("{} check(s) failed", self.failures().len()).red().bold()
            ));
        }

        output
    }

    /// Pretty JSON rendering.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
