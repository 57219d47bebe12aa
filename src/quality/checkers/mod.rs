//! Checker adapters.
//!
//! Each checker wraps one external tool: it builds the command line for a
//! scope, and parses the tool's output into a [`CheckOutcome`]. The shared
//! run sequence lives in [`Checker::run`]; implementations only supply the
//! pieces that differ.
//!
//! | Checker | Tool | Incremental | Full |
//! |---------|------|-------------|------|
//! | [`LintChecker`] | `eslint` | changed files | configured globs |
//! | [`TypeCheckChecker`] | `tsc --noEmit` | changed files | `-p tsconfig.json` |
//! | [`CoverageChecker`] | `type-coverage` | n/a | always whole project |

pub mod eslint;
pub mod tsc;
pub mod type_coverage;

pub use eslint::LintChecker;
pub use tsc::TypeCheckChecker;
pub use type_coverage::CoverageChecker;

use std::path::Path;
use std::time::Instant;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info};

use super::parser::{parse_double_pass, Findings, OutputParser, ParsePass};
use super::ToolInvocation;
use crate::changes::{CheckMode, ResolvedScope, ScopeRule};
use crate::error::{GateError, Result};
use crate::testing::ToolRunner;

/// Sentinel for "whole project, count not meaningful".
pub const WHOLE_PROJECT: i64 = -1;

// ============================================================================
// Checker Kind
// ============================================================================

/// The three checker families, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckerKind {
    Lint,
    TypeCheck,
    Coverage,
}

impl CheckerKind {
    /// Fixed execution order.
    pub const ORDER: [CheckerKind; 3] = [Self::Lint, Self::TypeCheck, Self::Coverage];

    /// Display name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Lint => "lint",
            Self::TypeCheck => "type-check",
            Self::Coverage => "coverage",
        }
    }
}

impl std::fmt::Display for CheckerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for CheckerKind {
    type Err = GateError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "lint" | "eslint" => Ok(Self::Lint),
            "type-check" | "typecheck" | "tsc" => Ok(Self::TypeCheck),
            "coverage" | "type-coverage" => Ok(Self::Coverage),
            other => Err(GateError::invalid_config(
                "checker",
                format!("unknown checker '{}'", other),
            )),
        }
    }
}

// ============================================================================
// Check Outcome
// ============================================================================

/// How a checker's run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Passed,
    Failed,
    /// Disabled in configuration.
    Skipped,
    /// The checker itself failed (spawn, provisioning, ...).
    Errored,
}

/// Result of running one checker.
///
/// `success` is always `error_count == 0`, except for skipped outcomes
/// which are successful with no counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckOutcome {
    pub checker: CheckerKind,
    pub status: OutcomeStatus,
    pub success: bool,
    pub error_count: u32,
    pub warning_count: u32,
    /// Number of files handed to the tool, or [`WHOLE_PROJECT`].
    pub files_checked: i64,
    pub message: String,
    pub duration_ms: u64,
}

impl CheckOutcome {
    /// Outcome from parsed counts.
    pub fn from_findings(
        checker: CheckerKind,
        findings: Findings,
        files_checked: i64,
        message: impl Into<String>,
    ) -> Self {
        let success = findings.errors == 0;
        Self {
            checker,
            status: if success {
                OutcomeStatus::Passed
            } else {
                OutcomeStatus::Failed
            },
            success,
            error_count: findings.errors,
            warning_count: findings.warnings,
            files_checked,
            message: message.into(),
            duration_ms: 0,
        }
    }

    /// Nothing to check; succeeds without running the tool.
    pub fn trivial(checker: CheckerKind, files_checked: i64, message: impl Into<String>) -> Self {
        Self::from_findings(checker, Findings::default(), files_checked, message)
    }

    /// Disabled checker.
    pub fn skipped(checker: CheckerKind) -> Self {
        Self {
            checker,
            status: OutcomeStatus::Skipped,
            success: true,
            error_count: 0,
            warning_count: 0,
            files_checked: 0,
            message: "disabled".to_string(),
            duration_ms: 0,
        }
    }

    /// The checker failed before producing findings. Counts as one error.
    pub fn errored(checker: CheckerKind, message: impl Into<String>) -> Self {
        Self {
            checker,
            status: OutcomeStatus::Errored,
            success: false,
            error_count: 1,
            warning_count: 0,
            files_checked: 0,
            message: message.into(),
            duration_ms: 0,
        }
    }

    #[must_use]
    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    /// Whether this outcome counts toward totals and the overall verdict.
    #[must_use]
    pub fn is_counted(&self) -> bool {
        self.status != OutcomeStatus::Skipped
    }

    /// One-line summary.
    #[must_use]
    pub fn summary(&self) -> String {
        let files = match self.files_checked {
            WHOLE_PROJECT => "whole project".to_string(),
            1 => "1 file".to_string(),
            n => format!("{} files", n),
        };
        match self.status {
            OutcomeStatus::Skipped => format!("{}: SKIPPED (disabled)", self.checker),
            OutcomeStatus::Errored => format!("{}: ERRORED ({})", self.checker, self.message),
            OutcomeStatus::Passed if self.warning_count > 0 => format!(
                "{}: PASSED ({} warnings, {})",
                self.checker, self.warning_count, files
            ),
            OutcomeStatus::Passed => format!("{}: PASSED ({})", self.checker, files),
            OutcomeStatus::Failed => format!(
                "{}: FAILED ({} errors, {} warnings, {})",
                self.checker, self.error_count, self.warning_count, files
            ),
        }
    }
}

// ============================================================================
// Checker Trait
// ============================================================================

/// What a checker needs from its surroundings.
pub struct CheckContext<'a> {
    pub project_root: &'a Path,
    pub runner: &'a dyn ToolRunner,
}

/// One checker kind.
///
/// Implementors provide the command line and output parsing; [`Checker::run`]
/// provides the common sequence (empty-scope short circuit, preparation,
/// spawn, double-pass parse).
#[async_trait]
pub trait Checker: OutputParser + Send + Sync {
    /// Which checker this is.
    fn kind(&self) -> CheckerKind;

    /// Incremental or full.
    fn mode(&self) -> CheckMode;

    /// Paths this checker cares about.
    fn scope_rule(&self) -> &ScopeRule;

    /// A file that must exist in the project root for the checker to run.
    fn prerequisite(&self) -> Option<&'static str> {
        None
    }

    /// One-time setup before the tool runs.
    async fn prepare(&self, _ctx: &CheckContext<'_>) -> Result<()> {
        Ok(())
    }

    /// Command line for a scope.
    fn invocation(&self, scope: &ResolvedScope) -> ToolInvocation;

    /// Run the checker against a scope.
    ///
    /// # Errors
    ///
    /// Returns an error if preparation fails or the tool cannot be spawned.
    /// Findings are never errors.
    async fn run(&self, scope: &ResolvedScope, ctx: &CheckContext<'_>) -> Result<CheckOutcome> {
        let kind = self.kind();
        let started = Instant::now();

        let files_checked = match scope {
            ResolvedScope::Files(files) if files.is_empty() => {
                info!("{}: no files in scope, skipping tool run", kind);
                return Ok(CheckOutcome::trivial(kind, 0, "no changed files in scope"));
            }
            ResolvedScope::Files(files) => i64::try_from(files.len()).unwrap_or(i64::MAX),
            ResolvedScope::Patterns(_) => WHOLE_PROJECT,
        };

        self.prepare(ctx).await?;

        let invocation = self.invocation(scope);
        info!("{}: running {} ({} mode)", kind, invocation.tool, self.mode());
        debug!("{}: {}", kind, invocation.command_line());

        let output = ctx
            .runner
            .run(&invocation, ctx.project_root)
            .await
            .map_err(|e| GateError::tool(&invocation.tool, format!("{:#}", e)))?;

        let parsed = parse_double_pass(self, &output);
        if parsed.pass == ParsePass::Fallback {
            debug!("{}: direct parse found nothing, used marker fallback", kind);
        }

        let message = parsed.note.unwrap_or_else(|| {
            format!(
                "{} errors, {} warnings",
                parsed.findings.errors, parsed.findings.warnings
            )
        });
        let elapsed = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        Ok(CheckOutcome::from_findings(kind, parsed.findings, files_checked, message)
            .with_duration(elapsed))
    }
}

/// Scope entries as command-line arguments.
pub(crate) fn scope_args(scope: &ResolvedScope) -> Vec<String> {
    match scope {
        ResolvedScope::Files(files) => files.iter().map(str::to_string).collect(),
        ResolvedScope::Patterns(patterns) => patterns.clone(),
    }
}
