//! Type coverage checker.
//!
//! Always measures the whole project. Before the first measurement the
//! project is provisioned (see [`crate::quality::provision`]).

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use tracing::info;

use super::{CheckContext, Checker, CheckerKind};
use crate::changes::{CheckMode, ResolvedScope, ScopeRule};
use crate::error::Result;
use crate::quality::parser::{Findings, OutputParser};
use crate::quality::provision::{ensure_provisioned, ManifestUpdate, MANIFEST};
use crate::quality::ToolInvocation;

/// Default pass threshold in percent.
pub const DEFAULT_THRESHOLD: f64 = 90.0;

const BELOW_TARGET: &str = "lower than the target";

// `1234 / 1300 94.92%`
static RATE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(\d+)\s*/\s*(\d+)\s+(\d+(?:\.\d+)?)%").ok());

// `/repo/src/a.ts:3:7: payload`
static DETAIL: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^\S+:\d+:\d+:\s+\S").ok());

/// Runs `npx type-coverage --at-least <threshold> --detail`.
#[derive(Debug, Clone)]
pub struct CoverageChecker {
    threshold: f64,
    scope: ScopeRule,
}

impl CoverageChecker {
    #[must_use]
    pub fn new(threshold: f64, scope: ScopeRule) -> Self {
        Self { threshold, scope }
    }

    #[must_use]
    pub fn threshold(&self) -> f64 {
        self.threshold
    }
}

impl OutputParser for CoverageChecker {
    fn parse_direct(&self, text: &str) -> Findings {
        let warnings = DETAIL.as_ref().map_or(0, |re| {
            let count = text.lines().filter(|line| re.is_match(line)).count();
            u32::try_from(count).unwrap_or(u32::MAX)
        });

        let below = RATE
            .as_ref()
            .and_then(|re| re.captures_iter(text).last())
            .and_then(|caps| caps[3].parse::<f64>().ok())
            .is_some_and(|rate| rate < self.threshold);

        Findings::new(u32::from(below), warnings)
    }

    fn parse_fallback(&self, text: &str) -> Findings {
        Findings::new(u32::from(text.contains(BELOW_TARGET)), 0)
    }
}

#[async_trait]
impl Checker for CoverageChecker {
    fn kind(&self) -> CheckerKind {
        CheckerKind::Coverage
    }

    fn mode(&self) -> CheckMode {
        CheckMode::Full
    }

    fn scope_rule(&self) -> &ScopeRule {
        &self.scope
    }

    fn prerequisite(&self) -> Option<&'static str> {
        Some(MANIFEST)
    }

    async fn prepare(&self, ctx: &CheckContext<'_>) -> Result<()> {
        let report = ensure_provisioned(ctx.project_root, ctx.runner, self.threshold).await?;
        if let Some(manager) = report.installed_with {
            info!("coverage: installed type-coverage with {}", manager.program());
        }
        if report.manifest == ManifestUpdate::Written {
            info!("coverage: updated {}", MANIFEST);
        }
        Ok(())
    }

    fn invocation(&self, _scope: &ResolvedScope) -> ToolInvocation {
        ToolInvocation::npx(
            "type-coverage",
            "type-coverage",
            ["--at-least".to_string(), self.threshold.to_string(), "--detail".to_string()],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changes::DEFAULT_EXTENSIONS;
    use crate::quality::checkers::{OutcomeStatus, WHOLE_PROJECT};
    use crate::testing::{MockToolRunner, ToolOutput};
    use tempfile::TempDir;

    fn checker(threshold: f64) -> CoverageChecker {
        CoverageChecker::new(threshold, ScopeRule::lint(["src"], DEFAULT_EXTENSIONS.iter().copied()))
    }

    #[test]
    fn test_rate_below_threshold_is_one_error() {
        let text = "/repo/src/a.ts:3:7: payload\n/repo/src/b.ts:1:1: data\n1200 / 1400 85.71%\n";
        assert_eq!(checker(90.0).parse_direct(text), Findings::new(1, 2));
        assert_eq!(checker(85.0).parse_direct(text), Findings::new(0, 2));
    }

    #[test]
    fn test_summary_line_is_not_a_detail_line() {
        assert_eq!(checker(90.0).parse_direct("1390 / 1400 99.28%\n"), Findings::default());
    }

    #[test]
    fn test_fallback_marker() {
        let text = "The type coverage rate(85.71%) is lower than the target(90%).";
        let coverage = checker(90.0);
        assert!(coverage.parse_direct(text).is_empty());
        assert_eq!(coverage.parse_fallback(text), Findings::new(1, 0));
    }

    #[test]
    fn test_invocation_carries_threshold() {
        let inv = checker(75.0).invocation(&ResolvedScope::Patterns(vec![]));
        assert_eq!(inv.command_line(), "npx type-coverage --at-least 75 --detail");
    }

    #[test]
    fn test_fractional_threshold() {
        let coverage = checker(99.5);
        assert_eq!(coverage.parse_direct("1392 / 1400 99.42%
"), Findings::new(1, 0));
        assert_eq!(coverage.parse_direct("1395 / 1400 99.64%
"), Findings::default());

        let inv = coverage.invocation(&ResolvedScope::Patterns(vec![]));
        assert_eq!(inv.command_line(), "npx type-coverage --at-least 99.5 --detail");
    }

    #[tokio::test]
    async fn test_run_provisions_then_measures() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join(MANIFEST), r#"{"name":"app"}"#).unwrap();
        let runner = MockToolRunner::new()
            .with_output("type-coverage", ToolOutput::failure(1, "900 / 1000 90.00%\n"));
        let ctx = CheckContext {
            project_root: temp.path(),
            runner: &runner,
        };

        let outcome = checker(95.0)
            .run(&ResolvedScope::Patterns(vec![]), &ctx)
            .await
            .unwrap();

        let tools: Vec<String> = runner.invocations().into_iter().map(|i| i.tool).collect();
        assert_eq!(tools, vec!["install", "type-coverage"]);
        assert_eq!(outcome.status, OutcomeStatus::Failed);
        assert_eq!(outcome.error_count, 1);
        assert_eq!(outcome.files_checked, WHOLE_PROJECT);

        let manifest = std::fs::read_to_string(temp.path().join(MANIFEST)).unwrap();
        assert!(manifest.contains("\"atLeast\": 95"));
    }
}
