//! ESLint checker.

use std::sync::LazyLock;

use regex::Regex;

use super::{scope_args, Checker, CheckerKind};
use crate::changes::{CheckMode, ResolvedScope, ScopeRule};
use crate::quality::parser::{count_marker_lines, parse_count, Findings, OutputParser};
use crate::quality::ToolInvocation;

// `✖ 3 problems (2 errors, 1 warning)`
static SUMMARY: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(\d+)\s+problems?\s+\((\d+)\s+errors?,\s+(\d+)\s+warnings?\)").ok()
});

// `  12:5  error  'x' is defined but never used  no-unused-vars`
static FINDING: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^\s*\d+:\d+\s+(error|warning)\s").ok());

/// Runs `npx eslint` over changed files or the configured globs.
#[derive(Debug, Clone)]
pub struct LintChecker {
    mode: CheckMode,
    scope: ScopeRule,
    extra_args: Vec<String>,
}

impl LintChecker {
    #[must_use]
    pub fn new(mode: CheckMode, scope: ScopeRule) -> Self {
        Self {
            mode,
            scope,
            extra_args: Vec::new(),
        }
    }

    /// Extra arguments placed before the scope arguments.
    #[must_use]
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.extra_args = args;
        self
    }
}

impl OutputParser for LintChecker {
    fn parse_direct(&self, text: &str) -> Findings {
        if let Some(caps) = SUMMARY.as_ref().and_then(|re| re.captures_iter(text).last()) {
            return Findings::new(parse_count(&caps[2]), parse_count(&caps[3]));
        }

        let Some(finding) = FINDING.as_ref() else {
            return Findings::default();
        };
        text.lines()
            .filter_map(|line| finding.captures(line))
            .fold(Findings::default(), |acc, caps| match &caps[1] {
                "error" => acc + Findings::new(1, 0),
                _ => acc + Findings::new(0, 1),
            })
    }

    fn parse_fallback(&self, text: &str) -> Findings {
        Findings::new(
            count_marker_lines(text, &["error"]),
            count_marker_lines(text, &["warning"]),
        )
    }
}

impl Checker for LintChecker {
    fn kind(&self) -> CheckerKind {
        CheckerKind::Lint
    }

    fn mode(&self) -> CheckMode {
        self.mode
    }

    fn scope_rule(&self) -> &ScopeRule {
        &self.scope
    }

    fn invocation(&self, scope: &ResolvedScope) -> ToolInvocation {
        let mut invocation = ToolInvocation::npx("eslint", "eslint", self.extra_args.iter().cloned());
        if matches!(scope, ResolvedScope::Patterns(_)) {
            invocation = invocation.with_args(["--no-error-on-unmatched-pattern"]);
        }
        invocation.with_args(scope_args(scope))
    }
}
