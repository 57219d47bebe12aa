//! TypeScript compiler checker.

use std::sync::LazyLock;

use regex::Regex;

use super::{scope_args, Checker, CheckerKind};
use crate::changes::{CheckMode, ResolvedScope, ScopeRule};
use crate::quality::parser::{parse_count, Findings, OutputParser};
use crate::quality::ToolInvocation;

/// Project file that must exist for type checking to run.
pub const TSCONFIG: &str = "tsconfig.json";

// `src/a.ts(10,5): error TS2322: ...` and the pretty form
// `src/a.ts:10:5 - error TS2322: ...`
static DIAGNOSTIC: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"^\S.*?(?:\(\d+,\d+\):|:\d+:\d+ -)\s+(error|warning)\s+TS\d+:").ok()
});

// `Found 3 errors in 2 files.` / `Found 1 error.`
static FOUND: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"Found (\d+) errors?").ok());

/// Runs `npx tsc --noEmit`.
#[derive(Debug, Clone)]
pub struct TypeCheckChecker {
    mode: CheckMode,
    scope: ScopeRule,
}

impl TypeCheckChecker {
    #[must_use]
    pub fn new(mode: CheckMode, scope: ScopeRule) -> Self {
        Self { mode, scope }
    }
}

impl OutputParser for TypeCheckChecker {
    fn parse_direct(&self, text: &str) -> Findings {
        let Some(diagnostic) = DIAGNOSTIC.as_ref() else {
            return Findings::default();
        };
        text.lines()
            .filter_map(|line| diagnostic.captures(line))
            .fold(Findings::default(), |acc, caps| match &caps[1] {
                "error" => acc + Findings::new(1, 0),
                _ => acc + Findings::new(0, 1),
            })
    }

    fn parse_fallback(&self, text: &str) -> Findings {
        if let Some(caps) = FOUND.as_ref().and_then(|re| re.captures(text)) {
            let found = parse_count(&caps[1]);
            if found > 0 {
                return Findings::new(found, 0);
            }
        }
        let marked = text.lines().filter(|l| l.contains("error TS")).count();
        Findings::new(u32::try_from(marked).unwrap_or(u32::MAX), 0)
    }
}

impl Checker for TypeCheckChecker {
    fn kind(&self) -> CheckerKind {
        CheckerKind::TypeCheck
    }

    fn mode(&self) -> CheckMode {
        self.mode
    }

    fn scope_rule(&self) -> &ScopeRule {
        &self.scope
    }

    fn prerequisite(&self) -> Option<&'static str> {
        Some(TSCONFIG)
    }

    fn invocation(&self, scope: &ResolvedScope) -> ToolInvocation {
        let base = ToolInvocation::npx("tsc", "tsc", ["--noEmit"]);
        match scope {
            ResolvedScope::Files(_) => base
                .with_args(["--skipLibCheck"])
                .with_args(scope_args(scope)),
            ResolvedScope::Patterns(_) => base.with_args(["-p", TSCONFIG]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changes::{ChangeSet, DEFAULT_EXTENSIONS};
    use crate::quality::checkers::{CheckContext, WHOLE_PROJECT};
    use crate::testing::{MockToolRunner, ToolOutput};
    use std::path::Path;

    fn checker(mode: CheckMode) -> TypeCheckChecker {
        TypeCheckChecker::new(mode, ScopeRule::type_check(["src"], DEFAULT_EXTENSIONS.iter().copied()))
    }

    #[test]
    fn test_parses_classic_and_pretty_diagnostics() {
        let text = "\
src/a.ts(3,7): error TS2322: Type 'string' is not assignable to type 'number'.
src/b.ts:10:1 - error TS2304: Cannot find name 'foo'.
src/c.ts(1,1): warning TS6133: 'x' is declared but never read.
    at some continuation line error TS9999: indented, ignored
";
        let findings = checker(CheckMode::Incremental).parse_direct(text);
        assert_eq!(findings, Findings::new(2, 1));
    }

    #[test]
    fn test_fallback_uses_found_summary() {
        let tsc = checker(CheckMode::Full);
        assert!(tsc.parse_direct("\nFound 3 errors in 2 files.\n").is_empty());
        assert_eq!(tsc.parse_fallback("\nFound 3 errors in 2 files.\n"), Findings::new(3, 0));
    }

    #[test]
    fn test_fallback_counts_global_errors() {
        let text = "error TS5023: Unknown compiler option 'foo'.\nerror TS6053: File 'x' not found.\n";
        let tsc = checker(CheckMode::Full);
        assert!(tsc.parse_direct(text).is_empty());
        assert_eq!(tsc.parse_fallback(text), Findings::new(2, 0));
    }

    #[test]
    fn test_incremental_invocation_skips_lib_check() {
        let files: ChangeSet = ["src/a.ts".to_string()].into_iter().collect();
        let inv = checker(CheckMode::Incremental).invocation(&ResolvedScope::Files(files));
        assert_eq!(inv.command_line(), "npx tsc --noEmit --skipLibCheck src/a.ts");
    }

    #[test]
    fn test_full_invocation_uses_project_file() {
        let inv = checker(CheckMode::Full).invocation(&ResolvedScope::Patterns(vec!["src/**/*.ts".into()]));
        assert_eq!(inv.command_line(), "npx tsc --noEmit -p tsconfig.json");
    }

    #[tokio::test]
    async fn test_full_run_reports_whole_project() {
        let output = ToolOutput::failure(2, "src/a.ts(3,7): error TS2322: nope\n");
        let runner = MockToolRunner::new().with_output("tsc", output);
        let ctx = CheckContext {
            project_root: Path::new("."),
            runner: &runner,
        };

        let outcome = checker(CheckMode::Full)
            .run(&ResolvedScope::Patterns(vec![]), &ctx)
            .await
            .unwrap();

        assert!(!outcome.success);
        assert_eq!(outcome.error_count, 1);
        assert_eq!(outcome.files_checked, WHOLE_PROJECT);
    }
}
