//! Run orchestration.
//!
//! Runs the enabled checkers one after another in the fixed order
//! lint, type-check, coverage. A checker that fails unexpectedly becomes an
//! errored outcome; the remaining checkers still run.

use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::Utc;
use tracing::{info, warn};

use super::checkers::{
    CheckContext, CheckOutcome, Checker, CheckerKind, CoverageChecker, LintChecker,
    TypeCheckChecker,
};
use super::report::AggregateReport;
use crate::changes::{
    filter, ChangeSetRequest, ChangeSetResolver, CheckMode, DeployContext, Resolution,
    ResolvedScope, ScopeRule,
};
use crate::config::RunConfig;
use crate::error::{GateError, Result};
use crate::testing::{GitOperations, ToolRunner};

/// Runs checkers and aggregates their outcomes.
pub struct RunOrchestrator<'a> {
    project_root: PathBuf,
    git: &'a dyn GitOperations,
    runner: &'a dyn ToolRunner,
    /// Unused slots are `None` (disabled).
    checkers: Vec<(CheckerKind, Option<Box<dyn Checker>>)>,
    request: ChangeSetRequest,
}

impl<'a> RunOrchestrator<'a> {
    /// Build the checker line-up from configuration.
    pub fn new(
        project_root: impl AsRef<Path>,
        config: &RunConfig,
        git: &'a dyn GitOperations,
        runner: &'a dyn ToolRunner,
    ) -> Self {
        Self {
            project_root: project_root.as_ref().to_path_buf(),
            git,
            runner,
            checkers: build_checkers(config),
            request: change_set_request(config),
        }
    }

    /// Replace a checker slot.
    #[must_use]
    pub fn with_checker(mut self, kind: CheckerKind, checker: Option<Box<dyn Checker>>) -> Self {
        if let Some(slot) = self.checkers.iter_mut().find(|(k, _)| *k == kind) {
            slot.1 = checker;
        }
        self
    }

    /// The incremental change-set request this run uses.
    #[must_use]
    pub fn request(&self) -> &ChangeSetRequest {
        &self.request
    }

    /// Run every checker in order.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::NotARepository`] when the project is not inside
    /// a git working tree. Checker failures are reported as outcomes.
    pub async fn run(&self) -> Result<AggregateReport> {
        let started_at = Utc::now();

        if !self.git.is_work_tree() {
            return Err(GateError::NotARepository {
                path: self.project_root.clone(),
            });
        }

        let ctx = CheckContext {
            project_root: &self.project_root,
            runner: self.runner,
        };

        let mut resolution: Option<Resolution> = None;
        let mut outcomes = Vec::with_capacity(self.checkers.len());

        for (kind, checker) in &self.checkers {
            let Some(checker) = checker else {
                info!("{}: disabled", kind);
                outcomes.push(CheckOutcome::skipped(*kind));
                continue;
            };

            let started = Instant::now();
            let outcome = self
                .run_checker(checker.as_ref(), &ctx, &mut resolution)
                .await
                .unwrap_or_else(|e| {
                    warn!("{}: {}", kind, e);
                    CheckOutcome::errored(*kind, e.to_string())
                });
            let elapsed = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

            info!("{}", outcome.summary());
            outcomes.push(outcome.with_duration(elapsed));
        }

        Ok(AggregateReport::new(started_at, outcomes).with_resolution(resolution))
    }

    async fn run_checker(
        &self,
        checker: &dyn Checker,
        ctx: &CheckContext<'_>,
        resolution: &mut Option<Resolution>,
    ) -> Result<CheckOutcome> {
        let kind = checker.kind();

        if let Some(file) = checker.prerequisite() {
            if !self.project_root.join(file).exists() {
                info!("{}: {} not found, nothing to check", kind, file);
                return Ok(CheckOutcome::trivial(
                    kind,
                    0,
                    format!("{} not found, nothing to check", file),
                ));
            }
        }

        let scope = match checker.mode() {
            CheckMode::Full => {
                let full = ChangeSetRequest::full(checker.scope_rule().clone());
                ChangeSetResolver::new(self.git).resolve(&full).scope
            }
            CheckMode::Incremental => {
                let resolved = resolution
                    .get_or_insert_with(|| ChangeSetResolver::new(self.git).resolve(&self.request));
                let changes = resolved.change_set().cloned().unwrap_or_default();
                let scoped = filter(&changes, checker.scope_rule(), &self.project_root)?;
                info!("{}: {} of {} changed files in scope", kind, scoped.len(), changes.len());
                ResolvedScope::Files(scoped)
            }
        };

        checker.run(&scope, ctx).await
    }
}

/// The incremental request implied by configuration.
#[must_use]
pub fn change_set_request(config: &RunConfig) -> ChangeSetRequest {
    let branches = &config.branches;
    let request = ChangeSetRequest::incremental(branches.target.clone())
        .with_source(branches.source.as_deref());

    if branches.branch_deploy {
        request.with_deploy_context(DeployContext {
            deploy_branch: branches.deploy.clone(),
            mainline_branch: branches.mainline.clone(),
        })
    } else {
        request
    }
}

/// Scope rule for one checker kind.
#[must_use]
pub fn scope_rule_for(kind: CheckerKind, config: &RunConfig) -> ScopeRule {
    let dirs = &config.scope.directories;
    let exts = &config.scope.extensions;
    let rule = match kind {
        CheckerKind::TypeCheck => ScopeRule::type_check(dirs, exts),
        CheckerKind::Lint | CheckerKind::Coverage => ScopeRule::lint(dirs, exts),
    };
    rule.with_excludes(&config.scope.exclude)
}

fn build_checkers(config: &RunConfig) -> Vec<(CheckerKind, Option<Box<dyn Checker>>)> {
    CheckerKind::ORDER
        .iter()
        .map(|&kind| {
            let rule = scope_rule_for(kind, config);
            let checker: Option<Box<dyn Checker>> = match kind {
                CheckerKind::Lint => config.lint.enabled.then(|| {
                    Box::new(
                        LintChecker::new(config.lint.mode(), rule).with_args(config.lint.args.clone()),
                    ) as Box<dyn Checker>
                }),
                CheckerKind::TypeCheck => config.type_check.enabled.then(|| {
                    Box::new(TypeCheckChecker::new(config.type_check.mode(), rule)) as Box<dyn Checker>
                }),
                CheckerKind::Coverage => config.coverage.enabled.then(|| {
                    Box::new(CoverageChecker::new(config.coverage.threshold, rule)) as Box<dyn Checker>
                }),
            };
            (kind, checker)
        })
        .collect()
}
