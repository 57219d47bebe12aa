//! Branch-deploy traversal.
//!
//! In a branch-deploy pipeline every feature branch is merged into a deploy
//! branch before it reaches mainline. Diffing the deploy branch against
//! mainline would pick up every branch merged so far, so instead we isolate
//! the branch brought in by the most recent merge:
//!
//! 1. [`TraversalStep::LatestMerge`]: newest merge on the deploy branch's
//!    first-parent history.
//! 2. [`TraversalStep::MergeParents`]: its second parent is the merged tip
//!    ("devEnd").
//! 3. [`TraversalStep::VerifyDevEnd`]: devEnd must be a readable commit.
//! 4. [`TraversalStep::DivergencePoint`]: merge-base of mainline and devEnd.
//! 5. [`TraversalStep::FeatureDiff`]: `git diff --name-only base devEnd`.
//!
//! Each step either fills in the traversal state or returns a [`Fallback`].
//! The caller falls back to a direct diff on any [`Fallback`].

use tracing::debug;

use super::{resolve_branch, ChangeSet, DeployContext, NoteLevel, ResolutionNote};
use crate::testing::{GitOperations, LogFilter};

/// One named step of the traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraversalStep {
    LatestMerge,
    MergeParents,
    VerifyDevEnd,
    DivergencePoint,
    FeatureDiff,
}

impl TraversalStep {
    /// Steps in execution order.
    pub const ORDER: [TraversalStep; 5] = [
        TraversalStep::LatestMerge,
        TraversalStep::MergeParents,
        TraversalStep::VerifyDevEnd,
        TraversalStep::DivergencePoint,
        TraversalStep::FeatureDiff,
    ];

    /// Short name used in diagnostics.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::LatestMerge => "latest-merge",
            Self::MergeParents => "merge-parents",
            Self::VerifyDevEnd => "verify-dev-end",
            Self::DivergencePoint => "divergence-point",
            Self::FeatureDiff => "feature-diff",
        }
    }
}

impl std::fmt::Display for TraversalStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Signal that a step's structural assumption did not hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fallback {
    pub step: TraversalStep,
    pub level: NoteLevel,
    pub reason: String,
}

impl Fallback {
    fn warning(step: TraversalStep, reason: impl Into<String>) -> Self {
        Self {
            step,
            level: NoteLevel::Warning,
            reason: reason.into(),
        }
    }

    fn error(step: TraversalStep, reason: impl Into<String>) -> Self {
        Self {
            step,
            level: NoteLevel::Error,
            reason: reason.into(),
        }
    }

    /// Render as a resolution note at the fallback's level.
    #[must_use]
    pub fn to_note(&self) -> ResolutionNote {
        ResolutionNote {
            level: self.level,
            message: format!(
                "Branch deploy {} failed ({}), falling back to direct diff",
                self.step, self.reason
            ),
        }
    }
}

/// A successful traversal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchDeployHit {
    pub merge_commit: String,
    pub mainline_tip: String,
    pub dev_end: String,
    pub base: String,
    pub files: ChangeSet,
}

/// Traversal result plus any notes recorded along the way.
#[derive(Debug)]
pub struct TraversalReport {
    pub result: Result<BranchDeployHit, Fallback>,
    pub notes: Vec<ResolutionNote>,
}

#[derive(Debug, Default)]
struct TraversalState {
    merge_commit: Option<String>,
    mainline_tip: Option<String>,
    dev_end: Option<String>,
    base: Option<String>,
    files: Option<ChangeSet>,
}

impl TraversalState {
    fn into_hit(self) -> Option<BranchDeployHit> {
        Some(BranchDeployHit {
            merge_commit: self.merge_commit?,
            mainline_tip: self.mainline_tip?,
            dev_end: self.dev_end?,
            base: self.base?,
            files: self.files?,
        })
    }
}

struct Traversal<'a> {
    git: &'a dyn GitOperations,
    context: &'a DeployContext,
    remote: &'a str,
    notes: Vec<ResolutionNote>,
}

/// Run every step in order, stopping at the first fallback.
pub fn traverse(git: &dyn GitOperations, context: &DeployContext, remote: &str) -> TraversalReport {
    let mut traversal = Traversal {
        git,
        context,
        remote,
        notes: Vec::new(),
    };
    let mut state = TraversalState::default();

    for step in TraversalStep::ORDER {
        if let Err(fallback) = traversal.run(step, &mut state) {
            return TraversalReport {
                result: Err(fallback),
                notes: traversal.notes,
            };
        }
    }

    let result = state.into_hit().ok_or_else(|| {
        Fallback::error(TraversalStep::FeatureDiff, "traversal finished without a result")
    });
    TraversalReport {
        result,
        notes: traversal.notes,
    }
}

impl Traversal<'_> {
    fn run(&mut self, step: TraversalStep, state: &mut TraversalState) -> Result<(), Fallback> {
        debug!("Branch deploy step: {}", step);
        match step {
            TraversalStep::LatestMerge => self.latest_merge(state),
            TraversalStep::MergeParents => self.merge_parents(state),
            TraversalStep::VerifyDevEnd => self.verify_dev_end(state),
            TraversalStep::DivergencePoint => self.divergence_point(state),
            TraversalStep::FeatureDiff => self.feature_diff(state),
        }
    }

    fn latest_merge(&mut self, state: &mut TraversalState) -> Result<(), Fallback> {
        let step = TraversalStep::LatestMerge;
        let deploy = resolve_branch(self.git, self.remote, self.context.deploy_ref());
        let deploy = deploy.as_str();
        let filter = LogFilter::new().merges_only().first_parent().max_count(1);

        let commits = self
            .git
            .log(deploy, &filter)
            .map_err(|e| Fallback::error(step, format!("git log {}: {}", deploy, e)))?;

        match commits.into_iter().next() {
            Some(merge) => {
                debug!("Latest merge on {}: {}", deploy, merge);
                state.merge_commit = Some(merge);
                Ok(())
            }
            None => Err(Fallback::warning(
                step,
                format!("no merge commit found on {}", deploy),
            )),
        }
    }

    fn merge_parents(&mut self, state: &mut TraversalState) -> Result<(), Fallback> {
        let step = TraversalStep::MergeParents;
        let merge = required(&state.merge_commit, step)?;

        let parents = self
            .git
            .parents(merge)
            .map_err(|e| Fallback::error(step, format!("reading parents of {}: {}", merge, e)))?;

        if parents.len() < 2 {
            return Err(Fallback::warning(
                step,
                format!("{} has {} parent(s), expected 2", merge, parents.len()),
            ));
        }

        let mut parents = parents.into_iter();
        state.mainline_tip = parents.next();
        state.dev_end = parents.next();
        Ok(())
    }

    fn verify_dev_end(&mut self, state: &mut TraversalState) -> Result<(), Fallback> {
        let step = TraversalStep::VerifyDevEnd;
        let dev_end = required(&state.dev_end, step)?;

        if self.git.commit_exists(dev_end) {
            Ok(())
        } else {
            Err(Fallback::error(
                step,
                format!("merged tip {} is not a readable commit", dev_end),
            ))
        }
    }

    fn divergence_point(&mut self, state: &mut TraversalState) -> Result<(), Fallback> {
        let step = TraversalStep::DivergencePoint;
        let dev_end = required(&state.dev_end, step)?;
        let mainline = self.mainline_ref();

        let base = self.git.merge_base(&mainline, dev_end).map_err(|e| {
            Fallback::warning(step, format!("merge-base {} {}: {}", mainline, dev_end, e))
        })?;

        debug!("Feature branch diverged from {} at {}", mainline, base);
        state.base = Some(base);
        Ok(())
    }

    fn feature_diff(&mut self, state: &mut TraversalState) -> Result<(), Fallback> {
        let step = TraversalStep::FeatureDiff;
        let base = required(&state.base, step)?;
        let dev_end = required(&state.dev_end, step)?;

        let files = self
            .git
            .diff_names(base, dev_end)
            .map_err(|e| Fallback::error(step, format!("diff {}..{}: {}", base, dev_end, e)))?;

        state.files = Some(files.into_iter().collect());
        Ok(())
    }

    /// `<remote>/<mainline>`, or the local branch when the remote ref is
    /// missing.
    fn mainline_ref(&mut self) -> String {
        let mainline = &self.context.mainline_branch;
        let remote_ref = format!("{}/{}", self.remote, mainline);
        if !self.git.commit_exists(&remote_ref) && self.git.commit_exists(mainline) {
            self.notes.push(ResolutionNote::info(format!(
                "{} not found, using local {}",
                remote_ref, mainline
            )));
            return mainline.clone();
        }
        remote_ref
    }
}

fn required(value: &Option<String>, step: TraversalStep) -> Result<&str, Fallback> {
    value
        .as_deref()
        .ok_or_else(|| Fallback::error(step, "previous step produced no commit"))
}
