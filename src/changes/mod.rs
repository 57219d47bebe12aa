//! Change-set resolution.
//!
//! This module decides which files a gate run should look at. It supports
//! three strategies:
//!
//! - **Full**: no history is read; the result is a pattern set covering every
//!   (include directory, extension) pair, for the checker to expand itself.
//! - **Direct**: `git diff --name-only <target> <source|HEAD>`.
//! - **Branch deploy**: the files introduced by the feature branch most
//!   recently merged into the deploy branch, measured from its divergence
//!   point with mainline (see [`branch_deploy`]). Any failed assumption falls
//!   back to the direct strategy.
//!
//! Resolution never fails. Problems are returned as [`ResolutionNote`]s and
//! the worst case is an empty change-set.
//!
//! # Example
//!
//! ```rust,ignore
//! use diffgate::changes::{ChangeSetRequest, ChangeSetResolver};
//!
//! let resolver = ChangeSetResolver::new(&git);
//! let resolution = resolver.resolve(&ChangeSetRequest::incremental("master"));
//! for note in &resolution.notes {
//!     eprintln!("{}", note);
//! }
//! ```

pub mod branch_deploy;
pub mod scope;

pub use branch_deploy::{BranchDeployHit, Fallback, TraversalStep};
pub use scope::{filter, ScopeMatcher, ScopeRule, DEFAULT_EXTENSIONS};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::testing::GitOperations;

/// Remote that branch names are resolved against.
pub const DEFAULT_REMOTE: &str = "origin";

/// The symbolic ref for "whatever is checked out".
pub const CURRENT_REF: &str = "HEAD";

// ============================================================================
// Request Types
// ============================================================================

/// Whether a checker looks at changed files or the whole project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckMode {
    /// Only files in the change-set.
    Incremental,
    /// The whole configured scope.
    Full,
}

impl std::fmt::Display for CheckMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Incremental => write!(f, "incremental"),
            Self::Full => write!(f, "full"),
        }
    }
}

/// Branches involved in a branch-deploy pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployContext {
    /// Branch feature branches are merged into; `None` means `HEAD`.
    pub deploy_branch: Option<String>,
    /// Branch feature branches are cut from.
    pub mainline_branch: String,
}

impl DeployContext {
    /// Create a context with an explicit deploy branch.
    pub fn new(deploy_branch: impl Into<String>, mainline_branch: impl Into<String>) -> Self {
        Self {
            deploy_branch: Some(deploy_branch.into()),
            mainline_branch: mainline_branch.into(),
        }
    }

    /// Create a context that deploys from the checked-out commit.
    pub fn from_head(mainline_branch: impl Into<String>) -> Self {
        Self {
            deploy_branch: None,
            mainline_branch: mainline_branch.into(),
        }
    }

    /// The deploy branch, defaulting to `HEAD`.
    #[must_use]
    pub fn deploy_ref(&self) -> &str {
        self.deploy_branch.as_deref().unwrap_or(CURRENT_REF)
    }
}

/// Everything needed to resolve one change-set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeSetRequest {
    /// Incremental or full.
    pub mode: CheckMode,
    /// Diff end; `None` means the current `HEAD`.
    pub source_ref: Option<String>,
    /// Diff start.
    pub target_ref: String,
    /// Present only in branch-deploy mode.
    pub deploy_context: Option<DeployContext>,
    /// Scope rule expanded into patterns in full mode.
    pub scope: Option<ScopeRule>,
}

impl ChangeSetRequest {
    /// Diff `target..HEAD`.
    pub fn incremental(target_ref: impl Into<String>) -> Self {
        Self {
            mode: CheckMode::Incremental,
            source_ref: None,
            target_ref: target_ref.into(),
            deploy_context: None,
            scope: None,
        }
    }

    /// Pattern set over a scope rule; no history is consulted.
    pub fn full(scope: ScopeRule) -> Self {
        Self {
            mode: CheckMode::Full,
            source_ref: None,
            target_ref: String::new(),
            deploy_context: None,
            scope: Some(scope),
        }
    }

    /// Set the diff end. `*`, empty and whitespace mean the current ref.
    #[must_use]
    pub fn with_source(mut self, source_ref: Option<&str>) -> Self {
        self.source_ref = normalize_source_ref(source_ref);
        self
    }

    /// Switch to branch-deploy resolution.
    #[must_use]
    pub fn with_deploy_context(mut self, context: DeployContext) -> Self {
        self.deploy_context = Some(context);
        self
    }
}

/// Map the "current ref" spellings (`*`, empty) to `None`.
#[must_use]
pub fn normalize_source_ref(source_ref: Option<&str>) -> Option<String> {
    source_ref
        .map(str::trim)
        .filter(|s| !s.is_empty() && *s != "*")
        .map(str::to_string)
}

// ============================================================================
// Change Set
// ============================================================================

/// Ordered, deduplicated repository-relative paths.
///
/// Order is first-seen order from the underlying diff. Empty means
/// "nothing to check".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ChangeSet {
    paths: Vec<String>,
}

impl ChangeSet {
    /// An empty change-set.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// All paths in diff order.
    #[must_use]
    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    /// Iterate over paths.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.paths.iter().map(String::as_str)
    }

    /// Number of paths.
    #[must_use]
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Whether there is nothing to check.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Whether a path is part of the set.
    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.paths.iter().any(|p| p == path)
    }
}

impl FromIterator<String> for ChangeSet {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        let mut paths: Vec<String> = Vec::new();
        for raw in iter {
            let trimmed = raw.trim();
            let path = trimmed.strip_prefix("./").unwrap_or(trimmed);
            if path.is_empty() || paths.iter().any(|p| p == path) {
                continue;
            }
            paths.push(path.to_string());
        }
        Self { paths }
    }
}

impl<'a> IntoIterator for &'a ChangeSet {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.paths.iter()
    }
}

// ============================================================================
// Resolution Result
// ============================================================================

/// Severity of a resolution note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoteLevel {
    Info,
    Warning,
    Error,
}

/// An advisory diagnostic produced while resolving.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolutionNote {
    pub level: NoteLevel,
    pub message: String,
}

impl ResolutionNote {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoteLevel::Info,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NoteLevel::Warning,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoteLevel::Error,
            message: message.into(),
        }
    }

    /// Emit the note through `tracing` at its level.
    pub fn log(&self) {
        match self.level {
            NoteLevel::Info => info!("{}", self.message),
            NoteLevel::Warning => warn!("{}", self.message),
            NoteLevel::Error => error!("{}", self.message),
        }
    }
}

impl std::fmt::Display for ResolutionNote {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tag = match self.level {
            NoteLevel::Info => "info",
            NoteLevel::Warning => "warning",
            NoteLevel::Error => "error",
        };
        write!(f, "[{}] {}", tag, self.message)
    }
}

/// Which strategy produced a resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStrategy {
    /// Pattern set, no history read.
    FullScope,
    /// Two-ref diff.
    Direct,
    /// Feature branch isolated from the deploy branch's last merge.
    BranchDeploy,
    /// Branch deploy was requested but degraded to a direct diff.
    DirectFallback,
}

/// What a checker is handed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "entries", rename_all = "lowercase")]
pub enum ResolvedScope {
    /// Concrete changed paths.
    Files(ChangeSet),
    /// Glob patterns describing the whole scope.
    Patterns(Vec<String>),
}

/// The outcome of [`ChangeSetResolver::resolve`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub scope: ResolvedScope,
    pub strategy: ResolutionStrategy,
    pub notes: Vec<ResolutionNote>,
}

impl Resolution {
    /// The concrete change-set, if this is an incremental resolution.
    #[must_use]
    pub fn change_set(&self) -> Option<&ChangeSet> {
        match &self.scope {
            ResolvedScope::Files(files) => Some(files),
            ResolvedScope::Patterns(_) => None,
        }
    }

    /// Whether anything at warning level or above was recorded.
    #[must_use]
    pub fn has_warnings(&self) -> bool {
        self.notes.iter().any(|n| n.level >= NoteLevel::Warning)
    }
}

// ============================================================================
// Resolver
// ============================================================================

/// Turns a [`ChangeSetRequest`] into a [`Resolution`].
pub struct ChangeSetResolver<'a> {
    git: &'a dyn GitOperations,
    remote: String,
}

impl<'a> ChangeSetResolver<'a> {
    /// Create a resolver that resolves branches against `origin`.
    pub fn new(git: &'a dyn GitOperations) -> Self {
        Self {
            git,
            remote: DEFAULT_REMOTE.to_string(),
        }
    }

    /// Resolve a request. Never fails; see [`Resolution::notes`].
    pub fn resolve(&self, request: &ChangeSetRequest) -> Resolution {
        let resolution = match request.mode {
            CheckMode::Full => Self::resolve_full(request),
            CheckMode::Incremental => self.resolve_incremental(request),
        };

        info!(
            "Resolved {} scope via {:?} ({} notes)",
            request.mode,
            resolution.strategy,
            resolution.notes.len()
        );
        resolution
    }

    fn resolve_full(request: &ChangeSetRequest) -> Resolution {
        let patterns = request
            .scope
            .as_ref()
            .map(ScopeRule::full_patterns)
            .unwrap_or_default();

        Resolution {
            scope: ResolvedScope::Patterns(patterns),
            strategy: ResolutionStrategy::FullScope,
            notes: Vec::new(),
        }
    }

    fn resolve_incremental(&self, request: &ChangeSetRequest) -> Resolution {
        let mut notes = Vec::new();

        if let Err(e) = self.git.fetch(&self.remote) {
            notes.push(ResolutionNote::warning(format!(
                "Could not fetch '{}', using local refs: {}",
                self.remote, e
            )));
        }

        let Some(context) = &request.deploy_context else {
            let source = request.source_ref.as_deref();
            let files = self.direct_diff(&request.target_ref, source, &mut notes);
            return finish(ResolvedScope::Files(files), ResolutionStrategy::Direct, notes);
        };

        if let Some(source) = &request.source_ref {
            notes.push(ResolutionNote::warning(format!(
                "Source branch '{}' is ignored in branch-deploy mode",
                source
            )));
        }

        let report = branch_deploy::traverse(self.git, context, &self.remote);
        notes.extend(report.notes);

        match report.result {
            Ok(hit) => {
                debug!(
                    "Branch deploy: merge {} brought in {} (diverged at {})",
                    hit.merge_commit, hit.dev_end, hit.base
                );
                finish(
                    ResolvedScope::Files(hit.files),
                    ResolutionStrategy::BranchDeploy,
                    notes,
                )
            }
            Err(fallback) => {
                notes.push(fallback.to_note());
                let files = self.direct_diff(&request.target_ref, None, &mut notes);
                finish(
                    ResolvedScope::Files(files),
                    ResolutionStrategy::DirectFallback,
                    notes,
                )
            }
        }
    }

    /// `git diff --name-only <target> <source|HEAD>`; failures yield an
    /// empty change-set and an error note.
    fn direct_diff(
        &self,
        target_ref: &str,
        source_ref: Option<&str>,
        notes: &mut Vec<ResolutionNote>,
    ) -> ChangeSet {
        let target = self.resolve_ref(target_ref);
        let source = source_ref.map_or_else(|| CURRENT_REF.to_string(), |s| self.resolve_ref(s));

        debug!("Direct diff {}..{}", target, source);
        match self.git.diff_names(&target, &source) {
            Ok(files) => files.into_iter().collect(),
            Err(e) => {
                notes.push(ResolutionNote::error(format!(
                    "Diff {}..{} failed, nothing to check: {}",
                    target, source, e
                )));
                ChangeSet::empty()
            }
        }
    }

    fn resolve_ref(&self, name: &str) -> String {
        resolve_branch(self.git, &self.remote, name)
    }
}

/// Prefer the name as given; use `<remote>/<name>` when only that exists.
///
/// `HEAD` and names that resolve nowhere are returned unchanged.
pub(crate) fn resolve_branch(git: &dyn GitOperations, remote: &str, name: &str) -> String {
    if name == CURRENT_REF || git.commit_exists(name) {
        return name.to_string();
    }
    let remote_ref = format!("{}/{}", remote, name);
    if git.commit_exists(&remote_ref) {
        debug!("Using {} for unresolved local ref {}", remote_ref, name);
        return remote_ref;
    }
    name.to_string()
}

fn finish(
    scope: ResolvedScope,
    strategy: ResolutionStrategy,
    notes: Vec<ResolutionNote>,
) -> Resolution {
    for note in &notes {
        note.log();
    }
    Resolution {
        scope,
        strategy,
        notes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockGitOperations;

    fn set(paths: &[&str]) -> ChangeSet {
        paths.iter().map(|p| p.to_string()).collect()
    }

    // =========================================================================
    // ChangeSet
    // =========================================================================

    #[test]
    fn test_change_set_dedupes_preserving_order() {
        let changes = set(&["b.ts", "./a.ts", "b.ts", "", "a.ts", "c.ts"]);
        assert_eq!(changes.paths(), ["b.ts", "a.ts", "c.ts"]);
        assert_eq!(changes.len(), 3);
        assert!(changes.contains("a.ts"));
    }

    #[test]
    fn test_normalize_source_ref() {
        assert_eq!(normalize_source_ref(None), None);
        assert_eq!(normalize_source_ref(Some("*")), None);
        assert_eq!(normalize_source_ref(Some("  ")), None);
        assert_eq!(normalize_source_ref(Some(" feature/x ")), Some("feature/x".to_string()));
    }

    // =========================================================================
    // Full mode
    // =========================================================================

    #[test]
    fn test_full_mode_returns_patterns_without_touching_git() {
        let git = MockGitOperations::new().with_fetch_error("must not be called");
        let rule = ScopeRule::new(["src", "packages/ui"], DEFAULT_EXTENSIONS.iter().copied());

        let resolution = ChangeSetResolver::new(&git).resolve(&ChangeSetRequest::full(rule));

        assert_eq!(resolution.strategy, ResolutionStrategy::FullScope);
        match resolution.scope {
            ResolvedScope::Patterns(patterns) => assert_eq!(patterns.len(), 10),
            other => panic!("expected patterns, got {:?}", other),
        }
        assert_eq!(git.fetch_count(), 0);
    }

    // =========================================================================
    // Direct mode
    // =========================================================================

    #[test]
    fn test_direct_mode_diffs_target_against_head() {
        let git = MockGitOperations::new()
            .with_commits(&["master"])
            .with_diff("master", "HEAD", &["src/a.ts", "docs/readme.md"]);

        let resolution = ChangeSetResolver::new(&git).resolve(&ChangeSetRequest::incremental("master"));

        assert_eq!(resolution.strategy, ResolutionStrategy::Direct);
        assert_eq!(resolution.change_set().unwrap(), &set(&["src/a.ts", "docs/readme.md"]));
        assert_eq!(git.fetch_count(), 1);
        assert!(!resolution.has_warnings());
    }

    #[test]
    fn test_direct_mode_uses_source_ref() {
        let git = MockGitOperations::new()
            .with_commits(&["master", "feature"])
            .with_diff("master", "feature", &["src/f.ts"]);

        let request = ChangeSetRequest::incremental("master").with_source(Some("feature"));
        let resolution = ChangeSetResolver::new(&git).resolve(&request);

        assert_eq!(resolution.change_set().unwrap(), &set(&["src/f.ts"]));
    }

    #[test]
    fn test_direct_mode_star_source_means_head() {
        let git = MockGitOperations::new().with_diff("master", "HEAD", &["x.ts"]);
        let request = ChangeSetRequest::incremental("master").with_source(Some("*"));
        let resolution = ChangeSetResolver::new(&git).resolve(&request);
        assert_eq!(resolution.change_set().unwrap(), &set(&["x.ts"]));
    }

    #[test]
    fn test_direct_mode_falls_back_to_remote_ref() {
        let git = MockGitOperations::new()
            .with_commits(&["origin/release"])
            .with_diff("origin/release", "HEAD", &["src/r.ts"]);

        let resolution = ChangeSetResolver::new(&git).resolve(&ChangeSetRequest::incremental("release"));
        assert_eq!(resolution.change_set().unwrap(), &set(&["src/r.ts"]));
    }

    #[test]
    fn test_fetch_failure_is_only_a_warning() {
        let git = MockGitOperations::new()
            .with_fetch_error("network unreachable")
            .with_diff("master", "HEAD", &["src/a.ts"]);

        let resolution = ChangeSetResolver::new(&git).resolve(&ChangeSetRequest::incremental("master"));

        assert_eq!(resolution.change_set().unwrap(), &set(&["src/a.ts"]));
        assert!(resolution.has_warnings());
    }

    #[test]
    fn test_unresolvable_target_gives_empty_set_and_error_note() {
        let git = MockGitOperations::new();
        let resolution = ChangeSetResolver::new(&git).resolve(&ChangeSetRequest::incremental("nope"));

        assert!(resolution.change_set().unwrap().is_empty());
        assert!(resolution.notes.iter().any(|n| n.level == NoteLevel::Error));
    }

    // =========================================================================
    // Branch deploy mode
    // =========================================================================

    fn deploy_history() -> MockGitOperations {
        MockGitOperations::new()
            .with_commits(&["master", "origin/master", "dev-end"])
            .with_log("deploy", &["merge-1"])
            .with_parents("merge-1", &["deploy-prev", "dev-end"])
            .with_merge_base("origin/master", "dev-end", "base-a")
            .with_diff("base-a", "dev-end", &["src/feature.ts", "src/util.ts"])
            .with_diff("master", "HEAD", &["src/everything.ts"])
    }

    #[test]
    fn test_branch_deploy_isolates_feature_files() {
        let git = deploy_history();
        let request = ChangeSetRequest::incremental("master")
            .with_deploy_context(DeployContext::new("deploy", "master"));

        let resolution = ChangeSetResolver::new(&git).resolve(&request);

        assert_eq!(resolution.strategy, ResolutionStrategy::BranchDeploy);
        assert_eq!(
            resolution.change_set().unwrap(),
            &set(&["src/feature.ts", "src/util.ts"])
        );
    }

    #[test]
    fn test_branch_deploy_with_remote_only_deploy_branch() {
        let git = MockGitOperations::new()
            .with_commits(&["origin/master", "origin/deploy", "B"])
            .with_log("origin/deploy", &["M"])
            .with_parents("M", &["deploy-tip", "B"])
            .with_merge_base("origin/master", "B", "A")
            .with_diff("A", "B", &["src/feature.ts"])
            .with_diff("origin/master", "HEAD", &["src/everything.ts"]);
        let request = ChangeSetRequest::incremental("master")
            .with_deploy_context(DeployContext::new("deploy", "master"));

        let resolution = ChangeSetResolver::new(&git).resolve(&request);

        assert_eq!(resolution.strategy, ResolutionStrategy::BranchDeploy);
        assert_eq!(resolution.change_set().unwrap(), &set(&["src/feature.ts"]));
        assert!(!resolution.has_warnings());
    }

    #[test]
    fn test_branch_deploy_without_merges_falls_back_to_direct() {
        let git = MockGitOperations::new()
            .with_commits(&["master"])
            .with_log("deploy", &[])
            .with_diff("master", "HEAD", &["src/direct.ts"]);
        let request = ChangeSetRequest::incremental("master")
            .with_deploy_context(DeployContext::new("deploy", "master"));

        let resolution = ChangeSetResolver::new(&git).resolve(&request);

        assert_eq!(resolution.strategy, ResolutionStrategy::DirectFallback);
        assert_eq!(resolution.change_set().unwrap(), &set(&["src/direct.ts"]));
        assert!(resolution
            .notes
            .iter()
            .any(|n| n.level == NoteLevel::Warning && n.message.contains("merge")));
    }

    #[test]
    fn test_branch_deploy_fallback_matches_direct_resolution() {
        let broken = [
            // single parent
            deploy_history().with_parents("merge-1", &["deploy-prev"]),
            // unreadable merge commit
            deploy_history().with_log("deploy", &["merge-x"]),
            // devEnd missing
            deploy_history().with_parents("merge-1", &["deploy-prev", "ghost"]),
            // no merge base
            deploy_history()
                .with_parents("merge-1", &["deploy-prev", "orphan"])
                .with_commits(&["orphan"]),
        ];

        for git in broken {
            let deploy = ChangeSetRequest::incremental("master")
                .with_deploy_context(DeployContext::new("deploy", "master"));
            let direct = ChangeSetRequest::incremental("master");

            let resolver = ChangeSetResolver::new(&git);
            let fallback = resolver.resolve(&deploy);
            let plain = resolver.resolve(&direct);

            assert_eq!(fallback.strategy, ResolutionStrategy::DirectFallback);
            assert_eq!(fallback.scope, plain.scope);
        }
    }

    #[test]
    fn test_branch_deploy_ignores_source_branch_with_warning() {
        let git = deploy_history();
        let request = ChangeSetRequest::incremental("master")
            .with_source(Some("feature/other"))
            .with_deploy_context(DeployContext::new("deploy", "master"));

        let resolution = ChangeSetResolver::new(&git).resolve(&request);

        assert_eq!(resolution.strategy, ResolutionStrategy::BranchDeploy);
        assert!(resolution
            .notes
            .iter()
            .any(|n| n.message.contains("feature/other")));
    }
}
