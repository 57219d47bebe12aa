//! Mock implementations of testing traits.
//!
//! These mocks provide controllable test doubles for git and the checker
//! tools, enabling deterministic unit tests of resolution and orchestration.

use super::traits::{GitOperations, LogFilter, ToolOutput, ToolRunner};
use crate::quality::ToolInvocation;
use anyhow::{bail, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

/// Mock implementation of git operations.
///
/// Every query answers from a scripted table; anything not scripted fails
/// the way git would for an unknown revision.
///
/// # Example
///
/// ```rust,ignore
/// let git = MockGitOperations::new()
///     .with_diff("master", "HEAD", &["src/a.ts"])
///     .with_commits(&["master"]);
///
/// assert_eq!(git.diff_names("master", "HEAD").unwrap(), vec!["src/a.ts"]);
/// ```
#[derive(Debug)]
pub struct MockGitOperations {
    work_tree: bool,
    fetch_error: Option<String>,
    diffs: HashMap<(String, String), Vec<String>>,
    logs: HashMap<String, Vec<String>>,
    parents: HashMap<String, Vec<String>>,
    commits: HashSet<String>,
    merge_bases: HashMap<(String, String), String>,
    fetch_count: AtomicU32,
}

impl Default for MockGitOperations {
    fn default() -> Self {
        Self {
            work_tree: true,
            fetch_error: None,
            diffs: HashMap::new(),
            logs: HashMap::new(),
            parents: HashMap::new(),
            commits: HashSet::new(),
            merge_bases: HashMap::new(),
            fetch_count: AtomicU32::new(0),
        }
    }
}

impl MockGitOperations {
    /// Create a new mock with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pretend the project is not a git checkout.
    #[must_use]
    pub fn outside_work_tree(mut self) -> Self {
        self.work_tree = false;
        self
    }

    /// Configure fetch to fail.
    #[must_use]
    pub fn with_fetch_error(mut self, error: &str) -> Self {
        self.fetch_error = Some(error.to_string());
        self
    }

    /// Script the result of `diff_names(from, to)`.
    #[must_use]
    pub fn with_diff(mut self, from: &str, to: &str, files: &[&str]) -> Self {
        self.diffs.insert(
            (from.to_string(), to.to_string()),
            files.iter().map(|f| f.to_string()).collect(),
        );
        self
    }

    /// Script the commits `log(rev, ..)` returns.
    #[must_use]
    pub fn with_log(mut self, rev: &str, commits: &[&str]) -> Self {
        self.logs.insert(
            rev.to_string(),
            commits.iter().map(|c| c.to_string()).collect(),
        );
        self
    }

    /// Script the parents of a commit (also registers the commit).
    #[must_use]
    pub fn with_parents(mut self, commit: &str, parents: &[&str]) -> Self {
        self.commits.insert(commit.to_string());
        self.parents.insert(
            commit.to_string(),
            parents.iter().map(|p| p.to_string()).collect(),
        );
        self
    }

    /// Register revisions that `commit_exists` should confirm.
    #[must_use]
    pub fn with_commits(mut self, revs: &[&str]) -> Self {
        self.commits.extend(revs.iter().map(|r| r.to_string()));
        self
    }

    /// Script the merge-base of two revisions (order-insensitive).
    #[must_use]
    pub fn with_merge_base(mut self, a: &str, b: &str, base: &str) -> Self {
        self.merge_bases
            .insert((a.to_string(), b.to_string()), base.to_string());
        self
    }

    /// Number of times `fetch` was called.
    pub fn fetch_count(&self) -> u32 {
        self.fetch_count.load(Ordering::SeqCst)
    }
}

impl GitOperations for MockGitOperations {
    fn is_work_tree(&self) -> bool {
        self.work_tree
    }

    fn fetch(&self, remote: &str) -> Result<()> {
        self.fetch_count.fetch_add(1, Ordering::SeqCst);
        match self.fetch_error {
            Some(ref error) => bail!("fetch {} failed: {}", remote, error),
            None => Ok(()),
        }
    }

    fn diff_names(&self, from: &str, to: &str) -> Result<Vec<String>> {
        match self.diffs.get(&(from.to_string(), to.to_string())) {
            Some(files) => Ok(files.clone()),
            None => bail!("bad revision '{}..{}'", from, to),
        }
    }

    fn log(&self, rev: &str, _filter: &LogFilter) -> Result<Vec<String>> {
        match self.logs.get(rev) {
            Some(commits) => Ok(commits.clone()),
            None => bail!("unknown revision '{}'", rev),
        }
    }

    fn parents(&self, commit: &str) -> Result<Vec<String>> {
        match self.parents.get(commit) {
            Some(parents) => Ok(parents.clone()),
            None => bail!("bad object {}", commit),
        }
    }

    fn commit_exists(&self, rev: &str) -> bool {
        self.commits.contains(rev)
    }

    fn merge_base(&self, a: &str, b: &str) -> Result<String> {
        self.merge_bases
            .get(&(a.to_string(), b.to_string()))
            .or_else(|| self.merge_bases.get(&(b.to_string(), a.to_string())))
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no merge base between {} and {}", a, b))
    }
}

/// Mock implementation of the tool runner.
///
/// Responses are keyed by the invocation's tool name. Every invocation is
/// recorded so tests can assert on the exact command lines.
///
/// # Example
///
/// ```rust,ignore
/// let runner = MockToolRunner::new()
///     .with_output("eslint", ToolOutput::success(""));
///
/// runner.run(&invocation, dir).await?;
/// assert_eq!(runner.invocations().len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct MockToolRunner {
    outputs: HashMap<String, ToolOutput>,
    spawn_errors: HashMap<String, String>,
    unavailable: HashSet<String>,
    invocations: Mutex<Vec<ToolInvocation>>,
}

impl MockToolRunner {
    /// Create a runner where every tool exits cleanly with no output.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the output of a tool.
    #[must_use]
    pub fn with_output(mut self, tool: &str, output: ToolOutput) -> Self {
        self.outputs.insert(tool.to_string(), output);
        self
    }

    /// Make spawning a tool fail.
    #[must_use]
    pub fn with_spawn_error(mut self, tool: &str, error: &str) -> Self {
        self.spawn_errors.insert(tool.to_string(), error.to_string());
        self
    }

    /// Report a program as missing from `PATH`.
    #[must_use]
    pub fn with_unavailable(mut self, program: &str) -> Self {
        self.unavailable.insert(program.to_string());
        self
    }

    /// All invocations received so far, in order.
    pub fn invocations(&self) -> Vec<ToolInvocation> {
        self.invocations
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    /// Invocations of one tool.
    pub fn invocations_of(&self, tool: &str) -> Vec<ToolInvocation> {
        self.invocations()
            .into_iter()
            .filter(|inv| inv.tool == tool)
            .collect()
    }
}

#[async_trait]
impl ToolRunner for MockToolRunner {
    async fn run(&self, invocation: &ToolInvocation, _cwd: &Path) -> Result<ToolOutput> {
        if let Ok(mut calls) = self.invocations.lock() {
            calls.push(invocation.clone());
        }

        if let Some(error) = self.spawn_errors.get(&invocation.tool) {
            bail!("{}", error)
        }

        Ok(self
            .outputs
            .get(&invocation.tool)
            .cloned()
            .unwrap_or_else(|| ToolOutput::success("")))
    }

    fn is_available(&self, program: &str) -> bool {
        !self.unavailable.contains(program)
    }
}
