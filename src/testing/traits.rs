//! Trait definitions for testable abstractions.
//!
//! These traits abstract the two external collaborators of a gate run -
//! the git repository and the checker tool processes - so resolution and
//! orchestration logic can be tested without real repositories or tools.

use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;

use crate::quality::ToolInvocation;

/// Filter flags for a commit log query.
///
/// # Example
///
/// ```rust
/// use diffgate::testing::LogFilter;
///
/// let filter = LogFilter::new().merges_only().first_parent().max_count(1);
/// assert!(filter.merges_only && filter.first_parent);
/// assert_eq!(filter.max_count, Some(1));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogFilter {
    /// Only list commits with more than one parent.
    pub merges_only: bool,
    /// Follow only the first parent of merge commits.
    pub first_parent: bool,
    /// Limit the number of listed commits.
    pub max_count: Option<usize>,
}

impl LogFilter {
    /// Create an unfiltered log query.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict to merge commits.
    #[must_use]
    pub fn merges_only(mut self) -> Self {
        self.merges_only = true;
        self
    }

    /// Follow first-parent history only.
    #[must_use]
    pub fn first_parent(mut self) -> Self {
        self.first_parent = true;
        self
    }

    /// Limit the number of entries.
    #[must_use]
    pub fn max_count(mut self, count: usize) -> Self {
        self.max_count = Some(count);
        self
    }
}

/// Abstraction for the git capabilities change-set resolution needs.
///
/// Every method is blocking: the caller waits for git to finish before
/// issuing the next query.
///
/// # Example
///
/// ```rust,ignore
/// use diffgate::testing::{GitOperations, LogFilter};
///
/// fn last_merge(git: &impl GitOperations, branch: &str) -> Option<String> {
///     let filter = LogFilter::new().merges_only().first_parent().max_count(1);
///     git.log(branch, &filter).ok()?.into_iter().next()
/// }
/// ```
pub trait GitOperations: Send + Sync {
    /// Whether the project directory is inside a git working tree.
    fn is_work_tree(&self) -> bool;

    /// Fetch refs from a remote.
    ///
    /// # Errors
    ///
    /// Returns an error if the remote is unknown or unreachable.
    fn fetch(&self, remote: &str) -> Result<()>;

    /// List paths that differ between two revisions (`--name-only`).
    ///
    /// # Errors
    ///
    /// Returns an error if either revision does not resolve.
    fn diff_names(&self, from: &str, to: &str) -> Result<Vec<String>>;

    /// List commit hashes reachable from `rev`, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if `rev` does not resolve.
    fn log(&self, rev: &str, filter: &LogFilter) -> Result<Vec<String>>;

    /// Parent hashes of a commit, in parent order.
    ///
    /// # Errors
    ///
    /// Returns an error if the commit does not exist.
    fn parents(&self, commit: &str) -> Result<Vec<String>>;

    /// Whether `rev` names an existing commit object.
    fn commit_exists(&self, rev: &str) -> bool;

    /// Best common ancestor of two revisions.
    ///
    /// # Errors
    ///
    /// Returns an error if the revisions share no history.
    fn merge_base(&self, a: &str, b: &str) -> Result<String>;
}

/// Captured result of one tool process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    /// Exit code, `None` when the process was killed by a signal.
    pub exit_code: Option<i32>,
    /// Everything the tool wrote to stdout.
    pub stdout: String,
    /// Everything the tool wrote to stderr.
    pub stderr: String,
}

impl ToolOutput {
    /// Output of a tool that exited cleanly.
    #[must_use]
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Output of a tool that exited with `code`.
    #[must_use]
    pub fn failure(code: i32, stdout: impl Into<String>) -> Self {
        Self {
            exit_code: Some(code),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Attach stderr text.
    #[must_use]
    pub fn with_stderr(mut self, stderr: impl Into<String>) -> Self {
        self.stderr = stderr.into();
        self
    }

    /// Whether the process exited with status zero.
    #[must_use]
    pub fn exited_cleanly(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// stdout followed by stderr.
    #[must_use]
    pub fn combined(&self) -> String {
        match (self.stdout.is_empty(), self.stderr.is_empty()) {
            (_, true) => self.stdout.clone(),
            (true, false) => self.stderr.clone(),
            (false, false) => format!("{}\n{}", self.stdout, self.stderr),
        }
    }
}

/// Abstraction for spawning checker tools.
///
/// The runner captures output fully; nothing is streamed to the caller.
#[async_trait]
pub trait ToolRunner: Send + Sync {
    /// Run an invocation to completion inside `cwd`.
    ///
    /// A non-zero exit is *not* an error here.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be spawned.
    async fn run(&self, invocation: &ToolInvocation, cwd: &Path) -> Result<ToolOutput>;

    /// Whether `program` can be found on `PATH`.
    fn is_available(&self, program: &str) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_filter_builder() {
        let filter = LogFilter::new().merges_only().max_count(3);
        assert!(filter.merges_only);
        assert!(!filter.first_parent);
        assert_eq!(filter.max_count, Some(3));
    }

    #[test]
    fn test_tool_output_combined() {
        let out = ToolOutput::failure(1, "out").with_stderr("err");
        assert_eq!(out.combined(), "out\nerr");
        assert!(!out.exited_cleanly());

        let only_err = ToolOutput::failure(2, "").with_stderr("err");
        assert_eq!(only_err.combined(), "err");
    }

    #[test]
    fn test_tool_output_success() {
        let out = ToolOutput::success("fine");
        assert!(out.exited_cleanly());
        assert_eq!(out.combined(), "fine");
    }
}
