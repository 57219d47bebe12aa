//! Testing infrastructure for diffgate.
//!
//! This module provides the traits that isolate diffgate from its external
//! collaborators, plus mocks and fixtures built on them.
//!
//! # Architecture
//!
//! - **Traits**: [`GitOperations`] and [`ToolRunner`], the seams the resolver
//!   and the checkers are written against
//! - **Mocks**: scripted test doubles implementing those traits
//! - **Fixtures**: temporary git repositories with real history (test-only)
//!
//! # Example
//!
//! ```rust,ignore
//! use diffgate::testing::{MockGitOperations, MockToolRunner, ToolOutput};
//!
//! let git = MockGitOperations::new().with_diff("master", "HEAD", &["src/a.ts"]);
//! let runner = MockToolRunner::new().with_output("eslint", ToolOutput::success(""));
//! ```

#[cfg(test)]
pub mod fixtures;
pub mod mocks;
pub mod traits;

// Re-export commonly used types
#[cfg(test)]
pub use fixtures::*;
pub use mocks::*;
pub use traits::*;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quality::ToolInvocation;
    use std::path::Path;

    // =========================================================================
    // Mock Git Operations Tests
    // =========================================================================

    #[test]
    fn test_mock_git_defaults_to_work_tree() {
        let git = MockGitOperations::default();
        assert!(git.is_work_tree());
        assert!(!git.commit_exists("HEAD"));
    }

    #[test]
    fn test_mock_git_outside_work_tree() {
        let git = MockGitOperations::new().outside_work_tree();
        assert!(!git.is_work_tree());
    }

    #[test]
    fn test_mock_git_scripted_diff() {
        let git = MockGitOperations::new().with_diff("master", "HEAD", &["a.ts", "b.ts"]);
        assert_eq!(git.diff_names("master", "HEAD").unwrap(), vec!["a.ts", "b.ts"]);
        assert!(git.diff_names("HEAD", "master").is_err());
    }

    #[test]
    fn test_mock_git_fetch_counts_and_errors() {
        let git = MockGitOperations::new().with_fetch_error("offline");
        assert!(git.fetch("origin").is_err());
        assert!(git.fetch("origin").is_err());
        assert_eq!(git.fetch_count(), 2);
    }

    #[test]
    fn test_mock_git_parents_register_commit() {
        let git = MockGitOperations::new().with_parents("m1", &["p0", "p1"]);
        assert!(git.commit_exists("m1"));
        assert_eq!(git.parents("m1").unwrap(), vec!["p0", "p1"]);
        assert!(git.parents("m2").is_err());
    }

    #[test]
    fn test_mock_git_merge_base_is_symmetric() {
        let git = MockGitOperations::new().with_merge_base("origin/master", "dev", "base");
        assert_eq!(git.merge_base("dev", "origin/master").unwrap(), "base");
        assert!(git.merge_base("dev", "other").is_err());
    }

    // =========================================================================
    // Mock Tool Runner Tests
    // =========================================================================

    #[tokio::test]
    async fn test_mock_runner_records_invocations() {
        let runner = MockToolRunner::new().with_output("tsc", ToolOutput::failure(2, "boom"));
        let inv = ToolInvocation::npx("tsc", "tsc", ["--noEmit"]);

        let out = runner.run(&inv, Path::new(".")).await.unwrap();
        assert_eq!(out.exit_code, Some(2));
        assert_eq!(runner.invocations_of("tsc").len(), 1);
        assert!(runner.invocations_of("eslint").is_empty());
    }

    #[tokio::test]
    async fn test_mock_runner_spawn_error() {
        let runner = MockToolRunner::new().with_spawn_error("eslint", "npx not found");
        let inv = ToolInvocation::npx("eslint", "eslint", ["src/a.ts"]);

        let err = runner.run(&inv, Path::new(".")).await.unwrap_err();
        assert!(err.to_string().contains("npx not found"));
    }

    #[test]
    fn test_mock_runner_availability() {
        let runner = MockToolRunner::new().with_unavailable("pnpm");
        assert!(!runner.is_available("pnpm"));
        assert!(runner.is_available("npm"));
    }
}
