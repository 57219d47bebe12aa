//! Real implementations of the testing traits.
//!
//! [`RealGitOperations`] shells out to `git` synchronously; resolution
//! issues one query at a time. [`RealToolRunner`] spawns checker tools with
//! `tokio::process` and captures their output in full.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use tracing::debug;

use crate::quality::ToolInvocation;
use crate::testing::{GitOperations, LogFilter, ToolOutput, ToolRunner};

// ============================================================================
// Git
// ============================================================================

/// Git operations backed by the `git` binary.
#[derive(Debug, Clone)]
pub struct RealGitOperations {
    project_dir: PathBuf,
}

impl RealGitOperations {
    /// Create a new git operations instance for the given directory.
    #[must_use]
    pub fn new(project_dir: PathBuf) -> Self {
        Self { project_dir }
    }

    fn git(&self, args: &[&str]) -> Result<Output> {
        debug!("git {}", args.join(" "));
        Command::new("git")
            .args(["-c", "core.quotepath=off"])
            .args(args)
            .current_dir(&self.project_dir)
            .output()
            .with_context(|| format!("Failed to run git {}", args.first().unwrap_or(&"")))
    }

    /// Run git and return stdout, failing on a non-zero exit.
    fn git_stdout(&self, args: &[&str]) -> Result<String> {
        let output = self.git(args)?;
        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).to_string())
        } else {
            bail!(
                "git {} failed: {}",
                args.join(" "),
                String::from_utf8_lossy(&output.stderr).trim()
            )
        }
    }
}

fn non_empty_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

impl GitOperations for RealGitOperations {
    fn is_work_tree(&self) -> bool {
        self.git_stdout(&["rev-parse", "--is-inside-work-tree"])
            .map(|out| out.trim() == "true")
            .unwrap_or(false)
    }

    fn fetch(&self, remote: &str) -> Result<()> {
        self.git_stdout(&["fetch", "--prune", "--quiet", remote])
            .map(|_| ())
    }

    fn diff_names(&self, from: &str, to: &str) -> Result<Vec<String>> {
        let out = self.git_stdout(&["diff", "--name-only", "--relative", from, to, "--"])?;
        Ok(non_empty_lines(&out))
    }

    fn log(&self, rev: &str, filter: &LogFilter) -> Result<Vec<String>> {
        let max_count = filter.max_count.map(|n| format!("--max-count={}", n));
        let mut args = vec!["log", "--format=%H"];
        if filter.merges_only {
            args.push("--merges");
        }
        if filter.first_parent {
            args.push("--first-parent");
        }
        if let Some(max) = max_count.as_deref() {
            args.push(max);
        }
        args.extend([rev, "--"]);

        Ok(non_empty_lines(&self.git_stdout(&args)?))
    }

    fn parents(&self, commit: &str) -> Result<Vec<String>> {
        let out = self.git_stdout(&["show", "--no-patch", "--format=%P", commit])?;
        Ok(out.split_whitespace().map(str::to_string).collect())
    }

    fn commit_exists(&self, rev: &str) -> bool {
        let spec = format!("{}^{{commit}}", rev);
        self.git(&["cat-file", "-e", &spec])
            .map(|out| out.status.success())
            .unwrap_or(false)
    }

    fn merge_base(&self, a: &str, b: &str) -> Result<String> {
        let out = self.git_stdout(&["merge-base", a, b])?;
        match out.trim() {
            "" => bail!("no merge base between {} and {}", a, b),
            base => Ok(base.to_string()),
        }
    }
}

// ============================================================================
// Tools
// ============================================================================

/// Spawns checker tools as child processes.
#[derive(Debug, Clone, Default)]
pub struct RealToolRunner;

impl RealToolRunner {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ToolRunner for RealToolRunner {
    async fn run(&self, invocation: &ToolInvocation, cwd: &Path) -> Result<ToolOutput> {
        debug!("spawning {} in {}", invocation.command_line(), cwd.display());

        let output = tokio::process::Command::new(&invocation.program)
            .args(&invocation.args)
            .current_dir(cwd)
            .stdin(std::process::Stdio::null())
            .output()
            .await
            .with_context(|| format!("Failed to spawn {}", invocation.program))?;

        Ok(ToolOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }

    fn is_available(&self, program: &str) -> bool {
        which::which(program).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changes::{
        ChangeSetRequest, ChangeSetResolver, DeployContext, ResolutionStrategy,
    };
    use crate::testing::TestFixture;
    use tempfile::TempDir;

    fn git(fixture: &TestFixture) -> RealGitOperations {
        RealGitOperations::new(fixture.path_buf())
    }

    // =========================================================================
    // RealGitOperations
    // =========================================================================

    #[test]
    fn test_outside_repository() {
        let temp = TempDir::new().unwrap();
        let git = RealGitOperations::new(temp.path().to_path_buf());
        assert!(!git.is_work_tree());
        assert!(git.diff_names("HEAD~1", "HEAD").is_err());
    }

    #[test]
    fn test_diff_names_and_commit_exists() {
        let fixture = TestFixture::with_git_repo();
        let base = fixture.head();
        fixture.write_file("src/a.ts", "export const a = 1;\n").unwrap();
        fixture.write_file("src/b.ts", "export const b = 2;\n").unwrap();
        fixture.commit_all("add files");

        let git = git(&fixture);
        assert!(git.is_work_tree());
        assert!(git.commit_exists(&base));
        assert!(git.commit_exists("master"));
        assert!(!git.commit_exists("no-such-branch"));
        assert_eq!(git.diff_names(&base, "HEAD").unwrap(), vec!["src/a.ts", "src/b.ts"]);
    }

    #[test]
    fn test_log_parents_and_merge_base() {
        let fixture = TestFixture::with_git_repo();
        let fork = fixture.head();
        fixture.checkout_new("feature");
        fixture.write_file("src/f.ts", "export {};\n").unwrap();
        let tip = fixture.commit_all("feature");
        fixture.checkout("master");
        fixture.write_file("other.md", "x\n").unwrap();
        let master_tip = fixture.commit_all("mainline moves");
        let merge = fixture.merge_no_ff("feature", "merge feature");

        let git = git(&fixture);
        let filter = LogFilter::new().merges_only().first_parent().max_count(1);
        assert_eq!(git.log("master", &filter).unwrap(), vec![merge.clone()]);
        assert_eq!(git.parents(&merge).unwrap(), vec![master_tip, tip.clone()]);
        assert_eq!(git.merge_base("feature", &fork).unwrap(), fork);
        assert!(git.log("master", &LogFilter::new()).unwrap().len() >= 4);
    }

    #[test]
    fn test_fetch_without_remote_fails() {
        let fixture = TestFixture::with_git_repo();
        assert!(git(&fixture).fetch("origin").is_err());
    }

    // =========================================================================
    // Branch deploy over real history
    // =========================================================================

    #[test]
    fn test_branch_deploy_isolates_last_merged_branch() {
        let fixture = TestFixture::with_git_repo();
        fixture.write_file("src/base.ts", "export {};\n").unwrap();
        fixture.commit_all("A");

        // earlier feature already on deploy
        fixture.checkout_new("deploy");
        fixture.checkout_new("feature-old");
        fixture.write_file("src/old.ts", "export {};\n").unwrap();
        fixture.commit_all("old feature");
        fixture.checkout("deploy");
        fixture.merge_no_ff("feature-old", "merge old");

        // feature cut from mainline at A
        fixture.checkout("master");
        fixture.checkout_new("feature");
        fixture.write_file("src/feature.ts", "export const f = 1;\n").unwrap();
        fixture.commit_all("B1");
        fixture.write_file("src/helper.ts", "export const h = 1;\n").unwrap();
        fixture.commit_all("B");

        // mainline advances after the cut
        fixture.checkout("master");
        fixture.write_file("src/mainline.ts", "export {};\n").unwrap();
        fixture.commit_all("mainline moves");

        fixture.checkout("deploy");
        fixture.merge_no_ff("feature", "merge feature");
        fixture.add_loopback_origin();

        let git = git(&fixture);
        let request = ChangeSetRequest::incremental("master")
            .with_deploy_context(DeployContext::from_head("master"));
        let resolution = ChangeSetResolver::new(&git).resolve(&request);

        assert_eq!(resolution.strategy, ResolutionStrategy::BranchDeploy);
        assert_eq!(
            resolution.change_set().unwrap().paths(),
            ["src/feature.ts", "src/helper.ts"]
        );
    }

    #[test]
    fn test_branch_deploy_without_merge_falls_back() {
        let fixture = TestFixture::with_git_repo();
        fixture.checkout_new("deploy");
        fixture.write_file("src/direct.ts", "export {};\n").unwrap();
        fixture.commit_all("straight commit");

        let git = git(&fixture);
        let request = ChangeSetRequest::incremental("master")
            .with_deploy_context(DeployContext::from_head("master"));
        let resolution = ChangeSetResolver::new(&git).resolve(&request);

        assert_eq!(resolution.strategy, ResolutionStrategy::DirectFallback);
        assert_eq!(resolution.change_set().unwrap().paths(), ["src/direct.ts"]);
        assert!(resolution.has_warnings());
    }

    // =========================================================================
    // RealToolRunner
    // =========================================================================

    #[tokio::test]
    async fn test_runner_captures_exit_code_and_output() {
        let temp = TempDir::new().unwrap();
        let inv = ToolInvocation::new("git", "git", ["--version"]);
        let out = RealToolRunner::new().run(&inv, temp.path()).await.unwrap();
        assert!(out.exited_cleanly());
        assert!(out.stdout.starts_with("git version"));

        let bad = ToolInvocation::new("git", "git", ["no-such-subcommand"]);
        let out = RealToolRunner::new().run(&bad, temp.path()).await.unwrap();
        assert!(!out.exited_cleanly());
        assert!(!out.stderr.is_empty());
    }

    #[tokio::test]
    async fn test_runner_spawn_failure_is_error() {
        let temp = TempDir::new().unwrap();
        let inv = ToolInvocation::new("x", "definitely-not-a-real-binary-7f3a", Vec::<String>::new());
        assert!(RealToolRunner::new().run(&inv, temp.path()).await.is_err());
        assert!(!RealToolRunner::new().is_available("definitely-not-a-real-binary-7f3a"));
        assert!(RealToolRunner::new().is_available("git"));
    }
}
