//! Test fixtures for creating reproducible repositories.
//!
//! Provides temporary git repositories with helpers for shaping history
//! (branches, merges, a loopback `origin` remote).

use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

/// A test fixture representing a temporary project directory.
///
/// Automatically cleans up when dropped.
///
/// # Example
///
/// ```rust,ignore
/// let fixture = TestFixture::with_git_repo();
/// fixture.write_file("src/a.ts", "export {}").unwrap();
/// let hash = fixture.commit_all("add a");
/// ```
pub struct TestFixture {
    temp_dir: TempDir,
    is_git_repo: bool,
}

impl TestFixture {
    /// Create an empty project directory without git.
    ///
    /// # Panics
    ///
    /// Panics if temporary directory creation fails.
    #[must_use]
    pub fn empty_project() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        Self {
            temp_dir,
            is_git_repo: false,
        }
    }

    /// Create a git repository on branch `master` with one initial commit.
    ///
    /// # Panics
    ///
    /// Panics if git initialization fails.
    #[must_use]
    pub fn with_git_repo() -> Self {
        let mut fixture = Self::empty_project();

        fixture.git(&["init"]);
        fixture.git(&["symbolic-ref", "HEAD", "refs/heads/master"]);
        fixture.git(&["config", "user.email", "test@example.com"]);
        fixture.git(&["config", "user.name", "Test User"]);
        fixture.git(&["config", "commit.gpgsign", "false"]);

        fixture
            .write_file("README.md", "# fixture\n")
            .expect("Failed to write README.md");
        fixture.is_git_repo = true;
        fixture.commit_all("Initial commit");

        fixture
    }

    /// Create a git repository with a `package.json` and `tsconfig.json`.
    ///
    /// # Panics
    ///
    /// Panics if file creation fails.
    #[must_use]
    pub fn with_node_project() -> Self {
        let fixture = Self::with_git_repo();
        fixture
            .write_file("package.json", Self::package_json_content())
            .expect("Failed to write package.json");
        fixture
            .write_file("tsconfig.json", Self::tsconfig_content())
            .expect("Failed to write tsconfig.json");
        fixture.commit_all("Add node project files");
        fixture
    }

    /// Get the path to the fixture directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Get the path as a PathBuf (owned).
    #[must_use]
    pub fn path_buf(&self) -> PathBuf {
        self.temp_dir.path().to_path_buf()
    }

    /// Check if this is a git repository.
    #[must_use]
    pub fn is_git_repo(&self) -> bool {
        self.is_git_repo && self.temp_dir.path().join(".git").exists()
    }

    /// Write a file to the fixture directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn write_file(&self, relative_path: &str, content: &str) -> std::io::Result<()> {
        let path = self.temp_dir.path().join(relative_path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)
    }

    /// Read a file from the fixture directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub fn read_file(&self, relative_path: &str) -> std::io::Result<String> {
        std::fs::read_to_string(self.temp_dir.path().join(relative_path))
    }

    /// Remove a file from the fixture directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be removed.
    pub fn remove_file(&self, relative_path: &str) -> std::io::Result<()> {
        std::fs::remove_file(self.temp_dir.path().join(relative_path))
    }

    /// Run git in the fixture and return trimmed stdout.
    ///
    /// # Panics
    ///
    /// Panics if git cannot be spawned or exits non-zero.
    pub fn git(&self, args: &[&str]) -> String {
        let output = Command::new("git")
            .args(args)
            .current_dir(self.temp_dir.path())
            .output()
            .expect("Failed to run git");
        assert!(
            output.status.success(),
            "git {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
        String::from_utf8_lossy(&output.stdout).trim().to_string()
    }

    /// Stage everything and commit; returns the new HEAD hash.
    ///
    /// # Panics
    ///
    /// Panics if not a git repo or commit fails.
    pub fn commit_all(&self, message: &str) -> String {
        assert!(self.is_git_repo, "Not a git repository");
        self.git(&["add", "-A"]);
        self.git(&["commit", "-m", message, "--allow-empty"]);
        self.head()
    }

    /// Current HEAD commit hash.
    #[must_use]
    pub fn head(&self) -> String {
        self.git(&["rev-parse", "HEAD"])
    }

    /// Create and switch to a new branch.
    pub fn checkout_new(&self, branch: &str) {
        self.git(&["checkout", "-q", "-b", branch]);
    }

    /// Switch to an existing branch.
    pub fn checkout(&self, branch: &str) {
        self.git(&["checkout", "-q", branch]);
    }

    /// Merge `branch` into the current branch with a merge commit.
    pub fn merge_no_ff(&self, branch: &str, message: &str) -> String {
        self.git(&["merge", "--no-ff", "-q", "-m", message, branch]);
        self.head()
    }

    /// Point `origin` at the repository itself and fetch, so
    /// `origin/<branch>` refs exist without a network.
    pub fn add_loopback_origin(&self) {
        let path = self.temp_dir.path().to_string_lossy().to_string();
        self.git(&["remote", "add", "origin", &path]);
        self.git(&["fetch", "-q", "origin"]);
    }

    // =========================================================================
    // Content Templates
    // =========================================================================

    fn package_json_content() -> &'static str {
        r#"{
  "name": "fixture-app",
  "version": "1.0.0",
  "scripts": {
    "build": "tsc"
  },
  "devDependencies": {
    "typescript": "^5.4.0"
  }
}
"#
    }

    fn tsconfig_content() -> &'static str {
        r#"{
  "compilerOptions": {
    "strict": true,
    "noEmit": true
  },
  "include": ["src"]
}
"#
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_project_is_not_git() {
        let fixture = TestFixture::empty_project();
        assert!(!fixture.is_git_repo());
    }

    #[test]
    fn test_with_git_repo_initializes_git() {
        let fixture = TestFixture::with_git_repo();
        assert!(fixture.is_git_repo());
        assert_eq!(fixture.git(&["branch", "--show-current"]), "master");
        assert_eq!(fixture.head().len(), 40);
    }

    #[test]
    fn test_merge_no_ff_creates_two_parent_commit() {
        let fixture = TestFixture::with_git_repo();
        fixture.checkout_new("feature");
        fixture.write_file("src/a.ts", "export const a = 1;\n").unwrap();
        fixture.commit_all("feature work");
        fixture.checkout("master");
        let merge = fixture.merge_no_ff("feature", "merge feature");

        let parents = fixture.git(&["show", "--no-patch", "--format=%P", &merge]);
        assert_eq!(parents.split_whitespace().count(), 2);
    }

    #[test]
    fn test_with_node_project_writes_manifest() {
        let fixture = TestFixture::with_node_project();
        assert!(fixture.read_file("package.json").unwrap().contains("fixture-app"));
        assert!(fixture.path().join("tsconfig.json").exists());
    }
}
