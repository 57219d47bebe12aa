//! Per-checker file scope.
//!
//! A [`ScopeRule`] decides which changed paths a checker cares about. A path
//! is in scope iff its extension is allowed, it sits under one of the include
//! directories, and no exclude pattern matches it. Filtering additionally
//! drops paths that no longer exist on disk, which is how deletions leave a
//! change-set.

use std::collections::BTreeSet;
use std::path::Path;

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};

use super::ChangeSet;
use crate::error::{GateError, Result};

/// Extensions every checker considers by default.
pub const DEFAULT_EXTENSIONS: &[&str] = &["js", "ts", "jsx", "tsx", "vue"];

/// Paths no checker should ever see.
pub const DEFAULT_EXCLUDES: &[&str] = &["**/node_modules/**", "dist/**"];

/// Extra exclusions for the type checker: tests and declaration files.
pub const TYPE_CHECK_EXCLUDES: &[&str] = &[
    "**/*.test.*",
    "**/*.spec.*",
    "**/__tests__/**",
    "**/*.d.ts",
];

/// Extension, directory and exclusion predicates for one checker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeRule {
    /// Extensions without the leading dot.
    pub allowed_extensions: BTreeSet<String>,
    /// Repository-relative directories, in configured order.
    pub include_directories: Vec<String>,
    /// Glob patterns matched against the repository-relative path.
    pub exclude_patterns: BTreeSet<String>,
}

impl ScopeRule {
    /// Create a rule with no exclusions.
    pub fn new<D, E>(directories: D, extensions: E) -> Self
    where
        D: IntoIterator,
        D::Item: AsRef<str>,
        E: IntoIterator,
        E::Item: AsRef<str>,
    {
        let mut include_directories: Vec<String> = Vec::new();
        for dir in directories {
            let dir = normalize_dir(dir.as_ref());
            if !include_directories.contains(&dir) {
                include_directories.push(dir);
            }
        }

        Self {
            allowed_extensions: extensions
                .into_iter()
                .map(|e| e.as_ref().trim().trim_start_matches('.').to_string())
                .filter(|e| !e.is_empty())
                .collect(),
            include_directories,
            exclude_patterns: BTreeSet::new(),
        }
    }

    /// Scope used by the linter.
    pub fn lint<D, E>(directories: D, extensions: E) -> Self
    where
        D: IntoIterator,
        D::Item: AsRef<str>,
        E: IntoIterator,
        E::Item: AsRef<str>,
    {
        Self::new(directories, extensions).with_excludes(DEFAULT_EXCLUDES.iter().copied())
    }

    /// Scope used by the type checker; also skips tests and declarations.
    pub fn type_check<D, E>(directories: D, extensions: E) -> Self
    where
        D: IntoIterator,
        D::Item: AsRef<str>,
        E: IntoIterator,
        E::Item: AsRef<str>,
    {
        Self::lint(directories, extensions).with_excludes(TYPE_CHECK_EXCLUDES.iter().copied())
    }

    /// Add exclusion patterns.
    #[must_use]
    pub fn with_excludes<I>(mut self, patterns: I) -> Self
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        self.exclude_patterns
            .extend(patterns.into_iter().map(|p| p.as_ref().to_string()));
        self
    }

    /// One glob pattern per (directory, extension) pair.
    ///
    /// Directories keep their configured order; extensions are sorted.
    #[must_use]
    pub fn full_patterns(&self) -> Vec<String> {
        self.include_directories
            .iter()
            .flat_map(|dir| {
                self.allowed_extensions.iter().map(move |ext| {
                    if dir.is_empty() {
                        format!("**/*.{}", ext)
                    } else {
                        format!("{}/**/*.{}", dir, ext)
                    }
                })
            })
            .collect()
    }

    /// Compile the exclusion globs.
    ///
    /// # Errors
    ///
    /// Returns an error if an exclude pattern is not a valid glob.
    pub fn compile(&self) -> Result<ScopeMatcher<'_>> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &self.exclude_patterns {
            let glob = Glob::new(pattern).map_err(|e| {
                GateError::invalid_config("scope.exclude", format!("{}: {}", pattern, e))
            })?;
            builder.add(glob);
        }
        let excludes = builder
            .build()
            .map_err(|e| GateError::invalid_config("scope.exclude", e.to_string()))?;

        Ok(ScopeMatcher {
            rule: self,
            excludes,
        })
    }
}

/// A [`ScopeRule`] with its globs compiled.
#[derive(Debug)]
pub struct ScopeMatcher<'a> {
    rule: &'a ScopeRule,
    excludes: GlobSet,
}

impl ScopeMatcher<'_> {
    /// Path-only membership test (no filesystem access).
    #[must_use]
    pub fn is_in_scope(&self, path: &str) -> bool {
        self.has_allowed_extension(path) && self.is_under_included_dir(path) && !self.is_excluded(path)
    }

    fn has_allowed_extension(&self, path: &str) -> bool {
        Path::new(path)
            .extension()
            .map(|ext| self.rule.allowed_extensions.contains(ext.to_string_lossy().as_ref()))
            .unwrap_or(false)
    }

    fn is_under_included_dir(&self, path: &str) -> bool {
        self.rule.include_directories.iter().any(|dir| {
            dir.is_empty()
                || path
                    .strip_prefix(dir.as_str())
                    .is_some_and(|rest| rest.starts_with('/'))
        })
    }

    fn is_excluded(&self, path: &str) -> bool {
        self.excludes.is_match(path)
    }
}

/// Narrow a change-set to the paths a checker should receive.
///
/// Paths that are out of scope or no longer exist under `project_root` are
/// dropped silently. Order is preserved.
///
/// # Errors
///
/// Returns an error if the rule's exclude patterns do not compile.
///
/// # Example
///
/// ```rust,ignore
/// let rule = ScopeRule::lint(["src"], ["ts"]);
/// let scoped = filter(&changes, &rule, Path::new("."))?;
/// ```
pub fn filter(paths: &ChangeSet, rule: &ScopeRule, project_root: &Path) -> Result<ChangeSet> {
    let matcher = rule.compile()?;
    Ok(paths
        .iter()
        .filter(|path| matcher.is_in_scope(path))
        .filter(|path| project_root.join(path).is_file())
        .map(str::to_string)
        .collect())
}

/// Strip `./` prefixes and trailing slashes; the project root becomes "".
fn normalize_dir(dir: &str) -> String {
    let mut dir = dir.trim();
    while let Some(rest) = dir.strip_prefix("./") {
        dir = rest;
    }
    let dir = dir.trim_end_matches('/');
    if dir == "." {
        String::new()
    } else {
        dir.to_string()
    }
}
