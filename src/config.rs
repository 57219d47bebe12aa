//! Configuration for a gate run.
//!
//! Layers, lowest to highest precedence:
//!
//! 1. built-in defaults ([`RunConfig::default`])
//! 2. `diffgate.toml` in the project root, or an explicit `--config` file
//! 3. command-line flags and `DIFFGATE_*` environment variables, applied as
//!    [`ConfigOverrides`]
//!
//! ```toml
//! [lint]
//! enabled = true
//! full = false
//!
//! [coverage]
//! enabled = true
//! threshold = 92
//!
//! [branches]
//! target = "main"
//! branch_deploy = true
//! mainline = "main"
//!
//! [scope]
//! directories = ["src", "packages/ui"]
//! ```

pub mod validation;

pub use validation::{validate, ValidationReport};

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::changes::{normalize_source_ref, CheckMode, DEFAULT_EXTENSIONS};
use crate::error::{GateError, Result};
use crate::quality::checkers::type_coverage::DEFAULT_THRESHOLD;

/// Config file looked up in the project root.
pub const CONFIG_FILE: &str = "diffgate.toml";

/// Default diff target and mainline branch.
pub const DEFAULT_BRANCH: &str = "master";

// ============================================================================
// Sections
// ============================================================================

/// `[lint]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LintConfig {
    pub enabled: bool,
    /// Lint the whole scope instead of changed files.
    pub full: bool,
    /// Extra ESLint arguments.
    pub args: Vec<String>,
}

impl Default for LintConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            full: false,
            args: Vec::new(),
        }
    }
}

impl LintConfig {
    #[must_use]
    pub fn mode(&self) -> CheckMode {
        mode_for(self.full)
    }
}

/// `[type_check]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TypeCheckConfig {
    pub enabled: bool,
    pub full: bool,
}

impl Default for TypeCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            full: false,
        }
    }
}

impl TypeCheckConfig {
    #[must_use]
    pub fn mode(&self) -> CheckMode {
        mode_for(self.full)
    }
}

/// `[coverage]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoverageConfig {
    pub enabled: bool,
    /// Minimum type coverage in percent.
    pub threshold: f64,
}

impl Default for CoverageConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

/// `[branches]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BranchConfig {
    /// Diff end; `None` is the checked-out commit.
    pub source: Option<String>,
    /// Diff start.
    pub target: String,
    /// Isolate the last branch merged into the deploy branch.
    pub branch_deploy: bool,
    /// Deploy branch; `None` is the checked-out commit.
    pub deploy: Option<String>,
    pub mainline: String,
}

impl Default for BranchConfig {
    fn default() -> Self {
        Self {
            source: None,
            target: DEFAULT_BRANCH.to_string(),
            branch_deploy: false,
            deploy: None,
            mainline: DEFAULT_BRANCH.to_string(),
        }
    }
}

/// `[scope]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScopeConfig {
    /// Directories checked, relative to the project root.
    pub directories: Vec<String>,
    /// File extensions checked, without the dot.
    pub extensions: Vec<String>,
    /// Additional glob exclusions applied to every checker.
    pub exclude: Vec<String>,
}

impl Default for ScopeConfig {
    fn default() -> Self {
        Self {
            directories: vec!["src".to_string()],
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            exclude: Vec::new(),
        }
    }
}

// ============================================================================
// Run Config
// ============================================================================

/// Complete configuration of a gate run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub lint: LintConfig,
    pub type_check: TypeCheckConfig,
    pub coverage: CoverageConfig,
    pub branches: BranchConfig,
    pub scope: ScopeConfig,
}

impl RunConfig {
    /// Path of the project's config file.
    pub fn config_path(project_dir: &Path) -> PathBuf {
        project_dir.join(CONFIG_FILE)
    }

    /// Load defaults overlaid with a config file.
    ///
    /// With `explicit` set, that file must exist. Otherwise `diffgate.toml`
    /// in `project_dir` is used when present. Returns the file actually read.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid TOML for
    /// this schema.
    pub fn load(project_dir: &Path, explicit: Option<&Path>) -> Result<(Self, Option<PathBuf>)> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => {
                let default = Self::config_path(project_dir);
                if !default.exists() {
                    debug!("No {} found, using defaults", CONFIG_FILE);
                    return Ok((Self::default(), None));
                }
                default
            }
        };

        let content = std::fs::read_to_string(&path).map_err(|e| {
            GateError::config_with_path(format!("cannot read {}: {}", path.display(), e), path.clone())
        })?;
        let config = Self::from_toml(&content)?;
        debug!("Loaded configuration from {}", path.display());
        Ok((config, Some(path)))
    }

    /// Parse TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid for this schema.
    pub fn from_toml(content: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(content)?;
        config.branches.source = normalize_source_ref(config.branches.source.as_deref());
        Ok(config)
    }

    /// Render as TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| GateError::config(e.to_string()))
    }

    /// Apply the highest-precedence layer.
    pub fn apply(&mut self, overrides: &ConfigOverrides) {
        macro_rules! set {
            ($target:expr, $value:expr) => {
                if let Some(v) = $value.clone() {
                    $target = v;
                }
            };
        }

        set!(self.lint.enabled, overrides.lint);
        set!(self.lint.full, overrides.lint_full);
        set!(self.type_check.enabled, overrides.type_check);
        set!(self.type_check.full, overrides.type_check_full);
        set!(self.coverage.enabled, overrides.coverage);
        set!(self.coverage.threshold, overrides.coverage_threshold);
        set!(self.branches.target, overrides.target_branch);
        set!(self.branches.branch_deploy, overrides.branch_deploy);
        set!(self.branches.mainline, overrides.mainline_branch);

        if let Some(source) = &overrides.source_branch {
            self.branches.source = normalize_source_ref(Some(source));
        }
        if let Some(deploy) = &overrides.deploy_branch {
            self.branches.deploy = normalize_source_ref(Some(deploy));
        }
        if let Some(dirs) = &overrides.check_dirs {
            self.scope.directories = parse_dir_list(dirs);
        }
    }
}

/// Optional values from flags and environment. `None` leaves the lower
/// layer untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigOverrides {
    pub lint: Option<bool>,
    pub lint_full: Option<bool>,
    pub type_check: Option<bool>,
    pub type_check_full: Option<bool>,
    pub coverage: Option<bool>,
    pub coverage_threshold: Option<f64>,
    pub source_branch: Option<String>,
    pub target_branch: Option<String>,
    /// Newline- or comma-separated list.
    pub check_dirs: Option<String>,
    pub branch_deploy: Option<bool>,
    pub deploy_branch: Option<String>,
    pub mainline_branch: Option<String>,
}

/// Split a newline- or comma-delimited directory list.
#[must_use]
pub fn parse_dir_list(raw: &str) -> Vec<String> {
    raw.split(['\n', ','])
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(str::to_string)
        .collect()
}

fn mode_for(full: bool) -> CheckMode {
    if full {
        CheckMode::Full
    } else {
        CheckMode::Incremental
    }
}
