//! Coverage provisioning.
//!
//! Before type coverage is measured the project must declare the
//! `type-coverage` package and carry a `typeCoverage` block in its manifest.
//! [`ensure_provisioned`] does both, at most once per run, and leaves the
//! manifest untouched when it is already configured.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::{debug, info};

use super::ToolInvocation;
use crate::error::{GateError, Result};
use crate::testing::ToolRunner;

/// Project manifest file name.
pub const MANIFEST: &str = "package.json";

/// Package that reports type coverage.
pub const COVERAGE_PACKAGE: &str = "type-coverage";

/// Manifest key holding the coverage settings.
pub const COVERAGE_KEY: &str = "typeCoverage";

const TMP_SUFFIX: &str = ".tmp";
const LOCK_SUFFIX: &str = ".lock";

// ============================================================================
// Package Manager
// ============================================================================

/// The project's package manager, detected from its lockfile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageManager {
    Npm,
    Yarn,
    Pnpm,
}

impl PackageManager {
    /// `pnpm-lock.yaml` wins over `yarn.lock`; npm otherwise.
    #[must_use]
    pub fn detect(project_root: &Path) -> Self {
        if project_root.join("pnpm-lock.yaml").exists() {
            Self::Pnpm
        } else if project_root.join("yarn.lock").exists() {
            Self::Yarn
        } else {
            Self::Npm
        }
    }

    /// Executable name.
    #[must_use]
    pub fn program(&self) -> &'static str {
        match self {
            Self::Npm => "npm",
            Self::Yarn => "yarn",
            Self::Pnpm => "pnpm",
        }
    }

    /// Command that adds `package` as a dev dependency.
    #[must_use]
    pub fn install_dev(&self, package: &str) -> ToolInvocation {
        let args: [&str; 3] = match self {
            Self::Npm => ["install", "--save-dev", package],
            Self::Yarn => ["add", "--dev", package],
            Self::Pnpm => ["add", "--save-dev", package],
        };
        ToolInvocation::new("install", self.program(), args)
    }
}

// ============================================================================
// Manifest
// ============================================================================

/// Whether the manifest was rewritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ManifestUpdate {
    Unchanged,
    Written,
}

/// Summary of a provisioning pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProvisionReport {
    /// Package manager used for the install, if one was needed.
    pub installed_with: Option<PackageManager>,
    pub manifest: ManifestUpdate,
}

/// The `typeCoverage` block for a threshold.
///
/// Whole-number thresholds are written as JSON integers.
#[must_use]
pub fn coverage_settings(threshold: f64) -> Value {
    json!({
        "atLeast": threshold_value(threshold),
        "detail": true,
        "strict": false,
        "ignoreCatch": true,
    })
}

/// Whether `package` appears in `dependencies` or `devDependencies`.
#[must_use]
pub fn declares_dependency(manifest: &Value, package: &str) -> bool {
    ["dependencies", "devDependencies"].iter().any(|section| {
        manifest
            .get(section)
            .and_then(Value::as_object)
            .is_some_and(|deps| deps.contains_key(package))
    })
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn threshold_value(threshold: f64) -> Value {
    if threshold.fract() == 0.0 && (0.0..=100.0).contains(&threshold) {
        json!(threshold as u64)
    } else {
        json!(threshold)
    }
}

fn manifest_path(project_root: &Path) -> PathBuf {
    project_root.join(MANIFEST)
}

fn tmp_file_path(project_root: &Path) -> PathBuf {
    project_root.join(format!("{MANIFEST}{TMP_SUFFIX}"))
}

fn lock_file_path(project_root: &Path) -> PathBuf {
    project_root.join(format!("{MANIFEST}{LOCK_SUFFIX}"))
}

/// Read and parse the manifest.
///
/// # Errors
///
/// Returns an error if the manifest is missing, unreadable, or not a JSON
/// object.
pub fn read_manifest(project_root: &Path) -> Result<Value> {
    let path = manifest_path(project_root);
    let content =
        fs::read_to_string(&path).map_err(|e| GateError::manifest(&path, e.to_string()))?;
    let value: Value =
        serde_json::from_str(&content).map_err(|e| GateError::manifest(&path, e.to_string()))?;
    if !value.is_object() {
        return Err(GateError::manifest(&path, "top level is not an object"));
    }
    Ok(value)
}

/// Write the coverage block, keeping every other key and its order.
///
/// Updates are serialized through an exclusive lock on a `package.json.lock`
/// sidecar and the manifest is replaced atomically. Nothing is written when
/// the block already matches.
///
/// # Errors
///
/// Returns an error if the manifest cannot be read, locked, or written.
pub fn ensure_coverage_config(project_root: &Path, threshold: f64) -> Result<ManifestUpdate> {
    let path = manifest_path(project_root);
    let lock_file = File::create(lock_file_path(project_root))
        .map_err(|e| GateError::manifest(&path, format!("Failed to create lock file: {e}")))?;
    FileExt::lock_exclusive(&lock_file)
        .map_err(|e| GateError::manifest(&path, format!("Failed to acquire lock: {e}")))?;

    let mut manifest = read_manifest(project_root)?;
    let desired = coverage_settings(threshold);

    if manifest.get(COVERAGE_KEY) == Some(&desired) {
        debug!("{} already configured in {}", COVERAGE_KEY, path.display());
        return Ok(ManifestUpdate::Unchanged);
    }

    let object: &mut Map<String, Value> = manifest
        .as_object_mut()
        .ok_or_else(|| GateError::manifest(&path, "top level is not an object"))?;
    object.insert(COVERAGE_KEY.to_string(), desired);

    let mut json = serde_json::to_string_pretty(&manifest)?;
    json.push('\n');

    replace_atomically(&tmp_file_path(project_root), &path, json.as_bytes())
        .map_err(|e| GateError::manifest(&path, format!("Failed to write: {e}")))?;

    info!("Wrote {} (atLeast {}) to {}", COVERAGE_KEY, threshold, path.display());
    Ok(ManifestUpdate::Written)
}

/// Write `contents` to `tmp_path` and rename it over `path`.
///
/// The tmp file is removed when any step fails.
fn replace_atomically(tmp_path: &Path, path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let result = File::create(tmp_path).and_then(|mut tmp_file| {
        tmp_file.write_all(contents)?;
        tmp_file.sync_all()?;
        fs::rename(tmp_path, path)
    });
    if result.is_err() {
        let _ = fs::remove_file(tmp_path);
    }
    result
}

/// Install the coverage package if needed, then configure the manifest.
///
/// # Errors
///
/// Returns an error if the package manager is missing, the install fails,
/// or the manifest cannot be updated.
pub async fn ensure_provisioned(
    project_root: &Path,
    runner: &dyn ToolRunner,
    threshold: f64,
) -> Result<ProvisionReport> {
    let manifest = read_manifest(project_root)?;

    let installed_with = if declares_dependency(&manifest, COVERAGE_PACKAGE) {
        debug!("{} already declared", COVERAGE_PACKAGE);
        None
    } else {
        let manager = PackageManager::detect(project_root);
        install(project_root, runner, manager).await?;
        Some(manager)
    };

    let manifest = ensure_coverage_config(project_root, threshold)?;
    Ok(ProvisionReport {
        installed_with,
        manifest,
    })
}

async fn install(project_root: &Path, runner: &dyn ToolRunner, manager: PackageManager) -> Result<()> {
    if !runner.is_available(manager.program()) {
        return Err(GateError::MissingTool {
            tool: manager.program().to_string(),
        });
    }

    let invocation = manager.install_dev(COVERAGE_PACKAGE);
    info!("Installing {}: {}", COVERAGE_PACKAGE, invocation.command_line());

    let output = runner
        .run(&invocation, project_root)
        .await
        .map_err(|e| GateError::provisioning(COVERAGE_PACKAGE, format!("{:#}", e)))?;

    if output.exited_cleanly() {
        Ok(())
    } else {
        Err(GateError::provisioning(
            COVERAGE_PACKAGE,
            output.combined().trim().to_string(),
        ))
    }
}
