//! Error types for diffgate.
//!
//! Most failure modes of a gate run are *not* errors: degraded change-set
//! resolution and tool findings are ordinary data. [`GateError`] covers the
//! remainder - things that either abort the whole run or turn a single
//! checker into an errored outcome.

use std::path::PathBuf;
use thiserror::Error;

/// Exit code for a project outside any git working tree.
pub const NOT_A_REPOSITORY_EXIT_CODE: i32 = 2;

/// Exit code for unusable configuration: bad config files, values or flags.
pub const CONFIG_EXIT_CODE: i32 = 7;

/// Main error type for diffgate operations
#[derive(Error, Debug)]
pub enum GateError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Failed to load configuration
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        path: Option<PathBuf>,
    },

    /// Invalid configuration value
    #[error("Invalid configuration: {field} - {reason}")]
    InvalidConfig { field: String, reason: String },

    // =========================================================================
    // Repository Errors
    // =========================================================================
    /// The project directory is not inside a git working tree
    #[error("Not a git working tree: {path}")]
    NotARepository { path: PathBuf },

    // =========================================================================
    // Tool Errors
    // =========================================================================
    /// Missing required tool
    #[error("Missing required tool: {tool}")]
    MissingTool { tool: String },

    /// Tool could not be spawned or its output could not be read
    #[error("Tool '{tool}' failed: {message}")]
    ToolExecution { tool: String, message: String },

    // =========================================================================
    // Manifest Errors
    // =========================================================================
    /// The project manifest could not be read or written
    #[error("Manifest error at {path}: {message}")]
    Manifest { path: PathBuf, message: String },

    /// Installing a companion tool failed
    #[error("Provisioning '{package}' failed: {message}")]
    Provisioning { package: String, message: String },

    // =========================================================================
    // Wrapped Errors
    // =========================================================================
    /// IO error wrapper
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON error wrapper
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// TOML error wrapper
    #[error(transparent)]
    Toml(#[from] toml::de::Error),

    /// Generic error wrapper
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl GateError {
    // =========================================================================
    // Constructor helpers
    // =========================================================================

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            path: None,
        }
    }

    /// Create a configuration error with path
    pub fn config_with_path(message: impl Into<String>, path: PathBuf) -> Self {
        Self::Config {
            message: message.into(),
            path: Some(path),
        }
    }

    /// Create an invalid configuration error
    pub fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create a tool execution error
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ToolExecution {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Create a manifest error
    pub fn manifest(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Manifest {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a provisioning error
    pub fn provisioning(package: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provisioning {
            package: package.into(),
            message: message.into(),
        }
    }

    // =========================================================================
    // Classification helpers
    // =========================================================================

    /// Get error code for exit status
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::NotARepository { .. } => NOT_A_REPOSITORY_EXIT_CODE,
            Self::Config { .. } | Self::InvalidConfig { .. } | Self::Toml(_) => CONFIG_EXIT_CODE,
            _ => 1,
        }
    }
}

/// Type alias for diffgate results
pub type Result<T> = std::result::Result<T, GateError>;
