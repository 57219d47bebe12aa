//! diffgate - CI quality gate for JavaScript and TypeScript projects
//!
//! Runs ESLint, the TypeScript compiler, and type-coverage against exactly
//! the files a branch changed, and folds their results into one verdict and
//! exit code.
//!
//! # Architecture
//!
//! - [`changes`] - Change-set resolution (direct diff, branch deploy) and
//!   per-checker scope filtering
//! - [`quality`] - Checker adapters, output parsing, provisioning and the run
//!   orchestrator
//! - [`config`] - Layered configuration and validation
//! - [`operations`] - Real git and process implementations
//! - [`error`] - Error types
//! - [`testing`] - Testing infrastructure (traits, mocks, fixtures)
//!
//! # Example
//!
//! ```rust,ignore
//! use diffgate::config::RunConfig;
//! use diffgate::operations::{RealGitOperations, RealToolRunner};
//! use diffgate::quality::RunOrchestrator;
//!
//! let (config, _) = RunConfig::load(&project, None)?;
//! let git = RealGitOperations::new(project.clone());
//! let runner = RealToolRunner::new();
//!
//! let report = RunOrchestrator::new(&project, &config, &git, &runner).run().await?;
//! println!("{}", report.format());
//! std::process::exit(report.exit_code());
//! ```

pub mod changes;
pub mod config;
pub mod error;
pub mod operations;
pub mod quality;
pub mod testing;

// Re-export commonly used types
pub use error::{GateError, Result};

// Re-export config types
pub use config::{ConfigOverrides, RunConfig, ValidationReport};

// Re-export change-set types
pub use changes::{
    ChangeSet, ChangeSetRequest, ChangeSetResolver, CheckMode, DeployContext, Resolution,
    ResolutionNote, ScopeRule,
};

// Re-export quality types
pub use quality::{AggregateReport, CheckOutcome, Checker, CheckerKind, RunOrchestrator};

// Re-export testing types for convenience
pub use testing::{GitOperations, MockGitOperations, MockToolRunner, ToolRunner};
