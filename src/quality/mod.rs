//! Quality checking.
//!
//! - [`checkers`] - One adapter per external tool
//! - [`parser`] - Two-pass output parsing
//! - [`provision`] - Coverage tool installation and manifest setup
//! - [`orchestrator`] - Sequential run over all checkers
//! - [`report`] - Aggregate outcome and rendering
//!
//! # Architecture
//!
//! ```text
//! RunConfig ──► RunOrchestrator ──► ChangeSetResolver (once, cached)
//!                    │
//!                    ├─► LintChecker       (npx eslint)
//!                    ├─► TypeCheckChecker  (npx tsc --noEmit)
//!                    └─► CoverageChecker   (npx type-coverage)
//!                    │
//!                    ▼
//!              AggregateReport ──► exit code
//! ```

pub mod checkers;
pub mod invocation;
pub mod orchestrator;
pub mod parser;
pub mod provision;
pub mod report;

pub use checkers::{
    CheckContext, CheckOutcome, Checker, CheckerKind, CoverageChecker, LintChecker,
    OutcomeStatus, TypeCheckChecker, WHOLE_PROJECT,
};
pub use invocation::ToolInvocation;
pub use orchestrator::{change_set_request, scope_rule_for, RunOrchestrator};
pub use parser::{Findings, OutputParser, ParsePass};
pub use provision::{ensure_provisioned, ManifestUpdate, PackageManager};
pub use report::AggregateReport;
