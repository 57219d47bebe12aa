//! Output parsing shared by all checkers.
//!
//! Tool output formats differ between a run with findings and a clean run,
//! and between tool versions. Each checker therefore supplies two passes:
//!
//! - **direct**: the tool's documented finding or summary format
//! - **fallback**: a loose marker search, consulted only when the direct pass
//!   finds nothing but the process exited non-zero
//!
//! When both passes come up empty after a non-zero exit a single error is
//! synthesized, so a failing tool can never produce a passing outcome.
//!
//! # Example
//!
//! ```rust
//! use diffgate::quality::parser::{parse_double_pass, count_marker_lines, Findings, OutputParser, ParsePass};
//! use diffgate::testing::ToolOutput;
//!
//! struct Markers;
//!
//! impl OutputParser for Markers {
//!     fn parse_direct(&self, _text: &str) -> Findings {
//!         Findings::default()
//!     }
//!     fn parse_fallback(&self, text: &str) -> Findings {
//!         Findings::new(count_marker_lines(text, &["error"]), 0)
//!     }
//! }
//!
//! let parsed = parse_double_pass(&Markers, &ToolOutput::failure(1, "1 error found"));
//! assert_eq!(parsed.pass, ParsePass::Fallback);
//! assert_eq!(parsed.findings.errors, 1);
//! ```

use serde::Serialize;

use crate::testing::ToolOutput;

/// Error and warning counts recovered from tool output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Findings {
    pub errors: u32,
    pub warnings: u32,
}

impl Findings {
    #[must_use]
    pub fn new(errors: u32, warnings: u32) -> Self {
        Self { errors, warnings }
    }

    /// No errors and no warnings.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors == 0 && self.warnings == 0
    }
}

impl std::ops::Add for Findings {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            errors: self.errors.saturating_add(rhs.errors),
            warnings: self.warnings.saturating_add(rhs.warnings),
        }
    }
}

/// Which pass produced the final counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParsePass {
    /// The documented format matched.
    Direct,
    /// Clean exit, nothing found.
    Clean,
    /// Marker search after a silent non-zero exit.
    Fallback,
    /// Neither pass found anything after a non-zero exit.
    Synthesized,
}

/// Counts plus provenance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedOutput {
    pub findings: Findings,
    pub pass: ParsePass,
    /// Set when the counts were synthesized.
    pub note: Option<String>,
}

/// The two parse passes a checker provides.
pub trait OutputParser {
    /// Parse the tool's documented format.
    fn parse_direct(&self, text: &str) -> Findings;

    /// Loose marker search.
    fn parse_fallback(&self, text: &str) -> Findings;
}

/// Run the direct pass, then the fallback pass if warranted.
///
/// The text parsed is stdout and stderr combined.
pub fn parse_double_pass<P: OutputParser + ?Sized>(parser: &P, output: &ToolOutput) -> ParsedOutput {
    let text = output.combined();

    let direct = parser.parse_direct(&text);
    if !direct.is_empty() {
        return ParsedOutput {
            findings: direct,
            pass: ParsePass::Direct,
            note: None,
        };
    }

    if output.exited_cleanly() {
        return ParsedOutput {
            findings: direct,
            pass: ParsePass::Clean,
            note: None,
        };
    }

    let fallback = parser.parse_fallback(&text);
    if !fallback.is_empty() {
        return ParsedOutput {
            findings: fallback,
            pass: ParsePass::Fallback,
            note: None,
        };
    }

    let status = output
        .exit_code
        .map_or_else(|| "a signal".to_string(), |code| format!("status {}", code));
    ParsedOutput {
        findings: Findings::new(1, 0),
        pass: ParsePass::Synthesized,
        note: Some(format!(
            "exited with {} without recognizable findings",
            status
        )),
    }
}

/// Count lines that contain any of `markers` as a whole word
/// (case-insensitive).
#[must_use]
pub fn count_marker_lines(text: &str, markers: &[&str]) -> u32 {
    let count = text
        .lines()
        .filter(|line| {
            let lower = line.to_ascii_lowercase();
            markers.iter().any(|m| contains_word(&lower, &m.to_ascii_lowercase()))
        })
        .count();
    u32::try_from(count).unwrap_or(u32::MAX)
}

/// Parse a captured count, saturating instead of failing.
#[must_use]
pub fn parse_count(raw: &str) -> u32 {
    raw.trim().parse::<u64>().map_or(0, |n| u32::try_from(n).unwrap_or(u32::MAX))
}

fn contains_word(haystack: &str, word: &str) -> bool {
    if word.is_empty() {
        return false;
    }
    haystack.match_indices(word).any(|(start, _)| {
        let before = haystack[..start].chars().next_back();
        let after = haystack[start + word.len()..].chars().next();
        !before.is_some_and(|c| c.is_ascii_alphanumeric())
            && !after.is_some_and(|c| c.is_ascii_alphanumeric())
    })
}
