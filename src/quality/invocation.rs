//! External tool command lines.

use serde::Serialize;

/// One external process to spawn: a program and its arguments.
///
/// `tool` is the logical name used in logs and by test doubles; `program` is
/// what actually gets executed (usually `npx`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolInvocation {
    pub tool: String,
    pub program: String,
    pub args: Vec<String>,
}

impl ToolInvocation {
    /// Invoke `program` directly.
    pub fn new<I>(tool: impl Into<String>, program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        Self {
            tool: tool.into(),
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Invoke a package binary through `npx <bin> <args..>`.
    pub fn npx<I>(tool: impl Into<String>, bin: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let mut all_args = vec![bin.into()];
        all_args.extend(args.into_iter().map(Into::into));
        Self {
            tool: tool.into(),
            program: "npx".to_string(),
            args: all_args,
        }
    }

    /// Append arguments.
    #[must_use]
    pub fn with_args<I>(mut self, args: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Human-readable command line. Arguments are quoted for display only.
    #[must_use]
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .map(display_quote)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl std::fmt::Display for ToolInvocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.command_line())
    }
}

fn display_quote(arg: &str) -> String {
    let plain = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:@,+".contains(c));
    if plain {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}
