//! Command lines.

use std::borrow::Cow;
use std::fmt;

/// A tokenized command line: program followed by its arguments.
///
/// Built from either pre-split arguments or a single string. Strings are
/// split on whitespace with no shell quoting, so `"echo 'a b'"` yields the
/// three tokens `echo`, `'a`, `b'`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandLine {
    args: Vec<String>,
    split: bool,
}

impl CommandLine {
    /// Build from already tokenized arguments.
    pub fn from_args<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
            split: false,
        }
    }

    /// Split a raw string on whitespace.
    #[must_use]
    pub fn split(raw: &str) -> Self {
        Self {
            args: raw.split_whitespace().map(String::from).collect(),
            split: true,
        }
    }

    /// The program to run, if any.
    #[must_use]
    pub fn program(&self) -> Option<&str> {
        self.args.first().map(String::as_str)
    }

    /// Everything after the program.
    #[must_use]
    pub fn arguments(&self) -> &[String] {
        self.args.get(1..).unwrap_or_default()
    }

    /// Every token, program included.
    #[must_use]
    pub fn tokens(&self) -> &[String] {
        &self.args
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    /// Whether this command line came from splitting a raw string.
    #[must_use]
    pub fn was_split(&self) -> bool {
        self.split
    }
}

impl fmt::Display for CommandLine {
    /// Shell-escaped rendering, for logs only.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            f.write_str(&shell_escape::escape(Cow::Borrowed(arg.as_str())))?;
        }
        Ok(())
    }
}

impl From<&str> for CommandLine {
    fn from(raw: &str) -> Self {
        Self::split(raw)
    }
}

impl From<String> for CommandLine {
    fn from(raw: String) -> Self {
        Self::split(&raw)
    }
}

impl From<&String> for CommandLine {
    fn from(raw: &String) -> Self {
        Self::split(raw)
    }
}

impl From<Vec<String>> for CommandLine {
    fn from(args: Vec<String>) -> Self {
        Self { args, split: false }
    }
}

impl From<Vec<&str>> for CommandLine {
    fn from(args: Vec<&str>) -> Self {
        Self::from_args(args)
    }
}

impl From<&[&str]> for CommandLine {
    fn from(args: &[&str]) -> Self {
        Self::from_args(args.iter().copied())
    }
}

impl From<&[String]> for CommandLine {
    fn from(args: &[String]) -> Self {
        Self::from_args(args.iter().cloned())
    }
}

impl<const N: usize> From<[&str; N]> for CommandLine {
    fn from(args: [&str; N]) -> Self {
        Self::from_args(args)
    }
}
