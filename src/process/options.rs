//! Process-creation options carried in the options bag.

use std::path::PathBuf;

use serde_json::Value;

use crate::Options;

/// Keys the supervisor manages itself. Supplying any of these is an error.
pub const FORBIDDEN_OPTIONS: &[&str] = &[
    "args",
    "stdout",
    "stderr",
    "text",
    "universal_newlines",
    "encoding",
    "startup_info",
    "startupinfo",
    "creationflags",
    "creation_flags",
];

/// Working directory for the child.
pub const CWD_OPTION: &str = "cwd";
/// Extra environment variables, as an object of strings.
pub const ENV_OPTION: &str = "env";
/// Start the child with an empty environment before applying `env`.
pub const ENV_CLEAR_OPTION: &str = "env_clear";
/// Kill the child if the supervisor future is dropped mid-run.
pub const KILL_ON_DROP_OPTION: &str = "kill_on_drop";

/// Error type for process option validation.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum OptionError {
    /// The key is managed by the supervisor.
    #[error("Forbidden process option: {0}")]
    Forbidden(String),
    /// The key is known but its value has the wrong shape.
    #[error("Invalid value for process option {key}: expected {expected}")]
    Invalid { key: String, expected: &'static str },
}

/// Typed view of the process-creation keys in an options bag.
///
/// Keys this type does not know about are ignored; they may be meant for the
/// classifier.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOptions {
    pub cwd: Option<PathBuf>,
    pub env: Vec<(String, String)>,
    pub env_clear: bool,
    pub kill_on_drop: bool,
}

impl ProcessOptions {
    /// Reject any key the supervisor manages itself.
    ///
    /// # Errors
    ///
    /// Returns `OptionError::Forbidden` naming the first offending key.
    pub fn check_forbidden(options: &Options) -> Result<(), OptionError> {
        match FORBIDDEN_OPTIONS.iter().find(|key| options.contains_key(**key)) {
            Some(key) => Err(OptionError::Forbidden((*key).to_string())),
            None => Ok(()),
        }
    }

    /// Validate and extract the process-creation keys.
    ///
    /// # Errors
    ///
    /// Returns `OptionError` for forbidden keys or wrongly typed values.
    pub fn from_options(options: &Options) -> Result<Self, OptionError> {
        Self::check_forbidden(options)?;

        let cwd = match options.get(CWD_OPTION) {
            None | Some(Value::Null) => None,
            Some(Value::String(dir)) => Some(PathBuf::from(dir)),
            Some(_) => return Err(invalid(CWD_OPTION, "a string")),
        };

        let env = match options.get(ENV_OPTION) {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Object(vars)) => vars
                .iter()
                .map(|(key, value)| match value {
                    Value::String(s) => Ok((key.clone(), s.clone())),
                    _ => Err(invalid(ENV_OPTION, "an object of strings")),
                })
                .collect::<Result<_, _>>()?,
            Some(_) => return Err(invalid(ENV_OPTION, "an object of strings")),
        };

        Ok(Self {
            cwd,
            env,
            env_clear: bool_option(options, ENV_CLEAR_OPTION)?,
            kill_on_drop: bool_option(options, KILL_ON_DROP_OPTION)?,
        })
    }
}

fn invalid(key: &str, expected: &'static str) -> OptionError {
    OptionError::Invalid {
        key: key.to_string(),
        expected,
    }
}

fn bool_option(options: &Options, key: &str) -> Result<bool, OptionError> {
    match options.get(key) {
        None | Some(Value::Null) => Ok(false),
        Some(Value::Bool(b)) => Ok(*b),
        Some(_) => Err(invalid(key, "a boolean")),
    }
}

/// Overlay `overrides` on top of `base`.
#[must_use]
pub fn merge_options(base: &Options, overrides: &Options) -> Options {
    let mut merged = base.clone();
    for (key, value) in overrides {
        merged.insert(key.clone(), value.clone());
    }
    merged
}
