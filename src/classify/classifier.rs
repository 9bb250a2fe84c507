//! Classifier trait and the built-in classifiers.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::Options;

use super::Level;

/// Error type for classification.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ClassifyError {
    /// A level token did not name one of the five levels.
    #[error("Unknown level: {0}")]
    UnknownLevel(String),
    /// A classifier option had an unusable value.
    #[error("Invalid classifier option {key}: {reason}")]
    InvalidOption { key: String, reason: String },
    /// A custom classifier rejected the line.
    #[error("Classification failed: {0}")]
    Failed(String),
}

/// A line of child output after classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifiedLine {
    pub level: Level,
    pub message: String,
}

impl ClassifiedLine {
    #[must_use]
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }
}

/// Assigns a severity level and message to one line of child output.
///
/// Implementations receive the options bag the supervisor was configured
/// with. Any `Fn(&str, &Options) -> Result<ClassifiedLine, ClassifyError>`
/// closure is a classifier.
pub trait Classifier: Send + Sync {
    /// Classify a single, already trimmed, line.
    ///
    /// # Errors
    ///
    /// Returns `ClassifyError` if the line cannot be classified. The
    /// supervisor logs the failure and moves on to the next line.
    fn classify(&self, line: &str, options: &Options) -> Result<ClassifiedLine, ClassifyError>;
}

impl<F> Classifier for F
where
    F: Fn(&str, &Options) -> Result<ClassifiedLine, ClassifyError> + Send + Sync,
{
    fn classify(&self, line: &str, options: &Options) -> Result<ClassifiedLine, ClassifyError> {
        self(line, options)
    }
}

/// Classify a line by its `level: message` prefix.
///
/// `"WARNING:  disk low "` becomes `(warning, "disk low")`. Anything else,
/// including lines without a colon or with an unknown prefix, is `info` with
/// the line passed through untouched.
#[must_use]
pub fn classify_line(line: &str) -> ClassifiedLine {
    if let Some((prefix, rest)) = line.split_once(':') {
        if let Some(level) = Level::from_token(prefix) {
            return ClassifiedLine::new(level, rest.trim());
        }
    }
    ClassifiedLine::new(Level::Info, line)
}

/// The default classifier. Ignores its options.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrefixClassifier;

impl Classifier for PrefixClassifier {
    fn classify(&self, line: &str, _options: &Options) -> Result<ClassifiedLine, ClassifyError> {
        Ok(classify_line(line))
    }
}

/// Option key read by [`ThresholdClassifier`] for the lowest level it emits.
pub const MIN_LEVEL_OPTION: &str = "min_level";
/// Option key read by [`ThresholdClassifier`] for the highest level it emits.
pub const MAX_LEVEL_OPTION: &str = "max_level";

/// Clamps the level chosen by an inner classifier into the range configured
/// through the `min_level` and `max_level` options.
///
/// Useful when one deployment wants every line of a chatty tool at `debug`
/// (`max_level = "debug"`) while another wants them all visible
/// (`min_level = "info"`).
#[derive(Clone)]
pub struct ThresholdClassifier {
    inner: Arc<dyn Classifier>,
}

impl ThresholdClassifier {
    /// Wrap the default prefix classifier.
    #[must_use]
    pub fn new() -> Self {
        Self::wrap(Arc::new(PrefixClassifier))
    }

    /// Wrap an arbitrary classifier.
    #[must_use]
    pub fn wrap(inner: Arc<dyn Classifier>) -> Self {
        Self { inner }
    }

    fn level_option(options: &Options, key: &str) -> Result<Option<Level>, ClassifyError> {
        match options.get(key) {
            None | Some(serde_json::Value::Null) => Ok(None),
            Some(serde_json::Value::String(s)) => {
                s.parse().map(Some).map_err(|_| ClassifyError::InvalidOption {
                    key: key.to_string(),
                    reason: format!("unknown level {s:?}"),
                })
            }
            Some(other) => Err(ClassifyError::InvalidOption {
                key: key.to_string(),
                reason: format!("expected a level name, got {other}"),
            }),
        }
    }
}

impl Default for ThresholdClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ThresholdClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThresholdClassifier").finish_non_exhaustive()
    }
}

impl Classifier for ThresholdClassifier {
    fn classify(&self, line: &str, options: &Options) -> Result<ClassifiedLine, ClassifyError> {
        let min = Self::level_option(options, MIN_LEVEL_OPTION)?;
        let max = Self::level_option(options, MAX_LEVEL_OPTION)?;
        let mut classified = self.inner.classify(line, options)?;

        if let Some(min) = min {
            classified.level = classified.level.max(min);
        }
        if let Some(max) = max {
            classified.level = classified.level.min(max);
        }
        Ok(classified)
    }
}
