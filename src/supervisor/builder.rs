//! Supervisor construction.

use std::sync::Arc;

use crate::classify::{Classifier, PrefixClassifier};
use crate::config::KiddoConfig;
use crate::logging::{LoggerFactory, TracingLoggers};
use crate::process::{DecodePolicy, LineDecoder};
use crate::Options;

use super::{RunStateMachine, Supervisor, SupervisorError, SUPERVISOR_LOGGER};

/// Default charset for decoding child output.
pub const DEFAULT_CHARSET: &str = "utf-8";

/// Builder for [`Supervisor`].
#[derive(Clone)]
pub struct SupervisorBuilder {
    name: String,
    classifier: Arc<dyn Classifier>,
    hide_console: bool,
    charset: String,
    decode_policy: DecodePolicy,
    options: Options,
    loggers: Arc<dyn LoggerFactory>,
}

impl SupervisorBuilder {
    /// Create a builder for a supervisor whose child logger is named `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            classifier: Arc::new(PrefixClassifier),
            hide_console: true,
            charset: DEFAULT_CHARSET.to_string(),
            decode_policy: DecodePolicy::default(),
            options: Options::new(),
            loggers: Arc::new(TracingLoggers),
        }
    }

    /// Seed the builder from a loaded configuration file.
    #[must_use]
    pub fn from_config(name: impl Into<String>, config: &KiddoConfig) -> Self {
        Self::new(name)
            .hide_console(config.hide_console)
            .charset(config.charset.clone())
            .decode_policy(config.decode_policy)
            .options(config.options.clone())
    }

    /// Use a custom classifier instead of the `level: message` prefix parser.
    #[must_use]
    pub fn classifier(mut self, classifier: impl Classifier + 'static) -> Self {
        self.classifier = Arc::new(classifier);
        self
    }

    /// Use an already shared classifier.
    #[must_use]
    pub fn shared_classifier(mut self, classifier: Arc<dyn Classifier>) -> Self {
        self.classifier = classifier;
        self
    }

    /// Suppress the console window on Windows. No effect elsewhere.
    #[must_use]
    pub fn hide_console(mut self, hide: bool) -> Self {
        self.hide_console = hide;
        self
    }

    /// Charset label used to decode stdout and stderr.
    #[must_use]
    pub fn charset(mut self, charset: impl Into<String>) -> Self {
        self.charset = charset.into();
        self
    }

    #[must_use]
    pub fn decode_policy(mut self, policy: DecodePolicy) -> Self {
        self.decode_policy = policy;
        self
    }

    /// Set one option, passed to the classifier and to process creation.
    #[must_use]
    pub fn option(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Replace all options.
    #[must_use]
    pub fn options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    /// Where the supervisor gets its two loggers from.
    #[must_use]
    pub fn loggers(mut self, loggers: impl LoggerFactory + 'static) -> Self {
        self.loggers = Arc::new(loggers);
        self
    }

    /// Build the supervisor.
    ///
    /// # Errors
    ///
    /// Returns `SupervisorError` if the name is empty or reserved, or the
    /// charset is unusable.
    pub fn build(self) -> Result<Supervisor, SupervisorError> {
        if self.name.is_empty() {
            return Err(SupervisorError::EmptyName);
        }
        if self.name == SUPERVISOR_LOGGER {
            return Err(SupervisorError::ReservedName(self.name));
        }
        let decoder = LineDecoder::new(&self.charset, self.decode_policy)?;

        let logger = self.loggers.logger(SUPERVISOR_LOGGER);
        let child_logger = self.loggers.logger(&self.name);

        Ok(Supervisor {
            name: self.name,
            classifier: self.classifier,
            hide_console: self.hide_console,
            decoder,
            options: self.options,
            logger,
            child_logger,
            active_process: None,
            run: RunStateMachine::new(),
        })
    }
}

impl std::fmt::Debug for SupervisorBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupervisorBuilder")
            .field("name", &self.name)
            .field("hide_console", &self.hide_console)
            .field("charset", &self.charset)
            .field("decode_policy", &self.decode_policy)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
