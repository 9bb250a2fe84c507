//! Configuration types.

use serde::{Deserialize, Serialize};

use crate::process::DecodePolicy;
use crate::supervisor::DEFAULT_CHARSET;
use crate::Options;

/// Supervisor settings that can live in a config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KiddoConfig {
    /// Suppress the console window of the child on Windows.
    #[serde(default = "default_hide_console")]
    pub hide_console: bool,
    /// Charset label used to decode child output.
    #[serde(default = "default_charset")]
    pub charset: String,
    #[serde(default)]
    pub decode_policy: DecodePolicy,
    /// Options passed to the classifier and to process creation.
    #[serde(default)]
    pub options: Options,
}

fn default_hide_console() -> bool {
    true
}

fn default_charset() -> String {
    DEFAULT_CHARSET.to_string()
}

impl Default for KiddoConfig {
    fn default() -> Self {
        Self {
            hide_console: default_hide_console(),
            charset: default_charset(),
            decode_policy: DecodePolicy::default(),
            options: Options::new(),
        }
    }
}
