//! Decoding raw output lines.

use encoding_rs::{DecoderResult, Encoding};
use serde::{Deserialize, Serialize};

/// What to do with bytes that are not valid in the configured charset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecodePolicy {
    /// Substitute U+FFFD for each malformed sequence.
    #[default]
    Replace,
    /// Drop malformed sequences.
    Ignore,
}

/// Error type for charset resolution.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CharsetError {
    /// The label does not name a known encoding.
    #[error("Unknown charset: {0}")]
    Unknown(String),
    /// The encoding cannot be split into lines on a `\n` byte.
    #[error("Unsupported charset: {0} is not ASCII-compatible")]
    NotAsciiCompatible(String),
}

/// A decoded line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedLine {
    pub text: String,
    /// True if malformed input was replaced or dropped.
    pub had_errors: bool,
}

/// Decodes line bytes under a fixed charset and policy. Never fails.
#[derive(Debug, Clone, Copy)]
pub struct LineDecoder {
    encoding: &'static Encoding,
    policy: DecodePolicy,
}

impl LineDecoder {
    /// Resolve `charset` (any WHATWG label: `utf-8`, `latin1`, `cp1252`, ...).
    ///
    /// # Errors
    ///
    /// Returns `CharsetError` for unknown labels and for encodings such as
    /// UTF-16 whose newlines are not a single `\n` byte.
    pub fn new(charset: &str, policy: DecodePolicy) -> Result<Self, CharsetError> {
        let encoding = Encoding::for_label(charset.trim().as_bytes())
            .ok_or_else(|| CharsetError::Unknown(charset.to_string()))?;
        if !encoding.is_ascii_compatible() {
            return Err(CharsetError::NotAsciiCompatible(charset.to_string()));
        }
        Ok(Self { encoding, policy })
    }

    /// Canonical name of the resolved encoding.
    #[must_use]
    pub fn charset(&self) -> &'static str {
        self.encoding.name()
    }

    #[must_use]
    pub fn policy(&self) -> DecodePolicy {
        self.policy
    }

    /// Decode one line. A trailing `\n` or `\r\n` is removed.
    #[must_use]
    pub fn decode(&self, bytes: &[u8]) -> DecodedLine {
        let bytes = strip_line_ending(bytes);
        match self.policy {
            DecodePolicy::Replace => {
                let (text, had_errors) = self.encoding.decode_without_bom_handling(bytes);
                DecodedLine {
                    text: text.into_owned(),
                    had_errors,
                }
            }
            DecodePolicy::Ignore => self.decode_ignoring(bytes),
        }
    }

    fn decode_ignoring(&self, bytes: &[u8]) -> DecodedLine {
        let mut decoder = self.encoding.new_decoder_without_bom_handling();
        let mut text = String::with_capacity(bytes.len());
        let mut had_errors = false;
        let mut src = bytes;

        loop {
            let needed = decoder
                .max_utf8_buffer_length_without_replacement(src.len())
                .unwrap_or(src.len().saturating_mul(3));
            text.reserve(needed.max(4));

            let (result, read) = decoder.decode_to_string_without_replacement(src, &mut text, true);
            src = &src[read..];
            match result {
                DecoderResult::InputEmpty => break,
                DecoderResult::OutputFull => {}
                DecoderResult::Malformed(_, _) => had_errors = true,
            }
        }

        DecodedLine { text, had_errors }
    }
}

impl Default for LineDecoder {
    fn default() -> Self {
        Self {
            encoding: encoding_rs::UTF_8,
            policy: DecodePolicy::Replace,
        }
    }
}

fn strip_line_ending(bytes: &[u8]) -> &[u8] {
    let bytes = bytes.strip_suffix(b"\n").unwrap_or(bytes);
    bytes.strip_suffix(b"\r").unwrap_or(bytes)
}
