//! Colored CLI output for run results.

use std::io::{self, Write};

use chrono::Utc;
use owo_colors::OwoColorize;

use crate::supervisor::RunResult;

/// Get current timestamp in the same format as tracing.
fn timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}

/// One-line summary of a finished run, without colors.
#[must_use]
pub fn summarize(name: &str, result: &RunResult) -> String {
    let stderr = match result.stderr_lines.len() {
        0 => "no stderr".to_string(),
        1 => "1 stderr line".to_string(),
        n => format!("{n} stderr lines"),
    };
    format!("{name} exited with code {} ({stderr})", result.exit_code)
}

/// Print the result of a run to stderr, followed by the captured stderr lines.
pub fn print_run_result(name: &str, result: &RunResult) {
    let mut out = io::stderr().lock();
    let tag = if result.is_success() {
        "[DONE]".green().bold().to_string()
    } else {
        "[FAILED]".red().bold().to_string()
    };
    let _ = writeln!(
        out,
        "{} {} {}",
        timestamp().dimmed(),
        tag,
        summarize(name, result)
    );
    for line in &result.stderr_lines {
        let _ = writeln!(out, "  {} {}", "stderr:".yellow(), line);
    }
    let _ = out.flush();
}

/// Print an error that stopped a run from starting.
pub fn print_error(err: &dyn std::error::Error) {
    eprintln!("{} {} {err}", timestamp().dimmed(), "[ERROR]".red().bold());
}
