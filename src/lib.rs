//! Kiddo - run a child process and route its output into structured logs.
//!
//! ```no_run
//! # async fn demo() -> Result<(), kiddo::supervisor::SupervisorError> {
//! use kiddo::supervisor::Supervisor;
//!
//! let mut kid = Supervisor::new("nightly-backup")?;
//! let result = kid.run("backup.sh --full").await?;
//! if !result.is_success() {
//!     eprintln!("exit {}: {:?}", result.exit_code, result.stderr_lines);
//! }
//! # Ok(())
//! # }
//! ```

pub mod classify;
pub mod config;
pub mod display;
pub mod logging;
pub mod process;
pub mod supervisor;

/// Free-form options bag shared by classifiers and process creation.
pub type Options = serde_json::Map<String, serde_json::Value>;
