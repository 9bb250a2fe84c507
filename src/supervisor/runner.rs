//! The process supervisor.
//!
//! A [`Supervisor`] starts one child at a time, streams its stdout through a
//! [`Classifier`] into a named child logger while the child runs, collects
//! its stderr, and hands back the exit code and stderr lines. Diagnostics
//! about the run itself go to a separate logger named [`SUPERVISOR_LOGGER`].

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, ChildStdout};

use crate::classify::{Classifier, Level};
use crate::logging::Logger;
use crate::process::{
    self, merge_options, CommandLine, DecodePolicy, LineDecoder, ProcessOptions,
};
use crate::Options;

use super::{
    LineError, RunResult, RunState, RunStateMachine, RunStats, SupervisorBuilder, SupervisorError,
};

/// Name of the supervisor's own diagnostic logger. Child names may not use it.
pub const SUPERVISOR_LOGGER: &str = "kiddo::supervisor";

/// Attribute carrying the undecorated stdout line on each child record.
pub const STDOUT_ATTRIBUTE: &str = "stdout";

/// Exit code reported when the exit status could not be collected.
const UNKNOWN_EXIT_CODE: i32 = -1;

/// The most recently started child.
#[derive(Debug)]
pub(super) struct ActiveProcess {
    pid: Option<u32>,
    command: CommandLine,
    child: Child,
}

/// Runs commands and routes their stdout into a named logger.
pub struct Supervisor {
    pub(super) name: String,
    pub(super) classifier: Arc<dyn Classifier>,
    pub(super) hide_console: bool,
    pub(super) decoder: LineDecoder,
    pub(super) options: Options,
    pub(super) logger: Arc<dyn Logger>,
    pub(super) child_logger: Arc<dyn Logger>,
    pub(super) active_process: Option<ActiveProcess>,
    pub(super) run: RunStateMachine,
}

impl Supervisor {
    /// Create a supervisor with default settings.
    ///
    /// # Errors
    ///
    /// Returns `SupervisorError` if `name` is empty or equals
    /// [`SUPERVISOR_LOGGER`].
    pub fn new(name: impl Into<String>) -> Result<Self, SupervisorError> {
        SupervisorBuilder::new(name).build()
    }

    /// Start building a supervisor.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> SupervisorBuilder {
        SupervisorBuilder::new(name)
    }

    /// Name of the supervisor and of its child logger.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn hide_console(&self) -> bool {
        self.hide_console
    }

    /// Name of the logger child output is written to.
    #[must_use]
    pub fn logger_name(&self) -> &str {
        self.child_logger.name()
    }

    /// Canonical name of the charset used for decoding.
    #[must_use]
    pub fn charset(&self) -> &'static str {
        self.decoder.charset()
    }

    #[must_use]
    pub fn decode_policy(&self) -> DecodePolicy {
        self.decoder.policy()
    }

    #[must_use]
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Process ID of the most recently started child.
    #[must_use]
    pub fn active_pid(&self) -> Option<u32> {
        self.active_process.as_ref().and_then(|p| p.pid)
    }

    /// Command line of the most recently started child.
    #[must_use]
    pub fn active_command(&self) -> Option<&CommandLine> {
        self.active_process.as_ref().map(|p| &p.command)
    }

    /// Phase of the current or last run.
    #[must_use]
    pub fn state(&self) -> RunState {
        self.run.state()
    }

    /// Line counters of the current or last run.
    #[must_use]
    pub fn stats(&self) -> RunStats {
        self.run.stats()
    }

    /// Run `command` with no extra process options.
    ///
    /// # Errors
    ///
    /// See [`Supervisor::run_with`].
    pub async fn run(
        &mut self,
        command: impl Into<CommandLine>,
    ) -> Result<RunResult, SupervisorError> {
        self.run_with(command, &Options::new()).await
    }

    /// Run `command` to completion.
    ///
    /// `options` are merged over the supervisor's own options for process
    /// creation only. Returns once the child has exited. A non-zero exit code
    /// or stderr output is not an error; inspect the returned [`RunResult`].
    ///
    /// Lines are buffered whole before decoding, so a child that writes an
    /// unbounded amount of output without a newline grows memory until it
    /// closes the stream.
    ///
    /// # Errors
    ///
    /// Returns a configuration error (forbidden or malformed option, empty
    /// command) before anything is spawned, or `SupervisorError::Spawn` if
    /// the process could not be started.
    pub async fn run_with(
        &mut self,
        command: impl Into<CommandLine>,
        options: &Options,
    ) -> Result<RunResult, SupervisorError> {
        let command = command.into();
        self.run = RunStateMachine::new();

        if command.was_split() {
            self.diag(
                Level::Debug,
                &format!("Split command string into: {:?}", command.tokens()),
            );
        }

        let process_options = ProcessOptions::check_forbidden(options)
            .and_then(|()| ProcessOptions::from_options(&merge_options(&self.options, options)))
            .map_err(|err| {
                self.diag(Level::Error, &err.to_string());
                SupervisorError::from(err)
            })?;
        if command.is_empty() {
            self.diag(Level::Error, "Refusing to run an empty command");
            return Err(SupervisorError::EmptyCommand);
        }

        self.diag(Level::Debug, &format!("Running command: {command}"));

        let mut child = match process::spawn(&command, &process_options, self.hide_console) {
            Ok(child) => child,
            Err(err) => {
                self.diag(Level::Warning, "Couldn't run command.");
                self.diag(Level::Error, &err.to_string());
                return Err(err.into());
            }
        };
        self.run.transition(RunState::Running);

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let pid = child.id();
        tracing::debug!(name = %self.name, pid = ?pid, "Child process started");
        self.active_process = Some(ActiveProcess {
            pid,
            command,
            child,
        });

        let decoder = self.decoder;
        let stderr_task = stderr.map(|stream| tokio::spawn(collect_lines(stream, decoder)));

        if let Some(stdout) = stdout {
            self.drain_stdout(stdout).await;
        }
        self.run.transition(RunState::Draining);

        let stderr = match stderr_task {
            Some(task) => task.await.unwrap_or_else(|err| {
                self.diag(Level::Warning, &format!("Lost stderr output: {err}"));
                CollectedLines::default()
            }),
            None => CollectedLines::default(),
        };
        self.run.record_undecodable_lines(stderr.undecodable);
        let stderr_lines = stderr.lines;

        let exit_code = self.reap().await;
        self.run.transition(RunState::Terminated);

        if exit_code != 0 || !stderr_lines.is_empty() {
            self.diag(Level::Warning, "Running the command appears to have failed.");
            self.diag(Level::Debug, &format!("stderr: {stderr_lines:?}"));
        }
        self.diag(Level::Info, &format!("Command returned code: {exit_code}"));

        Ok(RunResult {
            exit_code,
            stderr_lines,
        })
    }

    async fn drain_stdout(&mut self, stdout: ChildStdout) {
        let mut reader = BufReader::new(stdout);
        let mut buf = Vec::new();

        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => self.handle_line(&buf),
                Err(err) => {
                    self.diag(Level::Warning, &format!("Stopped reading stdout: {err}"));
                    break;
                }
            }
        }
    }

    fn handle_line(&mut self, bytes: &[u8]) {
        let decoded = self.decoder.decode(bytes);
        if decoded.had_errors {
            self.run.record_undecodable();
        }
        let raw = decoded.text;
        let line = raw.trim();

        match self.log_line(line, &raw) {
            Ok(()) => self.run.record_logged(),
            Err(err) => {
                self.run.record_failed();
                self.diag(Level::Warning, &format!("Can't log subprocess line: {line}"));
                self.diag(Level::Error, &err.to_string());
            }
        }
    }

    fn log_line(&self, line: &str, raw: &str) -> Result<(), LineError> {
        let classifier = &self.classifier;
        let options = &self.options;
        let classified =
            panic::catch_unwind(AssertUnwindSafe(|| classifier.classify(line, options)))
                .map_err(|payload| LineError::Panicked(panic_message(payload.as_ref())))??;

        self.child_logger.log(
            classified.level,
            &classified.message,
            &[(STDOUT_ATTRIBUTE, raw)],
        )?;
        Ok(())
    }

    async fn reap(&mut self) -> i32 {
        let Some(active) = self.active_process.as_mut() else {
            return UNKNOWN_EXIT_CODE;
        };
        match active.child.wait().await {
            Ok(status) => process::exit_code(status),
            Err(err) => {
                self.diag(Level::Error, &format!("Failed to collect exit status: {err}"));
                UNKNOWN_EXIT_CODE
            }
        }
    }

    /// Log to the diagnostic logger. A failing sink is only traced.
    fn diag(&self, level: Level, message: &str) {
        if let Err(err) = self.logger.log(level, message, &[]) {
            tracing::trace!(error = %err, "Diagnostic logger rejected record");
        }
    }
}

impl std::fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Supervisor")
            .field("name", &self.name)
            .field("hide_console", &self.hide_console)
            .field("decoder", &self.decoder)
            .field("options", &self.options)
            .field("active_pid", &self.active_pid())
            .field("state", &self.run.state())
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Default)]
struct CollectedLines {
    lines: Vec<String>,
    /// Lines that contained bytes invalid in the charset.
    undecodable: usize,
}

/// Read `stream` to the end, decoding and trimming each line.
async fn collect_lines<R>(stream: R, decoder: LineDecoder) -> CollectedLines
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(stream);
    let mut buf = Vec::new();
    let mut collected = CollectedLines::default();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let decoded = decoder.decode(&buf);
                if decoded.had_errors {
                    collected.undecodable += 1;
                }
                collected.lines.push(decoded.text.trim().to_string());
            }
            Err(err) => {
                tracing::warn!(error = %err, "Stopped reading stderr");
                break;
            }
        }
    }

    collected
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
