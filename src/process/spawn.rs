//! Spawning the child process.

use std::process::{ExitStatus, Stdio};

use tokio::process::{Child, Command};

use super::{CommandLine, ProcessOptions};

/// `CREATE_NO_WINDOW` process creation flag.
#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// Error type for process spawning operations.
#[derive(thiserror::Error, Debug)]
pub enum SpawnError {
    /// The executable was not found.
    #[error("Executable not found: {program}")]
    NotFound { program: String },
    /// Permission denied when spawning.
    #[error("Permission denied: {program}")]
    PermissionDenied { program: String },
    /// Other I/O error.
    #[error("Failed to spawn {program}: {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

impl SpawnError {
    /// Create a `SpawnError` from an I/O error, classifying common cases.
    fn from_io(program: &str, err: std::io::Error) -> Self {
        let program = program.to_string();
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound { program },
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { program },
            _ => Self::Io {
                program,
                source: err,
            },
        }
    }

    /// Program that failed to start.
    #[must_use]
    pub fn program(&self) -> &str {
        match self {
            Self::NotFound { program }
            | Self::PermissionDenied { program }
            | Self::Io { program, .. } => program,
        }
    }
}

/// Build the command with stdout and stderr piped and stdin closed.
///
/// `hide_console` only has an effect on Windows, where it sets
/// `CREATE_NO_WINDOW`. An empty `command` builds a command for the empty
/// program name, which fails at spawn time.
#[must_use]
pub fn build_command(
    command: &CommandLine,
    options: &ProcessOptions,
    hide_console: bool,
) -> Command {
    let mut cmd = Command::new(command.program().unwrap_or_default());
    cmd.args(command.arguments())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(options.kill_on_drop);

    if let Some(ref dir) = options.cwd {
        cmd.current_dir(dir);
    }
    if options.env_clear {
        cmd.env_clear();
    }
    cmd.envs(options.env.iter().map(|(k, v)| (k.as_str(), v.as_str())));

    #[cfg(windows)]
    {
        if hide_console {
            cmd.creation_flags(CREATE_NO_WINDOW);
        }
    }
    #[cfg(not(windows))]
    let _ = hide_console;

    cmd
}

/// Spawn `command`.
///
/// # Errors
///
/// Returns `SpawnError` if the process fails to spawn.
pub fn spawn(
    command: &CommandLine,
    options: &ProcessOptions,
    hide_console: bool,
) -> Result<Child, SpawnError> {
    let program = command.program().unwrap_or_default();
    build_command(command, options, hide_console)
        .spawn()
        .map_err(|e| SpawnError::from_io(program, e))
}

/// Exit code of a finished process.
///
/// A Unix process killed by signal `N` reports `-N`.
#[must_use]
pub fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return -signal;
        }
    }

    -1
}
