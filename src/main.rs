//! Kiddo - run a child process and route its output into structured logs.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use kiddo::classify::{Level, ThresholdClassifier, MAX_LEVEL_OPTION, MIN_LEVEL_OPTION};
use kiddo::config::ConfigLoader;
use kiddo::display;
use kiddo::process::{CommandLine, DecodePolicy};
use kiddo::supervisor::SupervisorBuilder;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LevelArg {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl From<LevelArg> for Level {
    fn from(arg: LevelArg) -> Self {
        match arg {
            LevelArg::Debug => Level::Debug,
            LevelArg::Info => Level::Info,
            LevelArg::Warning => Level::Warning,
            LevelArg::Error => Level::Error,
            LevelArg::Critical => Level::Critical,
        }
    }
}

#[derive(Parser)]
#[command(
    name = "kiddo",
    about = "Run a command and route its output into structured logs",
    version
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a command, logging each stdout line at the level it announces.
    Run {
        /// Name of the child logger.
        #[arg(short, long)]
        name: String,
        /// Config file to use instead of the default search paths.
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Charset of the child's output.
        #[arg(long)]
        charset: Option<String>,
        /// Drop undecodable bytes instead of replacing them.
        #[arg(long)]
        ignore_undecodable: bool,
        /// Let the child open a console window (Windows only).
        #[arg(long)]
        show_console: bool,
        /// Lowest level to log child lines at.
        #[arg(long, value_enum)]
        min_level: Option<LevelArg>,
        /// Highest level to log child lines at.
        #[arg(long, value_enum)]
        max_level: Option<LevelArg>,
        /// Extra option as KEY=VALUE; VALUE is parsed as JSON when possible.
        #[arg(short = 'o', long = "option", value_parser = parse_option)]
        options: Vec<(String, serde_json::Value)>,
        /// The command to run. A single argument is split on whitespace.
        #[arg(trailing_var_arg = true, required = true)]
        command: Vec<String>,
    },
}

fn parse_option(raw: &str) -> Result<(String, serde_json::Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got {raw:?}"))?;
    let value = serde_json::from_str(value)
        .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "warn,kiddo=info,kiddo::child=debug",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Run {
            name,
            config,
            charset,
            ignore_undecodable,
            show_console,
            min_level,
            max_level,
            options,
            command,
        } => {
            let loader = config.map_or_else(ConfigLoader::new, ConfigLoader::with_path);
            let config = match loader.load() {
                Ok(config) => config,
                Err(err) => {
                    display::print_error(&err);
                    return ExitCode::FAILURE;
                }
            };

            let mut builder = SupervisorBuilder::from_config(name.clone(), &config);
            if let Some(charset) = charset {
                builder = builder.charset(charset);
            }
            if ignore_undecodable {
                builder = builder.decode_policy(DecodePolicy::Ignore);
            }
            if show_console {
                builder = builder.hide_console(false);
            }
            if min_level.is_some() || max_level.is_some() {
                builder = builder.classifier(ThresholdClassifier::new());
            }
            if let Some(level) = min_level {
                builder = builder.option(MIN_LEVEL_OPTION, Level::from(level).as_str());
            }
            if let Some(level) = max_level {
                builder = builder.option(MAX_LEVEL_OPTION, Level::from(level).as_str());
            }
            for (key, value) in options {
                builder = builder.option(key, value);
            }

            let mut supervisor = match builder.build() {
                Ok(supervisor) => supervisor,
                Err(err) => {
                    display::print_error(&err);
                    return ExitCode::FAILURE;
                }
            };

            let command = if command.len() == 1 {
                CommandLine::split(&command[0])
            } else {
                CommandLine::from(command)
            };

            match supervisor.run(command).await {
                Ok(result) => {
                    display::print_run_result(&name, &result);
                    ExitCode::from(u8::try_from(result.exit_code).unwrap_or(1))
                }
                Err(err) => {
                    display::print_error(&err);
                    ExitCode::FAILURE
                }
            }
        }
    }
}
