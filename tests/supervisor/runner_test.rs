//! Tests for running child processes under a supervisor.

use std::sync::{Arc, Mutex};

use kiddo::classify::{
    ClassifiedLine, ClassifyError, Level, ThresholdClassifier, MIN_LEVEL_OPTION,
};
use kiddo::logging::{Attributes, Logger, LoggerFactory, MemoryLoggers, SinkError};
use kiddo::process::{OptionError, SpawnError};
use kiddo::supervisor::{
    RunState, Supervisor, SupervisorError, STDOUT_ATTRIBUTE, SUPERVISOR_LOGGER,
};
use kiddo::Options;
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::Layer;

fn sh(script: &str) -> Vec<String> {
    vec!["sh".to_string(), "-c".to_string(), script.to_string()]
}

fn supervisor(name: &str) -> (Supervisor, MemoryLoggers) {
    let loggers = MemoryLoggers::new();
    let kid = Supervisor::builder(name)
        .loggers(loggers.clone())
        .build()
        .unwrap();
    (kid, loggers)
}

fn messages(loggers: &MemoryLoggers, name: &str) -> Vec<String> {
    loggers
        .records_for(name)
        .into_iter()
        .map(|r| r.message)
        .collect()
}

#[tokio::test]
async fn long_output_is_logged_in_order() {
    let (mut kid, loggers) = supervisor("long_output");
    let script = "i=1; while [ $i -le 1234 ]; do echo $i; i=$((i+1)); done";

    let result = kid.run(sh(script)).await.unwrap();

    assert_eq!(result.exit_code, 0);
    assert!(result.stderr_lines.is_empty());
    let last = loggers.last_for("long_output").unwrap();
    assert_eq!(last.message.parse::<u32>().unwrap(), 1234);

    let logged = messages(&loggers, "long_output");
    assert_eq!(logged.len(), 1234);
    assert!(logged
        .iter()
        .enumerate()
        .all(|(i, msg)| msg == &(i + 1).to_string()));
    assert_eq!(kid.stats().lines_logged, 1234);
}

#[tokio::test]
async fn failing_command_returns_code_and_stderr() {
    let (mut kid, loggers) = supervisor("failing");
    let script = "echo 'info: working'; \
                  echo '  first problem  ' >&2; \
                  echo 'second problem' >&2; \
                  exit 3";

    let result = kid.run(sh(script)).await.unwrap();

    assert_eq!(result.exit_code, 3);
    assert_eq!(result.stderr_lines, vec!["first problem", "second problem"]);
    assert!(!result.is_success());

    let diagnostics = messages(&loggers, SUPERVISOR_LOGGER);
    assert!(diagnostics
        .iter()
        .any(|m| m == "Running the command appears to have failed."));
    assert!(diagnostics.iter().any(|m| m == "Command returned code: 3"));
    assert_eq!(messages(&loggers, "failing"), vec!["working"]);
}

#[tokio::test]
async fn clean_command_returns_zero_and_no_stderr() {
    let (mut kid, loggers) = supervisor("clean");

    let result = kid.run("true").await.unwrap();

    assert_eq!(result.exit_code, 0);
    assert!(result.stderr_lines.is_empty());
    assert!(result.is_success());
    assert!(!messages(&loggers, SUPERVISOR_LOGGER)
        .iter()
        .any(|m| m.contains("appears to have failed")));
    assert_eq!(kid.state(), RunState::Terminated);
    assert!(kid.active_pid().is_some());
}

#[tokio::test]
async fn forbidden_option_spawns_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("marker");
    let (mut kid, loggers) = supervisor("forbidden");

    let mut options = Options::new();
    options.insert("stdout".to_string(), serde_json::Value::Null);
    let script = format!("touch {}", marker.display());

    let err = kid.run_with(sh(&script), &options).await.unwrap_err();

    assert!(matches!(
        err,
        SupervisorError::Option(OptionError::Forbidden(ref key)) if key == "stdout"
    ));
    assert!(err.is_config_error());
    assert!(!marker.exists());
    assert!(kid.active_pid().is_none());
    assert_eq!(kid.state(), RunState::NotStarted);
    let errors: Vec<_> = loggers
        .records_for(SUPERVISOR_LOGGER)
        .into_iter()
        .filter(|r| r.level == Level::Error)
        .collect();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].message.contains("stdout"));
}

#[tokio::test]
async fn forbidden_supervisor_option_spawns_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("marker");
    let loggers = MemoryLoggers::new();
    let mut kid = Supervisor::builder("forbidden_default")
        .option("stdout", "pipe")
        .loggers(loggers.clone())
        .build()
        .unwrap();

    let err = kid
        .run(sh(&format!("touch {}", marker.display())))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        SupervisorError::Option(OptionError::Forbidden(ref key)) if key == "stdout"
    ));
    assert!(!marker.exists());
    assert!(kid.active_pid().is_none());
    assert_eq!(kid.state(), RunState::NotStarted);
    assert!(loggers.records_for("forbidden_default").is_empty());
}

#[tokio::test]
async fn undecodable_stderr_is_counted() {
    let (mut kid, _loggers) = supervisor("stderr_undecodable");

    let result = kid
        .run(sh(r"printf 'info: fine\n'; printf 'bad \377\nok\n' >&2"))
        .await
        .unwrap();

    assert_eq!(result.stderr_lines, vec!["bad \u{FFFD}", "ok"]);
    assert_eq!(kid.stats().lines_undecodable, 1);
    assert_eq!(kid.stats().lines_logged, 1);
}

#[tokio::test]
async fn undecodable_bytes_do_not_abort_the_run() {
    let (mut kid, loggers) = supervisor("undecodable");
    let script = r"printf 'info: before\n\377\376 broken\nwarning: after\n'";

    let result = kid.run(sh(script)).await.unwrap();

    assert_eq!(result.exit_code, 0);
    let records = loggers.records_for("undecodable");
    assert_eq!(records.len(), 3);
    assert_eq!(records[1].message, "\u{FFFD}\u{FFFD} broken");
    assert_eq!(records[2].level, Level::Warning);
    assert_eq!(records[2].message, "after");
    assert_eq!(kid.stats().lines_undecodable, 1);
}

#[tokio::test]
async fn ignore_policy_drops_undecodable_bytes() {
    let loggers = MemoryLoggers::new();
    let mut kid = Supervisor::builder("ignoring")
        .decode_policy(kiddo::process::DecodePolicy::Ignore)
        .loggers(loggers.clone())
        .build()
        .unwrap();

    kid.run(sh(r"printf 'ok\377\n'")).await.unwrap();

    assert_eq!(messages(&loggers, "ignoring"), vec!["ok"]);
}

#[tokio::test]
async fn configured_charset_is_used() {
    let loggers = MemoryLoggers::new();
    let mut kid = Supervisor::builder("latin")
        .charset("latin1")
        .loggers(loggers.clone())
        .build()
        .unwrap();

    let result = kid
        .run(sh(r"printf 'error: caf\351\n'; printf 'na\357ve\n' >&2"))
        .await
        .unwrap();

    let last = loggers.last_for("latin").unwrap();
    assert_eq!(last.level, Level::Error);
    assert_eq!(last.message, "café");
    assert_eq!(result.stderr_lines, vec!["naïve"]);
}

#[tokio::test]
async fn raw_line_is_attached_as_stdout_attribute() {
    let (mut kid, loggers) = supervisor("raw");

    kid.run(sh("echo '  ERROR:   boom  '")).await.unwrap();

    let record = loggers.last_for("raw").unwrap();
    assert_eq!(record.level, Level::Error);
    assert_eq!(record.message, "boom");
    assert_eq!(record.attribute(STDOUT_ATTRIBUTE), Some("  ERROR:   boom  "));
}

#[tokio::test]
async fn string_command_is_split_on_whitespace() {
    let (mut kid, loggers) = supervisor("split");

    kid.run("echo   warning:   spaced out").await.unwrap();

    let record = loggers.last_for("split").unwrap();
    assert_eq!(record.level, Level::Warning);
    assert_eq!(record.message, "spaced out");
    assert_eq!(
        kid.active_command().unwrap().tokens(),
        ["echo", "warning:", "spaced", "out"]
    );
    assert!(messages(&loggers, SUPERVISOR_LOGGER)
        .iter()
        .any(|m| m.starts_with("Split command string into:")));
}

#[tokio::test]
async fn failing_classifier_skips_only_that_line() {
    let loggers = MemoryLoggers::new();
    let classifier = |line: &str, _: &Options| -> Result<ClassifiedLine, ClassifyError> {
        if line.contains("bad") {
            Err(ClassifyError::Failed(format!("refusing {line}")))
        } else {
            Ok(ClassifiedLine::new(Level::Debug, line))
        }
    };
    let mut kid = Supervisor::builder("picky")
        .classifier(classifier)
        .loggers(loggers.clone())
        .build()
        .unwrap();

    let result = kid.run(sh("echo one; echo bad; echo two")).await.unwrap();

    assert_eq!(result.exit_code, 0);
    assert_eq!(messages(&loggers, "picky"), vec!["one", "two"]);
    let diagnostics = loggers.records_for(SUPERVISOR_LOGGER);
    assert!(diagnostics
        .iter()
        .any(|r| r.level == Level::Warning && r.message == "Can't log subprocess line: bad"));
    assert!(diagnostics
        .iter()
        .any(|r| r.level == Level::Error && r.message == "Classification failed: refusing bad"));
    assert_eq!(kid.stats().lines_failed, 1);
    assert_eq!(kid.stats().lines_logged, 2);
}

#[tokio::test]
async fn panicking_classifier_skips_only_that_line() {
    let loggers = MemoryLoggers::new();
    let classifier = |line: &str, _: &Options| -> Result<ClassifiedLine, ClassifyError> {
        assert!(line != "explode", "classifier blew up");
        Ok(ClassifiedLine::new(Level::Info, line))
    };
    let mut kid = Supervisor::builder("fragile")
        .classifier(classifier)
        .loggers(loggers.clone())
        .build()
        .unwrap();

    let result = kid
        .run(sh("echo before; echo explode; echo after"))
        .await
        .unwrap();

    assert_eq!(result.exit_code, 0);
    assert_eq!(messages(&loggers, "fragile"), vec!["before", "after"]);
    assert!(messages(&loggers, SUPERVISOR_LOGGER)
        .iter()
        .any(|m| m.contains("Classifier panicked")));
}

/// Factory whose child logger rejects every record.
struct BrokenChildLoggers {
    inner: MemoryLoggers,
}

struct BrokenLogger {
    name: String,
}

impl Logger for BrokenLogger {
    fn name(&self) -> &str {
        &self.name
    }

    fn log(&self, _: Level, _: &str, _: Attributes<'_>) -> Result<(), SinkError> {
        Err(SinkError::Unavailable("sink closed".to_string()))
    }
}

impl LoggerFactory for BrokenChildLoggers {
    fn logger(&self, name: &str) -> Arc<dyn Logger> {
        if name == SUPERVISOR_LOGGER {
            self.inner.logger(name)
        } else {
            Arc::new(BrokenLogger {
                name: name.to_string(),
            })
        }
    }
}

#[tokio::test]
async fn broken_sink_does_not_abort_the_run() {
    let inner = MemoryLoggers::new();
    let mut kid = Supervisor::builder("broken")
        .loggers(BrokenChildLoggers {
            inner: inner.clone(),
        })
        .build()
        .unwrap();

    let result = kid.run(sh("echo a; echo b; exit 0")).await.unwrap();

    assert_eq!(result.exit_code, 0);
    assert_eq!(kid.stats().lines_failed, 2);
    let warnings = inner
        .records_for(SUPERVISOR_LOGGER)
        .into_iter()
        .filter(|r| r.message.starts_with("Can't log subprocess line"))
        .count();
    assert_eq!(warnings, 2);
}

#[tokio::test]
async fn missing_binary_is_a_spawn_error() {
    let (mut kid, loggers) = supervisor("missing");

    let err = kid
        .run("kiddo-test-binary-that-does-not-exist --flag")
        .await
        .unwrap_err();

    assert!(matches!(err, SupervisorError::Spawn(SpawnError::NotFound { .. })));
    assert!(!err.is_config_error());
    let diagnostics = loggers.records_for(SUPERVISOR_LOGGER);
    assert!(diagnostics
        .iter()
        .any(|r| r.level == Level::Warning && r.message == "Couldn't run command."));
    assert!(diagnostics
        .iter()
        .any(|r| r.level == Level::Error
            && r.message.contains("kiddo-test-binary-that-does-not-exist")));
}

#[tokio::test]
async fn empty_command_is_rejected() {
    let (mut kid, _loggers) = supervisor("empty");

    let err = kid.run("   ").await.unwrap_err();

    assert!(matches!(err, SupervisorError::EmptyCommand));
    assert!(err.is_config_error());
}

#[tokio::test]
async fn process_options_reach_the_child() {
    let dir = tempfile::tempdir().unwrap();
    let (mut kid, loggers) = supervisor("env");

    let options: Options = serde_json::from_value(serde_json::json!({
        "env": {"KIDDO_VALUE": "42"},
        "cwd": dir.path().display().to_string(),
    }))
    .unwrap();

    kid.run_with(sh("echo \"error: $KIDDO_VALUE\"; pwd"), &options)
        .await
        .unwrap();

    let records = loggers.records_for("env");
    assert_eq!(records[0].level, Level::Error);
    assert_eq!(records[0].message, "42");
    let expected = dir.path().canonicalize().unwrap();
    let reported = std::path::PathBuf::from(&records[1].message)
        .canonicalize()
        .unwrap();
    assert_eq!(reported, expected);
}

#[tokio::test]
async fn invalid_option_value_is_rejected() {
    let (mut kid, _loggers) = supervisor("invalid");
    let options: Options = serde_json::from_value(serde_json::json!({"cwd": 7})).unwrap();

    let err = kid.run_with(sh("true"), &options).await.unwrap_err();

    assert!(matches!(
        err,
        SupervisorError::Option(OptionError::Invalid { ref key, .. }) if key == "cwd"
    ));
}

#[tokio::test]
async fn classifier_sees_supervisor_options() {
    let loggers = MemoryLoggers::new();
    let mut kid = Supervisor::builder("threshold")
        .classifier(ThresholdClassifier::new())
        .option(MIN_LEVEL_OPTION, "error")
        .loggers(loggers.clone())
        .build()
        .unwrap();

    kid.run(sh("echo 'debug: quiet'; echo 'critical: loud'"))
        .await
        .unwrap();

    let levels: Vec<_> = loggers
        .records_for("threshold")
        .into_iter()
        .map(|r| r.level)
        .collect();
    assert_eq!(levels, vec![Level::Error, Level::Critical]);
}

#[tokio::test]
async fn heavy_stderr_before_stdout_does_not_deadlock() {
    let (mut kid, loggers) = supervisor("heavy_stderr");
    let script = "i=0; \
                  while [ $i -lt 10000 ]; do echo \"stderr line $i\" >&2; i=$((i+1)); done; \
                  echo done";

    let result = kid.run(sh(script)).await.unwrap();

    assert_eq!(result.exit_code, 0);
    assert_eq!(result.stderr_lines.len(), 10000);
    assert_eq!(result.stderr_lines[0], "stderr line 0");
    assert_eq!(result.stderr_lines[9999], "stderr line 9999");
    assert_eq!(loggers.last_for("heavy_stderr").unwrap().message, "done");
}

#[tokio::test]
async fn killed_child_reports_negative_signal() {
    let (mut kid, _loggers) = supervisor("killed");

    let result = kid.run(sh("kill -9 $$")).await.unwrap();

    assert_eq!(result.exit_code, -9);
}

#[tokio::test]
async fn each_run_replaces_the_active_process() {
    let (mut kid, loggers) = supervisor("twice");

    kid.run(sh("echo first")).await.unwrap();
    let first_pid = kid.active_pid().unwrap();
    kid.run(sh("echo second")).await.unwrap();
    let second_pid = kid.active_pid().unwrap();

    assert_ne!(first_pid, second_pid);
    assert_eq!(messages(&loggers, "twice"), vec!["first", "second"]);
    assert_eq!(kid.stats().lines_logged, 1);
}

#[tokio::test]
async fn unterminated_last_line_is_logged() {
    let (mut kid, loggers) = supervisor("unterminated");

    kid.run(sh("printf 'info: a\\nwarning: b'")).await.unwrap();

    let last = loggers.last_for("unterminated").unwrap();
    assert_eq!(last.level, Level::Warning);
    assert_eq!(last.message, "b");
}

#[derive(Clone, Default)]
struct TargetRecorder(Arc<Mutex<Vec<(String, String)>>>);

struct MessageVisitor<'a>(&'a mut String);

impl tracing::field::Visit for MessageVisitor<'_> {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            *self.0 = format!("{value:?}");
        }
    }
}

impl<S: tracing::Subscriber> Layer<S> for TargetRecorder {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let mut message = String::new();
        event.record(&mut MessageVisitor(&mut message));
        self.0
            .lock()
            .unwrap()
            .push((event.metadata().target().to_string(), message));
    }
}

#[tokio::test]
async fn default_loggers_separate_child_and_diagnostic_targets() {
    let recorder = TargetRecorder::default();
    let _guard =
        tracing::subscriber::set_default(tracing_subscriber::registry().with(recorder.clone()));
    let mut kid = Supervisor::new("job").unwrap();

    kid.run(sh("echo 'info: hi'")).await.unwrap();

    let events = recorder.0.lock().unwrap().clone();
    assert!(events
        .iter()
        .any(|(target, message)| target == "kiddo::child" && message == "hi"));
    assert!(events.iter().any(|(target, message)| {
        target == "kiddo::supervisor" && message == "Command returned code: 0"
    }));
    assert!(!events
        .iter()
        .any(|(target, message)| target == "kiddo::child" && message.starts_with("Command")));
}
