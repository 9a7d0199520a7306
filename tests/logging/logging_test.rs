//! Tests for `src/logging.rs`.

use std::sync::Arc;

use outreach::logging::{BufferSink, FanoutSink, LogSink, LoggingGuard, TracingSink};

#[test]
fn logging_guard_is_send() {
    fn assert_send<T: Send>() {}
    assert_send::<LoggingGuard>();
}

#[test]
fn init_production_creates_logs_dir() {
    let tmp = tempfile::tempdir().expect("should create temp dir");
    let logs_dir = tmp.path().join("logs");
    assert!(!logs_dir.exists());

    // The global subscriber can only be installed once per process, so the
    // result may be an error; the directory is created either way.
    let _result = outreach::logging::init_production(&logs_dir);
    assert!(logs_dir.exists(), "logs directory should be created");
}

#[test]
fn init_cli_is_safe_to_call_twice() {
    outreach::logging::init_cli();
    outreach::logging::init_cli();
}

#[test]
fn buffer_sink_keeps_lines_in_order() {
    let sink = BufferSink::new();
    sink.log("Starting SEND for 2 contacts.");
    sink.log("Engine paused by user.");
    assert_eq!(
        sink.lines(),
        vec![
            "Starting SEND for 2 contacts.".to_owned(),
            "Engine paused by user.".to_owned()
        ]
    );
    assert!(sink.contains("paused"));
    assert_eq!(
        sink.transcript(),
        "Starting SEND for 2 contacts.\nEngine paused by user."
    );
}

#[test]
fn fanout_reaches_every_sink() {
    let first = Arc::new(BufferSink::new());
    let second = Arc::new(BufferSink::new());
    let fanout = FanoutSink::new()
        .with(Arc::clone(&first) as Arc<dyn LogSink>)
        .with(Arc::clone(&second) as Arc<dyn LogSink>)
        .with(Arc::new(TracingSink));

    fanout.log("Engine resumed.");

    assert!(first.contains("Engine resumed."));
    assert!(second.contains("Engine resumed."));
}
