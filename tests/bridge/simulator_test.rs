//! Tests for `src/bridge/simulator.rs`.

use std::sync::Arc;
use std::time::Duration;

use outreach::bridge::simulator::{SendFallback, Simulator};
use outreach::config::PacingConfig;
use outreach::contacts::Contact;
use outreach::driver::StepOutcome;
use outreach::engine::limiter::ConfigStore;
use outreach::engine::session::Mode;
use outreach::engine::{Engine, Handoff};
use outreach::logging::{BufferSink, LogSink};

fn pacing() -> PacingConfig {
    PacingConfig {
        base_delay_ms: 1_000,
        jitter_ms: 0,
        poll_interval_ms: 100,
    }
}

fn contacts() -> Vec<Contact> {
    vec![
        Contact::new("Amit", "111 22-33"),
        Contact::new("Riya", "222"),
        Contact::new("Kabir", "333"),
    ]
}

#[tokio::test(start_paused = true)]
async fn simulator_runs_a_send_session_to_completion() {
    let sink = Arc::new(BufferSink::new());
    let simulator = Arc::new(Simulator::new(pacing(), Arc::clone(&sink) as Arc<dyn LogSink>));
    let mut engine = Engine::builder()
        .fallback(Arc::clone(&simulator) as Arc<dyn SendFallback>)
        .build();

    let report = engine
        .start_send(&contacts(), "Hi {name}")
        .expect("send starts");
    assert_eq!(report.handoff, Handoff::Simulated);

    let summary = simulator
        .take_handle()
        .expect("simulation spawned")
        .await
        .expect("task completes");

    assert_eq!(summary.dispatched, 3);
    assert_eq!(summary.outcome, StepOutcome::Finished);
    assert_eq!(engine.sent_count(), 3);
    assert_eq!(engine.current_index(), 3);
    assert!(sink.contains("Simulated send to Amit (1112233): Hi Amit"));
    assert!(sink.contains("Simulation complete: 3 contacts."));
}

#[tokio::test(start_paused = true)]
async fn simulator_stops_when_the_engine_stops() {
    let sink = Arc::new(BufferSink::new());
    let simulator = Arc::new(Simulator::new(pacing(), Arc::clone(&sink) as Arc<dyn LogSink>));
    let mut engine = Engine::builder()
        .fallback(Arc::clone(&simulator) as Arc<dyn SendFallback>)
        .build();
    engine
        .start_send(&contacts(), "Hi {name}")
        .expect("send starts");
    let task = simulator.take_handle().expect("simulation spawned");

    // First dispatch happens immediately, then the simulator sleeps.
    tokio::time::sleep(Duration::from_millis(10)).await;
    engine.stop();

    let summary = task.await.expect("task completes");
    assert_eq!(summary.outcome, StepOutcome::Stopped);
    assert!(summary.dispatched < 3);
    assert_eq!(engine.current_mode(), Mode::Idle);
    assert!(sink.contains("Simulation stopped."));
}

#[tokio::test(start_paused = true)]
async fn paused_simulation_waits_for_resume() {
    let sink = Arc::new(BufferSink::new());
    let simulator = Arc::new(Simulator::new(pacing(), Arc::clone(&sink) as Arc<dyn LogSink>));
    let mut engine = Engine::builder()
        .fallback(Arc::clone(&simulator) as Arc<dyn SendFallback>)
        .build();
    engine
        .start_send(&contacts(), "Hi {name}")
        .expect("send starts");
    engine.pause();
    let task = simulator.take_handle().expect("simulation spawned");

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(engine.current_index(), 0);

    assert!(engine.resume());
    let summary = task.await.expect("task completes");
    assert_eq!(summary.dispatched, 3);
}

#[tokio::test(start_paused = true)]
async fn simulation_halts_at_the_cap() {
    let config = Arc::new(ConfigStore::default());
    config.set_max_messages_per_day(Some(2));
    let simulator = Arc::new(Simulator::new(
        pacing(),
        Arc::new(BufferSink::new()) as Arc<dyn LogSink>,
    ));
    let mut engine = Engine::builder()
        .config(config)
        .fallback(Arc::clone(&simulator) as Arc<dyn SendFallback>)
        .build();
    engine
        .start_send(&contacts(), "Hi {name}")
        .expect("send starts");

    let summary = simulator
        .take_handle()
        .expect("simulation spawned")
        .await
        .expect("task completes");

    assert_eq!(summary.dispatched, 2);
    assert!(matches!(summary.outcome, StepOutcome::Halted(_)));
    assert_eq!(engine.current_index(), 2);
}

#[test]
fn simulator_needs_a_runtime() {
    let simulator = Simulator::new(pacing(), Arc::new(BufferSink::new()) as Arc<dyn LogSink>);
    let engine = Engine::default();
    assert!(simulator.simulate(engine.driver()).is_err());
}
