//! Local fallback used when no bridge can send.
//!
//! [`Simulator`] plays the part of the external automation layer: it drives
//! the session one contact at a time on a tokio task, honouring pause and
//! stop, and pacing dispatches with a randomized delay. Nothing is
//! delivered; each dispatch is written to the log sink.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use rand::Rng;
use tokio::task::JoinHandle;
use tracing::info;

use super::BridgeError;
use crate::config::PacingConfig;
use crate::contacts::normalize_number;
use crate::driver::{Driver, StepOutcome};
use crate::logging::LogSink;

/// Fallback invoked by the engine when the bridge cannot send.
pub trait SendFallback: Send + Sync {
    /// Start driving the session. Must return without waiting for it.
    ///
    /// # Errors
    ///
    /// Returns a [`BridgeError`] if the fallback cannot start.
    fn simulate(&self, driver: Driver) -> Result<(), BridgeError>;
}

/// Fallback that does nothing and reports itself unavailable.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoFallback;

impl SendFallback for NoFallback {
    fn simulate(&self, _driver: Driver) -> Result<(), BridgeError> {
        Err(BridgeError::CapabilityUnavailable("simulation"))
    }
}

/// What a finished simulation did.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationSummary {
    /// Contacts dispatched.
    pub dispatched: usize,
    /// The terminal step outcome.
    pub outcome: StepOutcome,
}

/// `base_ms` plus a uniform random extra in `[0, jitter_ms)`.
pub fn random_delay(base_ms: u64, jitter_ms: u64) -> Duration {
    let jitter = if jitter_ms == 0 {
        0
    } else {
        rand::thread_rng().gen_range(0..jitter_ms)
    };
    Duration::from_millis(base_ms.saturating_add(jitter))
}

/// Tokio-based stand-in for the automation layer.
pub struct Simulator {
    pacing: PacingConfig,
    sink: Arc<dyn LogSink>,
    handle: Mutex<Option<JoinHandle<SimulationSummary>>>,
}

impl std::fmt::Debug for Simulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulator")
            .field("pacing", &self.pacing)
            .finish_non_exhaustive()
    }
}

impl Simulator {
    /// Create a simulator with the given pacing, logging dispatches to `sink`.
    pub fn new(pacing: PacingConfig, sink: Arc<dyn LogSink>) -> Self {
        Self {
            pacing,
            sink,
            handle: Mutex::new(None),
        }
    }

    /// Take the task handle of the most recently started simulation.
    pub fn take_handle(&self) -> Option<JoinHandle<SimulationSummary>> {
        self.handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// Drive `driver` to a terminal outcome.
    pub async fn run(
        driver: Driver,
        pacing: PacingConfig,
        sink: Arc<dyn LogSink>,
    ) -> SimulationSummary {
        let poll = Duration::from_millis(pacing.poll_interval_ms);
        let mut dispatched: usize = 0;

        loop {
            let outcome = driver.step();
            match &outcome {
                StepOutcome::Dispatched(dispatch) => {
                    dispatched = dispatched.saturating_add(1);
                    sink.log(&format!(
                        "Simulated send to {} ({}): {}",
                        dispatch.contact.name,
                        normalize_number(&dispatch.contact.number),
                        dispatch.message.as_deref().unwrap_or_default()
                    ));
                    if !driver.session().queue().is_exhausted() {
                        tokio::time::sleep(random_delay(pacing.base_delay_ms, pacing.jitter_ms))
                            .await;
                    }
                }
                StepOutcome::Paused => tokio::time::sleep(poll).await,
                StepOutcome::Stopped => {
                    sink.log("Simulation stopped.");
                }
                StepOutcome::Halted(_) => {}
                StepOutcome::Finished => {
                    sink.log(&format!("Simulation complete: {dispatched} contacts."));
                }
            }
            if outcome.is_terminal() {
                info!(
                    session_id = %driver.session().id(),
                    dispatched,
                    "simulation ended"
                );
                return SimulationSummary {
                    dispatched,
                    outcome,
                };
            }
        }
    }
}

impl SendFallback for Simulator {
    fn simulate(&self, driver: Driver) -> Result<(), BridgeError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| BridgeError::NoRuntime)?;
        let task = runtime.spawn(Self::run(driver, self.pacing.clone(), Arc::clone(&self.sink)));
        *self.handle.lock().unwrap_or_else(PoisonError::into_inner) = Some(task);
        Ok(())
    }
}
