//! Orchestration engine: session state machine and bridge hand-off.
//!
//! The [`Engine`] owns the active [`Session`] and exposes the control
//! surface (`start_save`, `start_send`, `pause`, `resume`, `stop`) plus pure
//! status reads. Every operation returns immediately: the per-contact loop
//! belongs to the bridge (or the fallback simulator), which observes the
//! session's control flags through a [`Driver`].
//!
//! ```text
//!   idle ──start_save──▶ save ──stop──▶ idle
//!   idle ──start_send──▶ send ──stop──▶ idle
//! ```
//!
//! `paused` is a flag layered on `save`/`send`; it never changes the mode.

pub mod limiter;
pub mod session;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::bridge::simulator::{NoFallback, SendFallback};
use crate::bridge::{BridgeAdapter, NullBridge};
use crate::contacts::{Contact, ContactQueue};
use crate::driver::Driver;
use crate::logging::{LogSink, TracingSink};

use self::limiter::{Clock, ConfigStore, RateLimitError, RateLimiter, SystemClock};
use self::session::{Mode, Session, Step};

/// Errors surfaced by the engine's start operations.
///
/// A failed start never changes the current session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// The contact list is empty or malformed.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The send template is empty or blank.
    #[error("invalid template: {0}")]
    InvalidTemplate(String),

    /// A rate-limit gate was closed at session start.
    #[error("rate limit exceeded: {0}")]
    RateLimitExceeded(#[from] RateLimitError),
}

/// Where a started batch went.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Handoff {
    /// The bridge accepted the batch.
    Bridge,
    /// The local fallback is driving the batch.
    Simulated,
    /// Nothing can process the batch; the session is committed but nothing is processing it.
    Unavailable {
        /// User-visible explanation.
        notice: String,
    },
    /// The bridge was present but refused the hand-off.
    Failed {
        /// Error reported by the bridge.
        error: String,
    },
}

/// Result of a successful `start_*` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartReport {
    /// Identifier of the new session.
    pub session_id: Uuid,
    /// Mode the session runs in.
    pub mode: Mode,
    /// Number of contacts queued.
    pub contacts: usize,
    /// What happened to the batch.
    pub handoff: Handoff,
}

impl StartReport {
    /// A message for the user when the batch was not handed to a bridge.
    pub fn notice(&self) -> Option<&str> {
        match &self.handoff {
            Handoff::Unavailable { notice } => Some(notice),
            Handoff::Failed { error } => Some(error),
            Handoff::Bridge | Handoff::Simulated => None,
        }
    }
}

/// Point-in-time view of the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineStatus {
    /// Current mode.
    pub mode: Mode,
    /// Current step label.
    pub step: Step,
    /// Queue cursor.
    pub index: usize,
    /// Queue length.
    pub total: usize,
    /// Messages recorded as sent.
    pub sent_count: u64,
    /// Configured daily cap.
    pub max_messages_per_day: u64,
    /// Paused flag.
    pub paused: bool,
    /// Stop flag.
    pub stop_requested: bool,
    /// Session window start.
    pub started_at: Option<DateTime<Utc>>,
    /// Milliseconds left in the window.
    pub window_remaining_ms: Option<u64>,
    /// Active session, if one was ever started.
    pub session_id: Option<Uuid>,
    /// Personalized message for the contact at the cursor.
    pub pending_message: String,
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Wires an [`Engine`] from its collaborators.
///
/// Every collaborator has an inert default: no bridge, no fallback, the
/// system clock, default limits, and a tracing log sink.
#[derive(Default)]
pub struct EngineBuilder {
    config: Option<Arc<ConfigStore>>,
    clock: Option<Arc<dyn Clock>>,
    bridge: Option<Arc<dyn BridgeAdapter>>,
    fallback: Option<Arc<dyn SendFallback>>,
    sink: Option<Arc<dyn LogSink>>,
}

impl EngineBuilder {
    /// Use a shared limit store.
    #[must_use]
    pub fn config(mut self, config: Arc<ConfigStore>) -> Self {
        self.config = Some(config);
        self
    }

    /// Use a custom clock for the window gate.
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Hand batches to `bridge`.
    #[must_use]
    pub fn bridge(mut self, bridge: Arc<dyn BridgeAdapter>) -> Self {
        self.bridge = Some(bridge);
        self
    }

    /// Use `fallback` when the bridge cannot send.
    #[must_use]
    pub fn fallback(mut self, fallback: Arc<dyn SendFallback>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Write control transitions to `sink`.
    #[must_use]
    pub fn sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Build the engine in `idle` mode.
    pub fn build(self) -> Engine {
        let config = self.config.unwrap_or_default();
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        Engine {
            limiter: Arc::new(RateLimiter::new(Arc::clone(&config), clock)),
            config,
            bridge: self.bridge.unwrap_or_else(|| Arc::new(NullBridge)),
            fallback: self.fallback.unwrap_or_else(|| Arc::new(NoFallback)),
            sink: self.sink.unwrap_or_else(|| Arc::new(TracingSink)),
            mode: Mode::Idle,
            session: Arc::new(Session::idle()),
        }
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Owning controller for one stream of sessions.
///
/// Independent engines share nothing unless they are built with the same
/// [`ConfigStore`].
pub struct Engine {
    config: Arc<ConfigStore>,
    limiter: Arc<RateLimiter>,
    bridge: Arc<dyn BridgeAdapter>,
    fallback: Arc<dyn SendFallback>,
    sink: Arc<dyn LogSink>,
    mode: Mode,
    session: Arc<Session>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("mode", &self.mode)
            .field("session", &self.session.id())
            .field("limiter", &self.limiter)
            .finish_non_exhaustive()
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl Engine {
    /// Start wiring an engine.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    // -- control --------------------------------------------------------

    /// Start a save session for `contacts`.
    ///
    /// Save sessions dispatch nothing, so neither rate-limit gate applies;
    /// the window still opens if it has not already.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidInput`] when `contacts` is empty.
    pub fn start_save(&mut self, contacts: &[Contact]) -> Result<StartReport, EngineError> {
        let queue = ContactQueue::load(contacts).inspect_err(|_| {
            self.sink.log("No contacts to save.");
        })?;

        let carried = self.session.control().sent_count();
        let session = self.commit(Mode::Save, queue, String::new(), carried);
        self.sink.log(&format!(
            "Starting SAVE for {} contacts.",
            session.queue().len()
        ));

        let handoff = if self.bridge.capabilities().save {
            match session.queue().to_payload() {
                Ok(payload) => self.report_bridge(self.bridge.save_contacts(&payload), "SAVE"),
                Err(e) => self.report_bridge(Err(e.into()), "SAVE"),
            }
        } else {
            let notice =
                "Automation bridge unavailable; open inside the host app to auto-save contacts.";
            self.sink.log(notice);
            Handoff::Unavailable {
                notice: notice.to_owned(),
            }
        };

        Ok(self.report(&session, handoff))
    }

    /// Start a send session for `contacts` with `template`.
    ///
    /// The window and cap gates are checked against the current counters
    /// before anything changes; on success the sent counter restarts at 0.
    ///
    /// # Errors
    ///
    /// - [`EngineError::InvalidInput`] when `contacts` is empty.
    /// - [`EngineError::InvalidTemplate`] when `template` is blank.
    /// - [`EngineError::RateLimitExceeded`] when a gate is closed.
    pub fn start_send(
        &mut self,
        contacts: &[Contact],
        template: &str,
    ) -> Result<StartReport, EngineError> {
        let queue = ContactQueue::load(contacts).inspect_err(|_| {
            self.sink.log("No contacts selected.");
        })?;
        if template.trim().is_empty() {
            self.sink.log("Please enter a message template.");
            return Err(EngineError::InvalidTemplate(
                "message template is empty".to_owned(),
            ));
        }
        if let Err(e) = self.limiter.check(self.session.control().sent_count()) {
            self.sink.log(&format!("Not starting SEND: {e}"));
            return Err(e.into());
        }

        let session = self.commit(Mode::Send, queue, template.to_owned(), 0);
        self.sink.log(&format!(
            "Starting SEND for {} contacts.",
            session.queue().len()
        ));
        self.sink.log(&format!(
            "Daily cap: {} messages; window: {}.",
            self.config.max_messages_per_day(),
            format_window(self.config.max_window_ms())
        ));

        let handoff = if self.bridge.capabilities().send {
            match session.queue().to_payload() {
                Ok(payload) => {
                    self.report_bridge(self.bridge.start_send(&payload, template), "SEND")
                }
                Err(e) => self.report_bridge(Err(e.into()), "SEND"),
            }
        } else {
            self.sink
                .log("Automation bridge not available; using local simulation.");
            match self.fallback.simulate(self.driver()) {
                Ok(()) => Handoff::Simulated,
                Err(e) => {
                    let notice = format!("Local simulation unavailable: {e}");
                    self.sink.log(&notice);
                    Handoff::Unavailable { notice }
                }
            }
        };

        Ok(self.report(&session, handoff))
    }

    /// Set the paused flag. Idempotent.
    pub fn pause(&mut self) {
        self.session.control().pause();
        info!(session_id = %self.session.id(), "engine paused");
        self.sink.log("Engine paused by user.");
    }

    /// Clear the paused flag. Returns `false` (and does nothing) if not paused.
    pub fn resume(&mut self) -> bool {
        if !self.session.control().resume() {
            return false;
        }
        info!(session_id = %self.session.id(), "engine resumed");
        self.sink.log("Engine resumed.");
        true
    }

    /// Request a stop and return to `idle`. Idempotent.
    ///
    /// The queue, sent counter, and window start are kept.
    pub fn stop(&mut self) {
        self.session.control().request_stop();
        self.mode = Mode::Idle;
        info!(session_id = %self.session.id(), "engine stopped");
        self.sink
            .log("Engine stop requested; current session ended.");
    }

    /// Open a fresh session window: clear the window start and the sent counter.
    ///
    /// An expired window or reached cap otherwise blocks every later send.
    pub fn reset_window(&mut self) {
        self.limiter.reset_window();
        self.session.control().reset_sent_count();
        self.sink.log("Session window reset.");
    }

    // -- configuration ----------------------------------------------------

    /// Set the daily cap. Non-positive or missing values are ignored.
    pub fn set_max_messages_per_day(&self, n: Option<i64>) {
        self.config.set_max_messages_per_day(n);
    }

    /// Set the window length in hours. Non-positive or missing values are ignored.
    pub fn set_max_window_hours(&self, h: Option<f64>) {
        self.config.set_max_window_hours(h);
    }

    /// The shared limit store.
    pub fn config(&self) -> &Arc<ConfigStore> {
        &self.config
    }

    // -- status -------------------------------------------------------------

    /// Current mode.
    pub fn current_mode(&self) -> Mode {
        self.mode
    }

    /// Current queue cursor.
    pub fn current_index(&self) -> usize {
        self.session.queue().index()
    }

    /// Current step label.
    pub fn current_step(&self) -> Step {
        Step::Idle
    }

    /// Personalized message for the contact at the cursor.
    pub fn pending_message(&self) -> String {
        self.session.pending_message()
    }

    /// Whether the paused flag is set.
    pub fn is_paused(&self) -> bool {
        self.session.control().is_paused()
    }

    /// Whether a stop was requested for the current session.
    pub fn is_stop_requested(&self) -> bool {
        self.session.control().is_stop_requested()
    }

    /// Messages recorded as sent.
    pub fn sent_count(&self) -> u64 {
        self.session.control().sent_count()
    }

    /// Window start in milliseconds since the epoch.
    pub fn started_at(&self) -> Option<i64> {
        self.limiter.started_at()
    }

    /// The current session.
    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// The shared rate limiter.
    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// A driver for the current session, for whatever runs the per-contact loop.
    pub fn driver(&self) -> Driver {
        Driver::new(
            Arc::clone(&self.session),
            Arc::clone(&self.limiter),
            Arc::clone(&self.sink),
        )
    }

    /// Snapshot of the engine for display or serialization.
    pub fn status(&self) -> EngineStatus {
        let control = self.session.control();
        let session_id = self.session.id();
        EngineStatus {
            mode: self.mode,
            step: self.current_step(),
            index: self.current_index(),
            total: self.session.queue().len(),
            sent_count: control.sent_count(),
            max_messages_per_day: self.config.max_messages_per_day(),
            paused: control.is_paused(),
            stop_requested: control.is_stop_requested(),
            started_at: self
                .limiter
                .started_at()
                .and_then(DateTime::<Utc>::from_timestamp_millis),
            window_remaining_ms: self.limiter.window_remaining_ms(),
            session_id: (!session_id.is_nil()).then_some(session_id),
            pending_message: self.pending_message(),
        }
    }

    // -- internals ----------------------------------------------------------

    /// Replace the session and open the window. Stale drivers of the
    /// previous session see its stop flag and exit.
    fn commit(
        &mut self,
        mode: Mode,
        queue: ContactQueue,
        template: String,
        sent_count: u64,
    ) -> Arc<Session> {
        let session = Arc::new(Session::new(mode, queue, template, sent_count));
        let previous = std::mem::replace(&mut self.session, Arc::clone(&session));
        previous.control().request_stop();
        self.mode = mode;
        let started_at = self.limiter.mark_started();
        info!(
            session_id = %session.id(),
            %mode,
            contacts = session.queue().len(),
            started_at,
            "session started"
        );
        session
    }

    fn report_bridge(
        &self,
        result: Result<(), crate::bridge::BridgeError>,
        label: &str,
    ) -> Handoff {
        match result {
            Ok(()) => {
                self.sink.log(&format!(
                    "Sent {label} batch to the automation bridge."
                ));
                Handoff::Bridge
            }
            Err(e) => {
                warn!(error = %e, label, "bridge hand-off failed");
                self.sink
                    .log(&format!("Bridge hand-off for {label} failed: {e}"));
                Handoff::Failed {
                    error: e.to_string(),
                }
            }
        }
    }

    fn report(&self, session: &Session, handoff: Handoff) -> StartReport {
        debug!(session_id = %session.id(), ?handoff, "start completed");
        StartReport {
            session_id: session.id(),
            mode: session.mode(),
            contacts: session.queue().len(),
            handoff,
        }
    }
}

/// Human-readable window length (`10h`, `90m`, `1500ms`).
#[allow(clippy::arithmetic_side_effects)]
fn format_window(ms: u64) -> String {
    const HOUR: u64 = 3_600_000;
    const MINUTE: u64 = 60_000;
    if ms % HOUR == 0 {
        format!("{}h", ms / HOUR)
    } else if ms % MINUTE == 0 {
        format!("{}m", ms / MINUTE)
    } else {
        format!("{ms}ms")
    }
}
