//! Per-contact driver for a started session.
//!
//! Each [`Driver::step`] observes the cooperative control flags, re-checks
//! the rate-limit gates, and hands out at most one contact. The cap slot and
//! the queue position are both claimed atomically, so any number of drivers
//! over one session never dispatch a contact twice or overshoot the cap.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::contacts::Contact;
use crate::engine::limiter::{RateLimitError, RateLimiter};
use crate::engine::session::{Mode, Session};
use crate::logging::LogSink;

/// One contact handed out by the driver.
#[derive(Debug, Clone, PartialEq)]
pub struct Dispatch {
    /// Queue position of the contact.
    pub index: usize,
    /// The contact to act on.
    pub contact: Contact,
    /// Personalized message (send sessions only).
    pub message: Option<String>,
}

/// Result of a single driver step.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// A contact was dispatched and the cursor advanced.
    Dispatched(Dispatch),
    /// The session is paused; nothing was dispatched.
    Paused,
    /// A stop was requested; the driver should exit.
    Stopped,
    /// A rate-limit gate is closed; nothing was dispatched.
    Halted(RateLimitError),
    /// Every contact has been dispatched.
    Finished,
}

impl StepOutcome {
    /// Whether the driver loop should exit after this outcome.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped | Self::Halted(_) | Self::Finished)
    }
}

/// Steps through one session's queue.
#[derive(Clone)]
pub struct Driver {
    session: Arc<Session>,
    limiter: Arc<RateLimiter>,
    sink: Arc<dyn LogSink>,
}

impl std::fmt::Debug for Driver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Driver")
            .field("session", &self.session.id())
            .field("index", &self.session.queue().index())
            .finish_non_exhaustive()
    }
}

impl Driver {
    /// Create a driver for `session`.
    pub fn new(session: Arc<Session>, limiter: Arc<RateLimiter>, sink: Arc<dyn LogSink>) -> Self {
        Self {
            session,
            limiter,
            sink,
        }
    }

    /// The session being driven.
    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Advance by at most one contact.
    pub fn step(&self) -> StepOutcome {
        let control = self.session.control();
        if control.is_stop_requested() {
            return StepOutcome::Stopped;
        }
        if control.is_paused() {
            return StepOutcome::Paused;
        }

        let queue = self.session.queue();
        if queue.is_exhausted() {
            return StepOutcome::Finished;
        }

        if let Err(e) = self.limiter.check_window() {
            return self.halt(e);
        }
        let sending = self.session.mode() == Mode::Send;
        if sending {
            let limit = self.limiter.config().max_messages_per_day();
            if let Err(sent) = control.reserve_send(limit) {
                warn!(sent, limit, "max messages per day reached; stopping");
                return self.halt(RateLimitError::DailyCapReached { sent, limit });
            }
        }

        // Claimed after the gates so a halted step leaves the cursor alone.
        let claimed = queue
            .claim()
            .and_then(|index| queue.contacts().get(index).map(|c| (index, c.clone())));
        let Some((index, contact)) = claimed else {
            if sending {
                control.release_send();
            }
            return StepOutcome::Finished;
        };

        let message = sending.then(|| self.session.message_for(Some(&contact)));
        debug!(
            session_id = %self.session.id(),
            index,
            sent = control.sent_count(),
            "contact dispatched"
        );

        StepOutcome::Dispatched(Dispatch {
            index,
            contact,
            message,
        })
    }

    fn halt(&self, e: RateLimitError) -> StepOutcome {
        self.sink.log(&format!("Halting before dispatch: {e}"));
        StepOutcome::Halted(e)
    }
}
