//! Session state: mode, step label, control flags, and the active batch.
//!
//! A [`Session`] is created by every successful `start_*` call and shared
//! (via `Arc`) with whatever drives the per-contact loop. The engine writes
//! only the control flags; the cursor and the sent counter move only
//! through [`Driver::step`](crate::driver::Driver::step).

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use serde::Serialize;
use uuid::Uuid;

use crate::contacts::{Contact, ContactQueue};
use crate::personalize;

/// Top-level engine mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// No session running (initial state and after `stop`).
    #[default]
    Idle,
    /// Saving contacts through the bridge.
    Save,
    /// Sending personalized messages through the bridge.
    Send,
}

impl Mode {
    /// Lowercase wire label.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Save => "save",
            Self::Send => "send",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fine-grained step within a session.
///
/// Only `Idle` is reported today; per-contact UI steps live in the external
/// automation layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[non_exhaustive]
pub enum Step {
    /// No step in progress.
    #[default]
    Idle,
}

impl Step {
    /// Uppercase wire label.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cooperative control flags and the sent counter.
#[derive(Debug, Default)]
pub struct SessionControl {
    paused: AtomicBool,
    stop_requested: AtomicBool,
    sent_count: AtomicU64,
}

impl SessionControl {
    /// Fresh flags with the sent counter starting at `sent_count`.
    pub fn with_sent_count(sent_count: u64) -> Self {
        Self {
            paused: AtomicBool::new(false),
            stop_requested: AtomicBool::new(false),
            sent_count: AtomicU64::new(sent_count),
        }
    }

    /// Set the paused flag.
    pub fn pause(&self) {
        self.paused.store(true, Ordering::Release);
    }

    /// Clear the paused flag. Returns whether it was set.
    pub fn resume(&self) -> bool {
        self.paused.swap(false, Ordering::AcqRel)
    }

    /// Raise the stop flag and clear the paused flag.
    pub fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::Release);
        self.paused.store(false, Ordering::Release);
    }

    /// Whether the session is paused.
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    /// Whether a stop has been requested.
    pub fn is_stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::Acquire)
    }

    /// Messages recorded as sent.
    pub fn sent_count(&self) -> u64 {
        self.sent_count.load(Ordering::Acquire)
    }

    /// Zero the sent counter when a fresh window is opened explicitly.
    pub(crate) fn reset_sent_count(&self) {
        self.sent_count.store(0, Ordering::Release);
    }

    /// Count one send if the counter is still below `limit`.
    ///
    /// Returns the new count, or the current count when the cap is reached.
    /// The check and the increment happen atomically.
    pub(crate) fn reserve_send(&self, limit: u64) -> Result<u64, u64> {
        self.sent_count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < limit).then(|| n.saturating_add(1))
            })
            .map(|previous| previous.saturating_add(1))
    }

    /// Undo a reservation whose contact could not be claimed.
    pub(crate) fn release_send(&self) {
        let _ = self
            .sent_count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                Some(n.saturating_sub(1))
            });
    }
}

/// One started batch: queue, template, and control flags.
#[derive(Debug)]
pub struct Session {
    id: Uuid,
    mode: Mode,
    queue: ContactQueue,
    template: String,
    control: SessionControl,
}

impl Session {
    /// Placeholder session used before the first start.
    pub fn idle() -> Self {
        Self {
            id: Uuid::nil(),
            mode: Mode::Idle,
            queue: ContactQueue::default(),
            template: String::new(),
            control: SessionControl::default(),
        }
    }

    /// Create a session for a loaded queue.
    pub fn new(mode: Mode, queue: ContactQueue, template: String, sent_count: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            mode,
            queue,
            template,
            control: SessionControl::with_sent_count(sent_count),
        }
    }

    /// Session identifier (nil for the idle placeholder).
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Mode this session was started in.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// The contact queue.
    pub fn queue(&self) -> &ContactQueue {
        &self.queue
    }

    /// Message template (empty for save sessions).
    pub fn template(&self) -> &str {
        &self.template
    }

    /// Control flags and counters.
    pub fn control(&self) -> &SessionControl {
        &self.control
    }

    /// Personalized message for `contact` using this session's template.
    pub fn message_for(&self, contact: Option<&Contact>) -> String {
        personalize::render(&self.template, contact)
    }

    /// Personalized message for the contact at the cursor.
    pub fn pending_message(&self) -> String {
        self.message_for(self.queue.current())
    }
}
