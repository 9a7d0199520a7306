//! Bridge to the external automation layer.
//!
//! The engine hands whole batches to a [`BridgeAdapter`] and never waits for
//! the per-contact loop. Both entry points are optional: an adapter reports
//! what it supports through [`BridgeAdapter::capabilities`], and the engine
//! checks that before calling in. A missing capability is a degraded mode,
//! not a failure.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;

pub mod http;
pub mod simulator;

/// Errors from bridge hand-off.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// The adapter does not provide the requested entry point.
    #[error("bridge capability unavailable: {0}")]
    CapabilityUnavailable(&'static str),

    /// The receiving side of an in-process bridge has gone away.
    #[error("bridge channel closed")]
    ChannelClosed,

    /// Hand-off needs a tokio runtime and none is running.
    #[error("no async runtime available for bridge hand-off")]
    NoRuntime,

    /// The batch could not be serialized.
    #[error("failed to serialize bridge payload: {0}")]
    Payload(#[from] serde_json::Error),

    /// The configured bridge URL is not usable.
    #[error("invalid bridge url: {0}")]
    InvalidUrl(String),
}

/// Entry points an adapter provides.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BridgeCapabilities {
    /// `save_contacts` is available.
    pub save: bool,
    /// `start_send` is available.
    pub send: bool,
}

impl BridgeCapabilities {
    /// Both entry points available.
    pub const ALL: Self = Self {
        save: true,
        send: true,
    };

    /// No entry points available.
    pub const NONE: Self = Self {
        save: false,
        send: false,
    };
}

/// Hand-off interface to the external automation layer.
///
/// Calls must return promptly; any per-contact work happens elsewhere.
pub trait BridgeAdapter: Send + Sync {
    /// Which entry points this adapter implements.
    fn capabilities(&self) -> BridgeCapabilities;

    /// Hand a serialized contact batch over for saving.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::CapabilityUnavailable`] unless overridden.
    fn save_contacts(&self, _payload: &str) -> Result<(), BridgeError> {
        Err(BridgeError::CapabilityUnavailable("save_contacts"))
    }

    /// Hand a serialized contact batch and template over for sending.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::CapabilityUnavailable`] unless overridden.
    fn start_send(&self, _payload: &str, _template: &str) -> Result<(), BridgeError> {
        Err(BridgeError::CapabilityUnavailable("start_send"))
    }
}

/// Adapter with no capabilities, used when no host bridge is present.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullBridge;

impl BridgeAdapter for NullBridge {
    fn capabilities(&self) -> BridgeCapabilities {
        BridgeCapabilities::NONE
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// A batch command as delivered to the automation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BridgeCommand {
    /// Save every contact in the batch.
    SaveContacts {
        /// JSON array of contact records.
        contacts_json: String,
    },
    /// Send the personalized template to every contact in the batch.
    SendMessages {
        /// JSON array of contact records.
        contacts_json: String,
        /// Message template with `{name}` / `{number}` placeholders.
        msg_template: String,
    },
}

impl BridgeCommand {
    /// Short name for logs.
    pub fn action(&self) -> &'static str {
        match self {
            Self::SaveContacts { .. } => "SAVE_CONTACTS",
            Self::SendMessages { .. } => "SEND_MESSAGES",
        }
    }
}

/// In-process adapter that forwards commands over a tokio channel.
///
/// The receiver side is the automation driver; the engine only enqueues.
#[derive(Debug, Clone)]
pub struct ChannelBridge {
    tx: mpsc::UnboundedSender<BridgeCommand>,
}

impl ChannelBridge {
    /// Create the bridge and the receiver the automation layer consumes.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<BridgeCommand>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn deliver(&self, command: BridgeCommand) -> Result<(), BridgeError> {
        let action = command.action();
        self.tx
            .send(command)
            .map_err(|_| BridgeError::ChannelClosed)?;
        debug!(action, "bridge command queued");
        Ok(())
    }
}

impl BridgeAdapter for ChannelBridge {
    fn capabilities(&self) -> BridgeCapabilities {
        BridgeCapabilities::ALL
    }

    fn save_contacts(&self, payload: &str) -> Result<(), BridgeError> {
        self.deliver(BridgeCommand::SaveContacts {
            contacts_json: payload.to_owned(),
        })
    }

    fn start_send(&self, payload: &str, template: &str) -> Result<(), BridgeError> {
        self.deliver(BridgeCommand::SendMessages {
            contacts_json: payload.to_owned(),
            msg_template: template.to_owned(),
        })
    }
}
