//! HTTP [`BridgeAdapter`] for a host automation service.
//!
//! Each batch is POSTed once as a [`BridgeCommand`] to `{base_url}/save-contacts`
//! or `{base_url}/send-messages`. The request runs on the current tokio
//! runtime and is not awaited by the engine. The owner of the bridge keeps
//! the runtime alive until the request settles with [`HttpBridge::flush`].

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, warn};
use url::Url;

use super::{BridgeAdapter, BridgeCapabilities, BridgeCommand, BridgeError};

/// HTTP connect timeout for the reqwest client.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// HTTP request timeout for a hand-off.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP bridge whose hand-offs run in the background until flushed.
#[derive(Debug, Clone)]
pub struct HttpBridge {
    client: reqwest::Client,
    base_url: Url,
    pending: Arc<Mutex<Vec<JoinHandle<bool>>>>,
}

/// How the in-flight hand-offs settled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Batches the host accepted with a 2xx status.
    pub accepted: usize,
    /// Batches rejected, failed, or still running at the deadline.
    pub failed: usize,
}

impl HttpBridge {
    /// Create a bridge pointing at the host service root
    /// (e.g. `http://127.0.0.1:3001`).
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::InvalidUrl`] if `base_url` does not parse or is
    /// not http(s).
    pub fn new(base_url: &str) -> Result<Self, BridgeError> {
        let parsed = Url::parse(base_url)
            .map_err(|e| BridgeError::InvalidUrl(format!("{base_url}: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(BridgeError::InvalidUrl(format!(
                "{base_url}: unsupported scheme {}",
                parsed.scheme()
            )));
        }

        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "failed to build HTTP client with timeouts, using default");
                reqwest::Client::default()
            });

        Ok(Self {
            client,
            base_url: parsed,
            pending: Arc::new(Mutex::new(Vec::new())),
        })
    }

    /// Wait for every hand-off started so far, giving up on each after
    /// `deadline`. Requests still running at the deadline are aborted.
    pub async fn flush(&self, deadline: Duration) -> FlushReport {
        let handles =
            std::mem::take(&mut *self.pending.lock().unwrap_or_else(PoisonError::into_inner));
        let mut report = FlushReport::default();
        for mut handle in handles {
            match tokio::time::timeout(deadline, &mut handle).await {
                Ok(Ok(true)) => report.accepted = report.accepted.saturating_add(1),
                Ok(Ok(false)) => report.failed = report.failed.saturating_add(1),
                Ok(Err(e)) => {
                    warn!(error = %e, "bridge hand-off task failed");
                    report.failed = report.failed.saturating_add(1);
                }
                Err(_) => {
                    warn!(?deadline, "bridge hand-off still running at deadline; aborting");
                    handle.abort();
                    report.failed = report.failed.saturating_add(1);
                }
            }
        }
        report
    }

    /// Endpoint URL for a command.
    pub fn endpoint(&self, command: &BridgeCommand) -> String {
        let path = match command {
            BridgeCommand::SaveContacts { .. } => "save-contacts",
            BridgeCommand::SendMessages { .. } => "send-messages",
        };
        format!("{}/{path}", self.base_url.as_str().trim_end_matches('/'))
    }

    fn post(&self, command: BridgeCommand) -> Result<(), BridgeError> {
        let handle = tokio::runtime::Handle::try_current().map_err(|_| BridgeError::NoRuntime)?;
        let url = self.endpoint(&command);
        let client = self.client.clone();
        let action = command.action();

        let task = handle.spawn(async move {
            match client.post(&url).json(&command).send().await {
                Ok(resp) if resp.status().is_success() => {
                    debug!(action, %url, "bridge accepted batch");
                    true
                }
                Ok(resp) => {
                    let status = resp.status();
                    let body = resp.text().await.unwrap_or_default();
                    warn!(action, %status, "bridge rejected batch: {body}");
                    false
                }
                Err(e) => {
                    warn!(action, error = %e, "bridge request failed");
                    false
                }
            }
        });
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(task);
        Ok(())
    }
}

impl BridgeAdapter for HttpBridge {
    fn capabilities(&self) -> BridgeCapabilities {
        BridgeCapabilities::ALL
    }

    fn save_contacts(&self, payload: &str) -> Result<(), BridgeError> {
        self.post(BridgeCommand::SaveContacts {
            contacts_json: payload.to_owned(),
        })
    }

    fn start_send(&self, payload: &str, template: &str) -> Result<(), BridgeError> {
        self.post(BridgeCommand::SendMessages {
            contacts_json: payload.to_owned(),
            msg_template: template.to_owned(),
        })
    }
}
