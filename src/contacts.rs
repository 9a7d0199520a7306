//! Contact records and the per-session contact queue.
//!
//! A [`ContactQueue`] is an immutable, ordered snapshot of the caller's list
//! plus a forward-only cursor. The cursor is atomic so drivers can claim
//! contacts while status readers observe it from another task.

use std::sync::atomic::{AtomicUsize, Ordering};

use serde::{Deserialize, Serialize};

use crate::engine::EngineError;

/// A contact the engine can save or message.
///
/// Identity is the position in the queue; duplicates are kept as-is.
/// Fields other than `name` and `number` are passed through to the bridge
/// verbatim.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    /// Display name (empty when absent).
    #[serde(default)]
    pub name: String,
    /// Phone number as supplied by the caller (empty when absent).
    #[serde(default)]
    pub number: String,
    /// Any additional free-form fields.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Contact {
    /// Create a contact with just a name and number.
    pub fn new(name: impl Into<String>, number: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            number: number.into(),
            extra: serde_json::Map::new(),
        }
    }
}

/// Wrapper for contact files of the form `{"contacts": [...]}`.
#[derive(Debug, Deserialize)]
struct ContactsFile {
    contacts: Vec<Contact>,
}

/// Parse a contact list from JSON.
///
/// Accepts both a flat array and the wrapped `{"contacts": [...]}` form.
///
/// # Errors
///
/// Returns the `serde_json` error of the flat-array parse when neither
/// form matches.
pub fn parse_contacts(json: &str) -> Result<Vec<Contact>, serde_json::Error> {
    if let Ok(wrapper) = serde_json::from_str::<ContactsFile>(json) {
        return Ok(wrapper.contacts);
    }
    serde_json::from_str(json)
}

/// Strip whitespace and dashes from a phone number.
///
/// Chat search in the host messaging app matches the compact form.
pub fn normalize_number(number: &str) -> String {
    number
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect()
}

/// Ordered contacts for one session plus a processing cursor.
///
/// Invariant: `0 <= index <= len`, and the index never decreases.
#[derive(Debug, Default)]
pub struct ContactQueue {
    contacts: Vec<Contact>,
    index: AtomicUsize,
}

impl ContactQueue {
    /// Copy `contacts` into a new queue with the cursor at 0.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidInput`] when `contacts` is empty.
    pub fn load(contacts: &[Contact]) -> Result<Self, EngineError> {
        if contacts.is_empty() {
            return Err(EngineError::InvalidInput(
                "contact list is empty".to_owned(),
            ));
        }
        Ok(Self {
            contacts: contacts.to_vec(),
            index: AtomicUsize::new(0),
        })
    }

    /// Contact at the cursor, or `None` once the queue is exhausted.
    pub fn current(&self) -> Option<&Contact> {
        self.contacts.get(self.index())
    }

    /// Current cursor position.
    pub fn index(&self) -> usize {
        self.index.load(Ordering::Acquire)
    }

    /// Number of contacts in the queue.
    pub fn len(&self) -> usize {
        self.contacts.len()
    }

    /// Whether the queue holds no contacts (only true for the idle placeholder).
    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }

    /// Whether the cursor has moved past the last contact.
    pub fn is_exhausted(&self) -> bool {
        self.index() >= self.len()
    }

    /// All contacts in processing order.
    pub fn contacts(&self) -> &[Contact] {
        &self.contacts
    }

    /// Take the contact at the cursor and move past it in one atomic step.
    ///
    /// Returns the claimed position, or `None` once the queue is exhausted.
    /// Concurrent callers never receive the same position.
    pub fn claim(&self) -> Option<usize> {
        let len = self.len();
        self.index
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |i| {
                (i < len).then(|| i.saturating_add(1))
            })
            .ok()
    }

    /// Serialize the queue as a JSON array of contact records.
    ///
    /// # Errors
    ///
    /// Returns an error if a pass-through field cannot be serialized.
    pub fn to_payload(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.contacts)
    }
}
