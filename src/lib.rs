//! Outreach: bulk contact orchestration engine.
//!
//! Queues a batch of contacts, personalizes a message template per contact,
//! enforces a daily cap and a session window, and hands whole batches to an
//! external automation bridge. When no bridge can send, a local simulator
//! drives the batch instead.
//!
//! See `DESIGN.md` for the architecture overview.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod logging;

pub mod contacts;
pub mod personalize;

pub mod engine;

pub mod bridge;
pub mod driver;
