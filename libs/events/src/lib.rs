//! # fleet-events
//!
//! Lifecycle events published by the fleet controller.
//!
//! ## Design Principles
//!
//! - Events are snapshots: they carry full server records, never references
//! - Publication is best-effort; an event that nobody receives is not an error
//! - Updates carry both the before and after record so subscribers never need
//!   to keep their own copy to compute a diff
//!
//! ## Event Types
//!
//! - `server.started`: a host confirmed a new server ([`StartEvent`])
//! - `server.stopped`: a server was removed ([`StopEvent`])
//! - `server.updated`: state or a property was overridden ([`UpdateEvent`])
//!
//! All three are published on the [`EVENT_TOPIC`] topic wrapped in an
//! [`EventEnvelope`].

mod envelope;
mod error;
mod types;

pub use envelope::*;
pub use error::EventError;
pub use types::*;
