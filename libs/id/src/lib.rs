//! # fleet-id
//!
//! Typed identifiers for the fleet controller.
//!
//! Every server and host carries an opaque, globally unique id of the form
//! `{prefix}_{ulid}`:
//!
//! - `srv_01HV4Z4NYPLTRS0JTUA8XDME5F`
//! - `host_01HV4Z2WQXKJNM8GPQY6VBKC3D`
//!
//! The prefix makes the resource type obvious in logs and prevents a host id
//! from being passed where a server id is expected. Parsing is strict, so an
//! id always survives a format/parse round trip.
//!
//! Numeric ids (the small per-group integers) are not defined here; they are
//! plain `u32` values handed out by the controller's allocator.

mod error;
mod macros;
mod types;

pub use error::IdError;
pub use types::*;

/// Re-export ulid for consumers that need raw ULID operations
pub use ulid::Ulid;
