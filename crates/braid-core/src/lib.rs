//! braid-core: collaborative-editing core for the Braid wiki.
//!
//! Two pipelines live here side by side:
//!
//! - The **operation/transform** pipeline ([`operation`], [`transform`]) drives fine-grained
//!   Insert/Delete/Replace edits with operational transformation against prior history.
//! - The **CRDT-style** pipeline ([`crdt`], [`checkpoint`]) accepts opaque per-update byte blobs
//!   and periodically folds them into a checkpoint.
//!
//! [`session`] and [`coordinator`] host both: a `Session` is the in-memory record for one page,
//! and the `Coordinator` is the single writer that mutates it. [`materialize`] turns an
//! accumulated state into a durable `Revision`. [`contracts`] defines the traits the server crate
//! implements to plug in real persistence and authorization.

pub mod checkpoint;
pub mod config;
pub mod contracts;
pub mod coordinator;
pub mod crdt;
pub mod error;
pub mod heartbeat;
pub mod materialize;
pub mod operation;
pub mod session;
pub mod transform;

pub use config::CollabConfig;
pub use error::{CollabError, Result};
pub use operation::Operation;
pub use session::Session;
