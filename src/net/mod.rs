//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming local TCP connection
//!     → listener.rs (accept loop, connection limits)
//!     → split into read/write halves
//!     → handed to the upload/download forwarders
//! ```
//!
//! # Design Decisions
//! - Bounded accept queue prevents resource exhaustion
//! - The permit spans both forwarder tasks of a connection

pub mod listener;

pub use listener::{BoundedListener, ConnectionPermit, ListenerError};
