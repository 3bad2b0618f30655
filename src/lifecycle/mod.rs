//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     Load config → apply CLI overrides → validate → bind → run
//!
//! Shutdown:
//!     SIGINT → broadcast → stop accepting → in-flight exchanges drain
//! ```

pub mod shutdown;

pub use shutdown::Shutdown;
