//! TCP tunnel over plain HTTP upload/download flows.
//!
//! # Architecture Overview
//!
//! ```text
//!  local TCP peer                                      destination TCP peer
//!       │                                                       ▲
//!       ▼                                                       │
//!  ┌──────────┐  POST /upload?id&c&to (one per read)  ┌──────────────────┐
//!  │  client  │──────────────────────────────────────▶│      server      │
//!  │ net +    │                                       │ registry: id →   │
//!  │ forward- │  GET /download?id (one streamed body) │ session (target  │
//!  │ ers      │◀──────────────────────────────────────│ conn, seq, claim)│
//!  └──────────┘                                       └──────────────────┘
//!                                                       reaper: evict idle
//! ```
//!
//! One logical TCP connection is correlated across the two HTTP flows by a
//! client-minted id. The sequence-0 upload dials the destination and
//! creates the session; the download request may race ahead of it and
//! waits briefly for the session to appear. The heartbeat reaper evicts
//! sessions whose flows were silently killed by an intermediary.

// Core subsystems
pub mod client;
pub mod config;
pub mod registry;
pub mod server;

// Cross-cutting concerns
pub mod error;
pub mod lifecycle;
pub mod net;
pub mod observability;

pub use client::TunnelClient;
pub use config::TunnelConfig;
pub use error::TunnelError;
pub use lifecycle::Shutdown;
pub use registry::ConnectionRegistry;
pub use server::TunnelServer;
