//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Synthetic server iteration
//!     → listener.rs (bind 127.0.0.1:0 with an explicit backlog)
//!     → connection.rs (live-resource tracking, RAII guards)
//!     → Hand off to the HTTP layer (read request head, write response)
//! ```
//!
//! # Design Decisions
//! - Backlog is chosen per scenario (1 for single exchanges, N for fault injection)
//! - Every listener and accepted connection is counted until dropped

pub mod connection;
pub mod listener;

pub use connection::{ConnectionGuard, ConnectionTracker, ResourceId};
pub use listener::{bind_loopback, ListenerError};
