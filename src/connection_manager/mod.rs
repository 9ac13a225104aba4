//! Connection registry for WebSocket connections
//!
//! This module provides:
//! - Connection handles owning the per-connection outbound buffer
//! - The concurrent registry keyed by connection id
//! - Connection statistics

mod registry;
mod stats;
mod types;

pub use registry::ConnectionRegistry;
pub use stats::ConnectionStats;
pub use types::{ConnectionHandle, ConnectionId, Frame, SendError};
