//! Connection handle and related types

use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

/// An encoded outbound frame, shared by every recipient of a broadcast.
pub type Frame = Arc<str>;

/// Opaque identifier assigned by the transport when a connection is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(Arc<str>);

impl ConnectionId {
    /// Generate a fresh random identifier
    pub fn generate() -> Self {
        Self(Arc::from(Uuid::new_v4().to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for ConnectionId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl From<&str> for ConnectionId {
    fn from(value: &str) -> Self {
        Self(Arc::from(value))
    }
}

impl From<String> for ConnectionId {
    fn from(value: String) -> Self {
        Self(Arc::from(value))
    }
}

/// Why a single-connection send did not go through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SendError {
    #[error("connection is not registered")]
    NotFound,
    #[error("connection transport is closed")]
    Closed,
    #[error("connection outbound buffer is full")]
    Full,
}

/// Transport handle for a single connection.
///
/// Frames pushed here are drained by the connection's writer task. The
/// handle never blocks: a full buffer is reported as [`SendError::Full`].
pub struct ConnectionHandle {
    pub id: ConnectionId,
    sender: mpsc::Sender<Frame>,
    pub connected_at: DateTime<Utc>,
    /// Last inbound activity (Unix seconds) - AtomicI64 for lock-free updates
    last_activity: AtomicI64,
}

impl ConnectionHandle {
    pub fn new(id: ConnectionId, sender: mpsc::Sender<Frame>) -> Self {
        let now = Utc::now();
        Self {
            id,
            sender,
            connected_at: now,
            last_activity: AtomicI64::new(now.timestamp()),
        }
    }

    /// True while the writer side of the transport is still draining frames
    pub fn is_open(&self) -> bool {
        !self.sender.is_closed()
    }

    pub fn try_send(&self, frame: Frame) -> Result<(), SendError> {
        self.sender.try_send(frame).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SendError::Full,
            mpsc::error::TrySendError::Closed(_) => SendError::Closed,
        })
    }

    pub fn update_activity(&self) {
        self.last_activity
            .store(Utc::now().timestamp(), Ordering::Relaxed);
    }

    pub fn last_activity(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.last_activity.load(Ordering::Relaxed), 0)
            .unwrap_or_else(Utc::now)
    }

    /// Whole seconds since the last inbound frame, as of `now`
    pub fn idle_seconds(&self, now: DateTime<Utc>) -> i64 {
        (now.timestamp() - self.last_activity.load(Ordering::Relaxed)).max(0)
    }
}

impl fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("id", &self.id)
            .field("open", &self.is_open())
            .field("connected_at", &self.connected_at)
            .finish()
    }
}
