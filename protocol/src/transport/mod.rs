//! # Transport Port
//!
//! The packet substrate as the protocol sees it: a daemon that holds a
//! per-channel buffer of packets addressed to us, can push a packet towards
//! a routing tag, and forgets our registration if we go quiet for too long.
//!
//! ```text
//!   Link ──send──► Transport::send_packet(dest, channel, json)
//!   Link ◄─drain── Transport::fetch_buffer(channel) -> [(id, hex(json))]
//!        ──────── Transport::keep_alive(channel)     every 10 s
//!        ──────── Transport::establish_route(tag)    before replying
//! ```
//!
//! Nothing here is ordered or reliable. The daemon may deliver late, twice
//! or never; the state machines above cope with that through correlation
//! ids and timeouts.

pub mod link;
pub mod memory;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use link::Link;
pub use memory::{MemoryNetwork, MemoryTransport};

// ---------------------------------------------------------------------------
// Routing Tags
// ---------------------------------------------------------------------------

/// Opaque identifier of a node on the substrate. In practice a base64
/// public key, but nothing here looks inside it.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoutingTag(String);

impl RoutingTag {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short form for log lines.
    pub fn short(&self) -> &str {
        let end = self
            .0
            .char_indices()
            .nth(12)
            .map(|(i, _)| i)
            .unwrap_or(self.0.len());
        &self.0[..end]
    }
}

impl fmt::Display for RoutingTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Notifications
// ---------------------------------------------------------------------------

/// Events the substrate (or a poller standing in for it) pushes onto an
/// event loop queue.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Notification {
    /// The buffer for `channel` has packets waiting.
    PacketReady { channel: u32 },
    /// A new block was connected on `coin`'s chain.
    BlockConnected { coin: String },
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Closed set of substrate failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The daemon could not be reached or answered with an error.
    #[error("daemon call failed: {0}")]
    Unavailable(String),

    /// The channel is not registered (never was, or the daemon timed it out).
    #[error("channel {0} is not registered")]
    NotRegistered(u32),

    /// No route to the tag could be found.
    #[error("no route to {tag}: {reason}")]
    Route {
        /// The destination we tried to reach.
        tag: RoutingTag,
        /// Daemon or adapter explanation.
        reason: String,
    },
}

/// A drained buffer: `(entry id, hex entry)` in delivery order.
pub type BufferEntries = Vec<(String, String)>;

// ---------------------------------------------------------------------------
// The Port
// ---------------------------------------------------------------------------

/// Operations the protocol needs from the packet substrate.
///
/// Implementations are shared behind an `Arc` and must tolerate being
/// called from the event loop while a poller task holds another clone.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Our own routing tag, the address peers send to.
    fn routing_tag(&self) -> RoutingTag;

    /// Registers interest in `channel`'s buffer.
    async fn register(&self, channel: u32) -> Result<(), TransportError>;

    /// Pushes JSON text towards `dest` on `channel`.
    async fn send_packet(
        &self,
        dest: &RoutingTag,
        channel: u32,
        payload: &str,
    ) -> Result<(), TransportError>;

    /// Removes and returns every queued packet on `channel` as
    /// `(entry id, hex-encoded JSON text)` pairs, in the order the daemon
    /// delivered them. Entry ids are opaque and must not be sorted on.
    async fn fetch_buffer(&self, channel: u32) -> Result<BufferEntries, TransportError>;

    /// Makes sure the daemon knows a return route to `tag`.
    async fn establish_route(&self, tag: &RoutingTag) -> Result<(), TransportError>;

    /// Resets the daemon's inactivity timer on `channel`.
    async fn keep_alive(&self, channel: u32) -> Result<(), TransportError>;
}
