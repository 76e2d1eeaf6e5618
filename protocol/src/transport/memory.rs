//! In-process packet substrate.
//!
//! [`MemoryNetwork`] behaves like a daemon's packet buffer shared by several
//! nodes: packets pushed to a tag land in that tag's per-channel buffer, a
//! fetch drains it, and a registration can be expired or an endpoint taken
//! offline to exercise the failure paths. Used by the test suites and by
//! the `demo` front end.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::debug;

use super::{BufferEntries, Notification, RoutingTag, Transport, TransportError};
use crate::packet::{self, Packet};

#[derive(Default)]
struct Endpoint {
    registered: HashSet<u32>,
    offline: bool,
    route_lookups: usize,
    notifier: Option<mpsc::UnboundedSender<Notification>>,
}

#[derive(Default)]
struct Inner {
    endpoints: DashMap<RoutingTag, Endpoint>,
    buffers: DashMap<(RoutingTag, u32), BufferEntries>,
    seq: AtomicU64,
}

/// A shared in-memory substrate. Cheap to clone.
#[derive(Clone, Default)]
pub struct MemoryNetwork {
    inner: Arc<Inner>,
}

impl MemoryNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches a node with routing tag `tag` and returns its transport.
    pub fn endpoint(&self, tag: impl Into<String>) -> MemoryTransport {
        let tag = RoutingTag::new(tag);
        self.inner.endpoints.entry(tag.clone()).or_default();
        MemoryTransport {
            inner: Arc::clone(&self.inner),
            tag,
        }
    }

    /// Forgets every channel registration of `tag`, as the daemon does after
    /// its inactivity timeout.
    pub fn expire_registrations(&self, tag: &str) {
        if let Some(mut ep) = self.inner.endpoints.get_mut(&RoutingTag::new(tag)) {
            ep.registered.clear();
        }
    }

    /// Makes every call from `tag` fail with [`TransportError::Unavailable`].
    pub fn set_offline(&self, tag: &str, offline: bool) {
        if let Some(mut ep) = self.inner.endpoints.get_mut(&RoutingTag::new(tag)) {
            ep.offline = offline;
        }
    }

    pub fn is_registered(&self, tag: &str, channel: u32) -> bool {
        self.inner
            .endpoints
            .get(&RoutingTag::new(tag))
            .map(|ep| ep.registered.contains(&channel))
            .unwrap_or(false)
    }

    /// How many times `tag` asked for a route.
    pub fn route_lookups(&self, tag: &str) -> usize {
        self.inner
            .endpoints
            .get(&RoutingTag::new(tag))
            .map(|ep| ep.route_lookups)
            .unwrap_or(0)
    }

    /// Puts a raw buffer entry in `tag`'s buffer, bypassing the codec.
    pub fn inject_raw(&self, tag: &str, channel: u32, entry: &str) {
        self.deliver(&RoutingTag::new(tag), channel, entry.to_string());
    }

    /// Decodes what is waiting in `tag`'s buffer without draining it.
    pub fn peek(&self, tag: &str, channel: u32) -> Vec<Packet> {
        self.inner
            .buffers
            .get(&(RoutingTag::new(tag), channel))
            .map(|buf| {
                buf.iter()
                    .filter_map(|(_, e)| packet::decode_hex(e).ok())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn deliver(&self, dest: &RoutingTag, channel: u32, entry: String) {
        // Plain decimal ids, like the daemon's: they do not sort as strings.
        let id = self.inner.seq.fetch_add(1, Ordering::Relaxed).to_string();
        self.inner
            .buffers
            .entry((dest.clone(), channel))
            .or_default()
            .push((id, entry));

        if let Some(ep) = self.inner.endpoints.get(dest) {
            if let Some(tx) = &ep.notifier {
                let _ = tx.send(Notification::PacketReady { channel });
            }
        }
    }
}

/// One node's view of a [`MemoryNetwork`].
#[derive(Clone)]
pub struct MemoryTransport {
    inner: Arc<Inner>,
    tag: RoutingTag,
}

impl MemoryTransport {
    /// Returns a queue that receives [`Notification::PacketReady`] whenever
    /// a packet lands in this node's buffer. Replaces any earlier queue.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<Notification> {
        let (tx, rx) = mpsc::unbounded_channel();
        if let Some(mut ep) = self.inner.endpoints.get_mut(&self.tag) {
            ep.notifier = Some(tx);
        }
        rx
    }

    fn network(&self) -> MemoryNetwork {
        MemoryNetwork {
            inner: Arc::clone(&self.inner),
        }
    }

    fn check_online(&self) -> Result<(), TransportError> {
        match self.inner.endpoints.get(&self.tag) {
            Some(ep) if !ep.offline => Ok(()),
            Some(_) => Err(TransportError::Unavailable(format!("{} is offline", self.tag.short()))),
            None => Err(TransportError::Unavailable("endpoint detached".into())),
        }
    }

    fn check_registered(&self, channel: u32) -> Result<(), TransportError> {
        self.check_online()?;
        if self.network().is_registered(self.tag.as_str(), channel) {
            Ok(())
        } else {
            Err(TransportError::NotRegistered(channel))
        }
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    fn routing_tag(&self) -> RoutingTag {
        self.tag.clone()
    }

    async fn register(&self, channel: u32) -> Result<(), TransportError> {
        self.check_online()?;
        if let Some(mut ep) = self.inner.endpoints.get_mut(&self.tag) {
            ep.registered.insert(channel);
        }
        Ok(())
    }

    async fn send_packet(
        &self,
        dest: &RoutingTag,
        channel: u32,
        payload: &str,
    ) -> Result<(), TransportError> {
        self.check_online()?;
        let listening = self.network().is_registered(dest.as_str(), channel);
        if !listening {
            // The substrate gives no delivery guarantee; an unregistered
            // destination simply never sees the packet.
            debug!(dest = dest.short(), channel, "destination not listening, packet dropped");
            return Ok(());
        }
        self.network().deliver(dest, channel, hex::encode(payload));
        Ok(())
    }

    async fn fetch_buffer(&self, channel: u32) -> Result<BufferEntries, TransportError> {
        self.check_registered(channel)?;
        Ok(self
            .inner
            .buffers
            .remove(&(self.tag.clone(), channel))
            .map(|(_, buf)| buf)
            .unwrap_or_default())
    }

    async fn establish_route(&self, tag: &RoutingTag) -> Result<(), TransportError> {
        self.check_online()?;
        if let Some(mut ep) = self.inner.endpoints.get_mut(&self.tag) {
            ep.route_lookups += 1;
        }
        if self.inner.endpoints.contains_key(tag) {
            Ok(())
        } else {
            Err(TransportError::Route {
                tag: tag.clone(),
                reason: "unknown routing tag".into(),
            })
        }
    }

    async fn keep_alive(&self, channel: u32) -> Result<(), TransportError> {
        self.check_registered(channel)
    }
}
