//! A conversation's handle on one channel of the substrate.
//!
//! [`Link`] wraps a shared [`Transport`] with the bookkeeping every handler
//! needs: whether our channel registration is still alive, which peers we
//! already have a return route to, and how to put a [`Payload`] on the wire.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, warn};

use super::{RoutingTag, Transport, TransportError};
use crate::packet::{self, DecodeError, Packet, Payload};

/// One registered channel plus its route cache.
pub struct Link {
    transport: Arc<dyn Transport>,
    channel: u32,
    local: RoutingTag,
    registered: bool,
    routes: HashSet<RoutingTag>,
}

impl Link {
    /// Creates an unregistered link. Call [`Link::open`] before relying on
    /// inbound traffic; outbound calls register lazily.
    pub fn new(transport: Arc<dyn Transport>, channel: u32) -> Self {
        let local = transport.routing_tag();
        Self {
            transport,
            channel,
            local,
            registered: false,
            routes: HashSet::new(),
        }
    }

    pub fn channel(&self) -> u32 {
        self.channel
    }

    /// Our routing tag.
    pub fn local_tag(&self) -> &RoutingTag {
        &self.local
    }

    pub fn is_registered(&self) -> bool {
        self.registered
    }

    /// Registers the channel with the daemon.
    pub async fn open(&mut self) -> Result<(), TransportError> {
        self.transport.register(self.channel).await?;
        self.registered = true;
        debug!(channel = self.channel, "channel registered");
        Ok(())
    }

    async fn ensure_registered(&mut self) -> Result<(), TransportError> {
        if !self.registered {
            self.open().await?;
        }
        Ok(())
    }

    /// Marks the registration as lost so the next call re-registers.
    fn lost(&mut self, err: &TransportError) {
        warn!(channel = self.channel, error = %err, "transport failure, registration marked lost");
        self.registered = false;
        self.routes.clear();
    }

    /// Encodes `payload` and sends it to `to` on this channel.
    pub async fn send(&mut self, to: &RoutingTag, payload: Payload) -> Result<(), TransportError> {
        let packet = Packet::new(self.channel, to.clone(), self.local.clone(), payload);
        self.send_packet(&packet).await
    }

    /// Sends an already built packet on its reply channel.
    pub async fn send_packet(&mut self, packet: &Packet) -> Result<(), TransportError> {
        self.ensure_registered().await?;
        let bytes = packet::encode(packet);
        let text = String::from_utf8_lossy(&bytes);
        let result = self
            .transport
            .send_packet(&packet.to, packet.reply_channel(), &text)
            .await;
        match result {
            Ok(()) => {
                debug!(meth = %packet.method(), to = packet.to.short(), "packet sent");
                Ok(())
            }
            Err(e) => {
                self.lost(&e);
                Err(e)
            }
        }
    }

    /// Makes sure a return route to `tag` exists. Routes are cached until
    /// the next transport failure; a failed lookup counts as one.
    pub async fn ensure_route(&mut self, tag: &RoutingTag) -> Result<(), TransportError> {
        if self.routes.contains(tag) {
            return Ok(());
        }
        if let Err(e) = self.transport.establish_route(tag).await {
            self.lost(&e);
            return Err(e);
        }
        debug!(tag = tag.short(), "route established");
        self.routes.insert(tag.clone());
        Ok(())
    }

    /// Keeps the channel registration alive, re-registering it first if a
    /// previous call lost it.
    pub async fn keep_alive(&mut self) -> Result<(), TransportError> {
        if !self.registered {
            return self.open().await;
        }
        if let Err(e) = self.transport.keep_alive(self.channel).await {
            self.lost(&e);
            return Err(e);
        }
        Ok(())
    }

    /// Drains the channel buffer and decodes every entry, in daemon order.
    pub async fn drain(&mut self) -> Result<Vec<Result<Packet, DecodeError>>, TransportError> {
        self.ensure_registered().await?;
        match self.transport.fetch_buffer(self.channel).await {
            Ok(entries) => Ok(entries
                .iter()
                .map(|(_, entry)| packet::decode_hex(entry))
                .collect()),
            Err(e) => {
                self.lost(&e);
                Err(e)
            }
        }
    }
}
