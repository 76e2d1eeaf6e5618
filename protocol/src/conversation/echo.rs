//! Echo responder.
//!
//! A service endpoint rather than a conversation: anyone may talk to it.
//! Every chat operation is acknowledged and answered with a new message,
//! which is the text echoed back behind a prefix unless it is one of the
//! `#` queries. Address requests for the messaging coin are served, so the
//! responder can also be paid with `/send`.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::transcript::ChatLog;
use super::{Env, Event, Timeout, UserInput};
use crate::config::{CHAT_CHANNEL, ECHO_PREFIX, KEEPALIVE_INTERVAL, REFUSAL_SENTINEL};
use crate::error::ProtocolError;
use crate::packet::{AddrReq, AddrRes, ChatAck, ChatCommand, ChatMsg, Packet, Payload};
use crate::scheduler::{EventHandler, LoopControl, TimerHandle};
use crate::transport::{Link, Notification, RoutingTag, Transport};
use crate::wallet::CoinRegistry;

type Ctl = LoopControl<Event, Timeout>;

pub struct EchoService {
    coins: CoinRegistry,
    link: Link,
    prefix: String,
    senders: HashSet<RoutingTag>,
    /// Service notices. Nobody reads them interactively; they are kept so
    /// the responder shares [`Env`] with the conversation handlers.
    log: ChatLog,
}

impl EchoService {
    pub fn new(coins: CoinRegistry, transport: Arc<dyn Transport>) -> Self {
        Self {
            coins,
            link: Link::new(transport, CHAT_CHANNEL),
            prefix: ECHO_PREFIX.to_string(),
            senders: HashSet::new(),
            log: ChatLog::new(),
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Distinct routing tags that have chatted with us.
    pub fn unique_senders(&self) -> usize {
        self.senders.len()
    }

    pub fn local_tag(&self) -> &RoutingTag {
        self.link.local_tag()
    }

    async fn serve(&mut self, packet: Packet, ctl: &mut Ctl) -> Result<(), ProtocolError> {
        if let Err(e) = self.link.ensure_route(&packet.from).await {
            info!(from = packet.from.short(), error = %e, "no route back to sender");
            return Ok(());
        }

        let mut env = Env {
            coins: &self.coins,
            link: &mut self.link,
            peer: &packet.from,
            log: &mut self.log,
            timers: &mut ctl.timers,
        };
        match &packet.payload {
            Payload::ChatMsg(msg) => {
                env.send(Payload::ChatAck(ChatAck {
                    uuid: msg.uuid.clone(),
                    command: msg.command,
                    able: true,
                }))
                .await?;

                let reply = if msg.text.starts_with("#BALANCE") {
                    let balance = env.coins.messaging().wallet.unlocked_balance().await?;
                    format!("Balance = {balance:.6}")
                } else if msg.text.starts_with("#USAGE") {
                    format!(
                        "Unique users (identified by routing tag) = {}",
                        self.senders.len()
                    )
                } else {
                    format!("{}{}", self.prefix, msg.text)
                };
                env.send(Payload::ChatMsg(ChatMsg {
                    uuid: Uuid::new_v4().to_string(),
                    command: ChatCommand::Add,
                    text: reply,
                }))
                .await?;

                if self.senders.insert(packet.from.clone()) {
                    info!(from = packet.from.short(), total = self.senders.len(), "new sender");
                }
                Ok(())
            }
            Payload::AddrReq(req) => serve_address(&mut env, req).await,
            Payload::TxidInf(inf) => {
                info!(from = packet.from.short(), coin = %inf.coin, amnt = %inf.amount, txid = %inf.txid, "payment received");
                Ok(())
            }
            _ => {
                debug!(meth = %packet.method(), "not served by the echo responder");
                Ok(())
            }
        }
    }
}

/// Fresh address for the messaging coin, refusal for anything else.
async fn serve_address(env: &mut Env<'_>, req: &AddrReq) -> Result<(), ProtocolError> {
    let messaging = env.coins.messaging();
    let addr = if req.coin.eq_ignore_ascii_case(&messaging.symbol) {
        match messaging.wallet.new_receiving_address().await {
            Ok(a) => a,
            Err(e) => {
                warn!(error = %e, "address generation failed");
                REFUSAL_SENTINEL.to_string()
            }
        }
    } else {
        REFUSAL_SENTINEL.to_string()
    };
    env.send(Payload::AddrRes(AddrRes {
        uuid: req.uuid.clone(),
        coin: req.coin.clone(),
        addr,
    }))
    .await
}

#[async_trait]
impl EventHandler for EchoService {
    type Event = Event;
    type Timer = Timeout;

    async fn start(&mut self, ctl: &mut Ctl) -> Result<(), ProtocolError> {
        self.link.open().await?;
        ctl.timers.arm(KEEPALIVE_INTERVAL, Timeout::KeepAlive);
        info!(tag = %self.link.local_tag(), "echo responder listening");
        Ok(())
    }

    async fn on_event(&mut self, event: Event, ctl: &mut Ctl) -> Result<(), ProtocolError> {
        match event {
            Event::Notify(Notification::PacketReady { channel }) if channel == self.link.channel() => {
                for decoded in self.link.drain().await? {
                    match decoded {
                        Ok(packet) => ctl.defer(Event::Inbound(packet)),
                        Err(e) => warn!(error = %e, "dropping undecodable packet"),
                    }
                }
                Ok(())
            }
            Event::Inbound(packet) => self.serve(packet, ctl).await,
            Event::Input(UserInput::Quit) => {
                ctl.exit();
                Ok(())
            }
            _ => Ok(()),
        }
    }

    async fn on_timer(
        &mut self,
        _handle: TimerHandle,
        timer: Timeout,
        ctl: &mut Ctl,
    ) -> Result<(), ProtocolError> {
        if timer == Timeout::KeepAlive {
            ctl.timers.arm(KEEPALIVE_INTERVAL, Timeout::KeepAlive);
            self.link.keep_alive().await?;
        }
        Ok(())
    }
}
