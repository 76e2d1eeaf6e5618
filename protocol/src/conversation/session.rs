//! # Chat Session
//!
//! The handler for one conversation with one peer. It owns the transcript,
//! the session directory and the swap slot, and it is where inbound packets
//! are dispatched:
//!
//! | method | handled by |
//! |---|---|
//! | `chatMsg` / `chatAck` | [`chat`] |
//! | `addrReq` | answered here with a fresh address or `"0"` |
//! | `addrRes` | the send waiting for it in the [`SessionDirectory`] |
//! | `txidInf` | receipt, then the [`SwapSlot`] |
//! | `swapInf` / `swapReq` / `swapRes` | the [`SwapSlot`] |
//! | `name*` | ignored |
//!
//! Packets from anyone but the peer are dropped. Methods that make us
//! reply or pay first make sure a return route to the sender exists.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::command::{Command, SyntaxError, HELP};
use super::directory::{Receipt, SessionDirectory};
use super::send::SendTransaction;
use super::swap::SwapSlot;
use super::transcript::{ChatLog, Prompt};
use super::{chat, Env, Event, Timeout, UserInput};
use crate::config::{
    CHAIN_REFRESH_INTERVAL, CHAT_CHANNEL, KEEPALIVE_INTERVAL, PROTOCOL_VERSION, REFUSAL_SENTINEL,
};
use crate::error::ProtocolError;
use crate::packet::{AddrReq, AddrRes, Packet, Payload};
use crate::scheduler::{EventHandler, LoopControl, TimerHandle, TimerQueue};
use crate::transport::{Link, Notification, RoutingTag, Transport, TransportError};
use crate::wallet::{Balances, ChainStatus, CoinId, CoinRegistry};

type Ctl = LoopControl<Event, Timeout>;

/// The parts of a session every state machine borrows through [`Env`].
struct Conversation {
    coins: CoinRegistry,
    link: Link,
    peer: RoutingTag,
    log: ChatLog,
}

impl Conversation {
    fn env<'a>(&'a mut self, timers: &'a mut TimerQueue<Timeout>) -> Env<'a> {
        Env {
            coins: &self.coins,
            link: &mut self.link,
            peer: &self.peer,
            log: &mut self.log,
            timers,
        }
    }

    /// Writes a transport failure to the conversation, the way [`Env::send`]
    /// does, and hands it back for the event loop to log.
    fn unreachable(&mut self, err: TransportError) -> ProtocolError {
        self.log.system(format!("Unable to reach other party: {err}"));
        err.into()
    }
}

pub struct ChatSession {
    conv: Conversation,
    directory: SessionDirectory,
    swap: SwapSlot,
    chain: Vec<ChainStatus>,
}

impl ChatSession {
    pub fn new(coins: CoinRegistry, transport: Arc<dyn Transport>, peer: RoutingTag) -> Self {
        let chain = vec![ChainStatus::default(); coins.len()];
        Self {
            conv: Conversation {
                coins,
                link: Link::new(transport, CHAT_CHANNEL),
                peer,
                log: ChatLog::new(),
            },
            directory: SessionDirectory::new(),
            swap: SwapSlot::new(),
            chain,
        }
    }

    pub fn log(&self) -> &ChatLog {
        &self.conv.log
    }

    pub fn log_mut(&mut self) -> &mut ChatLog {
        &mut self.conv.log
    }

    pub fn directory(&self) -> &SessionDirectory {
        &self.directory
    }

    pub fn swap(&self) -> &SwapSlot {
        &self.swap
    }

    pub fn peer(&self) -> &RoutingTag {
        &self.conv.peer
    }

    pub fn local_tag(&self) -> &RoutingTag {
        self.conv.link.local_tag()
    }

    pub fn coins(&self) -> &CoinRegistry {
        &self.conv.coins
    }

    pub fn chain_status(&self, coin: CoinId) -> ChainStatus {
        self.chain.get(coin.index()).copied().unwrap_or_default()
    }

    // -----------------------------------------------------------------------
    // Inbound
    // -----------------------------------------------------------------------

    async fn drain(&mut self, ctl: &mut Ctl) -> Result<(), ProtocolError> {
        for decoded in self.conv.link.drain().await? {
            match decoded {
                Ok(packet) => ctl.defer(Event::Inbound(packet)),
                Err(e) => warn!(error = %e, "dropping undecodable packet"),
            }
        }
        Ok(())
    }

    async fn dispatch(&mut self, packet: Packet, ctl: &mut Ctl) -> Result<(), ProtocolError> {
        if packet.from != self.conv.peer {
            debug!(from = packet.from.short(), meth = %packet.method(), "packet from outside the conversation dropped");
            return Ok(());
        }
        if packet.method().needs_return_route() {
            if let Err(e) = self.conv.link.ensure_route(&packet.from).await {
                warn!(meth = %packet.method(), error = %e, "no return route, packet not handled");
                return Err(self.conv.unreachable(e));
            }
        }
        debug!(meth = %packet.method(), uuid = packet.payload.uuid(), "dispatching");

        let mut env = self.conv.env(&mut ctl.timers);
        match &packet.payload {
            Payload::ChatMsg(msg) => chat::receive(&mut env, msg).await,
            Payload::ChatAck(ack) => {
                chat::acknowledged(&mut env, ack);
                Ok(())
            }
            Payload::AddrReq(req) => answer_address_request(&mut env, req).await,
            Payload::AddrRes(res) => {
                let Some(tx) = self.directory.get_mut(&res.uuid) else {
                    debug!(uuid = %res.uuid, "addrRes for unknown send ignored");
                    return Ok(());
                };
                if !tx.is_awaiting_address() {
                    debug!(uuid = %res.uuid, state = ?tx.state(), "late or duplicate addrRes ignored");
                    return Ok(());
                }
                tx.on_address(&mut env, res).await?;
                let txid = tx.txid.clone();
                if let Some(txid) = txid {
                    self.directory.note_txid(txid);
                }
                Ok(())
            }
            Payload::TxidInf(inf) => {
                env.log
                    .system(format!("{} {} received at {}", inf.amount, inf.coin, inf.addr));
                info!(uuid = %inf.uuid, coin = %inf.coin, amnt = %inf.amount, txid = %inf.txid, "transfer received");
                self.directory.record_receipt(Receipt::from_txid_inf(inf));
                if let Some(txid) = self.swap.on_transfer(&mut env, inf).await? {
                    self.directory.note_txid(txid);
                }
                Ok(())
            }
            Payload::SwapInf(inf) => self.swap.on_proposal(&mut env, inf).await,
            Payload::SwapReq(req) => self.swap.on_request(&mut env, req).await,
            Payload::SwapRes(res) => {
                if let Some(txid) = self.swap.on_response(&mut env, res).await? {
                    self.directory.note_txid(txid);
                }
                Ok(())
            }
            Payload::NameAdv(_) | Payload::NameReq(_) | Payload::NameRes(_) => {
                debug!(meth = %packet.method(), "name resolution is not served here");
                Ok(())
            }
        }
    }

    // -----------------------------------------------------------------------
    // User input
    // -----------------------------------------------------------------------

    async fn input(&mut self, input: UserInput, ctl: &mut Ctl) -> Result<(), ProtocolError> {
        match input {
            // While a passphrase is being asked for, the next line answers it.
            UserInput::Line(line) if self.conv.log.prompt().is_some() => {
                let answer = (!line.is_empty()).then_some(line);
                self.passphrase(answer, ctl).await
            }
            UserInput::Line(line) => self.line(&line, ctl).await,
            UserInput::Replace(text) => {
                chat::replace_last(&mut self.conv.env(&mut ctl.timers), &text).await
            }
            UserInput::Delete => chat::delete_last(&mut self.conv.env(&mut ctl.timers)).await,
            UserInput::Passphrase(answer) => self.passphrase(answer, ctl).await,
            UserInput::Quit => {
                ctl.exit();
                Ok(())
            }
        }
    }

    async fn passphrase(&mut self, answer: Option<String>, ctl: &mut Ctl) -> Result<(), ProtocolError> {
        let mut env = self.conv.env(&mut ctl.timers);
        match self.directory.awaiting_passphrase() {
            Some(tx) => tx.passphrase(&mut env, answer).await,
            None => {
                if let Some(Prompt::Passphrase { uuid, .. }) = env.log.clear_prompt() {
                    debug!(%uuid, "prompt had no waiting send");
                }
                Ok(())
            }
        }
    }

    async fn line(&mut self, line: &str, ctl: &mut Ctl) -> Result<(), ProtocolError> {
        let command = match line.parse::<Command>() {
            Ok(Command::Chat(text)) => {
                if text.trim().is_empty() {
                    return Ok(());
                }
                chat::say(&mut self.conv.env(&mut ctl.timers), &text).await?;
                return Ok(());
            }
            Ok(command) => command,
            Err(SyntaxError) => {
                self.conv.log.command(line);
                self.conv.log.system(SyntaxError.to_string());
                return Ok(());
            }
        };
        self.conv.log.command(line);
        self.command(command, ctl).await
    }

    async fn command(&mut self, command: Command, ctl: &mut Ctl) -> Result<(), ProtocolError> {
        if command == Command::Exit {
            ctl.exit();
            return Ok(());
        }
        let mut env = self.conv.env(&mut ctl.timers);
        match command {
            Command::Chat(_) | Command::Exit => Ok(()),
            Command::Help => {
                for (usage, what) in HELP {
                    env.log.system(format!("{usage:<16} - {what}"));
                }
                Ok(())
            }
            Command::Version => {
                env.log.system(format!("courier {PROTOCOL_VERSION}"));
                Ok(())
            }
            Command::Blocks(sym) => {
                chain_report(&mut env, &self.chain, sym.as_deref(), |s| s.blocks.to_string());
                Ok(())
            }
            Command::Peers(sym) => {
                chain_report(&mut env, &self.chain, sym.as_deref(), |s| s.peers.to_string());
                Ok(())
            }
            Command::Tag => {
                let tag = env.link.local_tag().to_string();
                env.log.system(tag);
                Ok(())
            }
            Command::Balance(sym) => {
                let ids: Vec<CoinId> = match sym {
                    Some(s) => env.resolve(&s).into_iter().collect(),
                    None => env.coins.iter().map(|(id, _)| id).collect(),
                };
                for id in ids {
                    let coin = env.coin(id);
                    match coin.wallet.balances().await {
                        Ok(b) => env.log.system(balance_line(&coin.symbol, &b)),
                        Err(e) => env.log.system(e.to_string()),
                    };
                }
                Ok(())
            }
            Command::Address(sym) => {
                let Some(id) = coin_arg(&mut env, sym.as_deref()) else {
                    return Ok(());
                };
                match env.coin(id).wallet.new_receiving_address().await {
                    Ok(addr) => env.log.system(addr),
                    Err(e) => env.log.system(e.to_string()),
                };
                Ok(())
            }
            Command::Send { amount, coin } => {
                let Some(id) = coin_arg(&mut env, coin.as_deref()) else {
                    return Ok(());
                };
                let symbol = env.coin(id).symbol.clone();
                let uuid = Uuid::new_v4().to_string();
                info!(%uuid, coin = %symbol, %amount, "send started");
                let tx = self
                    .directory
                    .insert(SendTransaction::new(uuid, id, &symbol, &amount));
                tx.start(&mut env).await
            }
            Command::Txid => {
                let txid = self.directory.last_txid().unwrap_or("none");
                env.log.system(format!("txid = {txid}"));
                Ok(())
            }
            Command::List(sym) => {
                let filter = match sym {
                    Some(s) => match env.resolve(&s) {
                        Some(id) => Some(env.coin(id).symbol.clone()),
                        None => return Ok(()),
                    },
                    None => None,
                };
                let lines = self.directory.history(filter.as_deref());
                if lines.is_empty() {
                    env.log.system("No transactions this session");
                }
                for line in lines {
                    env.log.system(line.render());
                }
                Ok(())
            }
            Command::Swap {
                amount_give,
                coin_give,
                amount_take,
                coin_take,
            } => {
                self.swap
                    .propose(&mut env, &amount_give, &coin_give, &amount_take, &coin_take)
                    .await
            }
            Command::Execute => self.swap.execute(&mut env).await,
            Command::Replace(text) => chat::replace_last(&mut env, &text).await,
            Command::Delete => chat::delete_last(&mut env).await,
        }
    }

    // -----------------------------------------------------------------------
    // Housekeeping
    // -----------------------------------------------------------------------

    async fn refresh_chain(&mut self, only: Option<CoinId>) {
        let ids: Vec<CoinId> = match only {
            Some(id) => vec![id],
            None => self.conv.coins.iter().map(|(id, _)| id).collect(),
        };
        for id in ids {
            match self.conv.coins.get(id).wallet.chain_status().await {
                Ok(status) => {
                    if let Some(slot) = self.chain.get_mut(id.index()) {
                        *slot = status;
                    }
                }
                Err(e) => debug!(coin = id.index(), error = %e, "chain status unavailable"),
            }
        }
    }
}

/// Our answer to the peer's `addrReq`: a fresh address for a coin we hold,
/// the refusal sentinel otherwise.
async fn answer_address_request(env: &mut Env<'_>, req: &AddrReq) -> Result<(), ProtocolError> {
    let addr = match env.coins.lookup(&req.coin) {
        Some(id) => match env.coin(id).wallet.new_receiving_address().await {
            Ok(addr) => addr,
            Err(e) => {
                warn!(uuid = %req.uuid, coin = %req.coin, error = %e, "no address for peer");
                REFUSAL_SENTINEL.to_string()
            }
        },
        None => {
            debug!(uuid = %req.uuid, coin = %req.coin, "address requested for unknown coin");
            REFUSAL_SENTINEL.to_string()
        }
    };
    env.send(Payload::AddrRes(AddrRes {
        uuid: req.uuid.clone(),
        coin: req.coin.clone(),
        addr,
    }))
    .await
}

/// `/blocks` and `/peers`: one coin bare, or every coin labelled.
fn chain_report(
    env: &mut Env<'_>,
    chain: &[ChainStatus],
    sym: Option<&str>,
    field: impl Fn(&ChainStatus) -> String,
) {
    let status = |id: CoinId| chain.get(id.index()).copied().unwrap_or_default();
    match sym {
        Some(s) => {
            if let Some(id) = env.resolve(s) {
                env.log.system(field(&status(id)));
            }
        }
        None => {
            for (id, coin) in env.coins.iter() {
                let line = format!("{} : {}", coin.symbol, field(&status(id)));
                env.log.system(line);
            }
        }
    }
}

fn coin_arg(env: &mut Env<'_>, sym: Option<&str>) -> Option<CoinId> {
    match sym {
        Some(s) => env.resolve(s),
        None => Some(CoinId::MESSAGING),
    }
}

/// `/balance` line for one coin.
fn balance_line(symbol: &str, b: &Balances) -> String {
    let split = b.unlocked != b.confirmed;
    let pending = b.unconfirmed > 0.0;
    match (split, pending) {
        (true, true) => format!(
            "{symbol} : {:.6} confirmed ({:.6} unlocked) + {:.6} unconfirmed",
            b.confirmed, b.unlocked, b.unconfirmed
        ),
        (true, false) => format!("{symbol} : {:.6} ({:.6} unlocked)", b.confirmed, b.unlocked),
        (false, true) => format!(
            "{symbol} : {:.6} confirmed + {:.6} unconfirmed",
            b.confirmed, b.unconfirmed
        ),
        (false, false) => format!("{symbol} : {:.6}", b.confirmed),
    }
}

#[async_trait]
impl EventHandler for ChatSession {
    type Event = Event;
    type Timer = Timeout;

    async fn start(&mut self, ctl: &mut Ctl) -> Result<(), ProtocolError> {
        ctl.timers.arm(KEEPALIVE_INTERVAL, Timeout::KeepAlive);
        ctl.timers.arm(CHAIN_REFRESH_INTERVAL, Timeout::ChainRefresh);
        self.refresh_chain(None).await;

        let peer = self.conv.peer.clone();
        self.conv
            .log
            .system(format!("Conversation with {peer} - type /help for commands"));
        self.conv.link.open().await?;
        if let Err(e) = self.conv.link.ensure_route(&peer).await {
            return Err(self.conv.unreachable(e));
        }
        info!(peer = peer.short(), local = self.local_tag().short(), "chat session started");
        Ok(())
    }

    async fn on_event(&mut self, event: Event, ctl: &mut Ctl) -> Result<(), ProtocolError> {
        match event {
            Event::Notify(Notification::PacketReady { channel }) => {
                if channel != self.conv.link.channel() {
                    return Ok(());
                }
                self.drain(ctl).await
            }
            Event::Notify(Notification::BlockConnected { coin }) => {
                let id = self.conv.coins.lookup(&coin);
                if id.is_some() {
                    self.refresh_chain(id).await;
                }
                Ok(())
            }
            Event::Input(input) => self.input(input, ctl).await,
            Event::Inbound(packet) => self.dispatch(packet, ctl).await,
        }
    }

    async fn on_timer(
        &mut self,
        handle: TimerHandle,
        timer: Timeout,
        ctl: &mut Ctl,
    ) -> Result<(), ProtocolError> {
        match timer {
            Timeout::AddressResponse { uuid } => {
                let mut env = self.conv.env(&mut ctl.timers);
                if let Some(tx) = self.directory.get_mut(&uuid) {
                    tx.on_timeout(&mut env, handle);
                }
                Ok(())
            }
            Timeout::Swap => {
                self.swap.on_timeout(&mut self.conv.env(&mut ctl.timers), handle);
                Ok(())
            }
            Timeout::KeepAlive => {
                ctl.timers.arm(KEEPALIVE_INTERVAL, Timeout::KeepAlive);
                match self.conv.link.keep_alive().await {
                    Ok(()) => Ok(()),
                    Err(e) => Err(self.conv.unreachable(e)),
                }
            }
            Timeout::ChainRefresh => {
                ctl.timers.arm(CHAIN_REFRESH_INTERVAL, Timeout::ChainRefresh);
                self.refresh_chain(None).await;
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::time::Instant;

    use super::*;
    use crate::conversation::Party;
    use crate::packet::{ChatCommand, ChatMsg};
    use crate::transport::MemoryNetwork;
    use crate::wallet::MemoryWallet;

    struct Rig {
        net: MemoryNetwork,
        session: ChatSession,
        ctl: Ctl,
        ecc: Arc<MemoryWallet>,
    }

    async fn rig() -> Rig {
        let net = MemoryNetwork::new();
        let _bob = net.endpoint("bob");
        net.endpoint("bob").register(CHAT_CHANNEL).await.unwrap();
        let ecc = Arc::new(MemoryWallet::new("E", 10.0));
        let coins = CoinRegistry::new("ecc", "ECCoin", ecc.clone())
            .with_coin("btc", "Bitcoin", Arc::new(MemoryWallet::new("1", 1.0)));
        let mut session = ChatSession::new(
            coins,
            Arc::new(net.endpoint("alice")),
            RoutingTag::new("bob"),
        );
        let mut ctl = Ctl::new();
        session.start(&mut ctl).await.unwrap();
        Rig {
            net,
            session,
            ctl,
            ecc,
        }
    }

    impl Rig {
        async fn line(&mut self, text: &str) {
            self.session
                .on_event(Event::Input(UserInput::Line(text.into())), &mut self.ctl)
                .await
                .unwrap();
        }

        async fn inbound(&mut self, from: &str, payload: Payload) {
            let packet = Packet::new(CHAT_CHANNEL, RoutingTag::new("alice"), RoutingTag::new(from), payload);
            self.session
                .on_event(Event::Inbound(packet), &mut self.ctl)
                .await
                .unwrap();
        }

        fn last(&self) -> &str {
            self.session.log().last_system().unwrap_or_default()
        }

        fn sent(&self) -> Vec<Packet> {
            self.net.peek("bob", CHAT_CHANNEL)
        }

        /// Pops alarms until the next keep-alive, discarding the others.
        fn next_keep_alive(&mut self) -> (TimerHandle, Timeout) {
            let horizon = Instant::now() + KEEPALIVE_INTERVAL * 2;
            loop {
                let (handle, timer) = self.ctl.timers.pop_due(horizon).expect("keep-alive armed");
                if timer == Timeout::KeepAlive {
                    return (handle, timer);
                }
            }
        }
    }

    fn unreachable_notices(log: &ChatLog) -> usize {
        log.entries()
            .iter()
            .filter(|e| e.party == Party::System && e.text.starts_with("Unable to reach other party"))
            .count()
    }

    #[tokio::test]
    async fn start_arms_housekeeping_alarms() {
        let r = rig().await;
        assert_eq!(r.ctl.timers.len(), 2);
        assert_eq!(r.net.route_lookups("alice"), 1);
        assert_eq!(r.session.chain_status(CoinId::MESSAGING).peers, 8);
    }

    #[tokio::test]
    async fn lost_registration_is_reported_then_restored() {
        let mut r = rig().await;
        r.net.expire_registrations("alice");

        let (handle, timer) = r.next_keep_alive();
        let err = r.session.on_timer(handle, timer, &mut r.ctl).await.unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::Transport(TransportError::NotRegistered(CHAT_CHANNEL))
        ));
        assert_eq!(unreachable_notices(r.session.log()), 1);
        assert!(!r.net.is_registered("alice", CHAT_CHANNEL));

        // The re-armed keep-alive registers the channel again.
        let (handle, timer) = r.next_keep_alive();
        r.session.on_timer(handle, timer, &mut r.ctl).await.unwrap();
        assert!(r.net.is_registered("alice", CHAT_CHANNEL));
        assert_eq!(unreachable_notices(r.session.log()), 1);
    }

    #[tokio::test]
    async fn unroutable_peer_is_reported_in_the_conversation() {
        let net = MemoryNetwork::new();
        let coins = CoinRegistry::new("ecc", "ECCoin", Arc::new(MemoryWallet::new("E", 10.0)));
        let mut session =
            ChatSession::new(coins, Arc::new(net.endpoint("alice")), RoutingTag::new("carol"));
        let mut ctl = Ctl::new();
        assert!(session.start(&mut ctl).await.is_err());
        assert_eq!(unreachable_notices(session.log()), 1);

        let packet = Packet::new(
            CHAT_CHANNEL,
            RoutingTag::new("alice"),
            RoutingTag::new("carol"),
            Payload::ChatMsg(ChatMsg {
                uuid: "c1".into(),
                command: ChatCommand::Add,
                text: "hi".into(),
            }),
        );
        let err = session
            .on_event(Event::Inbound(packet), &mut ctl)
            .await
            .unwrap_err();
        assert!(matches!(err, ProtocolError::Transport(TransportError::Route { .. })));
        assert!(session.log().find("c1").is_none());
        assert_eq!(unreachable_notices(session.log()), 2);
        // A failed lookup is never cached.
        assert_eq!(net.route_lookups("alice"), 2);
    }

    #[tokio::test]
    async fn block_notification_refreshes_only_that_chain() {
        let mut r = rig().await;
        r.ecc.mine_block();
        let btc = CoinId::MESSAGING.index() + 1;
        let btc_before = r.session.chain[btc];

        for coin in ["ECC", "doge"] {
            r.session
                .on_event(
                    Event::Notify(Notification::BlockConnected { coin: coin.into() }),
                    &mut r.ctl,
                )
                .await
                .unwrap();
        }
        assert_eq!(r.session.chain_status(CoinId::MESSAGING).blocks, 2);
        assert_eq!(r.session.chain[btc], btc_before);
    }

    #[tokio::test]
    async fn strangers_are_ignored() {
        let mut r = rig().await;
        r.inbound(
            "mallory",
            Payload::ChatMsg(ChatMsg {
                uuid: "m1".into(),
                command: ChatCommand::Add,
                text: "hi".into(),
            }),
        )
        .await;
        assert!(r.session.log().find("m1").is_none());
        assert!(r.sent().is_empty());
    }

    #[tokio::test]
    async fn address_requests_are_answered_or_refused() {
        let mut r = rig().await;
        for (coin, expected) in [("ecc", "Eaddr0001"), ("doge", "0")] {
            r.inbound(
                "bob",
                Payload::AddrReq(AddrReq {
                    uuid: coin.into(),
                    coin: coin.into(),
                    address_type: "P2PKH".into(),
                }),
            )
            .await;
            let sent = r.sent();
            let Payload::AddrRes(res) = &sent.last().unwrap().payload else {
                panic!("expected addrRes");
            };
            assert_eq!(res.uuid, coin);
            assert_eq!(res.addr, expected);
        }

        r.ecc.fail_addresses(true);
        r.inbound(
            "bob",
            Payload::AddrReq(AddrReq {
                uuid: "x".into(),
                coin: "ecc".into(),
                address_type: "P2PKH".into(),
            }),
        )
        .await;
        let sent = r.sent();
        let Payload::AddrRes(res) = &sent.last().unwrap().payload else {
            panic!("expected addrRes");
        };
        assert_eq!(res.addr, "0");
    }

    #[tokio::test]
    async fn commands_write_to_the_log() {
        let mut r = rig().await;
        r.line("/txid").await;
        assert_eq!(r.last(), "txid = none");

        r.line("/balance btc").await;
        assert_eq!(r.last(), "btc : 1.000000");

        r.line("/blocks doge").await;
        assert_eq!(r.last(), "Unknown coin symbol: doge");

        r.line("/swap 1 ecc").await;
        assert_eq!(
            r.last(),
            "Unknown command syntax - try /help for a list of commands"
        );

        r.line("/tag").await;
        assert_eq!(r.last(), "alice");

        r.line("/peers").await;
        assert_eq!(r.last(), "btc : 8");

        // Commands are echoed, never sent.
        let echoed = r
            .session
            .log()
            .entries()
            .iter()
            .filter(|e| e.party == Party::Local)
            .count();
        assert_eq!(echoed, 6);
        assert!(r.sent().is_empty());
    }

    #[tokio::test]
    async fn balance_variants() {
        let b = |confirmed, unlocked, unconfirmed| Balances {
            confirmed,
            unlocked,
            unconfirmed,
        };
        assert_eq!(balance_line("ecc", &b(2.0, 2.0, 0.0)), "ecc : 2.000000");
        assert_eq!(
            balance_line("ecc", &b(2.0, 1.0, 0.0)),
            "ecc : 2.000000 (1.000000 unlocked)"
        );
        assert_eq!(
            balance_line("ecc", &b(2.0, 2.0, 0.5)),
            "ecc : 2.000000 confirmed + 0.500000 unconfirmed"
        );
        assert_eq!(
            balance_line("ecc", &b(2.0, 1.0, 0.5)),
            "ecc : 2.000000 confirmed (1.000000 unlocked) + 0.500000 unconfirmed"
        );
    }

    #[tokio::test]
    async fn send_command_registers_in_directory() {
        let mut r = rig().await;
        r.line("/send 1.5").await;
        let tx = r.session.directory().sends().next().unwrap();
        assert!(tx.is_awaiting_address());
        assert_eq!(r.ctl.timers.len(), 3);
        assert!(matches!(r.sent()[0].payload, Payload::AddrReq(_)));

        // Duplicate addrRes after completion is dropped by the dispatcher.
        let uuid = tx.uuid.clone();
        let res = Payload::AddrRes(AddrRes {
            uuid: uuid.clone(),
            coin: "ecc".into(),
            addr: "Eaddr0009".into(),
        });
        r.inbound("bob", res.clone()).await;
        r.inbound("bob", res).await;
        assert_eq!(r.ecc.transfers().len(), 1);
        assert_eq!(r.session.directory().last_txid(), Some(r.ecc.transfers()[0].txid.as_str()));
        assert_eq!(r.ctl.timers.len(), 2);
    }

    #[tokio::test]
    async fn passphrase_prompt_consumes_the_next_line() {
        let net = MemoryNetwork::new();
        net.endpoint("bob").register(CHAT_CHANNEL).await.unwrap();
        let ecc = Arc::new(MemoryWallet::new("E", 10.0).locked_with("sesame"));
        let coins = CoinRegistry::new("ecc", "ECCoin", ecc.clone());
        let mut session =
            ChatSession::new(coins, Arc::new(net.endpoint("alice")), RoutingTag::new("bob"));
        let mut ctl = Ctl::new();
        session.start(&mut ctl).await.unwrap();

        for line in ["/send 1", "sesame"] {
            session
                .on_event(Event::Input(UserInput::Line(line.into())), &mut ctl)
                .await
                .unwrap();
        }
        let tx = session.directory().sends().next().unwrap();
        assert!(tx.is_awaiting_address());
        assert!(session.log().prompt().is_none());
        // The passphrase never reaches the transcript.
        assert!(session.log().entries().iter().all(|e| !e.text.contains("sesame")));
    }
}
