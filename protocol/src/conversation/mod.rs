//! # Conversations
//!
//! Everything that happens between two routing tags: chat with edits and
//! acknowledgements, peer-mediated payments, and two-party swaps.
//!
//! ```text
//!   Notification ──► drain buffer ──► Packet ──► dispatch
//!                                                 │
//!        ┌──────────────┬──────────────┬──────────┴─────┐
//!        ▼              ▼              ▼                ▼
//!     chat log     send machines    swap slot      addrReq reply
//!   (transcript)    (directory)      (swap)
//!        │              │              │
//!        └──────► Env: link.send / timers.arm / log.system
//! ```
//!
//! The state machines never own the transport, the wallets or the alarms.
//! Each call borrows them through an [`Env`] for the duration of one
//! transition, which is what keeps a single active callback the only writer.

pub mod chat;
pub mod command;
pub mod directory;
pub mod echo;
pub mod send;
pub mod session;
pub mod swap;
pub mod transcript;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::ProtocolError;
use crate::packet::{Packet, Payload};
use crate::scheduler::TimerQueue;
use crate::transport::{Link, Notification, RoutingTag};
use crate::wallet::{Coin, CoinId, CoinRegistry};

pub use command::Command;
pub use directory::{Receipt, SessionDirectory};
pub use echo::EchoService;
pub use send::{SendState, SendTransaction};
pub use session::ChatSession;
pub use swap::{SwapRole, SwapSlot, SwapState};
pub use transcript::{AckState, ChatEntry, ChatLog, Party, Prompt};

// ---------------------------------------------------------------------------
// Loop Vocabulary
// ---------------------------------------------------------------------------

/// Input from the local user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UserInput {
    /// A line typed at the prompt: chat text or a `/command`.
    Line(String),
    /// Replace the last own message with this text.
    Replace(String),
    /// Redact the last own message.
    Delete,
    /// Answer to a passphrase prompt. `None` means the user cancelled.
    Passphrase(Option<String>),
    /// Close the conversation.
    Quit,
}

/// Everything a conversation handler can be woken with.
#[derive(Clone, Debug)]
pub enum Event {
    /// The substrate has something for us.
    Notify(Notification),
    /// The user did something.
    Input(UserInput),
    /// A decoded packet, queued after a buffer drain.
    Inbound(Packet),
}

/// Alarm payloads.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Timeout {
    /// `addrRes` for send `uuid` did not arrive in time.
    AddressResponse { uuid: String },
    /// The current swap step took too long.
    Swap,
    /// Time to refresh the buffer registration.
    KeepAlive,
    /// Time to refresh block height and peer counts.
    ChainRefresh,
}

/// Turns a transport's notification queue into an event queue a loop can
/// watch. The forwarding task ends when either side hangs up.
pub fn notification_events(
    mut notifications: mpsc::UnboundedReceiver<Notification>,
) -> mpsc::UnboundedReceiver<Event> {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        while let Some(n) = notifications.recv().await {
            if tx.send(Event::Notify(n)).is_err() {
                debug!("event queue closed, notification forwarding stopped");
                break;
            }
        }
    });
    rx
}

// ---------------------------------------------------------------------------
// Env
// ---------------------------------------------------------------------------

/// What a state machine may touch during one transition.
pub struct Env<'a> {
    pub coins: &'a CoinRegistry,
    pub link: &'a mut Link,
    pub peer: &'a RoutingTag,
    pub log: &'a mut ChatLog,
    pub timers: &'a mut TimerQueue<Timeout>,
}

impl<'a> Env<'a> {
    /// Sends `payload` to the peer. A transport failure is written to the
    /// conversation and returned.
    pub async fn send(&mut self, payload: Payload) -> Result<(), ProtocolError> {
        let method = payload.method();
        match self.link.send(self.peer, payload).await {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!(meth = %method, error = %e, "send to peer failed");
                self.log.system(format!("Unable to reach other party: {e}"));
                Err(e.into())
            }
        }
    }

    pub fn coin(&self, id: CoinId) -> &'a Coin {
        self.coins.get(id)
    }

    /// Resolves a symbol or writes "Unknown coin symbol" to the log.
    pub fn resolve(&mut self, symbol: &str) -> Option<CoinId> {
        let id = self.coins.lookup(symbol);
        if id.is_none() {
            self.log.system(format!("Unknown coin symbol: {symbol}"));
        }
        id
    }
}

/// Parses a user-supplied amount the way every handshake validates it.
pub(crate) fn parse_amount(text: &str, what: &str) -> Result<f64, ProtocolError> {
    let amount: f64 = text.trim().parse().map_err(|_| number_expected(what))?;
    validate_amount(amount, what)
}

/// Checks an amount that arrived already parsed, e.g. from a `swapInf`.
pub(crate) fn validate_amount(amount: f64, what: &str) -> Result<f64, ProtocolError> {
    if !amount.is_finite() {
        return Err(number_expected(what));
    }
    if amount <= 0.0 {
        return Err(ProtocolError::Validation(format!(
            "Invalid {what} amount - must be greater than zero"
        )));
    }
    Ok(amount)
}

fn number_expected(what: &str) -> ProtocolError {
    ProtocolError::Validation(format!("Invalid {what} amount - number expected"))
}

/// Fails unless `amount` is strictly below `balance`.
pub(crate) fn check_balance(amount: f64, balance: f64, what: &str) -> Result<(), ProtocolError> {
    if amount >= balance {
        return Err(ProtocolError::Validation(format!(
            "Invalid {what} amount - must be less than current balance = {balance:.6}"
        )));
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod testkit {
    //! Two-sided fixtures for the state machine tests.

    use std::sync::Arc;

    use super::*;
    use crate::config::CHAT_CHANNEL;
    use crate::transport::{MemoryNetwork, Transport};
    use crate::wallet::MemoryWallet;

    /// One side of a conversation with its collaborators laid out flat.
    pub struct Side {
        pub coins: CoinRegistry,
        pub ecc: Arc<MemoryWallet>,
        pub btc: Arc<MemoryWallet>,
        pub link: Link,
        pub peer: RoutingTag,
        pub log: ChatLog,
        pub timers: TimerQueue<Timeout>,
    }

    impl Side {
        pub fn env(&mut self) -> Env<'_> {
            Env {
                coins: &self.coins,
                link: &mut self.link,
                peer: &self.peer,
                log: &mut self.log,
                timers: &mut self.timers,
            }
        }
    }

    pub struct Pair {
        pub net: MemoryNetwork,
        pub alice: Side,
        pub bob: Side,
    }

    async fn side(net: &MemoryNetwork, me: &str, peer: &str, ecc: f64, btc: f64) -> Side {
        let transport: Arc<dyn Transport> = Arc::new(net.endpoint(me));
        let ecc_wallet = Arc::new(MemoryWallet::new("E", ecc));
        let btc_wallet = Arc::new(MemoryWallet::new("1", btc));
        let coins = CoinRegistry::new("ecc", "ECCoin", ecc_wallet.clone())
            .with_coin("btc", "Bitcoin", btc_wallet.clone());
        let mut link = Link::new(transport, CHAT_CHANNEL);
        link.open().await.unwrap();
        Side {
            coins,
            ecc: ecc_wallet,
            btc: btc_wallet,
            link,
            peer: RoutingTag::new(peer),
            log: ChatLog::new(),
            timers: TimerQueue::new(),
        }
    }

    /// Alice holds 10 ECC / 1 BTC, Bob holds 5 ECC / 2 BTC.
    pub async fn pair() -> Pair {
        let net = MemoryNetwork::new();
        let alice = side(&net, "alice", "bob", 10.0, 1.0).await;
        let bob = side(&net, "bob", "alice", 5.0, 2.0).await;
        Pair { net, alice, bob }
    }

    /// Drains `side`'s buffer.
    pub async fn inbox(side: &mut Side) -> Vec<Packet> {
        side.link
            .drain()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.unwrap())
            .collect()
    }
}
