//! # Daemon Push Notifications
//!
//! Daemons can publish events on a zmq PUB socket. The messaging coin's
//! publisher carries two topics:
//!
//! ```text
//!   [b"packet",    b"<prefix><channel>"]  ──► Notification::PacketReady
//!   [b"hashblock", <block hash>       ]  ──► Notification::BlockConnected
//! ```
//!
//! Every message from another coin's publisher means a new block on that
//! chain, whatever its topic. Coins without a publisher are covered by the
//! chain refresh alarm, and the messaging buffer by the poller in
//! [`console`](crate::console).
//!
//! The `zmq` socket is blocking, so each subscriber runs on its own thread
//! and wakes up once a second to see whether the loop has gone away.

use std::thread;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use courier_protocol::conversation::Event;
use courier_protocol::transport::Notification;

/// Receive timeout in milliseconds between checks of the event queue.
const RECV_TIMEOUT_MS: i32 = 1000;

const TOPIC_PACKET: &[u8] = b"packet";
const TOPIC_HASHBLOCK: &[u8] = b"hashblock";

/// One coin's publisher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feed {
    /// Coin the feed belongs to.
    pub symbol: String,
    /// zmq endpoint, e.g. `tcp://127.0.0.1:28001`.
    pub endpoint: String,
    /// Whether this is the messaging coin, the only one with packet topics.
    pub messaging: bool,
}

impl Feed {
    pub fn new(symbol: &str, endpoint: &str, messaging: bool) -> Self {
        Self {
            symbol: symbol.to_lowercase(),
            endpoint: endpoint.to_string(),
            messaging,
        }
    }

    /// Turns one multipart message into a notification, if it means one.
    pub fn classify(&self, parts: &[Vec<u8>]) -> Option<Notification> {
        let block = || Notification::BlockConnected {
            coin: self.symbol.clone(),
        };
        if !self.messaging {
            return Some(block());
        }
        let (topic, body) = match parts {
            [topic, body, ..] => (topic.as_slice(), body.as_slice()),
            _ => return None,
        };
        match topic {
            TOPIC_HASHBLOCK => Some(block()),
            TOPIC_PACKET => packet_channel(body).map(|channel| Notification::PacketReady { channel }),
            _ => None,
        }
    }
}

/// The channel named by a `packet` body: decimal digits after a one
/// character prefix.
fn packet_channel(body: &[u8]) -> Option<u32> {
    let text = std::str::from_utf8(body).ok()?;
    let mut chars = text.chars();
    chars.next()?;
    chars.as_str().trim().parse().ok()
}

/// Connects to `feed` and forwards its notifications as loop events until
/// the event queue closes. Connection errors are returned at once.
pub fn spawn_subscriber(events: mpsc::UnboundedSender<Event>, feed: Feed) -> Result<(), zmq::Error> {
    let context = zmq::Context::new();
    let socket = context.socket(zmq::SUB)?;
    socket.set_rcvtimeo(RECV_TIMEOUT_MS)?;
    socket.set_subscribe(b"")?;
    socket.connect(&feed.endpoint)?;
    info!(coin = %feed.symbol, endpoint = %feed.endpoint, "subscribed to daemon notifications");

    thread::spawn(move || {
        let _context = context;
        loop {
            match socket.recv_multipart(0) {
                Ok(parts) => {
                    let Some(notification) = feed.classify(&parts) else {
                        debug!(coin = %feed.symbol, parts = parts.len(), "unhandled zmq message");
                        continue;
                    };
                    if events.send(Event::Notify(notification)).is_err() {
                        break;
                    }
                }
                Err(zmq::Error::EAGAIN) => {
                    if events.is_closed() {
                        break;
                    }
                }
                Err(e) => {
                    warn!(coin = %feed.symbol, error = %e, "zmq subscriber failed");
                    break;
                }
            }
        }
        debug!(coin = %feed.symbol, "zmq subscriber stopped");
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn parts(topic: &str, body: &str) -> Vec<Vec<u8>> {
        vec![topic.as_bytes().to_vec(), body.as_bytes().to_vec()]
    }

    #[test]
    fn messaging_topics() {
        let feed = Feed::new("ECC", "tcp://127.0.0.1:28001", true);
        assert_eq!(
            feed.classify(&parts("packet", "P1")),
            Some(Notification::PacketReady { channel: 1 })
        );
        assert_eq!(
            feed.classify(&parts("hashblock", "00ab")),
            Some(Notification::BlockConnected { coin: "ecc".into() })
        );
        assert_eq!(feed.classify(&parts("hashtx", "00ab")), None);
        assert_eq!(feed.classify(&parts("packet", "P")), None);
        assert_eq!(feed.classify(&[b"packet".to_vec()]), None);
    }

    #[test]
    fn any_message_on_another_chain_is_a_block() {
        let feed = Feed::new("ltc", "tcp://127.0.0.1:28332", false);
        let msg = vec![b"hashblock".to_vec(), vec![0xab; 32], vec![0, 0, 0, 1]];
        assert_eq!(
            feed.classify(&msg),
            Some(Notification::BlockConnected { coin: "ltc".into() })
        );
    }

    #[tokio::test]
    async fn published_packet_reaches_the_event_queue() {
        let context = zmq::Context::new();
        let publisher = context.socket(zmq::PUB).unwrap();
        publisher.bind("tcp://127.0.0.1:*").unwrap();
        let endpoint = publisher.get_last_endpoint().unwrap().unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        spawn_subscriber(tx, Feed::new("ecc", &endpoint, true)).unwrap();

        // A SUB socket misses whatever is published before it has joined.
        let stop = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
        let publishing = {
            let stop = stop.clone();
            thread::spawn(move || {
                while !stop.load(std::sync::atomic::Ordering::Relaxed) {
                    publisher.send_multipart(["packet", "P1"], 0).unwrap();
                    thread::sleep(Duration::from_millis(20));
                }
            })
        };

        let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        stop.store(true, std::sync::atomic::Ordering::Relaxed);
        publishing.join().unwrap();
        assert!(matches!(
            event,
            Event::Notify(Notification::PacketReady { channel: 1 })
        ));
    }
}
