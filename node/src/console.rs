//! # Console Front End
//!
//! Line-based terminal view of a conversation. Three pieces:
//!
//! - a stdin reader thread turning typed lines into [`UserInput::Line`]
//!   events, and end of input into [`UserInput::Quit`];
//! - a buffer poller, used when the daemon has no zmq publisher
//!   configured (see [`notify`](crate::notify));
//! - an idle callback that prints whatever the conversation log changed
//!   since the last burst.
//!
//! The terminal is append-only, so an edit to an entry already on screen is
//! printed again as a new line marked with what happened to it.

use std::io::{self, BufRead, Write};
use std::thread;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::debug;

use courier_protocol::conversation::{AckState, ChatEntry, ChatSession, Event, Party, UserInput};
use courier_protocol::scheduler::IdleCallback;
use courier_protocol::transport::Notification;

/// Reads stdin on a dedicated thread. A blocking read inside the runtime
/// would keep it from shutting down.
pub fn spawn_stdin(events: mpsc::UnboundedSender<Event>) {
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if events.send(Event::Input(UserInput::Line(line))).is_err() {
                return;
            }
        }
        debug!("stdin closed");
        let _ = events.send(Event::Input(UserInput::Quit));
    });
}

/// Announces `channel` as ready every `every`. Stops when the loop goes away.
pub fn spawn_poller(events: mpsc::UnboundedSender<Event>, channel: u32, every: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if events
                .send(Event::Notify(Notification::PacketReady { channel }))
                .is_err()
            {
                break;
            }
        }
    });
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// What was last printed for an entry.
#[derive(Clone, Debug, PartialEq)]
struct Shown {
    text: String,
    ack: AckState,
}

/// Turns log updates into terminal lines.
#[derive(Debug, Default)]
struct Screen {
    shown: Vec<Shown>,
}

impl Screen {
    /// Lines to print for the entry at `pos`, given its current state.
    fn update(&mut self, pos: usize, entry: &ChatEntry) -> Option<String> {
        let now = Shown {
            text: entry.text.clone(),
            ack: entry.ack,
        };
        let line = match self.shown.get(pos) {
            None => Some(render(entry, "")),
            Some(prev) if *prev == now => None,
            Some(prev) if prev.text != now.text => Some(render(entry, "edited: ")),
            Some(_) if now.ack == AckState::NotAcked => Some(render(entry, "not delivered: ")),
            Some(_) => None,
        };
        if pos >= self.shown.len() {
            self.shown.resize(
                pos + 1,
                Shown {
                    text: String::new(),
                    ack: AckState::Pending,
                },
            );
        }
        self.shown[pos] = now;
        line
    }
}

fn render(entry: &ChatEntry, note: &str) -> String {
    let at = entry.at.format("%H:%M:%S");
    match entry.party {
        Party::System => format!("{at}  * {note}{}", entry.text),
        Party::Local => format!("{at} me {note}{}", entry.text),
        Party::Peer => format!("{at} >> {note}{}", entry.text),
    }
}

/// Idle callback printing new and changed log entries to stdout.
pub fn renderer() -> IdleCallback<ChatSession> {
    let mut screen = Screen::default();
    Box::new(move |session: &mut ChatSession| {
        let log = session.log_mut();
        let updates = log.take_updates();
        if updates.is_empty() {
            return;
        }
        let stdout = io::stdout();
        let mut out = stdout.lock();
        for pos in updates {
            if let Some(line) = log.entries().get(pos).and_then(|e| screen.update(pos, e)) {
                let _ = writeln!(out, "{line}");
            }
        }
        let _ = out.flush();
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Local;

    fn entry(party: Party, text: &str, ack: AckState) -> ChatEntry {
        ChatEntry {
            uuid: Some("u".into()),
            party,
            text: text.into(),
            ack,
            at: Local::now(),
        }
    }

    #[test]
    fn new_entries_print_once() {
        let mut screen = Screen::default();
        let e = entry(Party::Local, "hello", AckState::Pending);
        let line = screen.update(0, &e).unwrap();
        assert!(line.ends_with("me hello"));
        assert_eq!(screen.update(0, &e), None);
    }

    #[test]
    fn edits_and_failed_delivery_reprint() {
        let mut screen = Screen::default();
        screen.update(0, &entry(Party::Peer, "helo", AckState::Acked));
        let line = screen.update(0, &entry(Party::Peer, "hello", AckState::Acked)).unwrap();
        assert!(line.ends_with(">> edited: hello"));

        screen.update(1, &entry(Party::Local, "hi", AckState::Pending));
        assert_eq!(screen.update(1, &entry(Party::Local, "hi", AckState::Acked)), None);
        screen.update(2, &entry(Party::Local, "lost", AckState::Pending));
        let line = screen.update(2, &entry(Party::Local, "lost", AckState::NotAcked)).unwrap();
        assert!(line.ends_with("me not delivered: lost"));
    }

    #[tokio::test(start_paused = true)]
    async fn poller_ticks_until_receiver_drops() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        spawn_poller(tx, 1, Duration::from_millis(500));
        for _ in 0..3 {
            let ev = rx.recv().await.unwrap();
            assert!(matches!(ev, Event::Notify(Notification::PacketReady { channel: 1 })));
        }
    }
}
