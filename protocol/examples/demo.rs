//! Scripted two-party conversation over the in-memory substrate.
//!
//! Alice and Bob each run a real chat session inside its own event loop.
//! The script types at them (a chat exchange with an edit, a `/send`, a
//! swap proposal and its execution) and then prints both transcripts and
//! the wallet movements. The output uses ANSI escape codes for colored,
//! storytelling-style terminal rendering.
//!
//! Run with:
//!   cargo run --example demo

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use courier_protocol::config::PROTOCOL_VERSION;
use courier_protocol::conversation::{
    notification_events, AckState, ChatSession, Event, Party, UserInput,
};
use courier_protocol::scheduler::EventLoop;
use courier_protocol::transport::{MemoryNetwork, RoutingTag};
use courier_protocol::wallet::{CoinRegistry, MemoryWallet};

// ---------------------------------------------------------------------------
// ANSI color constants
// ---------------------------------------------------------------------------

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";

const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const BLUE: &str = "\x1b[34m";
const MAGENTA: &str = "\x1b[35m";
const CYAN: &str = "\x1b[36m";
const WHITE: &str = "\x1b[37m";

const BG_BLUE: &str = "\x1b[44m";

// ---------------------------------------------------------------------------
// Display helpers
// ---------------------------------------------------------------------------

fn banner() {
    println!();
    println!(
        "{BG_BLUE}{BOLD}{WHITE}                                                                    {RESET}"
    );
    println!(
        "{BG_BLUE}{BOLD}{WHITE}    COURIER  --  Chat, Send & Swap Demo                             {RESET}"
    );
    println!(
        "{BG_BLUE}{BOLD}{WHITE}    Version {PROTOCOL_VERSION:<8}|  in-memory packet buffer                     {RESET}"
    );
    println!(
        "{BG_BLUE}{BOLD}{WHITE}                                                                    {RESET}"
    );
    println!();
}

fn section(num: u32, title: &str) {
    println!();
    println!(
        "{BOLD}{CYAN}===[{YELLOW} Step {num} {CYAN}]=============================================================={RESET}"
    );
    println!("{BOLD}{WHITE}  {title}{RESET}");
    println!(
        "{CYAN}------------------------------------------------------------------------{RESET}"
    );
}

fn typed(who: &str, line: &str, color: &str) {
    println!("  {color}{BOLD}{who:<6}{RESET} {DIM}>{RESET} {line}");
}

fn success(text: &str) {
    println!("{GREEN}  [OK] {text}{RESET}");
}

fn balance_row(name: &str, ecc: f64, btc: f64, color: &str) {
    println!(
        "  {color}{BOLD}{name:<8}{RESET}  {WHITE}{ecc:>12.6}{RESET} {DIM}ecc{RESET}  {WHITE}{btc:>10.6}{RESET} {DIM}btc{RESET}"
    );
}

fn timing(label: &str, elapsed: Duration) {
    let ms = elapsed.as_secs_f64() * 1000.0;
    println!("{DIM}{MAGENTA}  [{label}: {ms:.2} ms]{RESET}");
}

fn transcript(name: &str, session: &ChatSession, color: &str) {
    println!("  {color}{BOLD}{name}{RESET}");
    for entry in session.log().entries() {
        let at = entry.at.format("%H:%M:%S");
        let (tag, tint) = match entry.party {
            Party::System => ("  ", DIM),
            Party::Local => ("me", WHITE),
            Party::Peer => ("<<", YELLOW),
        };
        let mark = match (entry.party, entry.ack) {
            (Party::Local, AckState::Pending) => " (?)",
            (Party::Local, AckState::NotAcked) => " (!)",
            _ => "",
        };
        println!("    {DIM}{at}{RESET} {tint}{tag} {}{mark}{RESET}", entry.text);
    }
}

// ---------------------------------------------------------------------------
// Nodes
// ---------------------------------------------------------------------------

struct Node {
    input: mpsc::UnboundedSender<Event>,
    task: JoinHandle<ChatSession>,
    ecc: Arc<MemoryWallet>,
    btc: Arc<MemoryWallet>,
}

impl Node {
    fn spawn(
        net: &MemoryNetwork,
        me: &str,
        peer: &str,
        balances: (f64, f64),
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        let transport = net.endpoint(me);
        let notifications = notification_events(transport.subscribe());
        let ecc = Arc::new(MemoryWallet::new("E", balances.0));
        let btc = Arc::new(MemoryWallet::new("1", balances.1));
        let coins = CoinRegistry::new("ecc", "ECCoin", ecc.clone()).with_coin(
            "btc",
            "Bitcoin",
            btc.clone(),
        );

        let session = ChatSession::new(coins, Arc::new(transport), RoutingTag::new(peer));
        let (input, user) = mpsc::unbounded_channel();
        let mut event_loop = EventLoop::new(session);
        event_loop.watch_queue(notifications);
        event_loop.watch_queue(user);

        Self {
            input,
            task: tokio::spawn(event_loop.run(shutdown)),
            ecc,
            btc,
        }
    }

    async fn type_line(&self, who: &str, line: &str, color: &str) {
        typed(who, line, color);
        // The loop only goes away on shutdown, which the script sends last.
        let _ = self.input.send(Event::Input(UserInput::Line(line.into())));
        settle().await;
    }

    async fn edit(&self, input: UserInput) {
        let _ = self.input.send(Event::Input(input));
        settle().await;
    }
}

/// Gives both loops time to exchange whatever is queued.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

// ---------------------------------------------------------------------------
// Script
// ---------------------------------------------------------------------------

#[tokio::main(flavor = "current_thread")]
async fn main() {
    banner();
    let started = Instant::now();

    // -----------------------------------------------------------------------
    section(1, "Two nodes join the same packet buffer");
    // -----------------------------------------------------------------------
    let net = MemoryNetwork::new();
    net.endpoint("alice");
    net.endpoint("bob");
    let (stop, shutdown) = watch::channel(false);
    let alice = Node::spawn(&net, "alice", "bob", (10.0, 1.0), shutdown.clone());
    let bob = Node::spawn(&net, "bob", "alice", (5.0, 2.0), shutdown);
    settle().await;
    balance_row("alice", alice.ecc.balance(), alice.btc.balance(), BLUE);
    balance_row("bob", bob.ecc.balance(), bob.btc.balance(), MAGENTA);
    success("both sessions registered on channel 1");

    // -----------------------------------------------------------------------
    section(2, "Chat, with an edit and a retraction");
    // -----------------------------------------------------------------------
    alice.type_line("alice", "helo bob", BLUE).await;
    typed("alice", "(replaces the last message)", BLUE);
    alice.edit(UserInput::Replace("hello bob".into())).await;
    bob.type_line("bob", "hi alice, wrong window", MAGENTA).await;
    typed("bob", "(deletes the last message)", MAGENTA);
    bob.edit(UserInput::Delete).await;
    success("edits applied on both sides");

    // -----------------------------------------------------------------------
    section(3, "Alice pays Bob 1.5 ecc");
    // -----------------------------------------------------------------------
    let t = Instant::now();
    alice.type_line("alice", "/send 1.5", BLUE).await;
    timing("addrReq / addrRes / transfer / txidInf", t.elapsed());

    // -----------------------------------------------------------------------
    section(4, "Alice swaps 1 ecc for 0.5 btc");
    // -----------------------------------------------------------------------
    let t = Instant::now();
    alice.type_line("alice", "/swap 1 ecc for 0.5 btc", BLUE).await;
    alice.type_line("alice", "/execute", BLUE).await;
    timing("swapInf / swapReq / swapRes / both legs", t.elapsed());

    // -----------------------------------------------------------------------
    section(5, "Where everything ended up");
    // -----------------------------------------------------------------------
    balance_row("alice", alice.ecc.balance(), alice.btc.balance(), BLUE);
    balance_row("bob", bob.ecc.balance(), bob.btc.balance(), MAGENTA);

    let _ = stop.send(true);
    let (alice, bob) = match (alice.task.await, bob.task.await) {
        (Ok(a), Ok(b)) => (a, b),
        _ => {
            eprintln!("a session task panicked");
            return;
        }
    };

    println!();
    transcript("Alice's screen", &alice, BLUE);
    println!();
    transcript("Bob's screen", &bob, MAGENTA);

    println!();
    timing("whole demo", started.elapsed());
    println!();
}
