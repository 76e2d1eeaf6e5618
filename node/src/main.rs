// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Courier
//!
//! Entry point for the `courier` binary. Parses CLI arguments, initializes
//! logging, connects to the coin daemons, subscribes to their zmq
//! publishers (or polls the packet buffer when there are none) and runs one
//! conversation (or the echo responder) inside the protocol's event loop
//! until the user leaves or the process is signalled.
//!
//! The binary supports three subcommands:
//!
//! - `chat`   : talk, pay and swap with one other routing tag
//! - `echo`   : answer anyone who writes, echoing their messages
//! - `version`: print build version information

mod cli;
mod console;
mod daemon;
mod logging;
mod notify;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tokio::sync::{mpsc, watch};

use courier_protocol::config::{CHAT_CHANNEL, PROTOCOL_VERSION};
use courier_protocol::conversation::{ChatSession, EchoService, Event};
use courier_protocol::scheduler::EventLoop;
use courier_protocol::transport::{RoutingTag, Transport};
use courier_protocol::wallet::CoinRegistry;

use cli::{Commands, CourierCli, DaemonArgs};
use daemon::{CoinSpec, DaemonTransport, DaemonWallet, RpcClient};
use notify::Feed;

const DEFAULT_FILTER: &str = "courier=info,courier_protocol=info";

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = CourierCli::parse();

    match cli.command {
        Commands::Chat(args) => {
            logging::init_logging(DEFAULT_FILTER, cli.log_format);
            run_chat(args).await
        }
        Commands::Echo(args) => {
            logging::init_logging(DEFAULT_FILTER, cli.log_format);
            run_echo(args).await
        }
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Opens a conversation with `args.peer` and runs it until `/exit`, end of
/// input or a signal.
async fn run_chat(args: cli::ChatArgs) -> Result<()> {
    let (coins, transport, feeds) = connect(&args.daemon).await?;
    let peer = RoutingTag::new(args.peer);
    tracing::info!(
        local = %transport.routing_tag(),
        peer = %peer,
        coins = coins.len(),
        "starting conversation"
    );

    let session = ChatSession::new(coins, transport, peer);
    let (events, queue) = mpsc::unbounded_channel();
    console::spawn_stdin(events.clone());
    start_notifications(events, &args.daemon, feeds)?;

    let mut event_loop = EventLoop::new(session);
    event_loop.watch_queue(queue);
    event_loop.on_idle(console::renderer());

    let session = event_loop.run(stop_on_signal()).await;
    tracing::info!(
        sends = session.directory().len(),
        receipts = session.directory().receipts().len(),
        "conversation closed"
    );
    Ok(())
}

/// Runs the echo responder until signalled.
async fn run_echo(args: cli::EchoArgs) -> Result<()> {
    let (coins, transport, feeds) = connect(&args.daemon).await?;
    tracing::info!(local = %transport.routing_tag(), "starting echo responder");

    let service = EchoService::new(coins, transport).with_prefix(args.prefix);
    let (events, queue) = mpsc::unbounded_channel();
    start_notifications(events, &args.daemon, feeds)?;

    let mut event_loop = EventLoop::new(service);
    event_loop.watch_queue(queue);

    let service = event_loop.run(stop_on_signal()).await;
    tracing::info!(users = service.unique_senders(), "echo responder stopped");
    Ok(())
}

/// Connects to the messaging daemon (transport and first wallet) and to
/// every extra coin wallet. Also returns the zmq publishers configured
/// along the way.
async fn connect(args: &DaemonArgs) -> Result<(CoinRegistry, Arc<dyn Transport>, Vec<Feed>)> {
    let mut rpc = RpcClient::new(&args.rpc_url)
        .with_context(|| format!("failed to build RPC client for {}", args.rpc_url))?;
    if let Some(pass) = &args.rpc_pass {
        rpc = rpc.with_credentials(&args.rpc_user, pass);
    }
    let rpc = Arc::new(rpc);

    let transport: Arc<dyn Transport> = Arc::new(
        DaemonTransport::connect(Arc::clone(&rpc))
            .await
            .with_context(|| format!("failed to reach {} daemon at {}", args.symbol, args.rpc_url))?,
    );

    let mut feeds: Vec<Feed> = args
        .zmq
        .iter()
        .map(|endpoint| Feed::new(&args.symbol, endpoint, true))
        .collect();

    let mut coins = CoinRegistry::new(&args.symbol, &args.coin_name, Arc::new(DaemonWallet::new(rpc)));
    for spec in &args.coins {
        let spec: CoinSpec = spec.parse()?;
        let rpc = RpcClient::new(&spec.url)
            .with_context(|| format!("failed to build RPC client for {}", spec.symbol))?;
        coins = coins.with_coin(&spec.symbol, &spec.name, Arc::new(DaemonWallet::new(Arc::new(rpc))));
        if let Some(endpoint) = &spec.zmq {
            feeds.push(Feed::new(&spec.symbol, endpoint, false));
        }
        tracing::info!(symbol = %spec.symbol, name = %spec.name, "coin wallet configured");
    }

    Ok((coins, transport, feeds))
}

/// Subscribes to every zmq publisher. Without one for the messaging coin
/// the packet buffer is polled instead.
fn start_notifications(
    events: mpsc::UnboundedSender<Event>,
    args: &DaemonArgs,
    feeds: Vec<Feed>,
) -> Result<()> {
    if !feeds.iter().any(|feed| feed.messaging) {
        tracing::info!(every_ms = args.poll_ms, "no zmq publisher, polling the packet buffer");
        console::spawn_poller(events.clone(), CHAT_CHANNEL, poll_interval(args));
    }
    for feed in feeds {
        let endpoint = feed.endpoint.clone();
        notify::spawn_subscriber(events.clone(), feed)
            .with_context(|| format!("failed to subscribe to {endpoint}"))?;
    }
    Ok(())
}

fn poll_interval(args: &DaemonArgs) -> Duration {
    Duration::from_millis(args.poll_ms.max(50))
}

/// Returns a shutdown receiver that flips when the process is signalled.
fn stop_on_signal() -> watch::Receiver<bool> {
    let (stop, shutdown) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        tracing::info!("shutdown signal received");
        let _ = stop.send(true);
    });
    shutdown
}

/// Prints version information to stdout.
fn print_version() {
    println!("courier  {}", env!("CARGO_PKG_VERSION"));
    println!("protocol {}", PROTOCOL_VERSION);
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// On non-Unix platforms, only Ctrl+C is supported. If a handler cannot be
/// installed that source is ignored rather than stopping the node at once.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::warn!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
