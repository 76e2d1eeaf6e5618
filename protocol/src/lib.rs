// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Courier Protocol Core Library
//!
//! Chat, payments and coin swaps between two routing tags, carried over a
//! blockchain daemon's store-and-forward packet buffer. The buffer promises
//! nothing: packets can be late, duplicated, reordered or lost, and a peer
//! can vanish mid-handshake. Everything in here is written to survive that.
//!
//! ## Architecture
//!
//! - **packet**: the wire envelope, the closed method table, JSON and hex
//!   framing.
//! - **transport**: what we need from the daemon's packet buffer, plus an
//!   in-memory network for tests and demos.
//! - **wallet**: what we need from each coin's wallet, plus an in-memory
//!   wallet.
//! - **scheduler**: the single-threaded event loop and its alarms.
//! - **conversation**: chat reconciliation, the send and swap handshakes,
//!   the dispatcher and session directory, and the echo responder.
//! - **config**: protocol constants: channels, timeouts, retry limits.
//!
//! ## Ground Rules
//!
//! 1. One loop owns all conversation state. No locks in the core.
//! 2. Every alarm callback checks it is still the alarm that matters.
//! 3. Malformed input from a peer is logged and dropped, never fatal.
//! 4. Desynchronised state is a bug and fails loudly.

pub mod config;
pub mod conversation;
pub mod error;
pub mod packet;
pub mod scheduler;
pub mod transport;
pub mod wallet;

pub use error::{ProtocolError, Result};
