//! Error taxonomy for the conversation layer.
//!
//! Each collaborator has its own closed error type ([`DecodeError`],
//! [`TransportError`], [`WalletError`]); [`ProtocolError`] is the union the
//! dispatcher and event loop deal in. Which variant you get decides what
//! happens next:
//!
//! - `ProtocolViolation` is logged and the packet dropped.
//! - `Validation`, `PeerRefusal`, `Timeout` and `Wallet` end up as a
//!   conversation line.
//! - `Transport` is logged and marks the channel registration as lost.

use thiserror::Error;

use crate::packet::DecodeError;
use crate::transport::TransportError;
use crate::wallet::WalletError;

/// Errors surfaced by conversation handlers.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// An inbound packet could not be decoded or failed its schema.
    #[error("protocol violation: {0}")]
    ProtocolViolation(#[from] DecodeError),

    /// A local request was rejected before anything went on the wire.
    #[error("{0}")]
    Validation(String),

    /// The other party answered with the refusal sentinel.
    #[error("{0}")]
    PeerRefusal(String),

    /// The other party did not answer before the handshake's alarm fired.
    #[error("{0}")]
    Timeout(String),

    /// The packet substrate failed.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The wallet daemon failed.
    #[error("{0}")]
    Wallet(#[from] WalletError),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ProtocolError>;
