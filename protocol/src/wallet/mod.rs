//! # Wallet Port
//!
//! Per-coin wallet capability the handshakes drive: read balances, unlock,
//! hand out receiving addresses, move funds. One implementation per coin
//! kind; the node picks one per configured coin and registers it in a
//! [`CoinRegistry`].

pub mod coins;
pub mod memory;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use coins::{Coin, CoinId, CoinRegistry};
pub use memory::MemoryWallet;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Closed classification of wallet failures.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum WalletErrorKind {
    /// Balance does not cover the transfer.
    InsufficientFunds,
    /// The wallet is locked, or the passphrase was wrong.
    Locked,
    /// The daemon rejected the amount.
    InvalidAmount,
    /// Anything else, including the daemon being unreachable.
    Other,
}

impl fmt::Display for WalletErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WalletErrorKind::InsufficientFunds => "insufficient funds",
            WalletErrorKind::Locked => "locked",
            WalletErrorKind::InvalidAmount => "invalid amount",
            WalletErrorKind::Other => "other",
        };
        f.write_str(s)
    }
}

/// A wallet failure. Displays as the daemon's own message, which is what
/// ends up in the conversation.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct WalletError {
    pub kind: WalletErrorKind,
    pub message: String,
}

impl WalletError {
    pub fn new(kind: WalletErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(WalletErrorKind::Other, message)
    }
}

// ---------------------------------------------------------------------------
// Snapshots
// ---------------------------------------------------------------------------

/// Balance breakdown shown by `/balance`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Balances {
    pub confirmed: f64,
    pub unlocked: f64,
    pub unconfirmed: f64,
}

/// Chain height and connectivity shown by `/blocks` and `/peers`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainStatus {
    pub blocks: u64,
    pub peers: u32,
}

// ---------------------------------------------------------------------------
// The Port
// ---------------------------------------------------------------------------

/// Wallet operations for one coin.
#[async_trait]
pub trait Wallet: Send + Sync {
    /// Spendable balance.
    async fn unlocked_balance(&self) -> Result<f64, WalletError>;

    /// Confirmed, unlocked and unconfirmed balances.
    async fn balances(&self) -> Result<Balances, WalletError>;

    async fn is_locked(&self) -> Result<bool, WalletError>;

    /// Unlocks for `seconds`. A wrong passphrase is an error of kind
    /// [`WalletErrorKind::Locked`].
    async fn unlock(&self, passphrase: &str, seconds: u64) -> Result<(), WalletError>;

    async fn new_receiving_address(&self) -> Result<String, WalletError>;

    /// Sends `amount` to `address` and returns the transaction id.
    async fn transfer(&self, address: &str, amount: f64, memo: &str) -> Result<String, WalletError>;

    async fn chain_status(&self) -> Result<ChainStatus, WalletError>;
}

/// Formats an amount the way it goes on the wire and into log lines.
pub fn format_amount(amount: f64) -> String {
    format!("{:.*}", crate::config::AMOUNT_DECIMALS, amount)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amounts_use_six_decimals() {
        assert_eq!(format_amount(1.5), "1.500000");
        assert_eq!(format_amount(0.0000004), "0.000000");
        assert_eq!(format_amount(12.0), "12.000000");
    }

    #[test]
    fn error_displays_message_only() {
        let e = WalletError::new(WalletErrorKind::Locked, "Error: Please enter the wallet passphrase");
        assert_eq!(e.to_string(), "Error: Please enter the wallet passphrase");
        assert_eq!(e.kind.to_string(), "locked");
    }
}
