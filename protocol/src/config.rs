//! # Protocol Configuration & Constants
//!
//! Every timeout, retry bound and wire constant the conversation layer relies
//! on lives here. Peers running different values still interoperate, but the
//! user-visible behaviour (how long a `/send` waits, how many passphrase
//! attempts are allowed) is defined by these numbers, so change them here and
//! nowhere else.

use std::time::Duration;

// ---------------------------------------------------------------------------
// Channels & Versions
// ---------------------------------------------------------------------------

/// Service id of the chat/payment/swap protocol on the packet buffer.
///
/// The daemon multiplexes many services over one buffer; a node only sees
/// packets addressed to channels it has registered.
pub const CHAT_CHANNEL: u32 = 1;

/// Service id used by the name resolution service.
pub const NAME_CHANNEL: u32 = 2;

/// Wire version stamped into every packet on [`CHAT_CHANNEL`].
pub const CHAT_PROTOCOL_VERSION: u32 = 1;

/// Wire version stamped into every packet on [`NAME_CHANNEL`].
pub const NAME_PROTOCOL_VERSION: u32 = 1;

/// Returns the wire version for a channel id. Unknown channels speak
/// version 1.
pub fn protocol_version(channel: u32) -> u32 {
    match channel {
        CHAT_CHANNEL => CHAT_PROTOCOL_VERSION,
        NAME_CHANNEL => NAME_PROTOCOL_VERSION,
        _ => 1,
    }
}

/// Crate version, shown by `/version`.
pub const PROTOCOL_VERSION: &str = env!("CARGO_PKG_VERSION");

// ---------------------------------------------------------------------------
// Handshake Timeouts
// ---------------------------------------------------------------------------

/// How long a `/send` waits for the peer's `addrRes` before giving up.
///
/// The buffer is polled, not pushed, so a healthy round trip takes a few
/// seconds. Ten is enough for a live peer and short enough that a user
/// staring at the prompt does not wonder whether anything happened.
pub const ADDRESS_RESPONSE_TIMEOUT: Duration = Duration::from_secs(10);

/// How long a swap proposal stays open waiting for `/execute`, and how long
/// the accepting side waits for each of the proposer's next steps.
pub const SWAP_PROPOSAL_TIMEOUT: Duration = Duration::from_secs(60);

/// How long the proposer waits for `swapRes` after `/execute`.
pub const SWAP_EXECUTE_TIMEOUT: Duration = Duration::from_secs(10);

// ---------------------------------------------------------------------------
// Wallet Interaction
// ---------------------------------------------------------------------------

/// Maximum passphrase attempts before a send gives up on a locked wallet.
pub const UNLOCK_RETRY_LIMIT: u32 = 3;

/// Seconds a wallet stays unlocked after a successful passphrase.
pub const UNLOCK_DURATION_SECS: u64 = 60;

/// Address type requested in `addrReq`.
pub const ADDRESS_TYPE: &str = "P2PKH";

/// Memo attached to every on-chain transfer the protocol makes.
pub const TRANSFER_MEMO: &str = "courier";

/// Decimal places used when an amount is put on the wire in `txidInf`.
pub const AMOUNT_DECIMALS: usize = 6;

// ---------------------------------------------------------------------------
// Wire Sentinels
// ---------------------------------------------------------------------------

/// Address value meaning "refused" in `addrRes` and `swapRes`.
pub const REFUSAL_SENTINEL: &str = "0";

/// Glyph a deleted chat message is overwritten with, one per character.
pub const REDACTION_GLYPH: char = '\u{2588}';

// ---------------------------------------------------------------------------
// Maintenance Cadence
// ---------------------------------------------------------------------------

/// Interval between buffer keep-alives.
///
/// The daemon drops a channel registration that has been idle for longer
/// than its own timeout, so this must stay comfortably below it.
pub const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(10);

/// Interval between chain status refreshes (block height, peer count).
pub const CHAIN_REFRESH_INTERVAL: Duration = Duration::from_secs(10);

/// Interval at which the front end polls the buffer when the daemon offers
/// no push notification.
pub const BUFFER_POLL_INTERVAL: Duration = Duration::from_millis(500);

// ---------------------------------------------------------------------------
// Echo Service
// ---------------------------------------------------------------------------

/// Prefix the echo responder puts in front of every echoed message.
pub const ECHO_PREFIX: &str = "echo: ";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_timeout_is_shorter_than_swap_window() {
        assert!(ADDRESS_RESPONSE_TIMEOUT < SWAP_PROPOSAL_TIMEOUT);
        assert!(SWAP_EXECUTE_TIMEOUT <= SWAP_PROPOSAL_TIMEOUT);
    }

    #[test]
    fn unknown_channel_defaults_to_version_one() {
        assert_eq!(protocol_version(CHAT_CHANNEL), CHAT_PROTOCOL_VERSION);
        assert_eq!(protocol_version(99), 1);
    }
}
