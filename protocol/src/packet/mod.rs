//! # Packet Codec
//!
//! The envelope every conversation message travels in, the closed method
//! table, and the encoding used on the daemon's packet buffer.
//!
//! ```text
//!   {"ver":1,"sid":1,"rid":1,"to":"<tag>","from":"<tag>","meth":"chatMsg",
//!    "data":{"uuid":"...","cmmd":"add","text":"hello"}}
//!         │
//!         ▼  JSON text ──► bytes ──► hex (buffer entry)
//! ```
//!
//! `rid` is left off the wire when it is zero; a packet without `rid` is
//! answered on its `sid`.

pub mod codec;
pub mod method;
pub mod payload;

use thiserror::Error;

pub use codec::{decode, decode_hex, encode, encode_hex};
pub use method::Method;
pub use payload::{
    AddrReq, AddrRes, ChatAck, ChatCommand, ChatMsg, NameQuery, NameRes, Payload, SwapInf,
    SwapReq, SwapRes, TxidInf,
};

use crate::config;
use crate::transport::RoutingTag;

// ---------------------------------------------------------------------------
// Decode Errors
// ---------------------------------------------------------------------------

/// Why an inbound packet was rejected. All of these are protocol violations:
/// the packet is logged and dropped.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DecodeError {
    /// Not valid UTF-8 JSON, or the envelope is missing a field.
    #[error("malformed packet: {0}")]
    Malformed(String),

    /// The buffer entry was not valid hex.
    #[error("bad hex framing: {0}")]
    Hex(String),

    /// `meth` is not in the method table.
    #[error("unknown method {0:?}")]
    UnknownMethod(String),

    /// `data` is not a JSON object.
    #[error("{0} data is not an object")]
    DataNotObject(Method),

    /// A key from the method table is absent.
    #[error("{method} data is missing required key {key:?}")]
    MissingKey {
        /// Method being decoded.
        method: Method,
        /// The absent key.
        key: &'static str,
    },

    /// A required key is present but holds the wrong kind of value.
    #[error("{method} data has an invalid field: {reason}")]
    InvalidField {
        /// Method being decoded.
        method: Method,
        /// serde's description of the mismatch.
        reason: String,
    },
}

// ---------------------------------------------------------------------------
// Packet
// ---------------------------------------------------------------------------

/// One protocol message. Immutable once built.
#[derive(Clone, Debug, PartialEq)]
pub struct Packet {
    /// Protocol version, derived from the channel.
    pub ver: u32,
    /// Channel the sender sent on.
    pub sid: u32,
    /// Channel to reply on. Zero means "reply on `sid`".
    pub rid: u32,
    /// Recipient routing tag.
    pub to: RoutingTag,
    /// Sender routing tag.
    pub from: RoutingTag,
    /// Method-specific body.
    pub payload: Payload,
}

impl Packet {
    /// Builds a packet on `channel` with no separate reply channel.
    pub fn new(channel: u32, to: RoutingTag, from: RoutingTag, payload: Payload) -> Self {
        Self {
            ver: config::protocol_version(channel),
            sid: channel,
            rid: 0,
            to,
            from,
            payload,
        }
    }

    /// Sets an explicit reply channel.
    pub fn with_reply_channel(mut self, rid: u32) -> Self {
        self.rid = rid;
        self
    }

    /// The packet's method.
    pub fn method(&self) -> Method {
        self.payload.method()
    }

    /// Channel a response to this packet should go out on.
    pub fn reply_channel(&self) -> u32 {
        if self.rid == 0 {
            self.sid
        } else {
            self.rid
        }
    }
}
