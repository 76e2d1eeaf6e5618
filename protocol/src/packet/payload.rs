//! Typed `data` objects, one per method.
//!
//! Field names are the readable Rust names; the serde renames carry the
//! four-letter wire keys from the method table. Unknown keys are ignored on
//! decode so that newer peers can add fields without breaking older ones.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::method::Method;
use super::DecodeError;

// ---------------------------------------------------------------------------
// Chat
// ---------------------------------------------------------------------------

/// Chat operation carried by `chatMsg` and echoed in `chatAck`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatCommand {
    /// Append a new message.
    Add,
    /// Rewrite the text of an existing message.
    Replace,
    /// Redact an existing message.
    Delete,
}

/// `chatMsg` body.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatMsg {
    pub uuid: String,
    #[serde(rename = "cmmd")]
    pub command: ChatCommand,
    pub text: String,
}

/// `chatAck` body. `able` is false when the receiver could not display the
/// message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatAck {
    pub uuid: String,
    #[serde(rename = "cmmd")]
    pub command: ChatCommand,
    pub able: bool,
}

// ---------------------------------------------------------------------------
// Payments
// ---------------------------------------------------------------------------

/// `addrReq` body.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AddrReq {
    pub uuid: String,
    pub coin: String,
    #[serde(rename = "type")]
    pub address_type: String,
}

/// `addrRes` body. `addr` is the refusal sentinel when the peer declines.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AddrRes {
    pub uuid: String,
    pub coin: String,
    pub addr: String,
}

/// `txidInf` body. `amnt` is a fixed-point decimal string.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TxidInf {
    pub uuid: String,
    pub coin: String,
    #[serde(rename = "amnt")]
    pub amount: String,
    pub addr: String,
    pub txid: String,
}

// ---------------------------------------------------------------------------
// Swaps
// ---------------------------------------------------------------------------

/// `swapInf` body, give/take from the proposer's point of view.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SwapInf {
    pub uuid: String,
    #[serde(rename = "cogv")]
    pub coin_give: String,
    #[serde(rename = "amgv", deserialize_with = "lenient_amount")]
    pub amount_give: f64,
    #[serde(rename = "cotk")]
    pub coin_take: String,
    #[serde(rename = "amtk", deserialize_with = "lenient_amount")]
    pub amount_take: f64,
}

/// `swapReq` body: the coin the acceptor gives and where to send it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SwapReq {
    pub uuid: String,
    #[serde(rename = "cogv")]
    pub coin_give: String,
    #[serde(rename = "adgv")]
    pub addr_give: String,
}

/// `swapRes` body: the coin the proposer gives and where to send it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SwapRes {
    pub uuid: String,
    #[serde(rename = "cotk")]
    pub coin_take: String,
    #[serde(rename = "adtk")]
    pub addr_take: String,
}

// ---------------------------------------------------------------------------
// Names
// ---------------------------------------------------------------------------

/// `nameAdv` and `nameReq` body.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NameQuery {
    pub uuid: String,
    pub name: String,
    #[serde(rename = "type")]
    pub name_type: String,
}

/// `nameRes` body.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NameRes {
    pub uuid: String,
    pub name: String,
    #[serde(rename = "type")]
    pub name_type: String,
    pub tags: Vec<String>,
}

/// Accepts an amount as a JSON number or a numeric string.
fn lenient_amount<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Amount {
        Number(f64),
        Text(String),
    }

    match Amount::deserialize(deserializer)? {
        Amount::Number(n) => Ok(n),
        Amount::Text(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| serde::de::Error::custom(format!("amount is not a number: {s:?}"))),
    }
}

// ---------------------------------------------------------------------------
// Payload
// ---------------------------------------------------------------------------

/// A packet body, tagged by method.
#[derive(Clone, Debug, PartialEq)]
pub enum Payload {
    ChatMsg(ChatMsg),
    ChatAck(ChatAck),
    AddrReq(AddrReq),
    AddrRes(AddrRes),
    TxidInf(TxidInf),
    SwapInf(SwapInf),
    SwapReq(SwapReq),
    SwapRes(SwapRes),
    NameAdv(NameQuery),
    NameReq(NameQuery),
    NameRes(NameRes),
}

impl Payload {
    /// The method this payload is sent under.
    pub fn method(&self) -> Method {
        match self {
            Payload::ChatMsg(_) => Method::ChatMsg,
            Payload::ChatAck(_) => Method::ChatAck,
            Payload::AddrReq(_) => Method::AddrReq,
            Payload::AddrRes(_) => Method::AddrRes,
            Payload::TxidInf(_) => Method::TxidInf,
            Payload::SwapInf(_) => Method::SwapInf,
            Payload::SwapReq(_) => Method::SwapReq,
            Payload::SwapRes(_) => Method::SwapRes,
            Payload::NameAdv(_) => Method::NameAdv,
            Payload::NameReq(_) => Method::NameReq,
            Payload::NameRes(_) => Method::NameRes,
        }
    }

    /// Correlation id of the payload.
    pub fn uuid(&self) -> &str {
        match self {
            Payload::ChatMsg(p) => &p.uuid,
            Payload::ChatAck(p) => &p.uuid,
            Payload::AddrReq(p) => &p.uuid,
            Payload::AddrRes(p) => &p.uuid,
            Payload::TxidInf(p) => &p.uuid,
            Payload::SwapInf(p) => &p.uuid,
            Payload::SwapReq(p) => &p.uuid,
            Payload::SwapRes(p) => &p.uuid,
            Payload::NameAdv(p) | Payload::NameReq(p) => &p.uuid,
            Payload::NameRes(p) => &p.uuid,
        }
    }

    /// Serializes the body into its `data` object.
    pub fn to_value(&self) -> Value {
        let value = match self {
            Payload::ChatMsg(p) => serde_json::to_value(p),
            Payload::ChatAck(p) => serde_json::to_value(p),
            Payload::AddrReq(p) => serde_json::to_value(p),
            Payload::AddrRes(p) => serde_json::to_value(p),
            Payload::TxidInf(p) => serde_json::to_value(p),
            Payload::SwapInf(p) => serde_json::to_value(p),
            Payload::SwapReq(p) => serde_json::to_value(p),
            Payload::SwapRes(p) => serde_json::to_value(p),
            Payload::NameAdv(p) | Payload::NameReq(p) => serde_json::to_value(p),
            Payload::NameRes(p) => serde_json::to_value(p),
        };
        // Plain structs of strings, bools and numbers never fail to serialize.
        value.unwrap_or_else(|e| panic!("{} payload failed to serialize: {e}", self.method()))
    }

    /// Parses a `data` object for `method`. The object is assumed to have
    /// passed the required-key check already.
    pub fn from_value(method: Method, data: Value) -> Result<Payload, DecodeError> {
        let invalid = |e: serde_json::Error| DecodeError::InvalidField {
            method,
            reason: e.to_string(),
        };
        Ok(match method {
            Method::ChatMsg => Payload::ChatMsg(serde_json::from_value(data).map_err(invalid)?),
            Method::ChatAck => Payload::ChatAck(serde_json::from_value(data).map_err(invalid)?),
            Method::AddrReq => Payload::AddrReq(serde_json::from_value(data).map_err(invalid)?),
            Method::AddrRes => Payload::AddrRes(serde_json::from_value(data).map_err(invalid)?),
            Method::TxidInf => Payload::TxidInf(serde_json::from_value(data).map_err(invalid)?),
            Method::SwapInf => Payload::SwapInf(serde_json::from_value(data).map_err(invalid)?),
            Method::SwapReq => Payload::SwapReq(serde_json::from_value(data).map_err(invalid)?),
            Method::SwapRes => Payload::SwapRes(serde_json::from_value(data).map_err(invalid)?),
            Method::NameAdv => Payload::NameAdv(serde_json::from_value(data).map_err(invalid)?),
            Method::NameReq => Payload::NameReq(serde_json::from_value(data).map_err(invalid)?),
            Method::NameRes => Payload::NameRes(serde_json::from_value(data).map_err(invalid)?),
        })
    }
}
