//! The closed method table.
//!
//! Every packet carries exactly one of these methods, and every method has a
//! fixed set of keys its `data` object must contain. The table is the schema
//! both peers agree on; anything outside it is a protocol violation.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Packet method. Serialized with the wire spelling (`chatMsg`, ...).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Method {
    /// Chat content operation (add, replace, delete).
    #[serde(rename = "chatMsg")]
    ChatMsg,
    /// Acknowledgement of a chat operation.
    #[serde(rename = "chatAck")]
    ChatAck,
    /// Request for a receiving address.
    #[serde(rename = "addrReq")]
    AddrReq,
    /// Receiving address, or the refusal sentinel.
    #[serde(rename = "addrRes")]
    AddrRes,
    /// Notice of a completed on-chain transfer.
    #[serde(rename = "txidInf")]
    TxidInf,
    /// Swap proposal.
    #[serde(rename = "swapInf")]
    SwapInf,
    /// Swap execution: proposer's receiving address.
    #[serde(rename = "swapReq")]
    SwapReq,
    /// Swap execution: acceptor's receiving address, or refusal.
    #[serde(rename = "swapRes")]
    SwapRes,
    /// Name advertisement.
    #[serde(rename = "nameAdv")]
    NameAdv,
    /// Name lookup.
    #[serde(rename = "nameReq")]
    NameReq,
    /// Name lookup result.
    #[serde(rename = "nameRes")]
    NameRes,
}

impl Method {
    /// Every method, in table order.
    pub const ALL: [Method; 11] = [
        Method::ChatMsg,
        Method::ChatAck,
        Method::AddrReq,
        Method::AddrRes,
        Method::TxidInf,
        Method::SwapInf,
        Method::SwapReq,
        Method::SwapRes,
        Method::NameAdv,
        Method::NameReq,
        Method::NameRes,
    ];

    /// Wire spelling of the method.
    pub fn as_str(self) -> &'static str {
        match self {
            Method::ChatMsg => "chatMsg",
            Method::ChatAck => "chatAck",
            Method::AddrReq => "addrReq",
            Method::AddrRes => "addrRes",
            Method::TxidInf => "txidInf",
            Method::SwapInf => "swapInf",
            Method::SwapReq => "swapReq",
            Method::SwapRes => "swapRes",
            Method::NameAdv => "nameAdv",
            Method::NameReq => "nameReq",
            Method::NameRes => "nameRes",
        }
    }

    /// Looks a method up by its wire spelling. Case-sensitive.
    pub fn from_wire(s: &str) -> Option<Method> {
        Method::ALL.into_iter().find(|m| m.as_str() == s)
    }

    /// Keys the `data` object must contain for this method.
    pub fn required_keys(self) -> &'static [&'static str] {
        match self {
            Method::ChatMsg => &["uuid", "cmmd", "text"],
            Method::ChatAck => &["uuid", "cmmd", "able"],
            Method::AddrReq => &["uuid", "coin", "type"],
            Method::AddrRes => &["uuid", "coin", "addr"],
            Method::TxidInf => &["uuid", "coin", "amnt", "addr", "txid"],
            Method::SwapInf => &["uuid", "cogv", "amgv", "cotk", "amtk"],
            Method::SwapReq => &["uuid", "cogv", "adgv"],
            Method::SwapRes => &["uuid", "cotk", "adtk"],
            Method::NameAdv | Method::NameReq => &["uuid", "name", "type"],
            Method::NameRes => &["uuid", "name", "type", "tags"],
        }
    }

    /// Whether handling this method may make us reply or move funds, which
    /// means a return route to the sender has to exist first.
    pub fn needs_return_route(self) -> bool {
        matches!(
            self,
            Method::ChatMsg
                | Method::AddrReq
                | Method::AddrRes
                | Method::TxidInf
                | Method::SwapReq
                | Method::SwapRes
        )
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names_match_serde() {
        for m in Method::ALL {
            let json = serde_json::to_string(&m).unwrap();
            assert_eq!(json, format!("\"{}\"", m.as_str()));
            assert_eq!(Method::from_wire(m.as_str()), Some(m));
        }
    }

    #[test]
    fn lookup_is_case_sensitive() {
        assert_eq!(Method::from_wire("chatmsg"), None);
        assert_eq!(Method::from_wire(""), None);
    }

    #[test]
    fn every_method_requires_uuid() {
        for m in Method::ALL {
            assert_eq!(m.required_keys()[0], "uuid", "{m}");
        }
    }

    #[test]
    fn only_reply_causing_methods_need_routes() {
        assert!(Method::ChatMsg.needs_return_route());
        assert!(Method::TxidInf.needs_return_route());
        assert!(!Method::ChatAck.needs_return_route());
        assert!(!Method::SwapInf.needs_return_route());
        assert!(!Method::NameRes.needs_return_route());
    }
}
