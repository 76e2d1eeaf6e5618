//! JSON and hex encoding of [`Packet`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{DecodeError, Method, Packet, Payload};
use crate::transport::RoutingTag;

#[derive(Serialize)]
struct WireOut<'a> {
    ver: u32,
    sid: u32,
    #[serde(skip_serializing_if = "is_zero")]
    rid: u32,
    to: &'a str,
    from: &'a str,
    meth: Method,
    data: Value,
}

#[derive(Deserialize)]
struct WireIn {
    ver: u32,
    sid: u32,
    #[serde(default)]
    rid: Option<u32>,
    to: String,
    from: String,
    meth: String,
    data: Value,
}

fn is_zero(v: &u32) -> bool {
    *v == 0
}

/// Encodes a packet as JSON text bytes.
///
/// # Panics
///
/// Panics if the serialized `data` lacks a key from the method table. That
/// can only happen through a payload definition drifting from the table, and
/// sending such a packet would just get it dropped by the peer.
pub fn encode(packet: &Packet) -> Vec<u8> {
    let method = packet.method();
    let data = packet.payload.to_value();
    for key in method.required_keys() {
        assert!(
            data.get(key).is_some(),
            "{method} payload serialized without required key {key:?}"
        );
    }

    let wire = WireOut {
        ver: packet.ver,
        sid: packet.sid,
        rid: packet.rid,
        to: packet.to.as_str(),
        from: packet.from.as_str(),
        meth: method,
        data,
    };
    // A struct of integers, strings and a Value cannot fail to serialize.
    serde_json::to_vec(&wire).unwrap_or_default()
}

/// Decodes JSON text bytes into a packet.
///
/// A missing `rid` decodes as zero, which [`Packet::reply_channel`] reads
/// as "reply on `sid`".
pub fn decode(bytes: &[u8]) -> Result<Packet, DecodeError> {
    let wire: WireIn =
        serde_json::from_slice(bytes).map_err(|e| DecodeError::Malformed(e.to_string()))?;

    let method =
        Method::from_wire(&wire.meth).ok_or_else(|| DecodeError::UnknownMethod(wire.meth.clone()))?;

    let object = wire
        .data
        .as_object()
        .ok_or(DecodeError::DataNotObject(method))?;
    if let Some(key) = method
        .required_keys()
        .iter()
        .find(|key| !object.contains_key(**key))
    {
        return Err(DecodeError::MissingKey { method, key: *key });
    }

    let payload = Payload::from_value(method, wire.data)?;

    Ok(Packet {
        ver: wire.ver,
        sid: wire.sid,
        rid: wire.rid.unwrap_or(0),
        to: RoutingTag::new(wire.to),
        from: RoutingTag::new(wire.from),
        payload,
    })
}

/// Encodes a packet the way buffer entries are framed: hex of the JSON text.
pub fn encode_hex(packet: &Packet) -> String {
    hex::encode(encode(packet))
}

/// Decodes a hex buffer entry.
pub fn decode_hex(entry: &str) -> Result<Packet, DecodeError> {
    let bytes = hex::decode(entry.trim()).map_err(|e| DecodeError::Hex(e.to_string()))?;
    decode(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::*;
    use serde_json::json;

    fn tag(s: &str) -> RoutingTag {
        RoutingTag::new(s)
    }

    fn sample(payload: Payload) -> Packet {
        Packet::new(1, tag("peer"), tag("me"), payload)
    }

    fn every_payload() -> Vec<Payload> {
        vec![
            Payload::ChatMsg(ChatMsg {
                uuid: "u1".into(),
                command: ChatCommand::Add,
                text: "hello \u{1F44B}".into(),
            }),
            Payload::ChatAck(ChatAck {
                uuid: "u1".into(),
                command: ChatCommand::Delete,
                able: false,
            }),
            Payload::AddrReq(AddrReq {
                uuid: "u2".into(),
                coin: "ecc".into(),
                address_type: "P2PKH".into(),
            }),
            Payload::AddrRes(AddrRes {
                uuid: "u2".into(),
                coin: "ecc".into(),
                addr: "0".into(),
            }),
            Payload::TxidInf(TxidInf {
                uuid: "u2".into(),
                coin: "ecc".into(),
                amount: "1.500000".into(),
                addr: "EaddrX".into(),
                txid: "ab".repeat(32),
            }),
            Payload::SwapInf(SwapInf {
                uuid: "s".into(),
                coin_give: "ecc".into(),
                amount_give: 100.0,
                coin_take: "btc".into(),
                amount_take: 0.001,
            }),
            Payload::SwapReq(SwapReq {
                uuid: "s".into(),
                coin_give: "btc".into(),
                addr_give: "1abc".into(),
            }),
            Payload::SwapRes(SwapRes {
                uuid: "s".into(),
                coin_take: "ecc".into(),
                addr_take: "Eabc".into(),
            }),
            Payload::NameAdv(NameQuery {
                uuid: "n".into(),
                name: "alice".into(),
                name_type: "chat".into(),
            }),
            Payload::NameReq(NameQuery {
                uuid: "n".into(),
                name: "alice".into(),
                name_type: "chat".into(),
            }),
            Payload::NameRes(NameRes {
                uuid: "n".into(),
                name: "alice".into(),
                name_type: "chat".into(),
                tags: vec!["tagA".into(), "tagB".into()],
            }),
        ]
    }

    #[test]
    fn every_method_survives_the_wire() {
        let payloads = every_payload();
        assert_eq!(payloads.len(), Method::ALL.len());
        for payload in payloads {
            let packet = sample(payload).with_reply_channel(1);
            assert_eq!(decode(&encode(&packet)).unwrap(), packet);
            assert_eq!(decode_hex(&encode_hex(&packet)).unwrap(), packet);
        }
    }

    #[test]
    fn zero_rid_is_omitted_and_survives_the_wire() {
        let packet = sample(every_payload().remove(0));
        let text: Value = serde_json::from_slice(&encode(&packet)).unwrap();
        assert!(text.get("rid").is_none());
        assert_eq!(text["meth"], "chatMsg");

        let back = decode(&encode(&packet)).unwrap();
        assert_eq!(back, packet);
        assert_eq!(back.rid, 0);
        assert_eq!(back.reply_channel(), back.sid);
    }

    #[test]
    fn missing_required_key_is_rejected() {
        for method in Method::ALL {
            for missing in method.required_keys() {
                let mut data = serde_json::Map::new();
                for key in method.required_keys() {
                    if key != missing {
                        data.insert((*key).to_string(), json!("x"));
                    }
                }
                let raw = json!({
                    "ver": 1, "sid": 1, "to": "a", "from": "b",
                    "meth": method.as_str(), "data": data
                });
                let err = decode(raw.to_string().as_bytes()).unwrap_err();
                assert_eq!(
                    err,
                    DecodeError::MissingKey { method, key: *missing },
                    "{method} without {missing}"
                );
            }
        }
    }

    #[test]
    fn unknown_method_is_rejected() {
        let raw = r#"{"ver":1,"sid":1,"to":"a","from":"b","meth":"pingReq","data":{}}"#;
        assert_eq!(
            decode(raw.as_bytes()).unwrap_err(),
            DecodeError::UnknownMethod("pingReq".into())
        );
    }

    #[test]
    fn non_object_data_is_rejected() {
        let raw = r#"{"ver":1,"sid":1,"to":"a","from":"b","meth":"chatAck","data":"hi"}"#;
        assert_eq!(
            decode(raw.as_bytes()).unwrap_err(),
            DecodeError::DataNotObject(Method::ChatAck)
        );
    }

    #[test]
    fn wrong_field_type_is_rejected() {
        let raw = r#"{"ver":1,"sid":1,"to":"a","from":"b","meth":"chatAck",
                      "data":{"uuid":"u","cmmd":"add","able":"yes"}}"#;
        assert!(matches!(
            decode(raw.as_bytes()).unwrap_err(),
            DecodeError::InvalidField { method: Method::ChatAck, .. }
        ));
    }

    #[test]
    fn garbage_is_malformed() {
        assert!(matches!(decode(b"\xff\xfe"), Err(DecodeError::Malformed(_))));
        assert!(matches!(decode(b"{}"), Err(DecodeError::Malformed(_))));
        assert!(matches!(decode_hex("zz"), Err(DecodeError::Hex(_))));
    }
}
