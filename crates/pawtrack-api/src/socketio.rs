//! Engine.IO v4 / Socket.IO v5 text framing.
//!
//! The push server speaks Socket.IO. Over the websocket transport every
//! text frame is one Engine.IO packet whose first character is the packet
//! type; a `4` (message) wraps one Socket.IO packet with its own type
//! digit, optional namespace, optional ack id, and a JSON payload:
//!
//! ```text
//! 0{"sid":"abc","pingInterval":25000,"pingTimeout":20000}   open
//! 2                                                         ping
//! 40{"sid":"def"}                                           namespace connect ack
//! 42["sensor-update",{"heartRate":88,...}]                  event
//! ```
//!
//! Only the default namespace and text (non-binary) packets are handled.

use serde::Deserialize;
use serde_json::Value;

use crate::error::Error;

/// Client → server: answer to an Engine.IO ping.
pub const PONG: &str = "3";

/// Engine.IO open handshake payload.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenPayload {
    pub sid: String,
    #[serde(default = "default_ping_interval")]
    pub ping_interval: u64,
    #[serde(default = "default_ping_timeout")]
    pub ping_timeout: u64,
}

fn default_ping_interval() -> u64 {
    25_000
}
fn default_ping_timeout() -> u64 {
    20_000
}

/// One decoded Engine.IO packet.
#[derive(Debug, Clone, PartialEq)]
pub enum EnginePacket {
    Open(OpenPayload),
    Close,
    Ping,
    Pong,
    Message(SocketPacket),
    Upgrade,
    Noop,
}

/// One decoded Socket.IO packet (default namespace only).
#[derive(Debug, Clone, PartialEq)]
pub enum SocketPacket {
    /// Namespace connect. From the server this is the handshake ack.
    Connect(Option<Value>),
    Disconnect,
    Event { name: String, args: Vec<Value> },
    ConnectError(Value),
    /// Acks and binary packets; carried as the type digit only.
    Other(u8),
}

// ── Decoding ─────────────────────────────────────────────────────────

/// Decode one websocket text frame.
pub fn decode(frame: &str) -> Result<EnginePacket, Error> {
    let mut chars = frame.chars();
    let kind = chars
        .next()
        .ok_or_else(|| Error::Protocol("empty frame".into()))?;
    let rest = chars.as_str();

    match kind {
        '0' => serde_json::from_str(rest)
            .map(EnginePacket::Open)
            .map_err(|e| Error::Protocol(format!("bad open payload: {e}"))),
        '1' => Ok(EnginePacket::Close),
        '2' => Ok(EnginePacket::Ping),
        '3' => Ok(EnginePacket::Pong),
        '4' => decode_socket(rest).map(EnginePacket::Message),
        '5' => Ok(EnginePacket::Upgrade),
        '6' => Ok(EnginePacket::Noop),
        other => Err(Error::Protocol(format!("unknown engine packet type '{other}'"))),
    }
}

fn decode_socket(packet: &str) -> Result<SocketPacket, Error> {
    let mut chars = packet.chars();
    let kind = chars
        .next()
        .and_then(|c| c.to_digit(10))
        .ok_or_else(|| Error::Protocol(format!("bad socket packet: {packet:?}")))?;
    let mut rest = chars.as_str();

    // Namespace prefix "/name," is skipped; the client only joins "/".
    if rest.starts_with('/') {
        rest = rest.split_once(',').map_or("", |(_, tail)| tail);
    }

    // Ack id: leading digits before the payload.
    let payload_start = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
    let payload = &rest[payload_start..];

    let json = if payload.is_empty() {
        None
    } else {
        Some(
            serde_json::from_str::<Value>(payload)
                .map_err(|e| Error::Protocol(format!("bad socket payload: {e}")))?,
        )
    };

    match kind {
        0 => Ok(SocketPacket::Connect(json)),
        1 => Ok(SocketPacket::Disconnect),
        2 => decode_event(json),
        4 => Ok(SocketPacket::ConnectError(json.unwrap_or(Value::Null))),
        // Digits are 0-9, so the narrowing cast cannot truncate.
        #[allow(clippy::cast_possible_truncation, clippy::as_conversions)]
        other => Ok(SocketPacket::Other(other as u8)),
    }
}

fn decode_event(json: Option<Value>) -> Result<SocketPacket, Error> {
    let Some(Value::Array(mut items)) = json else {
        return Err(Error::Protocol("event payload is not an array".into()));
    };
    if items.is_empty() {
        return Err(Error::Protocol("event payload is empty".into()));
    }
    let Value::String(name) = items.remove(0) else {
        return Err(Error::Protocol("event name is not a string".into()));
    };
    Ok(SocketPacket::Event { name, args: items })
}

// ── Encoding ─────────────────────────────────────────────────────────

/// Default-namespace connect request, optionally carrying an auth object.
pub fn encode_connect(auth: Option<&Value>) -> String {
    match auth {
        Some(a) => format!("40{a}"),
        None => "40".to_owned(),
    }
}

/// Default-namespace event emission: `42["name", ...args]`.
pub fn encode_event(name: &str, args: &[Value]) -> String {
    let mut items = Vec::with_capacity(args.len() + 1);
    items.push(Value::String(name.to_owned()));
    items.extend(args.iter().cloned());
    format!("42{}", Value::Array(items))
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn decodes_open_handshake() {
        let pkt = decode(r#"0{"sid":"abc","upgrades":[],"pingInterval":25000,"pingTimeout":20000,"maxPayload":1000000}"#)
            .unwrap();
        assert_eq!(
            pkt,
            EnginePacket::Open(OpenPayload {
                sid: "abc".into(),
                ping_interval: 25_000,
                ping_timeout: 20_000,
            })
        );
    }

    #[test]
    fn decodes_connect_ack() {
        let pkt = decode(r#"40{"sid":"xyz"}"#).unwrap();
        assert_eq!(
            pkt,
            EnginePacket::Message(SocketPacket::Connect(Some(json!({"sid": "xyz"}))))
        );
    }

    #[test]
    fn decodes_event_with_ack_id() {
        let pkt = decode(r#"4212["location-update",{"latitude":6.25}]"#).unwrap();
        assert_eq!(
            pkt,
            EnginePacket::Message(SocketPacket::Event {
                name: "location-update".into(),
                args: vec![json!({"latitude": 6.25})],
            })
        );
    }

    #[test]
    fn decodes_event_in_namespace() {
        let pkt = decode(r#"42/admin,["notification",{"id":"n1"}]"#).unwrap();
        let EnginePacket::Message(SocketPacket::Event { name, .. }) = pkt else {
            panic!("expected event, got {pkt:?}");
        };
        assert_eq!(name, "notification");
    }

    #[test]
    fn decodes_ping_and_disconnect() {
        assert_eq!(decode("2").unwrap(), EnginePacket::Ping);
        assert_eq!(decode("41").unwrap(), EnginePacket::Message(SocketPacket::Disconnect));
        assert_eq!(decode("1").unwrap(), EnginePacket::Close);
    }

    #[test]
    fn rejects_garbage() {
        assert!(decode("").is_err());
        assert!(decode("9hello").is_err());
        assert!(decode("42{\"not\":\"array\"}").is_err());
        assert!(decode("42[1,2]").is_err());
    }

    #[test]
    fn encodes_join_room() {
        assert_eq!(
            encode_event("join-pet-room", &[json!("P1")]),
            r#"42["join-pet-room","P1"]"#
        );
        assert_eq!(encode_connect(None), "40");
        assert_eq!(encode_connect(Some(&json!({"token": "t"}))), r#"40{"token":"t"}"#);
    }
}
