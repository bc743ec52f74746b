//! Text framing for the push channel: Socket.IO v5 packets carried in Engine.IO v4 packets.

use crate::model::{LogEntry, PushEvent};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

pub const DEFAULT_NAMESPACE: &str = "/";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    #[error("empty frame")]
    Empty,
    #[error("unknown packet type {0:?}")]
    UnknownType(char),
    #[error("invalid JSON payload: {0}")]
    BadJson(String),
    #[error("event packet without a name")]
    NotAnEvent,
}

/// Engine.IO handshake sent by the server right after the WebSocket opens.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handshake {
    pub sid: String,
    #[serde(default)]
    pub ping_interval: u64,
    #[serde(default)]
    pub ping_timeout: u64,
}

impl Handshake {
    /// How long the server may stay silent before the connection counts as dead:
    /// one ping interval plus the ping timeout. `None` when the server announced neither.
    pub fn liveness_window(&self) -> Option<Duration> {
        match self.ping_interval.saturating_add(self.ping_timeout) {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EnginePacket {
    Open(Handshake),
    Close,
    Ping(String),
    Pong(String),
    Message(SocketPacket),
    Upgrade,
    Noop,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SocketPacket {
    Connect {
        namespace: String,
        data: Option<Value>,
    },
    Disconnect {
        namespace: String,
    },
    Event {
        namespace: String,
        ack_id: Option<u64>,
        name: String,
        data: Value,
    },
    ConnectError {
        namespace: String,
        data: Value,
    },
    /// Acks and binary packets; the panel never asks for either.
    Other {
        kind: u8,
    },
}

pub fn decode(text: &str) -> Result<EnginePacket, FrameError> {
    let kind = text.chars().next().ok_or(FrameError::Empty)?;
    let body = &text[kind.len_utf8()..];
    match kind {
        '0' => serde_json::from_str(body)
            .map(EnginePacket::Open)
            .map_err(|e| FrameError::BadJson(e.to_string())),
        '1' => Ok(EnginePacket::Close),
        '2' => Ok(EnginePacket::Ping(body.to_string())),
        '3' => Ok(EnginePacket::Pong(body.to_string())),
        '4' => decode_socket(body).map(EnginePacket::Message),
        '5' => Ok(EnginePacket::Upgrade),
        '6' => Ok(EnginePacket::Noop),
        other => Err(FrameError::UnknownType(other)),
    }
}

fn decode_socket(body: &str) -> Result<SocketPacket, FrameError> {
    let kind_char = body.chars().next().ok_or(FrameError::Empty)?;
    let kind = kind_char
        .to_digit(10)
        .ok_or(FrameError::UnknownType(kind_char))? as u8;
    let mut rest = &body[kind_char.len_utf8()..];

    // Binary packets prefix the attachment count: `51-[...]`.
    if matches!(kind, 5 | 6) {
        if let Some(idx) = rest.find('-') {
            rest = &rest[idx + 1..];
        }
    }

    let namespace = if rest.starts_with('/') {
        match rest.find(',') {
            Some(idx) => {
                let ns = rest[..idx].to_string();
                rest = &rest[idx + 1..];
                ns
            }
            None => {
                let ns = rest.to_string();
                rest = "";
                ns
            }
        }
    } else {
        DEFAULT_NAMESPACE.to_string()
    };

    let digits = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    let ack_id = rest[..digits].parse().ok();
    rest = &rest[digits..];

    let data = if rest.is_empty() {
        None
    } else {
        Some(serde_json::from_str::<Value>(rest).map_err(|e| FrameError::BadJson(e.to_string()))?)
    };

    Ok(match kind {
        0 => SocketPacket::Connect { namespace, data },
        1 => SocketPacket::Disconnect { namespace },
        2 => {
            let mut items = match data {
                Some(Value::Array(items)) => items.into_iter(),
                _ => return Err(FrameError::NotAnEvent),
            };
            let name = match items.next() {
                Some(Value::String(name)) => name,
                _ => return Err(FrameError::NotAnEvent),
            };
            SocketPacket::Event {
                namespace,
                ack_id,
                name,
                data: items.next().unwrap_or(Value::Null),
            }
        }
        4 => SocketPacket::ConnectError {
            namespace,
            data: data.unwrap_or(Value::Null),
        },
        other => SocketPacket::Other { kind: other },
    })
}

/// Socket.IO namespace connect, sent after the Engine.IO handshake.
pub fn encode_connect(namespace: &str) -> String {
    if namespace == DEFAULT_NAMESPACE {
        "40".to_string()
    } else {
        format!("40{namespace},")
    }
}

pub fn encode_pong(payload: &str) -> String {
    format!("3{payload}")
}

/// Map a Socket.IO event onto a panel notification. Unknown events yield `None`.
pub fn to_push_event(name: &str, data: &Value) -> Option<PushEvent> {
    match name {
        "bot_log" => serde_json::from_value::<LogEntry>(data.clone())
            .ok()
            .map(PushEvent::Log),
        "bot_finished" => Some(PushEvent::Finished {
            run_id: data.get("run_id").and_then(Value::as_u64),
            success: data.get("success").and_then(Value::as_bool),
        }),
        _ => None,
    }
}
