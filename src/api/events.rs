//! socket.io packets in Engine.IO v4 text frames, default namespace only.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::api::models::Message;

pub const EVENT_JOIN: &str = "join";
pub const EVENT_NEW_MESSAGE: &str = "newMessage";

/// Engine.IO ping reply.
pub const PONG: &str = "3";
/// socket.io connect request for the default namespace.
pub const CONNECT: &str = "40";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handshake {
    pub sid: String,
    #[serde(default)]
    pub ping_interval: u64,
    #[serde(default)]
    pub ping_timeout: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomingEvent {
    pub name: String,
    pub args: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Open(Handshake),
    Close,
    Ping,
    Pong,
    Connected,
    ConnectError(String),
    Disconnected,
    Event(IncomingEvent),
    /// Anything else we do not act on (acks, binary packets, noop).
    Ignored,
}

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("empty frame")]
    Empty,
    #[error("unknown packet type {0:?}")]
    UnknownType(char),
    #[error("malformed payload: {0}")]
    Payload(#[from] serde_json::Error),
    #[error("event without a name")]
    Unnamed,
}

pub fn decode(text: &str) -> Result<Frame, FrameError> {
    let mut chars = text.chars();
    let kind = chars.next().ok_or(FrameError::Empty)?;
    let rest = chars.as_str();
    match kind {
        '0' => Ok(Frame::Open(serde_json::from_str(rest)?)),
        '1' => Ok(Frame::Close),
        '2' => Ok(Frame::Ping),
        '3' => Ok(Frame::Pong),
        '4' => decode_packet(rest),
        '5' | '6' => Ok(Frame::Ignored),
        other => Err(FrameError::UnknownType(other)),
    }
}

fn decode_packet(text: &str) -> Result<Frame, FrameError> {
    let mut chars = text.chars();
    let kind = chars.next().ok_or(FrameError::Empty)?;
    let body = strip_ack_id(strip_namespace(chars.as_str()));
    match kind {
        '0' => Ok(Frame::Connected),
        '1' => Ok(Frame::Disconnected),
        '2' => {
            let mut items: Vec<Value> = serde_json::from_str(body)?;
            if items.is_empty() {
                return Err(FrameError::Unnamed);
            }
            let Value::String(name) = items.remove(0) else {
                return Err(FrameError::Unnamed);
            };
            Ok(Frame::Event(IncomingEvent { name, args: items }))
        }
        '4' => {
            let reason = serde_json::from_str::<Value>(body)
                .ok()
                .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
                .unwrap_or_else(|| body.to_string());
            Ok(Frame::ConnectError(reason))
        }
        '3' | '5' | '6' => Ok(Frame::Ignored),
        other => Err(FrameError::UnknownType(other)),
    }
}

fn strip_namespace(s: &str) -> &str {
    if s.starts_with('/') {
        s.split_once(',').map_or("", |(_, rest)| rest)
    } else {
        s
    }
}

fn strip_ack_id(s: &str) -> &str {
    s.trim_start_matches(|c: char| c.is_ascii_digit())
}

/// `42["name", ...args]`
pub fn encode_event(name: &str, args: &[Value]) -> String {
    let mut items = Vec::with_capacity(args.len() + 1);
    items.push(Value::String(name.to_string()));
    items.extend_from_slice(args);
    format!("42{}", Value::Array(items))
}

pub fn join_frame(user_id: &str) -> String {
    encode_event(EVENT_JOIN, &[Value::String(user_id.to_string())])
}

impl IncomingEvent {
    /// The chat line carried by a `newMessage` event.
    pub fn new_message(&self) -> Option<Result<Message, serde_json::Error>> {
        if self.name != EVENT_NEW_MESSAGE {
            return None;
        }
        let payload = self.args.first().cloned().unwrap_or(Value::Null);
        Some(serde_json::from_value(payload))
    }
}
