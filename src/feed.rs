//! Real-time channel from the analysis server.
//!
//! The server speaks Socket.IO over an Engine.IO v4 websocket. Text frames
//! start with the Engine.IO packet type (`0` open, `2` ping, `4` message);
//! Socket.IO events ride inside messages as `42["<name>", {...}]`. Only
//! events on the default namespace are decoded; anything else is dropped.

use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

use crate::assessment::AssessmentResult;
use crate::logging::{log, obj, v_str, Domain, Level};

/// Socket.IO CONNECT for the default namespace.
const CONNECT_PACKET: &str = "40";
const PONG_PACKET: &str = "3";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ChannelEvent {
    Connected {
        #[serde(default)]
        message: String,
    },
    AnalysisStep {
        session_id: String,
        message: String,
        #[serde(default)]
        timestamp: Option<String>,
    },
    AnalysisComplete {
        session_id: String,
        results: AssessmentResult,
        #[serde(default)]
        message: String,
    },
}

impl ChannelEvent {
    pub fn session_id(&self) -> Option<&str> {
        match self {
            ChannelEvent::Connected { .. } => None,
            ChannelEvent::AnalysisStep { session_id, .. }
            | ChannelEvent::AnalysisComplete { session_id, .. } => Some(session_id),
        }
    }
}

/// One decoded Engine.IO text frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    /// Handshake from the server; answer with a namespace connect.
    Open,
    Ping,
    Close,
    Event(ChannelEvent),
    /// Pongs, namespace acks, unknown events and malformed frames.
    Ignored,
}

pub fn decode_packet(text: &str) -> Packet {
    match text.as_bytes().first() {
        Some(b'0') => Packet::Open,
        Some(b'1') => Packet::Close,
        Some(b'2') => Packet::Ping,
        Some(b'4') if text.starts_with("42") => match parse_frame(text) {
            Some(ev) => Packet::Event(ev),
            None => Packet::Ignored,
        },
        Some(b'4') if text.starts_with("41") => Packet::Close,
        _ => Packet::Ignored,
    }
}

fn drop_frame(reason: &str) -> Option<ChannelEvent> {
    log(
        Level::Debug,
        Domain::Feed,
        "frame_dropped",
        obj(&[("reason", v_str(reason))]),
    );
    None
}

/// Decode a Socket.IO event packet `42[<ack id>]["<name>", <data>]`.
pub fn parse_frame(text: &str) -> Option<ChannelEvent> {
    let Some(rest) = text.strip_prefix("42") else {
        return drop_frame("not an event packet");
    };
    // An optional numeric ack id sits between the packet type and the payload.
    let payload = rest.trim_start_matches(|c: char| c.is_ascii_digit());
    let args: Vec<Value> = match serde_json::from_str(payload) {
        Ok(args) => args,
        Err(err) => return drop_frame(&err.to_string()),
    };
    let mut args = args.into_iter();
    let (Some(Value::String(name)), data) = (args.next(), args.next()) else {
        return drop_frame("event without a name");
    };
    let framed = json!({ "event": name, "data": data.unwrap_or(Value::Null) });
    match serde_json::from_value(framed) {
        Ok(ev) => Some(ev),
        Err(err) => drop_frame(&err.to_string()),
    }
}

/// Connect to `ws_url` and forward parsed events until the server closes.
///
/// Returns when the socket closes or the receiver is dropped.
pub async fn start_channel_listener(ws_url: String, sender: mpsc::Sender<ChannelEvent>) -> Result<()> {
    let (ws, _) = tokio_tungstenite::connect_async(ws_url.as_str())
        .await
        .with_context(|| format!("connecting to {}", ws_url))?;
    log(Level::Info, Domain::Feed, "connected", obj(&[("url", v_str(&ws_url))]));
    let (mut write, mut read) = ws.split();

    while let Some(msg) = read.next().await {
        let text = match msg {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(err) => {
                log(
                    Level::Warn,
                    Domain::Feed,
                    "read_error",
                    obj(&[("error", v_str(&err.to_string()))]),
                );
                break;
            }
        };
        match decode_packet(&text) {
            Packet::Open => write
                .send(Message::Text(CONNECT_PACKET.to_string()))
                .await
                .context("sending namespace connect")?,
            Packet::Ping => write
                .send(Message::Text(PONG_PACKET.to_string()))
                .await
                .context("sending pong")?,
            Packet::Close => break,
            Packet::Event(ev) => {
                if sender.send(ev).await.is_err() {
                    break;
                }
            }
            Packet::Ignored => {}
        }
    }

    log(Level::Warn, Domain::Feed, "disconnected", obj(&[("url", v_str(&ws_url))]));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_step() {
        let ev = parse_frame(
            r#"42["analysis_step",{"session_id":"s1","message":"Extracting frames...","timestamp":"10:00:02"}]"#,
        )
        .unwrap();
        assert_eq!(ev.session_id(), Some("s1"));
        assert!(matches!(ev, ChannelEvent::AnalysisStep { ref message, .. } if message.starts_with("Extracting")));
    }

    #[test]
    fn test_parse_connected() {
        let ev = parse_frame(r#"42["connected",{"message":"Connected to Reef Assessment System"}]"#).unwrap();
        assert_eq!(ev.session_id(), None);
    }

    #[test]
    fn test_parse_with_ack_id() {
        let ev = parse_frame(r#"4217["analysis_step",{"session_id":"s2","message":"x"}]"#).unwrap();
        assert_eq!(ev.session_id(), Some("s2"));
    }

    #[test]
    fn test_unknown_and_malformed_dropped() {
        assert!(parse_frame(r#"42["telemetry",{}]"#).is_none());
        assert!(parse_frame("not json").is_none());
        assert!(parse_frame(r#"42["analysis_step",{"message":"no session"}]"#).is_none());
        assert!(parse_frame(r#"42[7,{}]"#).is_none());
        assert!(parse_frame(r#"{"event":"connected","data":{}}"#).is_none());
    }

    #[test]
    fn test_engine_packets() {
        assert_eq!(
            decode_packet(r#"0{"sid":"abc","upgrades":[],"pingInterval":3000,"pingTimeout":5000}"#),
            Packet::Open
        );
        assert_eq!(decode_packet("2"), Packet::Ping);
        assert_eq!(decode_packet("3"), Packet::Ignored);
        assert_eq!(decode_packet(r#"40{"sid":"xyz"}"#), Packet::Ignored);
        assert_eq!(decode_packet("41"), Packet::Close);
        assert_eq!(decode_packet("1"), Packet::Close);
        assert!(matches!(
            decode_packet(r#"42["connected",{"message":"hi"}]"#),
            Packet::Event(ChannelEvent::Connected { .. })
        ));
    }
}
