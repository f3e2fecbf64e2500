// src/connectors/messages.rs
use crate::error::MalformedPayloadError;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

/// Body of `GET /api/<instrument>?interval=<key>`.
#[derive(Debug, Clone, Deserialize)]
pub struct RawSnapshot {
    pub prices: Vec<RawPricePoint>,
    pub high_24h: Decimal,
    pub low_24h: Decimal,
    pub latest_price: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawPricePoint {
    pub timestamp: RawTimestamp,
    pub price: Decimal,
}

/// The API sends either epoch milliseconds or a date string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawTimestamp {
    Millis(i64),
    MillisFloat(f64),
    Text(String),
}

impl RawTimestamp {
    pub fn to_utc(&self) -> Result<DateTime<Utc>, MalformedPayloadError> {
        match self {
            RawTimestamp::Millis(ms) => Utc
                .timestamp_millis_opt(*ms)
                .single()
                .ok_or_else(|| MalformedPayloadError::Timestamp(ms.to_string())),
            RawTimestamp::MillisFloat(ms) => Some(*ms)
                .filter(|ms| ms.is_finite())
                .and_then(|ms| Utc.timestamp_millis_opt(ms.trunc() as i64).single())
                .ok_or_else(|| MalformedPayloadError::Timestamp(ms.to_string())),
            RawTimestamp::Text(text) => parse_text_timestamp(text)
                .ok_or_else(|| MalformedPayloadError::Timestamp(text.clone())),
        }
    }
}

fn parse_text_timestamp(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    // Naive strings are taken as UTC.
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// One Engine.IO v4 frame as it arrives in a websocket text message.
#[derive(Debug, Clone, PartialEq)]
pub enum EnginePacket {
    Open(String),
    Close,
    Ping,
    Pong,
    Message(SocketPacket),
    Upgrade,
    Noop,
}

/// The Socket.IO packet carried by an Engine.IO `message` frame.
#[derive(Debug, Clone, PartialEq)]
pub enum SocketPacket {
    Connect,
    Disconnect,
    Event { name: String },
    ConnectError(String),
    Other(char),
}

pub const ENGINE_PONG: &str = "3";
pub const SOCKET_CONNECT: &str = "40";

pub fn decode_engine_frame(frame: &str) -> Option<EnginePacket> {
    let mut chars = frame.chars();
    let kind = chars.next()?;
    let rest = chars.as_str();
    let packet = match kind {
        '0' => EnginePacket::Open(rest.to_string()),
        '1' => EnginePacket::Close,
        '2' => EnginePacket::Ping,
        '3' => EnginePacket::Pong,
        '4' => EnginePacket::Message(decode_socket_packet(rest)?),
        '5' => EnginePacket::Upgrade,
        '6' => EnginePacket::Noop,
        _ => return None,
    };
    Some(packet)
}

/// Decodes `<type>[/<nsp>,][<ack id>][<json>]`. Only the event name is kept: our
/// topics carry no payload.
fn decode_socket_packet(body: &str) -> Option<SocketPacket> {
    let mut chars = body.chars();
    let kind = chars.next()?;
    let mut rest = chars.as_str();

    if rest.starts_with('/') {
        rest = match rest.find(',') {
            Some(idx) => &rest[idx + 1..],
            None => "",
        };
    }
    let rest = rest.trim_start_matches(|c: char| c.is_ascii_digit());

    let packet = match kind {
        '0' => SocketPacket::Connect,
        '1' => SocketPacket::Disconnect,
        '2' => {
            let args: Vec<serde_json::Value> = serde_json::from_str(rest).ok()?;
            let name = args.first()?.as_str()?.to_string();
            SocketPacket::Event { name }
        }
        '4' => SocketPacket::ConnectError(rest.to_string()),
        other => SocketPacket::Other(other),
    };
    Some(packet)
}
