//! Wire protocol and board geometry shared by the server and its clients.
//!
//! Client to server: repeating fixed 10-byte frames
//! `'b' | presses: u8 | x: f32 | y: f32`, floats as IEEE-754 little-endian.
//!
//! Server to client: one variable-length frame per tick
//! `'m' | len: u24 big-endian | payload[len]`. The payload is opaque to the codec.

use serde::{Deserialize, Serialize};
use std::fmt;

pub const CLIENT_MESSAGE_SIZE: usize = 10;
pub const CLIENT_TAG: u8 = b'b';
pub const STATUS_TAG: u8 = b'm';
pub const STATUS_HEADER_SIZE: usize = 4;
pub const MAX_STATUS_PAYLOAD: usize = 0xFF_FFFF;

pub const COURT_HALF_WIDTH: f32 = 16.0;
pub const COURT_HALF_HEIGHT: f32 = 4.0;
pub const KEY_COUNT: usize = 8;

/// 8-bit RGBA color.
pub type Rgba = [u8; 4];

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// One decoded client report.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClientMessage {
    pub presses: u8,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// First byte was not a known message tag.
    UnknownTag { tag: u8 },
    /// Fewer bytes than one full frame.
    Truncated { actual: usize },
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownTag { tag } => write!(f, "unknown message tag: 0x{tag:02X}"),
            Self::Truncated { actual } => write!(
                f,
                "truncated message: {actual} bytes, need {CLIENT_MESSAGE_SIZE}"
            ),
        }
    }
}

impl std::error::Error for DecodeError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    /// Payload does not fit the 24-bit length prefix.
    PayloadTooLarge { len: usize },
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PayloadTooLarge { len } => write!(
                f,
                "status payload of {len} bytes exceeds maximum of {MAX_STATUS_PAYLOAD}"
            ),
        }
    }
}

impl std::error::Error for EncodeError {}

/// Decodes one client frame from the front of `bytes`.
///
/// Only the first [`CLIENT_MESSAGE_SIZE`] bytes are read; anything after is ignored.
pub fn decode_client_message(bytes: &[u8]) -> Result<ClientMessage, DecodeError> {
    if bytes.len() < CLIENT_MESSAGE_SIZE {
        return Err(DecodeError::Truncated {
            actual: bytes.len(),
        });
    }
    if bytes[0] != CLIENT_TAG {
        return Err(DecodeError::UnknownTag { tag: bytes[0] });
    }

    let x = f32::from_le_bytes([bytes[2], bytes[3], bytes[4], bytes[5]]);
    let y = f32::from_le_bytes([bytes[6], bytes[7], bytes[8], bytes[9]]);

    Ok(ClientMessage {
        presses: bytes[1],
        position: Position { x, y },
    })
}

pub fn encode_client_message(message: &ClientMessage) -> [u8; CLIENT_MESSAGE_SIZE] {
    let mut frame = [0u8; CLIENT_MESSAGE_SIZE];
    frame[0] = CLIENT_TAG;
    frame[1] = message.presses;
    frame[2..6].copy_from_slice(&message.position.x.to_le_bytes());
    frame[6..10].copy_from_slice(&message.position.y.to_le_bytes());
    frame
}

/// Wraps `payload` in a status frame: tag, 24-bit big-endian length, raw bytes.
pub fn encode_status_message(payload: &[u8]) -> Result<Vec<u8>, EncodeError> {
    let len = payload.len();
    if len > MAX_STATUS_PAYLOAD {
        return Err(EncodeError::PayloadTooLarge { len });
    }

    let mut frame = Vec::with_capacity(STATUS_HEADER_SIZE + len);
    frame.push(STATUS_TAG);
    frame.push((len >> 16) as u8);
    frame.push((len >> 8) as u8);
    frame.push(len as u8);
    frame.extend_from_slice(payload);
    Ok(frame)
}

/// Parses one status frame from the front of `bytes`.
///
/// Returns `Ok(None)` while the frame is still incomplete, otherwise the payload
/// and the total number of bytes the frame occupies.
pub fn decode_status_frame(bytes: &[u8]) -> Result<Option<(&[u8], usize)>, DecodeError> {
    let Some(&tag) = bytes.first() else {
        return Ok(None);
    };
    if tag != STATUS_TAG {
        return Err(DecodeError::UnknownTag { tag });
    }
    if bytes.len() < STATUS_HEADER_SIZE {
        return Ok(None);
    }

    let len = (usize::from(bytes[1]) << 16) | (usize::from(bytes[2]) << 8) | usize::from(bytes[3]);
    let total = STATUS_HEADER_SIZE + len;
    if bytes.len() < total {
        return Ok(None);
    }
    Ok(Some((&bytes[STATUS_HEADER_SIZE..total], total)))
}

/// Axis-aligned rectangle on the playing surface.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KeyRegion {
    pub min: Position,
    pub max: Position,
}

impl KeyRegion {
    /// Builds a region from any two opposite corners.
    pub fn from_corners(a: Position, b: Position) -> Self {
        Self {
            min: Position::new(a.x.min(b.x), a.y.min(b.y)),
            max: Position::new(a.x.max(b.x), a.y.max(b.y)),
        }
    }

    /// Edges are inclusive.
    pub fn contains(&self, p: Position) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }
}

/// Row of [`KEY_COUNT`] equal keys spanning the court from left to right.
pub fn default_keyboard() -> Vec<KeyRegion> {
    let width = 2.0 * COURT_HALF_WIDTH / KEY_COUNT as f32;
    (0..KEY_COUNT)
        .map(|i| {
            let left = -COURT_HALF_WIDTH + i as f32 * width;
            KeyRegion::from_corners(
                Position::new(left, -COURT_HALF_HEIGHT),
                Position::new(left + width, COURT_HALF_HEIGHT),
            )
        })
        .collect()
}

/// Index of the first region containing `p`, in collection order.
pub fn first_hit(regions: &[KeyRegion], p: Position) -> Option<usize> {
    regions.iter().position(|region| region.contains(p))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerStatus {
    pub name: String,
    pub total: i32,
    pub position: Position,
    pub color: Rgba,
}

/// Aggregated state for one tick, as broadcast to every client.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub tick: u32,
    pub players: Vec<PlayerStatus>,
    pub sum: i32,
    /// Key indices hit this tick, one entry per press that landed on a key.
    pub hits: Vec<u32>,
}

impl StatusSnapshot {
    /// Human-readable single line, e.g.
    /// `Player1 -3 @(1.00,0.00) #ff8000ff = -3 | hits: 4,4,4`.
    pub fn to_text(&self) -> String {
        let mut line = self
            .players
            .iter()
            .map(|p| {
                format!(
                    "{} {} @({:.2},{:.2}) #{:02x}{:02x}{:02x}{:02x}",
                    p.name,
                    p.total,
                    p.position.x,
                    p.position.y,
                    p.color[0],
                    p.color[1],
                    p.color[2],
                    p.color[3]
                )
            })
            .collect::<Vec<_>>()
            .join(" + ");

        line.push_str(&format!(" = {}", self.sum));

        if self.hits.is_empty() {
            line.push_str(" | hits: -");
        } else {
            let hits: Vec<String> = self.hits.iter().map(|h| h.to_string()).collect();
            line.push_str(&format!(" | hits: {}", hits.join(",")));
        }
        line
    }

    pub fn to_bincode(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    pub fn from_bincode(bytes: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(bytes)
    }
}
