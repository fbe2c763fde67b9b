//! Turns arbitrary-sized network reads into whole client frames
//!
//! Bytes are appended to the session's inbound buffer and complete
//! [`CLIENT_MESSAGE_SIZE`]-byte frames are removed from the front one at a
//! time. A partial frame stays buffered across reads and ticks until the rest
//! of it arrives.

use crate::session::Session;
use log::trace;
use shared::{decode_client_message, DecodeError, CLIENT_MESSAGE_SIZE};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReassembleError {
    /// A frame at the front of the buffer could not be decoded
    Decode(DecodeError),
    /// The client sent more unconsumed bytes than the configured limit
    InboundOverflow { len: usize, limit: usize },
}

impl fmt::Display for ReassembleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Decode(e) => write!(f, "malformed frame: {e}"),
            Self::InboundOverflow { len, limit } => {
                write!(f, "inbound buffer of {len} bytes exceeds limit of {limit}")
            }
        }
    }
}

impl std::error::Error for ReassembleError {}

impl From<DecodeError> for ReassembleError {
    fn from(e: DecodeError) -> Self {
        Self::Decode(e)
    }
}

pub struct Reassembler {
    max_inbound_bytes: usize,
}

impl Reassembler {
    pub fn new(max_inbound_bytes: usize) -> Self {
        Self { max_inbound_bytes }
    }

    /// Appends `bytes` to the session and applies every frame now complete.
    ///
    /// Returns the number of frames applied. On error the connection is
    /// malformed and must be closed; nothing after the bad frame is read.
    /// The limit applies to what is still buffered once whole frames are consumed.
    pub fn feed(&self, session: &mut Session, bytes: &[u8]) -> Result<usize, ReassembleError> {
        session.inbound.extend_from_slice(bytes);
        let applied = self.drain(session)?;

        let len = session.inbound.len();
        if len > self.max_inbound_bytes {
            return Err(ReassembleError::InboundOverflow {
                len,
                limit: self.max_inbound_bytes,
            });
        }
        Ok(applied)
    }

    /// Applies frames from the front of the inbound buffer while a whole one is present
    pub fn drain(&self, session: &mut Session) -> Result<usize, ReassembleError> {
        let mut consumed = 0;
        let mut applied = 0;

        let result = loop {
            let remaining = &session.inbound[consumed..];
            if remaining.len() < CLIENT_MESSAGE_SIZE {
                break Ok(applied);
            }

            match decode_client_message(remaining) {
                Ok(message) => {
                    trace!(
                        "{}: {} presses at ({}, {})",
                        session.name,
                        message.presses,
                        message.position.x,
                        message.position.y
                    );
                    session.apply_report(message.presses, message.position);
                    consumed += CLIENT_MESSAGE_SIZE;
                    applied += 1;
                }
                Err(e) => break Err(ReassembleError::Decode(e)),
            }
        };

        session.inbound.drain(..consumed);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use shared::{encode_client_message, ClientMessage, Position};

    fn session() -> Session {
        Session::new(1, "Player1".to_string(), [0, 0, 0, 255])
    }

    fn frame(presses: u8, x: f32, y: f32) -> [u8; CLIENT_MESSAGE_SIZE] {
        encode_client_message(&ClientMessage {
            presses,
            position: Position::new(x, y),
        })
    }

    /// Every composition of 10 as a sequence of chunk lengths
    fn partitions(n: usize) -> Vec<Vec<usize>> {
        (0..1u32 << (n - 1))
            .map(|mask| {
                let mut parts = Vec::new();
                let mut len = 1;
                for bit in 0..n - 1 {
                    if mask & (1 << bit) != 0 {
                        parts.push(len);
                        len = 1;
                    } else {
                        len += 1;
                    }
                }
                parts.push(len);
                parts
            })
            .collect()
    }

    #[test]
    fn test_single_frame() {
        let reassembler = Reassembler::new(1024);
        let mut s = session();

        let applied = reassembler.feed(&mut s, &frame(3, 1.0, 0.0)).unwrap();

        assert_eq!(applied, 1);
        assert_eq!(s.pending_presses, 3);
        assert_approx_eq!(s.position.x, 1.0);
        assert!(s.inbound.is_empty());
    }

    #[test]
    fn test_every_split_yields_one_identical_frame() {
        let reassembler = Reassembler::new(1024);
        let bytes = frame(5, -2.5, 3.75);
        let all = partitions(CLIENT_MESSAGE_SIZE);
        assert_eq!(all.len(), 512);

        for parts in all {
            let mut s = session();
            let mut offset = 0;
            let mut applied = 0;
            for len in &parts {
                applied += reassembler.feed(&mut s, &bytes[offset..offset + len]).unwrap();
                offset += len;
            }

            assert_eq!(applied, 1, "split {:?}", parts);
            assert_eq!(s.pending_presses, 5);
            assert_eq!(s.position, Position::new(-2.5, 3.75));
            assert!(s.inbound.is_empty());
        }
    }

    #[test]
    fn test_partial_frame_stays_buffered() {
        let reassembler = Reassembler::new(1024);
        let mut s = session();
        let bytes = frame(1, 0.0, 0.0);

        assert_eq!(reassembler.feed(&mut s, &bytes[..9]).unwrap(), 0);
        assert_eq!(s.inbound.len(), 9);
        assert_eq!(s.pending_presses, 0);

        assert_eq!(reassembler.feed(&mut s, &bytes[9..]).unwrap(), 1);
        assert!(s.inbound.is_empty());
    }

    #[test]
    fn test_multiple_frames_in_one_read() {
        let reassembler = Reassembler::new(1024);
        let mut s = session();

        let mut bytes = Vec::new();
        for i in 0..4 {
            bytes.extend_from_slice(&frame(2, i as f32, 0.0));
        }
        bytes.extend_from_slice(&frame(2, 9.0, 9.0)[..3]);

        assert_eq!(reassembler.feed(&mut s, &bytes).unwrap(), 4);
        assert_eq!(s.pending_presses, 8);
        assert_approx_eq!(s.position.x, 3.0);
        assert_eq!(s.inbound.len(), 3);
    }

    #[test]
    fn test_unknown_tag_leaves_state_unchanged() {
        let reassembler = Reassembler::new(1024);
        let mut s = session();
        let mut bytes = frame(4, 6.0, 6.0);
        bytes[0] = b'x';

        let result = reassembler.feed(&mut s, &bytes);

        assert_eq!(
            result,
            Err(ReassembleError::Decode(DecodeError::UnknownTag { tag: b'x' }))
        );
        assert_eq!(s.pending_presses, 0);
        assert_eq!(s.position, Position::default());
    }

    #[test]
    fn test_bytes_after_bad_frame_are_not_parsed() {
        let reassembler = Reassembler::new(1024);
        let mut s = session();

        let mut bytes = frame(1, 1.0, 1.0).to_vec();
        let mut bad = frame(1, 2.0, 2.0);
        bad[0] = 0;
        bytes.extend_from_slice(&bad);
        bytes.extend_from_slice(&frame(9, 3.0, 3.0));

        assert!(reassembler.feed(&mut s, &bytes).is_err());
        assert_eq!(s.pending_presses, 1);
        assert_eq!(s.position, Position::new(1.0, 1.0));
    }

    #[test]
    fn test_whole_frames_do_not_count_against_limit() {
        let reassembler = Reassembler::new(CLIENT_MESSAGE_SIZE);
        let mut s = session();

        let mut bytes = Vec::new();
        for _ in 0..4 {
            bytes.extend_from_slice(&frame(1, 0.0, 0.0));
        }
        bytes.extend_from_slice(&frame(1, 0.0, 0.0)[..6]);

        assert_eq!(reassembler.feed(&mut s, &bytes), Ok(4));
        assert_eq!(s.pending_presses, 4);
        assert_eq!(s.inbound.len(), 6);
    }

    #[test]
    fn test_inbound_overflow() {
        let reassembler = Reassembler::new(4);
        let mut s = session();

        assert_eq!(reassembler.feed(&mut s, &[b'b'; 3]), Ok(0));
        assert_eq!(
            reassembler.feed(&mut s, &[b'b'; 2]),
            Err(ReassembleError::InboundOverflow { len: 5, limit: 4 })
        );
    }
}
