//! Status fan-out to every live session

use crate::config::PayloadFormat;
use crate::session::SessionTable;
use shared::{encode_status_message, EncodeError, StatusSnapshot};

/// Serializes a snapshot into the opaque status payload
pub fn render_payload(
    snapshot: &StatusSnapshot,
    format: PayloadFormat,
) -> Result<Vec<u8>, bincode::Error> {
    match format {
        PayloadFormat::Text => Ok(snapshot.to_text().into_bytes()),
        PayloadFormat::Binary => snapshot.to_bincode(),
    }
}

/// Encodes `payload` once and appends the frame to every session's outbound queue.
///
/// Returns the number of sessions the frame was queued for.
pub fn broadcast(sessions: &mut SessionTable, payload: &[u8]) -> Result<usize, EncodeError> {
    let frame = encode_status_message(payload)?;

    let mut queued = 0;
    for session in sessions.iter_mut() {
        session.outbound.extend_from_slice(&frame);
        queued += 1;
    }
    Ok(queued)
}
