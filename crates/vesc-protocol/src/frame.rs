//! Short Packet Framing

use crate::consts::{END_BYTE, FRAME_OVERHEAD, MAX_PAYLOAD, START_BYTE};
use crate::error::FrameError;
use vehicle_link::crc16;

/// Wrap `payload` in a short packet
pub fn encode_frame(payload: &[u8]) -> Result<Vec<u8>, FrameError> {
    if payload.is_empty() {
        return Err(FrameError::EmptyPayload);
    }
    if payload.len() > MAX_PAYLOAD {
        return Err(FrameError::PayloadTooLong(payload.len()));
    }

    let mut frame = Vec::with_capacity(payload.len() + FRAME_OVERHEAD);
    frame.push(START_BYTE);
    frame.push(payload.len() as u8);
    frame.extend_from_slice(payload);
    frame.extend_from_slice(&crc16(payload).to_be_bytes());
    frame.push(END_BYTE);
    Ok(frame)
}
