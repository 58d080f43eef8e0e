//! VESC Stream Decoder

use crate::command::CommandId;
use crate::consts::{END_BYTE, FRAME_OVERHEAD, START_BYTE};
use crate::telemetry::VescData;
use metrics::counter;
use ring_buffer::RingBuffer;
use tracing::{debug, trace};
use vehicle_link::Crc16;

/// Ring buffer size for the motor controller link
pub const BUFFER_SIZE: usize = 512;

/// A validated inbound packet
#[derive(Debug, Clone, PartialEq)]
pub enum VescMessage {
    /// `GetValuesSelective` reply
    Values(VescData),
    /// Any other command id; accepted and discarded by the driver
    Other { id: u8, len: usize },
}

/// Running decoder statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecoderStats {
    pub frames_decoded: u64,
    pub crc_failures: u64,
    pub bad_terminators: u64,
    pub bytes_discarded: u64,
}

/// Incremental decoder for packets sent by the motor controller
#[derive(Debug, Default)]
pub struct VescDecoder {
    buffer: RingBuffer<BUFFER_SIZE>,
    stats: DecoderStats,
}

impl VescDecoder {
    /// Create an empty decoder
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `bytes` and return every packet they complete, in order
    pub fn ingest(&mut self, bytes: &[u8]) -> Vec<VescMessage> {
        let mut messages = Vec::new();
        for &byte in bytes {
            if self.buffer.is_full() {
                self.decode_into(&mut messages);
            }
            self.buffer.push(byte);
        }
        self.decode_into(&mut messages);
        messages
    }

    pub fn stats(&self) -> DecoderStats {
        self.stats
    }

    /// Bytes waiting for the rest of their packet
    pub fn buffered(&self) -> usize {
        self.buffer.available()
    }

    fn decode_into(&mut self, messages: &mut Vec<VescMessage>) {
        while self.buffer.available() >= 2 {
            if self.buffer.peek(0) != START_BYTE {
                self.discard_byte();
                continue;
            }

            let len = self.buffer.peek(1) as usize;
            if len == 0 {
                self.discard_byte();
                continue;
            }
            if self.buffer.available() < len + FRAME_OVERHEAD {
                break;
            }

            let mut crc = Crc16::new();
            for i in 0..len {
                crc.update(self.buffer.peek(2 + i));
            }
            let expected = self.buffer.peek_u16_be(2 + len);
            if crc.value() != expected {
                trace!("VESC: CRC mismatch (calc {:04X}, frame {:04X})", crc.value(), expected);
                self.stats.crc_failures += 1;
                counter!("vesc_frames_dropped").increment(1);
                self.discard_byte();
                continue;
            }
            if self.buffer.peek(len + 4) != END_BYTE {
                trace!("VESC: missing end byte");
                self.stats.bad_terminators += 1;
                counter!("vesc_frames_dropped").increment(1);
                self.discard_byte();
                continue;
            }

            let payload = self.buffer.copy_range(2, len);
            self.buffer.pop(len + FRAME_OVERHEAD);
            self.stats.frames_decoded += 1;
            counter!("vesc_frames_decoded").increment(1);

            if let Some(message) = Self::dispatch(&payload) {
                messages.push(message);
            }
        }
    }

    fn dispatch(payload: &[u8]) -> Option<VescMessage> {
        let (&id, body) = payload.split_first()?;
        match CommandId::from_u8(id) {
            Some(CommandId::GetValuesSelective) => match VescData::from_selective(body) {
                Some(data) => Some(VescMessage::Values(data)),
                None => {
                    debug!("VESC: short values reply ({} bytes)", body.len());
                    None
                }
            },
            _ => Some(VescMessage::Other {
                id,
                len: payload.len(),
            }),
        }
    }

    fn discard_byte(&mut self) {
        self.buffer.pop(1);
        self.stats.bytes_discarded += 1;
    }
}
