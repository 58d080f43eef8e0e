//! SUMD Stream Decoder

use crate::consts::{CRC_SIZE, HEADER_SIZE, MANUFACTURER_ID, MAX_CHANNELS, MIN_FRAME_SIZE};
use crate::frame::SumdFrame;
use metrics::counter;
use ring_buffer::RingBuffer;
use tracing::trace;
use vehicle_link::Crc16;

/// Ring buffer size for the receiver link (holds one 16-channel frame with
/// room to spare)
pub const BUFFER_SIZE: usize = 64;

/// Running decoder statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecoderStats {
    /// Frames that passed the CRC check
    pub frames_decoded: u64,
    /// Candidate frames rejected by the CRC check
    pub crc_failures: u64,
    /// Bytes skipped while resynchronizing
    pub bytes_discarded: u64,
}

/// Incremental SUMD decoder.
///
/// Bytes are appended with [`SumdDecoder::ingest`]; every complete,
/// CRC-valid frame found in the stream is returned in order. Corruption is
/// recovered by dropping a single byte and rescanning, so a damaged frame
/// costs at most one frame and never the one after it.
#[derive(Debug, Default)]
pub struct SumdDecoder {
    buffer: RingBuffer<BUFFER_SIZE>,
    stats: DecoderStats,
}

impl SumdDecoder {
    /// Create an empty decoder
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `bytes` and return every frame they complete.
    ///
    /// The ring is drained whenever it fills up, so arbitrarily large chunks
    /// never overwrite unread data and the result does not depend on how the
    /// stream was chunked.
    pub fn ingest(&mut self, bytes: &[u8]) -> Vec<SumdFrame> {
        let mut frames = Vec::new();
        for &byte in bytes {
            if self.buffer.is_full() {
                self.decode_into(&mut frames);
            }
            self.buffer.push(byte);
        }
        self.decode_into(&mut frames);
        frames
    }

    /// Statistics since construction
    pub fn stats(&self) -> DecoderStats {
        self.stats
    }

    /// Bytes waiting for the rest of their frame
    pub fn buffered(&self) -> usize {
        self.buffer.available()
    }

    fn decode_into(&mut self, frames: &mut Vec<SumdFrame>) {
        while self.buffer.available() >= MIN_FRAME_SIZE {
            // Resync on the manufacturer id
            if self.buffer.peek(0) != MANUFACTURER_ID {
                self.discard_byte();
                continue;
            }

            let channel_count = self.buffer.peek(2) as usize;
            if channel_count > MAX_CHANNELS {
                trace!("SUMD: bogus channel count {}", channel_count);
                self.discard_byte();
                continue;
            }

            let frame_size = SumdFrame::wire_size(channel_count);
            if self.buffer.available() < frame_size {
                // Wait for the rest of the frame
                break;
            }

            let payload_size = frame_size - CRC_SIZE;
            let mut crc = Crc16::new();
            for i in 0..payload_size {
                crc.update(self.buffer.peek(i));
            }
            let expected = self.buffer.peek_u16_be(payload_size);
            if crc.value() != expected {
                trace!(
                    "SUMD: CRC mismatch (calc {:04X}, frame {:04X})",
                    crc.value(),
                    expected
                );
                self.stats.crc_failures += 1;
                counter!("sumd_frames_dropped").increment(1);
                self.discard_byte();
                continue;
            }

            let mut frame = SumdFrame {
                state: self.buffer.peek(1).into(),
                channel_count,
                ..Default::default()
            };
            for (ch, value) in frame.channels[..channel_count].iter_mut().enumerate() {
                *value = self.buffer.peek_u16_be(HEADER_SIZE + 2 * ch);
            }

            self.buffer.pop(frame_size);
            self.stats.frames_decoded += 1;
            counter!("sumd_frames_decoded").increment(1);
            frames.push(frame);
        }
    }

    fn discard_byte(&mut self) {
        self.buffer.pop(1);
        self.stats.bytes_discarded += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::LinkState;
    use proptest::prelude::*;

    fn sample_frame(seed: u16) -> SumdFrame {
        let values: Vec<u16> = (0..16).map(|ch| 8800 + (seed * 37 + ch * 400) % 6400).collect();
        SumdFrame::new(LinkState::Normal, &values)
    }

    fn stream_of(frames: &[SumdFrame]) -> Vec<u8> {
        frames.iter().flat_map(|f| f.encode()).collect()
    }

    #[test]
    fn test_decodes_single_frame() {
        let frame = sample_frame(1);
        let mut decoder = SumdDecoder::new();

        let decoded = decoder.ingest(&frame.encode());

        assert_eq!(decoded, vec![frame]);
        assert_eq!(decoder.stats().frames_decoded, 1);
        assert_eq!(decoder.buffered(), 0);
    }

    #[test]
    fn test_waits_for_complete_frame() {
        let bytes = sample_frame(2).encode();
        let mut decoder = SumdDecoder::new();

        // 16-channel frames are 37 bytes; 30 is past the minimum but short
        assert!(decoder.ingest(&bytes[..30]).is_empty());
        assert_eq!(decoder.ingest(&bytes[30..]).len(), 1);
        assert_eq!(decoder.stats().crc_failures, 0);
    }

    #[test]
    fn test_short_frames_decode_once_minimum_is_buffered() {
        let frame = SumdFrame::new(LinkState::Normal, &[12000; 12]);
        let mut decoder = SumdDecoder::new();

        let decoded = decoder.ingest(&frame.encode());
        assert_eq!(decoded, vec![frame]);
    }

    #[test]
    fn test_skips_leading_garbage() {
        let frame = sample_frame(3);
        let mut stream = vec![0x00, 0xFF, 0x13, 0xA8, 0x01];
        stream.extend(frame.encode());

        let mut decoder = SumdDecoder::new();
        assert_eq!(decoder.ingest(&stream), vec![frame]);
        assert_eq!(decoder.stats().bytes_discarded, 5);
    }

    #[test]
    fn test_rejects_oversized_channel_count() {
        let mut bytes = sample_frame(4).encode();
        bytes[2] = 17;
        let mut decoder = SumdDecoder::new();
        assert!(decoder.ingest(&bytes).is_empty());
    }

    #[test]
    fn test_corrupted_frame_dropped_next_frame_survives() {
        let frames = [sample_frame(5), sample_frame(6), sample_frame(7)];
        let mut stream = stream_of(&frames);
        // Flip a channel byte in the first frame
        stream[10] ^= 0x40;

        let mut decoder = SumdDecoder::new();
        let decoded = decoder.ingest(&stream);

        assert_eq!(decoded, frames[1..].to_vec());
        assert!(decoder.stats().crc_failures >= 1);
        assert!(decoder.stats().bytes_discarded as usize >= SumdFrame::wire_size(16));
    }

    #[test]
    fn test_failsafe_frames_are_decoded() {
        let frame = SumdFrame::new(LinkState::Failsafe, &[12000; 16]);
        let mut decoder = SumdDecoder::new();
        let decoded = decoder.ingest(&frame.encode());
        assert_eq!(decoded[0].state, LinkState::Failsafe);
    }

    #[test]
    fn test_large_chunk_does_not_overflow_ring() {
        let frames: Vec<_> = (0..20).map(sample_frame).collect();
        let mut decoder = SumdDecoder::new();
        assert_eq!(decoder.ingest(&stream_of(&frames)), frames);
    }

    proptest! {
        #[test]
        fn prop_chunking_independence(
            seeds in proptest::collection::vec(0u16..500, 1..8),
            noise in proptest::collection::vec(any::<u8>(), 0..40),
            cuts in proptest::collection::vec(1usize..50, 1..20),
        ) {
            let frames: Vec<_> = seeds.iter().map(|&s| sample_frame(s)).collect();
            let mut stream = noise.clone();
            stream.extend(stream_of(&frames));
            stream.extend(noise);

            let all_at_once = SumdDecoder::new().ingest(&stream);

            let mut one_by_one = Vec::new();
            let mut decoder = SumdDecoder::new();
            for byte in &stream {
                one_by_one.extend(decoder.ingest(std::slice::from_ref(byte)));
            }

            let mut chunked = Vec::new();
            let mut decoder = SumdDecoder::new();
            let mut rest = stream.as_slice();
            for cut in cuts.iter().cycle() {
                if rest.is_empty() {
                    break;
                }
                let (chunk, tail) = rest.split_at((*cut).min(rest.len()));
                chunked.extend(decoder.ingest(chunk));
                rest = tail;
            }

            prop_assert_eq!(&all_at_once, &one_by_one);
            prop_assert_eq!(&all_at_once, &chunked);
        }

        #[test]
        fn prop_single_byte_corruption_resyncs(
            index in 0usize..37,
            flip in 1u8..=255,
        ) {
            let frames = [sample_frame(11), sample_frame(12)];
            let mut stream = stream_of(&frames);
            stream[index] ^= flip;

            let decoded = SumdDecoder::new().ingest(&stream);

            // The damaged frame is gone; the following one always survives
            prop_assert!(!decoded.contains(&frames[0]));
            prop_assert_eq!(decoded.last(), Some(&frames[1]));
        }
    }
}
