//! SUMD Frame Definitions

use crate::consts::{
    CHANNEL_CENTER, CHANNEL_SPAN, CRC_SIZE, HEADER_SIZE, MANUFACTURER_ID, MAX_CHANNELS,
    STATE_FAILSAFE, STATE_NORMAL,
};
use serde::{Deserialize, Serialize};
use vehicle_link::crc16;

/// Receiver link state carried in the second frame byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkState {
    /// Transmitter in range, channel values are live
    Normal,
    /// Receiver lost the transmitter and replays its failsafe values
    Failsafe,
    /// Any other state byte
    Other(u8),
}

impl From<u8> for LinkState {
    fn from(byte: u8) -> Self {
        match byte {
            STATE_NORMAL => LinkState::Normal,
            STATE_FAILSAFE => LinkState::Failsafe,
            other => LinkState::Other(other),
        }
    }
}

impl From<LinkState> for u8 {
    fn from(state: LinkState) -> Self {
        match state {
            LinkState::Normal => STATE_NORMAL,
            LinkState::Failsafe => STATE_FAILSAFE,
            LinkState::Other(byte) => byte,
        }
    }
}

/// One decoded receiver frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SumdFrame {
    /// Link state byte
    pub state: LinkState,
    /// Number of channels the frame carried
    pub channel_count: usize,
    /// Raw channel values; channels past `channel_count` sit at center
    pub channels: [u16; MAX_CHANNELS],
}

impl Default for SumdFrame {
    fn default() -> Self {
        Self {
            state: LinkState::Normal,
            channel_count: 0,
            channels: [CHANNEL_CENTER; MAX_CHANNELS],
        }
    }
}

impl SumdFrame {
    /// Build a frame from raw channel values (at most 16 are kept)
    pub fn new(state: LinkState, values: &[u16]) -> Self {
        let mut frame = Self {
            state,
            ..Default::default()
        };
        frame.channel_count = values.len().min(MAX_CHANNELS);
        frame.channels[..frame.channel_count].copy_from_slice(&values[..frame.channel_count]);
        frame
    }

    /// Total wire size of a frame with `channel_count` channels
    pub const fn wire_size(channel_count: usize) -> usize {
        HEADER_SIZE + 2 * channel_count + CRC_SIZE
    }

    /// Raw value of `channel`, center if the frame did not carry it
    pub fn raw(&self, channel: usize) -> u16 {
        if channel < self.channel_count {
            self.channels[channel]
        } else {
            CHANNEL_CENTER
        }
    }

    /// Signed stick deflection of `channel`, roughly in `[-1, 1]`
    pub fn percent(&self, channel: usize) -> f32 {
        (self.raw(channel) as f32 - CHANNEL_CENTER as f32) / CHANNEL_SPAN
    }

    /// Raw value in PPM microseconds (raw / 8)
    pub fn ppm(&self, channel: usize) -> u16 {
        self.raw(channel) >> 3
    }

    /// Whether this frame carries live stick values
    pub fn is_normal(&self) -> bool {
        self.state == LinkState::Normal
    }

    /// Serialize to wire bytes including the CRC
    pub fn encode(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(Self::wire_size(self.channel_count));
        bytes.push(MANUFACTURER_ID);
        bytes.push(self.state.into());
        bytes.push(self.channel_count as u8);
        for value in &self.channels[..self.channel_count] {
            bytes.extend_from_slice(&value.to_be_bytes());
        }
        let crc = crc16(&bytes);
        bytes.extend_from_slice(&crc.to_be_bytes());
        bytes
    }
}
