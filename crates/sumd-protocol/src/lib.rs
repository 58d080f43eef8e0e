//! SUMD Receiver Protocol
//!
//! Decodes the periodic multi-channel frames a SUMD radio receiver emits on
//! its serial port and turns them into normalized [`ReceiverPacket`]s.
//!
//! Frame layout (big-endian):
//!
//! ```text
//! [0xA8][state][n][ch0_hi ch0_lo] ... [ch(n-1)_hi ch(n-1)_lo][crc_hi crc_lo]
//! ```

mod decoder;
mod error;
mod frame;
mod packet;
mod receiver;

pub use decoder::{SumdDecoder, DecoderStats, BUFFER_SIZE};
pub use error::ChannelMapError;
pub use frame::{LinkState, SumdFrame};
pub use packet::{ChannelMap, Gear, ReceiverPacket};
pub use receiver::Receiver;

/// Protocol constants
pub mod consts {
    /// Manufacturer id leading every frame
    pub const MANUFACTURER_ID: u8 = 0xA8;
    /// State byte of a frame carrying live stick values
    pub const STATE_NORMAL: u8 = 0x01;
    /// State byte of a frame sent while the receiver has lost the transmitter
    pub const STATE_FAILSAFE: u8 = 0x81;
    /// Largest channel count a frame may declare
    pub const MAX_CHANNELS: usize = 16;
    /// Header bytes: manufacturer id, state, channel count
    pub const HEADER_SIZE: usize = 3;
    /// Trailing CRC bytes
    pub const CRC_SIZE: usize = 2;
    /// Bytes buffered before a decode attempt (12-channel frame)
    pub const MIN_FRAME_SIZE: usize = HEADER_SIZE + 24 + CRC_SIZE;
    /// Raw channel value at stick center
    pub const CHANNEL_CENTER: u16 = 12000;
    /// Raw channel deflection that corresponds to full stick travel
    pub const CHANNEL_SPAN: f32 = 3200.0;
}
