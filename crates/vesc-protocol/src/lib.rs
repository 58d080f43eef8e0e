//! VESC Motor Controller Protocol
//!
//! Encodes duty cycle, current and servo commands for a VESC speed
//! controller and decodes the telemetry it sends back.
//!
//! Frame layout (short packets only):
//!
//! ```text
//! [0x02][len][payload ...][crc_hi][crc_lo][0x03]
//! ```
//!
//! The CRC is CRC16-CCITT over the payload, whose first byte is the
//! command id.

mod command;
mod decoder;
mod driver;
mod error;
mod frame;
mod telemetry;

pub use command::CommandId;
pub use decoder::{DecoderStats, VescDecoder, VescMessage, BUFFER_SIZE};
pub use driver::{SendOutcome, VescDriver};
pub use error::FrameError;
pub use frame::encode_frame;
pub use telemetry::{Telemetry, VescData, SELECTIVE_VALUES_MASK};

/// Framing constants
pub mod consts {
    /// Start byte of a short packet
    pub const START_BYTE: u8 = 0x02;
    /// Terminating byte of every packet
    pub const END_BYTE: u8 = 0x03;
    /// Largest payload a short packet carries
    pub const MAX_PAYLOAD: usize = 255;
    /// Bytes around the payload: start, length, two CRC bytes, end
    pub const FRAME_OVERHEAD: usize = 5;
}
