//! Vehicle Serial Link Plumbing
//!
//! Everything the two binary protocols (receiver and motor controller) share:
//! the CRC16-CCITT table, the [`Transport`] seam commands are written
//! through, an async serial adapter built on `tokio-serial`, and the
//! car-specific [`Calibration`] both links scale their values with.

mod calibration;
mod crc;
mod error;
mod serial;
mod transport;

pub use calibration::Calibration;
pub use crc::{crc16, Crc16, CRC16_TABLE};
pub use error::LinkError;
pub use serial::{SerialConfig, SerialLink, READ_CHUNK_SIZE};
pub use transport::{ChannelTransport, Transport};
