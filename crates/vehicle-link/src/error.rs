//! Serial Link Error Types

use thiserror::Error;

/// Errors that can occur on a serial link
#[derive(Debug, Error)]
pub enum LinkError {
    /// The serial device could not be opened
    #[error("Failed to open serial device {device}: {reason}")]
    Open { device: String, reason: String },

    /// Reading from the device failed
    #[error("Serial read error on {device}: {source}")]
    Read {
        device: String,
        #[source]
        source: std::io::Error,
    },

    /// The device has been closed by the other side
    #[error("Serial device {0} closed")]
    Closed(String),

    /// The writer task for the link is gone
    #[error("Serial writer for {0} is not running")]
    WriterGone(String),

    /// Calibration values outside their physical range
    #[error("Invalid calibration: {0}")]
    InvalidCalibration(String),
}
