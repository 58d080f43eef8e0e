//! VESC Error Types

use thiserror::Error;

/// Errors building an outbound frame
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    /// Payload does not fit a short packet
    #[error("payload of {0} bytes exceeds the 255 byte short packet limit")]
    PayloadTooLong(usize),

    /// Packets always carry at least a command id
    #[error("empty payload")]
    EmptyPayload,
}
