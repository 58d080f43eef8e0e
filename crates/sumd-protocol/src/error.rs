//! SUMD Error Types

use thiserror::Error;

/// Invalid channel assignment
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelMapError {
    /// Channel index beyond what a frame can carry
    #[error("{function} channel {index} is out of range (max {max})")]
    OutOfRange {
        function: &'static str,
        index: usize,
        max: usize,
    },

    /// Two functions mapped to the same channel
    #[error("{first} and {second} share channel {index}")]
    Duplicate {
        first: &'static str,
        second: &'static str,
        index: usize,
    },
}
