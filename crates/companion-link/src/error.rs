//! Companion Link Error Types

use thiserror::Error;

/// Companion link error types
#[derive(Error, Debug)]
pub enum CompanionError {
    #[error("Publish failed: {0}")]
    Publish(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Malformed {channel} message: {reason}")]
    Malformed {
        channel: &'static str,
        reason: String,
    },
}
