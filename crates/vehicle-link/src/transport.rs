//! Outbound Byte Transport

use crate::error::LinkError;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Seam through which encoded frames leave the core.
///
/// Writes must not block: they are issued while the vehicle context lock is
/// held.
pub trait Transport: Send + Sync {
    /// Queue `bytes` for transmission
    fn write(&self, bytes: &[u8]) -> Result<(), LinkError>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn write(&self, bytes: &[u8]) -> Result<(), LinkError> {
        (**self).write(bytes)
    }
}

/// Transport that hands frames to a writer task over an unbounded channel
#[derive(Debug, Clone)]
pub struct ChannelTransport {
    device: Arc<str>,
    tx: mpsc::UnboundedSender<Vec<u8>>,
}

impl ChannelTransport {
    /// Wrap the sending half of a writer task's queue
    pub fn new(device: &str, tx: mpsc::UnboundedSender<Vec<u8>>) -> Self {
        Self {
            device: Arc::from(device),
            tx,
        }
    }

    /// Device path this transport writes to
    pub fn device(&self) -> &str {
        &self.device
    }
}

impl Transport for ChannelTransport {
    fn write(&self, bytes: &[u8]) -> Result<(), LinkError> {
        self.tx
            .send(bytes.to_vec())
            .map_err(|_| LinkError::WriterGone(self.device.to_string()))
    }
}
