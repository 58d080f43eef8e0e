//! Async Serial Adapter
//!
//! Opens a serial device with `tokio-serial`, spawns a writer task fed by a
//! [`ChannelTransport`], and exposes the read half as an `on_bytes` pump.

use crate::error::LinkError;
use crate::transport::ChannelTransport;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf};
use tokio::sync::mpsc;
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tracing::{debug, error, info, warn};

/// Bytes requested from the device per read call
pub const READ_CHUNK_SIZE: usize = 64;

/// Serial device settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerialConfig {
    /// Device path (e.g. "/dev/ttySC0")
    pub device: String,
    /// Baud rate
    pub baud_rate: u32,
}

impl SerialConfig {
    /// Create a config for `device` at `baud_rate`
    pub fn new(device: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            device: device.into(),
            baud_rate,
        }
    }
}

/// An open serial link: a read half plus a transport for writes
pub struct SerialLink<R = ReadHalf<SerialStream>> {
    device: String,
    reader: R,
    transport: ChannelTransport,
}

impl SerialLink {
    /// Open the device and start its writer task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn open(config: &SerialConfig) -> Result<Self, LinkError> {
        info!("Opening serial device {} at {} baud", config.device, config.baud_rate);

        let stream = tokio_serial::new(&config.device, config.baud_rate)
            .open_native_async()
            .map_err(|e| LinkError::Open {
                device: config.device.clone(),
                reason: e.to_string(),
            })?;

        let (reader, writer) = tokio::io::split(stream);
        Ok(Self::from_parts(&config.device, reader, writer))
    }
}

impl<R: AsyncRead + Unpin> SerialLink<R> {
    /// Build a link from any async byte stream halves (used for tests and
    /// pseudo-terminals)
    pub fn from_parts<W>(device: &str, reader: R, writer: W) -> Self
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(write_loop(device.to_string(), writer, rx));

        Self {
            device: device.to_string(),
            reader,
            transport: ChannelTransport::new(device, tx),
        }
    }

    /// Transport for frames going out on this link
    pub fn transport(&self) -> ChannelTransport {
        self.transport.clone()
    }

    /// Device path of this link
    pub fn device(&self) -> &str {
        &self.device
    }

    /// Read until the device closes or fails, handing every chunk to
    /// `on_bytes`.
    pub async fn run_reader<F>(mut self, mut on_bytes: F) -> Result<(), LinkError>
    where
        F: FnMut(&[u8]),
    {
        let mut buf = [0u8; READ_CHUNK_SIZE];
        debug!("Reader started on {}", self.device);

        loop {
            let n = self
                .reader
                .read(&mut buf)
                .await
                .map_err(|source| LinkError::Read {
                    device: self.device.clone(),
                    source,
                })?;

            if n == 0 {
                warn!("Serial device {} reached end of stream", self.device);
                return Err(LinkError::Closed(self.device));
            }

            on_bytes(&buf[..n]);
        }
    }
}

async fn write_loop<W>(device: String, mut writer: W, mut rx: mpsc::UnboundedReceiver<Vec<u8>>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(frame) = rx.recv().await {
        if let Err(e) = writer.write_all(&frame).await {
            error!("Serial write to {} failed: {}", device, e);
            continue;
        }
        if let Err(e) = writer.flush().await {
            error!("Serial flush on {} failed: {}", device, e);
        }
    }
    debug!("Writer for {} stopped", device);
}
