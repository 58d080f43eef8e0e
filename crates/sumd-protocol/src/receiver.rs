//! Receiver Link Driver

use crate::decoder::{DecoderStats, SumdDecoder};
use crate::frame::SumdFrame;
use crate::packet::{ChannelMap, ReceiverPacket};
use tracing::debug;
use vehicle_link::Calibration;

type PacketListener = Box<dyn FnMut(ReceiverPacket) + Send>;

/// Turns raw receiver bytes into control packets.
///
/// Only the newest frame of each chunk is converted, and only while the
/// receiver reports a live transmitter; failsafe frames are counted and
/// swallowed so the link watchdog sees silence.
pub struct Receiver {
    decoder: SumdDecoder,
    map: ChannelMap,
    calibration: Calibration,
    listener: Option<PacketListener>,
    latest: Option<SumdFrame>,
    failsafe_frames: u64,
}

impl Receiver {
    /// Create a new receiver driver
    pub fn new(map: ChannelMap, calibration: Calibration) -> Self {
        Self {
            decoder: SumdDecoder::new(),
            map,
            calibration,
            listener: None,
            latest: None,
            failsafe_frames: 0,
        }
    }

    /// Register a callback invoked with every delivered packet
    pub fn set_listener<F>(&mut self, listener: F)
    where
        F: FnMut(ReceiverPacket) + Send + 'static,
    {
        self.listener = Some(Box::new(listener));
    }

    /// Feed bytes read from the link
    pub fn on_bytes(&mut self, bytes: &[u8]) -> Option<ReceiverPacket> {
        let frames = self.decoder.ingest(bytes);
        for frame in &frames {
            if !frame.is_normal() {
                self.failsafe_frames += 1;
                debug!("SUMD: receiver reports {:?}", frame.state);
            }
        }

        let frame = frames.into_iter().last()?;
        let packet = frame
            .is_normal()
            .then(|| ReceiverPacket::from_frame(&frame, &self.map, &self.calibration));
        self.latest = Some(frame);

        let packet = packet?;
        if let Some(listener) = self.listener.as_mut() {
            listener(packet);
        }
        Some(packet)
    }

    /// Most recently decoded frame, whatever its state
    pub fn latest_frame(&self) -> Option<&SumdFrame> {
        self.latest.as_ref()
    }

    /// Frames that arrived in a non-normal state
    pub fn failsafe_frames(&self) -> u64 {
        self.failsafe_frames
    }

    pub fn stats(&self) -> DecoderStats {
        self.decoder.stats()
    }
}

impl std::fmt::Debug for Receiver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Receiver")
            .field("map", &self.map)
            .field("stats", &self.decoder.stats())
            .field("failsafe_frames", &self.failsafe_frames)
            .finish()
    }
}
