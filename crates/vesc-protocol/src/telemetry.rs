//! Motor Controller Telemetry

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Value mask sent with `GetValuesSelective`: FET and motor temperature,
/// rpm, input voltage, tachometer and absolute tachometer
pub const SELECTIVE_VALUES_MASK: u32 = 0x0000_6183;

/// One telemetry snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct VescData {
    /// MOSFET temperature in °C
    pub mosfet_temp: f32,
    /// Motor temperature in °C
    pub motor_temp: f32,
    /// Electrical rpm
    pub rpm: i32,
    /// Input voltage in volts
    pub voltage: f32,
    /// Tachometer, signed
    pub ticks: i32,
    /// Tachometer, absolute
    pub ticks_abs: i32,
}

impl VescData {
    /// Unpack a `GetValuesSelective` reply body (after the command id).
    ///
    /// Returns `None` if the body is too short for the requested fields.
    pub fn from_selective(body: &[u8]) -> Option<Self> {
        let mut cursor = Cursor::new(body);
        let mask = cursor.u32()?;
        if mask != SELECTIVE_VALUES_MASK {
            debug!("VESC: unexpected value mask {:08X}", mask);
        }

        Some(Self {
            mosfet_temp: cursor.i16()? as f32 / 10.0,
            motor_temp: cursor.i16()? as f32 / 10.0,
            rpm: cursor.i32()?,
            voltage: cursor.i16()? as f32 / 10.0,
            ticks: cursor.i32()?,
            ticks_abs: cursor.i32()?,
        })
    }

    /// Serialize in `GetValuesSelective` reply layout, command id included
    pub fn to_selective(&self) -> Vec<u8> {
        let mut out = vec![crate::CommandId::GetValuesSelective.as_u8()];
        out.extend_from_slice(&SELECTIVE_VALUES_MASK.to_be_bytes());
        out.extend_from_slice(&((self.mosfet_temp * 10.0).round() as i16).to_be_bytes());
        out.extend_from_slice(&((self.motor_temp * 10.0).round() as i16).to_be_bytes());
        out.extend_from_slice(&self.rpm.to_be_bytes());
        out.extend_from_slice(&((self.voltage * 10.0).round() as i16).to_be_bytes());
        out.extend_from_slice(&self.ticks.to_be_bytes());
        out.extend_from_slice(&self.ticks_abs.to_be_bytes());
        out
    }
}

/// Big-endian read cursor shared by every field of a reply
struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take<const N: usize>(&mut self) -> Option<[u8; N]> {
        let slice = self.bytes.get(self.pos..self.pos + N)?;
        self.pos += N;
        slice.try_into().ok()
    }

    fn i16(&mut self) -> Option<i16> {
        self.take().map(i16::from_be_bytes)
    }

    fn i32(&mut self) -> Option<i32> {
        self.take().map(i32::from_be_bytes)
    }

    fn u32(&mut self) -> Option<u32> {
        self.take().map(u32::from_be_bytes)
    }
}

type TelemetryListener = Box<dyn FnMut(&VescData) + Send>;

/// Latest-value cache with an optional listener
#[derive(Default)]
pub struct Telemetry {
    latest: Option<VescData>,
    updates: u64,
    listener: Option<TelemetryListener>,
}

impl Telemetry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback invoked on every update
    pub fn set_listener<F>(&mut self, listener: F)
    where
        F: FnMut(&VescData) + Send + 'static,
    {
        self.listener = Some(Box::new(listener));
    }

    /// Store `data` and notify the listener
    pub fn update(&mut self, data: VescData) {
        self.latest = Some(data);
        self.updates += 1;
        if let Some(listener) = self.listener.as_mut() {
            listener(&data);
        }
    }

    /// Most recent snapshot
    pub fn latest(&self) -> Option<&VescData> {
        self.latest.as_ref()
    }

    pub fn updates(&self) -> u64 {
        self.updates
    }
}

impl std::fmt::Debug for Telemetry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Telemetry")
            .field("latest", &self.latest)
            .field("updates", &self.updates)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn sample() -> VescData {
        VescData {
            mosfet_temp: 31.5,
            motor_temp: -4.2,
            rpm: -12345,
            voltage: 11.7,
            ticks: -800,
            ticks_abs: 2400,
        }
    }

    #[test]
    fn test_unpack_selective_reply() {
        let mut body = SELECTIVE_VALUES_MASK.to_be_bytes().to_vec();
        body.extend_from_slice(&315i16.to_be_bytes());
        body.extend_from_slice(&(-42i16).to_be_bytes());
        body.extend_from_slice(&(-12345i32).to_be_bytes());
        body.extend_from_slice(&117i16.to_be_bytes());
        body.extend_from_slice(&(-800i32).to_be_bytes());
        body.extend_from_slice(&2400i32.to_be_bytes());

        assert_eq!(VescData::from_selective(&body), Some(sample()));
    }

    #[test]
    fn test_truncated_reply() {
        let encoded = sample().to_selective();
        assert!(VescData::from_selective(&encoded[1..encoded.len() - 1]).is_none());
    }

    #[test]
    fn test_listener_sees_updates() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let mut telemetry = Telemetry::new();
        telemetry.set_listener(move |data| sink.lock().unwrap().push(data.rpm));

        telemetry.update(sample());
        telemetry.update(VescData { rpm: 7, ..sample() });

        assert_eq!(*seen.lock().unwrap(), vec![-12345, 7]);
        assert_eq!(telemetry.latest().map(|d| d.rpm), Some(7));
        assert_eq!(telemetry.updates(), 2);
    }
}
