//! VESC Command Driver

use crate::command::CommandId;
use crate::frame::encode_frame;
use crate::telemetry::SELECTIVE_VALUES_MASK;
use metrics::counter;
use tracing::{trace, warn};
use vehicle_link::{Calibration, Transport};

/// Result of a command request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Encoded and handed to the transport
    Sent,
    /// Argument out of range; nothing was sent
    Rejected,
    /// Encoded but the transport refused it
    Failed,
}

impl SendOutcome {
    pub fn is_sent(self) -> bool {
        self == SendOutcome::Sent
    }
}

/// Encodes motor and servo commands and writes them to a transport.
///
/// Normalized requests are mapped through the car [`Calibration`]; the
/// `raw` variants take values that are already in duty or servo space.
#[derive(Debug, Clone)]
pub struct VescDriver<T> {
    transport: T,
    calibration: Calibration,
}

impl<T: Transport> VescDriver<T> {
    /// Create a new driver writing to `transport`
    pub fn new(transport: T, calibration: Calibration) -> Self {
        Self {
            transport,
            calibration,
        }
    }

    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    /// Normalized throttle request in `[0, 1]`, negated when `reverse`
    pub fn set_duty_cycle(&self, requested: f32, reverse: bool) -> SendOutcome {
        if !(0.0..=1.0).contains(&requested) {
            return self.reject("duty cycle", requested);
        }
        let duty = self.calibration.duty_from_normalized(requested);
        self.send_duty(if reverse { -duty } else { duty })
    }

    /// Duty cycle already in car duty space, `|duty| <= max duty`
    pub fn set_raw_duty(&self, duty: f32) -> SendOutcome {
        if !duty.is_finite() || duty.abs() > self.calibration.throttle_max_duty_cycle {
            return self.reject("raw duty", duty);
        }
        self.send_duty(duty)
    }

    /// Motor current in amps
    pub fn set_current(&self, amps: f32) -> SendOutcome {
        if !amps.is_finite() {
            return self.reject("current", amps);
        }
        self.send_i32(CommandId::SetCurrent, (amps * 1000.0) as i32)
    }

    /// Braking current in amps
    pub fn set_current_brake(&self, amps: f32) -> SendOutcome {
        if !amps.is_finite() || amps < 0.0 {
            return self.reject("brake current", amps);
        }
        self.send_i32(CommandId::SetCurrentBrake, (amps * 1000.0) as i32)
    }

    /// Normalized steering request in `[0, 1]`, 0.5 is straight ahead
    pub fn set_servo_pos(&self, pos: f32) -> SendOutcome {
        if !(0.0..=1.0).contains(&pos) {
            return self.reject("servo position", pos);
        }
        self.send_servo(self.calibration.servo_from_normalized(pos))
    }

    /// Servo position already in servo space, `[0, 1]`
    pub fn set_raw_servo(&self, servo: f32) -> SendOutcome {
        if !(0.0..=1.0).contains(&servo) {
            return self.reject("raw servo", servo);
        }
        self.send_servo(servo)
    }

    /// Ask for a `GetValuesSelective` telemetry reply
    pub fn request_state(&self) -> SendOutcome {
        let mut payload = vec![CommandId::GetValuesSelective.as_u8()];
        payload.extend_from_slice(&SELECTIVE_VALUES_MASK.to_be_bytes());
        self.send(&payload)
    }

    fn send_duty(&self, duty: f32) -> SendOutcome {
        self.send_i32(CommandId::SetDuty, (duty * 100_000.0) as i32)
    }

    fn send_servo(&self, servo: f32) -> SendOutcome {
        let mut payload = vec![CommandId::SetServoPos.as_u8()];
        payload.extend_from_slice(&((servo * 1000.0) as i16).to_be_bytes());
        self.send(&payload)
    }

    fn send_i32(&self, id: CommandId, value: i32) -> SendOutcome {
        let mut payload = vec![id.as_u8()];
        payload.extend_from_slice(&value.to_be_bytes());
        self.send(&payload)
    }

    fn send(&self, payload: &[u8]) -> SendOutcome {
        let frame = match encode_frame(payload) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("VESC: {}", e);
                return SendOutcome::Rejected;
            }
        };
        trace!("VESC: -> {:02X?}", frame);
        match self.transport.write(&frame) {
            Ok(()) => SendOutcome::Sent,
            Err(e) => {
                warn!("VESC: write failed: {}", e);
                SendOutcome::Failed
            }
        }
    }

    fn reject(&self, what: &str, value: f32) -> SendOutcome {
        warn!("VESC: {} {} out of range, not sent", what, value);
        counter!("vesc_commands_rejected").increment(1);
        SendOutcome::Rejected
    }
}
