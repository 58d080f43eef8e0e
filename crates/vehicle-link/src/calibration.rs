//! Car-Specific Output Calibration

use crate::error::LinkError;
use serde::{Deserialize, Serialize};

/// Scaling that maps normalized control values onto this car's hardware.
///
/// The receiver decoder and the motor controller encoder share one
/// calibration so that a stick position and a companion-device command end
/// up at the same servo position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Calibration {
    /// Half-range of servo travel around center (servo units)
    pub steering_max_delta: f32,
    /// Servo position offset of mechanical center from 0.5
    pub steering_offset: f32,
    /// Largest duty cycle the motor controller is ever asked for
    pub throttle_max_duty_cycle: f32,
    /// Servo position commanded on fail-safe (servo units)
    pub failsafe_steering: f32,
    /// Duty cycle commanded on fail-safe
    pub failsafe_duty_cycle: f32,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            steering_max_delta: 0.3,
            steering_offset: 0.1,
            throttle_max_duty_cycle: 0.2,
            failsafe_steering: 0.6,
            failsafe_duty_cycle: 0.0,
        }
    }
}

impl Calibration {
    /// Servo position for a signed stick deflection in `[-1, 1]`
    pub fn steering_from_percent(&self, percent: f32) -> f32 {
        percent * -self.steering_max_delta + 0.5 + self.steering_offset
    }

    /// Servo position for a normalized steering request in `[0, 1]`
    pub fn servo_from_normalized(&self, pos: f32) -> f32 {
        self.steering_from_percent(pos * 2.0 - 1.0)
    }

    /// Normalized steering request that maps to servo position `servo`
    pub fn normalized_from_servo(&self, servo: f32) -> f32 {
        let percent = (servo - 0.5 - self.steering_offset) / -self.steering_max_delta;
        (percent + 1.0) / 2.0
    }

    /// Duty cycle for a throttle stick deflection in `[-1, 1]`
    pub fn throttle_from_percent(&self, percent: f32) -> f32 {
        (percent * 0.5 + 0.5) * self.throttle_max_duty_cycle
    }

    /// Duty cycle for a normalized throttle request in `[0, 1]`
    pub fn duty_from_normalized(&self, requested: f32) -> f32 {
        requested * self.throttle_max_duty_cycle
    }

    /// Check that the calibration keeps every output inside `[0, 1]`
    pub fn validate(&self) -> Result<(), LinkError> {
        let center = 0.5 + self.steering_offset;
        if !(0.0..=0.5).contains(&self.steering_max_delta) {
            return Err(LinkError::InvalidCalibration(format!(
                "steering_max_delta {} outside [0, 0.5]",
                self.steering_max_delta
            )));
        }
        if center - self.steering_max_delta < 0.0 || center + self.steering_max_delta > 1.0 {
            return Err(LinkError::InvalidCalibration(format!(
                "steering range {}±{} leaves [0, 1]",
                center, self.steering_max_delta
            )));
        }
        if !(0.0..=1.0).contains(&self.throttle_max_duty_cycle) {
            return Err(LinkError::InvalidCalibration(format!(
                "throttle_max_duty_cycle {} outside [0, 1]",
                self.throttle_max_duty_cycle
            )));
        }
        if !(0.0..=1.0).contains(&self.failsafe_steering) {
            return Err(LinkError::InvalidCalibration(format!(
                "failsafe_steering {} outside [0, 1]",
                self.failsafe_steering
            )));
        }
        if self.failsafe_duty_cycle.abs() > self.throttle_max_duty_cycle {
            return Err(LinkError::InvalidCalibration(format!(
                "failsafe_duty_cycle {} exceeds max duty {}",
                self.failsafe_duty_cycle, self.throttle_max_duty_cycle
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(Calibration::default().validate().is_ok());
    }

    #[test]
    fn test_center_stick_is_failsafe_steering() {
        let cal = Calibration::default();
        assert!((cal.steering_from_percent(0.0) - cal.failsafe_steering).abs() < 1e-6);
        assert!((cal.servo_from_normalized(0.5) - 0.6).abs() < 1e-6);
    }

    #[test]
    fn test_normalized_servo_inverse() {
        let cal = Calibration::default();
        for pos in [0.0f32, 0.25, 0.5, 0.9, 1.0] {
            let back = cal.normalized_from_servo(cal.servo_from_normalized(pos));
            assert!((back - pos).abs() < 1e-5);
        }
    }

    #[test]
    fn test_throttle_scaling() {
        let cal = Calibration::default();
        assert_eq!(cal.throttle_from_percent(-1.0), 0.0);
        assert!((cal.throttle_from_percent(1.0) - 0.2).abs() < 1e-6);
        assert!((cal.duty_from_normalized(0.5) - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_rejects_out_of_range_servo_travel() {
        let cal = Calibration {
            steering_offset: 0.4,
            ..Default::default()
        };
        assert!(matches!(cal.validate(), Err(LinkError::InvalidCalibration(_))));
    }
}
