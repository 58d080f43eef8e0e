//! Receiver Control Packets

use crate::consts::MAX_CHANNELS;
use crate::error::ChannelMapError;
use crate::frame::SumdFrame;
use serde::{Deserialize, Serialize};
use vehicle_link::Calibration;

/// Gear selected on the transmitter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gear {
    #[default]
    Undefined,
    Drive,
    Reverse,
}

/// Control values derived from one receiver frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ReceiverPacket {
    /// Duty cycle in car duty space `[0, max_duty]`
    pub throttle: f32,
    /// Servo position in servo space
    pub steering: f32,
    pub gear: Gear,
    /// Autonomy switch out of its manual position
    pub lateral_control: bool,
    /// Autonomy switch in its fully autonomous position
    pub autonomous: bool,
}

impl ReceiverPacket {
    /// Convert a decoded frame using `map` and the car calibration
    pub fn from_frame(frame: &SumdFrame, map: &ChannelMap, calibration: &Calibration) -> Self {
        let autonomy = frame.percent(map.autonomy);
        Self {
            throttle: calibration.throttle_from_percent(frame.percent(map.throttle)),
            steering: calibration.steering_from_percent(frame.percent(map.steering)),
            gear: if frame.percent(map.gear) > 0.0 {
                Gear::Drive
            } else {
                Gear::Reverse
            },
            lateral_control: autonomy > -0.5,
            autonomous: autonomy > 0.5,
        }
    }

    /// Throttle signed by gear; zero while the gear is undefined
    pub fn signed_throttle(&self) -> f32 {
        match self.gear {
            Gear::Drive => self.throttle,
            Gear::Reverse => -self.throttle,
            Gear::Undefined => 0.0,
        }
    }
}

/// Zero-based channel index of each control function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelMap {
    pub throttle: usize,
    pub steering: usize,
    pub gear: usize,
    pub autonomy: usize,
}

impl Default for ChannelMap {
    fn default() -> Self {
        Self {
            throttle: 1,
            steering: 2,
            gear: 3,
            autonomy: 4,
        }
    }
}

impl ChannelMap {
    /// Check every index is in range and no channel is used twice
    pub fn validate(&self) -> Result<(), ChannelMapError> {
        let functions = self.functions();
        for (function, index) in functions {
            if index >= MAX_CHANNELS {
                return Err(ChannelMapError::OutOfRange {
                    function,
                    index,
                    max: MAX_CHANNELS - 1,
                });
            }
        }
        for (i, &(first, index)) in functions.iter().enumerate() {
            if let Some(&(second, _)) = functions[i + 1..].iter().find(|(_, other)| *other == index) {
                return Err(ChannelMapError::Duplicate {
                    first,
                    second,
                    index,
                });
            }
        }
        Ok(())
    }

    fn functions(&self) -> [(&'static str, usize); 4] {
        [
            ("throttle", self.throttle),
            ("steering", self.steering),
            ("gear", self.gear),
            ("autonomy", self.autonomy),
        ]
    }
}
