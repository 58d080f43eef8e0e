//! Vehicle States

use serde::{Deserialize, Serialize};
use std::fmt;

/// Driving mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VehicleState {
    /// Booting; waiting for the first mode request
    Setup,
    /// Manual requested; motor held neutral until the throttle is released
    ManualWaiting,
    /// Receiver drives steering and throttle
    ManualControl,
    /// Companion steers, receiver controls throttle
    LateralControl,
    /// Companion drives steering and throttle
    Autonomous,
    /// Receiver lost; motor neutral, hazard lights
    FailSafe,
}

impl VehicleState {
    pub const ALL: [VehicleState; 6] = [
        VehicleState::Setup,
        VehicleState::ManualWaiting,
        VehicleState::ManualControl,
        VehicleState::LateralControl,
        VehicleState::Autonomous,
        VehicleState::FailSafe,
    ];

    pub fn name(self) -> &'static str {
        match self {
            VehicleState::Setup => "setup",
            VehicleState::ManualWaiting => "manual_waiting",
            VehicleState::ManualControl => "manual_control",
            VehicleState::LateralControl => "lateral_control",
            VehicleState::Autonomous => "autonomous",
            VehicleState::FailSafe => "fail_safe",
        }
    }

    /// Whether the companion device has authority in this state
    pub fn is_assisted(self) -> bool {
        matches!(self, VehicleState::LateralControl | VehicleState::Autonomous)
    }
}

impl fmt::Display for VehicleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
