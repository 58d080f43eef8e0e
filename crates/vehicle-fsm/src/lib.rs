//! Vehicle State Machine
//!
//! Arbitrates between manual, lane-assisted (lateral) and autonomous
//! driving and falls back to a safe stop when the radio link goes quiet.
//!
//! All events go through [`Context`], which owns the current
//! [`VehicleState`], the one-slot history used to resume after
//! [`VehicleState::FailSafe`], and the motor and light outputs. Callers
//! share it as `Arc<Mutex<Context<_, _>>>` and hold the lock for the whole
//! event.

mod context;
mod monitor;
mod outputs;
mod state;

pub use context::{Context, LinkTimeouts};
pub use monitor::LinkMonitor;
pub use outputs::{LightOutput, MotorOutput};
pub use state::VehicleState;

/// Throttle at or below which the receiver counts as released
pub const MOTOR_RESET_THRESHOLD: f32 = 0.005;
