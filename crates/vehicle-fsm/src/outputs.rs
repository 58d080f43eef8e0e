//! Output Seams
//!
//! The state machine commands the motor controller and the lights only
//! through these traits.

use lights::{LedController, LedPins};
use vehicle_link::Transport;
use vesc_protocol::{SendOutcome, VescDriver};

/// Motor controller commands used by the state machine
pub trait MotorOutput: Send {
    /// Normalized steering in `[0, 1]`
    fn set_servo_pos(&self, pos: f32) -> SendOutcome;
    /// Steering already in servo space
    fn set_raw_servo(&self, servo: f32) -> SendOutcome;
    /// Normalized throttle in `[0, 1]`
    fn set_duty_cycle(&self, requested: f32, reverse: bool) -> SendOutcome;
    /// Signed duty cycle already in car duty space
    fn set_raw_duty(&self, duty: f32) -> SendOutcome;
}

/// Light mode requests used by the state machine
pub trait LightOutput: Send {
    fn autonomous_on(&self);
    fn autonomous_off(&self);
    fn lateral_on(&self);
    fn setup_complete_signal(&self);
    fn hazard_on(&self);
    fn hazard_off(&self);
    fn daylight_on(&self);
    fn all_off(&self);
}

impl<T: Transport> MotorOutput for VescDriver<T> {
    fn set_servo_pos(&self, pos: f32) -> SendOutcome {
        VescDriver::set_servo_pos(self, pos)
    }

    fn set_raw_servo(&self, servo: f32) -> SendOutcome {
        VescDriver::set_raw_servo(self, servo)
    }

    fn set_duty_cycle(&self, requested: f32, reverse: bool) -> SendOutcome {
        VescDriver::set_duty_cycle(self, requested, reverse)
    }

    fn set_raw_duty(&self, duty: f32) -> SendOutcome {
        VescDriver::set_raw_duty(self, duty)
    }
}

impl<P: LedPins> LightOutput for LedController<P> {
    fn autonomous_on(&self) {
        self.turn_on_autonomous();
    }

    fn autonomous_off(&self) {
        self.turn_off_autonomous();
    }

    fn lateral_on(&self) {
        self.turn_on_lateral();
    }

    fn setup_complete_signal(&self) {
        self.signal_setup_complete();
    }

    fn hazard_on(&self) {
        self.turn_on_hazard();
    }

    fn hazard_off(&self) {
        self.turn_off_hazard();
    }

    fn daylight_on(&self) {
        self.turn_on_daylight();
    }

    fn all_off(&self) {
        LedController::all_off(self);
    }
}
