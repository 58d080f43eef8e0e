//! LED Pin Backends

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Full PWM brightness
pub const BRIGHTNESS_FULL: u8 = 255;
/// Daylight PWM brightness (30 %)
pub const BRIGHTNESS_DAYLIGHT: u8 = 76;

/// Individually driven LED outputs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Led {
    /// Blue mode indicator
    Autonomous,
    HeadlightLeft,
    HeadlightRight,
    BrakeLight,
    SignalLeft,
    SignalRight,
}

impl Led {
    /// Every output, in wiring order
    pub const ALL: [Led; 6] = [
        Led::Autonomous,
        Led::HeadlightLeft,
        Led::HeadlightRight,
        Led::BrakeLight,
        Led::SignalLeft,
        Led::SignalRight,
    ];

    /// Whether the output is PWM dimmable
    pub fn is_pwm(self) -> bool {
        matches!(self, Led::HeadlightLeft | Led::HeadlightRight | Led::BrakeLight)
    }
}

/// Hardware seam for the LED outputs
pub trait LedPins: Send + 'static {
    /// Switch a digital output
    fn write(&mut self, led: Led, on: bool);

    /// Set the PWM duty of a dimmable output
    fn pwm(&mut self, led: Led, brightness: u8);
}

/// Backend for hosts without GPIO: logs every change
#[derive(Debug, Default)]
pub struct LoggingPins {
    levels: [u8; 6],
}

impl LoggingPins {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last level written to `led` (0/1 for digital outputs)
    pub fn level(&self, led: Led) -> u8 {
        self.levels[led as usize]
    }

    fn set(&mut self, led: Led, level: u8) {
        let slot = &mut self.levels[led as usize];
        if *slot != level {
            *slot = level;
            debug!("LED {:?} -> {}", led, level);
        }
    }
}

impl LedPins for LoggingPins {
    fn write(&mut self, led: Led, on: bool) {
        self.set(led, on as u8);
    }

    fn pwm(&mut self, led: Led, brightness: u8) {
        self.set(led, brightness);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logging_pins_track_levels() {
        let mut pins = LoggingPins::new();
        pins.write(Led::Autonomous, true);
        pins.pwm(Led::BrakeLight, BRIGHTNESS_DAYLIGHT);

        assert_eq!(pins.level(Led::Autonomous), 1);
        assert_eq!(pins.level(Led::BrakeLight), 76);
        assert_eq!(pins.level(Led::SignalLeft), 0);
    }

    #[test]
    fn test_pwm_outputs() {
        let dimmable: Vec<_> = Led::ALL.iter().filter(|l| l.is_pwm()).collect();
        assert_eq!(dimmable.len(), 3);
    }
}
