//! Vehicle Lights
//!
//! High-level LED control for the car body. Three groups are managed:
//!
//! - **Blue**: driving mode (off, lateral blink, autonomous solid) and the
//!   setup-complete sequence
//! - **Yellow**: hazard lights and turn signals
//! - **White/red**: daylight, full beam and brake lights
//!
//! Hardware access goes through the [`LedPins`] trait.

mod controller;
mod pins;

pub use controller::{BlinkIntervals, LedController};
pub use pins::{Led, LedPins, LoggingPins, BRIGHTNESS_DAYLIGHT, BRIGHTNESS_FULL};
