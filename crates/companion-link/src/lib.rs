//! Companion Device Link
//!
//! The companion device (phone or onboard computer) steers the car in the
//! assisted modes and mirrors its telemetry. Messages travel as JSON over
//! MQTT, one topic per channel:
//!
//! - `Internal` (0x00): connection updates for companion devices
//! - `Drive` (0x01): steering/throttle commands
//! - `Status` (0x11): motor controller telemetry, published
//! - `Receiver` (0x13): radio receiver packets, published

mod error;
mod link;
mod messages;

pub use error::CompanionError;
pub use link::{CompanionConfig, CompanionEvent, CompanionLink, Publisher, publish_json};
pub use messages::{
    Channel, ConnectionStatus, ConnectionUpdate, DriveCommand, ReceiverReport, StatusReport,
};
