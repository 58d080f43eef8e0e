//! Vehicle Control Daemon
//!
//! Wires the radio receiver, the motor controller, the companion link and
//! the lights to the vehicle state machine, and keeps the link watchdog
//! ticking.

pub mod config;
mod daemon;

pub use config::{ConfigError, VehicleConfig, DEFAULT_CONFIG_PATH};
pub use daemon::{run, VehicleContext, SHUTDOWN_GRACE};

use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Install the global tracing subscriber
pub fn init_logging(level: Level) -> anyhow::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}
