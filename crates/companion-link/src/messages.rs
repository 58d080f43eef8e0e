//! Companion Message Types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sumd_protocol::{Gear, ReceiverPacket};
use vesc_protocol::VescData;

/// Message channels, keyed by their wire id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Internal,
    Drive,
    Status,
    Receiver,
}

impl Channel {
    /// Channels the car subscribes to
    pub const INBOUND: [Channel; 2] = [Channel::Internal, Channel::Drive];

    pub fn id(self) -> u16 {
        match self {
            Channel::Internal => 0x00,
            Channel::Drive => 0x01,
            Channel::Status => 0x11,
            Channel::Receiver => 0x13,
        }
    }

    pub fn from_id(id: u16) -> Option<Self> {
        match id {
            0x00 => Some(Channel::Internal),
            0x01 => Some(Channel::Drive),
            0x11 => Some(Channel::Status),
            0x13 => Some(Channel::Receiver),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Channel::Internal => "internal",
            Channel::Drive => "drive",
            Channel::Status => "status",
            Channel::Receiver => "receiver",
        }
    }

    /// MQTT topic of this channel, e.g. `car/0011`
    pub fn topic(self, prefix: &str) -> String {
        format!("{}/{:04x}", prefix, self.id())
    }

    /// Channel a topic under `prefix` belongs to
    pub fn from_topic(prefix: &str, topic: &str) -> Option<Self> {
        let id = topic.strip_prefix(prefix)?.strip_prefix('/')?;
        if id.len() != 4 {
            return None;
        }
        u16::from_str_radix(id, 16).ok().and_then(Self::from_id)
    }
}

/// Steering and throttle request from the companion device
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DriveCommand {
    /// Normalized steering, 0.5 is straight ahead
    pub steer: f32,
    /// Normalized throttle in `[0, 1]`
    pub throttle: f32,
    #[serde(default)]
    pub reverse: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
}

/// A companion device (dis)connected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionUpdate {
    pub device_id: u32,
    pub status: ConnectionStatus,
}

impl ConnectionUpdate {
    pub fn is_connected(&self) -> bool {
        self.status == ConnectionStatus::Connected
    }
}

/// Full scale of the receiver report's analog fields
const REPORT_SCALE: f32 = 65000.0;

/// Receiver packet as mirrored to the companion device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiverReport {
    pub timestamp: DateTime<Utc>,
    /// Throttle scaled to `0..=65000`
    pub throttle: u16,
    /// Steering scaled to `0..=65000`
    pub steering: u16,
    /// 0 undefined, 1 drive, 2 reverse
    pub gear: u8,
    pub lateral_control: bool,
    pub autonomous: bool,
}

impl From<&ReceiverPacket> for ReceiverReport {
    fn from(packet: &ReceiverPacket) -> Self {
        Self {
            timestamp: Utc::now(),
            throttle: scale(packet.throttle),
            steering: scale(packet.steering),
            gear: match packet.gear {
                Gear::Undefined => 0,
                Gear::Drive => 1,
                Gear::Reverse => 2,
            },
            lateral_control: packet.lateral_control,
            autonomous: packet.autonomous,
        }
    }
}

fn scale(value: f32) -> u16 {
    (value.clamp(0.0, 1.0) * REPORT_SCALE) as u16
}

/// Motor controller telemetry, fixed point with the controller's own scaling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusReport {
    pub timestamp: DateTime<Utc>,
    /// MOSFET temperature in 0.1 °C
    pub mosfet_temp: i32,
    /// Motor temperature in 0.1 °C
    pub motor_temp: i32,
    pub rpm: i32,
    /// Input voltage in 0.1 V
    pub voltage: i32,
    pub ticks: i32,
    pub ticks_abs: i32,
}

impl From<&VescData> for StatusReport {
    fn from(data: &VescData) -> Self {
        Self {
            timestamp: Utc::now(),
            mosfet_temp: (data.mosfet_temp * 10.0).round() as i32,
            motor_temp: (data.motor_temp * 10.0).round() as i32,
            rpm: data.rpm,
            voltage: (data.voltage * 10.0).round() as i32,
            ticks: data.ticks,
            ticks_abs: data.ticks_abs,
        }
    }
}
