//! VESC Command Ids

/// Command ids, numbered as in the VESC firmware's packet id enum.
///
/// Only the commands this crate sends or understands are listed; the
/// numeric values follow the firmware ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CommandId {
    FwVersion = 0,
    JumpToBootloader = 1,
    EraseNewApp = 2,
    WriteNewAppData = 3,
    GetValues = 4,
    SetDuty = 5,
    SetCurrent = 6,
    SetCurrentBrake = 7,
    SetRpm = 8,
    SetPos = 9,
    SetHandbrake = 10,
    SetDetect = 11,
    SetServoPos = 12,
    GetValuesSelective = 50,
}

impl CommandId {
    /// Look up a received id
    pub fn from_u8(id: u8) -> Option<Self> {
        use CommandId::*;
        Some(match id {
            0 => FwVersion,
            1 => JumpToBootloader,
            2 => EraseNewApp,
            3 => WriteNewAppData,
            4 => GetValues,
            5 => SetDuty,
            6 => SetCurrent,
            7 => SetCurrentBrake,
            8 => SetRpm,
            9 => SetPos,
            10 => SetHandbrake,
            11 => SetDetect,
            12 => SetServoPos,
            50 => GetValuesSelective,
            _ => return None,
        })
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}
