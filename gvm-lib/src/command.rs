//! Outbound set commands.
//!
//! A set command is a fixed 12-byte frame:
//!
//! ```text
//! 4C54 09 00 30 57 00 02 01 32 4A8F
//! |    |  |  |  |  |  |  |  |  +-- CRC-16/XMODEM, big endian
//! |    |  |  |  |  |  |  |  +----- value (0x32 = 50)
//! |    |  |  |  |  |  |  +-------- argument count
//! |    |  |  |  |  |  +----------- field code (2 = brightness)
//! |    |  |  |  |  +-------------- reserved
//! |    |  |  |  +----------------- message kind 0x57 ('W', set variable)
//! |    |  |  +-------------------- device type
//! |    |  +----------------------- device id
//! |    +-------------------------- length after header, checksum included
//! +------------------------------- magic "LT"
//! ```

use crate::constants::{CHECKSUM_SIZE, HEADER_SIZE, MAGIC, SET_ARG_COUNT, SET_DEVICE_ID, SET_DEVICE_TYPE};
use crate::crc::crc16_xmodem;
use crate::frame::MessageKind;
use crate::hex;
use bytes::{BufMut, BytesMut};
use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use strum_macros::{Display, EnumString};

/// Size of an encoded set command in bytes
pub const SET_FRAME_SIZE: usize = HEADER_SIZE + 3 + 4 + CHECKSUM_SIZE;

/// A light variable that can be read from status frames and set by command.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoPrimitive, TryFromPrimitive, Serialize, Deserialize,
)]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
#[serde(rename_all = "kebab-case")]
#[repr(u8)]
pub enum Setting {
    /// 0 when the light is soft-off, 1 when on
    Power = 0,
    Channel = 1,
    /// Percent
    Brightness = 2,
    /// Hundreds of kelvin (32 = 3200 K)
    #[strum(to_string = "color-temperature", serialize = "cct")]
    ColorTemperature = 3,
    /// Units of 5 degrees (72 = 360°)
    Hue = 4,
    /// Percent
    Saturation = 5,
}

impl Setting {
    pub const ALL: [Setting; 6] = [
        Setting::Power,
        Setting::Channel,
        Setting::Brightness,
        Setting::ColorTemperature,
        Setting::Hue,
        Setting::Saturation,
    ];

    /// Valid wire values for this setting.
    pub fn range(self) -> RangeInclusive<u8> {
        match self {
            Setting::Power => 0..=1,
            Setting::Channel => 1..=12,
            Setting::Brightness => 0..=100,
            Setting::ColorTemperature => 32..=56,
            Setting::Hue => 0..=72,
            Setting::Saturation => 0..=100,
        }
    }

    /// Clamp a caller-supplied value into [`Setting::range`].
    pub fn clamp(self, value: i32) -> u8 {
        let range = self.range();
        // both bounds fit in u8, so the cast is lossless
        value.clamp(*range.start() as i32, *range.end() as i32) as u8
    }

    pub fn contains(self, value: u8) -> bool {
        self.range().contains(&value)
    }
}

/// A request to change one setting. Produces exactly one wire frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Command {
    setting: Setting,
    value: u8,
}

impl Command {
    /// Build a set command, clamping `value` into the setting's range.
    pub fn new(setting: Setting, value: i32) -> Self {
        Self {
            setting,
            value: setting.clamp(value),
        }
    }

    pub fn setting(&self) -> Setting {
        self.setting
    }

    /// The clamped value that goes on the wire
    pub fn value(&self) -> u8 {
        self.value
    }

    /// Frame bytes up to, not including, the checksum.
    pub fn body(&self) -> BytesMut {
        let mut body = BytesMut::with_capacity(SET_FRAME_SIZE - CHECKSUM_SIZE);
        body.put_slice(&MAGIC);
        body.put_u8((SET_FRAME_SIZE - HEADER_SIZE) as u8);
        body.put_u8(SET_DEVICE_ID);
        body.put_u8(SET_DEVICE_TYPE);
        body.put_u8(MessageKind::SetVariable.into());
        body.put_u8(0x00);
        body.put_u8(self.setting.into());
        body.put_u8(SET_ARG_COUNT);
        body.put_u8(self.value);
        body
    }

    /// Hex text ready to broadcast verbatim.
    pub fn encode(&self) -> String {
        let mut text = hex::encode(&self.body());
        let crc = crc16_xmodem(text.as_bytes());
        text.push_str(&hex::encode_be16(crc));
        text
    }
}

/// Encode a set command for `setting`, clamping `value` first.
pub fn encode_set_command(setting: Setting, value: i32) -> String {
    Command::new(setting, value).encode()
}
