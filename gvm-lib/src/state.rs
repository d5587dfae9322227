//! Last known settings of the light.

use crate::command::Setting;
use crate::constants::STATUS_PAYLOAD_SIZE;
use crate::frame::{Frame, MessageKind};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

/// Payload of a periodic status broadcast (message kind 0x03).
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct StatusPayloadRaw {
    pub power: u8,
    pub channel: u8,
    pub brightness: u8, // percent
    pub cct: u8,        // x100 K
    pub hue: u8,        // x5 degrees
    pub saturation: u8, // percent
}

/// Settings as last reported by the light. `None` until first reported.
///
/// Only decoded frames change this; setters on the session send a command and
/// wait for the light to confirm it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceState {
    pub(crate) power: Option<u8>,
    pub(crate) channel: Option<u8>,
    pub(crate) brightness: Option<u8>,
    pub(crate) color_temperature: Option<u8>,
    pub(crate) hue: Option<u8>,
    pub(crate) saturation: Option<u8>,
}

impl DeviceState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, setting: Setting) -> Option<u8> {
        match setting {
            Setting::Power => self.power,
            Setting::Channel => self.channel,
            Setting::Brightness => self.brightness,
            Setting::ColorTemperature => self.color_temperature,
            Setting::Hue => self.hue,
            Setting::Saturation => self.saturation,
        }
    }

    pub fn power(&self) -> Option<u8> {
        self.power
    }

    pub fn is_on(&self) -> Option<bool> {
        self.power.map(|p| p != 0)
    }

    pub fn channel(&self) -> Option<u8> {
        self.channel
    }

    pub fn brightness(&self) -> Option<u8> {
        self.brightness
    }

    /// Colour temperature code, hundreds of kelvin
    pub fn color_temperature(&self) -> Option<u8> {
        self.color_temperature
    }

    pub fn color_temperature_kelvin(&self) -> Option<u32> {
        self.color_temperature.map(|c| c as u32 * 100)
    }

    /// Hue code, units of 5 degrees
    pub fn hue(&self) -> Option<u8> {
        self.hue
    }

    pub fn hue_degrees(&self) -> Option<u16> {
        self.hue.map(|h| h as u16 * 5)
    }

    pub fn saturation(&self) -> Option<u8> {
        self.saturation
    }

    /// True once every field has been reported at least once.
    pub fn is_complete(&self) -> bool {
        Setting::ALL.iter().all(|s| self.get(*s).is_some())
    }

    /// Store a reported value. Values outside the setting's range are dropped.
    fn store(&mut self, setting: Setting, value: u8) {
        if !setting.contains(value) {
            debug!(%setting, value, "Reported value out of range, keeping previous");
            return;
        }
        let slot = match setting {
            Setting::Power => &mut self.power,
            Setting::Channel => &mut self.channel,
            Setting::Brightness => &mut self.brightness,
            Setting::ColorTemperature => &mut self.color_temperature,
            Setting::Hue => &mut self.hue,
            Setting::Saturation => &mut self.saturation,
        };
        *slot = Some(value);
    }

    /// Fold a validated frame into the state.
    ///
    /// Returns true when the frame counts as a status update: every status
    /// broadcast and every set acknowledge does, other kinds do not. A status
    /// broadcast too short to hold every field still counts but changes nothing.
    pub fn apply(&mut self, frame: &Frame) -> bool {
        match frame.kind {
            MessageKind::StatusReport => {
                let Ok((status, _)) = StatusPayloadRaw::ref_from_prefix(frame.payload.as_ref()) else {
                    debug!(len = frame.payload.len(), "Status payload shorter than {STATUS_PAYLOAD_SIZE} bytes");
                    return true;
                };
                self.store(Setting::Power, status.power);
                self.store(Setting::Channel, status.channel);
                self.store(Setting::Brightness, status.brightness);
                self.store(Setting::ColorTemperature, status.cct);
                self.store(Setting::Hue, status.hue);
                self.store(Setting::Saturation, status.saturation);
                true
            }
            MessageKind::SetAcknowledge => {
                // reserved, field code, value
                let [_, field, value, ..] = frame.payload.as_ref() else {
                    debug!(len = frame.payload.len(), "Set acknowledge payload too short");
                    return false;
                };
                match Setting::try_from(*field) {
                    Ok(setting) => self.store(setting, *value),
                    Err(_) => debug!(field, value, "Set acknowledge for unknown field"),
                }
                true
            }
            _ => false,
        }
    }
}

fn show<T: fmt::Display>(f: &mut fmt::Formatter<'_>, label: &str, value: Option<T>, unit: &str) -> fmt::Result {
    match value {
        Some(v) => write!(f, "{label} {v}{unit}"),
        None => write!(f, "{label} ?"),
    }
}

impl fmt::Display for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.is_on() {
            Some(true) => write!(f, "On")?,
            Some(false) => write!(f, "Off")?,
            None => write!(f, "Power ?")?,
        }
        write!(f, ", ")?;
        show(f, "Channel", self.channel, "")?;
        write!(f, ", ")?;
        show(f, "Brightness", self.brightness, "%")?;
        write!(f, ", ")?;
        show(f, "CCT", self.color_temperature_kelvin(), "K")?;
        write!(f, ", ")?;
        show(f, "Hue", self.hue_degrees(), "°")?;
        write!(f, ", ")?;
        show(f, "Saturation", self.saturation, "%")
    }
}
