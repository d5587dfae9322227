//! Wireless station collaborator.
//!
//! Joining the light's access point is the host platform's business. The
//! session drives it through [`WifiStation`] and learns about a dropped link
//! through a [`DisconnectSignal`], the only thing the platform may touch from
//! its own event context.

use crate::error::GvmError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// MAC address of an access point.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Bssid(pub [u8; 6]);

impl fmt::Display for Bssid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

/// One result of a network scan, or the access point the station remembers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessPoint {
    pub ssid: String,
    /// RSSI in dBm
    pub signal: i32,
    pub bssid: Bssid,
    pub channel: u8,
}

/// Association state reported by the station.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    Idle,
    Connecting,
    Associated,
    Failed,
}

/// Set from the platform's event context when the station loses its link.
///
/// Cloning shares the flag. Raising it is the only cross-context operation.
#[derive(Debug, Clone, Default)]
pub struct DisconnectSignal(Arc<AtomicBool>);

impl DisconnectSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub(crate) fn clear(&self) {
        self.0.store(false, Ordering::Release);
    }
}

/// The platform's wireless station.
pub trait WifiStation {
    /// Access point the station is already configured for, if any.
    fn remembered(&self) -> Option<AccessPoint> {
        None
    }

    /// Drop any association and forget the stored configuration.
    fn reset(&mut self) -> Result<(), GvmError>;

    /// Scan for visible access points.
    fn scan(&mut self) -> Result<Vec<AccessPoint>, GvmError>;

    /// Start associating with `ap`. Returns once the attempt is under way;
    /// progress is observed through [`WifiStation::status`].
    fn begin(&mut self, ap: &AccessPoint, password: &str) -> Result<(), GvmError>;

    fn status(&self) -> LinkStatus;
}

/// Station for hosts that are already on the light's network, such as a PC
/// joined to the light's access point by the operating system. It remembers a
/// single, already associated access point and has nothing else to scan.
#[derive(Debug, Clone)]
pub struct HostStation {
    ap: AccessPoint,
}

impl HostStation {
    pub fn new(ssid: impl Into<String>) -> Self {
        Self {
            ap: AccessPoint {
                ssid: ssid.into(),
                signal: 0,
                bssid: Bssid::default(),
                channel: 0,
            },
        }
    }
}

impl WifiStation for HostStation {
    fn remembered(&self) -> Option<AccessPoint> {
        Some(self.ap.clone())
    }

    fn reset(&mut self) -> Result<(), GvmError> {
        Ok(())
    }

    fn scan(&mut self) -> Result<Vec<AccessPoint>, GvmError> {
        Ok(Vec::new())
    }

    fn begin(&mut self, _ap: &AccessPoint, _password: &str) -> Result<(), GvmError> {
        Ok(())
    }

    fn status(&self) -> LinkStatus {
        LinkStatus::Associated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bssid_display() {
        let bssid = Bssid([0xAC, 0x67, 0xB2, 0x0F, 0x00, 0x1D]);
        assert_eq!(bssid.to_string(), "ac:67:b2:0f:00:1d");
    }

    #[test]
    fn test_host_station_only_remembers() {
        let mut station = HostStation::new("GVM_LED");
        let ap = station.remembered().expect("remembered access point");
        assert_eq!(ap.ssid, "GVM_LED");
        assert!(station.scan().unwrap().is_empty());
        assert_eq!(station.status(), LinkStatus::Associated);
    }

    #[test]
    fn test_disconnect_signal_is_shared() {
        let signal = DisconnectSignal::new();
        let platform_side = signal.clone();
        assert!(!signal.is_raised());
        platform_side.raise();
        assert!(signal.is_raised());
        signal.clear();
        assert!(!platform_side.is_raised());
    }
}
