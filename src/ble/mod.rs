//! Bluetooth Low Energy side of the session.
//!
//! 1. **uuids** - the fixed attribute identifiers of the CoreHub firmware.
//! 2. **transport** - the attribute-access seam every routine drives.
//! 3. **connection** - the connection state machine.
//! 4. **host** - btleplug implementation of the transport (feature `host`).

pub mod connection;
#[cfg(feature = "host")]
pub mod host;
pub mod transport;
pub mod uuids;

use core::fmt;

use crate::config;

/// A peripheral handed over by the scan.
///
/// Owned by the session once accepted; routines borrow it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PeripheralHandle {
    /// Transport-level identifier (platform peripheral id).
    pub id: String,
    /// BLE address, most significant byte first.
    pub address: [u8; 6],
    /// Advertised name, truncated to `PERIPHERAL_NAME_CAPACITY` bytes.
    pub name: heapless::String<{ config::PERIPHERAL_NAME_CAPACITY }>,
    /// Signal strength at discovery time (dBm), when the scan reported one.
    pub rssi: Option<i16>,
}

impl PeripheralHandle {
    pub fn new(id: impl Into<String>, address: [u8; 6], name: &str) -> Self {
        let mut n = heapless::String::new();
        for c in name.chars() {
            if n.push(c).is_err() {
                break;
            }
        }
        Self {
            id: id.into(),
            address,
            name: n,
            rssi: None,
        }
    }

    pub fn with_rssi(mut self, rssi: i16) -> Self {
        self.rssi = Some(rssi);
        self
    }

    /// Address in the usual `AA:BB:CC:DD:EE:FF` notation.
    pub fn address_string(&self) -> String {
        let [a, b, c, d, e, f] = self.address;
        format!("{a:02X}:{b:02X}:{c:02X}:{d:02X}:{e:02X}:{f:02X}")
    }
}

impl fmt::Display for PeripheralHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.id, self.address_string())
    }
}

/// Options applied when the link is established.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConnectionOptions {
    pub auto_reconnect: bool,
    pub mtu: u16,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            auto_reconnect: config::DEFAULT_AUTO_RECONNECT,
            mtu: config::DEFAULT_CONNECT_MTU,
        }
    }
}

/// Radio/adapter state as reported by the platform.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AdapterState {
    #[default]
    Unknown,
    Resetting,
    Unsupported,
    Unauthorized,
    PoweredOff,
    PoweredOn,
}

impl AdapterState {
    pub const fn as_str(self) -> &'static str {
        match self {
            AdapterState::Unknown => "Unknown",
            AdapterState::Resetting => "Resetting",
            AdapterState::Unsupported => "Unsupported",
            AdapterState::Unauthorized => "Unauthorized",
            AdapterState::PoweredOff => "PoweredOff",
            AdapterState::PoweredOn => "PoweredOn",
        }
    }
}

impl fmt::Display for AdapterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle_name_is_truncated_to_capacity() {
        let long = "X".repeat(40);
        let handle = PeripheralHandle::new("id", [0; 6], &long);
        assert_eq!(handle.name.len(), config::PERIPHERAL_NAME_CAPACITY);
    }

    #[test]
    fn handle_address_formatting() {
        let handle = PeripheralHandle::new("id", [0xAA, 0xBB, 0xCC, 0x01, 0x02, 0x03], "CoreHub");
        assert_eq!(handle.address_string(), "AA:BB:CC:01:02:03");
        assert_eq!(handle.to_string(), "id (AA:BB:CC:01:02:03)");
    }

    #[test]
    fn default_connection_options() {
        let options = ConnectionOptions::default();
        assert!(!options.auto_reconnect);
        assert_eq!(options.mtu, 247);
    }
}
