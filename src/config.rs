//! Application-wide constants and compile-time configuration.
//!
//! Connection defaults, protocol sizes, monitor timing and operator input
//! limits live here so they can be tuned in one place.

// BLE

/// Local-name prefix the console uses to pick the CoreHub out of a scan.
pub const PERIPHERAL_NAME_PREFIX: &str = "CoreHub";

/// Maximum stored length of a peripheral's advertised name.
pub const PERIPHERAL_NAME_CAPACITY: usize = 32;

/// Auto-reconnect flag applied by a plain `connect`.
pub const DEFAULT_AUTO_RECONNECT: bool = false;

/// ATT MTU requested at connect time by a plain `connect`.
pub const DEFAULT_CONNECT_MTU: u16 = 247;

/// ATT MTU requested by the weight routines before talking to the
/// command/response characteristics (best effort).
pub const PROBE_MTU: u16 = 517;

// Monitoring

/// Delay between two weight reads while monitoring (ms).
pub const MONITOR_INTERVAL_MS: u32 = 5_000;

// Operator input

/// Speed slider lower bound (km/h).
pub const SPEED_MIN_KMH: f64 = 0.0;

/// Speed slider upper bound (km/h).
pub const SPEED_MAX_KMH: f64 = 450.0;

/// Slider resolution: speeds are quantised to tenths of a km/h.
pub const SPEED_STEPS_PER_KMH: f64 = 10.0;

/// Speed the console starts with (km/h).
pub const DEFAULT_SPEED_KMH: f64 = 80.0;
