//! Session core for the CoreHub BLE weight sensor.
//!
//! Manages the connection to one peripheral, runs the diagnostic routines
//! against its GATT table and keeps a live weight reading from which a safe
//! distance is derived.
//!
//! 1. **ble** - peripheral handle, connection state machine, transport seam
//!    and (feature `host`) the btleplug transport.
//! 2. **probe** - the three interrogation routines and their catalog.
//! 3. **store** - the single state container every component writes to.
//! 4. **session** - operator commands and transport notifications.
//! 5. **monitor** - periodic weight reading.
//! 6. **safety** - safe-distance calculation.
//!
//! Everything except `ble::host` runs without a radio; [`mock`] supplies an
//! in-memory transport. Unit tests: `cargo test --lib`; the console needs
//! `--features host`.

#![allow(async_fn_in_trait)]

// ═══════════════════════════════════════════════════════════════════════════
// Configuration & errors
// ═══════════════════════════════════════════════════════════════════════════

pub mod config;
pub mod error;

// ═══════════════════════════════════════════════════════════════════════════
// Bluetooth & interrogation
// ═══════════════════════════════════════════════════════════════════════════

pub mod ble;
pub mod probe;

// ═══════════════════════════════════════════════════════════════════════════
// Session state
// ═══════════════════════════════════════════════════════════════════════════

pub mod ledger;
pub mod monitor;
pub mod safety;
pub mod session;
pub mod store;

// ═══════════════════════════════════════════════════════════════════════════
// Test support
// ═══════════════════════════════════════════════════════════════════════════

pub mod mock;

pub use ble::connection::{ConnectionEvent, ConnectionState};
pub use ble::transport::GattTransport;
pub use ble::{AdapterState, ConnectionOptions, PeripheralHandle};
pub use error::{DecodeError, ProbeError, TransportError, TransportErrorKind};
pub use monitor::Monitor;
pub use probe::TestId;
pub use session::Session;
pub use store::{Action, AppState, Store};
