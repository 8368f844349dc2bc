//! Attribute identifiers the CoreHub protocol is built on.
//!
//! These literals are part of the firmware contract and must match it
//! exactly.

use uuid::Uuid;

/// Nordic UART-style service that hosts the command/response pair.
pub const COREHUB_SERVICE: Uuid = Uuid::from_u128(0x6e400001_b5a3_f393_e0a9_e50e24dcca9e);

/// Command characteristic: base64 command strings are written here.
pub const COMMAND_CHARACTERISTIC: Uuid = Uuid::from_u128(0x6e400002_b5a3_f393_e0a9_e50e24dcca9e);

/// Response characteristic: the answer to the last command is read here.
pub const RESPONSE_CHARACTERISTIC: Uuid = Uuid::from_u128(0x6e400003_b5a3_f393_e0a9_e50e24dcca9e);

/// GAP characteristic 0x2A02 (Peripheral Privacy Flag), excluded from the
/// full dump.
pub const EXCLUDED_GAP_CHARACTERISTIC: Uuid =
    Uuid::from_u128(0x00002a02_0000_1000_8000_00805f9b34fb);

/// Client Characteristic Configuration descriptor (0x2902).
pub const CLIENT_CHARACTERISTIC_CONFIG: Uuid =
    Uuid::from_u128(0x00002902_0000_1000_8000_00805f9b34fb);

/// True for identifiers in the `0000xxxx-...` range reserved for standard
/// (Bluetooth SIG) attributes. The weight routines skip these.
pub fn is_standard_attribute(uuid: &Uuid) -> bool {
    matches!(uuid.as_bytes(), [0x00, 0x00, ..])
}
