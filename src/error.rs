//! Error types for the session core.
//!
//! Every interrogation routine is a failure boundary: errors raised inside
//! it are turned into one ledger line plus a `false` result, and never reach
//! the connection state machine. Commands issued in the wrong connection
//! state are not errors at all; they are ignored.

use thiserror::Error;

/// Category of a failed transport call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransportErrorKind {
    /// Link establishment failed.
    ConnectionFailed,
    /// The call needs a live link and there is none.
    NotConnected,
    /// Service / characteristic / descriptor discovery failed.
    DiscoveryFailed,
    /// Attribute read failed.
    ReadFailed,
    /// Characteristic write failed.
    WriteFailed,
    /// The peripheral refused a descriptor write (ATT "write not permitted").
    DescriptorWriteNotPermitted,
    /// The transport does not support the requested operation.
    Unsupported,
    /// Anything else reported by the platform.
    Other,
}

/// Failure reported by the attribute transport.
///
/// Mirrors what platform BLE stacks hand back: a message plus optional
/// protocol (ATT) and platform-specific sub-codes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
    pub att_code: Option<u8>,
    pub platform_code: Option<i32>,
    pub reason: Option<String>,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            att_code: None,
            platform_code: None,
            reason: None,
        }
    }

    pub fn with_att_code(mut self, code: u8) -> Self {
        self.att_code = Some(code);
        self
    }

    pub fn with_platform_code(mut self, code: i32) -> Self {
        self.platform_code = Some(code);
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// The one error kind the full dump treats as recoverable.
    pub fn is_descriptor_write_not_permitted(&self) -> bool {
        self.kind == TransportErrorKind::DescriptorWriteNotPermitted
    }

    /// Ledger line for this error.
    pub fn log_line(&self) -> String {
        format!(
            "ERROR: {}, ATT: {}, platform: {}, reason: {}",
            self.message,
            or_null(self.att_code),
            or_null(self.platform_code),
            or_null(self.reason.as_deref()),
        )
    }
}

fn or_null<T: ToString>(value: Option<T>) -> String {
    value.map_or_else(|| "null".to_string(), |v| v.to_string())
}

/// Malformed data coming back from the peripheral.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("invalid base64 value: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("decoded value is not UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("malformed payload: {0}")]
    Payload(String),

    #[error("payload record has no fields")]
    EmptyRecord,

    #[error("first field is not a number: {0}")]
    NotANumber(String),
}

/// Anything that aborts an interrogation routine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Decode(#[from] DecodeError),
}

impl ProbeError {
    /// Ledger line written when the routine gives up.
    pub fn log_line(&self) -> String {
        match self {
            ProbeError::Transport(e) => e.log_line(),
            ProbeError::Decode(e) => format!("ERROR: {e}"),
        }
    }
}

/// Operator asked for a routine identifier that is not in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown test: {0}")]
pub struct UnknownTest(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_error_log_line_fills_missing_codes_with_null() {
        let err = TransportError::new(TransportErrorKind::ReadFailed, "read failed");
        assert_eq!(
            err.log_line(),
            "ERROR: read failed, ATT: null, platform: null, reason: null"
        );
    }

    #[test]
    fn transport_error_log_line_carries_sub_codes() {
        let err = TransportError::new(
            TransportErrorKind::DescriptorWriteNotPermitted,
            "Descriptor write failed",
        )
        .with_att_code(0x03)
        .with_platform_code(133)
        .with_reason("GATT_WRITE_NOT_PERMIT");
        assert_eq!(
            err.log_line(),
            "ERROR: Descriptor write failed, ATT: 3, platform: 133, reason: GATT_WRITE_NOT_PERMIT"
        );
        assert!(err.is_descriptor_write_not_permitted());
    }

    #[test]
    fn decode_error_log_line_is_prefixed() {
        let err = ProbeError::from(DecodeError::EmptyRecord);
        assert_eq!(err.log_line(), "ERROR: payload record has no fields");
    }

    #[test]
    fn only_descriptor_write_kind_is_recoverable() {
        let err = TransportError::new(TransportErrorKind::WriteFailed, "nope");
        assert!(!err.is_descriptor_write_not_permitted());
    }
}
