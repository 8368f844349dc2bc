//! Value encoding for the command/response exchange.
//!
//! Commands go out as base64 text of their UTF-8 bytes; responses come back
//! as base64 text of a small JSON record such as `{"weight":42}`.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde_json::Value;

use crate::ble::transport::EncodedValue;
use crate::error::DecodeError;

/// Placeholder written to every non-CCC descriptor by the full dump: a
/// single 0x00 byte.
pub const DESCRIPTOR_PLACEHOLDER: &str = "AA==";

pub fn encode_command(command: &str) -> EncodedValue {
    STANDARD.encode(command.as_bytes())
}

/// Decode a base64 value to UTF-8 text.
pub fn decode_text(value: &str) -> Result<String, DecodeError> {
    let bytes = STANDARD.decode(value)?;
    Ok(String::from_utf8(bytes)?)
}

/// Raw bytes to transport representation.
pub fn encode_bytes(bytes: &[u8]) -> EncodedValue {
    STANDARD.encode(bytes)
}

/// Transport representation to raw bytes.
pub fn decode_bytes(value: &str) -> Result<Vec<u8>, DecodeError> {
    Ok(STANDARD.decode(value)?)
}

/// Numeric value of the first field of a JSON record.
///
/// Fields are taken in document order. A top-level array yields its first
/// element. The value may be a number or a string holding one.
pub fn first_field_value(text: &str) -> Result<f64, DecodeError> {
    let record: Value =
        serde_json::from_str(text).map_err(|e| DecodeError::Payload(e.to_string()))?;

    let first = match record {
        Value::Object(map) => map.into_iter().next().map(|(_, v)| v),
        Value::Array(items) => items.into_iter().next(),
        other => return Err(DecodeError::Payload(format!("not a record: {other}"))),
    }
    .ok_or(DecodeError::EmptyRecord)?;

    match &first {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| DecodeError::NotANumber(first.to_string())),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| DecodeError::NotANumber(first.to_string())),
        _ => Err(DecodeError::NotANumber(first.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_encode_to_known_base64() {
        assert_eq!(encode_command("getWeightReading"), "Z2V0V2VpZ2h0UmVhZGluZw==");
        assert_eq!(
            encode_command("getWeightSensorInfo"),
            "Z2V0V2VpZ2h0U2Vuc29ySW5mbw=="
        );
    }

    #[test]
    fn placeholder_is_one_zero_byte() {
        assert_eq!(decode_bytes(DESCRIPTOR_PLACEHOLDER).unwrap(), vec![0x00]);
        assert_eq!(encode_bytes(&[0x00]), DESCRIPTOR_PLACEHOLDER);
    }

    #[test]
    fn decode_text_rejects_bad_input() {
        assert!(matches!(decode_text("***"), Err(DecodeError::Base64(_))));
        // 0xFF 0xFE is not UTF-8
        assert!(matches!(decode_text("//4="), Err(DecodeError::Utf8(_))));
        assert_eq!(decode_text("eyJ3ZWlnaHQiOjQyfQ==").unwrap(), r#"{"weight":42}"#);
    }

    #[test]
    fn first_field_follows_document_order() {
        assert_eq!(first_field_value(r#"{"weight":42}"#), Ok(42.0));
        assert_eq!(first_field_value(r#"{"z":1.5,"a":9}"#), Ok(1.5));
        assert_eq!(first_field_value(r#"[7, 8]"#), Ok(7.0));
        assert_eq!(first_field_value(r#"{"weight":" 12.25 "}"#), Ok(12.25));
    }

    #[test]
    fn first_field_errors() {
        assert_eq!(first_field_value("{}"), Err(DecodeError::EmptyRecord));
        assert_eq!(first_field_value("[]"), Err(DecodeError::EmptyRecord));
        assert!(matches!(
            first_field_value(r#"{"weight":true}"#),
            Err(DecodeError::NotANumber(_))
        ));
        assert!(matches!(
            first_field_value(r#"{"weight":"heavy"}"#),
            Err(DecodeError::NotANumber(_))
        ));
        assert!(matches!(first_field_value("42"), Err(DecodeError::Payload(_))));
        assert!(matches!(first_field_value("not json"), Err(DecodeError::Payload(_))));
    }
}
