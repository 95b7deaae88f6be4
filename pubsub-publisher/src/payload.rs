//! Publishable payload representations and their normalization to bytes.

use std::sync::Arc;

use bytes::Bytes;

use crate::encoding::Encoding;

/// A message body in any of the representations a caller may hold.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Text, encoded with the requested encoding (UTF-8 by default)
    Text(String),
    /// Numeric byte values; each value keeps only its low byte
    Numbers(Vec<i64>),
    /// Immutable byte buffer
    Binary(Bytes),
    /// Byte buffer shared with other owners
    Shared(Arc<[u8]>),
    /// Plain byte vector
    Typed(Vec<u8>),
    /// Any other value; published as its textual form
    Value(serde_json::Value),
}

impl Payload {
    /// Normalize to bytes.
    ///
    /// `encoding` applies to text payloads only and is ignored otherwise.
    pub fn into_bytes(self, encoding: Option<Encoding>) -> Bytes {
        match self {
            Payload::Text(text) => encode_text(&text, encoding),
            Payload::Numbers(values) => values.into_iter().map(|v| (v & 0xff) as u8).collect(),
            Payload::Binary(bytes) => bytes,
            Payload::Shared(shared) => Bytes::copy_from_slice(&shared),
            Payload::Typed(vec) => Bytes::from(vec),
            Payload::Value(serde_json::Value::String(text)) => encode_text(&text, encoding),
            Payload::Value(value) => encode_text(&value.to_string(), encoding),
        }
    }

    /// Short name of the representation, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Payload::Text(_) => "text",
            Payload::Numbers(_) => "numbers",
            Payload::Binary(_) => "binary",
            Payload::Shared(_) => "shared",
            Payload::Typed(_) => "typed",
            Payload::Value(_) => "value",
        }
    }
}

fn encode_text(text: &str, encoding: Option<Encoding>) -> Bytes {
    match encoding.unwrap_or_default() {
        Encoding::Utf8 => Bytes::copy_from_slice(text.as_bytes()),
        other => Bytes::from(other.encode(text)),
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Payload::Text(text)
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Payload::Text(text.to_string())
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Payload::Typed(bytes)
    }
}

impl From<&[u8]> for Payload {
    fn from(bytes: &[u8]) -> Self {
        Payload::Binary(Bytes::copy_from_slice(bytes))
    }
}

impl From<Bytes> for Payload {
    fn from(bytes: Bytes) -> Self {
        Payload::Binary(bytes)
    }
}

impl From<Arc<[u8]>> for Payload {
    fn from(bytes: Arc<[u8]>) -> Self {
        Payload::Shared(bytes)
    }
}

impl From<Vec<i64>> for Payload {
    fn from(values: Vec<i64>) -> Self {
        Payload::Numbers(values)
    }
}

impl From<serde_json::Value> for Payload {
    fn from(value: serde_json::Value) -> Self {
        Payload::Value(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_text_is_utf8_by_default() {
        let bytes = Payload::from(r#"{"id":"12345"}"#).into_bytes(None);
        assert_eq!(&bytes[..], br#"{"id":"12345"}"#);
    }

    #[test]
    fn test_text_with_binary_encoding() {
        let bytes = Payload::from("caf\u{e9}").into_bytes(Some(Encoding::Latin1));
        assert_eq!(&bytes[..], &[0x63, 0x61, 0x66, 0xe9]);
    }

    #[test]
    fn test_numbers_keep_low_byte() {
        let bytes = Payload::from(vec![1_i64, 255, 256, 257, -1]).into_bytes(None);
        assert_eq!(&bytes[..], &[1, 255, 0, 1, 255]);
    }

    #[test]
    fn test_encoding_ignored_for_binary() {
        let bytes = Payload::from(vec![0x68_u8, 0x69]).into_bytes(Some(Encoding::Base64));
        assert_eq!(&bytes[..], b"hi");
    }

    #[test]
    fn test_value_falls_back_to_text() {
        assert_eq!(&Payload::from(json!("plain")).into_bytes(None)[..], b"plain");
        assert_eq!(&Payload::from(json!(42)).into_bytes(None)[..], b"42");
        assert_eq!(
            &Payload::from(json!({ "id": 1 })).into_bytes(None)[..],
            br#"{"id":1}"#
        );
        assert_eq!(
            &Payload::from(json!("aGk=")).into_bytes(Some(Encoding::Base64))[..],
            b"hi"
        );
    }

    #[test]
    fn test_single_zero_byte_buffers() {
        let shared: Arc<[u8]> = Arc::from(vec![0_u8]);
        assert_eq!(&Payload::from(shared).into_bytes(None)[..], &[0]);
        assert_eq!(&Payload::from(Bytes::from_static(&[0])).into_bytes(None)[..], &[0]);
    }

    #[test]
    fn test_kind() {
        assert_eq!(Payload::from("x").kind(), "text");
        assert_eq!(Payload::from(vec![1_i64]).kind(), "numbers");
        assert_eq!(Payload::from(json!(null)).kind(), "value");
    }
}
