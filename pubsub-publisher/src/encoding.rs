//! Text encodings accepted for string payloads.
//!
//! Decoding is lenient: malformed input never fails, it produces whatever
//! bytes can be recovered.
//!
//! - `latin1` and `ascii` keep the low byte of every UTF-16 code unit
//! - `base64` and `base64url` accept both alphabets, skip characters outside
//!   them and stop at the first `=`
//! - `hex` stops at the first pair that is not two hex digits

use std::fmt;
use std::str::FromStr;

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::error::PublishError;

const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// Encoding used to turn a text payload into bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    #[default]
    Utf8,
    Utf16le,
    Latin1,
    Ascii,
    Base64,
    Base64url,
    Hex,
}

impl Encoding {
    pub fn as_str(self) -> &'static str {
        match self {
            Encoding::Utf8 => "utf8",
            Encoding::Utf16le => "utf16le",
            Encoding::Latin1 => "latin1",
            Encoding::Ascii => "ascii",
            Encoding::Base64 => "base64",
            Encoding::Base64url => "base64url",
            Encoding::Hex => "hex",
        }
    }

    /// Encode `text` into bytes.
    pub fn encode(self, text: &str) -> Vec<u8> {
        match self {
            Encoding::Utf8 => text.as_bytes().to_vec(),
            Encoding::Utf16le => text.encode_utf16().flat_map(u16::to_le_bytes).collect(),
            Encoding::Latin1 | Encoding::Ascii => {
                text.encode_utf16().map(|unit| unit as u8).collect()
            }
            Encoding::Base64 | Encoding::Base64url => decode_base64(text),
            Encoding::Hex => decode_hex(text),
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Encoding {
    type Err = PublishError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "utf8" | "utf-8" => Ok(Encoding::Utf8),
            "utf16le" | "utf-16le" | "ucs2" | "ucs-2" => Ok(Encoding::Utf16le),
            "latin1" | "binary" => Ok(Encoding::Latin1),
            "ascii" => Ok(Encoding::Ascii),
            "base64" => Ok(Encoding::Base64),
            "base64url" => Ok(Encoding::Base64url),
            "hex" => Ok(Encoding::Hex),
            _ => Err(PublishError::UnknownEncoding(s.to_string())),
        }
    }
}

fn decode_base64(text: &str) -> Vec<u8> {
    let mut cleaned: String = text
        .chars()
        .take_while(|&c| c != '=')
        .filter_map(|c| match c {
            '-' => Some('+'),
            '_' => Some('/'),
            c if c.is_ascii_alphanumeric() || c == '+' || c == '/' => Some(c),
            _ => None,
        })
        .collect();

    // A single leftover character carries fewer than 8 bits.
    if cleaned.len() % 4 == 1 {
        cleaned.pop();
    }

    LENIENT_BASE64.decode(cleaned).unwrap_or_default()
}

fn decode_hex(text: &str) -> Vec<u8> {
    let valid = text
        .as_bytes()
        .chunks_exact(2)
        .take_while(|pair| pair.iter().all(u8::is_ascii_hexdigit))
        .count();

    hex::decode(&text.as_bytes()[..valid * 2]).unwrap_or_default()
}
