//! Standard-alphabet base64 (`A-Z a-z 0-9 + /`, `=` padded).
//!
//! Envelopes cross the VM boundary as base64 text. Decoding trims leading
//! and trailing ASCII whitespace, then requires a length that is a multiple
//! of 4 and padding only in the final one or two positions.

use base64::alphabet;
use base64::engine::general_purpose::GeneralPurpose;
use base64::engine::{DecodePaddingMode, GeneralPurposeConfig};
use base64::{DecodeError, Engine};
use thiserror::Error;

const B64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_encode_padding(true)
        .with_decode_padding_mode(DecodePaddingMode::RequireCanonical)
        .with_decode_allow_trailing_bits(true),
);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Base64Error {
    #[error("base64: length {len} is not a multiple of 4")]
    InvalidLength { len: usize },
    #[error("base64: invalid symbol 0x{byte:02x} at offset {offset}")]
    InvalidSymbol { offset: usize, byte: u8 },
    #[error("base64: misplaced padding at offset {offset}")]
    InvalidPadding { offset: usize },
}

/// Encode `bytes`; output length is always `4 * ceil(n / 3)`.
pub fn encode(bytes: &[u8]) -> String {
    B64.encode(bytes)
}

/// Decode base64 text. Offsets in errors refer to the untrimmed input.
pub fn decode(text: &str) -> Result<Vec<u8>, Base64Error> {
    let after_lead = text.trim_start_matches(|c: char| c.is_ascii_whitespace());
    let lead = text.len() - after_lead.len();
    let trimmed = after_lead.trim_end_matches(|c: char| c.is_ascii_whitespace());

    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    if trimmed.len() % 4 != 0 {
        return Err(Base64Error::InvalidLength { len: trimmed.len() });
    }

    let raw = trimmed.as_bytes();
    for (i, &b) in raw.iter().enumerate() {
        if b != b'=' {
            continue;
        }
        let from_end = raw.len() - i;
        if from_end > 2 || (from_end == 2 && raw[i + 1] != b'=') {
            return Err(Base64Error::InvalidPadding { offset: lead + i });
        }
    }

    B64.decode(trimmed).map_err(|e| match e {
        DecodeError::InvalidByte(off, b'=') => Base64Error::InvalidPadding { offset: lead + off },
        DecodeError::InvalidByte(off, byte) | DecodeError::InvalidLastSymbol(off, byte) => {
            Base64Error::InvalidSymbol { offset: lead + off, byte }
        }
        DecodeError::InvalidLength(_) => Base64Error::InvalidLength { len: trimmed.len() },
        DecodeError::InvalidPadding => Base64Error::InvalidPadding {
            offset: lead + trimmed.len() - 1,
        },
    })
}
