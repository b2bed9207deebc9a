//! # Hex Encoding/Decoding Utilities
//!
//! Thin wrappers over the `hex` crate used for frame logging, golden test
//! vectors and the CLI's body argument. Decoding tolerates embedded
//! whitespace so wire captures can be pasted as-is.

use thiserror::Error;

/// Errors that can occur during hex operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HexError {
    #[error("Odd number of hex characters: {0}")]
    OddLength(usize),

    #[error("Hex decoding error: {0}")]
    DecodeError(String),
}

/// Encode bytes to lowercase hex string
pub fn encode_hex(data: &[u8]) -> String {
    hex::encode(data)
}

/// Decode hex string to bytes
///
/// Accepts both uppercase and lowercase hex characters.
/// Whitespace is automatically stripped; an empty string decodes to no bytes.
pub fn decode_hex(hex_str: &str) -> Result<Vec<u8>, HexError> {
    let cleaned: String = hex_str.chars().filter(|c| !c.is_whitespace()).collect();

    if cleaned.len() % 2 != 0 {
        return Err(HexError::OddLength(cleaned.len()));
    }

    hex::decode(&cleaned).map_err(|e| HexError::DecodeError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let data = [0xAA, 0x55, 0x01, 0x00];
        assert_eq!(decode_hex(&encode_hex(&data)).unwrap(), data);
    }

    #[test]
    fn strips_whitespace() {
        assert_eq!(decode_hex("AA 55 01").unwrap(), vec![0xAA, 0x55, 0x01]);
    }

    #[test]
    fn rejects_odd_length() {
        assert!(matches!(decode_hex("AAB"), Err(HexError::OddLength(3))));
    }
}
