//! Hex text encoding for DataLayer keys and values
//!
//! The DataLayer RPC speaks raw bytes as lowercase hex strings. Keys returned
//! by the node carry a `0x` prefix, keys and values we send do not.

/// Prefix the DataLayer node puts in front of hex keys it returns.
pub const HEX_PREFIX: &str = "0x";

#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum EncodingError {
    #[error("invalid hex string: {0}")]
    InvalidHex(#[from] hex::FromHexError),
}

/// Encode raw bytes (or the UTF-8 bytes of a string) as lowercase hex.
pub fn encode(data: impl AsRef<[u8]>) -> String {
    hex::encode(data)
}

/// Decode a hex string, with or without a leading `0x`.
pub fn decode(text: &str) -> Result<Vec<u8>, EncodingError> {
    Ok(hex::decode(strip_prefix(text))?)
}

/// Remove a single leading `0x`, if present.
pub fn strip_prefix(text: &str) -> &str {
    text.strip_prefix(HEX_PREFIX).unwrap_or(text)
}

/// Canonical form used when comparing keys: no prefix, lowercase digits.
pub fn normalize_key(key: &str) -> String {
    strip_prefix(key).to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_filename() {
        assert_eq!(encode("a.txt"), "612e747874");
    }

    #[test]
    fn test_round_trip_non_ascii() {
        let name = "dossier/été-日本.html";
        let decoded = decode(&encode(name)).unwrap();
        assert_eq!(String::from_utf8(decoded).unwrap(), name);
    }

    #[test]
    fn test_round_trip_all_bytes() {
        let bytes: Vec<u8> = (0..=255u8).collect();
        assert_eq!(decode(&encode(&bytes)).unwrap(), bytes);
    }

    #[test]
    fn test_decode_accepts_prefix() {
        assert_eq!(decode("0x612e747874").unwrap(), b"a.txt");
    }

    #[test]
    fn test_decode_rejects_malformed() {
        assert!(decode("abc").is_err());
        assert!(decode("zz").is_err());
    }

    #[test]
    fn test_normalize_key() {
        assert_eq!(normalize_key("0xABcd"), "abcd");
        assert_eq!(normalize_key("abcd"), "abcd");
        assert_eq!(encode(""), "");
    }
}
