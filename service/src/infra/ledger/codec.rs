//! Wire encodings of the ledger's native types.
//!
//! The ledger transmits wide integers as `{low, high}` 128-bit halves and
//! packs short strings (at most 31 bytes) into a single field. Orchestrators
//! never see these encodings.

use std::fmt::Write as _;

use derive_more::{Display, Error as StdError};

use crate::domain::Address;

/// Maximum byte length of a short string field.
pub const SHORT_STRING_MAX_LEN: usize = 31;

/// Error of decoding a ledger response field.
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq, StdError)]
pub enum DecodeError {
    /// Field is not a valid hex-encoded value.
    #[display("field is not a valid hex-encoded value")]
    InvalidHex,

    /// Field does not fit the expected integer width.
    #[display("field does not fit the expected integer width")]
    Overflow,

    /// Short string field is not valid UTF-8.
    #[display("short string field is not valid UTF-8")]
    InvalidUtf8,

    /// Response contains fewer fields than the entrypoint outputs.
    #[display("response contains fewer fields than the entrypoint outputs")]
    MissingField,
}

/// Encodes the provided value as a single hex field.
#[must_use]
pub fn uint(value: u64) -> String {
    format!("{value:#x}")
}

/// Encodes the provided value as `{low, high}` 128-bit halves.
#[must_use]
pub fn uint256(value: u128) -> [String; 2] {
    [format!("{value:#x}"), "0x0".to_owned()]
}

/// Decodes `{low, high}` 128-bit halves into a [`u128`] value.
///
/// # Errors
///
/// Errors if either half is malformed, or the high half is non-zero.
pub fn parse_uint256(low: &str, high: &str) -> Result<u128, DecodeError> {
    if parse_hex(high)? != 0 {
        return Err(DecodeError::Overflow);
    }
    parse_hex(low)
}

/// Decodes a single hex field into a [`bool`] value.
///
/// Any non-zero value is treated as `true`.
///
/// # Errors
///
/// Errors if the field is malformed.
pub fn parse_bool(field: &str) -> Result<bool, DecodeError> {
    parse_hex(field).map(|v| v != 0)
}

/// Decodes a single hex field into an [`Address`].
///
/// # Errors
///
/// Errors if the field is not a valid [`Address`].
pub fn parse_address(field: &str) -> Result<Address, DecodeError> {
    Address::new(field).ok_or(DecodeError::InvalidHex)
}

/// Packs the provided string into a single short string field.
///
/// Truncates the input to [`SHORT_STRING_MAX_LEN`] bytes on a character
/// boundary.
#[must_use]
pub fn short_string(s: &str) -> String {
    let mut end = s.len().min(SHORT_STRING_MAX_LEN);
    while !s.is_char_boundary(end) {
        end -= 1;
    }

    let bytes = s[..end].as_bytes();
    if bytes.is_empty() {
        return "0x0".to_owned();
    }

    let mut out = String::with_capacity(2 + bytes.len() * 2);
    out.push_str("0x");
    for b in bytes {
        _ = write!(out, "{b:02x}");
    }
    out
}

/// Unpacks a short string field into a [`String`].
///
/// # Errors
///
/// Errors if the field is malformed, too long, or not valid UTF-8.
pub fn parse_short_string(field: &str) -> Result<String, DecodeError> {
    let hex = field.strip_prefix("0x").ok_or(DecodeError::InvalidHex)?;
    if hex.len() > SHORT_STRING_MAX_LEN * 2 {
        return Err(DecodeError::Overflow);
    }

    let padded = if hex.len() % 2 == 1 {
        format!("0{hex}")
    } else {
        hex.to_owned()
    };
    let bytes = (0..padded.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&padded[i..i + 2], 16)
                .map_err(|_| DecodeError::InvalidHex)
        })
        .collect::<Result<Vec<_>, _>>()?;

    String::from_utf8(bytes.into_iter().skip_while(|b| *b == 0).collect())
        .map_err(|_| DecodeError::InvalidUtf8)
}

/// Decodes a single hex field into a [`u128`] value.
fn parse_hex(field: &str) -> Result<u128, DecodeError> {
    let hex = field.strip_prefix("0x").ok_or(DecodeError::InvalidHex)?;
    if hex.is_empty() || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(DecodeError::InvalidHex);
    }
    u128::from_str_radix(hex, 16).map_err(|_| DecodeError::Overflow)
}

#[cfg(test)]
mod spec {
    use super::{
        parse_bool, parse_short_string, parse_uint256, short_string, uint,
        uint256, DecodeError,
    };

    #[test]
    fn uint256_halves() {
        assert_eq!(uint256(6000), ["0x1770".to_owned(), "0x0".to_owned()]);
        assert_eq!(parse_uint256("0x1770", "0x0").unwrap(), 6000);
        assert_eq!(
            parse_uint256(&format!("{:#x}", u128::MAX), "0x0").unwrap(),
            u128::MAX,
        );
    }

    #[test]
    fn uint256_rejects_high_half() {
        assert_eq!(
            parse_uint256("0x0", "0x1").unwrap_err(),
            DecodeError::Overflow,
        );
    }

    #[test]
    fn encodes_uint() {
        assert_eq!(uint(42), "0x2a");
        assert_eq!(uint(0), "0x0");
    }

    #[test]
    fn rejects_malformed_hex() {
        assert_eq!(
            parse_uint256("2a", "0x0").unwrap_err(),
            DecodeError::InvalidHex,
        );
        assert_eq!(
            parse_uint256("0xzz", "0x0").unwrap_err(),
            DecodeError::InvalidHex,
        );
    }

    #[test]
    fn bools() {
        assert!(!parse_bool("0x0").unwrap());
        assert!(parse_bool("0x1").unwrap());
        assert!(parse_bool("0xff").unwrap());
    }

    #[test]
    fn short_strings() {
        assert_eq!(short_string("Sea view"), "0x5365612076696577");
        assert_eq!(
            parse_short_string("0x5365612076696577").unwrap(),
            "Sea view",
        );
        assert_eq!(short_string(""), "0x0");
        assert_eq!(parse_short_string("0x0").unwrap(), "");
    }

    #[test]
    fn short_string_truncates_on_char_boundary() {
        let packed = short_string(&"é".repeat(20));
        let unpacked = parse_short_string(&packed).unwrap();
        assert_eq!(unpacked, "é".repeat(15));
        assert!(unpacked.len() <= 31);
    }

    #[test]
    fn short_string_rejects_oversized_field() {
        assert_eq!(
            parse_short_string(&format!("0x{}", "61".repeat(32))).unwrap_err(),
            DecodeError::Overflow,
        );
    }
}
