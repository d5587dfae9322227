//! Conversion between raw bytes and the ASCII hex text the lights put on the wire.
//!
//! Decoding never fails. A character that is not a hex digit contributes zero
//! bits, so corrupt input turns into bytes whose checksum will not match and is
//! rejected one level up by the frame decoder.

use bytes::Bytes;

/// Value of one hex digit; anything else counts as 0.
pub fn digit_value(c: u8) -> u8 {
    match c {
        b'0'..=b'9' => c - b'0',
        b'a'..=b'f' => c - b'a' + 10,
        b'A'..=b'F' => c - b'A' + 10,
        _ => 0,
    }
}

/// Decode one digit pair into a byte.
pub fn pair_value(hi: u8, lo: u8) -> u8 {
    digit_value(hi) << 4 | digit_value(lo)
}

/// Decode digit pairs into bytes. A trailing unpaired digit is ignored.
pub fn decode(text: &[u8]) -> Bytes {
    text.chunks_exact(2)
        .map(|pair| pair_value(pair[0], pair[1]))
        .collect::<Vec<u8>>()
        .into()
}

/// Two uppercase hex digits per byte.
pub fn encode(bytes: &[u8]) -> String {
    ::hex::encode_upper(bytes)
}

/// A 16-bit value as 4 hex digits in network byte order.
pub fn encode_be16(value: u16) -> String {
    ::hex::encode_upper(value.to_be_bytes())
}

/// Printable rendering of a received buffer for debug logs, '.' for anything
/// that is not printable ASCII.
pub fn printable(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&b| if b.is_ascii_graphic() || b == b' ' { b as char } else { '.' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_mixed_case() {
        assert_eq!(decode(b"4c54aB").as_ref(), &[0x4C, 0x54, 0xAB]);
    }

    #[test]
    fn test_decode_invalid_digits_contribute_zero() {
        assert_eq!(decode(b"G1").as_ref(), &[0x01]);
        assert_eq!(decode(b"1z").as_ref(), &[0x10]);
        assert_eq!(decode(b"??").as_ref(), &[0x00]);
    }

    #[test]
    fn test_decode_ignores_trailing_digit() {
        assert_eq!(decode(b"4C5").as_ref(), &[0x4C]);
        assert!(decode(b"").is_empty());
    }

    #[test]
    fn test_encode_uppercase() {
        assert_eq!(encode(&[0x4C, 0x54, 0x0b, 0xfe]), "4C540BFE");
    }

    #[test]
    fn test_encode_be16() {
        assert_eq!(encode_be16(0x4A8F), "4A8F");
        assert_eq!(encode_be16(0x000A), "000A");
    }

    #[test]
    fn test_roundtrip_all_byte_values() {
        let bytes: Vec<u8> = (0..=255).collect();
        assert_eq!(decode(encode(&bytes).as_bytes()).as_ref(), bytes.as_slice());
    }

    #[test]
    fn test_printable() {
        assert_eq!(printable(b"4C\x00T\n"), "4C.T.");
    }
}
