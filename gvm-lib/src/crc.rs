//! CRC-16/XMODEM computed directly over hex text.
//!
//! The checksum of a frame covers everything from the magic up to the byte
//! before the checksum. Callers pass exactly that span of hex digits.

use crate::hex::pair_value;

/// CRC-16/XMODEM polynomial
pub const POLY: u16 = 0x1021;

/// Fold one byte into a CRC-16/XMODEM register.
pub fn update(mut crc: u16, byte: u8) -> u16 {
    crc ^= (byte as u16) << 8;
    for _ in 0..8 {
        crc = if crc & 0x8000 != 0 { (crc << 1) ^ POLY } else { crc << 1 };
    }
    crc
}

/// CRC-16/XMODEM (init 0, no reflection, no final xor) of the bytes encoded in
/// `text`. Malformed digits decode as in [`crate::hex::decode`]; a trailing
/// unpaired digit is ignored.
pub fn crc16_xmodem(text: &[u8]) -> u16 {
    text.chunks_exact(2)
        .fold(0, |crc, pair| update(crc, pair_value(pair[0], pair[1])))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_value() {
        // "123456789" -> 0x31C3 is the catalogued check value for XMODEM
        assert_eq!(crc16_xmodem(crate::hex::encode(b"123456789").as_bytes()), 0x31C3);
    }

    #[test]
    fn test_empty_is_zero() {
        assert_eq!(crc16_xmodem(b""), 0);
    }

    #[test]
    fn test_brightness_command_body() {
        assert_eq!(crc16_xmodem(b"4C540900305700020132"), 0x4A8F);
    }

    #[test]
    fn test_status_broadcast_body() {
        assert_eq!(crc16_xmodem(b"4C540B0030030102322C3819"), 0xD268);
    }

    #[test]
    fn test_lowercase_matches_uppercase() {
        assert_eq!(crc16_xmodem(b"4c540b0030030102322c3819"), 0xD268);
    }
}
