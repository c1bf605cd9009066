//! CRC-16/CCITT-FALSE, the single checksum primitive used by every wire format
//! this crate speaks. Centralized here so no other module rolls its own.

use crc_all::CrcAlgo;

const CRC16_INIT: u16 = 0xFFFF;

const CRC16: CrcAlgo<u16> = CrcAlgo::<u16>::new(
    0x1021,     // polynomial (CCITT-FALSE)
    16,         // width
    CRC16_INIT, // init
    0,          // xorout
    false,      // reflect
);

/// Computes CRC-16/CCITT-FALSE over `data`: poly 0x1021, init 0xFFFF, no
/// reflection, no final XOR. Accepts a borrowed slice; never copies.
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc = CRC16_INIT;
    CRC16.update_crc(&mut crc, data);
    CRC16.finish_crc(&crc)
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    // Reference vectors generated against a straightforward bit-by-bit
    // CCITT-FALSE implementation (poly 0x1021, init 0xFFFF, no reflect, no xorout).
    #[test_case(&[], 0xFFFF; "empty input leaves the init value")]
    #[test_case(&[0x00], 0xE1F0; "single zero byte")]
    #[test_case(b"123456789", 0x29B1; "ascii check string is the canonical CRC-CCITT-FALSE vector")]
    fn matches_reference(data: &[u8], expected: u16) {
        assert_eq!(super::crc16(data), expected);
    }

    #[test]
    fn appending_a_byte_changes_the_result() {
        let a = super::crc16(b"abc");
        let b = super::crc16(b"abcd");
        assert_ne!(a, b);
    }

    #[test]
    fn is_deterministic() {
        let data = [0xaa, 0x00, 0x01, 0xe2, 0x00, 0x00, 0x00, 0x00, 0x00];
        assert_eq!(super::crc16(&data), super::crc16(&data));
    }
}
