//! The wire packet: fixed framing with a variable-length payload, carried
//! byte-identically over USB bulk or serial.

use crate::crc::crc16;

pub const START: u8 = 0xAA;
pub const END: u8 = 0xDD;

/// `type` byte values. Firmware constant names follow the `OW_*` convention
/// seen in the device's control protocol; only `Cmd` is pinned by a documented
/// worked example (ping ⇒ `type=0xE2`), the rest are assigned consistent
/// neighboring values in the same byte range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[repr(u8)]
pub enum PacketType {
    Ack = 0xE0,
    Resp = 0xE1,
    Cmd = 0xE2,
    Fpga = 0xE3,
    Camera = 0xE4,
    Imu = 0xE5,
    I2cPassthru = 0xE6,
    Json = 0xE7,
    Error = 0xEA,
    BadCrc = 0xEB,
    BadParse = 0xEC,
    Unknown = 0xFF,
}

impl PacketType {
    pub fn from_byte(byte: u8) -> Option<PacketType> {
        use PacketType::*;
        Some(match byte {
            0xE0 => Ack,
            0xE1 => Resp,
            0xE2 => Cmd,
            0xE3 => Fpga,
            0xE4 => Camera,
            0xE5 => Imu,
            0xE6 => I2cPassthru,
            0xE7 => Json,
            0xEA => Error,
            0xEB => BadCrc,
            0xEC => BadParse,
            0xFF => Unknown,
            _ => return None,
        })
    }

    /// `true` for the response types the dispatcher surfaces as a
    /// [`crate::error::CommandError`] rather than a successful reply.
    pub fn is_error_response(self) -> bool {
        matches!(
            self,
            PacketType::Error | PacketType::BadCrc | PacketType::BadParse | PacketType::Unknown
        )
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame is missing the 0xAA start byte")]
    MissingStart,
    #[error("frame is missing the 0xDD end byte")]
    MissingEnd,
    #[error("frame is too short to contain a full header and footer")]
    Truncated,
    #[error("declared data length {declared} does not match frame size (got {actual} bytes)")]
    LengthMismatch { declared: usize, actual: usize },
    #[error("CRC mismatch: computed {computed:#06x}, wire {wire:#06x}")]
    CrcMismatch { computed: u16, wire: u16 },
}

/// A decoded (or about-to-be-encoded) request/response frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub id: u16,
    /// Raw `type` byte. Use [`Frame::packet_type`] for the decoded enum; kept
    /// raw so an as-yet-unassigned firmware constant still round-trips.
    pub type_byte: u8,
    pub command: u8,
    pub address: u8,
    pub reserved: u8,
    pub data: Vec<u8>,
}

/// Minimum frame size: start + id(2) + type + command + addr + reserved +
/// datalen(2) + crc(2) + end, with zero-length data.
pub const MIN_FRAME_LEN: usize = 1 + 2 + 1 + 1 + 1 + 1 + 2 + 2 + 1;

impl Frame {
    pub fn new(id: u16, packet_type: PacketType, command: u8, address: u8, reserved: u8, data: Vec<u8>) -> Self {
        Self {
            id,
            type_byte: packet_type as u8,
            command,
            address,
            reserved,
            data,
        }
    }

    pub fn packet_type(&self) -> Option<PacketType> {
        PacketType::from_byte(self.type_byte)
    }

    /// Serializes this frame to bytes: the CRC covers every byte from `id`
    /// through the end of `data`, inclusive, big-endian.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(MIN_FRAME_LEN + self.data.len());
        buf.push(START);
        buf.extend_from_slice(&self.id.to_be_bytes());
        buf.push(self.type_byte);
        buf.push(self.command);
        buf.push(self.address);
        buf.push(self.reserved);
        buf.extend_from_slice(&(self.data.len() as u16).to_be_bytes());
        buf.extend_from_slice(&self.data);
        let crc = crc16(&buf[1..]);
        buf.extend_from_slice(&crc.to_be_bytes());
        buf.push(END);
        buf
    }

    /// Decodes a byte slice known to bound exactly one complete frame.
    pub fn decode(buf: &[u8]) -> Result<Frame, FrameError> {
        if buf.len() < MIN_FRAME_LEN {
            return Err(FrameError::Truncated);
        }
        if buf[0] != START {
            return Err(FrameError::MissingStart);
        }
        if buf[buf.len() - 1] != END {
            return Err(FrameError::MissingEnd);
        }

        let id = u16::from_be_bytes([buf[1], buf[2]]);
        let type_byte = buf[3];
        let command = buf[4];
        let address = buf[5];
        let reserved = buf[6];
        let data_len = u16::from_be_bytes([buf[7], buf[8]]) as usize;

        let expected_total = 9 + data_len + 2 + 1;
        if buf.len() != expected_total {
            return Err(FrameError::LengthMismatch {
                declared: data_len,
                actual: buf.len(),
            });
        }

        let data = buf[9..9 + data_len].to_vec();
        let crc_region = &buf[1..9 + data_len];
        let computed = crc16(crc_region);
        let wire = u16::from_be_bytes([buf[9 + data_len], buf[9 + data_len + 1]]);
        if computed != wire {
            return Err(FrameError::CrcMismatch { computed, wire });
        }

        Ok(Frame {
            id,
            type_byte,
            command,
            address,
            reserved,
            data,
        })
    }
}

/// Assigns ids from `1..=65534`, skipping 0 on wraparound.
#[derive(Debug)]
pub struct IdCounter {
    next: u16,
}

impl Default for IdCounter {
    fn default() -> Self {
        Self { next: 1 }
    }
}

impl IdCounter {
    pub fn next_id(&mut self) -> u16 {
        let id = self.next;
        self.next = match self.next.checked_add(1) {
            Some(0) | None => 1,
            Some(n) if n == 0xFFFF => 1,
            Some(n) => n,
        };
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ping_frame() -> Frame {
        Frame::new(1, PacketType::Cmd, 0x00, 0x00, 0x00, Vec::new())
    }

    #[test]
    fn roundtrips_through_encode_decode() {
        let frame = ping_frame();
        let bytes = frame.encode();
        let decoded = Frame::decode(&bytes).expect("decode");
        assert_eq!(decoded, frame);
    }

    #[test]
    fn roundtrips_with_payload() {
        let frame = Frame::new(42, PacketType::Fpga, 0x07, 0x03, 0x00, vec![1, 2, 3, 4, 5]);
        let bytes = frame.encode();
        let decoded = Frame::decode(&bytes).expect("decode");
        assert_eq!(decoded, frame);
    }

    #[test]
    fn rejects_missing_start() {
        let mut bytes = ping_frame().encode();
        bytes[0] = 0x00;
        assert_eq!(Frame::decode(&bytes), Err(FrameError::MissingStart));
    }

    #[test]
    fn rejects_missing_end() {
        let mut bytes = ping_frame().encode();
        let last = bytes.len() - 1;
        bytes[last] = 0x00;
        assert_eq!(Frame::decode(&bytes), Err(FrameError::MissingEnd));
    }

    #[test]
    fn rejects_crc_mismatch_on_bit_flip() {
        let mut bytes = ping_frame().encode();
        let mid = bytes.len() / 2;
        bytes[mid] ^= 0x01;
        assert!(matches!(Frame::decode(&bytes), Err(FrameError::CrcMismatch { .. })));
    }

    #[test]
    fn rejects_truncated_frame() {
        let bytes = ping_frame().encode();
        assert_eq!(Frame::decode(&bytes[..bytes.len() - 3]), Err(FrameError::Truncated));
    }

    #[test]
    fn id_counter_skips_zero_on_wraparound() {
        let mut counter = IdCounter { next: 0xFFFF };
        assert_eq!(counter.next_id(), 0xFFFF);
        assert_eq!(counter.next_id(), 1);
    }

    #[test]
    fn id_counter_starts_at_one() {
        let mut counter = IdCounter::default();
        assert_eq!(counter.next_id(), 1);
        assert_eq!(counter.next_id(), 2);
    }
}
