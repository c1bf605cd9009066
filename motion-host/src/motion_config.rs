//! Motion config blob: a 16-byte header followed by a compact JSON payload.

use crate::crc::crc16;

pub const MOTION_MAGIC: u32 = 0x4D4F_5449; // 'MOTI'
pub const MOTION_VERSION: u32 = 0x0001_0000;

pub const HEADER_LEN: usize = 16;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MotionConfigError {
    #[error("buffer too short for a motion config header ({0} bytes)")]
    TooShort(usize),
    #[error("bad magic {0:#010x}, expected {MOTION_MAGIC:#010x}")]
    InvalidMagic(u32),
    #[error("unsupported version {0:#010x}, expected {MOTION_VERSION:#010x}")]
    InvalidVersion(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotionConfigHeader {
    pub magic: u32,
    pub version: u32,
    pub seq: u32,
    pub crc: u16,
    pub json_len: u16,
}

impl MotionConfigHeader {
    pub fn to_bytes(self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        out[0..4].copy_from_slice(&self.magic.to_le_bytes());
        out[4..8].copy_from_slice(&self.version.to_le_bytes());
        out[8..12].copy_from_slice(&self.seq.to_le_bytes());
        out[12..14].copy_from_slice(&self.crc.to_le_bytes());
        out[14..16].copy_from_slice(&self.json_len.to_le_bytes());
        out
    }

    pub fn from_bytes(buf: &[u8]) -> Result<Self, MotionConfigError> {
        if buf.len() < HEADER_LEN {
            return Err(MotionConfigError::TooShort(buf.len()));
        }
        let header = MotionConfigHeader {
            magic: u32::from_le_bytes(buf[0..4].try_into().unwrap()),
            version: u32::from_le_bytes(buf[4..8].try_into().unwrap()),
            seq: u32::from_le_bytes(buf[8..12].try_into().unwrap()),
            crc: u16::from_le_bytes(buf[12..14].try_into().unwrap()),
            json_len: u16::from_le_bytes(buf[14..16].try_into().unwrap()),
        };
        header.validate()?;
        Ok(header)
    }

    fn validate(&self) -> Result<(), MotionConfigError> {
        if self.magic != MOTION_MAGIC {
            return Err(MotionConfigError::InvalidMagic(self.magic));
        }
        if self.version != MOTION_VERSION {
            return Err(MotionConfigError::InvalidVersion(self.version));
        }
        Ok(())
    }
}

/// A motion config: header plus a JSON document, round-tripped through the
/// wire format. Decoding never fails outright on a bad payload — an empty or
/// unparsable JSON body degrades to an empty object.
#[derive(Debug, Clone, PartialEq)]
pub struct MotionConfig {
    pub seq: u32,
    pub json: serde_json::Value,
}

impl MotionConfig {
    pub fn new(seq: u32, json: serde_json::Value) -> Self {
        Self { seq, json }
    }

    /// Serializes compact JSON, computes the CRC over the JSON bytes, and
    /// emits `header || json_bytes`.
    pub fn to_wire_bytes(&self) -> Vec<u8> {
        let json_bytes = serde_json::to_vec(&self.json).unwrap_or_else(|_| b"{}".to_vec());
        let crc = crc16(&json_bytes);
        let header = MotionConfigHeader {
            magic: MOTION_MAGIC,
            version: MOTION_VERSION,
            seq: self.seq,
            crc,
            json_len: json_bytes.len() as u16,
        };
        let mut out = Vec::with_capacity(HEADER_LEN + json_bytes.len());
        out.extend_from_slice(&header.to_bytes());
        out.extend_from_slice(&json_bytes);
        out
    }

    pub fn from_wire_bytes(data: &[u8]) -> Result<Self, MotionConfigError> {
        let header = MotionConfigHeader::from_bytes(data)?;
        let available = &data[HEADER_LEN..];
        let declared = header.json_len as usize;

        let json_bytes = if declared <= available.len() {
            &available[..declared]
        } else {
            tracing::warn!(
                declared,
                available = available.len(),
                "motion config json_len exceeds remaining bytes, using what's left"
            );
            available
        };

        let trimmed = trim_trailing_nuls(json_bytes);
        let json = if trimmed.is_empty() {
            serde_json::Value::Object(Default::default())
        } else {
            match serde_json::from_slice(trimmed) {
                Ok(value) => value,
                Err(err) => {
                    tracing::warn!(%err, "motion config payload was not valid JSON, defaulting to {{}}");
                    serde_json::Value::Object(Default::default())
                }
            }
        };

        Ok(MotionConfig { seq: header.seq, json })
    }
}

fn trim_trailing_nuls(bytes: &[u8]) -> &[u8] {
    let end = bytes.iter().rposition(|&b| b != 0).map(|i| i + 1).unwrap_or(0);
    &bytes[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn roundtrips_json_payload() {
        let cfg = MotionConfig::new(7, json!({"frequency_hz": 100}));
        let bytes = cfg.to_wire_bytes();
        let decoded = MotionConfig::from_wire_bytes(&bytes).unwrap();
        assert_eq!(decoded.json, cfg.json);
        assert_eq!(decoded.seq, 7);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut bytes = MotionConfig::new(1, json!({})).to_wire_bytes();
        bytes[0] = 0;
        assert!(matches!(
            MotionConfig::from_wire_bytes(&bytes),
            Err(MotionConfigError::InvalidMagic(_))
        ));
    }

    #[test]
    fn rejects_bad_version() {
        let mut bytes = MotionConfig::new(1, json!({})).to_wire_bytes();
        bytes[4] = 0xFF;
        assert!(matches!(
            MotionConfig::from_wire_bytes(&bytes),
            Err(MotionConfigError::InvalidVersion(_))
        ));
    }

    #[test]
    fn truncated_json_len_falls_back_to_remaining_bytes() {
        let mut bytes = MotionConfig::new(1, json!({"a": 1})).to_wire_bytes();
        let len = bytes.len();
        bytes.truncate(len - 1);
        let decoded = MotionConfig::from_wire_bytes(&bytes).unwrap();
        assert_eq!(decoded.json, json!({}));
    }

    #[test]
    fn empty_json_defaults_to_empty_object() {
        let cfg = MotionConfig::new(1, serde_json::Value::Null);
        // Force an empty body directly rather than via serialization of `null`.
        let header = MotionConfigHeader {
            magic: MOTION_MAGIC,
            version: MOTION_VERSION,
            seq: cfg.seq,
            crc: crc16(&[]),
            json_len: 0,
        };
        let bytes = header.to_bytes().to_vec();
        let decoded = MotionConfig::from_wire_bytes(&bytes).unwrap();
        assert_eq!(decoded.json, json!({}));
    }

    #[test]
    fn trims_trailing_nuls_before_parsing() {
        let mut json_bytes = br#"{"a":1}"#.to_vec();
        json_bytes.extend_from_slice(&[0, 0, 0]);
        let header = MotionConfigHeader {
            magic: MOTION_MAGIC,
            version: MOTION_VERSION,
            seq: 3,
            crc: crc16(&json_bytes),
            json_len: json_bytes.len() as u16,
        };
        let mut bytes = header.to_bytes().to_vec();
        bytes.extend_from_slice(&json_bytes);
        let decoded = MotionConfig::from_wire_bytes(&bytes).unwrap();
        assert_eq!(decoded.json, json!({"a": 1}));
    }
}
