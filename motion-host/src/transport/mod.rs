//! Transport capability set: one `Transport` trait satisfied by two
//! variants, serial and USB bulk. Both are synchronous, so async never
//! leaks into the protocol layer.

pub mod hotplug;
pub mod serial;
pub mod usb;

use std::time::Duration;

use crate::error::TransportError;
use crate::frame::{Frame, END, START};

/// Left/right sensor-board disambiguation, decided by bus-topology port
/// number. The exact port numbers are a runtime policy, not a hard-coded
/// rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum Side {
    Left,
    Right,
}

#[derive(Debug, Clone)]
pub enum HotplugEvent {
    Connected { vid: u16, pid: u16, port_chain: Vec<u8> },
    Disconnected { vid: u16, pid: u16 },
}

/// Capability set a transport must satisfy.
pub trait Transport: Send + Sync {
    fn connect(&self) -> Result<(), TransportError>;
    fn disconnect(&self) -> Result<(), TransportError>;
    fn is_connected(&self) -> bool;

    /// Writes `data` atomically. A single transport serializes writes;
    /// concurrent callers are a contract violation the implementation must
    /// detect and reject rather than interleave.
    fn send(&self, data: &[u8]) -> Result<(), TransportError>;

    /// Accumulates bytes until a frame parses cleanly or `timeout` elapses.
    /// Partial frames are retained across calls.
    fn read_until_frame_end(&self, timeout: Duration) -> Result<Vec<u8>, TransportError>;
}

/// Shared read-discipline state: buffers bytes across reads and recognizes a
/// complete frame only once it parses cleanly, so a stray `0xDD` inside a
/// data payload doesn't falsely terminate accumulation.
#[derive(Debug, Default)]
pub struct FrameAccumulator {
    buf: Vec<u8>,
}

impl FrameAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one newly-read byte in. Returns the completed frame bytes once
    /// a candidate frame decodes without error.
    pub fn push_byte(&mut self, byte: u8) -> Option<Vec<u8>> {
        if self.buf.is_empty() && byte != START {
            // Stray byte before any start marker: not part of a frame, drop it.
            return None;
        }
        self.buf.push(byte);
        if byte == END && Frame::decode(&self.buf).is_ok() {
            return Some(std::mem::take(&mut self.buf));
        }
        None
    }

    pub fn push_bytes(&mut self, bytes: &[u8]) -> Option<Vec<u8>> {
        let mut completed = None;
        for &b in bytes {
            if let Some(frame) = self.push_byte(b) {
                completed = Some(frame);
                // A well-behaved device sends one frame at a time; if bytes
                // beyond the first complete frame arrive in the same read,
                // they start accumulating into the next frame.
            }
        }
        completed
    }

    pub fn pending_len(&self) -> usize {
        self.buf.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::PacketType;

    #[test]
    fn recognizes_a_complete_frame_fed_byte_by_byte() {
        let frame = Frame::new(1, PacketType::Cmd, 0, 0, 0, Vec::new());
        let bytes = frame.encode();
        let mut acc = FrameAccumulator::new();
        let mut result = None;
        for &b in &bytes {
            if let Some(f) = acc.push_byte(b) {
                result = Some(f);
            }
        }
        assert_eq!(result, Some(bytes));
    }

    #[test]
    fn does_not_stop_on_a_stray_0xdd_inside_the_payload() {
        let frame = Frame::new(2, PacketType::Fpga, 0, 0, 0, vec![0xDD, 0xDD, 0x01]);
        let bytes = frame.encode();
        let mut acc = FrameAccumulator::new();
        let mut completions = 0;
        let mut result = None;
        for &b in &bytes {
            if let Some(f) = acc.push_byte(b) {
                completions += 1;
                result = Some(f);
            }
        }
        assert_eq!(completions, 1);
        assert_eq!(result, Some(bytes));
    }

    #[test]
    fn drops_leading_garbage_before_the_start_byte() {
        let frame = Frame::new(3, PacketType::Cmd, 0, 0, 0, Vec::new());
        let bytes = frame.encode();
        let mut noisy = vec![0x00, 0x11, 0x22];
        noisy.extend_from_slice(&bytes);

        let mut acc = FrameAccumulator::new();
        let result = acc.push_bytes(&noisy);
        assert_eq!(result, Some(bytes));
    }

    #[test]
    fn retains_partial_frame_across_calls() {
        let frame = Frame::new(4, PacketType::Cmd, 0, 0, 0, vec![9, 9]);
        let bytes = frame.encode();
        let mut acc = FrameAccumulator::new();
        let split = bytes.len() / 2;
        assert_eq!(acc.push_bytes(&bytes[..split]), None);
        assert!(acc.pending_len() > 0);
        assert_eq!(acc.push_bytes(&bytes[split..]), Some(bytes));
    }
}
