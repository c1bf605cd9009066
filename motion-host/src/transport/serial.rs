//! Serial transport variant. Frames are byte-identical to the USB bulk
//! framing; only the byte source differs.

use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use super::{FrameAccumulator, Transport};
use crate::error::TransportError;

struct SerialInner {
    port: Option<Box<dyn serialport::SerialPort>>,
    accumulator: FrameAccumulator,
}

/// Opens a COM/tty device by path at a configured baud rate.
pub struct SerialTransport {
    path: String,
    baud: u32,
    inner: Mutex<SerialInner>,
    connected: AtomicBool,
    sending: AtomicBool,
}

const POLL_SLICE: Duration = Duration::from_millis(50);

impl SerialTransport {
    pub fn new(path: impl Into<String>, baud: u32) -> Self {
        Self {
            path: path.into(),
            baud,
            inner: Mutex::new(SerialInner {
                port: None,
                accumulator: FrameAccumulator::new(),
            }),
            connected: AtomicBool::new(false),
            sending: AtomicBool::new(false),
        }
    }

    /// Enumerates system serial ports for one carrying the given VID/PID,
    /// the discovery primitive the hot-plug poller drives.
    pub fn find_port_for(vid: u16, pid: u16) -> Option<String> {
        let ports = serialport::available_ports().ok()?;
        ports.into_iter().find_map(|p| match p.port_type {
            serialport::SerialPortType::UsbPort(info) if info.vid == vid && info.pid == pid => {
                Some(p.port_name)
            }
            _ => None,
        })
    }
}

impl Transport for SerialTransport {
    fn connect(&self) -> Result<(), TransportError> {
        let mut inner = self.inner.lock();
        let port = serialport::new(&self.path, self.baud)
            .timeout(POLL_SLICE)
            .open()
            .map_err(|e| TransportError::Io(std::io::Error::other(e.to_string())))?;
        inner.port = Some(port);
        inner.accumulator = FrameAccumulator::new();
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn disconnect(&self) -> Result<(), TransportError> {
        let mut inner = self.inner.lock();
        inner.port = None;
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        if self
            .sending
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(TransportError::ConcurrentSendViolation);
        }
        let result = (|| {
            let mut inner = self.inner.lock();
            let port = inner.port.as_mut().ok_or(TransportError::NotConnected)?;
            port.write_all(data)?;
            Ok(())
        })();
        self.sending.store(false, Ordering::SeqCst);
        result
    }

    fn read_until_frame_end(&self, timeout: Duration) -> Result<Vec<u8>, TransportError> {
        let deadline = Instant::now() + timeout;
        let mut inner = self.inner.lock();
        let mut byte = [0u8; 1];

        loop {
            if Instant::now() >= deadline {
                return Err(TransportError::ReadTimeout);
            }
            let port = inner.port.as_mut().ok_or(TransportError::NotConnected)?;
            match port.read(&mut byte) {
                Ok(0) => continue,
                Ok(_) => {
                    if let Some(frame) = inner.accumulator.push_byte(byte[0]) {
                        return Ok(frame);
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => continue,
                Err(e) => return Err(TransportError::from(e)),
            }
        }
    }
}
