//! USB bulk transport variant. Opens a device by VID/PID, disambiguating
//! composite sensor devices by bus-topology port number when more than one
//! candidate matches.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rusb::{Device, DeviceHandle, GlobalContext};

use super::{FrameAccumulator, Transport};
use crate::error::TransportError;

const READ_CHUNK: usize = 512;

/// Finds a device by VID/PID, optionally requiring the last bus port number
/// to match. The left=2/right=3 convention is a caller-supplied policy, not
/// hard-coded here.
pub fn find_device(vid: u16, pid: u16, last_port: Option<u8>) -> Option<Device<GlobalContext>> {
    let devices = rusb::devices().ok()?;
    devices.iter().find(|d| {
        let Ok(desc) = d.device_descriptor() else {
            return false;
        };
        if desc.vendor_id() != vid || desc.product_id() != pid {
            return false;
        }
        match last_port {
            None => true,
            Some(p) => d.port_numbers(8).map(|ports| ports.last().copied() == Some(p)).unwrap_or(false),
        }
    })
}

struct UsbInner {
    handle: Option<DeviceHandle<GlobalContext>>,
    accumulator: FrameAccumulator,
}

pub struct UsbTransport {
    vid: u16,
    pid: u16,
    last_port: Option<u8>,
    interface: u8,
    in_endpoint: u8,
    out_endpoint: u8,
    inner: Mutex<UsbInner>,
    connected: AtomicBool,
    sending: AtomicBool,
}

impl UsbTransport {
    /// `interface` is the command interface index (0 on sensor composite
    /// devices, the console's sole interface otherwise).
    pub fn new(vid: u16, pid: u16, last_port: Option<u8>, interface: u8, in_endpoint: u8, out_endpoint: u8) -> Self {
        Self {
            vid,
            pid,
            last_port,
            interface,
            in_endpoint,
            out_endpoint,
            inner: Mutex::new(UsbInner {
                handle: None,
                accumulator: FrameAccumulator::new(),
            }),
            connected: AtomicBool::new(false),
            sending: AtomicBool::new(false),
        }
    }

    pub fn is_present(&self) -> bool {
        find_device(self.vid, self.pid, self.last_port).is_some()
    }
}

impl Transport for UsbTransport {
    fn connect(&self) -> Result<(), TransportError> {
        let device = find_device(self.vid, self.pid, self.last_port)
            .ok_or_else(|| TransportError::Usb(format!("no device matching {:04x}:{:04x}", self.vid, self.pid)))?;
        let mut handle = device
            .open()
            .map_err(|e| TransportError::Usb(format!("open failed: {e}")))?;
        handle
            .claim_interface(self.interface)
            .map_err(|e| TransportError::Usb(format!("claim_interface({}) failed: {e}", self.interface)))?;

        let mut inner = self.inner.lock();
        inner.handle = Some(handle);
        inner.accumulator = FrameAccumulator::new();
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn disconnect(&self) -> Result<(), TransportError> {
        let mut inner = self.inner.lock();
        if let Some(handle) = inner.handle.take() {
            let _ = handle.release_interface(self.interface);
        }
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
            let inner = self.inner.lock();
            let handle = inner.handle.as_ref().ok_or(TransportError::NotConnected)?;
            handle
                .write_bulk(self.out_endpoint, data, Duration::from_secs(1))
                .map_err(|e| TransportError::Usb(format!("write_bulk failed: {e}")))?;
            Ok(())
        })();
        self.sending.store(false, Ordering::SeqCst);
        result
    }

    fn read_until_frame_end(&self, timeout: Duration) -> Result<Vec<u8>, TransportError> {
        let deadline = Instant::now() + timeout;
        let mut inner = self.inner.lock();
        let mut chunk = [0u8; READ_CHUNK];

        loop {
            let now = Instant::now();
            if now >= deadline {
                return Err(TransportError::ReadTimeout);
            }
            let slice = (deadline - now).min(Duration::from_millis(100));
            let handle = inner.handle.as_ref().ok_or(TransportError::NotConnected)?;
            match handle.read_bulk(self.in_endpoint, &mut chunk, slice) {
                Ok(n) if n > 0 => {
                    if let Some(frame) = inner.accumulator.push_bytes(&chunk[..n]) {
                        return Ok(frame);
                    }
                }
                Ok(_) => continue,
                Err(rusb::Error::Timeout) => continue,
                Err(e) => return Err(TransportError::Usb(format!("read_bulk failed: {e}"))),
            }
        }
    }
}
