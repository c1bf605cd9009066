//! Sensor board proxy. Adds per-camera operations, addressed by
//! an 8-bit camera-position bitmask (bit `i` selects camera `i`) carried in
//! the frame's `address` field, to every operation [`ConsoleProxy`] already
//! exposes.

use std::collections::HashMap;
use std::ops::Deref;
use std::sync::Arc;

use crate::commands;
use crate::dispatcher::Dispatcher;
use crate::error::{Error, Result, SemanticError};
use crate::frame::PacketType;

use super::{validate_camera_mask, CameraStatus, DeviceProxy};

/// Chunk size used by [`SensorProxy::fpga_program_bitstream`].
pub const BITSTREAM_CHUNK_SIZE: usize = 1024;

pub struct SensorProxy {
    base: DeviceProxy,
    dispatcher: Arc<Dispatcher>,
}

impl SensorProxy {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            base: DeviceProxy::new(dispatcher.clone()),
            dispatcher,
        }
    }

    fn call_masked(&self, command: u8, mask: u32, data: Vec<u8>) -> Result<crate::frame::Frame> {
        let mask = validate_camera_mask(mask)?;
        Ok(self.dispatcher.call(PacketType::Camera, command, mask, 0, data)?)
    }

    /// Maps an 8-byte (one-per-camera) response down to the bits set in `mask`.
    fn read_per_camera(&self, command: u8, mask: u32) -> Result<HashMap<u8, u8>> {
        let wire_mask = validate_camera_mask(mask)?;
        let response = self.call_masked(command, mask, Vec::new())?;
        Ok(bits(wire_mask)
            .filter_map(|i| response.data.get(i as usize).map(|&b| (i, b)))
            .collect())
    }

    fn read_per_camera_u32(&self, command: u8, mask: u32) -> Result<HashMap<u8, u32>> {
        let wire_mask = validate_camera_mask(mask)?;
        let response = self.call_masked(command, mask, Vec::new())?;
        Ok(bits(wire_mask)
            .filter_map(|i| {
                let start = i as usize * 4;
                response
                    .data
                    .get(start..start + 4)
                    .map(|b| (i, u32::from_le_bytes([b[0], b[1], b[2], b[3]])))
            })
            .collect())
    }

    pub fn camera_reset(&self, mask: u32) -> Result<()> {
        self.call_masked(commands::CAMERA_RESET, mask, Vec::new()).map(|_| ())
    }

    pub fn fpga_activate(&self, mask: u32) -> Result<()> {
        self.call_masked(commands::FPGA_ACTIVATE, mask, Vec::new()).map(|_| ())
    }

    pub fn fpga_power_on(&self, mask: u32) -> Result<()> {
        self.call_masked(commands::FPGA_POWER_ON, mask, Vec::new()).map(|_| ())
    }

    pub fn fpga_power_off(&self, mask: u32) -> Result<()> {
        self.call_masked(commands::FPGA_POWER_OFF, mask, Vec::new()).map(|_| ())
    }

    pub fn fpga_get_id(&self, mask: u32) -> Result<HashMap<u8, u32>> {
        self.read_per_camera_u32(commands::FPGA_GET_ID, mask)
    }

    pub fn fpga_enter_sram_prog(&self, mask: u32) -> Result<()> {
        self.call_masked(commands::FPGA_ENTER_SRAM_PROG, mask, Vec::new()).map(|_| ())
    }

    pub fn fpga_exit_sram_prog(&self, mask: u32) -> Result<()> {
        self.call_masked(commands::FPGA_EXIT_SRAM_PROG, mask, Vec::new()).map(|_| ())
    }

    pub fn fpga_erase_sram(&self, mask: u32) -> Result<()> {
        self.call_masked(commands::FPGA_ERASE_SRAM, mask, Vec::new()).map(|_| ())
    }

    pub fn fpga_get_status(&self, mask: u32) -> Result<HashMap<u8, u8>> {
        self.read_per_camera(commands::FPGA_GET_STATUS, mask)
    }

    pub fn fpga_get_usercode(&self, mask: u32) -> Result<HashMap<u8, u32>> {
        self.read_per_camera_u32(commands::FPGA_GET_USERCODE, mask)
    }

    pub fn nvcm_program(&self, mask: u32) -> Result<()> {
        self.call_masked(commands::NVCM_PROGRAM, mask, Vec::new()).map(|_| ())
    }

    /// Streams an SRAM bitstream to the cameras in `mask`, 1024 bytes per
    /// chunk. Each chunk carries an increasing block counter and a last-chunk
    /// flag; the final chunk also carries the big-endian CRC-16 of the whole
    /// file. Each chunk's response is awaited before the next is sent.
    pub fn fpga_program_bitstream(&self, mask: u32, bitstream: &[u8]) -> Result<()> {
        let crc = crate::crc::crc16(bitstream);
        let mut chunks: Vec<&[u8]> = bitstream.chunks(BITSTREAM_CHUNK_SIZE).collect();
        if chunks.is_empty() {
            chunks.push(&[]);
        }
        let last_index = chunks.len() - 1;

        for (counter, chunk) in chunks.into_iter().enumerate() {
            let is_last = counter == last_index;
            let mut payload = Vec::with_capacity(3 + chunk.len() + if is_last { 2 } else { 0 });
            payload.extend_from_slice(&(counter as u16).to_be_bytes());
            payload.push(is_last as u8);
            payload.extend_from_slice(chunk);
            if is_last {
                payload.extend_from_slice(&crc.to_be_bytes());
            }
            self.call_masked(commands::FPGA_PROGRAM_PAGE, mask, payload)?;
        }
        Ok(())
    }

    /// `registers` is a flat list of `(address, value)` pairs.
    pub fn camera_configure_registers(&self, mask: u32, registers: &[(u8, u8)]) -> Result<()> {
        let mut payload = Vec::with_capacity(registers.len() * 2);
        for &(addr, value) in registers {
            payload.push(addr);
            payload.push(value);
        }
        self.call_masked(commands::CAMERA_CONFIGURE_REGISTERS, mask, payload).map(|_| ())
    }

    pub fn camera_configure_test_pattern(&self, mask: u32, pattern: u8) -> Result<()> {
        if pattern > 4 {
            return Err(Error::Semantic(SemanticError::InvalidTestPattern(pattern)));
        }
        self.call_masked(commands::CAMERA_CONFIGURE_TEST_PATTERN, mask, vec![pattern]).map(|_| ())
    }

    pub fn camera_capture_histogram(&self, mask: u32) -> Result<()> {
        self.call_masked(commands::CAMERA_CAPTURE_HISTOGRAM, mask, Vec::new()).map(|_| ())
    }

    /// Returns the raw aggregated-packet bytes; decode with
    /// [`crate::histogram::parse_histogram_stream`].
    pub fn camera_get_histogram(&self, mask: u32) -> Result<Vec<u8>> {
        Ok(self.call_masked(commands::CAMERA_GET_HISTOGRAM, mask, Vec::new())?.data)
    }

    /// status bits: 0=READY, 1=PROGRAMMED, 2=CONFIGURED, 7=STREAMING.
    pub fn camera_get_status(&self, mask: u32) -> Result<HashMap<u8, CameraStatus>> {
        Ok(self
            .read_per_camera(commands::CAMERA_GET_STATUS, mask)?
            .into_iter()
            .map(|(i, bits)| (i, CameraStatus::from_bits_truncate(bits)))
            .collect())
    }

    pub fn enable_camera(&self, mask: u32) -> Result<()> {
        self.call_masked(commands::CAMERA_ENABLE, mask, Vec::new()).map(|_| ())
    }

    pub fn disable_camera(&self, mask: u32) -> Result<()> {
        self.call_masked(commands::CAMERA_DISABLE, mask, Vec::new()).map(|_| ())
    }

    pub fn enable_fsin_external(&self, mask: u32) -> Result<()> {
        self.call_masked(commands::CAMERA_ENABLE_FSIN_EXTERNAL, mask, Vec::new()).map(|_| ())
    }

    pub fn disable_fsin_external(&self, mask: u32) -> Result<()> {
        self.call_masked(commands::CAMERA_DISABLE_FSIN_EXTERNAL, mask, Vec::new()).map(|_| ())
    }

    pub fn enable_camera_power(&self, mask: u32) -> Result<()> {
        self.call_masked(commands::CAMERA_ENABLE_POWER, mask, Vec::new()).map(|_| ())
    }

    pub fn disable_camera_power(&self, mask: u32) -> Result<()> {
        self.call_masked(commands::CAMERA_DISABLE_POWER, mask, Vec::new()).map(|_| ())
    }

    /// Companion read to `enable/disable_camera_power`.
    pub fn get_camera_power_status(&self) -> Result<Vec<bool>> {
        let response = self.call_masked(commands::CAMERA_GET_POWER_STATUS, 0xFF, Vec::new())?;
        Ok((0..8).map(|i| response.data.get(i).copied().unwrap_or(0) != 0).collect())
    }

    /// Selects the active camera on shared I2C/mux hardware, independent of
    /// the streaming-enable bitmask operations.
    pub fn switch_camera(&self, camera_id: u8) -> Result<()> {
        self.base.call(commands::CAMERA_SWITCH, vec![camera_id]).map(|_| ())
    }

    pub fn camera_set_gain(&self, gain: u16) -> Result<()> {
        self.base.call(commands::CAMERA_SET_GAIN, gain.to_le_bytes().to_vec()).map(|_| ())
    }

    pub fn camera_set_exposure(&self, exposure_selection: u8, microseconds: u32) -> Result<()> {
        let mut payload = vec![exposure_selection];
        payload.extend_from_slice(&microseconds.to_le_bytes());
        self.base.call(commands::CAMERA_SET_EXPOSURE, payload).map(|_| ())
    }
}

impl Deref for SensorProxy {
    type Target = DeviceProxy;

    fn deref(&self) -> &DeviceProxy {
        &self.base
    }
}

fn bits(mask: u8) -> impl Iterator<Item = u8> {
    (0..8).filter(move |i| mask & (1 << i) != 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Frame;
    use std::time::Duration;

    fn demo_sensor() -> SensorProxy {
        let dispatcher = Dispatcher::new_demo(
            |req| Frame::new(req.id, PacketType::Resp, req.command, req.address, 0, vec![0xAB; 8]),
            Duration::from_millis(50),
        );
        SensorProxy::new(Arc::new(dispatcher))
    }

    #[test]
    fn rejects_out_of_range_camera_mask() {
        let sensor = demo_sensor();
        let err = sensor.camera_reset(0x100).unwrap_err();
        assert!(matches!(err, Error::Semantic(SemanticError::InvalidCameraMask(0x100))));
    }

    #[test]
    fn get_camera_status_only_reports_bits_set_in_the_mask() {
        let sensor = demo_sensor();
        let statuses = sensor.camera_get_status(0x81).unwrap();
        assert_eq!(statuses.len(), 2);
        assert!(statuses.contains_key(&0));
        assert!(statuses.contains_key(&7));
        assert!(!statuses.contains_key(&1));
    }

    #[test]
    fn rejects_out_of_range_test_pattern() {
        let sensor = demo_sensor();
        let err = sensor.camera_configure_test_pattern(0x01, 5).unwrap_err();
        assert!(matches!(err, Error::Semantic(SemanticError::InvalidTestPattern(5))));
    }

    #[test]
    fn bitstream_upload_sends_one_chunk_per_1024_bytes_with_a_crc_on_the_last() {
        let seen: Arc<std::sync::Mutex<Vec<(u16, bool, usize)>>> = Arc::new(std::sync::Mutex::new(Vec::new()));
        let seen_worker = seen.clone();
        let dispatcher = Dispatcher::new_demo(
            move |req| {
                let counter = u16::from_be_bytes([req.data[0], req.data[1]]);
                let is_last = req.data[2] != 0;
                seen_worker.lock().unwrap().push((counter, is_last, req.data.len()));
                Frame::new(req.id, PacketType::Resp, req.command, req.address, 0, Vec::new())
            },
            Duration::from_millis(50),
        );
        let sensor = SensorProxy::new(Arc::new(dispatcher));

        let bitstream = vec![0x42u8; BITSTREAM_CHUNK_SIZE * 2 + 10];
        sensor.fpga_program_bitstream(0x01, &bitstream).unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[0], (0, false, 3 + BITSTREAM_CHUNK_SIZE));
        assert_eq!(seen[1], (1, false, 3 + BITSTREAM_CHUNK_SIZE));
        assert_eq!(seen[2], (2, true, 3 + 10 + 2));
    }
}
