//! Device proxies: typed, synchronous surfaces over a [`Dispatcher`], one
//! per device role. Each hardware operation gets its own small,
//! independently documented method rather than one catch-all
//! `send(command)` call.

pub mod combinators;
pub mod console;
pub mod sensor;

use std::sync::Arc;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::commands;
use crate::dispatcher::Dispatcher;
use crate::error::{Error, Result, SemanticError};
use crate::frame::{Frame, PacketType};
use crate::motion_config::MotionConfig;

bitflags! {
    /// Per-camera status bits returned by `get_camera_status`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CameraStatus: u8 {
        const READY      = 1 << 0;
        const PROGRAMMED = 1 << 1;
        const CONFIGURED = 1 << 2;
        const STREAMING  = 1 << 7;
    }
}

/// Explicit configuration for trigger setup, rather than a loosely-typed
/// dictionary of optional fields.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TriggerConfig {
    pub frequency_hz: u32,
    pub trigger_pulse_width_us: u32,
    pub laser_pulse_delay_us: u32,
    pub laser_pulse_width_us: u32,
    pub laser_pulse_skip_interval: u32,
    pub enable_sync_out: bool,
    pub enable_ta_trigger: bool,
}

/// 0..=3 selects one TEC ADC channel; `All` reads all four in one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TecAdcChannel {
    Channel(u8),
    All,
}

impl TecAdcChannel {
    fn wire_value(self) -> Result<u8> {
        match self {
            TecAdcChannel::Channel(n) if n <= 3 => Ok(n),
            TecAdcChannel::Channel(n) => Err(Error::Semantic(SemanticError::InvalidTecAdcChannel(n))),
            TecAdcChannel::All => Ok(4),
        }
    }
}

/// Validates an 8-bit camera-position bitmask.
pub fn validate_camera_mask(mask: u32) -> Result<u8> {
    if mask > 0xFF {
        return Err(Error::Semantic(SemanticError::InvalidCameraMask(mask)));
    }
    Ok(mask as u8)
}

/// Operations common to both the console and every sensor board, owning the
/// dispatcher that talks to one physical device.
pub struct DeviceProxy {
    dispatcher: Arc<Dispatcher>,
}

impl DeviceProxy {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self { dispatcher }
    }

    fn call(&self, command: u8, data: Vec<u8>) -> Result<Frame> {
        Ok(self.dispatcher.call(PacketType::Cmd, command, 0, 0, data)?)
    }

    pub fn ping(&self) -> Result<()> {
        self.call(commands::PING, Vec::new()).map(|_| ())
    }

    pub fn pong(&self) -> Result<()> {
        self.call(commands::PONG, Vec::new()).map(|_| ())
    }

    /// 3-byte reply `major.minor.patch`.
    pub fn get_version(&self) -> Result<(u8, u8, u8)> {
        let response = self.call(commands::GET_VERSION, Vec::new())?;
        let d = &response.data;
        Ok((d.first().copied().unwrap_or(0), d.get(1).copied().unwrap_or(0), d.get(2).copied().unwrap_or(0)))
    }

    pub fn echo(&self, byte: u8) -> Result<u8> {
        let response = self.call(commands::ECHO, vec![byte])?;
        Ok(response.data.first().copied().unwrap_or(0))
    }

    pub fn toggle_led(&self) -> Result<()> {
        self.call(commands::TOGGLE_LED, Vec::new()).map(|_| ())
    }

    /// Reads the device's 16-byte hardware identifier.
    pub fn get_hardware_id(&self) -> Result<[u8; 16]> {
        let response = self.call(commands::GET_HARDWARE_ID, Vec::new())?;
        let mut id = [0u8; 16];
        let n = response.data.len().min(16);
        id[..n].copy_from_slice(&response.data[..n]);
        Ok(id)
    }

    pub fn soft_reset(&self) -> Result<()> {
        self.call(commands::SOFT_RESET, Vec::new()).map(|_| ())
    }

    pub fn enter_dfu(&self) -> Result<()> {
        self.call(commands::ENTER_DFU, Vec::new()).map(|_| ())
    }

    pub fn get_trigger_config(&self) -> Result<TriggerConfig> {
        let response = self.call(commands::GET_TRIGGER_CONFIG, Vec::new())?;
        let cfg: TriggerConfig = serde_json::from_slice(&response.data)?;
        Ok(cfg)
    }

    pub fn set_trigger_config(&self, cfg: &TriggerConfig) -> Result<()> {
        let payload = serde_json::to_vec(cfg)?;
        self.call(commands::SET_TRIGGER_CONFIG, payload).map(|_| ())
    }

    /// Fan-speed scalar, kept distinct from [`DeviceProxy::set_fan_enabled`]
    /// since the two firmware commands are independent: one sets a PWM duty
    /// cycle, the other toggles the fan rail on or off.
    pub fn set_fan_speed(&self, percent: u8) -> Result<()> {
        self.call(commands::SET_FAN_SPEED, vec![percent]).map(|_| ())
    }

    pub fn get_fan_speed(&self) -> Result<u8> {
        let response = self.call(commands::GET_FAN_SPEED, Vec::new())?;
        Ok(response.data.first().copied().unwrap_or(0))
    }

    pub fn set_fan_enabled(&self, on: bool) -> Result<()> {
        self.call(commands::SET_FAN_ENABLED, vec![on as u8]).map(|_| ())
    }

    pub fn get_fan_enabled(&self) -> Result<bool> {
        let response = self.call(commands::GET_FAN_ENABLED, Vec::new())?;
        Ok(response.data.first().copied().unwrap_or(0) != 0)
    }

    pub fn write_i2c(&self, address: u8, data: &[u8]) -> Result<()> {
        let mut payload = vec![address];
        payload.extend_from_slice(data);
        self.call(commands::I2C_WRITE, payload).map(|_| ())
    }

    pub fn read_i2c(&self, address: u8, len: u8) -> Result<Vec<u8>> {
        let response = self.call(commands::I2C_READ, vec![address, len])?;
        Ok(response.data)
    }

    pub fn start_trigger(&self) -> Result<()> {
        self.call(commands::START_TRIGGER, Vec::new()).map(|_| ())
    }

    pub fn stop_trigger(&self) -> Result<()> {
        self.call(commands::STOP_TRIGGER, Vec::new()).map(|_| ())
    }

    pub fn get_motion_config(&self) -> Result<MotionConfig> {
        let response = self.call(commands::GET_MOTION_CONFIG, Vec::new())?;
        Ok(MotionConfig::from_wire_bytes(&response.data)?)
    }

    pub fn set_motion_config(&self, config: &MotionConfig) -> Result<()> {
        self.call(commands::SET_MOTION_CONFIG, config.to_wire_bytes()).map(|_| ())
    }

    pub fn get_tec_setpoint(&self) -> Result<f32> {
        let response = self.call(commands::GET_TEC_SETPOINT, Vec::new())?;
        Ok(read_f32_le(&response.data))
    }

    pub fn set_tec_setpoint(&self, celsius: f32) -> Result<()> {
        self.call(commands::SET_TEC_SETPOINT, celsius.to_le_bytes().to_vec()).map(|_| ())
    }

    pub fn read_tec_adc(&self, channel: TecAdcChannel) -> Result<Vec<u16>> {
        let response = self.call(commands::READ_TEC_ADC, vec![channel.wire_value()?])?;
        Ok(response.data.chunks_exact(2).map(|c| u16::from_le_bytes([c[0], c[1]])).collect())
    }

    pub fn enable_aggregator_fsin(&self) -> Result<()> {
        self.call(commands::ENABLE_AGGREGATOR_FSIN, Vec::new()).map(|_| ())
    }

    pub fn disable_aggregator_fsin(&self) -> Result<()> {
        self.call(commands::DISABLE_AGGREGATOR_FSIN, Vec::new()).map(|_| ())
    }
}

fn read_f32_le(data: &[u8]) -> f32 {
    let mut bytes = [0u8; 4];
    let n = data.len().min(4);
    bytes[..n].copy_from_slice(&data[..n]);
    f32::from_le_bytes(bytes)
}
