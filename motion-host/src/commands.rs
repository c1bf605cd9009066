//! Command byte constants for the console and sensor request/response
//! protocol. Only `PING = 0x00` is pinned by a documented worked example;
//! the rest are assigned consistent neighboring values in the same byte
//! range, following the same convention [`crate::frame::PacketType`] uses
//! for its own unpinned values.

pub const PING: u8 = 0x00;
pub const PONG: u8 = 0x01;
pub const GET_VERSION: u8 = 0x02;
pub const ECHO: u8 = 0x03;
pub const TOGGLE_LED: u8 = 0x04;
pub const GET_HARDWARE_ID: u8 = 0x05;
pub const SOFT_RESET: u8 = 0x06;
pub const ENTER_DFU: u8 = 0x07;
pub const GET_TRIGGER_CONFIG: u8 = 0x08;
pub const SET_TRIGGER_CONFIG: u8 = 0x09;
pub const SET_FAN_SPEED: u8 = 0x0A;
pub const GET_FAN_SPEED: u8 = 0x0B;
pub const SET_FAN_ENABLED: u8 = 0x0C;
pub const GET_FAN_ENABLED: u8 = 0x0D;
pub const I2C_WRITE: u8 = 0x0E;
pub const I2C_READ: u8 = 0x0F;
pub const START_TRIGGER: u8 = 0x10;
pub const STOP_TRIGGER: u8 = 0x11;
pub const GET_MOTION_CONFIG: u8 = 0x12;
pub const SET_MOTION_CONFIG: u8 = 0x13;
pub const GET_TEC_SETPOINT: u8 = 0x14;
pub const SET_TEC_SETPOINT: u8 = 0x15;
pub const READ_TEC_ADC: u8 = 0x16;
pub const ENABLE_AGGREGATOR_FSIN: u8 = 0x17;
pub const DISABLE_AGGREGATOR_FSIN: u8 = 0x18;

pub const CAMERA_RESET: u8 = 0x20;
pub const FPGA_ACTIVATE: u8 = 0x21;
pub const FPGA_POWER_ON: u8 = 0x22;
pub const FPGA_POWER_OFF: u8 = 0x23;
pub const FPGA_GET_ID: u8 = 0x24;
pub const FPGA_ENTER_SRAM_PROG: u8 = 0x25;
pub const FPGA_EXIT_SRAM_PROG: u8 = 0x26;
pub const FPGA_ERASE_SRAM: u8 = 0x27;
pub const FPGA_GET_STATUS: u8 = 0x28;
pub const FPGA_GET_USERCODE: u8 = 0x29;
pub const FPGA_PROGRAM_PAGE: u8 = 0x2A;
pub const NVCM_PROGRAM: u8 = 0x2B;
pub const CAMERA_CONFIGURE_REGISTERS: u8 = 0x2C;
pub const CAMERA_CONFIGURE_TEST_PATTERN: u8 = 0x2D;
pub const CAMERA_CAPTURE_HISTOGRAM: u8 = 0x2E;
pub const CAMERA_GET_HISTOGRAM: u8 = 0x2F;
pub const CAMERA_GET_STATUS: u8 = 0x30;
pub const CAMERA_ENABLE: u8 = 0x31;
pub const CAMERA_DISABLE: u8 = 0x32;
pub const CAMERA_ENABLE_FSIN_EXTERNAL: u8 = 0x33;
pub const CAMERA_DISABLE_FSIN_EXTERNAL: u8 = 0x34;
pub const CAMERA_ENABLE_POWER: u8 = 0x35;
pub const CAMERA_DISABLE_POWER: u8 = 0x36;
pub const CAMERA_GET_POWER_STATUS: u8 = 0x37;
pub const CAMERA_SWITCH: u8 = 0x38;
pub const CAMERA_SET_GAIN: u8 = 0x39;
pub const CAMERA_SET_EXPOSURE: u8 = 0x3A;
pub const MASS_ERASE: u8 = 0x3B;

// FPGA page programmer — internal to `FpgaPageProgrammer`, not surfaced
// directly on `SensorProxy`.
pub const FPGA_PROG_OPEN: u8 = 0x40;
pub const FPGA_PROG_CLOSE: u8 = 0x41;
pub const FPGA_PROG_READ_STATUS: u8 = 0x42;
pub const FPGA_PROG_ERASE: u8 = 0x43;
pub const FPGA_PROG_CFG_RESET: u8 = 0x44;
pub const FPGA_PROG_CFG_WRITE_PAGES: u8 = 0x45;
pub const FPGA_PROG_CFG_READ_PAGE: u8 = 0x46;
pub const FPGA_PROG_UFM_RESET: u8 = 0x47;
pub const FPGA_PROG_UFM_WRITE_PAGES: u8 = 0x48;
pub const FPGA_PROG_UFM_READ_PAGE: u8 = 0x49;
pub const FPGA_PROG_WRITE_FEATURE_ROW: u8 = 0x4A;
pub const FPGA_PROG_READ_FEATURE_ROW: u8 = 0x4B;
pub const FPGA_PROG_SET_DONE: u8 = 0x4C;
pub const FPGA_PROG_REFRESH: u8 = 0x4D;
