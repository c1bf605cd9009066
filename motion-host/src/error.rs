//! Crate-wide error taxonomy. Each layer gets its own error type; this module
//! composes them into one `Error` via `#[from]` so callers can use `?`
//! anywhere in the library and still downcast to the layer that failed.

use std::fmt;

use crate::dfu::DfuError;
use crate::fpga::FpgaProgramError;
use crate::frame::FrameError;
use crate::histogram::HistogramParseError;
use crate::motion_config::MotionConfigError;

pub type Result<T> = std::result::Result<T, Error>;

/// Transport-layer errors: not connected, write failed, read timed out, or
/// the device vanished mid-call. Hand-rolled (rather than `thiserror`-derived)
/// since it sits on the hot path and carries a raw `io::Error` payload.
#[derive(Debug)]
pub enum TransportError {
    NotConnected,
    Io(std::io::Error),
    ReadTimeout,
    DisconnectedMidCall,
    Usb(String),
    ConcurrentSendViolation,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::NotConnected => write!(f, "transport is not connected"),
            TransportError::Io(e) => write!(f, "transport I/O error: {e}"),
            TransportError::ReadTimeout => write!(f, "read timed out before a full frame arrived"),
            TransportError::DisconnectedMidCall => {
                write!(f, "device disconnected while a call was in flight")
            }
            TransportError::Usb(msg) => write!(f, "USB error: {msg}"),
            TransportError::ConcurrentSendViolation => {
                write!(f, "concurrent send on a single transport is a contract violation")
            }
        }
    }
}

impl std::error::Error for TransportError {}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        TransportError::Io(err)
    }
}

/// A response whose `type` is one of `ERROR`/`BAD_CRC`/`BAD_PARSE`/`UNKNOWN`,
/// surfaced with the response attached for diagnosis.
#[derive(Debug, thiserror::Error)]
#[error("device returned an error response: {response:?}")]
pub struct CommandError {
    pub response: crate::frame::Frame,
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error("no response for request id {0} within the timeout")]
    Timeout(u16),
    #[error(transparent)]
    Command(#[from] CommandError),
    #[error("request id counter exhausted its in-flight slots")]
    PendingMapFull,
}

#[derive(Debug, thiserror::Error)]
pub enum ReleaseFetchError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("no releases found for {owner}/{repo}")]
    NoReleases { owner: String, repo: String },
    #[error("unsupported archive format {0:?}, expected \"zip\" or \"tar.gz\"")]
    UnsupportedArchiveFormat(String),
    #[error("asset {0:?} not found on release")]
    AssetNotFound(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum SemanticError {
    #[error("invalid camera position mask {0:#04x}, must be 0x00..=0xFF")]
    InvalidCameraMask(u32),
    #[error("invalid test pattern {0}, must be 0..=4")]
    InvalidTestPattern(u8),
    #[error("invalid TEC ADC channel {0}, must be 0..=3")]
    InvalidTecAdcChannel(u8),
    #[error("file size {0} is not a multiple of the 16-byte page size")]
    FileSizeNotPageAligned(usize),
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    #[error(transparent)]
    Semantic(#[from] SemanticError),
    #[error(transparent)]
    Fpga(#[from] FpgaProgramError),
    #[error(transparent)]
    Dfu(#[from] DfuError),
    #[error(transparent)]
    Release(#[from] ReleaseFetchError),
    #[error(transparent)]
    MotionConfig(#[from] MotionConfigError),
    #[error(transparent)]
    Histogram(#[from] HistogramParseError),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl From<CommandError> for Error {
    fn from(err: CommandError) -> Self {
        Error::Dispatch(DispatchError::Command(err))
    }
}
