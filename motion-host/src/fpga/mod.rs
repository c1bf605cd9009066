//! FPGA page-by-page programmer: drives the Lattice MachXO2 configuration
//! sequence one 16-byte page at a time instead of buffering the whole
//! bitstream device-side.

pub mod jedec;

use std::path::Path;
use std::time::Duration;

use bitflags::bitflags;

use crate::commands;
use crate::dispatcher::Dispatcher;
use crate::error::DispatchError;
use crate::frame::PacketType;

use jedec::{parse_jedec, JedecError};

pub const PAGE_SIZE: usize = 16;
const DEFAULT_BATCH_PAGES: usize = 16;

bitflags! {
    /// Status register bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FpgaStatus: u32 {
        const BUSY   = 1 << 12;
        const FAIL   = 1 << 13;
        const ISC_EN = 1 << 14;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct EraseMode: u8 {
        const CFG         = 1 << 0;
        const UFM         = 1 << 1;
        const FEATURE_ROW = 1 << 2;
        const ALL = Self::CFG.bits() | Self::UFM.bits() | Self::FEATURE_ROW.bits();
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FpgaProgramError {
    #[error("FPGA_PROG_OPEN failed after retries: {0}")]
    Open(#[source] DispatchError),
    #[error("FPGA_PROG_ERASE failed: {cause} (status: {status:?})")]
    Erase {
        cause: DispatchError,
        status: Option<FpgaStatus>,
    },
    #[error("CFG reset address failed: {0}")]
    CfgReset(#[source] DispatchError),
    #[error("CFG write failed at page {page}: {cause}")]
    CfgWrite { page: usize, cause: DispatchError },
    #[error("CFG read-back failed at page {page}: {cause}")]
    CfgRead { page: usize, cause: DispatchError },
    #[error("CFG verify mismatch at page {page}")]
    CfgVerifyMismatch { page: usize },
    #[error("UFM reset address failed: {0}")]
    UfmReset(#[source] DispatchError),
    #[error("UFM write failed at page {page}: {cause}")]
    UfmWrite { page: usize, cause: DispatchError },
    #[error("UFM read-back failed at page {page}: {cause}")]
    UfmRead { page: usize, cause: DispatchError },
    #[error("UFM verify mismatch at page {page}")]
    UfmVerifyMismatch { page: usize },
    #[error("feature row write failed: {0}")]
    FeatureRowWrite(#[source] DispatchError),
    #[error("feature row read-back failed: {0}")]
    FeatureRowRead(#[source] DispatchError),
    #[error("feature row verify mismatch")]
    FeatureRowVerifyMismatch,
    #[error("set DONE failed: {0}")]
    SetDone(#[source] DispatchError),
    #[error("refresh failed: {0}")]
    Refresh(#[source] DispatchError),
    #[error("data length {0} is not a multiple of the 16-byte page size")]
    NotPageAligned(usize),
    #[error(transparent)]
    Jedec(#[from] JedecError),
    #[error("JEDEC file not found: {0}")]
    FileNotFound(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type ProgressCallback<'a> = dyn FnMut(usize, usize) + 'a;

/// Raw sector data ready to be streamed page by page. `program_from_jedec`
/// always produces an empty `ufm` — the JEDEC parser packs all fuse data
/// into the CFG sector (mirrors the original, which never separately
/// populates UFM from a parsed `.jed`).
pub struct ProgramImage {
    pub cfg: Vec<u8>,
    pub ufm: Vec<u8>,
    pub feature_row: [u8; 8],
    pub feabits: [u8; 2],
}

pub struct FpgaPageProgrammer {
    dispatcher: std::sync::Arc<Dispatcher>,
    verify: bool,
    erase_mode: EraseMode,
    erase_timeout: Duration,
    refresh_timeout: Duration,
}

impl FpgaPageProgrammer {
    pub fn new(dispatcher: std::sync::Arc<Dispatcher>) -> Self {
        Self {
            dispatcher,
            verify: true,
            erase_mode: EraseMode::ALL,
            erase_timeout: Duration::from_secs(35),
            refresh_timeout: Duration::from_secs(10),
        }
    }

    pub fn with_verify(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    fn call(&self, channel: u8, command: u8, data: Vec<u8>) -> Result<crate::frame::Frame, DispatchError> {
        self.dispatcher.call(PacketType::Fpga, command, channel, 0, data)
    }

    fn read_status(&self, channel: u8) -> Option<FpgaStatus> {
        let response = self.call(channel, commands::FPGA_PROG_READ_STATUS, Vec::new()).ok()?;
        let bytes = response.data.get(0..4)?;
        Some(FpgaStatus::from_bits_truncate(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])))
    }

    pub fn program_from_jedec(
        &self,
        channel: u8,
        jedec_path: &Path,
        on_progress: Option<&mut ProgressCallback>,
    ) -> Result<(), FpgaProgramError> {
        let content = std::fs::read_to_string(jedec_path)
            .map_err(|_| FpgaProgramError::FileNotFound(jedec_path.display().to_string()))?;
        let image = parse_jedec(&content)?;
        let program_image = ProgramImage {
            cfg: image.data,
            ufm: Vec::new(),
            feature_row: image.feature_row.unwrap_or([0; 8]),
            feabits: image.feabits.unwrap_or([0; 2]),
        };
        self.program_raw(channel, &program_image, on_progress)
    }

    /// Drives the full open/erase/program/verify/close sequence.
    pub fn program_raw(
        &self,
        channel: u8,
        image: &ProgramImage,
        mut on_progress: Option<&mut ProgressCallback>,
    ) -> Result<(), FpgaProgramError> {
        if image.cfg.len() % PAGE_SIZE != 0 {
            return Err(FpgaProgramError::NotPageAligned(image.cfg.len()));
        }
        if image.ufm.len() % PAGE_SIZE != 0 {
            return Err(FpgaProgramError::NotPageAligned(image.ufm.len()));
        }
        let cfg_pages = image.cfg.len() / PAGE_SIZE;
        let ufm_pages = image.ufm.len() / PAGE_SIZE;
        let total_pages = cfg_pages + ufm_pages;
        let mut written = 0;

        let result = (|| -> Result<(), FpgaProgramError> {
            // Step 1: open, with up to 3 retries 0.5s apart.
            let mut last_err = None;
            for _ in 0..3 {
                match self.call(channel, commands::FPGA_PROG_OPEN, Vec::new()) {
                    Ok(_) => {
                        last_err = None;
                        break;
                    }
                    Err(e) => {
                        last_err = Some(e);
                        std::thread::sleep(Duration::from_millis(500));
                    }
                }
            }
            if let Some(e) = last_err {
                return Err(FpgaProgramError::Open(e));
            }

            // Step 2: erase.
            if let Err(cause) = self.call(channel, commands::FPGA_PROG_ERASE, vec![self.erase_mode.bits()]) {
                let status = self.read_status(channel);
                return Err(FpgaProgramError::Erase { cause, status });
            }

            // Step 3: CFG write.
            self.call(channel, commands::FPGA_PROG_CFG_RESET, Vec::new())
                .map_err(FpgaProgramError::CfgReset)?;
            let mut i = 0;
            while i < cfg_pages {
                let batch = DEFAULT_BATCH_PAGES.min(cfg_pages - i);
                let chunk = image.cfg[i * PAGE_SIZE..(i + batch) * PAGE_SIZE].to_vec();
                self.call(channel, commands::FPGA_PROG_CFG_WRITE_PAGES, chunk)
                    .map_err(|cause| FpgaProgramError::CfgWrite { page: i, cause })?;
                i += batch;
                for _ in 0..batch {
                    written += 1;
                    if let Some(cb) = on_progress.as_deref_mut() {
                        cb(written, total_pages);
                    }
                }
            }

            // Step 4: CFG verify.
            if self.verify && cfg_pages > 0 {
                self.call(channel, commands::FPGA_PROG_CFG_RESET, Vec::new())
                    .map_err(FpgaProgramError::CfgReset)?;
                for page in 0..cfg_pages {
                    let expected = &image.cfg[page * PAGE_SIZE..(page + 1) * PAGE_SIZE];
                    let response = self
                        .call(channel, commands::FPGA_PROG_CFG_READ_PAGE, Vec::new())
                        .map_err(|cause| FpgaProgramError::CfgRead { page, cause })?;
                    if response.data != expected {
                        return Err(FpgaProgramError::CfgVerifyMismatch { page });
                    }
                }
            }

            // Step 5: UFM write, if present.
            if ufm_pages > 0 {
                self.call(channel, commands::FPGA_PROG_UFM_RESET, Vec::new())
                    .map_err(FpgaProgramError::UfmReset)?;
                let mut i = 0;
                while i < ufm_pages {
                    let batch = DEFAULT_BATCH_PAGES.min(ufm_pages - i);
                    let chunk = image.ufm[i * PAGE_SIZE..(i + batch) * PAGE_SIZE].to_vec();
                    self.call(channel, commands::FPGA_PROG_UFM_WRITE_PAGES, chunk)
                        .map_err(|cause| FpgaProgramError::UfmWrite { page: i, cause })?;
                    i += batch;
                    for _ in 0..batch {
                        written += 1;
                        if let Some(cb) = on_progress.as_deref_mut() {
                            cb(written, total_pages);
                        }
                    }
                }

                // Step 6: UFM verify.
                if self.verify {
                    self.call(channel, commands::FPGA_PROG_UFM_RESET, Vec::new())
                        .map_err(FpgaProgramError::UfmReset)?;
                    for page in 0..ufm_pages {
                        let expected = &image.ufm[page * PAGE_SIZE..(page + 1) * PAGE_SIZE];
                        let response = self
                            .call(channel, commands::FPGA_PROG_UFM_READ_PAGE, Vec::new())
                            .map_err(|cause| FpgaProgramError::UfmRead { page, cause })?;
                        if response.data != expected {
                            return Err(FpgaProgramError::UfmVerifyMismatch { page });
                        }
                    }
                }
            }

            // Step 7: feature row + FEABITS.
            let mut feature_payload = image.feature_row.to_vec();
            feature_payload.extend_from_slice(&image.feabits);
            self.call(channel, commands::FPGA_PROG_WRITE_FEATURE_ROW, feature_payload)
                .map_err(FpgaProgramError::FeatureRowWrite)?;

            // Step 8: feature row verify.
            if self.verify {
                let response = self
                    .call(channel, commands::FPGA_PROG_READ_FEATURE_ROW, Vec::new())
                    .map_err(FpgaProgramError::FeatureRowRead)?;
                let mut expected = image.feature_row.to_vec();
                expected.extend_from_slice(&image.feabits);
                if response.data != expected {
                    return Err(FpgaProgramError::FeatureRowVerifyMismatch);
                }
            }

            // Step 9: DONE bit.
            self.call(channel, commands::FPGA_PROG_SET_DONE, Vec::new())
                .map_err(FpgaProgramError::SetDone)?;

            // Step 10: refresh.
            self.call(channel, commands::FPGA_PROG_REFRESH, self.refresh_timeout.as_millis().to_le_bytes().to_vec())
                .map_err(FpgaProgramError::Refresh)?;

            Ok(())
        })();

        if result.is_err() {
            let _ = self.call(channel, commands::FPGA_PROG_CLOSE, Vec::new());
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Frame;
    use std::sync::Arc;

    fn programmer_with<F>(responder: F) -> FpgaPageProgrammer
    where
        F: Fn(&Frame) -> Frame + Send + Sync + 'static,
    {
        let dispatcher = Dispatcher::new_demo(responder, Duration::from_millis(50));
        FpgaPageProgrammer::new(Arc::new(dispatcher))
    }

    fn ack(req: &Frame) -> Frame {
        Frame::new(req.id, PacketType::Resp, req.command, req.address, 0, Vec::new())
    }

    #[test]
    fn happy_path_programs_three_cfg_pages_with_verify() {
        let programmer = programmer_with(|req| match req.command {
            c if c == commands::FPGA_PROG_CFG_READ_PAGE => {
                Frame::new(req.id, PacketType::Resp, req.command, req.address, 0, vec![0xAB; PAGE_SIZE])
            }
            c if c == commands::FPGA_PROG_READ_FEATURE_ROW => {
                Frame::new(req.id, PacketType::Resp, req.command, req.address, 0, vec![0u8; 10])
            }
            _ => ack(req),
        });
        let image = ProgramImage {
            cfg: vec![0xAB; PAGE_SIZE * 3],
            ufm: Vec::new(),
            feature_row: [0; 8],
            feabits: [0; 2],
        };
        let mut progress = Vec::new();
        programmer
            .program_raw(0, &image, Some(&mut |done, total| progress.push((done, total))))
            .unwrap();
        assert_eq!(progress, vec![(1, 3), (2, 3), (3, 3)]);
    }

    #[test]
    fn cfg_verify_mismatch_is_reported_with_the_failing_page() {
        let programmer = programmer_with(|req| match req.command {
            c if c == commands::FPGA_PROG_CFG_READ_PAGE => {
                Frame::new(req.id, PacketType::Resp, req.command, req.address, 0, vec![0u8; PAGE_SIZE])
            }
            _ => ack(req),
        });
        let image = ProgramImage {
            cfg: vec![0xFF; PAGE_SIZE],
            ufm: Vec::new(),
            feature_row: [0; 8],
            feabits: [0; 2],
        };
        let err = programmer.program_raw(0, &image, None).unwrap_err();
        assert!(matches!(err, FpgaProgramError::CfgVerifyMismatch { page: 0 }));
    }

    #[test]
    fn rejects_cfg_data_not_a_multiple_of_the_page_size() {
        let programmer = programmer_with(|req| ack(req));
        let image = ProgramImage {
            cfg: vec![0u8; 5],
            ufm: Vec::new(),
            feature_row: [0; 8],
            feabits: [0; 2],
        };
        let err = programmer.program_raw(0, &image, None).unwrap_err();
        assert!(matches!(err, FpgaProgramError::NotPageAligned(5)));
    }
}
