//! DFU firmware-update supervisor: drives an external `dfu-util` child
//! process and parses its line-oriented progress output rather than
//! reimplementing the DFU protocol.

use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};

use regex::Regex;

use crate::dispatcher::Dispatcher;
use crate::error::DispatchError;
use crate::frame::PacketType;

const SUFFIX_LEN: usize = 16;
const DEFAULT_WAIT_SECONDS: Duration = Duration::from_secs(5);
const DEFAULT_ENUM_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DfuState {
    Idle,
    RequestDfu,
    WaitEnum,
    Flash,
    Verify,
    Done,
    Failed,
}

#[derive(Debug, thiserror::Error)]
pub enum DfuError {
    #[error("enter_dfu command failed: {0}")]
    EnterDfu(#[source] DispatchError),
    #[error("device did not re-enumerate in DFU mode within the timeout")]
    EnumerationTimeout,
    #[error("firmware file not found: {0}")]
    FirmwareNotFound(PathBuf),
    #[error("failed to launch flasher {0:?}: {1}")]
    SpawnFailed(PathBuf, std::io::Error),
    #[error("flasher exited with code {code:?} and no success marker in its output")]
    FlashFailed { code: Option<i32> },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DfuProgress {
    pub phase: Option<DfuPhase>,
    pub percent: Option<u8>,
    pub bytes_written: Option<u64>,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DfuPhase {
    Erase,
    Download,
}

/// Detects the 16-byte DFU suffix by its `UFD` signature.
fn has_dfu_suffix(data: &[u8]) -> bool {
    if data.len() < SUFFIX_LEN {
        return false;
    }
    let suffix = &data[data.len() - SUFFIX_LEN..];
    &suffix[8..11] == b"UFD" && suffix[11] == SUFFIX_LEN as u8
}

/// If `path` carries a DFU suffix, writes a suffix-free copy to a temp file
/// and returns its path; otherwise returns `path` unchanged.
pub fn strip_dfu_suffix_to_temp(path: &Path) -> Result<PathBuf, DfuError> {
    let mut data = Vec::new();
    std::fs::File::open(path)?.read_to_end(&mut data)?;
    if !has_dfu_suffix(&data) {
        return Ok(path.to_path_buf());
    }
    let stripped = &data[..data.len() - SUFFIX_LEN];
    let mut temp = tempfile::Builder::new()
        .prefix(&format!("{}-nosuffix-", path.file_stem().and_then(|s| s.to_str()).unwrap_or("firmware")))
        .suffix(".bin")
        .tempfile()?;
    use std::io::Write;
    temp.write_all(stripped)?;
    let (_, out_path) = temp.keep().map_err(|e| e.error)?;
    Ok(out_path)
}

fn parse_percent(line: &str, re: &Regex) -> Option<u8> {
    let captures = re.captures(line)?;
    let value: u32 = captures.get(1)?.as_str().parse().ok()?;
    (value <= 100).then_some(value as u8)
}

fn parse_bytes(line: &str, re: &Regex) -> Option<u64> {
    re.captures(line)?.get(1)?.as_str().parse().ok()
}

fn phase_from_line(line: &str) -> Option<DfuPhase> {
    let trimmed = line.trim_start();
    if trimmed.starts_with("Erase") {
        Some(DfuPhase::Erase)
    } else if trimmed.starts_with("Download") {
        Some(DfuPhase::Download)
    } else {
        None
    }
}

pub struct DfuSupervisorConfig {
    pub flasher_path: PathBuf,
    pub wait_seconds: Duration,
    pub enum_timeout: Duration,
    pub alt: u8,
    pub start_address: String,
    pub leave: bool,
}

impl Default for DfuSupervisorConfig {
    fn default() -> Self {
        Self {
            flasher_path: PathBuf::from("dfu-util"),
            wait_seconds: DEFAULT_WAIT_SECONDS,
            enum_timeout: DEFAULT_ENUM_TIMEOUT,
            alt: 0,
            start_address: "0x08000000".to_string(),
            leave: true,
        }
    }
}

pub struct DfuSupervisor {
    dispatcher: Arc<Dispatcher>,
    config: DfuSupervisorConfig,
}

impl DfuSupervisor {
    pub fn new(dispatcher: Arc<Dispatcher>, config: DfuSupervisorConfig) -> Self {
        Self { dispatcher, config }
    }

    pub fn mass_erase(&self) -> Result<(), DispatchError> {
        self.dispatcher.call(PacketType::Cmd, crate::commands::MASS_ERASE, 0, 0, Vec::new())?;
        Ok(())
    }

    /// Drives IDLE → REQUEST_DFU → WAIT_ENUM → FLASH → VERIFY → DONE,
    /// invoking `is_dfu_present` to poll for re-enumeration and
    /// `on_progress` at most ~10 Hz while the flasher runs.
    pub fn run<P>(
        &self,
        firmware_path: &Path,
        mut is_dfu_present: impl FnMut() -> bool,
        mut on_progress: Option<P>,
    ) -> Result<DfuState, DfuError>
    where
        P: FnMut(&DfuProgress),
    {
        if !firmware_path.is_file() {
            return Err(DfuError::FirmwareNotFound(firmware_path.to_path_buf()));
        }

        self.dispatcher
            .call(PacketType::Cmd, crate::commands::ENTER_DFU, 0, 0, Vec::new())
            .map_err(DfuError::EnterDfu)?;
        std::thread::sleep(self.config.wait_seconds);

        let deadline = Instant::now() + self.config.enum_timeout;
        loop {
            if is_dfu_present() {
                break;
            }
            if Instant::now() >= deadline {
                return Err(DfuError::EnumerationTimeout);
            }
            std::thread::sleep(Duration::from_millis(500));
        }

        let firmware_path = strip_dfu_suffix_to_temp(firmware_path)?;
        let suffix = if self.config.leave { ":leave" } else { "" };
        let address_opt = format!("{}{}", self.config.start_address, suffix);

        let mut child = Command::new(&self.config.flasher_path)
            .args([
                "-a",
                &self.config.alt.to_string(),
                "-s",
                &address_opt,
                "-D",
                firmware_path.to_string_lossy().as_ref(),
                "-R",
            ])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| DfuError::SpawnFailed(self.config.flasher_path.clone(), e))?;

        let stdout = child.stdout.take().expect("piped stdout");
        let percent_re = Regex::new(r"(\d{1,3})%").expect("valid regex");
        let bytes_re = Regex::new(r"(\d+)\s+bytes").expect("valid regex");

        let mut full_output = String::new();
        let mut last_emit = Instant::now() - Duration::from_secs(1);
        for line in BufReader::new(stdout).lines().map_while(Result::ok) {
            full_output.push_str(&line);
            full_output.push('\n');
            if last_emit.elapsed() >= Duration::from_millis(100) {
                if let Some(cb) = on_progress.as_mut() {
                    cb(&DfuProgress {
                        phase: phase_from_line(&line),
                        percent: parse_percent(&line, &percent_re),
                        bytes_written: parse_bytes(&line, &bytes_re),
                        message: line.clone(),
                    });
                }
                last_emit = Instant::now();
            }
        }

        let status = child.wait()?;
        // Some bootloaders reset immediately after `:leave` and the process
        // returns non-zero; content match takes precedence.
        let success = full_output.contains("File downloaded successfully") || status.success();
        if !success {
            return Err(DfuError::FlashFailed { code: status.code() });
        }

        Ok(DfuState::Done)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn detects_a_valid_dfu_suffix() {
        let mut data = vec![0u8; 32];
        let suffix_start = data.len() - SUFFIX_LEN;
        data[suffix_start + 8..suffix_start + 11].copy_from_slice(b"UFD");
        data[suffix_start + 11] = SUFFIX_LEN as u8;
        assert!(has_dfu_suffix(&data));
    }

    #[test]
    fn does_not_flag_a_file_with_no_suffix() {
        let data = vec![0u8; 32];
        assert!(!has_dfu_suffix(&data));
    }

    #[test]
    fn strips_the_suffix_into_a_new_temp_file() {
        let mut data = vec![0xAAu8; 48];
        let suffix_start = data.len() - SUFFIX_LEN;
        data[suffix_start + 8..suffix_start + 11].copy_from_slice(b"UFD");
        data[suffix_start + 11] = SUFFIX_LEN as u8;

        let mut src = tempfile::NamedTempFile::new().unwrap();
        src.write_all(&data).unwrap();

        let stripped_path = strip_dfu_suffix_to_temp(src.path()).unwrap();
        assert_ne!(stripped_path, src.path());
        let stripped = std::fs::read(&stripped_path).unwrap();
        assert_eq!(stripped.len(), 32);
        std::fs::remove_file(stripped_path).ok();
    }

    #[test]
    fn leaves_a_suffix_free_file_untouched() {
        let data = vec![0x11u8; 32];
        let mut src = tempfile::NamedTempFile::new().unwrap();
        src.write_all(&data).unwrap();
        let result = strip_dfu_suffix_to_temp(src.path()).unwrap();
        assert_eq!(result, src.path());
    }

    #[test]
    fn parses_percent_within_bounds_only() {
        let re = Regex::new(r"(\d{1,3})%").unwrap();
        assert_eq!(parse_percent("Download\t[=====] 42%", &re), Some(42));
        assert_eq!(parse_percent("no percent here", &re), None);
    }

    #[test]
    fn identifies_erase_and_download_phases() {
        assert_eq!(phase_from_line("Erase...done"), Some(DfuPhase::Erase));
        assert_eq!(phase_from_line("Download\t[===] 10%"), Some(DfuPhase::Download));
        assert_eq!(phase_from_line("some other line"), None);
    }
}
