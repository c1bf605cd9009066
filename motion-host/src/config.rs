//! Tunables for the library: a doc-commented struct with a `Default` impl,
//! deserializable so a host application can load overrides without a
//! bespoke config-file format.

use std::time::Duration;

use serde::Deserialize;

fn default_command_timeout() -> Duration {
    Duration::from_secs(1)
}

fn default_hotplug_poll_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_stream_read_timeout() -> Duration {
    Duration::from_millis(100)
}

/// Timeouts, device identification, and queue sizing for one `Device` session.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// How long [`crate::dispatcher::Dispatcher`] waits for a matching
    /// response.
    #[serde(with = "duration_secs")]
    pub command_timeout: Duration,

    /// Interval between hot-plug presence probes.
    #[serde(with = "duration_secs")]
    pub hotplug_poll_interval: Duration,

    /// Per-read timeout for histogram/IMU stream endpoints.
    #[serde(with = "duration_millis")]
    pub stream_read_timeout: Duration,

    /// Bounded channel depth for the histogram stream reader.
    pub histogram_queue_capacity: usize,

    /// Bounded channel depth for the IMU JSON-lines stream reader.
    pub imu_queue_capacity: usize,

    /// Raw histogram frame size in bytes. No built-in constant; firmware
    /// revisions have shipped more than one frame layout.
    pub histogram_frame_size: usize,

    /// Serial baud rate used by the framed request/response transport.
    pub serial_baud: u32,

    /// Bus port number identifying the left sensor board.
    pub left_port_number: u8,

    /// Bus port number identifying the right sensor board.
    pub right_port_number: u8,

    /// (vendor id, product id) of the console board in normal operation.
    pub console_vid_pid: (u16, u16),

    /// (vendor id, product id) of a sensor board in normal operation.
    pub sensor_vid_pid: (u16, u16),

    /// (vendor id, product id) a board re-enumerates as once in DFU mode,
    /// if different from its normal-operation identity.
    pub dfu_vid_pid: Option<(u16, u16)>,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            command_timeout: default_command_timeout(),
            hotplug_poll_interval: default_hotplug_poll_interval(),
            stream_read_timeout: default_stream_read_timeout(),
            histogram_queue_capacity: 64,
            imu_queue_capacity: 256,
            histogram_frame_size: 0,
            serial_baud: 921_600,
            left_port_number: 2,
            right_port_number: 3,
            console_vid_pid: (0x0000, 0x0000),
            sensor_vid_pid: (0x0000, 0x0000),
            dfu_vid_pid: None,
        }
    }
}

/// Release-fetcher tunables, separate from [`HostConfig`] since a
/// host application may use one without the other.
#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseFetcherConfig {
    pub owner: String,
    pub repo: String,
    #[serde(with = "duration_secs")]
    pub timeout: Duration,
}

impl ReleaseFetcherConfig {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self { owner: owner.into(), repo: repo.into(), timeout: Duration::from_secs(10) }
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(deserializer)?))
    }
}

mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}
