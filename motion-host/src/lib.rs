//! Host-side control and telemetry library for the MOTION imaging
//! instrument: a console board and up to two sensor boards, each with up to
//! eight reconfigurable-FPGA camera modules, driven over USB/serial via a
//! framed CRC-16 request/response protocol.

pub mod commands;
pub mod config;
pub mod crc;
pub mod dfu;
pub mod dispatcher;
pub mod error;
pub mod fpga;
pub mod frame;
pub mod histogram;
pub mod motion_config;
pub mod proxy;
pub mod release;
pub mod signal;
pub mod stream;
pub mod transport;

pub use config::HostConfig;
pub use dispatcher::Dispatcher;
pub use error::{Error, Result};
pub use frame::{Frame, PacketType};
pub use proxy::console::ConsoleProxy;
pub use proxy::sensor::SensorProxy;
pub use transport::Side;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use transport::hotplug::HotplugHandle;
use transport::serial::SerialTransport;
use transport::usb::UsbTransport;

/// A fully wired instrument session: one console proxy, zero or more sensor
/// proxies keyed by side, and the hot-plug watchers backing each.
pub struct Device {
    pub console: ConsoleProxy,
    pub sensors: HashMap<Side, SensorProxy>,
    hotplug: Vec<HotplugHandle>,
}

impl Device {
    /// Builds a session from already-connected USB transports. Connection,
    /// device enumeration, and interface claiming are the caller's
    /// responsibility; this just wires dispatchers and proxies on top.
    pub fn new_usb(
        config: &HostConfig,
        console_transport: Arc<UsbTransport>,
        sensor_transports: HashMap<Side, Arc<UsbTransport>>,
    ) -> Self {
        let console_dispatcher = Arc::new(Dispatcher::new(console_transport, config.command_timeout));
        let console = ConsoleProxy::new(console_dispatcher);

        let sensors = sensor_transports
            .into_iter()
            .map(|(side, transport)| {
                let dispatcher = Arc::new(Dispatcher::new(transport, config.command_timeout));
                (side, SensorProxy::new(dispatcher))
            })
            .collect();

        Self { console, sensors, hotplug: Vec::new() }
    }

    pub fn new_serial(
        config: &HostConfig,
        console_transport: Arc<SerialTransport>,
        sensor_transports: HashMap<Side, Arc<SerialTransport>>,
    ) -> Self {
        let console_dispatcher = Arc::new(Dispatcher::new(console_transport, config.command_timeout));
        let console = ConsoleProxy::new(console_dispatcher);

        let sensors = sensor_transports
            .into_iter()
            .map(|(side, transport)| {
                let dispatcher = Arc::new(Dispatcher::new(transport, config.command_timeout));
                (side, SensorProxy::new(dispatcher))
            })
            .collect();

        Self { console, sensors, hotplug: Vec::new() }
    }

    /// Builds a session with no hardware backing: every proxy answers via
    /// `responder`, useful for demos and integration tests.
    pub fn new_demo<F>(responder: F, sides: &[Side]) -> Self
    where
        F: Fn(&Frame) -> Frame + Send + Sync + Clone + 'static,
    {
        let console = ConsoleProxy::new(Arc::new(Dispatcher::new_demo(responder.clone(), Duration::from_secs(1))));
        let sensors = sides
            .iter()
            .map(|&side| {
                let dispatcher = Arc::new(Dispatcher::new_demo(responder.clone(), Duration::from_secs(1)));
                (side, SensorProxy::new(dispatcher))
            })
            .collect();
        Self { console, sensors, hotplug: Vec::new() }
    }

    /// Registers a hot-plug watcher so it stays alive for the session's
    /// lifetime; dropping the `Device` stops every watcher it owns.
    pub fn track_hotplug(&mut self, handle: HotplugHandle) {
        self.hotplug.push(handle);
    }

    pub fn for_each_sensor<R>(&self, op: impl FnMut(&SensorProxy) -> Result<R>) -> HashMap<Side, Result<R>> {
        proxy::combinators::for_each_sensor(&self.sensors, op)
    }
}
