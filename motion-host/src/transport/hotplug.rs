//! Periodic hot-plug probe. Generic over how "is the device present" is
//! decided so both the serial and USB transports can share one poller
//! instead of duplicating the polling loop.

use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

pub struct HotplugHandle {
    stop_tx: mpsc::Sender<()>,
    join: Option<JoinHandle<()>>,
}

impl HotplugHandle {
    pub fn stop(mut self) {
        let _ = self.stop_tx.send(());
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

impl Drop for HotplugHandle {
    fn drop(&mut self) {
        let _ = self.stop_tx.send(());
    }
}

/// Spawns a background thread that calls `probe` every `interval` and
/// invokes `on_change(present)` whenever presence flips.
pub fn spawn<P, C>(interval: Duration, mut probe: P, mut on_change: C) -> HotplugHandle
where
    P: FnMut() -> bool + Send + 'static,
    C: FnMut(bool) + Send + 'static,
{
    let (stop_tx, stop_rx) = mpsc::channel::<()>();
    let join = thread::spawn(move || {
        let mut present = probe();
        loop {
            if stop_rx.recv_timeout(interval).is_ok() {
                break;
            }
            let now = probe();
            if now != present {
                tracing::info!(present = now, "hotplug state changed");
                on_change(now);
                present = now;
            }
        }
    });
    HotplugHandle {
        stop_tx,
        join: Some(join),
    }
}
