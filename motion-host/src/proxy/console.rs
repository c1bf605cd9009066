//! Console board proxy. The console exposes every common [`DeviceProxy`]
//! operation and nothing camera-specific.

use std::ops::Deref;
use std::sync::Arc;

use crate::dispatcher::Dispatcher;

use super::DeviceProxy;

pub struct ConsoleProxy {
    base: DeviceProxy,
}

impl ConsoleProxy {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            base: DeviceProxy::new(dispatcher),
        }
    }
}

impl Deref for ConsoleProxy {
    type Target = DeviceProxy;

    fn deref(&self) -> &DeviceProxy {
        &self.base
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{Frame, PacketType};
    use std::time::Duration;

    fn demo_console() -> ConsoleProxy {
        let dispatcher = Dispatcher::new_demo(
            |req| Frame::new(req.id, PacketType::Resp, req.command, req.address, 0, vec![1, 2, 3]),
            Duration::from_millis(50),
        );
        ConsoleProxy::new(Arc::new(dispatcher))
    }

    #[test]
    fn get_version_reads_three_bytes() {
        let console = demo_console();
        assert_eq!(console.get_version().unwrap(), (1, 2, 3));
    }

    #[test]
    fn ping_succeeds_against_a_responsive_demo_backend() {
        let console = demo_console();
        console.ping().unwrap();
    }
}
