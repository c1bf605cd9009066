//! `for_each_sensor`: runs an operation against every sensor proxy in a
//! session, keyed by side, via a plain closure over an explicit map.

use std::collections::HashMap;

use crate::error::Result;
use crate::transport::Side;

use super::sensor::SensorProxy;

/// Runs `op` against every sensor in `sensors`, collecting each side's
/// result independently — one sensor failing does not stop the others.
pub fn for_each_sensor<R>(
    sensors: &HashMap<Side, SensorProxy>,
    mut op: impl FnMut(&SensorProxy) -> Result<R>,
) -> HashMap<Side, Result<R>> {
    sensors.iter().map(|(&side, proxy)| (side, op(proxy))).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::Dispatcher;
    use crate::frame::{Frame, PacketType};
    use std::sync::Arc;
    use std::time::Duration;

    fn demo_sensor() -> SensorProxy {
        let dispatcher = Dispatcher::new_demo(
            |req| Frame::new(req.id, PacketType::Resp, req.command, req.address, 0, Vec::new()),
            Duration::from_millis(50),
        );
        SensorProxy::new(Arc::new(dispatcher))
    }

    #[test]
    fn runs_the_closure_against_every_sensor_independently() {
        let mut sensors = HashMap::new();
        sensors.insert(Side::Left, demo_sensor());
        sensors.insert(Side::Right, demo_sensor());

        let results = for_each_sensor(&sensors, |s| s.camera_reset(0x01));
        assert_eq!(results.len(), 2);
        assert!(results.values().all(|r| r.is_ok()));
    }
}
