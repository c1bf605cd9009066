//! Minimal observer channel, independent of any particular GUI toolkit or
//! event loop. Host applications adapt `connect`/`emit`/`disconnect` to
//! whatever event system they run; the library only ever calls `emit`.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

pub type SubscriptionId = u64;

type Listener<T> = Box<dyn Fn(&T) + Send + Sync>;

pub struct Signal<T> {
    next_id: AtomicU64,
    listeners: Mutex<Vec<(SubscriptionId, Listener<T>)>>,
}

impl<T> Default for Signal<T> {
    fn default() -> Self {
        Self { next_id: AtomicU64::new(1), listeners: Mutex::new(Vec::new()) }
    }
}

impl<T> Signal<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `listener`, returning an id usable with [`disconnect`].
    pub fn connect(&self, listener: impl Fn(&T) + Send + Sync + 'static) -> SubscriptionId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners.lock().push((id, Box::new(listener)));
        id
    }

    /// Removes a listener previously registered with [`connect`]. A no-op if
    /// `id` is unknown (already disconnected, or never registered).
    pub fn disconnect(&self, id: SubscriptionId) {
        self.listeners.lock().retain(|(listener_id, _)| *listener_id != id);
    }

    /// Invokes every connected listener with `value`, in connection order.
    pub fn emit(&self, value: &T) {
        for (_, listener) in self.listeners.lock().iter() {
            listener(value);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn emits_to_every_connected_listener() {
        let signal = Signal::<u32>::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let seen_a = seen.clone();
        signal.connect(move |v| seen_a.lock().push(("a", *v)));
        let seen_b = seen.clone();
        signal.connect(move |v| seen_b.lock().push(("b", *v)));

        signal.emit(&42);

        let log = seen.lock();
        assert_eq!(log.as_slice(), &[("a", 42), ("b", 42)]);
    }

    #[test]
    fn disconnect_stops_further_delivery() {
        let signal = Signal::<u32>::new();
        let count = Arc::new(Mutex::new(0));
        let count_clone = count.clone();
        let id = signal.connect(move |_| *count_clone.lock() += 1);

        signal.emit(&1);
        signal.disconnect(id);
        signal.emit(&2);

        assert_eq!(*count.lock(), 1);
    }

    #[test]
    fn disconnecting_an_unknown_id_is_a_no_op() {
        let signal = Signal::<u32>::new();
        signal.connect(|_| {});
        signal.disconnect(999);
        assert_eq!(signal.listener_count(), 1);
    }
}
