//! Stream reader: one worker thread per streaming endpoint (histogram or
//! IMU), reading fixed-size blocks into a bounded queue with a drop-newest
//! backpressure policy so a slow consumer never stalls the device.

pub mod imu;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::error::TransportError;

/// A single streaming bulk endpoint, distinct from the command transport —
/// the histogram and IMU interfaces are claimed independently, each owning
/// the interface claim for its own endpoint.
pub trait StreamEndpoint: Send {
    fn read_block(&mut self, buf: &mut [u8]) -> Result<usize, TransportError>;
}

pub struct StreamHandle<T> {
    receiver: Receiver<T>,
    dropped: Arc<AtomicU64>,
    stop: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl<T> StreamHandle<T> {
    pub fn try_recv(&self) -> Option<T> {
        self.receiver.try_recv().ok()
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Signals the worker, releases the interface (the worker's `Drop`),
    /// and joins — bounded in practice by the endpoint's own per-read
    /// timeout, which the worker polls on every iteration.
    pub fn stop(mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

/// Starts the histogram stream worker: raw fixed-size blocks (the stream
/// reader does not decode them — see [`crate::histogram::parse_histogram_stream`]).
pub fn spawn_histogram<E>(mut endpoint: E, frame_size: usize, capacity: usize) -> StreamHandle<Vec<u8>>
where
    E: StreamEndpoint + 'static,
{
    let (tx, rx) = mpsc::sync_channel(capacity);
    let dropped = Arc::new(AtomicU64::new(0));
    let stop = Arc::new(AtomicBool::new(false));
    let dropped_worker = dropped.clone();
    let stop_worker = stop.clone();

    let join = thread::spawn(move || {
        let mut buf = vec![0u8; frame_size];
        while !stop_worker.load(Ordering::SeqCst) {
            match endpoint.read_block(&mut buf) {
                Ok(0) => continue,
                Ok(n) => {
                    if tx.try_send(buf[..n].to_vec()).is_err() {
                        dropped_worker.fetch_add(1, Ordering::Relaxed);
                    }
                }
                Err(TransportError::ReadTimeout) => continue,
                Err(err) => {
                    tracing::warn!(%err, "histogram stream read failed");
                    continue;
                }
            }
        }
    });

    StreamHandle {
        receiver: rx,
        dropped,
        stop,
        join: Some(join),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    struct CannedEndpoint {
        blocks: std::vec::IntoIter<Vec<u8>>,
    }

    impl StreamEndpoint for CannedEndpoint {
        fn read_block(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
            match self.blocks.next() {
                Some(block) => {
                    let n = block.len().min(buf.len());
                    buf[..n].copy_from_slice(&block[..n]);
                    Ok(n)
                }
                None => {
                    std::thread::sleep(Duration::from_millis(5));
                    Err(TransportError::ReadTimeout)
                }
            }
        }
    }

    #[test]
    fn delivers_blocks_in_order() {
        let endpoint = CannedEndpoint {
            blocks: vec![vec![1, 2, 3], vec![4, 5, 6]].into_iter(),
        };
        let handle = spawn_histogram(endpoint, 8, 4);
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(handle.try_recv(), Some(vec![1, 2, 3]));
        assert_eq!(handle.try_recv(), Some(vec![4, 5, 6]));
        handle.stop();
    }

    #[test]
    fn drops_newest_and_counts_when_queue_is_full() {
        let endpoint = CannedEndpoint {
            blocks: vec![vec![1], vec![2], vec![3], vec![4]].into_iter(),
        };
        let handle = spawn_histogram(endpoint, 8, 1);
        std::thread::sleep(Duration::from_millis(30));
        assert!(handle.dropped_count() >= 1);
        handle.stop();
    }
}
