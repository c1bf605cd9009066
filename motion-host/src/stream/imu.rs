//! IMU streaming mode: each read is split on newline, and each line parsed
//! as a JSON value; malformed lines are counted and discarded rather than
//! failing the stream.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;

use super::{StreamEndpoint, StreamHandle};
use crate::error::TransportError;

const READ_CHUNK: usize = 4096;

/// Starts the IMU stream worker. Returns a [`StreamHandle`] of parsed JSON
/// lines; `invalid_lines` tracks lines that failed to parse.
pub fn spawn_imu<E>(mut endpoint: E, capacity: usize) -> (StreamHandle<serde_json::Value>, Arc<AtomicU64>)
where
    E: StreamEndpoint + 'static,
{
    let (tx, rx) = mpsc::sync_channel(capacity);
    let dropped = Arc::new(AtomicU64::new(0));
    let invalid_lines = Arc::new(AtomicU64::new(0));
    let stop = Arc::new(AtomicBool::new(false));
    let dropped_worker = dropped.clone();
    let invalid_worker = invalid_lines.clone();
    let stop_worker = stop.clone();

    let join = thread::spawn(move || {
        let mut chunk = [0u8; READ_CHUNK];
        let mut leftover: Vec<u8> = Vec::new();

        while !stop_worker.load(Ordering::SeqCst) {
            match endpoint.read_block(&mut chunk) {
                Ok(0) => continue,
                Ok(n) => {
                    leftover.extend_from_slice(&chunk[..n]);
                    while let Some(newline_at) = leftover.iter().position(|&b| b == b'\n') {
                        let line: Vec<u8> = leftover.drain(..=newline_at).collect();
                        let line = &line[..line.len() - 1];
                        if line.is_empty() {
                            continue;
                        }
                        match serde_json::from_slice::<serde_json::Value>(line) {
                            Ok(value) => {
                                if tx.try_send(value).is_err() {
                                    dropped_worker.fetch_add(1, Ordering::Relaxed);
                                }
                            }
                            Err(err) => {
                                invalid_worker.fetch_add(1, Ordering::Relaxed);
                                tracing::debug!(%err, "discarding malformed IMU line");
                            }
                        }
                    }
                }
                Err(TransportError::ReadTimeout) => continue,
                Err(err) => {
                    tracing::warn!(%err, "IMU stream read failed");
                    continue;
                }
            }
        }
    });

    (
        StreamHandle {
            receiver: rx,
            dropped,
            stop,
            join: Some(join),
        },
        invalid_lines,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    struct LineEndpoint {
        chunks: std::vec::IntoIter<&'static [u8]>,
    }

    impl StreamEndpoint for LineEndpoint {
        fn read_block(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
            match self.chunks.next() {
                Some(chunk) => {
                    buf[..chunk.len()].copy_from_slice(chunk);
                    Ok(chunk.len())
                }
                None => {
                    std::thread::sleep(Duration::from_millis(5));
                    Err(TransportError::ReadTimeout)
                }
            }
        }
    }

    #[test]
    fn parses_newline_delimited_json_and_counts_invalid_lines() {
        let endpoint = LineEndpoint {
            chunks: vec![b"{\"a\":1}\nnot json\n{\"a\":2}\n".as_slice()].into_iter(),
        };
        let (handle, invalid) = spawn_imu(endpoint, 8);
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(handle.try_recv(), Some(serde_json::json!({"a": 1})));
        assert_eq!(handle.try_recv(), Some(serde_json::json!({"a": 2})));
        assert_eq!(invalid.load(Ordering::Relaxed), 1);
        handle.stop();
    }

    #[test]
    fn reassembles_a_line_split_across_two_reads() {
        let endpoint = LineEndpoint {
            chunks: vec![b"{\"a\":1".as_slice(), b"}\n".as_slice()].into_iter(),
        };
        let (handle, _invalid) = spawn_imu(endpoint, 8);
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(handle.try_recv(), Some(serde_json::json!({"a": 1})));
        handle.stop();
    }
}
