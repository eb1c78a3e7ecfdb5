//! Transfer progress reporting.
//!
//! Workers add written byte counts to a shared [`ProgressCounter`]; a
//! [`ProgressReporter`] thread polls it and invokes a callback.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Progress callback.
///
/// # Arguments
///
/// * `bytes_done` - Bytes on disk across all chunks, resumed ones included
/// * `total_bytes` - Size of the file
/// * `chunks_done` - Chunks complete
/// * `total_chunks` - Chunks planned
pub type ProgressCallback = Box<dyn Fn(u64, u64, usize, usize) + Send + Sync>;

/// Default reporter poll interval.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Shared counters updated by chunk workers.
#[derive(Debug, Default)]
pub struct ProgressCounter {
    bytes: AtomicU64,
    chunks: AtomicUsize,
    done: AtomicBool,
}

impl ProgressCounter {
    /// Create a zeroed counter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add freshly written bytes.
    pub fn add_bytes(&self, bytes: u64) {
        self.bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Undo bytes written by an attempt that is being discarded.
    pub fn sub_bytes(&self, bytes: u64) {
        self.bytes.fetch_sub(bytes, Ordering::Relaxed);
    }

    /// Count one more finished chunk.
    pub fn chunk_complete(&self) {
        self.chunks.fetch_add(1, Ordering::Relaxed);
    }

    /// Bytes written so far.
    pub fn bytes(&self) -> u64 {
        self.bytes.load(Ordering::Relaxed)
    }

    /// Chunks finished so far.
    pub fn chunks(&self) -> usize {
        self.chunks.load(Ordering::Relaxed)
    }

    /// Tell the reporter to emit a final report and exit.
    pub fn signal_done(&self) {
        self.done.store(true, Ordering::SeqCst);
    }

    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::SeqCst)
    }
}

/// Background thread that reports progress until the counter is done.
pub struct ProgressReporter {
    handle: Option<JoinHandle<()>>,
    counter: Arc<ProgressCounter>,
}

impl ProgressReporter {
    /// Spawn the reporter thread.
    ///
    /// # Arguments
    ///
    /// * `counter` - Shared counter updated by the fetch tasks
    /// * `total_bytes` - Size of the whole file
    /// * `total_chunks` - Number of planned chunks
    /// * `callback` - Receives `(bytes, total_bytes, chunks, total_chunks)`
    /// * `poll_interval` - Time between reports
    pub fn start(
        counter: Arc<ProgressCounter>,
        total_bytes: u64,
        total_chunks: usize,
        callback: Arc<ProgressCallback>,
        poll_interval: Duration,
    ) -> Self {
        let polled = Arc::clone(&counter);

        let handle = thread::spawn(move || {
            while !polled.is_done() {
                callback(polled.bytes(), total_bytes, polled.chunks(), total_chunks);
                thread::sleep(poll_interval);
            }

            // Final report
            callback(polled.bytes(), total_bytes, polled.chunks(), total_chunks);
        });

        Self {
            handle: Some(handle),
            counter,
        }
    }

    /// Stop polling and wait for the final report.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.counter.signal_done();
        if let Some(handle) = self.handle.take() {
            handle.join().ok();
        }
    }
}

impl Drop for ProgressReporter {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn test_counter_accumulates() {
        let counter = ProgressCounter::new();
        counter.add_bytes(500);
        counter.add_bytes(300);
        counter.sub_bytes(100);
        counter.chunk_complete();

        assert_eq!(counter.bytes(), 700);
        assert_eq!(counter.chunks(), 1);
        assert!(!counter.is_done());
    }

    #[test]
    fn test_reporter_final_report_sees_last_value() {
        let counter = Arc::new(ProgressCounter::new());
        let last = Arc::new(Mutex::new(None));
        let seen = Arc::clone(&last);

        let callback: ProgressCallback = Box::new(move |bytes, total, chunks, parts| {
            *seen.lock() = Some((bytes, total, chunks, parts));
        });

        let reporter = ProgressReporter::start(
            Arc::clone(&counter),
            1000,
            2,
            Arc::new(callback),
            Duration::from_millis(5),
        );

        counter.add_bytes(1000);
        counter.chunk_complete();
        counter.chunk_complete();
        reporter.stop();

        assert_eq!(*last.lock(), Some((1000, 1000, 2, 2)));
        assert!(counter.is_done());
    }
}
