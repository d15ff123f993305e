//! Backend module for sample ingestion
//!
//! This module reads accelerometer lines in a separate thread so that the
//! recording and analysis side never blocks on I/O. It uses crossbeam
//! channels for thread-safe communication with the consumer.
//!
//! # Architecture
//!
//! - [`LineSource`] - Where lines come from (serial device, file, stdin, mock)
//! - [`LineDecoder`] - Turns `sensor_id timestamp_us ax ay az` lines into samples
//! - [`IngestWorker`] - The loop that reads, decodes and forwards
//! - [`IngestBackend`] - Entry point that owns the worker's channel ends
//! - [`IngestHandle`] - Consumer-side handle for receiving messages and stopping
//!
//! # Example
//!
//! ```ignore
//! use modal_rs::backend::{IngestBackend, MockSource};
//!
//! let (backend, handle) = IngestBackend::new(Box::new(MockSource::new(1000.0)));
//! let thread = backend.spawn();
//!
//! for msg in handle.iter() {
//!     // feed the recording controller
//! }
//! ```

pub mod decoder;
pub mod mock_source;
pub mod source;
pub mod worker;

pub use decoder::{parse_line, DecoderStats, LineDecoder};
pub use mock_source::{MockPattern, MockSource};
pub use source::{LineSource, ReaderSource};
pub use worker::{IngestMessage, IngestWorker};

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Default channel capacity (about 10 s of one sensor at 1 kHz)
pub const DEFAULT_CHANNEL_CAPACITY: usize = 10_000;

/// Consumer-side handle of an ingestion backend
pub struct IngestHandle {
    /// Receiver for worker messages
    pub receiver: Receiver<IngestMessage>,
    running: Arc<AtomicBool>,
}

impl IngestHandle {
    /// Try to receive a message without blocking
    pub fn try_recv(&self) -> Option<IngestMessage> {
        self.receiver.try_recv().ok()
    }

    /// Wait up to `timeout` for a message
    ///
    /// `Err(())` means the worker is gone and the channel is empty.
    #[allow(clippy::result_unit_err)]
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Option<IngestMessage>, ()> {
        match self.receiver.recv_timeout(timeout) {
            Ok(msg) => Ok(Some(msg)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(()),
        }
    }

    /// Receive all pending messages
    pub fn drain(&self) -> Vec<IngestMessage> {
        self.receiver.try_iter().collect()
    }

    /// Blocking iterator until the worker exits
    pub fn iter(&self) -> crossbeam_channel::Iter<'_, IngestMessage> {
        self.receiver.iter()
    }

    /// Ask the worker to stop
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Check if the worker is still running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// Ingestion backend that runs in a separate thread
pub struct IngestBackend {
    source: Box<dyn LineSource>,
    message_sender: Sender<IngestMessage>,
    running: Arc<AtomicBool>,
}

impl IngestBackend {
    /// Create a backend with the default channel capacity
    pub fn new(source: Box<dyn LineSource>) -> (Self, IngestHandle) {
        Self::with_capacity(source, DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a backend with a bounded channel of `capacity` messages
    pub fn with_capacity(source: Box<dyn LineSource>, capacity: usize) -> (Self, IngestHandle) {
        // Bounded for backpressure: a slow consumer slows the reader down
        let (msg_tx, msg_rx) = bounded(capacity.max(1));
        let running = Arc::new(AtomicBool::new(true));

        let backend = Self {
            source,
            message_sender: msg_tx,
            running: running.clone(),
        };
        let handle = IngestHandle {
            receiver: msg_rx,
            running,
        };

        (backend, handle)
    }

    /// Run the worker loop on the current thread
    pub fn run(self) {
        let mut worker = IngestWorker::new(self.source, self.message_sender, self.running);
        worker.run();
    }

    /// Run the worker loop on a new named thread
    pub fn spawn(self) -> std::io::Result<JoinHandle<()>> {
        std::thread::Builder::new()
            .name("ingest".to_string())
            .spawn(move || self.run())
    }

    /// Get a handle to stop the backend
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        self.running.clone()
    }
}
