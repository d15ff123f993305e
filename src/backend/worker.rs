//! Ingestion worker thread
//!
//! This module contains the loop that runs in a separate thread: it reads
//! lines from a [`LineSource`], decodes them and forwards samples over a
//! bounded channel. Decoding errors are reported and skipped; the loop only
//! ends on end of stream, a read error, a disconnected receiver or when the
//! shared running flag is cleared.

use crossbeam_channel::{SendTimeoutError, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::types::Sample;

use super::decoder::{DecoderStats, LineDecoder};
use super::source::LineSource;

/// How long a blocked send waits before re-checking the running flag
const SEND_RETRY: Duration = Duration::from_millis(50);

/// Message sent from the ingestion worker to the consumer
#[derive(Debug, Clone)]
pub enum IngestMessage {
    /// A decoded sample
    Sample(Sample),
    /// A line that could not be decoded
    Malformed { line: String, reason: String },
    /// Reading from the source failed
    SourceError(String),
    /// The source is exhausted or the worker was stopped
    EndOfStream(DecoderStats),
}

/// The worker that drives one line source
pub struct IngestWorker {
    /// Where lines come from
    source: Box<dyn LineSource>,
    /// Line parser with counters
    decoder: LineDecoder,
    /// Message sender to the consumer
    message_tx: Sender<IngestMessage>,
    /// Running flag
    running: Arc<AtomicBool>,
}

impl IngestWorker {
    /// Create a new ingestion worker
    pub fn new(
        source: Box<dyn LineSource>,
        message_tx: Sender<IngestMessage>,
        running: Arc<AtomicBool>,
    ) -> Self {
        Self {
            source,
            decoder: LineDecoder::new(),
            message_tx,
            running,
        }
    }

    /// Run the main worker loop
    pub fn run(&mut self) {
        tracing::info!("Ingestion worker started on {}", self.source.name());

        while self.running.load(Ordering::SeqCst) {
            let line = match self.source.next_line() {
                Ok(Some(line)) => line,
                Ok(None) => {
                    tracing::info!("End of stream on {}", self.source.name());
                    break;
                }
                Err(e) => {
                    tracing::error!("Read error on {}: {}", self.source.name(), e);
                    self.send(IngestMessage::SourceError(e.to_string()));
                    break;
                }
            };

            let message = match self.decoder.decode(&line) {
                Ok(Some(sample)) => IngestMessage::Sample(sample),
                Ok(None) => continue,
                Err(crate::error::ModalError::MalformedInputRow { line, reason }) => {
                    tracing::warn!("Dropping malformed line {:?}: {}", line, reason);
                    IngestMessage::Malformed { line, reason }
                }
                Err(e) => {
                    tracing::warn!("Dropping line: {}", e);
                    IngestMessage::Malformed {
                        line,
                        reason: e.to_string(),
                    }
                }
            };

            if !self.send(message) {
                break;
            }
        }

        let stats = self.decoder.stats();
        tracing::info!(
            "Ingestion worker stopped: {} decoded, {} rejected",
            stats.decoded,
            stats.rejected
        );
        // Not delivered if the consumer is gone or the worker was stopped while blocked
        self.send(IngestMessage::EndOfStream(stats));
        self.running.store(false, Ordering::SeqCst);
    }

    /// Send with backpressure, giving up when stopped or disconnected
    fn send(&self, mut message: IngestMessage) -> bool {
        loop {
            match self.message_tx.send_timeout(message, SEND_RETRY) {
                Ok(()) => return true,
                Err(SendTimeoutError::Disconnected(_)) => {
                    tracing::debug!("Consumer disconnected, stopping ingestion");
                    return false;
                }
                Err(SendTimeoutError::Timeout(m)) => {
                    if !self.running.load(Ordering::SeqCst) {
                        return false;
                    }
                    message = m;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::source::ReaderSource;
    use crossbeam_channel::bounded;
    use std::io::Cursor;

    fn create_test_worker(
        input: &'static str,
        capacity: usize,
    ) -> (
        IngestWorker,
        crossbeam_channel::Receiver<IngestMessage>,
        Arc<AtomicBool>,
    ) {
        let (tx, rx) = bounded(capacity);
        let running = Arc::new(AtomicBool::new(true));
        let source = Box::new(ReaderSource::new(Cursor::new(input), "test"));
        (IngestWorker::new(source, tx, running.clone()), rx, running)
    }

    #[test]
    fn test_worker_decodes_and_skips() {
        let (mut worker, rx, running) =
            create_test_worker("1 0 0 0 1\nbad line\n\n1 1000 0 0 1\n", 16);
        worker.run();

        let messages: Vec<_> = rx.try_iter().collect();
        assert_eq!(messages.len(), 4);
        assert!(matches!(messages[0], IngestMessage::Sample(_)));
        assert!(matches!(messages[1], IngestMessage::Malformed { .. }));
        assert!(matches!(messages[2], IngestMessage::Sample(_)));
        match &messages[3] {
            IngestMessage::EndOfStream(stats) => {
                assert_eq!(stats.decoded, 2);
                assert_eq!(stats.rejected, 1);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(!running.load(Ordering::SeqCst));
    }

    #[test]
    fn test_worker_survives_invalid_utf8() {
        let mut bytes = b"1 0 0 0 1\n".to_vec();
        bytes.extend_from_slice(&[0xFF, 0xFE, b'\n']);
        bytes.extend_from_slice(b"1 1000 0 0 1\n1 2000 0 0 1\n");

        let (tx, rx) = bounded(16);
        let running = Arc::new(AtomicBool::new(true));
        let source = Box::new(ReaderSource::new(Cursor::new(bytes), "serial"));
        IngestWorker::new(source, tx, running).run();

        let messages: Vec<_> = rx.try_iter().collect();
        assert_eq!(messages.len(), 5);
        assert!(matches!(messages[1], IngestMessage::Malformed { .. }));
        let samples = messages
            .iter()
            .filter(|m| matches!(m, IngestMessage::Sample(_)))
            .count();
        assert_eq!(samples, 3);
        match &messages[4] {
            IngestMessage::EndOfStream(stats) => {
                assert_eq!(stats.decoded, 3);
                assert_eq!(stats.rejected, 1);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_worker_stops_when_flag_cleared() {
        let (mut worker, rx, running) = create_test_worker("1 0 0 0 1\n1 1 0 0 1\n", 1);
        let handle = std::thread::spawn(move || worker.run());

        // First sample fills the channel; the worker blocks on the second
        std::thread::sleep(Duration::from_millis(100));
        running.store(false, Ordering::SeqCst);
        handle.join().unwrap();

        assert!(matches!(rx.try_recv(), Ok(IngestMessage::Sample(_))));
    }

    #[test]
    fn test_worker_stops_when_receiver_dropped() {
        let (mut worker, rx, _running) = create_test_worker("1 0 0 0 1\n1 1 0 0 1\n", 1);
        drop(rx);
        worker.run();
    }
}
