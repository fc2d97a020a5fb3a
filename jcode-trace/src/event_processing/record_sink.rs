//! Poll-thread side of the collector/consumer handoff.
//!
//! Everything here runs on the poll thread and must never block: records are
//! decoded and offered to the bounded queue with `try_send`. A full queue
//! drops the record and bumps the drop counter.

use crate::event_processing::ProcessRecordParser;
use crate::metrics::Metrics;
use crate::process::Process;
use log::{debug, warn};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};

/// Creates the bounded queue between the poll thread and the event loop.
pub fn process_queue(capacity: usize, metrics: Arc<Metrics>) -> (RecordSink, mpsc::Receiver<Process>) {
    let (tx, rx) = mpsc::channel(capacity);
    (RecordSink { tx, metrics }, rx)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Queued,
    Dropped,
    Closed,
}

pub struct RecordSink {
    tx: mpsc::Sender<Process>,
    metrics: Arc<Metrics>,
}

impl RecordSink {
    /// Decodes one raw sample and queues it. Decode failures are logged and
    /// counted; they never propagate into the poll loop.
    pub fn handle_record(&self, buffer: &[u8]) -> Option<EnqueueOutcome> {
        match ProcessRecordParser::decode(buffer) {
            Ok(process) => {
                self.metrics.events_collected.inc();
                Some(self.enqueue(process))
            }
            Err(e) => {
                self.metrics.decode_errors.inc();
                warn!("failed to decode process record ({} bytes): {}", buffer.len(), e);
                None
            }
        }
    }

    pub fn enqueue(&self, process: Process) -> EnqueueOutcome {
        match self.tx.try_send(process) {
            Ok(()) => EnqueueOutcome::Queued,
            Err(TrySendError::Full(process)) => {
                self.metrics.events_dropped.inc();
                debug!("queue full, dropping record for pid {}", process.pid);
                EnqueueOutcome::Dropped
            }
            Err(TrySendError::Closed(process)) => {
                self.metrics.events_dropped.inc();
                debug!("queue closed, dropping record for pid {}", process.pid);
                EnqueueOutcome::Closed
            }
        }
    }

    /// Records samples the kernel overwrote before they were read.
    pub fn record_lost(&self, lost: usize) {
        if lost > 0 {
            self.metrics.events_lost.add(lost as u64);
            warn!("{} process records lost in the perf buffer", lost);
        }
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }
}
