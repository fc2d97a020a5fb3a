//! Event Processing Module
//!
//! Two halves joined by a bounded queue:
//! - poll thread: `Collector` → `PerfBufferManager` buffers → `ProcessRecordParser` → `RecordSink`
//! - event loop: `EventConsumer` → `Pipeline` → `LogSender`

pub mod buffer_manager;
pub mod collector;
pub mod consumer;
pub mod parser;
pub mod pipeline;
pub mod record_sink;

pub use buffer_manager::PerfBufferManager;
pub use collector::Collector;
pub use consumer::EventConsumer;
pub use parser::ProcessRecordParser;
pub use pipeline::{Label, Pipeline};
pub use record_sink::{process_queue, EnqueueOutcome, RecordSink};
