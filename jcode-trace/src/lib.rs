pub mod cli;
pub mod configuration;
pub mod ebpf_manager;
pub mod errors;
pub mod event_processing;
pub mod metrics;
pub mod parsers;
pub mod process;
pub mod process_classifier;
pub mod sender;

pub use cli::Args;
pub use configuration::Configuration;
pub use errors::{PathParseError, Result, TraceError};
pub use event_processing::{Collector, EventConsumer, Pipeline};
pub use metrics::Metrics;
pub use process::{Event, Process, StudentInfo};
pub use process_classifier::{ProcessClassifier, ProcessType};
pub use sender::{HttpTransport, LogSender, LogTransport};
