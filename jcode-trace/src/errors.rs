//! Unified error types for jcode-trace
//!
//! Startup failures are fatal and carry the program or map they concern.
//! Path validation failures are kept in their own enum because they flag a
//! data-contract violation at the kernel/userspace boundary rather than a
//! problem with the agent itself.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TraceError {
    #[error("eBPF program failed to attach: {program_name} - {source}")]
    EbpfAttachmentFailed {
        program_name: String,
        source: anyhow::Error,
    },

    #[error("eBPF program failed to load: {program_name} - {source}")]
    EbpfLoadFailed {
        program_name: String,
        source: anyhow::Error,
    },

    #[error("eBPF program not found: {program_name}")]
    ProgramNotFound { program_name: String },

    #[error("eBPF map not found: {map_name}")]
    MapNotFound { map_name: String },

    #[error("Tail call table mismatch at index {index} ({program_name}): {reason}")]
    TailCallMismatch {
        index: u32,
        program_name: String,
        reason: String,
    },

    #[error("Probe already attached: {probe_type}")]
    ProbeAlreadyAttached { probe_type: ProbeType },

    #[error("Probe not found: {probe_type}")]
    ProbeNotFound { probe_type: ProbeType },

    #[error("Collector failed to start: {message}")]
    CollectorStartFailed { message: String },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Record decode error: {message}")]
    DecodeError { message: String },

    #[error("Invalid student info: {message}")]
    InvalidStudentInfo { message: String },

    #[error(transparent)]
    PathValidation(#[from] PathParseError),
}

/// Reasons a path is refused before any homework lookup happens.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathParseError {
    #[error("Path is empty")]
    EmptyPath,

    #[error("Path contains a control character: {path:?}")]
    ControlCharacter { path: String },

    #[error("Path is not absolute after normalization: {path}")]
    NotAbsolute { path: String },

    #[error("Path contains {count} homework directories: {path}")]
    NestedHomeworkDirectory { path: String, count: usize },
}

/// Tracepoints the collector attaches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProbeType {
    ProcessExec,
    ProcessExit,
}

impl ProbeType {
    pub fn all() -> Vec<ProbeType> {
        vec![Self::ProcessExec, Self::ProcessExit]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeType::ProcessExec => "process_exec",
            ProbeType::ProcessExit => "process_exit",
        }
    }
}

impl std::fmt::Display for ProbeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ProbeType {
    type Err = TraceError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "process_exec" => Ok(ProbeType::ProcessExec),
            "process_exit" => Ok(ProbeType::ProcessExit),
            _ => Err(TraceError::ConfigError {
                message: format!(
                    "Invalid probe type: {}. Valid types: {:?}",
                    s,
                    ProbeType::all()
                        .iter()
                        .map(|p| p.as_str())
                        .collect::<Vec<_>>()
                ),
            }),
        }
    }
}

pub type Result<T> = std::result::Result<T, TraceError>;
