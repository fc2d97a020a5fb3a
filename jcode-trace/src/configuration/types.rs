//! Configuration type definitions
//!
//! Every section deserializes with `#[serde(default)]`, so a config file only
//! needs the keys it overrides.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_BPF_OBJECT: &str = "/usr/lib/jcode-trace/jcode-trace.bpf.o";
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    pub bpf_object: PathBuf,
    pub queue_capacity: usize,
    pub poll_timeout_ms: u64,
    pub join_timeout_ms: u64,
    /// Pages per CPU buffer; `None` keeps the aya default.
    pub perf_buffer_pages: Option<usize>,
}

impl CollectorConfig {
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    pub fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms)
    }
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            bpf_object: PathBuf::from(DEFAULT_BPF_OBJECT),
            queue_capacity: 4096,
            poll_timeout_ms: 100,
            join_timeout_ms: 2000,
            perf_buffer_pages: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SenderConfig {
    pub base_url: String,
    pub request_timeout_ms: u64,
}

impl SenderConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout_ms: 5000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub verbose: bool,
    pub metrics_interval_secs: u64,
}

impl OutputConfig {
    pub fn metrics_interval(&self) -> Duration {
        Duration::from_secs(self.metrics_interval_secs)
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            metrics_interval_secs: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub duration_secs: Option<u64>,
    pub drain_timeout_ms: u64,
    #[serde(skip)]
    pub config_file: Option<PathBuf>,
}

impl RuntimeConfig {
    pub fn duration(&self) -> Option<Duration> {
        self.duration_secs.map(Duration::from_secs)
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            duration_secs: None,
            drain_timeout_ms: 5000,
            config_file: None,
        }
    }
}

/// On-disk shape of a configuration file.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub collector: CollectorConfig,
    pub sender: SenderConfig,
    pub output: OutputConfig,
    pub runtime: RuntimeConfig,
}
