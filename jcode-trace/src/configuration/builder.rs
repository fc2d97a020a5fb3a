//! Configuration Builder
//!
//! Sources are applied in call order:
//! - defaults
//! - configuration file
//! - environment variables
//! - CLI arguments

use super::{CollectorConfig, Configuration, FileConfig, OutputConfig, RuntimeConfig, SenderConfig};
use crate::cli::Args;
use crate::errors::{Result, TraceError};
use clap::Parser;
use std::fs;
use std::path::{Path, PathBuf};

pub const ENV_API_URL: &str = "JCODE_TRACE_API_URL";
pub const ENV_BPF_OBJECT: &str = "JCODE_TRACE_BPF_OBJECT";
pub const ENV_QUEUE_CAPACITY: &str = "JCODE_TRACE_QUEUE_CAPACITY";

#[derive(Debug)]
pub struct ConfigurationBuilder {
    collector: CollectorConfig,
    sender: SenderConfig,
    output: OutputConfig,
    runtime: RuntimeConfig,
}

impl ConfigurationBuilder {
    pub fn new() -> Self {
        Self {
            collector: CollectorConfig::default(),
            sender: SenderConfig::default(),
            output: OutputConfig::default(),
            runtime: RuntimeConfig::default(),
        }
    }

    /// Configure from CLI-style arguments, without the program name.
    pub fn from_cli_args(self, args: &[&str]) -> Result<Self> {
        let parsed = Args::try_parse_from(std::iter::once("jcode-trace").chain(args.iter().copied()))
            .map_err(|e| TraceError::ConfigError {
                message: format!("Invalid arguments: {}", e),
            })?;
        Ok(self.from_args(&parsed))
    }

    /// Applies the overrides present in already-parsed arguments. The
    /// `--config` path is not read here; use [`Self::from_config_file`].
    pub fn from_args(mut self, args: &Args) -> Self {
        if let Some(url) = &args.api_url {
            self.sender.base_url = url.clone();
        }
        if let Some(path) = &args.bpf_object {
            self.collector.bpf_object = path.clone();
        }
        if let Some(capacity) = args.queue_capacity {
            self.collector.queue_capacity = capacity;
        }
        if let Some(duration) = args.duration {
            self.runtime.duration_secs = Some(duration);
        }
        if args.verbose {
            self.output.verbose = true;
        }
        self
    }

    /// Configure from YAML or JSON configuration file
    pub fn from_config_file<P: AsRef<Path>>(self, path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| TraceError::ConfigError {
            message: format!("Failed to read config file {}: {}", path.display(), e),
        })?;

        // Auto-detect format by extension or content
        let mut builder = if path.extension().and_then(|s| s.to_str()) == Some("json")
            || content.trim_start().starts_with('{')
        {
            self.from_json_str(&content)?
        } else {
            self.from_yaml_str(&content)?
        };

        builder.runtime.config_file = Some(path.to_path_buf());
        Ok(builder)
    }

    pub fn from_yaml_str(self, yaml: &str) -> Result<Self> {
        let file: FileConfig = serde_yaml::from_str(yaml).map_err(|e| TraceError::ConfigError {
            message: format!("Failed to parse YAML config: {}", e),
        })?;
        Ok(self.merge_file(file))
    }

    pub fn from_json_str(self, json: &str) -> Result<Self> {
        let file: FileConfig = serde_json::from_str(json).map_err(|e| TraceError::ConfigError {
            message: format!("Failed to parse JSON config: {}", e),
        })?;
        Ok(self.merge_file(file))
    }

    fn merge_file(mut self, file: FileConfig) -> Self {
        let config_file = self.runtime.config_file.take();
        self.collector = file.collector;
        self.sender = file.sender;
        self.output = file.output;
        self.runtime = file.runtime;
        self.runtime.config_file = config_file;
        self
    }

    /// Configure from `JCODE_TRACE_*` environment variables
    pub fn from_environment(self) -> Result<Self> {
        self.from_env_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_env_lookup<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_API_URL) {
            self.sender.base_url = url;
        }
        if let Some(path) = lookup(ENV_BPF_OBJECT) {
            self.collector.bpf_object = PathBuf::from(path);
        }
        if let Some(raw) = lookup(ENV_QUEUE_CAPACITY) {
            self.collector.queue_capacity =
                raw.trim().parse().map_err(|_| TraceError::ConfigError {
                    message: format!("Invalid {}: {}", ENV_QUEUE_CAPACITY, raw),
                })?;
        }
        Ok(self)
    }

    /// Build the final configuration
    pub fn build(mut self) -> Result<Configuration> {
        let trimmed_len = self.sender.base_url.trim_end_matches('/').len();
        self.sender.base_url.truncate(trimmed_len);

        let config = Configuration {
            collector: self.collector,
            sender: self.sender,
            output: self.output,
            runtime: self.runtime,
        };

        config.validate()?;
        Ok(config)
    }
}

impl Default for ConfigurationBuilder {
    fn default() -> Self {
        Self::new()
    }
}
