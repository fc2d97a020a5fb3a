//! Configuration validation logic

use super::Configuration;
use crate::errors::{Result, TraceError};

const MAX_POLL_TIMEOUT_MS: u64 = 1000;

impl Configuration {
    pub fn validate(&self) -> Result<()> {
        self.validate_collector()?;
        self.validate_sender()?;
        if self.output.metrics_interval_secs == 0 {
            return Err(TraceError::ConfigError {
                message: "metrics_interval_secs must be greater than 0".to_string(),
            });
        }
        Ok(())
    }

    /// The poll timeout bounds how long `stop()` can go unnoticed.
    pub fn validate_collector(&self) -> Result<()> {
        if self.collector.queue_capacity == 0 {
            return Err(TraceError::ConfigError {
                message: "queue_capacity must be greater than 0".to_string(),
            });
        }
        if !(1..=MAX_POLL_TIMEOUT_MS).contains(&self.collector.poll_timeout_ms) {
            return Err(TraceError::ConfigError {
                message: format!(
                    "poll_timeout_ms must be between 1 and {}, got {}",
                    MAX_POLL_TIMEOUT_MS, self.collector.poll_timeout_ms
                ),
            });
        }
        if let Some(pages) = self.collector.perf_buffer_pages {
            if !pages.is_power_of_two() {
                return Err(TraceError::ConfigError {
                    message: format!("perf_buffer_pages must be a power of two, got {}", pages),
                });
            }
        }
        Ok(())
    }

    pub fn validate_sender(&self) -> Result<()> {
        if self.sender.request_timeout_ms == 0 {
            return Err(TraceError::ConfigError {
                message: "request_timeout_ms must be greater than 0".to_string(),
            });
        }
        let url = &self.sender.base_url;
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(TraceError::ConfigError {
                message: format!("base_url must start with http:// or https://, got {}", url),
            });
        }
        Ok(())
    }
}
