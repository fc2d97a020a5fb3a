//! Unified Configuration System
//!
//! Combines defaults, a YAML or JSON file, `JCODE_TRACE_*` environment
//! variables and CLI arguments into one validated [`Configuration`]. Later
//! sources override earlier ones in the order the builder methods are called.
//!
//! ```rust
//! use jcode_trace::configuration::Configuration;
//!
//! let config = Configuration::builder()
//!     .from_cli_args(&["--api-url", "http://logs.internal:8000/", "--verbose"])
//!     .unwrap()
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(config.sender.base_url, "http://logs.internal:8000");
//! assert!(config.is_verbose());
//! ```

pub mod builder;
pub mod types;
pub mod validation;

pub use builder::ConfigurationBuilder;
pub use types::*;

use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Configuration {
    pub collector: CollectorConfig,
    pub sender: SenderConfig,
    pub output: OutputConfig,
    pub runtime: RuntimeConfig,
}

impl Configuration {
    pub fn builder() -> ConfigurationBuilder {
        ConfigurationBuilder::new()
    }

    pub fn is_verbose(&self) -> bool {
        self.output.verbose
    }

    pub fn duration(&self) -> Option<Duration> {
        self.runtime.duration()
    }
}
