//! # Configuration
//!
//! Client configuration for the messaging core and its front ends: where the
//! backend lives, how often each poll runs, and how logs are emitted.

pub mod client;

pub use client::{
    ApiConfig, ClientConfig, ConfigFormat, EndpointConfig, LogFormat, LoggingConfig, PollingConfig,
};

use std::path::PathBuf;
use thiserror::Error;

/// Failures while resolving a [`ClientConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read configuration file {path}: {source}")]
    Io {
        /// File that was being read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file could not be parsed or serialized.
    #[error("failed to parse configuration: {0}")]
    Parse(String),

    /// The file extension does not name a supported format.
    #[error("unsupported configuration format '{0}'; use yaml, json or toml")]
    UnsupportedFormat(String),

    /// An environment override or override argument carried a bad value.
    #[error("invalid value for {key}: {value}")]
    InvalidOverride {
        /// Environment variable or option name.
        key: String,
        /// The rejected value.
        value: String,
    },

    /// The resolved configuration failed validation.
    #[error("invalid configuration: {}", .0.join("; "))]
    Invalid(Vec<String>),
}
