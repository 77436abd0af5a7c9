//! Configuration error types.

use thiserror::Error;

use crate::types::Capacity;

/// Result type alias for configuration handling.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors raised while loading or validating the session config.
///
/// All of these surface before any cluster mutation happens.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: String,
        source: std::io::Error,
    },

    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("serialization error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("dns_zone is missing or empty")]
    MissingDnsZone,

    #[error("capacity override for `{environment}` violates min <= desired <= max: {capacity}")]
    InvalidCapacity {
        environment: String,
        capacity: Capacity,
    },

    #[error("suspended size {suspended} for `{environment}` exceeds max size {max}")]
    InvalidSuspendedSize {
        environment: String,
        suspended: u32,
        max: u32,
    },
}
