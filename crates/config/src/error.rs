//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading and validation
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to parse TOML configuration
    #[error("Failed to parse TOML config: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// A size/count option must be positive
    #[error("Invalid {field}: must be positive, got {value}")]
    NonPositive {
        /// Option name.
        field: &'static str,
        /// Offending value.
        value: i64,
    },

    /// State sync needs at least two distinct RPC servers
    #[error("at least 2 RPC servers are required, got {0}")]
    InsufficientRpcServers(usize),

    /// Trust hash is not valid hex of the right length
    #[error("invalid trust_hash: {0}")]
    InvalidTrustHash(String),

    /// Trust period must be positive
    #[error("invalid TrustOptions: negative or zero period")]
    InvalidTrustPeriod,

    /// A timeout option must be positive
    #[error("Invalid {0}: timeout must be positive")]
    InvalidTimeout(&'static str),
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;
