//! # Ostracon Config
//!
//! Configuration for the Ostracon replication engine core: the mempool and
//! state-sync sections of the node's TOML config file.
//!
//! ## Example
//!
//! ```rust
//! use ostracon_config::MempoolConfig;
//!
//! let config = MempoolConfig::default();
//! assert!(config.validate().is_ok());
//! assert_eq!(config.size, 5000);
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod config;
pub mod error;

pub use config::{MempoolConfig, StateSyncConfig};
pub use error::{ConfigError, ConfigResult};
