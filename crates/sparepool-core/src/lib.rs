//! # Sparepool Core
//!
//! Runtime-agnostic building blocks for the sparepool server: configuration,
//! error types, diagnostics, bind-spec parsing and the per-listener pool
//! counters that drive the elastic acceptor pool.

#![warn(missing_docs)]

/// Logging macros
pub mod logging;

/// Timestamped diagnostics sink
pub mod diagnostics;

/// Error types
pub mod error;

/// Application configuration
pub mod config;

/// System constants
pub mod constants;

/// Bind spec parsing
pub mod bind;

/// Acceptor pool bookkeeping
pub mod pool;

// Re-export commonly used items
pub use bind::BindSpec;
pub use config::Config;
pub use error::{Error, Result, SpawnError};
pub use pool::{PoolCounters, PoolLimits, PoolStats};

/// Crate version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
