//! Error types and handling for sparepool
//!
//! Setup failures carry the underlying OS error as their source and render
//! it after a colon, so a single `Display` gives the complete diagnostic line.

use std::io;
use std::net::SocketAddr;
use thiserror::Error;

/// Main result type used throughout the workspace
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for sparepool
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed `address[:port]` text
    #[error("invalid bind spec '{spec}': {reason}")]
    BindSpec {
        /// The offending spec text
        spec: String,
        /// Why it was rejected
        reason: String,
    },

    /// Host name could not be resolved to an IPv4 address
    #[error("can't resolve address: {host}: {source}")]
    Resolve {
        /// Host part of the bind spec
        host: String,
        /// Resolver error
        #[source]
        source: io::Error,
    },

    /// `socket(2)` failed
    #[error("can't create socket: {0}")]
    Socket(#[source] io::Error),

    /// `SO_REUSEADDR` could not be set
    #[error("can't set SO_REUSEADDR: {0}")]
    ReuseAddr(#[source] io::Error),

    /// `bind(2)` failed
    #[error("can't bind to address {addr}: {source}")]
    Bind {
        /// Target address
        addr: SocketAddr,
        /// OS error
        #[source]
        source: io::Error,
    },

    /// `listen(2)` failed
    #[error("listen on {addr}: {source}")]
    Listen {
        /// Bound address
        addr: SocketAddr,
        /// OS error
        #[source]
        source: io::Error,
    },

    /// The socket could not be handed to the async runtime
    #[error("can't register listener {addr} with the runtime: {source}")]
    Register {
        /// Bound address
        addr: SocketAddr,
        /// OS error
        #[source]
        source: io::Error,
    },

    /// Bootstrap left a listener with no acceptor tasks
    #[error("no acceptor tasks could be started for {addr}")]
    NoAcceptors {
        /// Listener address
        addr: SocketAddr,
    },

    /// Runtime construction failed
    #[error("initialization failed: {0}")]
    Runtime(#[source] io::Error),

    /// I/O errors from std
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Failure to launch a sibling acceptor task
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SpawnError {
    /// The local scheduler the spawner targets has been dropped
    #[error("local scheduler is no longer running")]
    SchedulerClosed,

    /// The spawner refused the task
    #[error("spawn rejected: {0}")]
    Rejected(String),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a bind spec error
    pub fn bind_spec(spec: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::BindSpec {
            spec: spec.into(),
            reason: reason.into(),
        }
    }

    /// Check if this error comes from socket setup (as opposed to configuration)
    pub fn is_setup_error(&self) -> bool {
        matches!(
            self,
            Error::Resolve { .. }
                | Error::Socket(_)
                | Error::ReuseAddr(_)
                | Error::Bind { .. }
                | Error::Listen { .. }
                | Error::Register { .. }
                | Error::NoAcceptors { .. }
        )
    }
}
