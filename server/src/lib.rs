//! # Sparepool Server
//!
//! A TCP server whose acceptors are cooperative tasks on one thread. Each
//! listening socket keeps a band of spare acceptors: a task that accepts a
//! connection may spawn a sibling when spares run low, and a task that
//! finishes serving retires when spares pile up.

#![warn(missing_docs)]

/// Listening socket setup
pub mod listener;

/// Per-connection request handling
pub mod session;

/// Self-regulating accept loop
pub mod acceptor;

/// Initial acceptor tasks
pub mod bootstrap;

/// Periodic pool status lines
pub mod stats;

/// Runtime and lifecycle orchestration
pub mod server;

// Re-export core functionality
pub use sparepool_core::*;
