//! Per-connection request handling
//!
//! One read (bounded by the request timeout), one response write, no
//! parsing. The caller owns the connection and closes it afterwards.

use sparepool_core::config::SessionConfig;
use sparepool_core::constants::RESPONSE;
use sparepool_core::log_warn;
use sparepool_core::PoolCounters;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;

/// Settings for serving one connection
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Time allowed for the request read
    pub request_timeout: Duration,
    /// Bytes read before responding
    pub read_buffer_size: usize,
}

impl From<&SessionConfig> for SessionSettings {
    fn from(config: &SessionConfig) -> Self {
        Self {
            request_timeout: config.request_timeout,
            read_buffer_size: config.read_buffer_size,
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from(&SessionConfig::default())
    }
}

/// How a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Request read and full response written
    Served,
    /// Nothing arrived within the request timeout
    ReadTimedOut,
    /// The read failed
    ReadFailed,
    /// The response could not be written in full
    WriteFailed,
}

/// Serve one connection
///
/// Counts the request on `counters` only when the whole response was
/// written. Failures are reported as warnings naming the peer.
pub async fn handle_session<S>(
    stream: &mut S,
    peer: SocketAddr,
    counters: &PoolCounters,
    settings: &SessionSettings,
) -> SessionOutcome
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; settings.read_buffer_size];

    match timeout(settings.request_timeout, stream.read(&mut buf)).await {
        Ok(Ok(_)) => {}
        Ok(Err(e)) => {
            log_warn!("can't read request from {}: {}", peer.ip(), e);
            return SessionOutcome::ReadFailed;
        }
        Err(_) => {
            log_warn!(
                "can't read request from {}: timed out after {:?}",
                peer.ip(),
                settings.request_timeout
            );
            return SessionOutcome::ReadTimedOut;
        }
    }

    if let Err(e) = stream.write_all(RESPONSE).await {
        log_warn!("can't write response to {}: {}", peer.ip(), e);
        return SessionOutcome::WriteFailed;
    }

    counters.record_request();
    SessionOutcome::Served
}
