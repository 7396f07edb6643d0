//! Global constants used throughout the sparepool codebase
//!
//! Defaults for every tunable live here so the config layer and the
//! listener setup agree on them.

/// Port used when a bind spec omits one or names port 0
pub const DEFAULT_PORT: u16 = 8000;

/// Address bound when a bind spec has an empty host part
pub const DEFAULT_BIND_HOST: &str = "0.0.0.0";

/// Maximum number of listening sockets
pub const DEFAULT_MAX_BIND_ADDRESSES: usize = 16;

/// Backlog passed to `listen(2)`
pub const DEFAULT_LISTEN_BACKLOG: u32 = 256;

/// Hard cap on acceptor tasks per listener
pub const DEFAULT_MAX_THREADS: usize = 8;

/// Spare acceptors above which a finishing task retires
pub const DEFAULT_MAX_WAIT_THREADS: usize = 4;

/// Spare acceptors below which a busy task spawns a sibling
pub const DEFAULT_MIN_WAIT_THREADS: usize = 2;

/// Request read timeout in seconds
pub const DEFAULT_REQUEST_TIMEOUT_S: u64 = 30;

/// Bytes read from a client before responding
pub const REQUEST_BUFFER_SIZE: usize = 512;

/// Canned response written to every client
///
/// The body carries a trailing newline.
pub const RESPONSE: &[u8] = b"HTTP/1.0 200 OK\r\n\
Content-type: text/html\r\n\
Connection: close\r\n\
\r\n\
<H2>It worked!</H2>\n";

/// Prefix for environment variable overrides
pub const ENV_PREFIX: &str = "SPAREPOOL_";
