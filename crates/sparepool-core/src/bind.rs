//! Bind spec parsing
//!
//! A bind spec is the `address[:port]` text naming one listening socket.

use crate::constants::{DEFAULT_BIND_HOST, DEFAULT_PORT};
use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// Parsed `address[:port]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindSpec {
    /// Host name or dotted-decimal address
    pub host: String,
    /// TCP port, never zero
    pub port: u16,
}

impl BindSpec {
    /// Parse a bind spec
    ///
    /// The port follows the last `:`. A missing or zero port becomes
    /// [`DEFAULT_PORT`]; an empty host means all interfaces.
    pub fn parse(spec: &str) -> Result<Self> {
        let spec = spec.trim();
        let (host, port) = match spec.rsplit_once(':') {
            Some((host, "")) => (host, 0),
            Some((host, port)) => {
                let port = port
                    .parse::<u16>()
                    .map_err(|e| Error::bind_spec(spec, format!("bad port: {}", e)))?;
                (host, port)
            }
            None => (spec, 0),
        };

        let host = if host.is_empty() { DEFAULT_BIND_HOST } else { host };
        let port = if port == 0 { DEFAULT_PORT } else { port };

        Ok(Self {
            host: host.to_string(),
            port,
        })
    }
}

impl FromStr for BindSpec {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for BindSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}
