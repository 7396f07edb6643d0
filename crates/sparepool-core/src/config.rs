//! Configuration for sparepool
//!
//! Settings come from three layers, later ones winning: a TOML file (or
//! built-in defaults), `SPAREPOOL_*` environment variables, and command-line
//! flags applied by the binary. [`Config::validate`] runs once, after every
//! layer has been applied.

use crate::bind::BindSpec;
use crate::constants::*;
use crate::error::{Error, Result};
use crate::pool::PoolLimits;
use crate::log_info;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Listening sockets
    pub server: ServerConfig,

    /// Acceptor pool thresholds
    pub pool: PoolConfig,

    /// Per-connection behavior
    pub session: SessionConfig,

    /// Periodic pool status logging
    pub stats: StatsConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind specs, `address[:port]`
    pub bind: Vec<String>,

    /// Upper bound on the number of bind specs
    pub max_bind_addresses: usize,

    /// Backlog passed to `listen(2)`
    pub listen_backlog: u32,
}

/// Acceptor pool thresholds, applied to every listener
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Hard cap on acceptor tasks per listener
    pub max_threads: usize,

    /// Spare acceptors above which idle tasks retire
    pub max_wait_threads: usize,

    /// Spare acceptors below which busy tasks spawn siblings
    pub min_wait_threads: usize,
}

/// Connection handling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Time allowed for the client to send its request
    #[serde(with = "duration_str")]
    pub request_timeout: Duration,

    /// Bytes read before responding
    pub read_buffer_size: usize,
}

/// Pool status reporting
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StatsConfig {
    /// Interval between status lines (0 disables reporting)
    #[serde(with = "duration_str")]
    pub report_interval: Duration,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: vec![format!("{}:{}", DEFAULT_BIND_HOST, DEFAULT_PORT)],
            max_bind_addresses: DEFAULT_MAX_BIND_ADDRESSES,
            listen_backlog: DEFAULT_LISTEN_BACKLOG,
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_threads: DEFAULT_MAX_THREADS,
            max_wait_threads: DEFAULT_MAX_WAIT_THREADS,
            min_wait_threads: DEFAULT_MIN_WAIT_THREADS,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_S),
            read_buffer_size: REQUEST_BUFFER_SIZE,
        }
    }
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            report_interval: Duration::ZERO,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl PoolConfig {
    /// Thresholds in the form the acceptor tasks consume
    pub fn limits(&self) -> PoolLimits {
        PoolLimits {
            max_threads: self.max_threads,
            max_wait_threads: self.max_wait_threads,
            min_wait_threads: self.min_wait_threads,
        }
    }
}

impl Config {
    /// Load configuration from an optional file, then apply environment overrides
    ///
    /// Not validated; the caller validates after its own overrides.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let config = Self::from_file(path)?;
                log_info!("Loaded configuration from: {}", path);
                config
            }
            None => Config::default(),
        };

        config.apply_env_overrides()?;

        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("Failed to read config file: {}", e)))?;

        toml::from_str(&contents)
            .map_err(|e| Error::config(format!("Failed to parse config file: {}", e)))
    }

    /// Apply `SPAREPOOL_*` environment variable overrides
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|name| std::env::var(format!("{}{}", ENV_PREFIX, name)).ok())
    }

    /// Apply overrides from any name lookup (environment without the prefix)
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(bind) = lookup("BIND") {
            self.server.bind = bind
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }

        if let Some(max) = lookup("MAX_THREADS") {
            self.pool.max_threads = max
                .parse()
                .map_err(|e| Error::config(format!("Invalid max threads: {}", e)))?;
        }

        if let Some(max) = lookup("MAX_WAIT_THREADS") {
            self.pool.max_wait_threads = max
                .parse()
                .map_err(|e| Error::config(format!("Invalid max wait threads: {}", e)))?;
        }

        if let Some(min) = lookup("MIN_WAIT_THREADS") {
            self.pool.min_wait_threads = min
                .parse()
                .map_err(|e| Error::config(format!("Invalid min wait threads: {}", e)))?;
        }

        if let Some(timeout) = lookup("REQUEST_TIMEOUT") {
            self.session.request_timeout = parse_duration(&timeout)
                .map_err(|e| Error::config(format!("Invalid request timeout: {}", e)))?;
        }

        if let Some(level) = lookup("LOG_LEVEL") {
            self.logging.level = level;
        }

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.server.bind.is_empty() {
            return Err(Error::config("At least one bind address is required"));
        }

        if self.server.bind.len() > self.server.max_bind_addresses {
            return Err(Error::config(format!(
                "Too many bind addresses: {} (maximum {})",
                self.server.bind.len(),
                self.server.max_bind_addresses
            )));
        }

        for spec in &self.server.bind {
            BindSpec::parse(spec)?;
        }

        if self.server.listen_backlog == 0 {
            return Err(Error::config("Listen backlog must be positive"));
        }

        let pool = &self.pool;
        if pool.max_threads == 0 {
            return Err(Error::config("max_threads must be at least 1"));
        }
        if pool.max_wait_threads == 0 || pool.max_wait_threads > pool.max_threads {
            return Err(Error::config(format!(
                "max_wait_threads must be between 1 and max_threads ({})",
                pool.max_threads
            )));
        }
        if pool.min_wait_threads > pool.max_wait_threads {
            return Err(Error::config(format!(
                "min_wait_threads ({}) exceeds max_wait_threads ({})",
                pool.min_wait_threads, pool.max_wait_threads
            )));
        }

        if self.session.request_timeout.is_zero() {
            return Err(Error::config("Request timeout must be positive"));
        }
        if self.session.read_buffer_size == 0 {
            return Err(Error::config("Read buffer size must be positive"));
        }

        match self.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => return Err(Error::config("Invalid log level")),
        }

        Ok(())
    }

    /// Parsed bind specs, in configuration order
    pub fn bind_specs(&self) -> Result<Vec<BindSpec>> {
        self.server.bind.iter().map(|s| BindSpec::parse(s)).collect()
    }
}

/// Parse durations like `500ms`, `30s`, `5m`, `1h` or bare seconds
pub fn parse_duration(s: &str) -> std::result::Result<Duration, String> {
    let s = s.trim();
    if let Some(ms) = s.strip_suffix("ms") {
        let ms: u64 = ms.parse().map_err(|_| "Invalid milliseconds")?;
        Ok(Duration::from_millis(ms))
    } else if let Some(secs) = s.strip_suffix('s') {
        let secs: u64 = secs.parse().map_err(|_| "Invalid seconds")?;
        Ok(Duration::from_secs(secs))
    } else if let Some(mins) = s.strip_suffix('m') {
        let mins: u64 = mins.parse().map_err(|_| "Invalid minutes")?;
        scaled_secs(mins, 60)
    } else if let Some(hours) = s.strip_suffix('h') {
        let hours: u64 = hours.parse().map_err(|_| "Invalid hours")?;
        scaled_secs(hours, 3600)
    } else {
        let secs: u64 = s.parse().map_err(|_| "Invalid duration format")?;
        Ok(Duration::from_secs(secs))
    }
}

fn scaled_secs(count: u64, unit: u64) -> std::result::Result<Duration, String> {
    count
        .checked_mul(unit)
        .map(Duration::from_secs)
        .ok_or_else(|| "duration too large".to_string())
}

/// Serde adapter storing a `Duration` as `"30s"` / `"250ms"`
mod duration_str {
    use super::parse_duration;
    use serde::de::{self, Deserializer, Visitor};
    use serde::Serializer;
    use std::fmt;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        if value.subsec_millis() == 0 {
            serializer.serialize_str(&format!("{}s", value.as_secs()))
        } else {
            serializer.serialize_str(&format!("{}ms", value.as_millis()))
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        struct DurationVisitor;

        impl<'de> Visitor<'de> for DurationVisitor {
            type Value = Duration;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a duration string like '30s' or '5m', or seconds")
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<Duration, E> {
                parse_duration(value).map_err(E::custom)
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> Result<Duration, E> {
                Ok(Duration::from_secs(value))
            }

            fn visit_i64<E: de::Error>(self, value: i64) -> Result<Duration, E> {
                u64::try_from(value)
                    .map(Duration::from_secs)
                    .map_err(|_| E::custom("negative duration"))
            }
        }

        deserializer.deserialize_any(DurationVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.server.bind, vec!["0.0.0.0:8000".to_string()]);
        assert_eq!(config.server.listen_backlog, 256);
        assert_eq!(config.session.request_timeout, Duration::from_secs(30));
        assert_eq!(config.session.read_buffer_size, 512);
        assert_eq!(
            config.pool.limits(),
            PoolLimits {
                max_threads: 8,
                max_wait_threads: 4,
                min_wait_threads: 2
            }
        );
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[server]
bind = ["127.0.0.1:9000", ":9001"]

[pool]
max_threads = 16

[session]
request_timeout = "5s"

[stats]
report_interval = "250ms"
"#
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.server.bind.len(), 2);
        assert_eq!(config.server.listen_backlog, DEFAULT_LISTEN_BACKLOG);
        assert_eq!(config.pool.max_threads, 16);
        assert_eq!(config.pool.max_wait_threads, DEFAULT_MAX_WAIT_THREADS);
        assert_eq!(config.session.request_timeout, Duration::from_secs(5));
        assert_eq!(config.stats.report_interval, Duration::from_millis(250));
        config.validate().unwrap();
    }

    #[test]
    fn test_serialized_config_reloads() {
        let mut config = Config::default();
        config.stats.report_interval = Duration::from_millis(1500);
        let text = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed.stats.report_interval, Duration::from_millis(1500));
        assert_eq!(parsed.session.request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_unreadable_file_is_config_error() {
        let err = Config::from_file("/nonexistent/sparepool.toml").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("BIND", "127.0.0.1:1, 127.0.0.1:2"),
            ("MAX_THREADS", "12"),
            ("MIN_WAIT_THREADS", "1"),
            ("REQUEST_TIMEOUT", "2m"),
            ("LOG_LEVEL", "debug"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config
            .apply_overrides(|name| vars.get(name).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.server.bind, vec!["127.0.0.1:1", "127.0.0.1:2"]);
        assert_eq!(config.pool.max_threads, 12);
        assert_eq!(config.pool.min_wait_threads, 1);
        assert_eq!(config.session.request_timeout, Duration::from_secs(120));
        assert_eq!(config.logging.level, "debug");
        config.validate().unwrap();
    }

    #[test]
    fn test_bad_override_value() {
        let mut config = Config::default();
        let err = config
            .apply_overrides(|name| (name == "MAX_THREADS").then(|| "many".to_string()))
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_validation_rejects_bad_thresholds() {
        let mut config = Config::default();
        config.pool.min_wait_threads = 5;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.pool.max_wait_threads = 9;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.pool.max_wait_threads = 0;
        config.pool.min_wait_threads = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_accepts_degenerate_band() {
        let mut config = Config::default();
        config.pool.max_threads = 3;
        config.pool.max_wait_threads = 3;
        config.pool.min_wait_threads = 3;
        config.validate().unwrap();
    }

    #[test]
    fn test_validation_rejects_bind_list() {
        let mut config = Config::default();
        config.server.bind.clear();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.server.max_bind_addresses = 1;
        config.server.bind.push("127.0.0.1:9000".into());
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.server.bind = vec!["host:port".into()];
        assert!(matches!(config.validate(), Err(Error::BindSpec { .. })));
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("30s"), Ok(Duration::from_secs(30)));
        assert_eq!(parse_duration("250ms"), Ok(Duration::from_millis(250)));
        assert_eq!(parse_duration("2m"), Ok(Duration::from_secs(120)));
        assert_eq!(parse_duration("1h"), Ok(Duration::from_secs(3600)));
        assert_eq!(parse_duration("7"), Ok(Duration::from_secs(7)));
        assert!(parse_duration("soon").is_err());
    }

    #[test]
    fn test_parse_duration_overflow() {
        assert_eq!(
            parse_duration("5124095576030432h"),
            Err("duration too large".to_string())
        );
        assert!(parse_duration("307445734561825861m").is_err());
        assert_eq!(
            parse_duration("18446744073709551615s"),
            Ok(Duration::from_secs(u64::MAX))
        );
    }

    #[test]
    fn test_load_leaves_validation_to_caller() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[pool]
max_wait_threads = 10
"#
        )
        .unwrap();

        // Only valid once a later layer raises max_threads
        let mut config = Config::load(file.path().to_str()).unwrap();
        assert!(config.validate().is_err());
        config.pool.max_threads = 16;
        config.validate().unwrap();
    }
}
