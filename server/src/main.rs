//! Sparepool server
//!
//! Serves a canned response on every configured address from a
//! self-regulating pool of cooperative acceptor tasks.

use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use sparepool_core::config::{parse_duration, LoggingConfig};
use sparepool_core::{diagnostics, log_info};
use sparepool_core::{Config, Error, Result, VERSION};

fn main() {
    let matches = cli().get_matches();

    // Logging needs the configured level, and config errors need logging
    let config = load_config(&matches);
    let level = match &config {
        Ok(config) => config.logging.level.clone(),
        Err(_) => LoggingConfig::default().level,
    };
    if let Err(e) = diagnostics::init_logging(&LoggingConfig { level }) {
        eprintln!("ERROR: {}", e);
        std::process::exit(1);
    }

    let config = config.unwrap_or_else(|e| diagnostics::fatal(&e));

    log_info!("Starting sparepool v{}", VERSION);

    if let Err(e) = sparepool_server::server::serve(config) {
        diagnostics::fatal(&e);
    }
}

fn cli() -> Command {
    Command::new("sparepool")
        .version(VERSION)
        .about("TCP server with a self-regulating pool of cooperative acceptors")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path"),
        )
        .arg(
            Arg::new("bind")
                .short('b')
                .long("bind")
                .value_name("ADDR[:PORT]")
                .action(ArgAction::Append)
                .help("Bind address; repeat for several listeners"),
        )
        .arg(
            Arg::new("max-threads")
                .long("max-threads")
                .value_name("N")
                .value_parser(value_parser!(usize))
                .help("Maximum acceptor tasks per listener"),
        )
        .arg(
            Arg::new("max-wait-threads")
                .long("max-wait-threads")
                .value_name("N")
                .value_parser(value_parser!(usize))
                .help("Spare acceptors above which idle tasks retire"),
        )
        .arg(
            Arg::new("min-wait-threads")
                .long("min-wait-threads")
                .value_name("N")
                .value_parser(value_parser!(usize))
                .help("Spare acceptors below which busy tasks spawn siblings"),
        )
        .arg(
            Arg::new("request-timeout")
                .long("request-timeout")
                .value_name("DURATION")
                .help("Request read timeout, e.g. 30s or 500ms"),
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .value_name("LEVEL")
                .help("Log level (trace, debug, info, warn, error)"),
        )
}

/// File and environment first, then command line overrides
fn load_config(matches: &ArgMatches) -> Result<Config> {
    let path = matches.get_one::<String>("config").map(String::as_str);
    let mut config = Config::load(path)?;
    apply_cli_overrides(&mut config, matches)?;
    config.validate()?;
    Ok(config)
}

fn apply_cli_overrides(config: &mut Config, matches: &ArgMatches) -> Result<()> {
    if let Some(binds) = matches.get_many::<String>("bind") {
        config.server.bind = binds.cloned().collect();
    }

    if let Some(&n) = matches.get_one::<usize>("max-threads") {
        config.pool.max_threads = n;
    }

    if let Some(&n) = matches.get_one::<usize>("max-wait-threads") {
        config.pool.max_wait_threads = n;
    }

    if let Some(&n) = matches.get_one::<usize>("min-wait-threads") {
        config.pool.min_wait_threads = n;
    }

    if let Some(timeout) = matches.get_one::<String>("request-timeout") {
        config.session.request_timeout = parse_duration(timeout)
            .map_err(|e| Error::config(format!("Invalid request timeout: {}", e)))?;
    }

    if let Some(level) = matches.get_one::<String>("log-level") {
        config.logging.level = level.clone();
    }

    Ok(())
}
