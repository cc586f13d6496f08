//! Command-line interface handling for the Horizon overlay host.
//!
//! Every option here overrides a value from the configuration file.

use clap::{value_parser, Arg, ArgMatches, Command};
use std::path::PathBuf;

/// Command line arguments parsed from user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliArgs {
    /// Path to the configuration file
    pub config_path: PathBuf,
    /// Optional override for log level
    pub log_level: Option<String>,
    /// Whether to force JSON log output
    pub json_logs: bool,
    /// Optional override for the number of simulated clients
    pub bots: Option<usize>,
    /// Optional override for the tick interval in milliseconds
    pub tick_ms: Option<u64>,
}

impl CliArgs {
    /// Parses the process arguments, exiting with usage on error.
    pub fn parse() -> Self {
        Self::from_matches(&command().get_matches())
    }

    /// Parses an explicit argument list.
    pub fn try_parse_from<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        Ok(Self::from_matches(&command().try_get_matches_from(args)?))
    }

    fn from_matches(matches: &ArgMatches) -> Self {
        Self {
            config_path: matches
                .get_one::<String>("config")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("config.toml")),
            log_level: matches.get_one::<String>("log-level").cloned(),
            json_logs: matches.get_flag("json-logs"),
            bots: matches.get_one::<usize>("bots").copied(),
            tick_ms: matches.get_one::<u64>("tick-ms").copied(),
        }
    }
}

fn command() -> Command {
    Command::new("Horizon Overlay Host")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Drives per-client sessions and sidebar overlays from a server tick loop")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value("config.toml"),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("Log level (trace, debug, info, warn, error)"),
        )
        .arg(
            Arg::new("json-logs")
                .long("json-logs")
                .help("Output logs in JSON format")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("bots")
                .short('b')
                .long("bots")
                .value_name("COUNT")
                .help("Number of simulated clients to connect")
                .value_parser(value_parser!(usize)),
        )
        .arg(
            Arg::new("tick-ms")
                .long("tick-ms")
                .value_name("MILLIS")
                .help("Milliseconds per server tick")
                .value_parser(value_parser!(u64)),
        )
}
