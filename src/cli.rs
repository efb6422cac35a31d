//! Command-Line Interface (CLI) argument parsing.
//!
//! This module defines the command-line arguments for the application using the
//! `clap` crate. These arguments are parsed at startup and then merged with
//! the configuration file and environment variables as the highest-priority
//! `figment` provider.

use clap::Parser;
use figment::{
    value::{Dict, Map, Value},
    Error, Metadata, Profile, Provider,
};
use std::path::PathBuf;

/// Probes DNS nameservers and exports the results as Prometheus metrics.
#[derive(Parser, Debug, Default, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the TOML or YAML configuration file.
    #[arg(short, long, value_name = "FILE")]
    pub config_file: Option<PathBuf>,

    /// Logging level (trace, debug, info, warn, error).
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Shorthand for `--log-level debug`.
    #[arg(long)]
    pub debug: bool,

    /// Address and port for the metrics endpoint.
    #[arg(long, value_name = "ADDR")]
    pub listen_address: Option<String>,

    /// Seconds between the end of one sweep and the start of the next.
    #[arg(long, value_name = "SECONDS")]
    pub interval_seconds: Option<u64>,

    /// Nameserver for domains that do not configure one.
    #[arg(long, value_name = "ADDR")]
    pub default_ns: Option<String>,
}

impl Provider for Cli {
    fn metadata(&self) -> Metadata {
        Metadata::named("Command-Line Arguments")
    }

    fn data(&self) -> Result<Map<Profile, Dict>, Error> {
        let mut dict = Dict::new();

        // `--debug` wins over `--log-level`.
        if self.debug {
            dict.insert("log_level".into(), Value::from("debug"));
        } else if let Some(level) = &self.log_level {
            dict.insert("log_level".into(), Value::from(level.clone()));
        }

        if let Some(ns) = &self.default_ns {
            dict.insert("default_ns".into(), Value::from(ns.clone()));
        }

        if let Some(addr) = &self.listen_address {
            insert_nested(&mut dict, "exporter", "listen_address", Value::from(addr.clone()));
        }

        if let Some(interval) = self.interval_seconds {
            insert_nested(&mut dict, "poll", "interval_seconds", Value::from(interval));
        }

        let mut map = Map::new();
        map.insert(Profile::Default, dict);
        Ok(map)
    }
}

/// Inserts `section.key = value`, creating the section table if needed.
fn insert_nested(dict: &mut Dict, section: &str, key: &str, value: Value) {
    let mut table = match dict.remove(section) {
        Some(Value::Dict(_, table)) => table,
        _ => Dict::new(),
    };
    table.insert(key.into(), value);
    dict.insert(section.into(), Value::from(table));
}
