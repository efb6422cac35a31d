//! Configuration management for the DNS exporter
//!
//! This module defines the main `Config` struct and its sub-structs,
//! responsible for holding all application settings. It uses the `figment`
//! crate to layer built-in defaults, a TOML or YAML file, environment
//! variables and command-line flags, in increasing order of priority.

use crate::cli::Cli;
use crate::core::QueryType;
use anyhow::{bail, Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

/// Config file read when no `--config-file` flag is given, if it exists.
pub const DEFAULT_CONFIG_FILE: &str = "dns_exporter.toml";

/// Port the scrape endpoint listens on when none is configured.
pub const DEFAULT_LISTEN_PORT: u16 = 9117;

/// The main configuration struct for the application.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Config {
    /// The logging level for the application.
    pub log_level: String,
    /// Nameserver assigned to domains that do not name one.
    #[serde(default)]
    pub default_ns: Option<String>,
    /// Configuration for the metrics HTTP endpoint.
    pub exporter: ExporterConfig,
    /// Configuration for the poll loop and probes.
    pub poll: PollConfig,
    /// Domains to probe, each with optional nameservers.
    #[serde(default)]
    pub resolve: BTreeMap<String, Option<ResolveItem>>,
}

/// Configuration for the metrics HTTP endpoint.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ExporterConfig {
    /// The address and port the scrape endpoint listens on.
    pub listen_address: SocketAddr,
    /// Prefix prepended to every exported metric name.
    pub namespace: String,
}

/// What to do with the lookup gauges of a pair whose nameserver did not answer.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum UnresponsivePolicy {
    /// Leave `lookup_success` and `lookup_num_answers` at their previous values.
    #[default]
    Stale,
    /// Set `lookup_success` to 0.
    Fail,
}

/// Configuration for the poll loop.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct PollConfig {
    /// Seconds to wait after a sweep completes before starting the next.
    pub interval_seconds: u64,
    /// Per-query timeout in milliseconds.
    pub timeout_ms: u64,
    /// Maximum number of probes in flight during a sweep.
    pub concurrency: usize,
    pub unresponsive_policy: UnresponsivePolicy,
}

/// A single entry of the `resolve` map.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
pub struct ResolveItem {
    /// A single nameserver, as accepted by older configuration files.
    #[serde(default)]
    pub nameserver: Option<String>,
    #[serde(default)]
    pub nameservers: Vec<String>,
    #[serde(default)]
    pub query_type: Option<QueryType>,
}

impl Config {
    /// Loads the application configuration using the provided CLI arguments.
    ///
    /// The file named by `--config-file` must exist. Without the flag,
    /// [`DEFAULT_CONFIG_FILE`] is read if present.
    pub fn load_from_cli(cli: Cli) -> Result<Self> {
        let config_path = match &cli.config_file {
            Some(path) => {
                if !path.exists() {
                    bail!("Config file not found at specified path: {}", path.display());
                }
                Some(path.clone())
            }
            None => Some(PathBuf::from(DEFAULT_CONFIG_FILE)).filter(|p| p.exists()),
        };

        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));
        if let Some(path) = &config_path {
            figment = merge_file(figment, path)?;
        }
        let config: Config = figment
            // Allow overriding with environment variables, e.g., DNS_EXPORTER_POLL__INTERVAL_SECONDS=30
            .merge(Env::prefixed("DNS_EXPORTER_").split("__"))
            .merge(cli)
            .extract()?;

        config.validate()?;
        Ok(config)
    }

    /// Loads the configuration from a single file layered over the defaults.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            bail!("Config file not found at specified path: {}", path.display());
        }
        let config: Config =
            merge_file(Figment::new().merge(Serialized::defaults(Config::default())), path)?
                .extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects settings the exporter cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.poll.interval_seconds == 0 {
            bail!("poll.interval_seconds must be greater than zero");
        }
        if self.poll.timeout_ms == 0 {
            bail!("poll.timeout_ms must be greater than zero");
        }
        if self.poll.concurrency == 0 {
            bail!("poll.concurrency must be greater than zero");
        }
        if self.exporter.namespace.trim().is_empty() {
            bail!("exporter.namespace must not be empty");
        }
        if let Some(ns) = &self.default_ns {
            if ns.trim().is_empty() {
                bail!("default_ns must not be empty when set");
            }
        }
        for (domain, item) in &self.resolve {
            if domain.trim().is_empty() {
                bail!("resolve contains an empty domain name");
            }
            if let Some(item) = item {
                let empty = item
                    .nameserver
                    .iter()
                    .chain(item.nameservers.iter())
                    .any(|ns| ns.trim().is_empty());
                if empty {
                    bail!("resolve.{} has an empty nameserver address", domain);
                }
            }
        }
        Ok(())
    }
}

/// Picks the file provider from the extension; anything but `.yml`/`.yaml` is TOML.
///
/// Keys of the older YAML layout (`logging.level`, `exporter.address` and
/// `exporter.port`) are translated and layered right above the file, so
/// environment variables and flags still override them.
fn merge_file(figment: Figment, path: &Path) -> Result<Figment> {
    let file = match path.extension().and_then(|ext| ext.to_str()) {
        Some("yml") | Some("yaml") => Figment::from(Yaml::file(path)),
        _ => Figment::from(Toml::file(path)),
    };
    let legacy: LegacyKeys = file
        .extract()
        .with_context(|| format!("Failed to parse config file {}", path.display()))?;
    let overrides = legacy.into_overrides()?;
    Ok(figment.merge(file).merge(Serialized::defaults(overrides)))
}

/// Settings of the older YAML layout that have a different home now.
#[derive(Debug, Deserialize, Default)]
struct LegacyKeys {
    #[serde(default)]
    logging: LegacyLogging,
    #[serde(default)]
    exporter: LegacyExporter,
}

#[derive(Debug, Deserialize, Default)]
struct LegacyLogging {
    level: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct LegacyExporter {
    address: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Serialize, Default)]
struct LegacyOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    log_level: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    exporter: Option<ListenOverride>,
}

#[derive(Debug, Serialize)]
struct ListenOverride {
    listen_address: SocketAddr,
}

impl LegacyKeys {
    /// `address` defaults to `0.0.0.0` and `port` to [`DEFAULT_LISTEN_PORT`]
    /// when only one of them is given.
    fn into_overrides(self) -> Result<LegacyOverrides> {
        let exporter = match (self.exporter.address, self.exporter.port) {
            (None, None) => None,
            (address, port) => {
                let ip = match address.as_deref().map(str::trim) {
                    None | Some("") => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
                    Some(address) => address.parse::<IpAddr>().with_context(|| {
                        format!("exporter.address must be an IP address, got '{}'", address)
                    })?,
                };
                let port = port.unwrap_or(DEFAULT_LISTEN_PORT);
                Some(ListenOverride {
                    listen_address: SocketAddr::new(ip, port),
                })
            }
        };
        Ok(LegacyOverrides {
            log_level: self.logging.level.filter(|level| !level.trim().is_empty()),
            exporter,
        })
    }
}

// Provide a default implementation for tests and easy setup.
impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            default_ns: None,
            exporter: ExporterConfig::default(),
            poll: PollConfig::default(),
            resolve: BTreeMap::new(),
        }
    }
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            listen_address: SocketAddr::from(([0, 0, 0, 0], DEFAULT_LISTEN_PORT)),
            namespace: "dns".to_string(),
        }
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_seconds: 60,
            timeout_ms: 2000,
            concurrency: 1,
            unresponsive_policy: UnresponsivePolicy::Stale,
        }
    }
}
