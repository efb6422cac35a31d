//! The resolver directory: which nameservers each domain is probed against.
//!
//! The directory is built once at startup from the `resolve` section of the
//! configuration, with defaults filled in, and is read-only afterwards.

use crate::config::{Config, ResolveItem};
use crate::core::QueryType;
use std::collections::BTreeMap;
use std::net::{IpAddr, SocketAddr};

/// Standard DNS port appended to addresses that do not carry one.
pub const DNS_PORT: u16 = 53;

/// Nameserver used when the configuration has no `default_ns`.
pub const FALLBACK_NAMESERVER: &str = "8.8.8.8:53";

/// One configured probe target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverEntry {
    pub domain: String,
    /// Never empty; every address carries an explicit port.
    pub nameservers: Vec<String>,
    pub query_type: QueryType,
}

/// Domain name to [`ResolverEntry`], iterated in domain order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolverDirectory {
    entries: BTreeMap<String, ResolverEntry>,
    default_nameserver: String,
}

impl ResolverDirectory {
    /// Builds the directory from the application configuration.
    pub fn from_config(config: &Config) -> Self {
        Self::build(config.default_ns.as_deref(), &config.resolve)
    }

    /// Builds the directory from a raw domain map and optional default.
    ///
    /// Domains without a nameserver get the default (or [`FALLBACK_NAMESERVER`]),
    /// and every address is normalized with [`normalize_nameserver`].
    pub fn build(
        default_ns: Option<&str>,
        resolve: &BTreeMap<String, Option<ResolveItem>>,
    ) -> Self {
        let default_nameserver = default_ns
            .map(str::trim)
            .filter(|ns| !ns.is_empty())
            .map(normalize_nameserver)
            .unwrap_or_else(|| FALLBACK_NAMESERVER.to_string());

        let entries = resolve
            .iter()
            .map(|(domain, item)| {
                let item = item.clone().unwrap_or_default();
                let mut nameservers: Vec<String> = Vec::new();
                for ns in item.nameserver.iter().chain(item.nameservers.iter()) {
                    let ns = normalize_nameserver(ns.trim());
                    if !nameservers.contains(&ns) {
                        nameservers.push(ns);
                    }
                }
                if nameservers.is_empty() {
                    nameservers.push(default_nameserver.clone());
                }
                let entry = ResolverEntry {
                    domain: domain.clone(),
                    nameservers,
                    query_type: item.query_type.unwrap_or_default(),
                };
                (domain.clone(), entry)
            })
            .collect();

        Self {
            entries,
            default_nameserver,
        }
    }

    pub fn get(&self, domain: &str) -> Option<&ResolverEntry> {
        self.entries.get(domain)
    }

    pub fn entries(&self) -> impl Iterator<Item = &ResolverEntry> {
        self.entries.values()
    }

    /// Every (nameserver, entry) pair a sweep has to probe.
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &ResolverEntry)> {
        self.entries
            .values()
            .flat_map(|entry| entry.nameservers.iter().map(move |ns| (ns.as_str(), entry)))
    }

    pub fn default_nameserver(&self) -> &str {
        &self.default_nameserver
    }

    /// Number of domains.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn pair_count(&self) -> usize {
        self.entries.values().map(|e| e.nameservers.len()).sum()
    }
}

/// Appends the standard DNS port to an address that lacks one.
///
/// `host` and `a.b.c.d` become `host:53` and `a.b.c.d:53`, a bare IPv6 literal
/// becomes `[addr]:53`, and anything already carrying a port is returned as is.
pub fn normalize_nameserver(addr: &str) -> String {
    if addr.parse::<SocketAddr>().is_ok() {
        return addr.to_string();
    }
    if let Ok(ip) = addr.parse::<IpAddr>() {
        return SocketAddr::new(ip, DNS_PORT).to_string();
    }
    if addr.starts_with('[') && addr.ends_with(']') {
        return format!("{addr}:{DNS_PORT}");
    }
    if addr.contains(':') {
        return addr.to_string();
    }
    format!("{addr}:{DNS_PORT}")
}
