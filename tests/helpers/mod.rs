#![allow(dead_code)]

use dns_exporter::config::{Config, ResolveItem};

/// Adds a `resolve` entry with explicit nameservers to a config.
pub fn resolve(config: &mut Config, domain: &str, nameservers: &[&str]) {
    config.resolve.insert(
        domain.to_string(),
        Some(ResolveItem {
            nameservers: nameservers.iter().map(|ns| ns.to_string()).collect(),
            ..Default::default()
        }),
    );
}
