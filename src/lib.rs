//! dns-exporter - DNS nameserver health probes exported as Prometheus metrics
//!
//! The library periodically queries configured domains at configured
//! nameservers and keeps the outcome of the most recent probe of every pair
//! as a set of gauges, served to Prometheus over HTTP.

pub mod app;
pub mod cli;
pub mod config;
pub mod core;
pub mod directory;
pub mod dns;
pub mod internal_metrics;
pub mod poller;
pub mod task_manager;

// Re-export core types for convenience
pub use core::*;
