//! A simple in-memory gauge store for testing.

use crate::core::GaugeSink;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

type SampleKey = (String, Vec<(String, String)>);

/// Records every gauge write, keeping only the last value per series.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    samples: Arc<Mutex<BTreeMap<SampleKey, f64>>>,
    writes: Arc<Mutex<Vec<String>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Default::default()
    }

    fn sample_key(name: &str, labels: impl Iterator<Item = (String, String)>) -> SampleKey {
        (name.to_string(), labels.collect())
    }

    /// Current value of one series, if it was ever written.
    pub fn get(&self, name: &str, labels: &[(&str, &str)]) -> Option<f64> {
        let key = Self::sample_key(
            name,
            labels.iter().map(|(k, v)| (k.to_string(), v.to_string())),
        );
        self.samples.lock().unwrap().get(&key).copied()
    }

    /// Number of distinct series written so far.
    pub fn len(&self) -> usize {
        self.samples.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of distinct series for a metric name.
    pub fn series_count(&self, name: &str) -> usize {
        self.samples
            .lock()
            .unwrap()
            .keys()
            .filter(|(n, _)| n == name)
            .count()
    }

    /// Total number of writes to a metric name, overwrites included.
    pub fn write_count(&self, name: &str) -> usize {
        self.writes.lock().unwrap().iter().filter(|n| *n == name).count()
    }
}

impl GaugeSink for RecordingSink {
    fn set_gauge(&self, name: &str, labels: &[(&'static str, String)], value: f64) {
        let key = Self::sample_key(
            name,
            labels.iter().map(|(k, v)| (k.to_string(), v.clone())),
        );
        self.samples.lock().unwrap().insert(key, value);
        self.writes.lock().unwrap().push(name.to_string());
    }
}
