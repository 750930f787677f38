//! Received-error counters

use dashmap::DashMap;
use errorlog_core::{MetricLabels, MetricsSink};

/// Counters kept in memory, keyed by status code, service and method
#[derive(Debug, Default)]
pub struct InMemoryMetrics {
    counters: DashMap<MetricLabels, u64>,
}

impl InMemoryMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of one counter
    pub fn get(&self, labels: &MetricLabels) -> u64 {
        self.counters.get(labels).map_or(0, |c| *c.value())
    }

    /// Sum over all counters
    pub fn total(&self) -> u64 {
        self.counters.iter().map(|c| *c.value()).sum()
    }

    /// All counters, ordered by label
    pub fn snapshot(&self) -> Vec<(MetricLabels, u64)> {
        let mut all: Vec<_> = self
            .counters
            .iter()
            .map(|c| (c.key().clone(), *c.value()))
            .collect();
        all.sort_by(|a, b| a.0.to_string().cmp(&b.0.to_string()));
        all
    }
}

impl MetricsSink for InMemoryMetrics {
    fn increment(&self, labels: &MetricLabels) {
        *self.counters.entry(labels.clone()).or_insert(0) += 1;
    }
}

/// Discards all counts
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {
    fn increment(&self, _labels: &MetricLabels) {}
}
