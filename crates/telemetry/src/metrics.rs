//! Metrics primitives and registry.
//!
//! Counters, gauges and histograms live in memory behind atomics; there is
//! no exporter. Metrics are keyed by name plus an optional label set, so
//! `inbound_activations_total{type="webhook"}` and
//! `inbound_activations_total{type="sqs"}` are independent series.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use dashmap::DashMap;
use parking_lot::Mutex;

/// Activations that produced a live executable.
pub const ACTIVATIONS_TOTAL: &str = "inbound_activations_total";
/// Activation attempts that ended DOWN.
pub const ACTIVATION_FAILURES_TOTAL: &str = "inbound_activation_failures_total";
/// Executables deactivated.
pub const DEACTIVATIONS_TOTAL: &str = "inbound_deactivations_total";
/// Executables currently live.
pub const ACTIVE_EXECUTABLES: &str = "inbound_active_executables";
/// Time spent in `activate`.
pub const ACTIVATION_DURATION_SECONDS: &str = "inbound_activation_duration_seconds";
/// Payloads delivered to the engine.
pub const CORRELATIONS_TOTAL: &str = "inbound_correlations_total";
/// Payloads that failed to correlate.
pub const CORRELATION_FAILURES_TOTAL: &str = "inbound_correlation_failures_total";
/// Payloads filtered out by their activation condition.
pub const ACTIVATION_CONDITION_NOT_MET_TOTAL: &str = "inbound_activation_condition_not_met_total";

/// An incrementing counter.
#[derive(Debug, Clone, Default)]
pub struct Counter {
    value: Arc<AtomicU64>,
}

impl Counter {
    /// Create a new counter starting at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment by one.
    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment by a given amount.
    pub fn inc_by(&self, n: u64) {
        self.value.fetch_add(n, Ordering::Relaxed);
    }

    /// Current value.
    #[must_use]
    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// A gauge that can go up and down.
#[derive(Debug, Clone, Default)]
pub struct Gauge {
    value: Arc<AtomicI64>,
}

impl Gauge {
    /// Create a new gauge starting at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment by one.
    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    /// Decrement by one.
    pub fn dec(&self) {
        self.value.fetch_sub(1, Ordering::Relaxed);
    }

    /// Set to a specific value.
    pub fn set(&self, v: i64) {
        self.value.store(v, Ordering::Relaxed);
    }

    /// Current value.
    #[must_use]
    pub fn get(&self) -> i64 {
        self.value.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Default)]
struct HistogramState {
    count: u64,
    sum: f64,
    max: f64,
}

/// A summary histogram keeping count, sum and maximum.
#[derive(Debug, Clone, Default)]
pub struct Histogram {
    state: Arc<Mutex<HistogramState>>,
}

impl Histogram {
    /// Create a new histogram.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an observation.
    pub fn observe(&self, value: f64) {
        let mut state = self.state.lock();
        state.count += 1;
        state.sum += value;
        if value > state.max {
            state.max = value;
        }
    }

    /// Number of observations recorded.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.state.lock().count
    }

    /// Sum of all observations.
    #[must_use]
    pub fn sum(&self) -> f64 {
        self.state.lock().sum
    }

    /// Largest observation, `0.0` when empty.
    #[must_use]
    pub fn max(&self) -> f64 {
        self.state.lock().max
    }
}

/// Registry for creating and retrieving named metrics.
///
/// Retrieving the same name and labels twice returns handles to the same
/// underlying series.
#[derive(Debug, Clone, Default)]
pub struct MetricsRegistry {
    counters: Arc<DashMap<String, Counter>>,
    gauges: Arc<DashMap<String, Gauge>>,
    histograms: Arc<DashMap<String, Histogram>>,
}

impl MetricsRegistry {
    /// Create a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or create a counter by name.
    pub fn counter(&self, name: &str) -> Counter {
        self.counters.entry(name.to_owned()).or_default().clone()
    }

    /// Get or create a labeled counter.
    pub fn counter_with_labels(&self, name: &str, labels: &[(&str, &str)]) -> Counter {
        self.counters
            .entry(series_key(name, labels))
            .or_default()
            .clone()
    }

    /// Get or create a gauge by name.
    pub fn gauge(&self, name: &str) -> Gauge {
        self.gauges.entry(name.to_owned()).or_default().clone()
    }

    /// Get or create a labeled gauge.
    pub fn gauge_with_labels(&self, name: &str, labels: &[(&str, &str)]) -> Gauge {
        self.gauges
            .entry(series_key(name, labels))
            .or_default()
            .clone()
    }

    /// Get or create a histogram by name.
    pub fn histogram(&self, name: &str) -> Histogram {
        self.histograms.entry(name.to_owned()).or_default().clone()
    }

    /// Current value of every counter series, sorted by series key.
    pub fn counter_snapshot(&self) -> BTreeMap<String, u64> {
        self.counters
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().get()))
            .collect()
    }
}

/// Render `name{a="1",b="2"}` with labels sorted by key.
fn series_key(name: &str, labels: &[(&str, &str)]) -> String {
    if labels.is_empty() {
        return name.to_owned();
    }
    let mut sorted = labels.to_vec();
    sorted.sort_unstable_by_key(|(k, _)| *k);
    let rendered: Vec<String> = sorted
        .iter()
        .map(|(k, v)| format!("{k}=\"{v}\""))
        .collect();
    format!("{name}{{{}}}", rendered.join(","))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn counter_increments() {
        let c = Counter::new();
        c.inc();
        c.inc_by(5);
        assert_eq!(c.get(), 6);
    }

    #[test]
    fn gauge_up_and_down() {
        let g = Gauge::new();
        g.inc();
        g.inc();
        g.dec();
        assert_eq!(g.get(), 1);
        g.set(42);
        assert_eq!(g.get(), 42);
    }

    #[test]
    fn histogram_tracks_count_sum_and_max() {
        let h = Histogram::new();
        h.observe(1.0);
        h.observe(2.5);
        h.observe(0.5);
        assert_eq!(h.count(), 3);
        assert!((h.sum() - 4.0).abs() < f64::EPSILON);
        assert!((h.max() - 2.5).abs() < f64::EPSILON);
    }

    #[test]
    fn registry_returns_same_metric_for_same_name() {
        let reg = MetricsRegistry::new();
        reg.counter(ACTIVATIONS_TOTAL).inc();
        assert_eq!(reg.counter(ACTIVATIONS_TOTAL).get(), 1);
    }

    #[test]
    fn labels_split_series_regardless_of_order() {
        let reg = MetricsRegistry::new();
        reg.counter_with_labels(CORRELATIONS_TOTAL, &[("type", "webhook"), ("tenant", "a")])
            .inc();
        reg.counter_with_labels(CORRELATIONS_TOTAL, &[("tenant", "a"), ("type", "webhook")])
            .inc();
        reg.counter_with_labels(CORRELATIONS_TOTAL, &[("type", "sqs")]).inc();

        let snapshot = reg.counter_snapshot();
        assert_eq!(
            snapshot.get("inbound_correlations_total{tenant=\"a\",type=\"webhook\"}"),
            Some(&2)
        );
        assert_eq!(snapshot.get("inbound_correlations_total{type=\"sqs\"}"), Some(&1));
        assert_eq!(snapshot.get(CORRELATIONS_TOTAL), None);
    }
}
