//! Typed counters and histograms on top of a `prometheus::Registry`.
//!
//! The registry is an ordinary value: construct one at startup, wrap it in an
//! `Arc` and hand it to whatever needs to record or render. Series storage and
//! text encoding belong to the `prometheus` crate; this layer adds typed
//! errors, label-set validation, idempotent registration and headers for
//! families that have no series yet.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::io::Write;
use std::sync::{Arc, PoisonError, RwLock, RwLockWriteGuard};

use prometheus::core::Collector;
use prometheus::proto::Metric;
use prometheus::{CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder};
use tracing::{debug, error};

use crate::domain::{ConfigurationError, ObservationError};

/// Media type of the rendered output, as expected by Prometheus scrapers.
pub const CONTENT_TYPE: &str = prometheus::TEXT_FORMAT;

/// Latency buckets in seconds, matching the Prometheus client defaults.
pub const DEFAULT_BUCKETS: [f64; 14] = [
    0.005, 0.01, 0.025, 0.05, 0.075, 0.1, 0.25, 0.5, 0.75, 1.0, 2.5, 5.0, 7.5, 10.0,
];

/// A label set as `(key, value)` pairs, in any order.
pub type Labels<'a> = [(&'a str, &'a str)];

/// Point-in-time copy of one histogram series.
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramSnapshot {
    /// `(upper bound, cumulative count)` for every finite bound.
    pub buckets: Vec<(f64, u64)>,
    pub sum: f64,
    pub count: u64,
}

impl HistogramSnapshot {
    fn empty(bounds: &[f64]) -> Self {
        Self {
            buckets: bounds.iter().map(|&b| (b, 0)).collect(),
            sum: 0.0,
            count: 0,
        }
    }
}

#[derive(Debug)]
struct Family {
    name: String,
    help: String,
    kind: &'static str,
    label_keys: Vec<String>,
}

impl Family {
    fn new(
        name: &str,
        help: &str,
        kind: &'static str,
        label_keys: &[&str],
    ) -> Result<Self, ConfigurationError> {
        if !is_valid_metric_name(name) {
            return Err(ConfigurationError::InvalidMetricName(name.to_string()));
        }

        let mut keys: Vec<String> = Vec::with_capacity(label_keys.len());
        for &key in label_keys {
            // `le` carries the bucket bound on histogram lines
            if !is_valid_label_name(key) || (kind == "histogram" && key == "le") {
                return Err(ConfigurationError::InvalidLabelName {
                    name: name.to_string(),
                    label: key.to_string(),
                });
            }
            if keys.iter().any(|k| k == key) {
                return Err(ConfigurationError::DuplicateLabelName {
                    name: name.to_string(),
                    label: key.to_string(),
                });
            }
            keys.push(key.to_string());
        }

        Ok(Self {
            name: name.to_string(),
            help: help.to_string(),
            kind,
            label_keys: keys,
        })
    }

    fn key_refs(&self) -> Vec<&str> {
        self.label_keys.iter().map(String::as_str).collect()
    }

    fn rejected(&self, err: prometheus::Error) -> ConfigurationError {
        ConfigurationError::Rejected {
            name: self.name.clone(),
            message: err.to_string(),
        }
    }

    fn mismatch(&self, labels: &Labels<'_>) -> ObservationError {
        ObservationError::LabelMismatch {
            name: self.name.clone(),
            expected: self.label_keys.clone(),
            actual: labels.iter().map(|(k, _)| (*k).to_string()).collect(),
        }
    }

    /// Index `labels` by key, rejecting repeated, missing or unknown keys.
    fn label_values<'a>(
        &self,
        labels: &Labels<'a>,
    ) -> Result<HashMap<&'a str, &'a str>, ObservationError> {
        let values: HashMap<&str, &str> = labels.iter().copied().collect();
        let declared = self
            .label_keys
            .iter()
            .all(|key| values.contains_key(key.as_str()));
        if values.len() != labels.len() || values.len() != self.label_keys.len() || !declared {
            return Err(self.mismatch(labels));
        }
        Ok(values)
    }

    fn write_header(&self, out: &mut Vec<u8>) {
        let help = self.help.replace('\\', r"\\").replace('\n', r"\n");
        let _ = writeln!(out, "# HELP {} {}", self.name, help);
        let _ = writeln!(out, "# TYPE {} {}", self.name, self.kind);
    }
}

fn is_valid_metric_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == ':' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
}

fn is_valid_label_name(name: &str) -> bool {
    if name.starts_with("__") {
        return false;
    }
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Validate bucket bounds, dropping a trailing `+Inf` (always implicit).
fn validate_bounds(name: &str, bounds: &[f64]) -> Result<Vec<f64>, ConfigurationError> {
    let invalid = |message: &str| ConfigurationError::InvalidBuckets {
        name: name.to_string(),
        message: message.to_string(),
    };

    // An empty list would silently fall back to the crate's defaults
    if bounds.is_empty() {
        return Err(invalid("bounds must not be empty"));
    }
    if bounds.iter().any(|b| b.is_nan()) {
        return Err(invalid("bounds must not contain NaN"));
    }
    if bounds.windows(2).any(|pair| pair[0] >= pair[1]) {
        return Err(invalid("bounds must be strictly increasing"));
    }

    let mut bounds = bounds.to_vec();
    if bounds.last() == Some(&f64::INFINITY) {
        bounds.pop();
    }
    if bounds.is_empty() || bounds.iter().any(|b| b.is_infinite()) {
        return Err(invalid("bounds must be finite"));
    }
    Ok(bounds)
}

/// Find the child of `collector` carrying exactly `values`, without creating it.
fn find_series(collector: &dyn Collector, values: &HashMap<&str, &str>) -> Option<Metric> {
    let families = collector.collect();
    families
        .iter()
        .flat_map(|family| family.get_metric())
        .find(|metric| {
            metric
                .get_label()
                .iter()
                .all(|pair| values.get(pair.get_name()) == Some(&pair.get_value()))
        })
        .cloned()
}

/// Handle to a registered counter. Cheap to clone.
#[derive(Clone)]
pub struct Counter {
    family: Arc<Family>,
    vec: CounterVec,
}

impl fmt::Debug for Counter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Counter")
            .field("name", &self.family.name)
            .field("label_keys", &self.family.label_keys)
            .finish()
    }
}

impl Counter {
    pub fn name(&self) -> &str {
        &self.family.name
    }

    /// Increment the series for `labels` by one.
    pub fn increment(&self, labels: &Labels<'_>) -> Result<(), ObservationError> {
        self.increment_by(labels, 1.0)
    }

    /// Increment the series for `labels` by `amount`, creating it on first use.
    ///
    /// # Errors
    /// `LabelMismatch` if the label keys differ from the declared ones,
    /// `InvalidValue` if `amount` is negative or not finite.
    pub fn increment_by(&self, labels: &Labels<'_>, amount: f64) -> Result<(), ObservationError> {
        if !amount.is_finite() || amount < 0.0 {
            return Err(ObservationError::InvalidValue {
                name: self.family.name.clone(),
                value: amount,
            });
        }
        let values = self.family.label_values(labels)?;
        self.vec
            .get_metric_with(&values)
            .map_err(|_| self.family.mismatch(labels))?
            .inc_by(amount);
        Ok(())
    }

    /// Current total for `labels`; zero for a series never observed.
    pub fn value(&self, labels: &Labels<'_>) -> Result<f64, ObservationError> {
        let values = self.family.label_values(labels)?;
        Ok(find_series(&self.vec, &values)
            .map(|metric| metric.get_counter().get_value())
            .unwrap_or(0.0))
    }
}

/// Handle to a registered histogram. Cheap to clone.
#[derive(Clone)]
pub struct Histogram {
    family: Arc<Family>,
    bounds: Arc<[f64]>,
    vec: HistogramVec,
}

impl fmt::Debug for Histogram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Histogram")
            .field("name", &self.family.name)
            .field("label_keys", &self.family.label_keys)
            .field("bounds", &self.bounds)
            .finish()
    }
}

impl Histogram {
    pub fn name(&self) -> &str {
        &self.family.name
    }

    /// Finite bucket upper bounds, in increasing order.
    pub fn bounds(&self) -> &[f64] {
        &self.bounds
    }

    /// Record `value` in the series for `labels`, creating it on first use.
    ///
    /// # Errors
    /// `LabelMismatch` if the label keys differ from the declared ones,
    /// `InvalidValue` if `value` is NaN.
    pub fn observe(&self, labels: &Labels<'_>, value: f64) -> Result<(), ObservationError> {
        if value.is_nan() {
            return Err(ObservationError::InvalidValue {
                name: self.family.name.clone(),
                value,
            });
        }
        let values = self.family.label_values(labels)?;
        self.vec
            .get_metric_with(&values)
            .map_err(|_| self.family.mismatch(labels))?
            .observe(value);
        Ok(())
    }

    /// Current state of the series for `labels`; empty if never observed.
    pub fn snapshot(&self, labels: &Labels<'_>) -> Result<HistogramSnapshot, ObservationError> {
        let values = self.family.label_values(labels)?;
        Ok(match find_series(&self.vec, &values) {
            Some(metric) => {
                let hist = metric.get_histogram();
                HistogramSnapshot {
                    buckets: hist
                        .get_bucket()
                        .iter()
                        .map(|b| (b.get_upper_bound(), b.get_cumulative_count()))
                        .collect(),
                    sum: hist.get_sample_sum(),
                    count: hist.get_sample_count(),
                }
            }
            None => HistogramSnapshot::empty(&self.bounds),
        })
    }
}

#[derive(Debug, Clone)]
enum Instrument {
    Counter(Counter),
    Histogram(Histogram),
}

impl Instrument {
    fn family(&self) -> &Arc<Family> {
        match self {
            Instrument::Counter(counter) => &counter.family,
            Instrument::Histogram(histogram) => &histogram.family,
        }
    }
}

/// Owner of every instrument in the process.
pub struct MetricRegistry {
    registry: Registry,
    instruments: RwLock<BTreeMap<String, Instrument>>,
}

impl Default for MetricRegistry {
    fn default() -> Self {
        Self {
            registry: Registry::new(),
            instruments: RwLock::new(BTreeMap::new()),
        }
    }
}

impl fmt::Debug for MetricRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricRegistry")
            .field("instruments", &self.names())
            .finish()
    }
}

impl MetricRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self) -> RwLockWriteGuard<'_, BTreeMap<String, Instrument>> {
        self.instruments
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a counter, or return the existing one with the same label keys.
    ///
    /// # Errors
    /// Fails if the name or a label key is invalid, or if `name` is already
    /// registered as a histogram or with different label keys.
    pub fn register_counter(
        &self,
        name: &str,
        help: &str,
        label_keys: &[&str],
    ) -> Result<Counter, ConfigurationError> {
        let family = Family::new(name, help, "counter", label_keys)?;

        let mut instruments = self.table();
        if let Some(existing) = instruments.get(name) {
            return match existing {
                Instrument::Counter(counter) if counter.family.label_keys == family.label_keys => {
                    Ok(counter.clone())
                }
                Instrument::Counter(counter) => Err(ConfigurationError::DuplicateMetric {
                    name: family.name,
                    existing: counter.family.label_keys.clone(),
                    requested: family.label_keys,
                }),
                Instrument::Histogram(_) => Err(ConfigurationError::KindMismatch {
                    name: family.name,
                    existing: "histogram",
                }),
            };
        }

        let vec = CounterVec::new(Opts::new(name, help), &family.key_refs())
            .map_err(|e| family.rejected(e))?;
        if family.label_keys.is_empty() {
            vec.get_metric_with_label_values(&[])
                .map_err(|e| family.rejected(e))?;
        }
        self.registry
            .register(Box::new(vec.clone()))
            .map_err(|e| family.rejected(e))?;

        debug!(metric = %name, labels = ?family.label_keys, "Registered counter");
        let counter = Counter {
            family: Arc::new(family),
            vec,
        };
        instruments.insert(name.to_string(), Instrument::Counter(counter.clone()));
        Ok(counter)
    }

    /// Register a histogram, or return the existing one with the same label
    /// keys and bounds.
    ///
    /// # Errors
    /// Fails on invalid names, a reserved `le` label, empty or non-increasing
    /// bounds, or a conflicting existing registration.
    pub fn register_histogram(
        &self,
        name: &str,
        help: &str,
        label_keys: &[&str],
        bucket_bounds: &[f64],
    ) -> Result<Histogram, ConfigurationError> {
        let family = Family::new(name, help, "histogram", label_keys)?;
        let bounds = validate_bounds(name, bucket_bounds)?;

        let mut instruments = self.table();
        if let Some(existing) = instruments.get(name) {
            return match existing {
                Instrument::Histogram(histogram)
                    if histogram.family.label_keys != family.label_keys =>
                {
                    Err(ConfigurationError::DuplicateMetric {
                        name: family.name,
                        existing: histogram.family.label_keys.clone(),
                        requested: family.label_keys,
                    })
                }
                Instrument::Histogram(histogram) if *histogram.bounds != *bounds => {
                    Err(ConfigurationError::BucketMismatch {
                        name: family.name,
                        existing: histogram.bounds.to_vec(),
                    })
                }
                Instrument::Histogram(histogram) => Ok(histogram.clone()),
                Instrument::Counter(_) => Err(ConfigurationError::KindMismatch {
                    name: family.name,
                    existing: "counter",
                }),
            };
        }

        let opts = HistogramOpts::new(name, help).buckets(bounds.clone());
        let vec = HistogramVec::new(opts, &family.key_refs()).map_err(|e| family.rejected(e))?;
        if family.label_keys.is_empty() {
            vec.get_metric_with_label_values(&[])
                .map_err(|e| family.rejected(e))?;
        }
        self.registry
            .register(Box::new(vec.clone()))
            .map_err(|e| family.rejected(e))?;

        debug!(
            metric = %name,
            labels = ?family.label_keys,
            buckets = bounds.len(),
            "Registered histogram"
        );
        let histogram = Histogram {
            family: Arc::new(family),
            bounds: bounds.into(),
            vec,
        };
        instruments.insert(name.to_string(), Instrument::Histogram(histogram.clone()));
        Ok(histogram)
    }

    /// Names of every registered instrument, sorted.
    pub fn names(&self) -> Vec<String> {
        self.instruments
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    /// Render every instrument in the Prometheus text format, sorted by name.
    ///
    /// Families without any series yet are rendered as their HELP/TYPE
    /// header, since the underlying registry leaves them out of `gather`.
    pub fn render(&self) -> String {
        let families: Vec<Arc<Family>> = self
            .instruments
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(|instrument| Arc::clone(instrument.family()))
            .collect();

        let gathered = self.registry.gather();
        let by_name: HashMap<&str, _> = gathered.iter().map(|mf| (mf.get_name(), mf)).collect();

        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        for family in &families {
            match by_name.get(family.name.as_str()) {
                Some(mf) => {
                    if let Err(err) = encoder.encode(std::slice::from_ref(*mf), &mut buffer) {
                        error!(metric = %family.name, error = %err, "Failed to encode metric family");
                    }
                }
                None => family.write_header(&mut buffer),
            }
        }

        String::from_utf8(buffer)
            .unwrap_or_else(|err| String::from_utf8_lossy(err.as_bytes()).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    const LABELS: [&str; 3] = ["method", "endpoint", "status"];

    fn health_labels() -> [(&'static str, &'static str); 3] {
        [("method", "GET"), ("endpoint", "health"), ("status", "200")]
    }

    mod registration_tests {
        use super::*;

        #[test]
        fn test_register_same_counter_twice_returns_shared_handle() {
            let registry = MetricRegistry::new();
            let first = registry.register_counter("requests_total", "Requests", &LABELS).unwrap();
            let second = registry.register_counter("requests_total", "Requests", &LABELS).unwrap();

            first.increment(&health_labels()).unwrap();
            assert_eq!(second.value(&health_labels()).unwrap(), 1.0);
            assert_eq!(registry.names(), vec!["requests_total".to_string()]);
        }

        #[test]
        fn test_register_same_histogram_twice_returns_shared_handle() {
            let registry = MetricRegistry::new();
            let first = registry
                .register_histogram("latency_seconds", "Latency", &["op"], &DEFAULT_BUCKETS)
                .unwrap();
            let second = registry
                .register_histogram("latency_seconds", "Latency", &["op"], &DEFAULT_BUCKETS)
                .unwrap();

            first.observe(&[("op", "get")], 0.2).unwrap();
            assert_eq!(second.snapshot(&[("op", "get")]).unwrap().count, 1);
        }

        #[test]
        fn test_register_counter_with_different_labels_fails() {
            let registry = MetricRegistry::new();
            registry.register_counter("requests_total", "Requests", &LABELS).unwrap();

            let err = registry
                .register_counter("requests_total", "Requests", &["method"])
                .unwrap_err();
            assert!(matches!(err, ConfigurationError::DuplicateMetric { .. }));
        }

        #[test]
        fn test_register_counter_over_histogram_fails() {
            let registry = MetricRegistry::new();
            registry
                .register_histogram("latency", "Latency", &[], &DEFAULT_BUCKETS)
                .unwrap();

            let err = registry.register_counter("latency", "Latency", &[]).unwrap_err();
            assert_eq!(
                err,
                ConfigurationError::KindMismatch {
                    name: "latency".to_string(),
                    existing: "histogram",
                }
            );
        }

        #[test]
        fn test_register_histogram_with_different_buckets_fails() {
            let registry = MetricRegistry::new();
            registry
                .register_histogram("latency", "Latency", &[], &[0.1, 1.0])
                .unwrap();

            let err = registry
                .register_histogram("latency", "Latency", &[], &[0.5])
                .unwrap_err();
            assert!(matches!(err, ConfigurationError::BucketMismatch { .. }));
        }

        #[test]
        fn test_invalid_bucket_bounds_rejected() {
            let registry = MetricRegistry::new();
            let cases: [&[f64]; 6] = [
                &[],
                &[1.0, 1.0],
                &[2.0, 1.0],
                &[f64::NAN],
                &[f64::NEG_INFINITY, 1.0],
                &[f64::INFINITY],
            ];
            for bounds in cases {
                let err = registry
                    .register_histogram("latency", "Latency", &[], bounds)
                    .unwrap_err();
                assert!(
                    matches!(err, ConfigurationError::InvalidBuckets { .. }),
                    "bounds {bounds:?} should be rejected"
                );
            }
            assert!(registry.names().is_empty());
        }

        #[test]
        fn test_trailing_infinity_bound_is_implicit() {
            let registry = MetricRegistry::new();
            let hist = registry
                .register_histogram("latency", "Latency", &[], &[0.1, 1.0, f64::INFINITY])
                .unwrap();
            assert_eq!(hist.bounds(), &[0.1, 1.0]);
        }

        #[test]
        fn test_invalid_names_rejected() {
            let registry = MetricRegistry::new();
            assert!(matches!(
                registry.register_counter("9lives", "Help", &[]),
                Err(ConfigurationError::InvalidMetricName(_))
            ));
            assert!(matches!(
                registry.register_counter("", "Help", &[]),
                Err(ConfigurationError::InvalidMetricName(_))
            ));
            assert!(matches!(
                registry.register_counter("ok_total", "Help", &["bad-label"]),
                Err(ConfigurationError::InvalidLabelName { .. })
            ));
            assert!(matches!(
                registry.register_counter("ok_total", "Help", &["__reserved"]),
                Err(ConfigurationError::InvalidLabelName { .. })
            ));
            assert!(matches!(
                registry.register_counter("ok_total", "Help", &["a", "a"]),
                Err(ConfigurationError::DuplicateLabelName { .. })
            ));
            assert!(matches!(
                registry.register_histogram("ok_seconds", "Help", &["le"], &DEFAULT_BUCKETS),
                Err(ConfigurationError::InvalidLabelName { .. })
            ));
            assert!(registry.names().is_empty());
        }

        #[test]
        fn test_empty_help_is_rejected_by_underlying_registry() {
            let registry = MetricRegistry::new();

            let err = registry.register_counter("jobs_total", "", &[]).unwrap_err();

            assert!(matches!(err, ConfigurationError::Rejected { ref name, .. } if name == "jobs_total"));
            assert!(registry.names().is_empty());
        }
    }

    mod counter_tests {
        use super::*;

        #[test]
        fn test_increment_creates_series_lazily() {
            let registry = MetricRegistry::new();
            let counter = registry.register_counter("requests_total", "Requests", &LABELS).unwrap();

            assert_eq!(counter.value(&health_labels()).unwrap(), 0.0);
            assert!(!registry.render().contains("requests_total{"));

            counter.increment(&health_labels()).unwrap();
            counter.increment_by(&health_labels(), 2.5).unwrap();
            assert_eq!(counter.value(&health_labels()).unwrap(), 3.5);
        }

        #[test]
        fn test_label_order_does_not_matter() {
            let registry = MetricRegistry::new();
            let counter = registry.register_counter("requests_total", "Requests", &LABELS).unwrap();

            counter
                .increment(&[("status", "200"), ("method", "GET"), ("endpoint", "health")])
                .unwrap();
            assert_eq!(counter.value(&health_labels()).unwrap(), 1.0);
        }

        #[test]
        fn test_negative_increment_rejected() {
            let registry = MetricRegistry::new();
            let counter = registry.register_counter("jobs_total", "Jobs", &[]).unwrap();

            let err = counter.increment_by(&[], -1.0).unwrap_err();
            assert!(matches!(err, ObservationError::InvalidValue { .. }));
            assert!(counter.increment_by(&[], f64::NAN).is_err());
            assert_eq!(counter.value(&[]).unwrap(), 0.0);
        }

        #[test]
        fn test_label_mismatch_rejected() {
            let registry = MetricRegistry::new();
            let counter = registry.register_counter("requests_total", "Requests", &LABELS).unwrap();

            let missing = counter.increment(&[("method", "GET"), ("endpoint", "health")]);
            assert!(matches!(missing, Err(ObservationError::LabelMismatch { .. })));

            let wrong = counter.increment(&[("method", "GET"), ("endpoint", "health"), ("path", "/")]);
            assert!(matches!(wrong, Err(ObservationError::LabelMismatch { .. })));

            let repeated =
                counter.increment(&[("method", "GET"), ("method", "POST"), ("status", "200")]);
            assert!(matches!(repeated, Err(ObservationError::LabelMismatch { .. })));

            assert!(matches!(
                counter.value(&[("method", "GET")]),
                Err(ObservationError::LabelMismatch { .. })
            ));
            assert!(!registry.render().contains("requests_total{"));
        }

        #[test]
        fn test_concurrent_increments_are_not_lost() {
            let registry = MetricRegistry::new();
            let counter = registry.register_counter("requests_total", "Requests", &LABELS).unwrap();

            let threads = 16;
            let per_thread = 500;
            let handles: Vec<_> = (0..threads)
                .map(|_| {
                    let counter = counter.clone();
                    thread::spawn(move || {
                        for _ in 0..per_thread {
                            counter.increment(&health_labels()).unwrap();
                        }
                    })
                })
                .collect();
            for handle in handles {
                handle.join().unwrap();
            }

            assert_eq!(
                counter.value(&health_labels()).unwrap(),
                f64::from(threads * per_thread)
            );
        }
    }

    mod histogram_tests {
        use super::*;

        #[test]
        fn test_observe_uses_cumulative_buckets() {
            let registry = MetricRegistry::new();
            let hist = registry
                .register_histogram("latency_seconds", "Latency", &["op"], &[0.1, 0.5, 1.0])
                .unwrap();

            hist.observe(&[("op", "get")], 0.05).unwrap();
            hist.observe(&[("op", "get")], 0.5).unwrap();
            hist.observe(&[("op", "get")], 3.0).unwrap();

            let snap = hist.snapshot(&[("op", "get")]).unwrap();
            assert_eq!(snap.buckets, vec![(0.1, 1), (0.5, 2), (1.0, 2)]);
            assert_eq!(snap.count, 3);
            assert!((snap.sum - 3.55).abs() < 1e-9);
        }

        #[test]
        fn test_nan_observation_rejected() {
            let registry = MetricRegistry::new();
            let hist = registry
                .register_histogram("latency_seconds", "Latency", &[], &DEFAULT_BUCKETS)
                .unwrap();

            assert!(hist.observe(&[], f64::NAN).is_err());
            assert_eq!(hist.snapshot(&[]).unwrap().count, 0);
        }

        #[test]
        fn test_label_mismatch_rejected() {
            let registry = MetricRegistry::new();
            let hist = registry
                .register_histogram(
                    "latency_seconds",
                    "Latency",
                    &["method", "endpoint"],
                    &DEFAULT_BUCKETS,
                )
                .unwrap();

            let missing = hist.observe(&[("method", "GET")], 0.1);
            assert!(matches!(missing, Err(ObservationError::LabelMismatch { .. })));

            let wrong = hist.observe(&[("method", "GET"), ("path", "/health")], 0.1);
            assert_eq!(
                wrong,
                Err(ObservationError::LabelMismatch {
                    name: "latency_seconds".to_string(),
                    expected: vec!["method".to_string(), "endpoint".to_string()],
                    actual: vec!["method".to_string(), "path".to_string()],
                })
            );

            let extra = hist.observe(
                &[("method", "GET"), ("endpoint", "health"), ("status", "200")],
                0.1,
            );
            assert!(matches!(extra, Err(ObservationError::LabelMismatch { .. })));

            assert!(!registry.render().contains("latency_seconds_bucket{"));
        }

        #[test]
        fn test_concurrent_observations_stay_consistent() {
            let registry = MetricRegistry::new();
            let hist = registry
                .register_histogram("latency_seconds", "Latency", &[], &[1.0, 2.0])
                .unwrap();

            let handles: Vec<_> = (0..8)
                .map(|i| {
                    let hist = hist.clone();
                    thread::spawn(move || {
                        for _ in 0..250 {
                            hist.observe(&[], f64::from(i % 3)).unwrap();
                        }
                    })
                })
                .collect();
            for handle in handles {
                handle.join().unwrap();
            }

            let snap = hist.snapshot(&[]).unwrap();
            assert_eq!(snap.count, 2000);
            // values 0 and 1 land in le=1; everything is <= 2
            assert_eq!(snap.buckets[0].1, 6 * 250);
            assert_eq!(snap.buckets[1].1, 2000);
        }
    }

    mod render_tests {
        use super::*;

        #[test]
        fn test_render_lists_instruments_without_observations() {
            let registry = MetricRegistry::new();
            registry.register_counter("jobs_total", "Jobs", &[]).unwrap();
            registry.register_counter("requests_total", "Requests", &LABELS).unwrap();
            registry
                .register_histogram("latency_seconds", "Latency", &[], &[0.5])
                .unwrap();

            let text = registry.render();
            assert!(text.contains("# TYPE jobs_total counter\njobs_total 0\n"));
            assert!(text.contains("# HELP requests_total Requests\n# TYPE requests_total counter\n"));
            assert!(text.contains("latency_seconds_bucket{le=\"0.5\"} 0\n"));
            assert!(text.contains("latency_seconds_bucket{le=\"+Inf\"} 0\n"));
            assert!(text.contains("latency_seconds_sum 0\n"));
            assert!(text.contains("latency_seconds_count 0\n"));
        }

        #[test]
        fn test_render_contains_recorded_series() {
            let registry = MetricRegistry::new();
            let counter = registry.register_counter("requests_total", "Requests", &LABELS).unwrap();
            counter.increment(&health_labels()).unwrap();

            let text = registry.render();
            assert!(
                text.lines()
                    .any(|l| l == r#"requests_total{endpoint="health",method="GET",status="200"} 1"#),
                "unexpected output:\n{text}"
            );
        }

        #[test]
        fn test_render_escapes_label_values_and_help() {
            let registry = MetricRegistry::new();
            let counter = registry
                .register_counter("notes_total", "Notes\nwith a newline", &["text"])
                .unwrap();
            registry
                .register_counter("quiet_total", r"Back\slash", &["k"])
                .unwrap();
            counter.increment(&[("text", "say \"hi\"")]).unwrap();

            let text = registry.render();
            assert!(text.contains(r#"notes_total{text="say \"hi\""} 1"#));
            assert!(text.contains(r"# HELP notes_total Notes\nwith a newline"));
            assert!(text.contains(r"# HELP quiet_total Back\\slash"));
        }

        #[test]
        fn test_render_is_deterministic() {
            let registry = MetricRegistry::new();
            let counter = registry.register_counter("b_total", "B", &["k"]).unwrap();
            registry.register_counter("a_total", "A", &[]).unwrap();
            registry.register_counter("c_total", "C", &["k"]).unwrap();
            counter.increment(&[("k", "z")]).unwrap();
            counter.increment(&[("k", "y")]).unwrap();

            let text = registry.render();
            assert_eq!(text, registry.render());

            let a = text.find("# HELP a_total").unwrap();
            let b = text.find("# HELP b_total").unwrap();
            let c = text.find("# HELP c_total").unwrap();
            assert!(a < b && b < c);
            let y = text.find(r#"k="y""#).unwrap();
            let z = text.find(r#"k="z""#).unwrap();
            assert!(y < z);
        }
    }
}
