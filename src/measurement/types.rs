use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::ConfigError;

// ─── Kinds ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Gauge,
    Counter,
    Histogram,
}

impl MetricKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gauge => "gauge",
            Self::Counter => "counter",
            Self::Histogram => "histogram",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gauge" => Ok(Self::Gauge),
            "counter" => Ok(Self::Counter),
            "histogram" => Ok(Self::Histogram),
            other => Err(ConfigError::UnknownMetricType(other.to_string())),
        }
    }
}

/// How a histogram lays out its buckets. Both may be enabled at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketStrategy {
    /// Fixed upper bounds, exposed as `_bucket{le=...}` series.
    Classic,
    /// Sparse exponential buckets sized by a growth factor.
    Native,
}

impl FromStr for BucketStrategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "classic" => Ok(Self::Classic),
            "native" => Ok(Self::Native),
            other => Err(ConfigError::UnknownHistogramType(other.to_string())),
        }
    }
}

// ─── Configuration ───────────────────────────────────────────────

/// Default classic bounds, tuned for request latencies in seconds.
pub const DEFAULT_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

#[derive(Debug, Clone, PartialEq)]
pub struct NativeConfig {
    /// Maximum ratio between two consecutive bucket bounds.
    pub bucket_factor: f64,
    /// Populated buckets allowed before the resolution is reduced.
    pub max_buckets: usize,
    /// Minimum age of the native buckets before they may be reset instead
    /// of coarsened. Zero disables resets.
    pub min_reset_interval: Duration,
}

impl Default for NativeConfig {
    fn default() -> Self {
        Self {
            bucket_factor: 1.1,
            max_buckets: 100,
            min_reset_interval: Duration::from_secs(60 * 60),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct HistogramConfig {
    pub buckets: Option<Vec<f64>>,
    pub native: Option<NativeConfig>,
}

impl HistogramConfig {
    pub fn classic() -> Self {
        Self {
            buckets: Some(DEFAULT_BUCKETS.to_vec()),
            native: None,
        }
    }

    /// Applies a list of strategies on top of an empty config.
    pub fn from_strategies(
        strategies: &[BucketStrategy],
        buckets: Vec<f64>,
        native: NativeConfig,
    ) -> Result<Self, ConfigError> {
        if strategies.is_empty() {
            return Err(ConfigError::NoHistogramType);
        }

        let mut config = Self::default();
        for strategy in strategies {
            match strategy {
                BucketStrategy::Classic => config.buckets = Some(buckets.clone()),
                BucketStrategy::Native => config.native = Some(native.clone()),
            }
        }
        Ok(config)
    }
}

/// Immutable configuration of the single exported measurement.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementConfig {
    pub kind: MetricKind,
    pub namespace: String,
    pub name: String,
    pub help: String,
    pub const_labels: BTreeMap<String, String>,
    /// Only consulted for [`MetricKind::Histogram`].
    pub histogram: HistogramConfig,
}

impl MeasurementConfig {
    /// Per-kind default identity, matching what dashboards built against
    /// this tool expect to scrape.
    pub fn new(kind: MetricKind) -> Self {
        let (namespace, name, help) = match kind {
            MetricKind::Gauge => ("golang", "manual_gauge", "This is my manual gauge"),
            MetricKind::Counter => ("golang", "manual_counter_total", "This is a manual counter"),
            MetricKind::Histogram => (
                "http",
                "request_seconds",
                "This is a histogram with manually selected parameters",
            ),
        };

        Self {
            kind,
            namespace: namespace.to_string(),
            name: name.to_string(),
            help: help.to_string(),
            const_labels: BTreeMap::new(),
            histogram: HistogramConfig::classic(),
        }
    }

    pub fn with_label(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.const_labels.insert(name.into(), value.into());
        self
    }

    pub fn with_histogram(mut self, histogram: HistogramConfig) -> Self {
        self.histogram = histogram;
        self
    }
}

// ─── Descriptor ──────────────────────────────────────────────────

/// Identity of the measurement as seen by scrapers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Descriptor {
    pub kind: MetricKind,
    /// Fully qualified name, `namespace_name`.
    pub name: String,
    pub help: String,
    pub const_labels: Vec<(String, String)>,
}

impl Descriptor {
    pub(crate) fn from_config(config: &MeasurementConfig) -> Result<Self, ConfigError> {
        let name = if config.namespace.is_empty() {
            config.name.clone()
        } else {
            format!("{}_{}", config.namespace, config.name)
        };
        if config.name.is_empty() || !is_valid_metric_name(&name) {
            return Err(ConfigError::InvalidMetricName(name));
        }

        for label in config.const_labels.keys() {
            let reserved = config.kind == MetricKind::Histogram && label == "le";
            if reserved || !is_valid_label_name(label) {
                return Err(ConfigError::InvalidLabelName(label.clone()));
            }
        }

        Ok(Self {
            kind: config.kind,
            name,
            help: config.help.clone(),
            const_labels: config
                .const_labels
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        })
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
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    !name.starts_with("__") && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

// ─── Snapshots ───────────────────────────────────────────────────

/// Point-in-time view of the measurement, taken under one lock.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub descriptor: Descriptor,
    pub created: DateTime<Utc>,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Value {
    Gauge { value: f64 },
    Counter { value: f64 },
    Histogram(HistogramSnapshot),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistogramSnapshot {
    /// Cumulative counts per classic bound, in increasing bound order.
    /// The implicit `+Inf` bucket equals `count`.
    pub buckets: Vec<BucketCount>,
    pub sum: f64,
    pub count: u64,
    pub native: Option<NativeSnapshot>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BucketCount {
    pub upper_bound: f64,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NativeSnapshot {
    pub schema: i32,
    pub zero_threshold: f64,
    pub zero_count: u64,
    /// Observations since the last native reset.
    pub count: u64,
    pub positive: BTreeMap<i32, u64>,
    pub negative: BTreeMap<i32, u64>,
    pub last_reset: DateTime<Utc>,
}

/// What an accepted update did, for echoing back to the operator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Applied {
    Gauge(f64),
    Counter(f64),
    Observed(f64),
}
