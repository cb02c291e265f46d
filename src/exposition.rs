//! OpenMetrics exposition of the measurement through `prometheus_client`.
//!
//! The measurement keeps its own state; a custom [`Collector`] copies a
//! snapshot out on every scrape and hands it to the crate's text encoder.

use std::fmt;
use std::sync::Arc;

use prometheus_client::collector::Collector;
use prometheus_client::encoding::{text, DescriptorEncoder, EncodeMetric, MetricEncoder, NoLabelSet};
use prometheus_client::metrics::MetricType;
use prometheus_client::registry::Registry;

use crate::measurement::{Descriptor, HistogramSnapshot, Measurement, MetricKind, Value};

pub const CONTENT_TYPE: &str = "application/openmetrics-text; version=1.0.0; charset=utf-8";

/// Builds a registry whose only collector is `measurement`.
pub fn registry(measurement: Arc<Measurement>) -> Registry {
    let mut registry = Registry::default();
    registry.register_collector(Box::new(MeasurementCollector { measurement }));
    registry
}

/// Encodes everything in `registry`, `# EOF` included.
pub fn encode(registry: &Registry) -> Result<String, fmt::Error> {
    let mut buffer = String::new();
    text::encode(&mut buffer, registry)?;
    Ok(buffer)
}

struct MeasurementCollector {
    measurement: Arc<Measurement>,
}

impl fmt::Debug for MeasurementCollector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MeasurementCollector")
            .field("name", &self.measurement.descriptor().name)
            .finish()
    }
}

impl Collector for MeasurementCollector {
    fn encode(&self, mut encoder: DescriptorEncoder) -> Result<(), fmt::Error> {
        let snapshot = self.measurement.snapshot();
        let descriptor = &snapshot.descriptor;
        let help = escape_help(&descriptor.help);

        let mut metric_encoder = encoder.encode_descriptor(
            family_name(descriptor),
            &help,
            None,
            snapshot.value.metric_type(),
        )?;

        // An empty family would still be written as `{}`.
        if descriptor.const_labels.is_empty() {
            snapshot.value.encode(metric_encoder)
        } else {
            snapshot
                .value
                .encode(metric_encoder.encode_family(&descriptor.const_labels)?)
        }
    }
}

impl EncodeMetric for Value {
    fn encode(&self, mut encoder: MetricEncoder) -> Result<(), fmt::Error> {
        match self {
            Value::Gauge { value } => encoder.encode_gauge(value),
            Value::Counter { value } => encoder.encode_counter::<NoLabelSet, _, u64>(value, None),
            Value::Histogram(histogram) => encoder.encode_histogram::<NoLabelSet>(
                histogram.sum,
                histogram.count,
                &bucket_increments(histogram),
                None,
            ),
        }
    }

    fn metric_type(&self) -> MetricType {
        match self {
            Value::Gauge { .. } => MetricType::Gauge,
            Value::Counter { .. } => MetricType::Counter,
            Value::Histogram(_) => MetricType::Histogram,
        }
    }
}

/// The encoder appends `_total` to counter samples itself.
fn family_name(descriptor: &Descriptor) -> &str {
    match descriptor.kind {
        MetricKind::Counter => descriptor
            .name
            .strip_suffix("_total")
            .unwrap_or(&descriptor.name),
        _ => &descriptor.name,
    }
}

fn escape_help(help: &str) -> String {
    help.replace('\\', "\\\\").replace('\n', "\\n")
}

/// Per-bucket counts, closed by the `+Inf` bucket. The encoder sums them
/// back up and writes `f64::MAX` as `+Inf`.
fn bucket_increments(histogram: &HistogramSnapshot) -> Vec<(f64, u64)> {
    let mut increments = Vec::with_capacity(histogram.buckets.len() + 1);
    let mut previous = 0;
    for bucket in &histogram.buckets {
        increments.push((bucket.upper_bound, bucket.count - previous));
        previous = bucket.count;
    }
    increments.push((f64::MAX, histogram.count - previous));
    increments
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::measurement::{HistogramConfig, MeasurementConfig, NativeConfig};

    fn scrape(config: MeasurementConfig, inputs: &[&str]) -> String {
        let measurement = Arc::new(Measurement::new(config).unwrap());
        for input in inputs {
            measurement.update(input).unwrap();
        }
        encode(&registry(measurement)).unwrap()
    }

    #[test]
    fn gauge_exposition() {
        let output = scrape(
            MeasurementConfig::new(MetricKind::Gauge)
                .with_label("address", "0.0.0.0")
                .with_label("port", "5001"),
            &["17", "+0.5"],
        );

        assert!(output.contains("# HELP golang_manual_gauge This is my manual gauge"));
        assert!(output.contains("# TYPE golang_manual_gauge gauge\n"));
        assert!(output.contains("golang_manual_gauge{address=\"0.0.0.0\",port=\"5001\"} 17.5\n"));
        assert!(output.ends_with("# EOF\n"));
    }

    #[test]
    fn unlabelled_gauge_has_no_braces() {
        let output = scrape(MeasurementConfig::new(MetricKind::Gauge), &["-2"]);
        assert!(output.contains("\ngolang_manual_gauge -2.0\n"), "{output}");
    }

    #[test]
    fn counter_family_moves_total_to_the_sample() {
        let output = scrape(
            MeasurementConfig::new(MetricKind::Counter).with_label("port", "5001"),
            &["3", "-8"],
        );

        assert!(output.contains("# TYPE golang_manual_counter counter\n"));
        assert!(output.contains("golang_manual_counter_total{port=\"5001\"} 2.0\n"));
        assert!(!output.contains("_total_total"));
    }

    #[test]
    fn histogram_exposition() {
        let config = MeasurementConfig::new(MetricKind::Histogram)
            .with_label("port", "5001")
            .with_histogram(HistogramConfig {
                buckets: Some(vec![1.0, 10.0, 100.0]),
                native: None,
            });
        let output = scrape(config, &["5", "1000", "0.5"]);

        assert!(output.contains("# TYPE http_request_seconds histogram\n"));
        assert_eq!(bucket_line(&output, "1.0"), Some("1"));
        assert_eq!(bucket_line(&output, "10.0"), Some("2"));
        assert_eq!(bucket_line(&output, "100.0"), Some("2"));
        assert_eq!(bucket_line(&output, "+Inf"), Some("3"));
        assert!(output.contains("http_request_seconds_count{port=\"5001\"} 3\n"));
        assert!(output.contains("http_request_seconds_sum{port=\"5001\"} 1005.5\n"));
    }

    /// Value of the bucket sample carrying `le`, whatever the label order.
    fn bucket_line<'a>(output: &'a str, le: &str) -> Option<&'a str> {
        let le = format!("le=\"{le}\"");
        output
            .lines()
            .filter(|line| line.starts_with("http_request_seconds_bucket{"))
            .find(|line| line.contains(&le))
            .and_then(|line| line.rsplit(' ').next())
    }

    #[test]
    fn native_only_histogram_still_has_inf_bucket() {
        let config = MeasurementConfig::new(MetricKind::Histogram).with_histogram(HistogramConfig {
            buckets: None,
            native: Some(NativeConfig::default()),
        });
        let output = scrape(config, &["0.2", "3"]);

        assert!(output.contains("http_request_seconds_bucket{le=\"+Inf\"} 2\n"), "{output}");
        assert_eq!(
            output.matches("http_request_seconds_bucket").count(),
            1,
            "{output}"
        );
    }

    #[test]
    fn increments_undo_the_cumulative_counts() {
        let measurement = Measurement::new(
            MeasurementConfig::new(MetricKind::Histogram).with_histogram(HistogramConfig {
                buckets: Some(vec![1.0, 10.0]),
                native: None,
            }),
        )
        .unwrap();
        for input in ["0.5", "0.7", "5", "50"] {
            measurement.update(input).unwrap();
        }

        let Value::Histogram(histogram) = measurement.snapshot().value else {
            panic!("not a histogram");
        };
        assert_eq!(
            bucket_increments(&histogram),
            vec![(1.0, 2), (10.0, 1), (f64::MAX, 1)]
        );
    }

    #[test]
    fn help_newlines_are_escaped() {
        assert_eq!(escape_help("two\nlines \\ here"), "two\\nlines \\\\ here");
    }
}
