pub mod histogram;
pub mod input;
pub mod native;
pub mod types;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::error::{ConfigError, ParseError};
use histogram::HistogramState;

pub use input::Input;
pub use types::{
    Applied, BucketCount, BucketStrategy, Descriptor, HistogramConfig, HistogramSnapshot,
    MeasurementConfig, MetricKind, NativeConfig, NativeSnapshot, Snapshot, Value, DEFAULT_BUCKETS,
};

// ─── Public types ────────────────────────────────────────────────

/// The single exported measurement.
/// The console calls `update()`, the scrape handlers call `snapshot()`.
pub struct Measurement {
    descriptor: Descriptor,
    created: DateTime<Utc>,
    state: Mutex<State>,
}

// ─── Internal state ──────────────────────────────────────────────

enum State {
    Gauge(f64),
    Counter(f64),
    Histogram(HistogramState),
}

// ─── Measurement impl ────────────────────────────────────────────

impl Measurement {
    pub fn new(config: MeasurementConfig) -> Result<Self, ConfigError> {
        let descriptor = Descriptor::from_config(&config)?;
        let created = Utc::now();

        let state = match config.kind {
            MetricKind::Gauge => State::Gauge(0.0),
            MetricKind::Counter => State::Counter(0.0),
            MetricKind::Histogram => {
                State::Histogram(HistogramState::new(&config.histogram, created)?)
            }
        };

        Ok(Self {
            descriptor,
            created,
            state: Mutex::new(state),
        })
    }

    pub fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    pub fn kind(&self) -> MetricKind {
        self.descriptor.kind
    }

    /// Parses one operator line and applies it. On error the state is
    /// left untouched.
    pub fn update(&self, raw: &str) -> Result<Applied, ParseError> {
        let input = Input::parse(raw)?;
        self.apply(input).ok_or_else(|| ParseError::new(raw))
    }

    /// Applies an already parsed input. Returns `None` when the value is
    /// not acceptable for this kind: an infinite gauge delta or a
    /// non-finite histogram sample.
    ///
    /// Counters grow by exactly one per accepted input; the value only has
    /// to be a number.
    pub fn apply(&self, input: Input) -> Option<Applied> {
        let mut state = self.state.lock();
        match (&mut *state, input) {
            (State::Gauge(value), Input::Set(new)) => {
                *value = new;
                Some(Applied::Gauge(*value))
            }
            (State::Gauge(value), Input::Add(delta)) => {
                let sum = *value + delta;
                if !delta.is_finite() || sum.is_nan() {
                    return None;
                }
                *value = sum;
                Some(Applied::Gauge(*value))
            }
            (State::Counter(value), _) => {
                *value += 1.0;
                Some(Applied::Counter(*value))
            }
            (State::Histogram(histogram), input) => {
                let sample = input.value();
                if !sample.is_finite() {
                    return None;
                }
                histogram.observe(sample, Utc::now());
                Some(Applied::Observed(sample))
            }
        }
    }

    /// Produce a read-only snapshot for the scrape handlers.
    pub fn snapshot(&self) -> Snapshot {
        let value = match &*self.state.lock() {
            State::Gauge(value) => Value::Gauge { value: *value },
            State::Counter(value) => Value::Counter { value: *value },
            State::Histogram(histogram) => Value::Histogram(histogram.snapshot()),
        };

        Snapshot {
            descriptor: self.descriptor.clone(),
            created: self.created,
            value,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    fn measurement(kind: MetricKind) -> Measurement {
        Measurement::new(MeasurementConfig::new(kind)).unwrap()
    }

    fn histogram(bounds: &[f64]) -> Measurement {
        let config = MeasurementConfig::new(MetricKind::Histogram).with_histogram(HistogramConfig {
            buckets: Some(bounds.to_vec()),
            native: None,
        });
        Measurement::new(config).unwrap()
    }

    fn scalar(measurement: &Measurement) -> f64 {
        match measurement.snapshot().value {
            Value::Gauge { value } | Value::Counter { value } => value,
            Value::Histogram(_) => panic!("not a scalar"),
        }
    }

    fn histogram_value(measurement: &Measurement) -> HistogramSnapshot {
        match measurement.snapshot().value {
            Value::Histogram(histogram) => histogram,
            other => panic!("not a histogram: {other:?}"),
        }
    }

    #[test]
    fn gauge_starts_at_zero_and_sets() {
        let gauge = measurement(MetricKind::Gauge);
        assert_eq!(scalar(&gauge), 0.0);

        for (raw, expected) in [("3.5", 3.5), ("-12", -12.0), ("0", 0.0), ("1e-3", 0.001)] {
            assert_eq!(gauge.update(raw), Ok(Applied::Gauge(expected)));
            assert_eq!(scalar(&gauge), expected);
        }
    }

    #[test]
    fn gauge_add_round_trips() {
        let gauge = measurement(MetricKind::Gauge);
        gauge.update("7").unwrap();
        gauge.update("+5").unwrap();
        assert_eq!(scalar(&gauge), 12.0);
        gauge.update("+-5").unwrap();
        assert_eq!(scalar(&gauge), 7.0);
    }

    #[test]
    fn gauge_add_rejects_infinite_deltas() {
        let gauge = measurement(MetricKind::Gauge);
        gauge.update("2").unwrap();
        for raw in ["+inf", "+-inf", "+infinity"] {
            assert!(gauge.update(raw).is_err());
            assert_eq!(scalar(&gauge), 2.0);
        }

        // An infinite set is still allowed, but cannot be turned into NaN.
        assert_eq!(gauge.update("inf"), Ok(Applied::Gauge(f64::INFINITY)));
        assert!(gauge.update("+-inf").is_err());
        assert_eq!(scalar(&gauge), f64::INFINITY);
        assert_eq!(gauge.update("+1"), Ok(Applied::Gauge(f64::INFINITY)));
    }

    #[test]
    fn malformed_input_changes_nothing() {
        let gauge = measurement(MetricKind::Gauge);
        gauge.update("4").unwrap();
        for raw in ["abc", "", "+", "four"] {
            assert!(gauge.update(raw).is_err());
            assert_eq!(scalar(&gauge), 4.0);
        }

        let counter = measurement(MetricKind::Counter);
        assert!(counter.update("x").is_err());
        assert_eq!(scalar(&counter), 0.0);
    }

    #[test]
    fn counter_counts_accepted_lines() {
        let counter = measurement(MetricKind::Counter);
        let mut previous = 0.0;
        for raw in ["1", "-40", "junk", "+2", "0", ""] {
            let _ = counter.update(raw);
            let current = scalar(&counter);
            assert!(current >= previous);
            previous = current;
        }
        assert_eq!(scalar(&counter), 4.0);
    }

    #[test]
    fn histogram_observes_samples() {
        let histogram = histogram(&[1.0, 10.0, 100.0]);
        assert_eq!(histogram.update("5"), Ok(Applied::Observed(5.0)));
        assert_eq!(histogram.update("1000"), Ok(Applied::Observed(1000.0)));

        let snapshot = histogram_value(&histogram);
        let counts: Vec<u64> = snapshot.buckets.iter().map(|b| b.count).collect();
        assert_eq!(counts, vec![0, 1, 1]);
        assert_eq!(snapshot.count, 2);
        assert_eq!(snapshot.sum, 1005.0);
    }

    #[test]
    fn histogram_rejects_infinite_samples() {
        let histogram = histogram(&[1.0]);
        assert!(histogram.update("inf").is_err());
        assert_eq!(histogram_value(&histogram).count, 0);
    }

    #[test]
    fn unsorted_buckets_fail_construction() {
        let config = MeasurementConfig::new(MetricKind::Histogram).with_histogram(HistogramConfig {
            buckets: Some(vec![10.0, 1.0]),
            native: None,
        });
        assert!(matches!(
            Measurement::new(config),
            Err(ConfigError::UnorderedBuckets { .. })
        ));
    }

    #[test]
    fn concurrent_updates_never_tear_a_histogram() {
        let histogram = Arc::new(histogram(&[1.0, 10.0, 100.0]));
        let samples = [0.5, 5.0, 50.0, 500.0];

        let writers: Vec<_> = (0..4)
            .map(|worker| {
                let histogram = Arc::clone(&histogram);
                let sample = samples[worker];
                thread::spawn(move || {
                    for _ in 0..25 {
                        histogram.update(&sample.to_string()).unwrap();
                    }
                })
            })
            .collect();

        let reader = {
            let histogram = Arc::clone(&histogram);
            thread::spawn(move || {
                for _ in 0..200 {
                    let snapshot = histogram_value(&histogram);
                    let counts: Vec<u64> = snapshot.buckets.iter().map(|b| b.count).collect();
                    // Rebuild the per-sample tallies from the cumulative counts.
                    let below_1 = counts[0];
                    let below_10 = counts[1] - counts[0];
                    let below_100 = counts[2] - counts[1];
                    let above = snapshot.count - counts[2];
                    let expected_sum = below_1 as f64 * 0.5
                        + below_10 as f64 * 5.0
                        + below_100 as f64 * 50.0
                        + above as f64 * 500.0;
                    assert_eq!(snapshot.sum, expected_sum);
                }
            })
        };

        for writer in writers {
            writer.join().unwrap();
        }
        reader.join().unwrap();

        let snapshot = histogram_value(&histogram);
        assert_eq!(snapshot.count, 100);
        assert_eq!(snapshot.sum, 25.0 * (0.5 + 5.0 + 50.0 + 500.0));
    }
}
