use chrono::{DateTime, Utc};

use super::native::NativeBuckets;
use super::types::{BucketCount, HistogramConfig, HistogramSnapshot};
use crate::error::ConfigError;

/// Classic cumulative buckets plus optional native buckets. Every field is
/// updated together by `observe`, under the measurement's lock.
pub(crate) struct HistogramState {
    bounds: Vec<f64>,
    cumulative: Vec<u64>,
    sum: f64,
    count: u64,
    native: Option<NativeBuckets>,
}

impl HistogramState {
    pub(crate) fn new(config: &HistogramConfig, now: DateTime<Utc>) -> Result<Self, ConfigError> {
        if config.buckets.is_none() && config.native.is_none() {
            return Err(ConfigError::NoHistogramType);
        }

        let bounds = config.buckets.clone().unwrap_or_default();
        validate_bounds(&bounds)?;

        let native = match &config.native {
            Some(native) => {
                if !native.bucket_factor.is_finite() || native.bucket_factor <= 1.0 {
                    return Err(ConfigError::InvalidBucketFactor(native.bucket_factor));
                }
                if native.max_buckets == 0 {
                    return Err(ConfigError::ZeroMaxBuckets);
                }
                Some(NativeBuckets::new(native.clone(), now))
            }
            None => None,
        };

        Ok(Self {
            cumulative: vec![0; bounds.len()],
            bounds,
            sum: 0.0,
            count: 0,
            native,
        })
    }

    pub(crate) fn observe(&mut self, value: f64, now: DateTime<Utc>) {
        // Bounds are sorted, so every bucket from the first one that can
        // hold the value onwards is incremented.
        let first = self.bounds.partition_point(|bound| *bound < value);
        for count in &mut self.cumulative[first..] {
            *count += 1;
        }

        self.sum += value;
        self.count += 1;

        if let Some(native) = &mut self.native {
            native.observe(value, now);
        }
    }

    pub(crate) fn snapshot(&self) -> HistogramSnapshot {
        HistogramSnapshot {
            buckets: self
                .bounds
                .iter()
                .zip(&self.cumulative)
                .map(|(&upper_bound, &count)| BucketCount { upper_bound, count })
                .collect(),
            sum: self.sum,
            count: self.count,
            native: self.native.as_ref().map(NativeBuckets::snapshot),
        }
    }
}

pub(crate) fn validate_bounds(bounds: &[f64]) -> Result<(), ConfigError> {
    if let Some(bad) = bounds.iter().find(|bound| !bound.is_finite()) {
        return Err(ConfigError::NonFiniteBucket(*bad));
    }

    match bounds.windows(2).find(|pair| pair[0] >= pair[1]) {
        Some(pair) => Err(ConfigError::UnorderedBuckets {
            prev: pair[0],
            next: pair[1],
        }),
        None => Ok(()),
    }
}
