//! Sparse exponential buckets.
//!
//! Bucket `k` at schema `s` covers `(2^((k-1) / 2^s), 2^(k / 2^s)]`, so each
//! bucket is `2^(2^-s)` times wider than the previous one. Negative
//! observations use the same keys on their absolute value.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use super::types::{NativeConfig, NativeSnapshot};

const MIN_SCHEMA: i32 = -4;
const MAX_SCHEMA: i32 = 8;

/// Observations with an absolute value at or below this land in the zero
/// bucket (2^-128).
pub const ZERO_THRESHOLD: f64 = 2.938_735_877_055_719e-39;

pub(crate) struct NativeBuckets {
    config: NativeConfig,
    initial_schema: i32,
    schema: i32,
    zero_count: u64,
    count: u64,
    positive: BTreeMap<i32, u64>,
    negative: BTreeMap<i32, u64>,
    last_reset: DateTime<Utc>,
}

impl NativeBuckets {
    pub(crate) fn new(config: NativeConfig, now: DateTime<Utc>) -> Self {
        let schema = pick_schema(config.bucket_factor);
        Self {
            config,
            initial_schema: schema,
            schema,
            zero_count: 0,
            count: 0,
            positive: BTreeMap::new(),
            negative: BTreeMap::new(),
            last_reset: now,
        }
    }

    pub(crate) fn observe(&mut self, value: f64, now: DateTime<Utc>) {
        self.record(value);

        if self.populated() > self.config.max_buckets {
            self.limit_buckets(value, now);
        }
    }

    pub(crate) fn snapshot(&self) -> NativeSnapshot {
        NativeSnapshot {
            schema: self.schema,
            zero_threshold: ZERO_THRESHOLD,
            zero_count: self.zero_count,
            count: self.count,
            positive: self.positive.clone(),
            negative: self.negative.clone(),
            last_reset: self.last_reset,
        }
    }

    fn record(&mut self, value: f64) {
        self.count += 1;

        if value.abs() <= ZERO_THRESHOLD {
            self.zero_count += 1;
            return;
        }

        let key = bucket_key(value.abs(), self.schema);
        let buckets = if value > 0.0 {
            &mut self.positive
        } else {
            &mut self.negative
        };
        *buckets.entry(key).or_insert(0) += 1;
    }

    fn populated(&self) -> usize {
        self.positive.len() + self.negative.len()
    }

    /// `latest` is the observation that overflowed the limit. A reset
    /// records it again so the fresh buckets start out holding it.
    fn limit_buckets(&mut self, latest: f64, now: DateTime<Utc>) {
        if self.reset_due(now) {
            self.reset(now);
            self.record(latest);
            return;
        }

        while self.populated() > self.config.max_buckets && self.schema > MIN_SCHEMA {
            self.halve_resolution();
        }
    }

    fn reset_due(&self, now: DateTime<Utc>) -> bool {
        let interval = self.config.min_reset_interval;
        if interval.is_zero() {
            return false;
        }

        (now - self.last_reset)
            .to_std()
            .map_or(false, |age| age >= interval)
    }

    fn reset(&mut self, now: DateTime<Utc>) {
        self.schema = self.initial_schema;
        self.zero_count = 0;
        self.count = 0;
        self.positive.clear();
        self.negative.clear();
        self.last_reset = now;
    }

    fn halve_resolution(&mut self) {
        self.schema -= 1;
        self.positive = merge_pairs(&self.positive);
        self.negative = merge_pairs(&self.negative);
    }
}

/// Coarsest schema whose growth factor does not exceed `factor`.
fn pick_schema(factor: f64) -> i32 {
    let floor = factor.log2().log2().floor();
    if floor <= -(MAX_SCHEMA as f64) {
        MAX_SCHEMA
    } else if floor >= -(MIN_SCHEMA as f64) {
        MIN_SCHEMA
    } else {
        -(floor as i32)
    }
}

fn bucket_key(abs: f64, schema: i32) -> i32 {
    let scaled = abs.log2() * 2f64.powi(schema);
    scaled.ceil() as i32
}

fn merge_pairs(buckets: &BTreeMap<i32, u64>) -> BTreeMap<i32, u64> {
    let mut merged = BTreeMap::new();
    for (&key, &count) in buckets {
        *merged.entry((key + 1).div_euclid(2)).or_insert(0) += count;
    }
    merged
}
