use thiserror::Error;

/// Rejected startup configuration. Always fatal: the process exits before
/// the listener is bound.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("unknown metric type {0}")]
    UnknownMetricType(String),
    #[error("unknown histogram type {0}")]
    UnknownHistogramType(String),
    #[error("histogram type needs to be specified")]
    NoHistogramType,
    #[error("bucket bounds must be strictly increasing, got {prev} then {next}")]
    UnorderedBuckets { prev: f64, next: f64 },
    #[error("bucket bound {0} is not finite")]
    NonFiniteBucket(f64),
    #[error("invalid bucket bound {0:?}")]
    InvalidBucket(String),
    #[error("native bucket factor must be a finite number above 1, got {0}")]
    InvalidBucketFactor(f64),
    #[error("native histogram needs at least one bucket")]
    ZeroMaxBuckets,
    #[error("invalid metric name {0:?}")]
    InvalidMetricName(String),
    #[error("invalid label name {0:?}")]
    InvalidLabelName(String),
    #[error("invalid bind address {0:?}: expected host:port")]
    InvalidBindAddress(String),
}

/// Operator input that is not a usable number. The caller drops the line
/// and prompts again.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot parse {input:?} as a number")]
pub struct ParseError {
    pub input: String,
}

impl ParseError {
    pub fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("transport failure: {0}")]
    Transport(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
