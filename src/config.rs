use std::time::Duration;

use clap::Parser;

use crate::error::ConfigError;
use crate::measurement::{
    BucketStrategy, HistogramConfig, MeasurementConfig, MetricKind, NativeConfig, DEFAULT_BUCKETS,
};

pub const DEFAULT_PORT: &str = "5001";
const DEFAULT_ADDRESS: &str = "0.0.0.0";

const USERNAME_ENV: &str = "MANUAL_METRIC_USERNAME";
const PASSWORD_ENV: &str = "MANUAL_METRIC_PASSWORD";

#[derive(Debug, Parser)]
#[command(
    name = "manual-metric",
    about = "Expose one hand-driven metric for testing scrapes, dashboards and alerts"
)]
pub struct Cli {
    /// Bind address, host:port. An empty host means every interface.
    #[arg(long, default_value = ":5001")]
    pub bind: String,

    /// The type of metric to generate: counter, gauge, histogram.
    #[arg(long = "type", default_value = "gauge")]
    pub metric_type: MetricKind,

    /// Type of histogram, comma separated: classic, native.
    #[arg(long, value_delimiter = ',', default_value = "classic")]
    pub histogram_type: Vec<BucketStrategy>,

    /// Upper bounds of the classic histogram buckets.
    #[arg(long, value_delimiter = ',', default_values_t = DEFAULT_BUCKETS.to_vec())]
    pub buckets: Vec<f64>,

    #[arg(long, default_value_t = 1.1)]
    pub native_bucket_factor: f64,

    #[arg(long, default_value_t = 100)]
    pub native_max_buckets: usize,

    #[arg(long, default_value_t = 60 * 60)]
    pub native_min_reset_secs: u64,

    /// Overrides the per-type metric namespace.
    #[arg(long)]
    pub namespace: Option<String>,

    /// Overrides the per-type metric name.
    #[arg(long)]
    pub name: Option<String>,

    /// Overrides the per-type help text.
    #[arg(long)]
    pub description: Option<String>,

    /// Also increment a counter every this many seconds.
    #[arg(long)]
    pub counter_tick: Option<u64>,

    /// Basic auth username.
    #[arg(long)]
    pub username: Option<String>,

    /// Basic auth password.
    #[arg(long)]
    pub password: Option<String>,
}

/// Basic auth credentials. Only built when both halves are non-empty.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Validated startup settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub address: String,
    pub port: String,
    pub measurement: MeasurementConfig,
    pub counter_tick: Option<Duration>,
    pub credentials: Option<Credentials>,
}

impl Settings {
    /// Missing credential flags fall back to the process environment.
    pub fn from_cli(cli: Cli) -> Result<Self, ConfigError> {
        Self::from_cli_with_env(cli, |key| std::env::var(key).ok())
    }

    /// Like [`Settings::from_cli`], reading fallbacks through `env`.
    pub fn from_cli_with_env(
        cli: Cli,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let (address, port) = split_bind_address(&cli.bind)?;

        let mut measurement = MeasurementConfig::new(cli.metric_type)
            .with_label("address", address.clone())
            .with_label("port", port.clone());
        if let Some(namespace) = cli.namespace {
            measurement.namespace = namespace;
        }
        if let Some(name) = cli.name {
            measurement.name = name;
        }
        if let Some(description) = cli.description {
            measurement.help = description;
        }

        if cli.metric_type == MetricKind::Histogram {
            let native = NativeConfig {
                bucket_factor: cli.native_bucket_factor,
                max_buckets: cli.native_max_buckets,
                min_reset_interval: Duration::from_secs(cli.native_min_reset_secs),
            };
            measurement.histogram =
                HistogramConfig::from_strategies(&cli.histogram_type, cli.buckets, native)?;
        }

        let username = cli.username.or_else(|| env(USERNAME_ENV));
        let password = cli.password.or_else(|| env(PASSWORD_ENV));
        let credentials = match (username, password) {
            (Some(username), Some(password)) if !username.is_empty() && !password.is_empty() => {
                Some(Credentials { username, password })
            }
            _ => None,
        };

        Ok(Self {
            address,
            port,
            measurement,
            counter_tick: cli
                .counter_tick
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
            credentials,
        })
    }

    pub fn listen_address(&self) -> String {
        if self.address.contains(':') {
            format!("[{}]:{}", self.address, self.port)
        } else {
            format!("{}:{}", self.address, self.port)
        }
    }
}

/// Splits `host:port`, filling an empty host with the any-address and an
/// empty port with [`DEFAULT_PORT`], so both are meaningful as labels.
pub fn split_bind_address(bind: &str) -> Result<(String, String), ConfigError> {
    let invalid = || ConfigError::InvalidBindAddress(bind.to_string());

    let (host, port) = if let Some(rest) = bind.strip_prefix('[') {
        let (host, rest) = rest.split_once(']').ok_or_else(invalid)?;
        let port = rest.strip_prefix(':').ok_or_else(invalid)?;
        (host, port)
    } else {
        let (host, port) = bind.rsplit_once(':').ok_or_else(invalid)?;
        if host.contains(':') {
            return Err(invalid());
        }
        (host, port)
    };

    if !port.is_empty() && port.parse::<u16>().is_err() {
        return Err(invalid());
    }

    let host = if host.is_empty() { DEFAULT_ADDRESS } else { host };
    let port = if port.is_empty() { DEFAULT_PORT } else { port };
    Ok((host.to_string(), port.to_string()))
}
