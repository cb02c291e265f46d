use std::sync::Arc;

use prometheus_client::registry::Registry;

pub mod config;
pub mod console;
pub mod error;
pub mod exposition;
pub mod handlers;
pub mod measurement;
pub mod middleware;
pub mod server;
pub mod ticker;

pub use error::{ConfigError, Error, ParseError, Result};
pub use measurement::Measurement;

/// Shared application state available to every handler via `State<Arc<AppState>>`.
pub struct AppState {
    /// The one exported measurement; the console writes it, scrapes read it.
    pub measurement: Arc<Measurement>,
    /// Exposes `measurement` to the OpenMetrics encoder.
    pub registry: Registry,
}

impl AppState {
    pub fn new(measurement: Arc<Measurement>) -> Self {
        let registry = exposition::registry(Arc::clone(&measurement));
        Self {
            measurement,
            registry,
        }
    }
}
