//! Timer-driven counter increments (`--counter-tick`).

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;

use crate::measurement::{Applied, Input, Measurement};

/// Adds one to `measurement` every `period`, starting one period from now.
/// Operator input keeps counting on top of the ticks.
pub fn spawn_counter_ticker(measurement: Arc<Measurement>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        // The first tick completes immediately.
        interval.tick().await;
        loop {
            interval.tick().await;
            if let Some(Applied::Counter(value)) = measurement.apply(Input::Add(1.0)) {
                debug!(value, "counter ticked");
            }
        }
    })
}
