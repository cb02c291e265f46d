use std::io::{self, BufRead, Write};

use tracing::debug;

use crate::measurement::{Applied, Measurement, Snapshot, Value};

/// Prompts for one value per line until the reader is exhausted.
///
/// Lines that do not parse are dropped and the prompt is shown again.
/// Blocks on the reader, so callers run it on a dedicated thread.
pub fn run<R, W>(measurement: &Measurement, mut reader: R, mut writer: W) -> io::Result<()>
where
    R: BufRead,
    W: Write,
{
    let mut line = String::new();
    loop {
        write!(writer, "{}", prompt(&measurement.snapshot()))?;
        writer.flush()?;

        line.clear();
        if reader.read_line(&mut line)? == 0 {
            writeln!(writer)?;
            return Ok(());
        }

        match measurement.update(&line) {
            Ok(Applied::Observed(sample)) => writeln!(writer, "Observed {sample}")?,
            Ok(applied) => debug!(?applied, "applied operator input"),
            Err(err) => debug!(%err, "ignoring operator input"),
        }
    }
}

fn prompt(snapshot: &Snapshot) -> String {
    match &snapshot.value {
        Value::Gauge { value } => {
            format!("Set metric to x or add with +x (current: {value}): ")
        }
        Value::Counter { value } => {
            format!("Enter any number to increment (current: {value}): ")
        }
        Value::Histogram(histogram) => {
            format!("Make an observation (count: {}): ", histogram.count)
        }
    }
}
