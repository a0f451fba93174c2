//! Throughput measurement: run an iperf3 client and read the receiver rate.

pub mod iperf;

use thiserror::Error;
use tracing::{info, warn};

use crate::exec::{CommandOutput, Executor};
use crate::measure::{require_output, Outcome};

#[derive(Debug, Error)]
pub enum ThroughputError {
    #[error("no line containing '{marker}'")]
    MarkerNotFound { marker: &'static str },

    #[error("field {index} missing from '{line}'")]
    MissingField { index: usize, line: String },

    #[error("'{field}' is not a number in '{line}'")]
    InvalidNumber { field: String, line: String },
}

/// Run `command` and return the receiver bitrate it reports.
pub async fn measure(exec: &dyn Executor, command: &str) -> Outcome {
    let output = exec.run(command).await?;
    rate_from_output(output)
}

/// Extract the receiver bitrate from a finished iperf3 run.
pub fn rate_from_output(output: CommandOutput) -> Outcome {
    let output = require_output(output)?;
    if !output.success() {
        warn!(exit_code = ?output.exit_code, "iperf3 exited non-zero, parsing anyway");
    }

    let rate = iperf::parse_receiver_line(&output.stdout)?;
    info!(
        value = rate.value,
        unit = rate.unit.as_deref().unwrap_or("?"),
        "throughput measured"
    );
    Ok(rate.value)
}
