//! Latency probing via the system `ping`.

pub mod icmp;

use thiserror::Error;
use tracing::{info, warn};

use crate::exec::Executor;
use crate::measure::{require_output, Outcome};

pub use icmp::RttSummary;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("no line containing '{marker}'")]
    SummaryNotFound { marker: &'static str },

    #[error("malformed summary line '{0}'")]
    Malformed(String),

    #[error("'{field}' is not a number in '{line}'")]
    InvalidNumber { field: String, line: String },
}

/// Run `command` (a ping invocation) and return average latency and jitter.
pub async fn measure_latency(exec: &dyn Executor, command: &str) -> Outcome<RttSummary> {
    let output = require_output(exec.run(command).await?)?;
    if !output.success() {
        // ping exits 1 when some packets were lost but still prints a summary.
        warn!(exit_code = ?output.exit_code, "ping exited non-zero, parsing anyway");
    }

    let summary = icmp::parse_rtt_summary(&output.stdout)?;
    info!(
        avg_ms = summary.avg_ms,
        jitter_ms = summary.jitter_ms,
        "latency measured"
    );
    Ok(summary)
}
