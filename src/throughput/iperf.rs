//! iperf3 text-output parsing.
//!
//! iperf3 ends a client run with a sender and a receiver summary line:
//!
//! ```text
//! [  5]   0.00-10.00  sec  1.17 GBytes  1.00 Gbits/sec                  receiver
//! ```
//!
//! The receiver line is the rate that actually crossed the link.

use super::ThroughputError;

/// Token marking the receiver-side summary line.
pub const RECEIVER_MARKER: &str = "receiver";

/// Rate column when the stream id is written as `[ 5]` (two tokens).
const RATE_FIELD: usize = 6;

/// Bitrate reported on the receiver summary line.
#[derive(Debug, Clone, PartialEq)]
pub struct ReceiverRate {
    pub value: f64,
    /// Unit as printed by iperf3, e.g. `Mbits/sec`.
    pub unit: Option<String>,
}

/// Find the last receiver line and extract the bitrate and its unit.
pub fn parse_receiver_line(output: &str) -> Result<ReceiverRate, ThroughputError> {
    let line = output
        .lines()
        .rev()
        .find(|line| line.contains(RECEIVER_MARKER))
        .ok_or(ThroughputError::MarkerNotFound {
            marker: RECEIVER_MARKER,
        })?;

    let fields: Vec<&str> = line.split_whitespace().collect();
    let index = rate_index(&fields);

    let raw = fields
        .get(index)
        .ok_or_else(|| ThroughputError::MissingField {
            index,
            line: line.trim().to_string(),
        })?;

    let value = raw
        .parse::<f64>()
        .map_err(|_| ThroughputError::InvalidNumber {
            field: raw.to_string(),
            line: line.trim().to_string(),
        })?;

    Ok(ReceiverRate {
        value,
        unit: fields.get(index + 1).map(|unit| unit.to_string()),
    })
}

/// Receiver bitrate as a bare number, in whatever unit iperf3 chose.
pub fn parse_receiver_rate(output: &str) -> Result<f64, ThroughputError> {
    parse_receiver_line(output).map(|rate| rate.value)
}

/// `[ 5]` splits into two tokens while `[SUM]` or `[  10]`-style ids may not;
/// count from the token that closes the stream id.
fn rate_index(fields: &[&str]) -> usize {
    match fields.iter().position(|f| f.ends_with(']')) {
        Some(close) if fields.first().is_some_and(|f| f.starts_with('[')) => close + 5,
        _ => RATE_FIELD,
    }
}
