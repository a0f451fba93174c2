//! ping summary parsing.

use super::ProbeError;

/// Token identifying the round-trip summary line.
/// Linux prints `rtt min/avg/max/mdev = ...`, BSD/macOS `round-trip min/avg/max/stddev = ...`.
pub const SUMMARY_MARKER: &str = "min/avg/max";

/// Average latency and jitter from one ping run, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RttSummary {
    pub avg_ms: f64,
    /// Spread above the mean: `max - avg`.
    pub jitter_ms: f64,
}

/// Parse the round-trip summary out of ping's output.
///
/// Both fields come from the same line, so they are present or absent together.
pub fn parse_rtt_summary(output: &str) -> Result<RttSummary, ProbeError> {
    let line = output
        .lines()
        .find(|line| line.contains(SUMMARY_MARKER))
        .ok_or(ProbeError::SummaryNotFound {
            marker: SUMMARY_MARKER,
        })?;

    let (_, stats) = line
        .split_once('=')
        .ok_or_else(|| ProbeError::Malformed(line.trim().to_string()))?;

    let values: Vec<&str> = stats.trim().split('/').collect();
    if values.len() < 3 {
        return Err(ProbeError::Malformed(line.trim().to_string()));
    }

    let number = |raw: &str| {
        // The last field carries the unit: "1.2 ms".
        let raw = raw.split_whitespace().next().unwrap_or_default();
        raw.parse::<f64>().map_err(|_| ProbeError::InvalidNumber {
            field: raw.to_string(),
            line: line.trim().to_string(),
        })
    };

    let avg_ms = number(values[1])?;
    let max_ms = number(values[2])?;

    Ok(RttSummary {
        avg_ms,
        jitter_ms: max_ms - avg_ms,
    })
}
