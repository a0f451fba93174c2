//! Results table layout and the vocabulary stored in it.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Column names, in file order.
pub const HEADER: [&str; 4] = ["Timestamp", "Scenario", "Metric", "Value"];

/// Written in place of a value that is neither a finite number nor a status.
pub const MISSING_MARKER: &str = "nan";

/// Timestamp layout used in the `Timestamp` column.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

#[derive(Debug, Error)]
#[error("unknown {kind} '{label}'")]
pub struct UnknownLabel {
    kind: &'static str,
    label: String,
}

/// A phase of the test run. Declaration order is run order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scenario {
    Baseline,
    FileTransfer,
    MixedWorkload,
    HighLatency,
}

impl Scenario {
    pub const ALL: [Scenario; 4] = [
        Scenario::Baseline,
        Scenario::FileTransfer,
        Scenario::MixedWorkload,
        Scenario::HighLatency,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Scenario::Baseline => "baseline",
            Scenario::FileTransfer => "file_transfer",
            Scenario::MixedWorkload => "mixed_workload",
            Scenario::HighLatency => "high_latency",
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scenario {
    type Err = UnknownLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Scenario::ALL
            .into_iter()
            .find(|scenario| scenario.as_str() == s)
            .ok_or_else(|| UnknownLabel {
                kind: "scenario",
                label: s.to_string(),
            })
    }
}

/// A measured quantity or a status outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    ThroughputTcp,
    ThroughputUdp,
    Latency,
    Jitter,
    FileTransferUpload,
    FileTransferDownload,
    VideoStreaming,
}

impl Metric {
    pub const ALL: [Metric; 7] = [
        Metric::ThroughputTcp,
        Metric::ThroughputUdp,
        Metric::Latency,
        Metric::Jitter,
        Metric::FileTransferUpload,
        Metric::FileTransferDownload,
        Metric::VideoStreaming,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::ThroughputTcp => "throughput_tcp",
            Metric::ThroughputUdp => "throughput_udp",
            Metric::Latency => "latency",
            Metric::Jitter => "jitter",
            Metric::FileTransferUpload => "file_transfer_upload",
            Metric::FileTransferDownload => "file_transfer_download",
            Metric::VideoStreaming => "video_streaming",
        }
    }

    /// Metrics recorded as Completed/Failed rather than a number.
    pub fn is_status(&self) -> bool {
        matches!(
            self,
            Metric::FileTransferUpload | Metric::FileTransferDownload | Metric::VideoStreaming
        )
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Metric {
    type Err = UnknownLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Metric::ALL
            .into_iter()
            .find(|metric| metric.as_str() == s)
            .ok_or_else(|| UnknownLabel {
                kind: "metric",
                label: s.to_string(),
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    Completed,
    Failed,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Completed => f.write_str("Completed"),
            Status::Failed => f.write_str("Failed"),
        }
    }
}

/// Contents of the `Value` column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Number(f64),
    Status(Status),
    Missing,
}

impl Value {
    /// Finite numbers are kept, NaN and infinities become [`Value::Missing`].
    pub fn number(value: f64) -> Self {
        if value.is_finite() {
            Value::Number(value)
        } else {
            Value::Missing
        }
    }

    /// Normalise an arbitrary string: a finite number, `Completed`, `Failed`,
    /// or missing.
    pub fn parse_lenient(raw: &str) -> Self {
        let raw = raw.trim();
        match raw {
            "Completed" => Value::Status(Status::Completed),
            "Failed" => Value::Status(Status::Failed),
            _ => raw.parse::<f64>().map(Value::number).unwrap_or(Value::Missing),
        }
    }

    pub fn is_missing(&self) -> bool {
        match self {
            Value::Number(v) => !v.is_finite(),
            Value::Status(_) => false,
            Value::Missing => true,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(v) if v.is_finite() => write!(f, "{}", v),
            Value::Status(status) => write!(f, "{}", status),
            _ => f.write_str(MISSING_MARKER),
        }
    }
}

/// One row as written by this process.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRow {
    pub timestamp: DateTime<Local>,
    pub scenario: Scenario,
    pub metric: Metric,
    pub value: Value,
}

impl ResultRow {
    pub fn now(scenario: Scenario, metric: Metric, value: Value) -> Self {
        Self {
            timestamp: Local::now(),
            scenario,
            metric,
            value,
        }
    }

    pub fn to_record(&self) -> [String; 4] {
        [
            self.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            self.scenario.to_string(),
            self.metric.to_string(),
            self.value.to_string(),
        ]
    }
}

/// One row as read back from disk.
///
/// Labels stay as strings: the table accumulates across versions and runs and
/// may hold names this build does not know.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StoredRow {
    #[serde(rename = "Timestamp")]
    pub timestamp: String,
    #[serde(rename = "Scenario")]
    pub scenario: String,
    #[serde(rename = "Metric")]
    pub metric: String,
    #[serde(rename = "Value", default)]
    pub value: String,
}

impl StoredRow {
    /// Numeric coercion: anything that is not a finite number is `None`.
    pub fn numeric(&self) -> Option<f64> {
        self.value
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
    }
}
