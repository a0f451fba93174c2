//! Per-(scenario, metric) statistics over the whole table.

use serde::Serialize;

use super::group_rows;
use crate::storage::schema::StoredRow;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupSummary {
    pub scenario: String,
    pub metric: String,
    /// Rows with a finite numeric value.
    pub samples: usize,
    /// Rows without one: the missing marker, `Completed`/`Failed`, or junk.
    pub missing: usize,
    pub min: Option<f64>,
    pub mean: Option<f64>,
    pub max: Option<f64>,
    pub last: Option<f64>,
    /// Most recent non-numeric value, for status metrics.
    pub last_status: Option<String>,
}

pub fn summarize(rows: &[StoredRow]) -> Vec<GroupSummary> {
    group_rows(rows)
        .into_iter()
        .map(|group| {
            let values: Vec<f64> = group.rows.iter().filter_map(|row| row.numeric()).collect();
            let samples = values.len();
            let last_status = group
                .rows
                .iter()
                .rev()
                .find(|row| row.numeric().is_none())
                .map(|row| row.value.clone());

            GroupSummary {
                scenario: group.scenario.to_string(),
                metric: group.metric.to_string(),
                samples,
                missing: group.rows.len() - samples,
                min: values.iter().copied().reduce(f64::min),
                mean: (samples > 0).then(|| values.iter().sum::<f64>() / samples as f64),
                max: values.iter().copied().reduce(f64::max),
                last: values.last().copied(),
                last_status,
            }
        })
        .collect()
}

/// Two decimals, or `-` when there is nothing to show.
pub fn format_value(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.2}", v),
        None => "-".to_string(),
    }
}

/// Render summaries as an aligned text table.
pub fn format_table(summaries: &[GroupSummary]) -> String {
    let mut out = format!(
        "{:<16} | {:<22} | {:>7} | {:>7} | {:>10} | {:>10} | {:>10} | {:>10}\n",
        "Scenario", "Metric", "Samples", "Missing", "Min", "Mean", "Max", "Last"
    );
    out.push_str(&format!(
        "{:-<16}-|-{:-<22}-|-{:-<7}-|-{:-<7}-|-{:-<10}-|-{:-<10}-|-{:-<10}-|-{:-<10}\n",
        "", "", "", "", "", "", "", ""
    ));

    for s in summaries {
        let last = match (&s.last_status, s.samples) {
            (Some(status), 0) => status.clone(),
            _ => format_value(s.last),
        };
        out.push_str(&format!(
            "{:<16} | {:<22} | {:>7} | {:>7} | {:>10} | {:>10} | {:>10} | {:>10}\n",
            s.scenario,
            s.metric,
            s.samples,
            s.missing,
            format_value(s.min),
            format_value(s.mean),
            format_value(s.max),
            last,
        ));
    }
    out
}
