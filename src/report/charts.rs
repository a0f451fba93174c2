//! One line chart per (scenario, metric).

use std::path::{Path, PathBuf};

use plotters::prelude::*;
use tracing::{debug, info, warn};

use super::{group_rows, ReportError};
use crate::storage::schema::StoredRow;

const CHART_SIZE: (u32, u32) = (800, 600);

/// Headroom above the largest value.
const Y_HEADROOM: f64 = 1.2;

/// Numeric samples of one (scenario, metric) pair, in file order.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub scenario: String,
    pub metric: String,
    pub values: Vec<f64>,
}

impl Series {
    /// `{scenario}_{metric}.svg`, with each label reduced to a safe file-name
    /// component since the table may hold arbitrary strings.
    pub fn file_name(&self) -> String {
        format!(
            "{}_{}.svg",
            file_component(&self.scenario),
            file_component(&self.metric)
        )
    }

    fn y_upper(&self) -> f64 {
        let max = self.values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if max > 0.0 {
            max * Y_HEADROOM
        } else {
            1.0
        }
    }
}

/// Keep ASCII alphanumerics, `-`, `_` and inner dots; everything else,
/// path separators and leading dots included, becomes `_`.
fn file_component(label: &str) -> String {
    let mut leading = true;
    label
        .chars()
        .map(|c| {
            let keep = c.is_ascii_alphanumeric() || c == '-' || c == '_' || (c == '.' && !leading);
            leading &= c == '.';
            if keep {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Coerce values to numbers, drop everything that is not a finite number,
/// and group what is left. Groups with no numeric rows disappear.
pub fn numeric_series(rows: &[StoredRow]) -> Vec<Series> {
    group_rows(rows)
        .into_iter()
        .filter_map(|group| {
            let values: Vec<f64> = group.rows.iter().filter_map(|row| row.numeric()).collect();
            (!values.is_empty()).then(|| Series {
                scenario: group.scenario.to_string(),
                metric: group.metric.to_string(),
                values,
            })
        })
        .collect()
}

/// Render every series into `chart_dir`, overwriting existing files.
///
/// A series that fails to render is logged and skipped; the rest are still
/// drawn. Only an unusable `chart_dir` is an error.
pub fn render_charts(rows: &[StoredRow], chart_dir: &Path) -> Result<Vec<PathBuf>, ReportError> {
    std::fs::create_dir_all(chart_dir).map_err(|source| ReportError::ChartDir {
        path: chart_dir.to_path_buf(),
        source,
    })?;

    let mut written = Vec::new();
    for series in numeric_series(rows) {
        let path = chart_dir.join(series.file_name());
        match render_series(&series, &path) {
            Ok(()) => {
                debug!(path = %path.display(), samples = series.values.len(), "chart written");
                written.push(path);
            }
            Err(e) => warn!(
                scenario = %series.scenario,
                metric = %series.metric,
                error = %e,
                "chart skipped"
            ),
        }
    }

    info!(charts = written.len(), dir = %chart_dir.display(), "visualization complete");
    Ok(written)
}

/// Draw `series` as a line chart (value vs. iteration) at `path`.
pub fn render_series(series: &Series, path: &Path) -> Result<(), ReportError> {
    let render_err = |e: &dyn std::fmt::Display| ReportError::Render {
        path: path.to_path_buf(),
        message: e.to_string(),
    };

    let root = SVGBackend::new(path, CHART_SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(|e| render_err(&e))?;

    let x_upper = series.values.len().saturating_sub(1).max(1) as f64;
    let y_upper = series.y_upper();

    let mut chart = ChartBuilder::on(&root)
        .caption(
            format!("{} - {}", series.scenario, series.metric),
            ("sans-serif", 24).into_font(),
        )
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(0.0..x_upper, 0.0..y_upper)
        .map_err(|e| render_err(&e))?;

    chart
        .configure_mesh()
        .x_desc("Iterations")
        .y_desc(series.metric.as_str())
        .draw()
        .map_err(|e| render_err(&e))?;

    let points: Vec<(f64, f64)> = series
        .values
        .iter()
        .enumerate()
        .map(|(i, v)| (i as f64, *v))
        .collect();

    chart
        .draw_series(LineSeries::new(points.iter().copied(), &BLUE))
        .map_err(|e| render_err(&e))?;
    chart
        .draw_series(
            points
                .iter()
                .map(|&point| Circle::new(point, 3, BLUE.filled())),
        )
        .map_err(|e| render_err(&e))?;

    root.present().map_err(|e| render_err(&e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(scenario: &str, metric: &str, value: &str) -> StoredRow {
        StoredRow {
            timestamp: "2026-01-01 00:00:00.000000".to_string(),
            scenario: scenario.to_string(),
            metric: metric.to_string(),
            value: value.to_string(),
        }
    }

    #[test]
    fn test_numeric_series_drops_missing_and_status_rows() {
        let rows = vec![
            row("baseline", "latency", "12.5"),
            row("baseline", "latency", "nan"),
            row("file_transfer", "file_transfer_upload", "Completed"),
            row("baseline", "latency", "13.5"),
            row("baseline", "throughput_tcp", "abc"),
        ];
        let series = numeric_series(&rows);
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].values, [12.5, 13.5]);
        assert_eq!(series[0].file_name(), "baseline_latency.svg");
    }

    #[test]
    fn test_file_name_stays_inside_chart_dir() {
        let series = |scenario: &str, metric: &str| Series {
            scenario: scenario.into(),
            metric: metric.into(),
            values: vec![1.0],
        };
        assert_eq!(series("old/run", "latency").file_name(), "old_run_latency.svg");
        assert_eq!(series("../x", "a\\b").file_name(), "___x_a_b.svg");
        assert_eq!(series("v1.2", "jitter").file_name(), "v1.2_jitter.svg");
        assert_eq!(
            series("high_latency", "throughput_tcp").file_name(),
            "high_latency_throughput_tcp.svg"
        );
    }

    #[test]
    fn test_y_upper_has_headroom() {
        let series = Series {
            scenario: "baseline".into(),
            metric: "latency".into(),
            values: vec![5.0, 10.0],
        };
        assert!((series.y_upper() - 12.0).abs() < 1e-9);

        let flat = Series {
            values: vec![0.0, 0.0],
            ..series
        };
        assert_eq!(flat.y_upper(), 1.0);
    }

    #[test]
    fn test_render_single_sample() {
        let dir = tempfile::tempdir().unwrap();
        let series = Series {
            scenario: "high_latency".into(),
            metric: "jitter".into(),
            values: vec![3.2],
        };
        let path = dir.path().join(series.file_name());
        render_series(&series, &path).unwrap();

        let svg = std::fs::read_to_string(&path).unwrap();
        assert!(svg.starts_with("<svg"));
        assert!(svg.contains("high_latency - jitter"));
    }
}
