//! tunnelbench -- scenario-driven performance testing for VPN links.
//!
//! Runs throughput, latency, file-transfer and streaming tools against the far
//! end of a tunnel, appends every result to a CSV table, and renders one chart
//! per (scenario, metric).

pub mod config;
pub mod exec;
pub mod measure;
pub mod probes;
pub mod report;
pub mod scenario;
pub mod selftest;
pub mod storage;
pub mod throughput;

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::config::{CommandSet, Config};
use crate::exec::ShellExecutor;
use crate::scenario::{RunReport, RunSettings, ScenarioRunner};
use crate::storage::schema::Scenario;
use crate::storage::ResultLog;

/// Run the selected scenarios against the configured server, then render
/// charts unless `render_charts` is false.
///
/// Measurement failures are recorded, not returned; only an unusable config
/// or results table is an error. Chart rendering failures are logged.
pub async fn run_suite(
    config: &Config,
    scenarios: &[Scenario],
    render_charts: bool,
) -> Result<RunReport> {
    let commands = CommandSet::render(config).context("Failed to render command templates")?;
    let log = ResultLog::open(&config.results.path).with_context(|| {
        format!(
            "Failed to open results table {}",
            config.results.path.display()
        )
    })?;

    info!(
        server = %config.target.server,
        interface = %config.target.interface,
        results = %log.path().display(),
        "Starting test run"
    );

    let runner = ScenarioRunner::new(
        Arc::new(ShellExecutor::default()),
        commands,
        log,
        RunSettings::from_config(config),
    );
    let report = runner.run(scenarios).await;

    if render_charts {
        match report::visualize(&config.results.path, &config.results.chart_dir) {
            Ok(charts) => info!(charts = charts.len(), "Charts saved"),
            Err(e) => warn!(error = %e, "Visualization failed"),
        }
    }

    Ok(report)
}
