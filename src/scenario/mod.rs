//! Scenario sequencing.
//!
//! Scenarios run strictly one after another in declared order. A failed
//! measurement becomes a missing or `Failed` row and never stops the run.

pub mod netem;
pub mod workload;

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{error, info, warn};

use crate::config::{CommandSet, Config, NetemConfig};
use crate::exec::Executor;
use crate::measure::{require_success, MeasureError, Outcome};
use crate::probes;
use crate::storage::schema::{Metric, Scenario, Status, Value};
use crate::storage::ResultLog;
use crate::throughput;

use self::netem::{with_network_condition, ConditionCommands};

/// Knobs the runner needs beyond the command strings.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub workload_timeout: Duration,
    pub condition: NetemConfig,
}

impl RunSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            workload_timeout: config.workload.task_timeout(),
            condition: config.high_latency.clone(),
        }
    }
}

/// Tally for one scenario.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    pub scenario: Scenario,
    pub rows: usize,
    pub missing: usize,
    pub failed: usize,
    pub storage_errors: usize,
}

impl ScenarioReport {
    fn new(scenario: Scenario) -> Self {
        Self {
            scenario,
            rows: 0,
            missing: 0,
            failed: 0,
            storage_errors: 0,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub scenarios: Vec<ScenarioReport>,
}

impl RunReport {
    pub fn total_rows(&self) -> usize {
        self.scenarios.iter().map(|s| s.rows).sum()
    }
}

pub struct ScenarioRunner {
    exec: Arc<dyn Executor>,
    commands: CommandSet,
    log: ResultLog,
    settings: RunSettings,
}

impl ScenarioRunner {
    pub fn new(
        exec: Arc<dyn Executor>,
        commands: CommandSet,
        log: ResultLog,
        settings: RunSettings,
    ) -> Self {
        Self {
            exec,
            commands,
            log,
            settings,
        }
    }

    /// Run the given scenarios in declared order, regardless of the order
    /// they are listed in.
    pub async fn run(&self, scenarios: &[Scenario]) -> RunReport {
        let mut report = RunReport::default();

        for scenario in Scenario::ALL
            .into_iter()
            .filter(|scenario| scenarios.contains(scenario))
        {
            info!(%scenario, "running scenario");
            let mut tally = ScenarioReport::new(scenario);

            match scenario {
                Scenario::Baseline => self.link_battery(scenario, &mut tally).await,
                Scenario::FileTransfer => self.file_transfer(&mut tally).await,
                Scenario::MixedWorkload => self.mixed_workload(&mut tally).await,
                Scenario::HighLatency => {
                    let commands = ConditionCommands {
                        apply: &self.commands.netem_apply,
                        revert: &self.commands.netem_revert,
                    };
                    with_network_condition(
                        self.exec.as_ref(),
                        commands,
                        &self.settings.condition,
                        self.link_battery(scenario, &mut tally),
                    )
                    .await
                }
            }

            info!(
                %scenario,
                rows = tally.rows,
                missing = tally.missing,
                failed = tally.failed,
                "scenario finished"
            );
            report.scenarios.push(tally);
        }

        report
    }

    /// TCP and UDP throughput, then latency and jitter.
    async fn link_battery(&self, scenario: Scenario, tally: &mut ScenarioReport) {
        for (metric, command) in [
            (Metric::ThroughputTcp, &self.commands.throughput_tcp),
            (Metric::ThroughputUdp, &self.commands.throughput_udp),
        ] {
            let outcome = throughput::measure(self.exec.as_ref(), command).await;
            let value = settle(scenario, metric, outcome);
            self.record(tally, metric, value);
        }

        match probes::measure_latency(self.exec.as_ref(), &self.commands.latency).await {
            Ok(summary) => {
                self.record(tally, Metric::Latency, Value::number(summary.avg_ms));
                self.record(tally, Metric::Jitter, Value::number(summary.jitter_ms));
            }
            Err(e) => {
                warn!(%scenario, error = %e, "latency measurement failed");
                self.record(tally, Metric::Latency, Value::Missing);
                self.record(tally, Metric::Jitter, Value::Missing);
            }
        }
    }

    /// Upload then download, each recorded as Completed/Failed by exit status.
    async fn file_transfer(&self, tally: &mut ScenarioReport) {
        for (metric, command) in [
            (Metric::FileTransferUpload, &self.commands.file_transfer_upload),
            (Metric::FileTransferDownload, &self.commands.file_transfer_download),
        ] {
            let outcome = self
                .exec
                .run(command)
                .await
                .map_err(MeasureError::from)
                .and_then(require_success);

            let status = match outcome {
                Ok(_) => Status::Completed,
                Err(e) => {
                    warn!(%metric, error = %e, "file transfer failed");
                    Status::Failed
                }
            };
            self.record(tally, metric, Value::Status(status));
        }
    }

    async fn mixed_workload(&self, tally: &mut ScenarioReport) {
        let tasks = workload::default_tasks(&self.commands);
        let results = workload::run_concurrent(
            Arc::clone(&self.exec),
            tasks,
            self.settings.workload_timeout,
        )
        .await;

        for result in results {
            let metric = result.metric;
            self.record(tally, metric, result.into_value());
        }
    }

    fn record(&self, tally: &mut ScenarioReport, metric: Metric, value: Value) {
        match self.log.append(tally.scenario, metric, value) {
            Ok(_) => {
                tally.rows += 1;
                if value.is_missing() {
                    tally.missing += 1;
                }
                if value == Value::Status(Status::Failed) {
                    tally.failed += 1;
                }
            }
            Err(e) => {
                tally.storage_errors += 1;
                error!(
                    scenario = %tally.scenario,
                    %metric,
                    error = %e,
                    "failed to record result"
                );
            }
        }
    }
}

/// Collapse an outcome to the value that gets stored, reporting why it is missing.
fn settle(scenario: Scenario, metric: Metric, outcome: Outcome) -> Value {
    match outcome {
        Ok(value) => Value::number(value),
        Err(e) => {
            warn!(%scenario, %metric, error = %e, "measurement failed");
            Value::Missing
        }
    }
}
