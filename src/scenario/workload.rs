//! Concurrent mixed workload: several transfers at once over the same link.
//!
//! Each task runs on its own tokio task and owns its result; the coordinator
//! reads them only after every wait decision is final. Tasks still running at
//! the shared deadline are aborted, which kills their process groups.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::config::CommandSet;
use crate::exec::{CommandOutput, ExecError, Executor};
use crate::measure::{completion, MeasureError, Outcome};
use crate::storage::schema::{Metric, Value};
use crate::throughput;

/// One named command launched as part of the workload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkloadTask {
    pub metric: Metric,
    pub command: String,
}

/// Outcome of one task after the wait phase.
#[derive(Debug)]
pub struct TaskResult {
    pub metric: Metric,
    pub outcome: Outcome<CommandOutput>,
}

impl TaskResult {
    /// Throughput tasks record the measured rate; the rest record
    /// Completed/Failed.
    pub fn into_value(self) -> Value {
        let metric = self.metric;
        if metric.is_status() {
            if let Err(e) = &self.outcome {
                warn!(task = %metric, error = %e, "workload task failed");
            }
            return Value::Status(completion(&self.outcome));
        }

        match self.outcome.and_then(throughput::rate_from_output) {
            Ok(rate) => Value::number(rate),
            Err(e) => {
                warn!(task = %metric, error = %e, "workload task produced no measurement");
                Value::Missing
            }
        }
    }
}

/// The standard mix: upload, download, video stream and a TCP throughput run.
pub fn default_tasks(commands: &CommandSet) -> Vec<WorkloadTask> {
    [
        (Metric::FileTransferUpload, &commands.file_transfer_upload),
        (Metric::FileTransferDownload, &commands.file_transfer_download),
        (Metric::VideoStreaming, &commands.video_streaming),
        (Metric::ThroughputTcp, &commands.throughput_tcp),
    ]
    .into_iter()
    .map(|(metric, command)| WorkloadTask {
        metric,
        command: command.clone(),
    })
    .collect()
}

/// Deadline used when `timeout` does not fit in an `Instant`: about 30 years.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Launch every task at once and wait at most `timeout` for all of them.
///
/// The deadline is shared: every task must finish within `timeout` of
/// launch. A task that finishes later is recorded as timed out even if an
/// earlier task in the list used up most of the wait, so the scenario never
/// takes longer than `timeout` in total.
///
/// Returns exactly one result per task, in the order given.
pub async fn run_concurrent(
    exec: Arc<dyn Executor>,
    tasks: Vec<WorkloadTask>,
    timeout: Duration,
) -> Vec<TaskResult> {
    let now = Instant::now();
    let deadline = now
        .checked_add(timeout)
        .unwrap_or_else(|| now + FAR_FUTURE);
    info!(
        tasks = tasks.len(),
        timeout_secs = timeout.as_secs_f64(),
        "launching mixed workload"
    );

    let handles: Vec<(Metric, JoinHandle<Result<CommandOutput, ExecError>>)> = tasks
        .into_iter()
        .map(|WorkloadTask { metric, command }| {
            let exec = Arc::clone(&exec);
            let handle = tokio::spawn(async move { exec.run(&command).await });
            (metric, handle)
        })
        .collect();

    let mut results = Vec::with_capacity(handles.len());
    for (metric, mut handle) in handles {
        let waited = tokio::time::timeout_at(deadline, &mut handle).await;
        let outcome = match waited {
            Ok(Ok(Ok(output))) => Ok(output),
            Ok(Ok(Err(e))) => Err(MeasureError::from(e)),
            Ok(Err(join_err)) => Err(MeasureError::TaskCrashed(join_err.to_string())),
            Err(_) => {
                warn!(
                    task = %metric,
                    timeout_secs = timeout.as_secs_f64(),
                    "workload task did not finish in time, killing it"
                );
                handle.abort();
                // Wait for the cancelled future to drop so its process group is gone.
                let _ = handle.await;
                Err(MeasureError::TimedOut { after: timeout })
            }
        };
        results.push(TaskResult { metric, outcome });
    }

    results
}
