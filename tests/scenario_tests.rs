//! Scenario runner against a scripted executor: no real tools, no network.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tunnelbench::config::{CommandSet, NetemConfig};
use tunnelbench::exec::{CommandOutput, ExecError, Executor};
use tunnelbench::scenario::{RunSettings, ScenarioRunner};
use tunnelbench::storage::schema::{Scenario, StoredRow};
use tunnelbench::storage::{read_rows, ResultLog};

const TCP_OUT: &str = "\
[ ID] Interval           Transfer     Bitrate         Retr
[ 5] 0.0-10.0 sec 1.17 GBytes 1.00 Gbits/sec 0 sender
[ 5] 0.0-10.0 sec 1.17 GBytes 1.00 Gbits/sec receiver";

const UDP_OUT: &str =
    "[  5]   0.00-10.00  sec  1.16 MBytes   977 Kbits/sec  0.010 ms  0/838 (0%)  receiver";

const PING_OUT: &str = "\
--- 10.8.0.1 ping statistics ---
10 packets transmitted, 10 received, 0% packet loss, time 9012ms
rtt min/avg/max/mdev = 10.1/12.5/15.0/1.2 ms";

#[derive(Clone)]
enum Reply {
    Exit { stdout: &'static str, code: i32 },
    Hang,
}

/// Answers each command from a script and remembers the call order.
/// Commands missing from the script fail to launch.
#[derive(Default)]
struct Scripted {
    replies: HashMap<&'static str, Reply>,
    calls: Mutex<Vec<String>>,
}

impl Scripted {
    fn reply(mut self, command: &'static str, stdout: &'static str, code: i32) -> Self {
        self.replies.insert(command, Reply::Exit { stdout, code });
        self
    }

    fn hang(mut self, command: &'static str) -> Self {
        self.replies.insert(command, Reply::Hang);
        self
    }

    fn healthy() -> Self {
        Self::default()
            .reply("tcp", TCP_OUT, 0)
            .reply("udp", UDP_OUT, 0)
            .reply("ping", PING_OUT, 0)
            .reply("up", "", 0)
            .reply("down", "", 0)
            .reply("video", "", 0)
            .reply("apply", "", 0)
            .reply("revert", "", 0)
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Executor for Scripted {
    async fn run(&self, command: &str) -> Result<CommandOutput, ExecError> {
        self.calls.lock().unwrap().push(command.to_string());
        match self.replies.get(command).cloned() {
            Some(Reply::Exit { stdout, code }) => Ok(CommandOutput {
                stdout: stdout.to_string(),
                stderr: String::new(),
                exit_code: Some(code),
            }),
            Some(Reply::Hang) => {
                std::future::pending::<()>().await;
                unreachable!()
            }
            None => Err(ExecError::Spawn {
                command: command.to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "not scripted"),
            }),
        }
    }
}

fn commands() -> CommandSet {
    CommandSet {
        throughput_tcp: "tcp".to_string(),
        throughput_udp: "udp".to_string(),
        latency: "ping".to_string(),
        file_transfer_upload: "up".to_string(),
        file_transfer_download: "down".to_string(),
        video_streaming: "video".to_string(),
        netem_apply: "apply".to_string(),
        netem_revert: "revert".to_string(),
    }
}

fn runner(exec: Arc<Scripted>, table: &Path, timeout: Duration) -> ScenarioRunner {
    ScenarioRunner::new(
        exec,
        commands(),
        ResultLog::open(table).unwrap(),
        RunSettings {
            workload_timeout: timeout,
            condition: NetemConfig::default(),
        },
    )
}

fn cells(rows: &[StoredRow]) -> Vec<(&str, &str, &str)> {
    rows.iter()
        .map(|r| (r.scenario.as_str(), r.metric.as_str(), r.value.as_str()))
        .collect()
}

#[tokio::test]
async fn test_baseline_records_parsed_values() {
    let dir = tempfile::tempdir().unwrap();
    let table = dir.path().join("results.csv");
    let exec = Arc::new(Scripted::healthy());

    let report = runner(Arc::clone(&exec), &table, Duration::from_secs(5))
        .run(&[Scenario::Baseline])
        .await;

    assert_eq!(report.total_rows(), 4);
    assert_eq!(exec.calls(), ["tcp", "udp", "ping"]);

    let rows = read_rows(&table).unwrap();
    let metrics: Vec<&str> = rows.iter().map(|r| r.metric.as_str()).collect();
    assert_eq!(metrics, ["throughput_tcp", "throughput_udp", "latency", "jitter"]);
    assert!(rows.iter().all(|r| r.scenario == "baseline"));

    let values: Vec<f64> = rows.iter().map(|r| r.numeric().unwrap()).collect();
    assert_eq!(values[0], 1.0);
    assert_eq!(values[1], 977.0);
    assert_eq!(values[2], 12.5);
    assert!((values[3] - 2.5).abs() < 1e-9);
}

#[tokio::test]
async fn test_scenarios_run_in_declared_order() {
    let dir = tempfile::tempdir().unwrap();
    let table = dir.path().join("results.csv");
    let exec = Arc::new(Scripted::healthy());

    let report = runner(Arc::clone(&exec), &table, Duration::from_secs(5))
        .run(&[Scenario::HighLatency, Scenario::Baseline])
        .await;

    let order: Vec<Scenario> = report.scenarios.iter().map(|s| s.scenario).collect();
    assert_eq!(order, [Scenario::Baseline, Scenario::HighLatency]);
    assert_eq!(
        exec.calls(),
        ["tcp", "udp", "ping", "apply", "tcp", "udp", "ping", "revert"]
    );
}

#[tokio::test]
async fn test_full_run_appends_every_row() {
    let dir = tempfile::tempdir().unwrap();
    let table = dir.path().join("results.csv");
    let exec = Arc::new(Scripted::healthy());

    let report = runner(exec, &table, Duration::from_secs(5))
        .run(&Scenario::ALL)
        .await;

    // 4 baseline + 2 file transfer + 4 workload + 4 high latency
    assert_eq!(report.total_rows(), 14);
    let rows = read_rows(&table).unwrap();
    assert_eq!(rows.len(), 14);

    let mut first_seen: Vec<&str> = Vec::new();
    for row in &rows {
        if !first_seen.contains(&row.scenario.as_str()) {
            first_seen.push(&row.scenario);
        }
    }
    assert_eq!(
        first_seen,
        ["baseline", "file_transfer", "mixed_workload", "high_latency"]
    );
    assert!(report
        .scenarios
        .iter()
        .all(|s| s.missing == 0 && s.failed == 0 && s.storage_errors == 0));
}

#[tokio::test]
async fn test_failed_measurements_are_recorded_as_missing() {
    let dir = tempfile::tempdir().unwrap();
    let table = dir.path().join("results.csv");
    // tcp fails to launch, udp prints nothing, ping prints no summary
    let exec = Arc::new(
        Scripted::default()
            .reply("udp", "", 1)
            .reply("ping", "ping: unknown host", 2),
    );

    let report = runner(exec, &table, Duration::from_secs(5))
        .run(&[Scenario::Baseline])
        .await;

    assert_eq!(report.scenarios[0].rows, 4);
    assert_eq!(report.scenarios[0].missing, 4);
    let rows = read_rows(&table).unwrap();
    assert!(rows.iter().all(|r| r.value == "nan" && r.numeric().is_none()));
}

#[tokio::test]
async fn test_high_latency_reverts_after_failed_measurements() {
    let dir = tempfile::tempdir().unwrap();
    let table = dir.path().join("results.csv");
    let exec = Arc::new(
        Scripted::default()
            .reply("apply", "", 0)
            .reply("revert", "", 0),
    );

    let report = runner(Arc::clone(&exec), &table, Duration::from_secs(5))
        .run(&[Scenario::HighLatency])
        .await;

    assert_eq!(report.scenarios[0].missing, 4);
    let calls = exec.calls();
    assert_eq!(calls.first().map(String::as_str), Some("apply"));
    assert_eq!(calls.last().map(String::as_str), Some("revert"));
    assert_eq!(calls.iter().filter(|c| *c == "revert").count(), 1);
}

#[tokio::test]
async fn test_high_latency_reverts_when_apply_fails() {
    let dir = tempfile::tempdir().unwrap();
    let table = dir.path().join("results.csv");
    let exec = Arc::new(
        Scripted::healthy().reply("apply", "RTNETLINK answers: File exists", 2),
    );

    let report = runner(Arc::clone(&exec), &table, Duration::from_secs(5))
        .run(&[Scenario::HighLatency])
        .await;

    assert_eq!(report.scenarios[0].rows, 4);
    assert_eq!(report.scenarios[0].missing, 0);
    assert_eq!(
        exec.calls(),
        ["apply", "tcp", "udp", "ping", "revert"]
    );
}

#[tokio::test]
async fn test_file_transfer_status_follows_exit_code() {
    let dir = tempfile::tempdir().unwrap();
    let table = dir.path().join("results.csv");
    let exec = Arc::new(
        Scripted::default()
            .reply("up", "", 0)
            .reply("down", "", 1),
    );

    let report = runner(exec, &table, Duration::from_secs(5))
        .run(&[Scenario::FileTransfer])
        .await;

    assert_eq!(report.scenarios[0].failed, 1);
    let rows = read_rows(&table).unwrap();
    assert_eq!(
        cells(&rows),
        [
            ("file_transfer", "file_transfer_upload", "Completed"),
            ("file_transfer", "file_transfer_download", "Failed"),
        ]
    );
}

#[tokio::test]
async fn test_mixed_workload_records_every_task_despite_a_hung_one() {
    let dir = tempfile::tempdir().unwrap();
    let table = dir.path().join("results.csv");
    let exec = Arc::new(Scripted::healthy().hang("video"));

    let started = Instant::now();
    let report = runner(exec, &table, Duration::from_millis(200))
        .run(&[Scenario::MixedWorkload])
        .await;
    assert!(started.elapsed() < Duration::from_secs(5));

    assert_eq!(report.scenarios[0].rows, 4);
    assert_eq!(report.scenarios[0].failed, 1);

    let rows = read_rows(&table).unwrap();
    assert_eq!(
        cells(&rows),
        [
            ("mixed_workload", "file_transfer_upload", "Completed"),
            ("mixed_workload", "file_transfer_download", "Completed"),
            ("mixed_workload", "video_streaming", "Failed"),
            ("mixed_workload", "throughput_tcp", "1"),
        ]
    );
}

#[tokio::test]
async fn test_mixed_workload_throughput_failure_is_missing() {
    let dir = tempfile::tempdir().unwrap();
    let table = dir.path().join("results.csv");
    let exec = Arc::new(Scripted::healthy().hang("tcp"));

    let report = runner(exec, &table, Duration::from_millis(200))
        .run(&[Scenario::MixedWorkload])
        .await;

    assert_eq!(report.scenarios[0].missing, 1);
    let rows = read_rows(&table).unwrap();
    assert_eq!(rows[3].metric, "throughput_tcp");
    assert_eq!(rows[3].value, "nan");
}
