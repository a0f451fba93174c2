//! Shell command execution with captured output.
//!
//! Every command runs in its own process group. If the future driving a
//! command is dropped before the child exits (a timed-out workload task being
//! aborted, for instance) the whole group is killed, so no orphaned iperf3 or
//! scp keeps running behind the coordinator's back.

use std::process::Stdio;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("failed to launch `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed waiting for `{command}`: {source}")]
    Wait {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

/// Captured result of one external invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// True when the command printed nothing on stdout.
    pub fn is_empty(&self) -> bool {
        self.stdout.is_empty()
    }
}

/// Runs a pre-formatted shell command.
///
/// A non-zero exit status is reported through [`CommandOutput::exit_code`],
/// not as an error. Only launch and wait failures are errors.
#[async_trait]
pub trait Executor: Send + Sync {
    async fn run(&self, command: &str) -> Result<CommandOutput, ExecError>;
}

/// Runs commands through `sh -c`.
#[derive(Debug, Clone)]
pub struct ShellExecutor {
    shell: String,
}

impl Default for ShellExecutor {
    fn default() -> Self {
        Self {
            shell: "sh".to_string(),
        }
    }
}

#[cfg(test)]
impl ShellExecutor {
    fn with_shell(shell: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
        }
    }
}

#[async_trait]
impl Executor for ShellExecutor {
    async fn run(&self, command: &str) -> Result<CommandOutput, ExecError> {
        info!(%command, "running command");

        let mut cmd = Command::new(&self.shell);
        cmd.arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);

        let child = cmd.spawn().map_err(|source| ExecError::Spawn {
            command: command.to_string(),
            source,
        })?;

        let mut group = ProcessGroup::new(child.id());
        let output = child
            .wait_with_output()
            .await
            .map_err(|source| ExecError::Wait {
                command: command.to_string(),
                source,
            })?;
        group.disarm();

        let output = CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            exit_code: output.status.code(),
        };

        debug!(
            %command,
            exit_code = ?output.exit_code,
            stdout = %output.stdout,
            stderr = %output.stderr,
            "command finished"
        );

        Ok(output)
    }
}

/// Kills a child's process group when dropped while still armed.
struct ProcessGroup {
    pgid: Option<u32>,
}

impl ProcessGroup {
    fn new(pgid: Option<u32>) -> Self {
        Self { pgid }
    }

    fn disarm(&mut self) {
        self.pgid = None;
    }
}

impl Drop for ProcessGroup {
    fn drop(&mut self) {
        let Some(pgid) = self.pgid.take() else {
            return;
        };

        #[cfg(unix)]
        {
            // Negative pid addresses the whole group created by process_group(0).
            unsafe {
                libc::kill(-(pgid as i32), libc::SIGKILL);
            }
            debug!(pgid, "killed abandoned process group");
        }

        #[cfg(not(unix))]
        debug!(pgid, "abandoned child left to kill_on_drop");
    }
}
