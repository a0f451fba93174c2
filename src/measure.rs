//! Measurement outcomes.
//!
//! Every stage between the command runner and the result table passes an
//! [`Outcome`] instead of a sentinel, so "measured zero" and "failed to
//! measure" stay distinguishable until the row is written.

use std::time::Duration;

use thiserror::Error;

use crate::exec::{CommandOutput, ExecError};
use crate::probes::ProbeError;
use crate::storage::schema::Status;
use crate::throughput::ThroughputError;

/// Why a measurement produced no usable value.
#[derive(Debug, Error)]
pub enum MeasureError {
    #[error(transparent)]
    Exec(#[from] ExecError),

    #[error("command produced no output (exit code {exit_code:?})")]
    EmptyOutput { exit_code: Option<i32> },

    #[error("command exited with code {exit_code:?}")]
    NonZeroExit { exit_code: Option<i32> },

    #[error("throughput output not understood: {0}")]
    Throughput(#[from] ThroughputError),

    #[error("latency output not understood: {0}")]
    Latency(#[from] ProbeError),

    #[error("task did not finish within {}s", .after.as_secs())]
    TimedOut { after: Duration },

    #[error("task crashed: {0}")]
    TaskCrashed(String),
}

/// Result of one measurement.
pub type Outcome<T = f64> = Result<T, MeasureError>;

/// Output worth parsing: launched fine and printed something.
///
/// A non-zero exit is tolerated here; ping exits 1 on partial loss and still
/// prints a usable summary.
pub fn require_output(output: CommandOutput) -> Outcome<CommandOutput> {
    if output.is_empty() {
        return Err(MeasureError::EmptyOutput {
            exit_code: output.exit_code,
        });
    }
    Ok(output)
}

/// Completed iff the command launched and exited with status 0.
pub fn completion(outcome: &Outcome<CommandOutput>) -> Status {
    match outcome {
        Ok(output) if output.success() => Status::Completed,
        _ => Status::Failed,
    }
}

/// Turn a finished command into a pass/fail outcome.
pub fn require_success(output: CommandOutput) -> Outcome<CommandOutput> {
    if output.success() {
        Ok(output)
    } else {
        Err(MeasureError::NonZeroExit {
            exit_code: output.exit_code,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output(stdout: &str, exit_code: Option<i32>) -> CommandOutput {
        CommandOutput {
            stdout: stdout.to_string(),
            stderr: String::new(),
            exit_code,
        }
    }

    #[test]
    fn test_require_output_rejects_silence() {
        assert!(matches!(
            require_output(output("", Some(0))),
            Err(MeasureError::EmptyOutput { exit_code: Some(0) })
        ));
        assert!(require_output(output("rtt", Some(1))).is_ok());
    }

    #[test]
    fn test_completion_follows_exit_status() {
        assert_eq!(completion(&Ok(output("", Some(0)))), Status::Completed);
        assert_eq!(completion(&Ok(output("lots", Some(1)))), Status::Failed);
        assert_eq!(completion(&Ok(output("", None))), Status::Failed);
        assert_eq!(
            completion(&Err(MeasureError::TimedOut {
                after: Duration::from_secs(30)
            })),
            Status::Failed
        );
    }

    #[test]
    fn test_require_success() {
        assert!(require_success(output("", Some(0))).is_ok());
        assert!(matches!(
            require_success(output("", Some(2))),
            Err(MeasureError::NonZeroExit { exit_code: Some(2) })
        ));
    }
}
