//! Scoped network-condition override (`tc netem`).

use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use tracing::{error, info, warn};

use crate::config::NetemConfig;
use crate::exec::Executor;

/// Commands that switch the impairment on and off.
#[derive(Debug, Clone, Copy)]
pub struct ConditionCommands<'a> {
    pub apply: &'a str,
    pub revert: &'a str,
}

/// Apply the impairment, run `body`, then revert.
///
/// The revert always runs after `body`, whether the apply succeeded or not
/// and whether `body` returns normally or panics; a panic is re-raised once
/// the interface is restored. A failed apply usually means a qdisc left over
/// from an interrupted run, so the revert clears that too.
pub async fn with_network_condition<F, T>(
    exec: &dyn Executor,
    commands: ConditionCommands<'_>,
    condition: &NetemConfig,
    body: F,
) -> T
where
    F: Future<Output = T>,
{
    let applied = apply(exec, commands.apply, condition).await;

    let result = AssertUnwindSafe(body).catch_unwind().await;

    revert(exec, commands.revert, applied).await;

    match result {
        Ok(value) => value,
        Err(panic) => std::panic::resume_unwind(panic),
    }
}

async fn apply(exec: &dyn Executor, command: &str, condition: &NetemConfig) -> bool {
    match exec.run(command).await {
        Ok(output) if output.success() => {
            info!(
                delay_ms = condition.delay_ms,
                loss_percent = condition.loss_percent,
                "network condition applied"
            );
            true
        }
        Ok(output) => {
            warn!(
                exit_code = ?output.exit_code,
                stderr = %output.stderr,
                "failed to apply network condition, link state during measurement is unknown"
            );
            false
        }
        Err(e) => {
            warn!(error = %e, "failed to apply network condition, link state during measurement is unknown");
            false
        }
    }
}

async fn revert(exec: &dyn Executor, command: &str, applied: bool) {
    match exec.run(command).await {
        Ok(output) if output.success() => info!(applied, "network condition reverted"),
        // Nothing was installed and nothing stale was found.
        Ok(output) if !applied => warn!(
            exit_code = ?output.exit_code,
            stderr = %output.stderr,
            "no network condition to revert"
        ),
        Ok(output) => error!(
            exit_code = ?output.exit_code,
            stderr = %output.stderr,
            "failed to revert network condition; interface may still be impaired"
        ),
        Err(e) => error!(
            error = %e,
            "failed to revert network condition; interface may still be impaired"
        ),
    }
}
