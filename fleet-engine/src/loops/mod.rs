//! Autonomy and swing: the two periodic drivers that turn signals and live
//! P&L into operations through the normal create → policy → approve →
//! execute funnel. Neither loop ever bypasses `fleet_engine::policy` or the
//! operation state machine; both reuse the same `ExecutionEngine`.
//!
//! Each loop is one long-lived [`tokio::task`] selecting over a
//! [`tokio::time::interval`] and a stop signal, not a `setInterval` with an
//! `isTicking` latch — a second tick simply cannot start before the first
//! returns, because there is only one task. The latest [`LastTick`] is
//! published on a [`tokio::sync::watch`] channel the health snapshot reads.

pub mod autonomy;
pub mod swing;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// The outcome of one loop tick, surfaced to the health endpoint.
///
/// Ticks never panic or propagate an error to their caller: every failure
/// encountered mid-tick is captured into `errors` and the tick continues
/// with the next candidate.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct LastTick {
    /// When this tick ran, `None` before the first tick.
    pub ran_at: Option<DateTime<Utc>>,
    /// Ids of operations this tick drove to execution.
    pub executed_operation_ids: Vec<i64>,
    /// Human-readable failures captured during the tick, one per candidate
    /// that didn't make it to execution.
    pub errors: Vec<String>,
}

impl LastTick {
    fn starting(now: DateTime<Utc>) -> Self {
        Self {
            ran_at: Some(now),
            executed_operation_ids: Vec::new(),
            errors: Vec::new(),
        }
    }
}

/// A running loop task plus the handle used to stop it and read its health.
#[derive(Debug)]
pub struct LoopHandle {
    /// The latest published [`LastTick`].
    pub last_tick: watch::Receiver<LastTick>,
    stop: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl LoopHandle {
    /// Signal the loop to stop after its current tick, then await its exit.
    ///
    /// Per the concurrency model, a stop request is honored only at the next
    /// tick boundary; an in-flight tick always runs to completion.
    pub async fn shutdown(self) {
        let _ = self.stop.send(true);
        let _ = self.join.await;
    }
}

/// Spawn a long-lived tick loop: wait on `interval` (with a small jitter so
/// sibling loops don't fire in lockstep), run `tick_fn`, publish the result,
/// repeat until told to stop.
fn spawn_loop<F, Fut>(
    name: &'static str,
    interval: std::time::Duration,
    mut scheduler: fleet_core::Scheduler,
    mut tick_fn: F,
) -> LoopHandle
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: std::future::Future<Output = LastTick> + Send,
{
    let (tick_tx, tick_rx) = watch::channel(LastTick::default());
    let (stop_tx, mut stop_rx) = watch::channel(false);

    let join = tokio::spawn(async move {
        loop {
            let wait = scheduler.jittered_interval(interval, 0.05);
            tokio::select! {
                () = tokio::time::sleep(wait) => {}
                _ = stop_rx.changed() => {
                    if *stop_rx.borrow() {
                        tracing::info!(loop_name = name, "stop requested before tick, exiting");
                        return;
                    }
                }
            }
            if *stop_rx.borrow() {
                tracing::info!(loop_name = name, "stop requested, exiting");
                return;
            }

            tracing::debug!(loop_name = name, "tick starting");
            let outcome = tick_fn().await;
            tracing::info!(
                loop_name = name,
                executed = outcome.executed_operation_ids.len(),
                errors = outcome.errors.len(),
                "tick complete"
            );
            if tick_tx.send(outcome).is_err() {
                tracing::warn!(loop_name = name, "no health reader attached, tick result dropped");
            }
        }
    });

    LoopHandle {
        last_tick: tick_rx,
        stop: stop_tx,
        join,
    }
}
