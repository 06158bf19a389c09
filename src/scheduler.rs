//! Reset boundary scheduler.
//!
//! [`ResetScheduler::schedule`] spawns one background tokio task per
//! registered callback. The task sleeps until the next boundary computed
//! from *true* now (never from the previous target, so timer drift cannot
//! accumulate), fires the callback, and re-arms. Callback failures are
//! logged and never stop the schedule.
//!
//! Each schedule is independent; there is no global timer to contend for.

use crate::resets::ResetCycle;
use chrono::Utc;
use std::future::Future;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Handle for one registered schedule. Cancelling stops future firings;
/// a timer already in flight re-checks the token before invoking the
/// callback, so a cancelled schedule never fires again.
#[derive(Debug)]
pub struct ResetHandle {
    cancel: CancellationToken,
    task: tokio::task::JoinHandle<()>,
}

impl ResetHandle {
    /// Stop this schedule. Idempotent.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Whether the schedule has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Wait for the background task to finish after [`cancel`](Self::cancel).
    pub async fn join(self) {
        self.cancel.cancel();
        let _ = self.task.await;
    }
}

/// Spawns self-re-arming boundary timers for a [`ResetCycle`].
#[derive(Debug, Clone, Copy)]
pub struct ResetScheduler {
    cycle: ResetCycle,
}

impl ResetScheduler {
    /// Create a scheduler for the given cycle.
    #[must_use]
    pub fn new(cycle: ResetCycle) -> Self {
        Self { cycle }
    }

    /// Register `callback` to run at every reset boundary until cancelled.
    ///
    /// The callback runs to completion before the next boundary is armed;
    /// an `Err` return is logged and the schedule continues.
    pub fn schedule<F, Fut>(&self, callback: F) -> ResetHandle
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send,
    {
        let cycle = self.cycle;
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let task = tokio::spawn(async move {
            info!(interval_secs = cycle.interval.as_secs(), "reset schedule armed");
            loop {
                let delay = cycle.time_until_reset(Utc::now());
                tokio::select! {
                    () = token.cancelled() => {
                        debug!("reset schedule cancelled");
                        break;
                    }
                    () = tokio::time::sleep(delay) => {
                        // A cancel may have raced the timer firing.
                        if token.is_cancelled() {
                            debug!("reset schedule cancelled at fire time");
                            break;
                        }
                        if let Err(err) = callback().await {
                            error!("reset callback failed: {err}");
                        }
                    }
                }
            }
        });

        ResetHandle { cancel, task }
    }
}
