// ── Scheduler ──
//
// The one timer capability of the core. Every delayed or periodic action
// (probe interval, connect debounce, heartbeat, reconnect) goes through
// here, so a paused Tokio clock drives all of them deterministically and a
// single root token stops them all.

use std::future::Future;
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Spawns cancellable one-shot and repeating timers.
#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    root: CancellationToken,
}

/// Handle to a scheduled timer. Cancelling or dropping it stops the timer.
///
/// Once a one-shot timer has fired, its task runs to completion even if the
/// handle is dropped while it runs.
#[derive(Debug)]
#[must_use = "dropping a TimerHandle cancels the timer"]
pub struct TimerHandle {
    token: CancellationToken,
}

impl TimerHandle {
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `task` once after `delay`.
    pub fn schedule_once<F, Fut>(&self, delay: Duration, task: F) -> TimerHandle
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let token = self.root.child_token();
        let cancel = token.clone();
        tokio::spawn(async move {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {}
                () = tokio::time::sleep(delay) => task().await,
            }
        });
        TimerHandle { token }
    }

    /// Run `task` every `period`, first after one full period.
    pub fn schedule_repeating<F>(&self, period: Duration, mut task: F) -> TimerHandle
    where
        F: FnMut() + Send + 'static,
    {
        let token = self.root.child_token();
        let cancel = token.clone();
        tokio::spawn(async move {
            let mut ticks = tokio::time::interval_at(Instant::now() + period, period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    _ = ticks.tick() => task(),
                }
            }
        });
        TimerHandle { token }
    }

    /// Token that is cancelled when the scheduler shuts down. Long-running
    /// loops owned by the core hang off it too.
    pub fn child_token(&self) -> CancellationToken {
        self.root.child_token()
    }

    /// Cancel every timer created by this scheduler, now and in future.
    pub fn shutdown(&self) {
        self.root.cancel();
    }

    pub fn is_shut_down(&self) -> bool {
        self.root.is_cancelled()
    }
}
