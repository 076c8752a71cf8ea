// ── Availability prober ──
//
// Periodically asks the device whether it is alive and publishes the answer
// on a watch channel. The connection manager and the state stores react to
// transitions; the CLI renders them.

use std::sync::{Arc, Mutex, PoisonError};

use boneio_api::BoneioClient;
use chrono::{DateTime, Utc};
use futures_util::future::BoxFuture;
use serde::Serialize;
use tokio::sync::{Notify, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ProbeConfig;

/// Observable availability of the device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AvailabilityState {
    pub is_available: bool,
    pub is_checking: bool,
    /// Wall-clock time of the next scheduled check.
    pub next_check_time: DateTime<Utc>,
}

impl AvailabilityState {
    /// Optimistic starting point: available until a probe says otherwise.
    pub fn optimistic() -> Self {
        Self {
            is_available: true,
            is_checking: false,
            next_check_time: Utc::now(),
        }
    }
}

/// A single liveness check against the device.
pub trait LivenessProbe: Send + Sync + 'static {
    fn probe(&self) -> BoxFuture<'_, Result<(), boneio_api::Error>>;
}

impl LivenessProbe for BoneioClient {
    fn probe(&self) -> BoxFuture<'_, Result<(), boneio_api::Error>> {
        Box::pin(async move { self.version().await.map(|_| ()) })
    }
}

/// Cheaply cloneable handle to the prober.
#[derive(Clone)]
pub struct AvailabilityProber {
    inner: Arc<ProberInner>,
}

struct ProberInner {
    probe: Arc<dyn LivenessProbe>,
    config: ProbeConfig,
    state: watch::Sender<AvailabilityState>,
    /// Serializes periodic and manual checks.
    guard: tokio::sync::Mutex<()>,
    next_deadline: Mutex<Instant>,
    rephase: Notify,
}

impl AvailabilityProber {
    pub fn new(probe: Arc<dyn LivenessProbe>, config: ProbeConfig) -> Self {
        let (state, _) = watch::channel(AvailabilityState::optimistic());
        Self {
            inner: Arc::new(ProberInner {
                probe,
                config,
                state,
                guard: tokio::sync::Mutex::new(()),
                next_deadline: Mutex::new(Instant::now()),
                rephase: Notify::new(),
            }),
        }
    }

    pub fn state(&self) -> AvailabilityState {
        self.inner.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<AvailabilityState> {
        self.inner.state.subscribe()
    }

    pub fn is_available(&self) -> bool {
        self.inner.state.borrow().is_available
    }

    /// Probe now, resetting the periodic phase. Waits for any check already
    /// in progress, then runs its own. Returns the new availability.
    pub async fn check_now(&self) -> bool {
        self.reschedule(Instant::now() + self.inner.config.interval);
        self.run_check().await
    }

    /// Spawn the periodic loop. The first check runs immediately.
    pub fn spawn(&self, cancel: CancellationToken) -> JoinHandle<()> {
        self.reschedule(Instant::now());
        let prober = self.clone();
        tokio::spawn(async move { prober.run_loop(cancel).await })
    }

    async fn run_loop(self, cancel: CancellationToken) {
        loop {
            let deadline = *self.deadline();
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                () = self.inner.rephase.notified() => continue,
                () = tokio::time::sleep_until(deadline) => {}
            }
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                _ = self.run_check() => {}
            }
        }
        debug!("availability prober stopped");
    }

    async fn run_check(&self) -> bool {
        let _guard = self.inner.guard.lock().await;
        let config = &self.inner.config;

        self.inner.state.send_modify(|s| s.is_checking = true);
        let started = Instant::now();

        let available = match tokio::time::timeout(config.timeout, self.inner.probe.probe()).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                debug!(error = %e, "liveness probe failed");
                false
            }
            Err(_) => {
                debug!(timeout_ms = config.timeout.as_millis(), "liveness probe timed out");
                false
            }
        };

        tokio::time::sleep_until(started + config.min_check_duration).await;

        let next_check_time = self.reschedule(Instant::now() + config.interval);
        let was_available = self.inner.state.borrow().is_available;
        self.inner.state.send_modify(|s| {
            s.is_available = available;
            s.is_checking = false;
            s.next_check_time = next_check_time;
        });

        match (was_available, available) {
            (true, false) => warn!("device became unavailable"),
            (false, true) => info!("device is available again"),
            _ => {}
        }
        available
    }

    /// Move the next periodic check to `deadline` and wake the loop so it
    /// re-reads it. Returns the equivalent wall-clock time.
    fn reschedule(&self, deadline: Instant) -> DateTime<Utc> {
        *self.deadline() = deadline;
        self.inner.rephase.notify_one();

        let remaining = deadline.saturating_duration_since(Instant::now());
        let next = Utc::now() + chrono::Duration::from_std(remaining).unwrap_or_default();
        self.inner.state.send_if_modified(|s| {
            let changed = s.next_check_time != next;
            s.next_check_time = next;
            changed
        });
        next
    }

    fn deadline(&self) -> std::sync::MutexGuard<'_, Instant> {
        self.inner
            .next_deadline
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::time::Duration;

    use super::*;

    /// Probe that answers instantly, up or down on demand.
    pub(crate) struct FakeProbe {
        pub up: AtomicBool,
        pub calls: AtomicU32,
        pub hang: AtomicBool,
    }

    impl FakeProbe {
        pub(crate) fn new(up: bool) -> Arc<Self> {
            Arc::new(Self {
                up: AtomicBool::new(up),
                calls: AtomicU32::new(0),
                hang: AtomicBool::new(false),
            })
        }
    }

    impl LivenessProbe for FakeProbe {
        fn probe(&self) -> BoxFuture<'_, Result<(), boneio_api::Error>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let up = self.up.load(Ordering::SeqCst);
            let hang = self.hang.load(Ordering::SeqCst);
            Box::pin(async move {
                if hang {
                    std::future::pending::<()>().await;
                }
                if up {
                    Ok(())
                } else {
                    Err(boneio_api::Error::WebSocketConnect("connection refused".into()))
                }
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn starts_optimistic() {
        let prober = AvailabilityProber::new(FakeProbe::new(false), ProbeConfig::default());
        let state = prober.state();
        assert!(state.is_available);
        assert!(!state.is_checking);
    }

    #[tokio::test(start_paused = true)]
    async fn manual_check_takes_minimum_duration() {
        let probe = FakeProbe::new(true);
        let prober = AvailabilityProber::new(probe.clone(), ProbeConfig::default());

        let started = Instant::now();
        assert!(prober.check_now().await);
        assert!(started.elapsed() >= Duration::from_secs(5));
        assert_eq!(probe.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_check_flips_availability_and_is_slow_too() {
        let probe = FakeProbe::new(false);
        let prober = AvailabilityProber::new(probe, ProbeConfig::default());

        let started = Instant::now();
        assert!(!prober.check_now().await);
        assert!(started.elapsed() >= Duration::from_secs(5));
        assert!(!prober.state().is_available);
        assert!(!prober.state().is_checking);
    }

    #[tokio::test(start_paused = true)]
    async fn hung_probe_times_out() {
        let probe = FakeProbe::new(true);
        probe.hang.store(true, Ordering::SeqCst);
        let config = ProbeConfig {
            min_check_duration: Duration::from_secs(1),
            ..ProbeConfig::default()
        };
        let prober = AvailabilityProber::new(probe, config);

        let started = Instant::now();
        assert!(!prober.check_now().await);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(5) && elapsed < Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn is_checking_visible_during_probe() {
        let prober = AvailabilityProber::new(FakeProbe::new(true), ProbeConfig::default());
        let checker = prober.clone();
        let task = tokio::spawn(async move { checker.check_now().await });

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(prober.state().is_checking);
        assert!(task.await.unwrap_or(false));
        assert!(!prober.state().is_checking);
    }

    #[tokio::test(start_paused = true)]
    async fn loop_checks_immediately_then_every_interval() {
        let probe = FakeProbe::new(true);
        let prober = AvailabilityProber::new(probe.clone(), ProbeConfig::default());
        let cancel = CancellationToken::new();
        let handle = prober.spawn(cancel.clone());

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(probe.calls.load(Ordering::SeqCst), 1);

        // Check ends at 5s, next one due at 35s.
        tokio::time::sleep(Duration::from_secs(34)).await;
        assert_eq!(probe.calls.load(Ordering::SeqCst), 1);
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(probe.calls.load(Ordering::SeqCst), 2);

        cancel.cancel();
        let _ = handle.await;
    }

    #[tokio::test(start_paused = true)]
    async fn manual_check_resets_phase_and_never_overlaps() {
        let probe = FakeProbe::new(true);
        let prober = AvailabilityProber::new(probe.clone(), ProbeConfig::default());
        let cancel = CancellationToken::new();
        let _handle = prober.spawn(cancel.clone());

        // First periodic check runs 0..5s; next due at 35s.
        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(probe.calls.load(Ordering::SeqCst), 1);

        // Manual check at 20s, done at 25s; next periodic due at 55s.
        assert!(prober.check_now().await);
        assert_eq!(probe.calls.load(Ordering::SeqCst), 2);

        tokio::time::sleep(Duration::from_secs(15)).await; // t = 40s
        assert_eq!(probe.calls.load(Ordering::SeqCst), 2);
        tokio::time::sleep(Duration::from_secs(16)).await; // t = 56s
        assert_eq!(probe.calls.load(Ordering::SeqCst), 3);

        cancel.cancel();
    }
}
