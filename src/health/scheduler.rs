//! Background health scheduler.
//!
//! # States
//! ```text
//! Idle ──tick──▶ Probing ──all probes done──▶ Idle
//!   └──────────── shutdown ──────────────▶ Stopped
//! ```
//!
//! Each pass snapshots the registry, probes every backend concurrently and
//! writes each result back by address as soon as it arrives. The registry
//! lock is never held while a probe is in flight. A backend removed while its
//! probe runs is skipped; one removed and re-added under the same address
//! receives the result of the older probe until the next pass.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tokio::time::{self, MissedTickBehavior};

use crate::config::HealthCheckConfig;
use crate::health::prober::{HttpProber, Probe};
use crate::lifecycle::Shutdown;
use crate::load_balancer::{Registry, backend::Backend};
use crate::observability::metrics;

/// Scheduler lifecycle state.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle = 0,
    Probing = 1,
    Stopped = 2,
}

impl From<u8> for SchedulerState {
    fn from(val: u8) -> Self {
        match val {
            1 => SchedulerState::Probing,
            2 => SchedulerState::Stopped,
            _ => SchedulerState::Idle,
        }
    }
}

/// Outcome counts of one full probe pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassSummary {
    pub healthy: usize,
    pub unhealthy: usize,
    /// Backends removed before their result could be written back.
    pub skipped: usize,
}

/// Periodically probes every registered backend.
pub struct HealthScheduler<P = HttpProber> {
    registry: Arc<Registry>,
    prober: Arc<P>,
    interval: Duration,
    timeout: Duration,
    state: Arc<AtomicU8>,
}

impl HealthScheduler<HttpProber> {
    /// Scheduler using plain HTTP probes against `config.path`.
    pub fn new(registry: Arc<Registry>, config: &HealthCheckConfig) -> Self {
        Self::with_prober(registry, config, HttpProber::new(config.path.clone()))
    }
}

impl<P: Probe> HealthScheduler<P> {
    pub fn with_prober(registry: Arc<Registry>, config: &HealthCheckConfig, prober: P) -> Self {
        Self {
            registry,
            prober: Arc::new(prober),
            interval: config.interval(),
            timeout: config.timeout(),
            state: Arc::new(AtomicU8::new(SchedulerState::Idle as u8)),
        }
    }

    /// Override the configured interval between passes.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn state(&self) -> SchedulerState {
        self.state.load(Ordering::Acquire).into()
    }

    fn set_state(&self, state: SchedulerState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// Probe every registered backend once, concurrently.
    pub async fn check_all(&self) -> PassSummary {
        let backends = self.registry.backends();
        self.set_state(SchedulerState::Probing);

        let mut probes = JoinSet::new();
        for backend in backends {
            probes.spawn(probe_task(self.prober.clone(), backend, self.timeout));
        }

        let mut summary = PassSummary::default();
        while let Some(joined) = probes.join_next().await {
            match joined {
                Ok((backend, healthy)) => match self.apply(&backend, healthy) {
                    true if healthy => summary.healthy += 1,
                    true => summary.unhealthy += 1,
                    false => summary.skipped += 1,
                },
                Err(e) => tracing::error!(error = %e, "Health probe task failed"),
            }
        }

        self.set_state(SchedulerState::Idle);
        tracing::debug!(
            healthy = summary.healthy,
            unhealthy = summary.unhealthy,
            skipped = summary.skipped,
            "Health check pass complete"
        );
        summary
    }

    /// Probe a single backend now and write the result back.
    ///
    /// Returns the probe result, or `None` if the backend was removed meanwhile.
    pub async fn check_one(&self, backend: &Backend) -> Option<bool> {
        let healthy = self.prober.probe(backend.address(), self.timeout).await;
        self.apply(backend, healthy).then_some(healthy)
    }

    fn apply(&self, backend: &Backend, healthy: bool) -> bool {
        metrics::record_probe(backend.address(), healthy);
        match self.registry.set_healthy(backend.address(), healthy) {
            Some(previous) => {
                if previous != healthy {
                    if healthy {
                        tracing::info!(backend = %backend.address(), "Backend became healthy");
                    } else {
                        tracing::warn!(backend = %backend.address(), "Backend became unhealthy");
                    }
                }
                metrics::record_backend_health(backend.address(), healthy);
                true
            }
            None => {
                tracing::debug!(backend = %backend.address(), "Backend removed during probe, result dropped");
                false
            }
        }
    }

    /// Run until shutdown.
    ///
    /// The first scheduled pass happens one interval after start; call
    /// [`HealthScheduler::check_all`] beforehand for a startup pass, or use
    /// [`HealthScheduler::start`] which does both. Newly added backends are
    /// probed immediately. On shutdown, in-flight probes are abandoned.
    pub async fn run(self, shutdown: broadcast::Receiver<()>) {
        let additions = self.registry.subscribe_additions();
        self.run_with(shutdown, additions).await
    }

    async fn run_with(
        self,
        mut shutdown: broadcast::Receiver<()>,
        mut additions: broadcast::Receiver<Arc<Backend>>,
    ) {
        let mut additions_open = true;
        let mut out_of_band: JoinSet<(Arc<Backend>, bool)> = JoinSet::new();

        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        tracing::info!(
            interval = ?self.interval,
            timeout = ?self.timeout,
            "Health scheduler starting"
        );

        loop {
            tokio::select! {
                _ = shutdown.recv() => break,

                _ = ticker.tick() => {
                    tokio::select! {
                        _ = self.check_all() => {}
                        _ = shutdown.recv() => {
                            tracing::info!("Shutdown during health check pass, abandoning probes");
                            break;
                        }
                    }
                }

                added = additions.recv(), if additions_open => match added {
                    Ok(backend) => {
                        tracing::debug!(backend = %backend.address(), "Probing newly added backend");
                        out_of_band.spawn(probe_task(self.prober.clone(), backend, self.timeout));
                    }
                    Err(RecvError::Lagged(missed)) => {
                        tracing::warn!(missed, "Missed backend additions, running full pass");
                        tokio::select! {
                            _ = self.check_all() => {}
                            _ = shutdown.recv() => {
                                tracing::info!("Shutdown during health check pass, abandoning probes");
                                break;
                            }
                        }
                    }
                    Err(RecvError::Closed) => additions_open = false,
                },

                Some(joined) = out_of_band.join_next(), if !out_of_band.is_empty() => {
                    if let Ok((backend, healthy)) = joined {
                        self.apply(&backend, healthy);
                    }
                }
            }
        }

        out_of_band.abort_all();
        self.set_state(SchedulerState::Stopped);
        tracing::info!("Health scheduler stopped");
    }

    /// Spawn [`HealthScheduler::run`] on the current runtime.
    pub fn spawn(self, shutdown: &Shutdown) -> SchedulerHandle {
        let additions = self.registry.subscribe_additions();
        self.spawn_with(shutdown.subscribe(), additions)
    }

    /// Run one full pass, then spawn the periodic loop.
    ///
    /// Backends added while the first pass runs are still probed right away.
    pub async fn start(self, shutdown: &Shutdown) -> SchedulerHandle {
        let additions = self.registry.subscribe_additions();
        let receiver = shutdown.subscribe();

        let summary = self.check_all().await;
        tracing::info!(
            healthy = summary.healthy,
            unhealthy = summary.unhealthy,
            "Initial health check pass complete"
        );
        self.spawn_with(receiver, additions)
    }

    fn spawn_with(
        self,
        shutdown: broadcast::Receiver<()>,
        additions: broadcast::Receiver<Arc<Backend>>,
    ) -> SchedulerHandle {
        let state = self.state.clone();
        let task = tokio::spawn(self.run_with(shutdown, additions));
        SchedulerHandle { task, state }
    }
}

async fn probe_task<P: Probe>(
    prober: Arc<P>,
    backend: Arc<Backend>,
    timeout: Duration,
) -> (Arc<Backend>, bool) {
    let healthy = prober.probe(backend.address(), timeout).await;
    (backend, healthy)
}

/// Handle to a spawned scheduler.
#[derive(Debug)]
pub struct SchedulerHandle {
    task: JoinHandle<()>,
    state: Arc<AtomicU8>,
}

impl SchedulerHandle {
    pub fn state(&self) -> SchedulerState {
        self.state.load(Ordering::Acquire).into()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the loop to exit after shutdown was triggered.
    pub async fn join(self) -> Result<(), JoinError> {
        self.task.await
    }
}
