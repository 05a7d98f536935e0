//! Wake-up channel between job producers and the supervised worker pool.

use serde::Serialize;
use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::app_state::AppState;
use crate::services::queue;
use crate::services::worker::{self, BatchSummary, JobOutcome};

/// Minimum spacing between stale-claim sweeps.
const RECOVERY_INTERVAL: Duration = Duration::from_secs(60);

/// Counters describing work done by this process's pool.
#[derive(Debug, Default)]
pub struct PoolStats {
    in_flight: AtomicUsize,
    processed: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    batches: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStatsSnapshot {
    pub in_flight: usize,
    pub processed: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub batches: u64,
}

/// Decrements the in-flight count when the job finishes, however it finishes.
pub struct InFlightGuard<'a> {
    stats: &'a PoolStats,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let now = self.stats.in_flight.fetch_sub(1, Ordering::Relaxed) - 1;
        metrics::gauge!("verification_jobs_in_flight").set(now as f64);
    }
}

impl PoolStats {
    pub fn begin_job(&self) -> InFlightGuard<'_> {
        let now = self.in_flight.fetch_add(1, Ordering::Relaxed) + 1;
        metrics::gauge!("verification_jobs_in_flight").set(now as f64);
        InFlightGuard { stats: self }
    }

    pub fn record(&self, outcome: &JobOutcome) {
        self.processed.fetch_add(1, Ordering::Relaxed);
        match outcome {
            JobOutcome::Succeeded { .. } => self.succeeded.fetch_add(1, Ordering::Relaxed),
            JobOutcome::Failed { .. } => self.failed.fetch_add(1, Ordering::Relaxed),
            JobOutcome::Discarded { .. } => 0,
        };
    }

    fn record_batch(&self) {
        self.batches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> PoolStatsSnapshot {
        PoolStatsSnapshot {
            in_flight: self.in_flight.load(Ordering::Relaxed),
            processed: self.processed.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            batches: self.batches.load(Ordering::Relaxed),
        }
    }
}

/// Handle used to wake the worker pool after queueing work.
#[derive(Clone)]
pub struct Dispatcher {
    tx: mpsc::Sender<()>,
    stats: Arc<PoolStats>,
}

/// Receiving half consumed by [`WorkerPool`].
pub struct DispatchReceiver {
    rx: mpsc::Receiver<()>,
}

impl Dispatcher {
    pub fn channel() -> (Self, DispatchReceiver) {
        // Capacity 1: a pending wake-up already covers every later notify.
        let (tx, rx) = mpsc::channel(1);
        let dispatcher = Self {
            tx,
            stats: Arc::new(PoolStats::default()),
        };
        (dispatcher, DispatchReceiver { rx })
    }

    /// Request a processing pass. Returns `false` if one is already pending
    /// or the pool has stopped.
    pub fn notify(&self) -> bool {
        match self.tx.try_send(()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(())) => false,
            Err(mpsc::error::TrySendError::Closed(())) => {
                tracing::debug!("Worker pool stopped; wake-up dropped");
                false
            }
        }
    }

    pub fn stats(&self) -> &PoolStats {
        &self.stats
    }
}

impl DispatchReceiver {
    pub async fn recv(&mut self) -> Option<()> {
        self.rx.recv().await
    }
}

/// Supervised consumer that drains the queue on wake-ups and poll ticks.
pub struct WorkerPool;

impl WorkerPool {
    /// Run until `shutdown` resolves or every sender is gone.
    ///
    /// A batch in progress always finishes before the pool stops.
    pub async fn run_until<F>(state: AppState, mut receiver: DispatchReceiver, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        let mut ticker = tokio::time::interval(state.settings.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_recovery: Option<Instant> = None;

        tracing::info!(
            concurrency = state.settings.worker_concurrency,
            poll_ms = state.settings.poll_interval.as_millis() as u64,
            "Worker pool started"
        );

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("Worker pool shutting down");
                    break;
                }
                signal = receiver.recv() => {
                    if signal.is_none() {
                        tracing::info!("Dispatch channel closed; worker pool stopping");
                        break;
                    }
                }
                _ = ticker.tick() => {}
            }

            if last_recovery.map_or(true, |at| at.elapsed() >= RECOVERY_INTERVAL) {
                if let Err(e) =
                    queue::recover_stale_claims(&state.db, state.settings.stale_claim_after).await
                {
                    tracing::warn!(error = %e, "Stale claim recovery failed");
                }
                last_recovery = Some(Instant::now());
            }

            let summary = worker::run_batch(&state, state.settings.worker_concurrency).await;
            state.dispatcher.stats().record_batch();
            log_batch(&summary);
        }
    }

    /// Run forever on a background task.
    pub fn spawn(state: AppState, receiver: DispatchReceiver) -> JoinHandle<()> {
        tokio::spawn(Self::run_until(state, receiver, std::future::pending()))
    }
}

fn log_batch(summary: &BatchSummary) {
    if summary.errors > 0 {
        tracing::error!(
            processed = summary.processed,
            errors = summary.errors,
            "Verification batch stopped on persistence errors"
        );
    } else if summary.processed > 0 {
        tracing::info!(
            processed = summary.processed,
            succeeded = summary.succeeded,
            failed = summary.failed,
            "Verification batch finished"
        );
    }
}
