//! Lifecycle Supervisor
//!
//! Owns the background tasks running order lifecycles. A lifecycle that
//! panics is reaped and logged here; the event loop never sees it.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::{JoinError, JoinSet};

use crate::domain::trade::LifecycleReport;

/// Counters over every reaped lifecycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SupervisorStats {
    pub spawned: usize,
    pub completed: usize,
    pub failed: usize,
    pub panicked: usize,
    pub aborted: usize,
}

#[derive(Default)]
struct Counters {
    spawned: AtomicUsize,
    completed: AtomicUsize,
    failed: AtomicUsize,
    panicked: AtomicUsize,
    aborted: AtomicUsize,
}

#[derive(Clone, Default)]
pub struct LifecycleSupervisor {
    tasks: Arc<Mutex<JoinSet<LifecycleReport>>>,
    counters: Arc<Counters>,
}

impl LifecycleSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a lifecycle and return immediately
    pub async fn spawn<F>(&self, lifecycle: F)
    where
        F: Future<Output = LifecycleReport> + Send + 'static,
    {
        let mut tasks = self.tasks.lock().await;
        while let Some(result) = tasks.try_join_next() {
            self.record(result);
        }
        tasks.spawn(lifecycle);
        self.counters.spawned.fetch_add(1, Ordering::Relaxed);
    }

    /// Lifecycles spawned and not yet reaped
    pub async fn active(&self) -> usize {
        self.tasks.lock().await.len()
    }

    pub fn stats(&self) -> SupervisorStats {
        SupervisorStats {
            spawned: self.counters.spawned.load(Ordering::Relaxed),
            completed: self.counters.completed.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            panicked: self.counters.panicked.load(Ordering::Relaxed),
            aborted: self.counters.aborted.load(Ordering::Relaxed),
        }
    }

    /// Wait for every in-flight lifecycle. Panicked tasks are counted and
    /// left out of the returned reports.
    pub async fn drain(&self) -> Vec<LifecycleReport> {
        self.drain_until(None, std::future::pending()).await
    }

    /// `drain` bounded by `grace`; lifecycles still running afterwards are
    /// aborted.
    pub async fn drain_with_grace(&self, grace: Duration) -> Vec<LifecycleReport> {
        self.drain_until(Some(grace), std::future::pending()).await
    }

    /// Drain until every lifecycle ends, `grace` elapses or `interrupt`
    /// resolves. The last two abort whatever is still running.
    pub async fn drain_until<F>(&self, grace: Option<Duration>, interrupt: F) -> Vec<LifecycleReport>
    where
        F: Future<Output = ()>,
    {
        let mut tasks = std::mem::take(&mut *self.tasks.lock().await);
        let mut reports = Vec::with_capacity(tasks.len());
        let deadline = grace.map(|grace| tokio::time::Instant::now() + grace);
        tokio::pin!(interrupt);

        loop {
            let grace_elapsed = async {
                match deadline {
                    Some(deadline) => tokio::time::sleep_until(deadline).await,
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                next = tasks.join_next() => match next {
                    Some(result) => {
                        if let Some(report) = self.record(result) {
                            reports.push(report);
                        }
                    }
                    None => return reports,
                },
                _ = grace_elapsed => {
                    tracing::warn!(
                        "Shutdown grace period elapsed, aborting {} lifecycle(s)",
                        tasks.len()
                    );
                    break;
                }
                _ = &mut interrupt => {
                    tracing::warn!("Drain interrupted, aborting {} lifecycle(s)", tasks.len());
                    break;
                }
            }
        }

        tasks.abort_all();
        while let Some(result) = tasks.join_next().await {
            if let Some(report) = self.record(result) {
                reports.push(report);
            }
        }
        reports
    }

    fn record(&self, result: Result<LifecycleReport, JoinError>) -> Option<LifecycleReport> {
        match result {
            Ok(report) => {
                if report.is_completed() {
                    self.counters.completed.fetch_add(1, Ordering::Relaxed);
                } else {
                    self.counters.failed.fetch_add(1, Ordering::Relaxed);
                }
                tracing::debug!(
                    "Lifecycle for {} finished: {}",
                    report.intent.pair,
                    report.final_state()
                );
                Some(report)
            }
            Err(e) if e.is_panic() => {
                self.counters.panicked.fetch_add(1, Ordering::Relaxed);
                tracing::error!("Lifecycle task panicked: {}", e);
                None
            }
            Err(e) => {
                self.counters.aborted.fetch_add(1, Ordering::Relaxed);
                tracing::warn!("Lifecycle task aborted: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::trade::{LifecycleState, TradeIntent};

    fn report(state: LifecycleState) -> LifecycleReport {
        LifecycleReport {
            intent: TradeIntent::new("DOGEUSDT", 1.0, 1.0, 1.15),
            buy_order: None,
            sell_order: None,
            history: vec![LifecycleState::Pending, state],
        }
    }

    #[tokio::test]
    async fn test_drain_collects_reports() {
        let supervisor = LifecycleSupervisor::new();
        supervisor.spawn(async { report(LifecycleState::Completed) }).await;
        supervisor
            .spawn(async {
                report(LifecycleState::Failed(
                    crate::domain::trade::FailureReason::BuyRejected("x".into()),
                ))
            })
            .await;

        let reports = supervisor.drain().await;
        assert_eq!(reports.len(), 2);
        assert_eq!(
            supervisor.stats(),
            SupervisorStats { spawned: 2, completed: 1, failed: 1, panicked: 0, aborted: 0 }
        );
        assert_eq!(supervisor.active().await, 0);
    }

    #[tokio::test]
    async fn test_panic_is_contained() {
        let supervisor = LifecycleSupervisor::new();
        supervisor
            .spawn(async {
                if true {
                    panic!("exchange client blew up");
                }
                report(LifecycleState::Completed)
            })
            .await;
        supervisor.spawn(async { report(LifecycleState::Completed) }).await;

        let reports = supervisor.drain().await;
        assert_eq!(reports.len(), 1);
        assert_eq!(supervisor.stats().panicked, 1);
        assert_eq!(supervisor.stats().completed, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drain_with_grace_aborts_stragglers() {
        let supervisor = LifecycleSupervisor::new();
        supervisor
            .spawn(async {
                std::future::pending::<()>().await;
                report(LifecycleState::Completed)
            })
            .await;

        let reports = supervisor.drain_with_grace(Duration::from_secs(1)).await;
        assert!(reports.is_empty());
        assert_eq!(supervisor.stats().completed, 0);
        assert_eq!(supervisor.stats().aborted, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_interrupt_ends_unbounded_drain() {
        let supervisor = LifecycleSupervisor::new();
        supervisor.spawn(async { report(LifecycleState::Completed) }).await;
        supervisor
            .spawn(async {
                std::future::pending::<()>().await;
                report(LifecycleState::Completed)
            })
            .await;

        let started = tokio::time::Instant::now();
        let reports = supervisor
            .drain_until(None, tokio::time::sleep(Duration::from_secs(30)))
            .await;

        assert_eq!(reports.len(), 1);
        assert!(started.elapsed() >= Duration::from_secs(30));
        assert!(started.elapsed() < Duration::from_secs(31));
        assert_eq!(
            supervisor.stats(),
            SupervisorStats { spawned: 2, completed: 1, failed: 0, panicked: 0, aborted: 1 }
        );
        assert_eq!(supervisor.active().await, 0);
    }
}
