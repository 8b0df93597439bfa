// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Job Scheduler
//!
//! Each reconciler runs under its own [`JobRunner`] on a fixed interval.
//! A runner never overlaps a job with itself: a tick that arrives while the
//! previous run still holds the guard is dropped, not queued. Different jobs
//! run independently.
//!
//! ## Shutdown
//!
//! Runners stop ticking when the `CancellationToken` fires and then wait for
//! an in-flight run to finish, since runs are not cancellable mid-flight.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio::{
    sync::Mutex,
    task::JoinHandle,
    time::{Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// A periodic unit of background work.
#[async_trait]
pub trait Job: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    /// Run one pass. Failures end in the log, never in the caller.
    async fn run(&self);
}

pub struct JobRunner {
    job: Arc<dyn Job>,
    interval: Duration,
    guard: Arc<Mutex<()>>,
}

impl JobRunner {
    pub fn new(job: Arc<dyn Job>, interval: Duration) -> Self {
        Self {
            job,
            interval,
            guard: Arc::new(Mutex::new(())),
        }
    }

    /// Start a run unless the previous one is still executing.
    ///
    /// Returns the spawned run, or `None` if the tick was dropped.
    pub fn try_fire(&self) -> Option<JoinHandle<()>> {
        let Ok(guard) = self.guard.clone().try_lock_owned() else {
            debug!(job = self.job.name(), "Previous run still in progress, dropping tick");
            return None;
        };

        let job = self.job.clone();
        Some(tokio::spawn(async move {
            let _guard = guard;
            let started = Instant::now();
            job.run().await;
            debug!(
                job = job.name(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Job run finished"
            );
        }))
    }

    /// Tick until `shutdown` is cancelled.
    ///
    /// Should be spawned as a background task:
    /// ```rust,ignore
    /// tokio::spawn(runner.run(shutdown.clone()));
    /// ```
    pub async fn run(self, shutdown: CancellationToken) {
        let name = self.job.name();
        info!(
            job = name,
            interval_secs = self.interval.as_secs(),
            "Job runner starting"
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    self.try_fire();
                }
            }
        }

        // Let an in-flight run complete
        let _idle = self.guard.lock().await;
        info!(job = name, "Job runner shut down");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tokio::sync::Notify;

    use super::*;

    #[derive(Default)]
    struct GatedJob {
        runs: AtomicUsize,
        release: Notify,
    }

    #[async_trait]
    impl Job for GatedJob {
        fn name(&self) -> &'static str {
            "gated"
        }

        async fn run(&self) {
            self.runs.fetch_add(1, Ordering::SeqCst);
            self.release.notified().await;
        }
    }

    #[tokio::test]
    async fn tick_during_run_is_dropped() {
        let job = Arc::new(GatedJob::default());
        let runner = JobRunner::new(job.clone(), Duration::from_secs(60));

        let first = runner.try_fire().unwrap();
        assert!(runner.try_fire().is_none());
        assert!(runner.try_fire().is_none());

        job.release.notify_one();
        first.await.unwrap();
        assert_eq!(job.runs.load(Ordering::SeqCst), 1);

        let second = runner.try_fire().unwrap();
        job.release.notify_one();
        second.await.unwrap();
        assert_eq!(job.runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn runner_stops_on_cancellation() {
        let job = Arc::new(GatedJob::default());
        let runner = JobRunner::new(job.clone(), Duration::from_secs(3600));
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(runner.run(shutdown.clone()));

        // The first tick fires immediately
        while job.runs.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }
        shutdown.cancel();
        job.release.notify_one();

        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(job.runs.load(Ordering::SeqCst), 1);
    }
}
