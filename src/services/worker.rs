//! Background job worker
//!
//! A single-consumer loop per process: a bounded ticker drives claim/execute
//! rounds against the shared queue. The busy flag suppresses reentrant
//! ticks; several processes can run a worker each, the queue's non-blocking
//! claim keeps them from double-processing.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;

use crate::{error::AppResult, services::jobs::JobsService};

pub struct JobWorker {
    jobs: JobsService,
    worker_id: String,
    poll_interval: Duration,
    busy: AtomicBool,
    shutdown: Arc<AtomicBool>,
}

impl JobWorker {
    pub fn new(jobs: JobsService, worker_id: String, poll_interval: Duration) -> Self {
        Self {
            jobs,
            worker_id,
            poll_interval,
            busy: AtomicBool::new(false),
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Get a handle for shutting down the worker
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            shutdown: self.shutdown.clone(),
        }
    }

    /// Run the worker until shutdown is signaled
    pub async fn run(self) {
        tracing::info!(worker_id = %self.worker_id, "job worker started");

        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        while !self.shutdown.load(Ordering::SeqCst) {
            ticker.tick().await;

            // Single active tick at a time.
            if self.busy.swap(true, Ordering::SeqCst) {
                continue;
            }
            if let Err(e) = self.drain().await {
                tracing::error!(worker_id = %self.worker_id, "worker tick failed: {}", e);
            }
            self.busy.store(false, Ordering::SeqCst);
        }

        tracing::info!(worker_id = %self.worker_id, "job worker shutdown");
    }

    /// Claim and execute jobs until the queue has nothing eligible
    async fn drain(&self) -> AppResult<()> {
        while let Some(job) = self.jobs.claim_next(&self.worker_id).await? {
            tracing::info!(
                worker_id = %self.worker_id,
                job_id = %job.id,
                kind = job.kind.as_code(),
                attempt = job.attempts,
                "job claimed"
            );
            let outcome = self.jobs.execute(&job).await;
            self.jobs.finalize(&job, outcome).await?;

            if self.shutdown.load(Ordering::SeqCst) {
                break;
            }
        }
        Ok(())
    }
}

/// Handle for signaling worker shutdown
#[derive(Clone)]
pub struct ShutdownHandle {
    shutdown: Arc<AtomicBool>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }
}
