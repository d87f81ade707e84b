use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, warn};

use super::enricher::EnrichmentPipeline;
use super::Job;

/// Fixed-size pool of workers pulling from the shared bounded queue.
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn spawn(
        pipeline: Arc<EnrichmentPipeline>,
        jobs: mpsc::Receiver<Job>,
        workers: usize,
    ) -> Self {
        let jobs = Arc::new(Mutex::new(jobs));
        let handles = (0..workers.max(1))
            .map(|worker| {
                let pipeline = pipeline.clone();
                let jobs = jobs.clone();
                tokio::spawn(async move {
                    loop {
                        let job = jobs.lock().await.recv().await;
                        let Some(job) = job else { break };
                        pipeline.process(job.record, job.delivery).await;
                    }
                    debug!(worker, "Worker stopped");
                })
            })
            .collect();

        Self { handles }
    }

    pub fn size(&self) -> usize {
        self.handles.len()
    }

    /// Waits for every worker to finish. Workers exit once the queue is closed and empty.
    pub async fn join(self) {
        for result in join_all(self.handles).await {
            if let Err(e) = result {
                if e.is_panic() {
                    error!(error = %e, "Worker panicked");
                }
            }
        }
    }

    /// Lets workers drain the closed queue for at most `grace`, then aborts
    /// the rest. Aborted work stays unacknowledged. Returns the number of
    /// workers aborted.
    pub async fn shutdown(self, grace: Duration) -> usize {
        let deadline = Instant::now() + grace;
        let mut aborted = 0;

        for mut handle in self.handles {
            match tokio::time::timeout_at(deadline, &mut handle).await {
                Ok(Err(e)) if e.is_panic() => error!(error = %e, "Worker panicked"),
                Ok(_) => {}
                Err(_) => {
                    handle.abort();
                    aborted += 1;
                }
            }
        }

        if aborted > 0 {
            warn!(aborted, ?grace, "Grace period elapsed, aborted remaining workers");
        }
        aborted
    }
}
