//! The polling job executor.
//!
//! One acquisition loop locks batches of due jobs under this executor's
//! lock owner id and hands them to a pool of worker tasks over an MPMC
//! queue. Execution and failure handling each run as their own command,
//! so a failed handler rolls back completely before retries are counted.

use std::sync::Arc;

use tokio::runtime::Runtime;
use tracing::{debug, error, warn};

use crate::{
    command::{AcquireJobsCmd, CommandExecutor, ExecuteJobCmd, FailedJobCmd},
    common::{Queue, Shutdown},
    config::Config,
};

const JOB_QUEUE_SIZE: usize = 256;

pub struct JobExecutor {
    config: Arc<Config>,
    executor: Arc<CommandExecutor>,
    queue: Arc<Queue<String>>,
    /// uuid identifying this executor's locks across its lifetime
    lock_owner: String,
    runtime: Arc<Runtime>,
    shutdown: Arc<Shutdown>,
}

impl JobExecutor {
    pub fn new(
        config: Arc<Config>,
        executor: Arc<CommandExecutor>,
        runtime: Arc<Runtime>,
    ) -> Self {
        Self {
            config,
            executor,
            queue: Queue::new(JOB_QUEUE_SIZE),
            lock_owner: uuid::Uuid::new_v4().to_string(),
            runtime,
            shutdown: Arc::new(Shutdown::new()),
        }
    }

    pub fn lock_owner(&self) -> &str {
        &self.lock_owner
    }

    pub fn start(&self) {
        self.spawn_acquisition();
        for _ in 0..self.config.job_executor.worker_count {
            self.spawn_worker();
        }
    }

    pub fn shutdown(&self) {
        self.shutdown.shutdown();
    }

    fn spawn_acquisition(&self) {
        let executor = self.executor.clone();
        let queue = self.queue.clone();
        let lock_owner = self.lock_owner.clone();
        let wait = std::time::Duration::from_millis(self.config.job_executor.wait_interval_millis);
        let shutdown = self.shutdown.clone();

        self.runtime.spawn(async move {
            loop {
                if shutdown.is_terminated() {
                    break;
                }

                let mut saturated = false;
                match executor.execute(&AcquireJobsCmd {
                    lock_owner: lock_owner.clone(),
                }) {
                    Ok(acquired) => {
                        saturated = acquired.full;
                        for job_id in acquired.ids {
                            debug!("acquired job {}", job_id);
                            if queue.send_async(job_id).await.is_err() {
                                return;
                            }
                        }
                    }
                    Err(err) => {
                        warn!("job acquisition failed: {}", err);
                    }
                }

                // a saturated batch means more work is probably due now
                if !saturated {
                    tokio::select! {
                        _ = shutdown.wait() => break,
                        _ = tokio::time::sleep(wait) => {}
                    }
                }
            }
        });
    }

    fn spawn_worker(&self) {
        let executor = self.executor.clone();
        let queue = self.queue.clone();
        let lock_owner = self.lock_owner.clone();
        let shutdown = self.shutdown.clone();

        self.runtime.spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.wait() => break,
                    job_id = queue.next_async() => {
                        let Some(job_id) = job_id else { break };
                        let result = executor.execute(&ExecuteJobCmd {
                            job_id: job_id.clone(),
                            lock_owner: lock_owner.clone(),
                        });
                        if let Err(err) = result {
                            warn!("job {} failed: {}", job_id, err);
                            if let Err(record_err) = executor.execute(&FailedJobCmd {
                                job_id: job_id.clone(),
                                error: err,
                            }) {
                                error!("recording failure of job {} failed: {}", job_id, record_err);
                            }
                        }
                    }
                }
            }
        });
    }
}
