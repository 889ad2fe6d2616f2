//! Job executor commands: acquisition, execution, and failure handling.

use std::collections::HashSet;

use serde_json::json;
use tracing::warn;

use crate::{
    ProcflowError, Result,
    command::{Command, CommandContext},
    events::{EngineEvent, JobEvent},
    job,
    runtime::atomic,
    store::{
        data::Job,
        query::{Cond, Query},
    },
    utils,
};

#[derive(Debug)]
pub struct AcquiredJobs {
    pub ids: Vec<String>,
    /// the acquisition query was saturated; the next cycle should run
    /// without sleeping
    pub full: bool,
}

/// Poll and lock a batch of due jobs for one executor.
///
/// Locking bypasses the session and updates each job record directly: a
/// lost revision race on one job must drop that job from the batch, not
/// fail the whole acquisition.
pub struct AcquireJobsCmd {
    pub lock_owner: String,
}

impl Command for AcquireJobsCmd {
    type Output = AcquiredJobs;

    fn execute(
        &self,
        ctx: &mut CommandContext,
    ) -> Result<AcquiredJobs> {
        let config = &ctx.config().job_executor;
        let max = config.max_jobs_per_acquisition;
        let lock_time = config.lock_time_millis;
        let now = utils::time::time_millis();

        let due = Query::new()
            .push(Cond::Eq("state".into(), json!(Job::AVAILABLE)))
            .push(Cond::Or(vec![Cond::IsNull("due_date".into()), Cond::Le("due_date".into(), json!(now))]))
            // an expired lease is treated exactly like no lock
            .push(Cond::Or(vec![Cond::IsNull("lock_owner".into()), Cond::Le("lock_expiration".into(), json!(now))]))
            .order_by("due_date", false)
            .limit(max);
        let page = ctx.store().jobs().query(&due)?;
        let full = page.rows.len() >= max;

        let mut ids = Vec::new();
        let mut exclusive_pids: HashSet<String> = HashSet::new();
        for job in page.rows {
            // two exclusive jobs of one instance never run concurrently;
            // the second waits for the next cycle
            if job.exclusive {
                if let Some(pid) = &job.process_instance_id {
                    if !exclusive_pids.insert(pid.clone()) {
                        continue;
                    }
                }
            }

            let mut locked = job.clone();
            locked.lock_owner = Some(self.lock_owner.clone());
            locked.lock_expiration = Some(now + lock_time);
            match ctx.store().jobs().update(&locked) {
                Ok(_) => ids.push(locked.id),
                // another executor won this job
                Err(err) if err.is_optimistic_locking() => continue,
                Err(err) => return Err(err),
            }
        }

        Ok(AcquiredJobs {
            ids,
            full,
        })
    }
}

/// Run one locked job: the handler's writes, the job deletion, and any
/// timer rescheduling commit in a single transaction.
pub struct ExecuteJobCmd {
    pub job_id: String,
    pub lock_owner: String,
}

impl Command for ExecuteJobCmd {
    type Output = ();

    fn execute(
        &self,
        ctx: &mut CommandContext,
    ) -> Result<()> {
        let job = match ctx.session.find_job(&self.job_id) {
            Ok(job) => job,
            // deleted by a cascading cancellation while locked
            Err(err) if matches!(err, ProcflowError::NotFound { .. }) => return Ok(()),
            Err(err) => return Err(err),
        };
        if job.lock_owner.as_deref() != Some(self.lock_owner.as_str()) {
            warn!("job {} lock was taken over, skipping execution", job.id);
            return Ok(());
        }

        let handler = ctx
            .handlers()
            .get(&job.handler_type)
            .ok_or_else(|| ProcflowError::JobConfiguration(format!("no handler registered for job type {}", job.handler_type)))?;

        ctx.session.remove_job(&job.id);
        handler.execute(ctx, &job)?;
        atomic::run(ctx)?;

        reschedule_timer(ctx, &job)?;
        Ok(())
    }
}

/// Insert the next occurrence of a repeating timer job.
fn reschedule_timer(
    ctx: &mut CommandContext,
    job: &Job,
) -> Result<()> {
    if job.handler_type != job::TIMER_TRIGGER && job.handler_type != job::TIMER_START_EVENT {
        return Ok(());
    }
    // None: one-shot. 0: unbounded. n: n occurrences remaining including
    // the one that just fired.
    let remaining = match job.handler_config.get("repeat").and_then(|v| v.as_u64()) {
        None => return Ok(()),
        Some(0) => 0,
        Some(1) => return Ok(()),
        Some(n) => n - 1,
    };
    let duration = job
        .handler_config
        .get("duration_millis")
        .and_then(|v| v.as_i64())
        .ok_or_else(|| ProcflowError::JobConfiguration(format!("repeating timer job {} has no duration", job.id)))?;

    // reinsert only while the wait state the timer was armed for is still
    // in place; an interrupting boundary or a catch-event resume consumes
    // the rest of the cycle even though the execution id survives
    if job.handler_type == job::TIMER_TRIGGER {
        let Some(execution_id) = &job.execution_id else {
            return Ok(());
        };
        let Ok(execution) = ctx.session.find_execution(execution_id) else {
            return Ok(());
        };
        let activity_id = job
            .handler_config
            .get("activity_id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ProcflowError::JobConfiguration(format!("timer job {} names no activity", job.id)))?;
        let definition = ctx.definition(&execution.process_definition_id)?;
        let node = definition.activity(activity_id)?.clone();
        if !job::timer_armed_at(&execution, &node) {
            return Ok(());
        }
    }

    let mut config = job.handler_config.clone();
    config["repeat"] = json!(remaining);
    let successor = Job {
        id: utils::longid(),
        handler_type: job.handler_type.clone(),
        handler_config: config,
        due_date: Some(utils::time::time_millis() + duration),
        retries: ctx.config().job_executor.default_retries,
        exclusive: job.exclusive,
        state: Job::AVAILABLE.to_string(),
        lock_owner: None,
        lock_expiration: None,
        exception: None,
        execution_id: job.execution_id.clone(),
        process_instance_id: job.process_instance_id.clone(),
        process_definition_id: job.process_definition_id.clone(),
        created: utils::time::time_millis(),
        rev: 1,
    };
    ctx.emit(
        job.process_instance_id.as_deref().unwrap_or(""),
        "",
        EngineEvent::Job(JobEvent::Created {
            job_id: successor.id.clone(),
            handler_type: successor.handler_type.clone(),
        }),
    );
    ctx.session.insert_job(successor);
    Ok(())
}

/// Record a job failure after its execution command rolled back:
/// decrement retries and make the job due again after the fixed backoff,
/// or dead-letter it when retries are exhausted or the failure is a
/// configuration error.
pub struct FailedJobCmd {
    pub job_id: String,
    pub error: ProcflowError,
}

impl Command for FailedJobCmd {
    type Output = ();

    fn execute(
        &self,
        ctx: &mut CommandContext,
    ) -> Result<()> {
        let mut job = match ctx.session.find_job(&self.job_id) {
            Ok(job) => job,
            Err(err) if matches!(err, ProcflowError::NotFound { .. }) => return Ok(()),
            Err(err) => return Err(err),
        };
        let pid = job.process_instance_id.clone().unwrap_or_default();

        job.lock_owner = None;
        job.lock_expiration = None;
        job.exception = Some(self.error.to_string());

        if self.error.is_configuration() || job.retries <= 1 {
            job.retries = (job.retries - 1).max(0);
            job.state = Job::DEADLETTER.to_string();
            ctx.emit(
                &pid,
                "",
                EngineEvent::Job(JobEvent::DeadLettered {
                    job_id: job.id.clone(),
                    exception: self.error.to_string(),
                }),
            );
        } else {
            job.retries -= 1;
            job.due_date = Some(utils::time::time_millis() + ctx.config().job_executor.retry_wait_millis);
            ctx.emit(
                &pid,
                "",
                EngineEvent::Job(JobEvent::RetriesDecremented {
                    job_id: job.id.clone(),
                    retries: job.retries,
                }),
            );
        }
        ctx.session.put_job(job);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use std::sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    };

    use serde_json::json;

    use crate::{
        Config, ProcflowError, Result,
        command::{AcquireJobsCmd, CommandContext, CommandExecutor, ExecuteJobCmd, FailedJobCmd},
        job::{JobHandler, JobHandlers},
        runtime::test_support,
        store::{data::Job, query::Query},
        utils,
    };

    fn seed_job(
        executor: &CommandExecutor,
        handler_type: &str,
        exclusive: bool,
        retries: i32,
    ) -> Job {
        let job = Job {
            id: utils::longid(),
            handler_type: handler_type.to_string(),
            handler_config: json!({}),
            due_date: None,
            retries,
            exclusive,
            state: Job::AVAILABLE.to_string(),
            lock_owner: None,
            lock_expiration: None,
            exception: None,
            execution_id: None,
            process_instance_id: Some("pi1".to_string()),
            process_definition_id: None,
            created: utils::time::time_millis(),
            rev: 1,
        };
        executor.store.jobs().create(&job).unwrap();
        job
    }

    fn acquire(
        executor: &CommandExecutor,
        owner: &str,
    ) -> Vec<String> {
        executor
            .execute(&AcquireJobsCmd {
                lock_owner: owner.to_string(),
            })
            .unwrap()
            .ids
    }

    #[test]
    fn test_acquired_job_is_invisible_to_other_executors() {
        let executor = test_support::command_executor();
        let job = seed_job(&executor, "noop", false, 3);

        assert_eq!(acquire(&executor, "worker-a"), vec![job.id]);
        // the lease is fresh, nobody else may take the job
        assert!(acquire(&executor, "worker-b").is_empty());
    }

    #[test]
    fn test_expired_lease_is_treated_like_no_lock() {
        let executor = test_support::command_executor();
        let mut job = seed_job(&executor, "noop", false, 3);
        job.lock_owner = Some("crashed-worker".to_string());
        job.lock_expiration = Some(utils::time::time_millis() - 1_000);
        executor.store.jobs().update(&job).unwrap();

        assert_eq!(acquire(&executor, "worker-b"), vec![job.id]);
    }

    #[test]
    fn test_exclusive_jobs_of_one_instance_never_share_a_batch() {
        let executor = test_support::command_executor();
        let first = seed_job(&executor, "noop", true, 3);
        let second = seed_job(&executor, "noop", true, 3);

        let batch = acquire(&executor, "worker-a");
        assert_eq!(batch.len(), 1);
        let rest = acquire(&executor, "worker-a");
        assert_eq!(rest.len(), 1);
        assert_ne!(batch[0], rest[0]);
        let mut all = vec![batch[0].clone(), rest[0].clone()];
        all.sort();
        let mut expected = vec![first.id, second.id];
        expected.sort();
        assert_eq!(all, expected);
    }

    struct FlakyHandler {
        calls: Arc<AtomicU32>,
        failures: u32,
    }

    impl JobHandler for FlakyHandler {
        fn handler_type(&self) -> &str {
            "flaky"
        }

        fn execute(
            &self,
            _ctx: &mut CommandContext,
            _job: &Job,
        ) -> Result<()> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= self.failures {
                return Err(ProcflowError::Engine("transient handler failure".to_string()));
            }
            Ok(())
        }
    }

    /// Drive acquisition and execution inline until nothing is runnable.
    fn pump(
        executor: &CommandExecutor,
        owner: &str,
    ) {
        loop {
            let ids = acquire(executor, owner);
            if ids.is_empty() {
                return;
            }
            for job_id in ids {
                let result = executor.execute(&ExecuteJobCmd {
                    job_id: job_id.clone(),
                    lock_owner: owner.to_string(),
                });
                if let Err(error) = result {
                    executor
                        .execute(&FailedJobCmd {
                            job_id,
                            error,
                        })
                        .unwrap();
                }
            }
        }
    }

    #[test]
    fn test_job_survives_transient_failures_within_retries() {
        let mut config = Config::default();
        config.job_executor.retry_wait_millis = 0;
        let calls = Arc::new(AtomicU32::new(0));
        let mut handlers = JobHandlers::new();
        handlers.register(Arc::new(FlakyHandler {
            calls: calls.clone(),
            failures: 2,
        }));
        let executor = test_support::command_executor_with(config, handlers);

        seed_job(&executor, "flaky", false, 3);
        pump(&executor, "worker-a");

        // two failures burned two retries, the third attempt succeeded
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(executor.store.jobs().query(&Query::new()).unwrap().count, 0);
    }

    #[test]
    fn test_retries_exhausted_dead_letters_the_job() {
        let mut config = Config::default();
        config.job_executor.retry_wait_millis = 0;
        let calls = Arc::new(AtomicU32::new(0));
        let mut handlers = JobHandlers::new();
        handlers.register(Arc::new(FlakyHandler {
            calls: calls.clone(),
            failures: u32::MAX,
        }));
        let executor = test_support::command_executor_with(config, handlers);

        let job = seed_job(&executor, "flaky", false, 3);
        pump(&executor, "worker-a");

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        let dead = executor.store.jobs().find(&job.id).unwrap();
        assert_eq!(dead.state, Job::DEADLETTER);
        assert!(dead.exception.is_some());
        assert!(dead.lock_owner.is_none());
    }

    #[test]
    fn test_missing_handler_dead_letters_without_retrying() {
        let executor = test_support::command_executor();
        let job = seed_job(&executor, "unregistered", false, 3);

        pump(&executor, "worker-a");

        let dead = executor.store.jobs().find(&job.id).unwrap();
        assert_eq!(dead.state, Job::DEADLETTER);
    }

    #[test]
    fn test_retries_decrease_monotonically() {
        let mut config = Config::default();
        config.job_executor.retry_wait_millis = 0;
        let mut handlers = JobHandlers::new();
        handlers.register(Arc::new(FlakyHandler {
            calls: Arc::new(AtomicU32::new(0)),
            failures: u32::MAX,
        }));
        let executor = test_support::command_executor_with(config, handlers);

        let job = seed_job(&executor, "flaky", false, 3);

        let mut seen = Vec::new();
        for _ in 0..3 {
            let ids = acquire(&executor, "worker-a");
            if ids.is_empty() {
                break;
            }
            for job_id in ids {
                let error = executor
                    .execute(&ExecuteJobCmd {
                        job_id: job_id.clone(),
                        lock_owner: "worker-a".to_string(),
                    })
                    .unwrap_err();
                executor
                    .execute(&FailedJobCmd {
                        job_id,
                        error,
                    })
                    .unwrap();
            }
            seen.push(executor.store.jobs().find(&job.id).unwrap().retries);
        }
        assert_eq!(seen, vec![2, 1, 0]);
    }
}
