//! The command/interceptor pipeline.
//!
//! Every state mutation of the engine runs as a [`Command`] through
//! [`CommandExecutor::execute`]: a fresh [`CommandContext`] is created
//! (context interceptor), the command body runs and its session is
//! flushed (transaction interceptor), and an optimistic-locking conflict
//! re-runs the whole command a configurable number of times (retry
//! interceptor). Engine events are dispatched on the channel only after a
//! successful commit.

mod context;
mod deploy;
mod instance;
mod job;
mod session;

use std::sync::Arc;

use tracing::debug;

use crate::{
    Result,
    config::Config,
    job::JobHandlers,
    runtime::{Channel, ConditionEvaluator, Definitions},
    store::Store,
};

pub use context::CommandContext;
pub use deploy::DeployCmd;
pub use instance::{CompleteTaskCmd, MessageEventReceivedCmd, SignalEventReceivedCmd, SignalExecutionCmd, StartProcessInstanceCmd};
pub use job::{AcquireJobsCmd, AcquiredJobs, ExecuteJobCmd, FailedJobCmd};
pub use session::DbSession;

/// A unit of work against one command context. Commands must be
/// re-runnable: the retry interceptor executes the same command again on
/// a fresh context after a revision conflict.
pub trait Command {
    type Output;

    fn execute(
        &self,
        ctx: &mut CommandContext,
    ) -> Result<Self::Output>;
}

pub struct CommandExecutor {
    config: Arc<Config>,
    store: Arc<Store>,
    definitions: Arc<Definitions>,
    handlers: Arc<JobHandlers>,
    condition: Arc<dyn ConditionEvaluator>,
    channel: Arc<Channel>,
}

impl CommandExecutor {
    pub fn new(
        config: Arc<Config>,
        store: Arc<Store>,
        definitions: Arc<Definitions>,
        handlers: Arc<JobHandlers>,
        condition: Arc<dyn ConditionEvaluator>,
        channel: Arc<Channel>,
    ) -> Self {
        Self {
            config,
            store,
            definitions,
            handlers,
            condition,
            channel,
        }
    }

    /// Run a command through the interceptor chain.
    pub fn execute<C: Command>(
        &self,
        cmd: &C,
    ) -> Result<C::Output> {
        let mut attempt = 0;
        loop {
            attempt += 1;

            let mut ctx = CommandContext::new(
                self.config.clone(),
                self.store.clone(),
                self.definitions.clone(),
                self.handlers.clone(),
                self.condition.clone(),
            );

            let result = cmd.execute(&mut ctx).and_then(|output| {
                ctx.session.flush()?;
                Ok(output)
            });

            match result {
                Ok(output) => {
                    ctx.close(true);
                    for message in ctx.take_events() {
                        self.channel.send(&message);
                    }
                    return Ok(output);
                }
                Err(err) if err.is_optimistic_locking() && attempt <= self.config.command_retries => {
                    debug!("command attempt {} hit a revision conflict, retrying: {}", attempt, err);
                    ctx.close(false);
                }
                Err(err) => {
                    ctx.close(false);
                    return Err(err);
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use std::sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    };

    use crate::{
        ProcflowError, Result,
        store::data::Variable,
    };

    use super::{Command, CommandContext, CommandExecutor};

    fn executor() -> CommandExecutor {
        crate::runtime::test_support::command_executor()
    }

    struct ConflictingCmd {
        attempts: Arc<AtomicU32>,
        fail_times: u32,
    }

    impl Command for ConflictingCmd {
        type Output = u32;

        fn execute(
            &self,
            _ctx: &mut CommandContext,
        ) -> Result<u32> {
            let n = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
            if n <= self.fail_times {
                return Err(ProcflowError::OptimisticLocking("stale revision".to_string()));
            }
            Ok(n)
        }
    }

    #[test]
    fn test_retries_on_revision_conflict() {
        let executor = executor();
        let attempts = Arc::new(AtomicU32::new(0));
        let result = executor.execute(&ConflictingCmd {
            attempts: attempts.clone(),
            fail_times: 2,
        });
        assert_eq!(result.unwrap(), 3);
    }

    #[test]
    fn test_retry_exhaustion_surfaces_conflict() {
        let executor = executor();
        let attempts = Arc::new(AtomicU32::new(0));
        let result = executor.execute(&ConflictingCmd {
            attempts: attempts.clone(),
            fail_times: 100,
        });
        assert!(result.unwrap_err().is_optimistic_locking());
        // first attempt plus the configured retries
        assert_eq!(attempts.load(Ordering::SeqCst), 4);
    }

    struct WriteCmd {
        fail: bool,
    }

    impl Command for WriteCmd {
        type Output = String;

        fn execute(
            &self,
            ctx: &mut CommandContext,
        ) -> Result<String> {
            let var = Variable {
                id: crate::utils::longid(),
                name: "written".to_string(),
                execution_id: "e1".to_string(),
                process_instance_id: "e1".to_string(),
                value: serde_json::json!(true),
                rev: 1,
            };
            let id = var.id.clone();
            ctx.session.insert_variable(var);
            if self.fail {
                return Err(ProcflowError::Engine("boom".to_string()));
            }
            Ok(id)
        }
    }

    #[test]
    fn test_failed_command_writes_nothing() {
        let executor = executor();

        let id = executor
            .execute(&WriteCmd {
                fail: false,
            })
            .unwrap();
        assert!(executor.store.variables().exists(&id).unwrap());

        let before = executor.store.variables().query(&crate::store::query::Query::new()).unwrap().count;
        assert!(executor
            .execute(&WriteCmd {
                fail: true,
            })
            .is_err());
        let after = executor.store.variables().query(&crate::store::query::Query::new()).unwrap().count;
        assert_eq!(before, after);
    }

    struct NoopCmd;

    impl Command for NoopCmd {
        type Output = ();

        fn execute(
            &self,
            ctx: &mut CommandContext,
        ) -> Result<()> {
            ctx.on_close(|success| assert!(success));
            Ok(())
        }
    }

    #[test]
    fn test_close_listeners_observe_outcome() {
        let executor = executor();
        executor.execute(&NoopCmd).unwrap();
    }
}
