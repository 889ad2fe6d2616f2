//! Built-in job handlers.

use tracing::warn;

use crate::{
    ProcflowError, Result,
    command::CommandContext,
    common::Vars,
    events::{EngineEvent, JobEvent},
    job::JobHandler,
    model::ActivityNode,
    runtime::{AtomicOperation, atomic, boundary, execution},
    store::data::{Execution, Job},
};

fn execution_id_of(job: &Job) -> Result<&str> {
    job.execution_id
        .as_deref()
        .ok_or_else(|| ProcflowError::JobConfiguration(format!("job {} carries no execution id", job.id)))
}

/// True while the wait state a timer was armed for is still in place: the
/// host activity of a boundary timer is still running, or the catch event
/// is still parked. An execution that moved on keeps its id, so existence
/// alone proves nothing.
pub(crate) fn timer_armed_at(
    execution: &Execution,
    node: &ActivityNode,
) -> bool {
    match &node.attached_to {
        Some(host) => execution.activity_id.as_deref() == Some(host.as_str()),
        None => !execution.is_active && execution.activity_id.as_deref() == Some(node.id.as_str()),
    }
}

/// Re-enters an execution parked before an async activity at the execute
/// phase.
pub struct AsyncContinuationHandler;

impl JobHandler for AsyncContinuationHandler {
    fn handler_type(&self) -> &str {
        super::ASYNC_CONTINUATION
    }

    fn execute(
        &self,
        ctx: &mut CommandContext,
        job: &Job,
    ) -> Result<()> {
        let execution_id = execution_id_of(job)?;

        let mut target = ctx.session.find_execution(execution_id)?;
        target.is_active = true;
        ctx.session.put_execution(target);
        ctx.push_op(AtomicOperation::ActivityExecute {
            execution_id: execution_id.to_string(),
        });
        Ok(())
    }
}

/// Fires a due timer: routes to the boundary event it belongs to, or
/// resumes the intermediate catch event waiting on it.
pub struct TimerTriggerHandler;

impl JobHandler for TimerTriggerHandler {
    fn handler_type(&self) -> &str {
        super::TIMER_TRIGGER
    }

    fn execute(
        &self,
        ctx: &mut CommandContext,
        job: &Job,
    ) -> Result<()> {
        let execution_id = execution_id_of(job)?.to_string();
        let activity_id = job
            .handler_config
            .get("activity_id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ProcflowError::JobConfiguration(format!("timer job {} names no activity", job.id)))?
            .to_string();

        let target = ctx.session.find_execution(&execution_id)?;
        let definition = ctx.definition(&target.process_definition_id)?;
        let node = definition.activity(&activity_id)?.clone();

        // the execution may have left the wait state between the job
        // becoming due and firing; a stale occurrence must not signal
        // whatever the execution waits on now
        if !timer_armed_at(&target, &node) {
            warn!("timer job {} is stale, execution {} left activity {}", job.id, target.id, activity_id);
            return Ok(());
        }

        ctx.emit(
            &target.process_instance_id,
            &activity_id,
            EngineEvent::Job(JobEvent::TimerFired {
                job_id: job.id.clone(),
            }),
        );

        if node.attached_to.is_some() {
            boundary::fire(ctx, &target, &node, &Vars::new())
        } else {
            atomic::signal(ctx, &execution_id, None, &Vars::new())
        }
    }
}

/// Starts a fresh process instance when a start-event timer elapses.
pub struct TimerStartEventHandler;

impl JobHandler for TimerStartEventHandler {
    fn handler_type(&self) -> &str {
        super::TIMER_START_EVENT
    }

    fn execute(
        &self,
        ctx: &mut CommandContext,
        job: &Job,
    ) -> Result<()> {
        let definition_id = job
            .process_definition_id
            .as_deref()
            .ok_or_else(|| ProcflowError::JobConfiguration(format!("timer start job {} names no process definition", job.id)))?;

        let definition = ctx.definition(definition_id)?;
        ctx.emit(
            "",
            "",
            EngineEvent::Job(JobEvent::TimerFired {
                job_id: job.id.clone(),
            }),
        );
        execution::create_process_instance(ctx, &definition, None, None, &Vars::new())?;
        Ok(())
    }
}
