//! Polymorphic activity behaviors.
//!
//! `of` maps an [`ActivityType`] to a stateless behavior object. `execute`
//! runs when the trampoline enters the activity; wait states flip the
//! execution inactive and return, everything else queues the next
//! operation. `signal` resumes a wait state and is only valid on the
//! types that override it.

use serde_json::json;

use crate::{
    ProcflowError, Result,
    command::CommandContext,
    common::Vars,
    events::{EngineEvent, JobEvent, TaskEvent},
    job,
    model::{ActivityNode, ActivityType, EventDefinition, ProcessDefinition},
    runtime::{AtomicOperation, compensation, execution, subscription},
    store::{
        data::{EventSubscription, Execution, Job, Task},
        query::{Cond, Query},
    },
    utils,
};

pub trait ActivityBehavior: Send + Sync {
    fn execute(
        &self,
        ctx: &mut CommandContext,
        execution: &Execution,
        definition: &ProcessDefinition,
        node: &ActivityNode,
    ) -> Result<()>;

    fn signal(
        &self,
        ctx: &mut CommandContext,
        execution: &Execution,
        definition: &ProcessDefinition,
        node: &ActivityNode,
        signal_name: Option<&str>,
        payload: &Vars,
    ) -> Result<()> {
        let _ = (ctx, execution, definition, signal_name, payload);
        Err(ProcflowError::InvalidState(format!("activity {} cannot be signaled", node.id)))
    }
}

pub fn of(activity_type: ActivityType) -> &'static dyn ActivityBehavior {
    match activity_type {
        ActivityType::None | ActivityType::StartEvent | ActivityType::ServiceTask | ActivityType::ExclusiveGateway | ActivityType::BoundaryEvent => &PassThrough,
        ActivityType::EndEvent => &EndEvent,
        ActivityType::UserTask => &UserTask,
        ActivityType::ReceiveTask => &ReceiveTask,
        ActivityType::ParallelGateway => &ParallelGateway,
        ActivityType::SubProcess => &SubProcess,
        ActivityType::CallActivity => &CallActivity,
        ActivityType::IntermediateCatchEvent => &CatchEvent,
        ActivityType::IntermediateThrowEvent => &ThrowEvent,
    }
}

fn leave(
    ctx: &mut CommandContext,
    execution: &Execution,
) {
    ctx.push_op(AtomicOperation::ActivityEnd {
        execution_id: execution.id.clone(),
    });
}

/// Resume a wait state: store the payload, reactivate, continue.
fn resume(
    ctx: &mut CommandContext,
    execution: &Execution,
    payload: &Vars,
) -> Result<()> {
    if !payload.is_empty() {
        execution::set_variables(ctx, execution, payload)?;
    }
    let mut execution = execution.clone();
    execution.is_active = true;
    ctx.session.put_execution(execution.clone());
    leave(ctx, &execution);
    Ok(())
}

fn enter_wait_state(
    ctx: &mut CommandContext,
    execution: &Execution,
) {
    let mut execution = execution.clone();
    execution.is_active = false;
    ctx.session.put_execution(execution);
}

/// Activities without wait semantics; their work is observable on the
/// event channel only.
struct PassThrough;

impl ActivityBehavior for PassThrough {
    fn execute(
        &self,
        ctx: &mut CommandContext,
        execution: &Execution,
        _definition: &ProcessDefinition,
        _node: &ActivityNode,
    ) -> Result<()> {
        leave(ctx, execution);
        Ok(())
    }
}

struct EndEvent;

impl ActivityBehavior for EndEvent {
    fn execute(
        &self,
        ctx: &mut CommandContext,
        execution: &Execution,
        _definition: &ProcessDefinition,
        node: &ActivityNode,
    ) -> Result<()> {
        match &node.event {
            Some(EventDefinition::Error {
                code,
            }) => Err(ProcflowError::BusinessFault {
                error_code: code.clone(),
                message: format!("error end event {}", node.id),
            }),
            Some(EventDefinition::Compensate) => {
                compensation::trigger(ctx, execution)?;
                leave(ctx, execution);
                Ok(())
            }
            _ => {
                leave(ctx, execution);
                Ok(())
            }
        }
    }
}

struct UserTask;

impl ActivityBehavior for UserTask {
    fn execute(
        &self,
        ctx: &mut CommandContext,
        execution: &Execution,
        _definition: &ProcessDefinition,
        node: &ActivityNode,
    ) -> Result<()> {
        let task = Task {
            id: utils::longid(),
            name: node.name.clone(),
            assignee: None,
            execution_id: execution.id.clone(),
            process_instance_id: execution.process_instance_id.clone(),
            process_definition_id: execution.process_definition_id.clone(),
            activity_id: node.id.clone(),
            created: utils::time::time_millis(),
            rev: 1,
        };
        ctx.emit(
            &execution.process_instance_id,
            &node.id,
            EngineEvent::Task(TaskEvent::Created {
                task_id: task.id.clone(),
                name: task.name.clone(),
                assignee: task.assignee.clone(),
            }),
        );
        ctx.session.insert_task(task);
        enter_wait_state(ctx, execution);
        Ok(())
    }

    fn signal(
        &self,
        ctx: &mut CommandContext,
        execution: &Execution,
        _definition: &ProcessDefinition,
        node: &ActivityNode,
        _signal_name: Option<&str>,
        payload: &Vars,
    ) -> Result<()> {
        let owned = Query::new().push(Cond::Eq("execution_id".into(), json!(execution.id)));
        for task in ctx.session.list_tasks(&owned)? {
            ctx.emit(
                &execution.process_instance_id,
                &node.id,
                EngineEvent::Task(TaskEvent::Completed {
                    task_id: task.id.clone(),
                }),
            );
            ctx.session.remove_task(&task.id);
        }
        resume(ctx, execution, payload)
    }
}

struct ReceiveTask;

impl ActivityBehavior for ReceiveTask {
    fn execute(
        &self,
        ctx: &mut CommandContext,
        execution: &Execution,
        _definition: &ProcessDefinition,
        _node: &ActivityNode,
    ) -> Result<()> {
        enter_wait_state(ctx, execution);
        Ok(())
    }

    fn signal(
        &self,
        ctx: &mut CommandContext,
        execution: &Execution,
        _definition: &ProcessDefinition,
        _node: &ActivityNode,
        _signal_name: Option<&str>,
        payload: &Vars,
    ) -> Result<()> {
        resume(ctx, execution, payload)
    }
}

/// Fork is handled when the gateway ends (every outgoing transition is
/// taken there); execute only implements the join side.
struct ParallelGateway;

impl ActivityBehavior for ParallelGateway {
    fn execute(
        &self,
        ctx: &mut CommandContext,
        execution: &Execution,
        definition: &ProcessDefinition,
        node: &ActivityNode,
    ) -> Result<()> {
        let expected = definition.incoming_count(&node.id);
        if expected <= 1 || !execution.is_concurrent {
            leave(ctx, execution);
            return Ok(());
        }

        let parent_id = execution
            .parent_id
            .clone()
            .ok_or_else(|| ProcflowError::InvalidState(format!("concurrent execution {} has no parent", execution.id)))?;

        enter_wait_state(ctx, execution);

        // the join fires exactly once, in the command that parks the last
        // arriving branch; earlier arrivals just park
        let arrived: Vec<Execution> = execution::children(ctx, &parent_id)?
            .into_iter()
            .filter(|child| child.activity_id.as_deref() == Some(&node.id) && !child.is_active)
            .collect();
        if arrived.len() < expected {
            return Ok(());
        }

        for branch in arrived {
            ctx.session.remove_execution(&branch.id);
        }
        let mut parent = ctx.session.find_execution(&parent_id)?;
        parent.activity_id = Some(node.id.clone());
        parent.is_active = true;
        ctx.session.put_execution(parent);
        ctx.push_op(AtomicOperation::ActivityEnd {
            execution_id: parent_id,
        });
        Ok(())
    }
}

struct SubProcess;

impl ActivityBehavior for SubProcess {
    fn execute(
        &self,
        ctx: &mut CommandContext,
        execution: &Execution,
        _definition: &ProcessDefinition,
        node: &ActivityNode,
    ) -> Result<()> {
        ctx.push_op(AtomicOperation::TransitionCreateScope {
            execution_id: execution.id.clone(),
            activity_id: node.id.clone(),
        });
        Ok(())
    }
}

struct CallActivity;

impl ActivityBehavior for CallActivity {
    fn execute(
        &self,
        ctx: &mut CommandContext,
        execution: &Execution,
        _definition: &ProcessDefinition,
        node: &ActivityNode,
    ) -> Result<()> {
        let key = node
            .called_element
            .as_deref()
            .ok_or_else(|| ProcflowError::Definition(format!("call activity {} has no called element", node.id)))?;
        let called = ctx.definitions().latest_by_key(key)?;

        let vars = execution::variables_of(ctx, execution)?;
        enter_wait_state(ctx, execution);
        execution::create_process_instance(ctx, &called, None, Some(execution.id.clone()), &vars)?;
        Ok(())
    }
}

struct CatchEvent;

impl ActivityBehavior for CatchEvent {
    fn execute(
        &self,
        ctx: &mut CommandContext,
        execution: &Execution,
        _definition: &ProcessDefinition,
        node: &ActivityNode,
    ) -> Result<()> {
        match &node.event {
            Some(EventDefinition::Timer {
                ..
            }) => {
                let timer = node.timer()?;
                let job = Job {
                    id: utils::longid(),
                    handler_type: job::TIMER_TRIGGER.to_string(),
                    handler_config: json!({
                        "activity_id": node.id,
                        "repeat": timer.repeat,
                        "duration_millis": timer.duration_millis,
                    }),
                    due_date: Some(utils::time::time_millis() + timer.duration_millis),
                    retries: ctx.config().job_executor.default_retries,
                    exclusive: true,
                    state: Job::AVAILABLE.to_string(),
                    lock_owner: None,
                    lock_expiration: None,
                    exception: None,
                    execution_id: Some(execution.id.clone()),
                    process_instance_id: Some(execution.process_instance_id.clone()),
                    process_definition_id: Some(execution.process_definition_id.clone()),
                    created: utils::time::time_millis(),
                    rev: 1,
                };
                ctx.emit(
                    &execution.process_instance_id,
                    &node.id,
                    EngineEvent::Job(JobEvent::Created {
                        job_id: job.id.clone(),
                        handler_type: job.handler_type.clone(),
                    }),
                );
                ctx.session.insert_job(job);
            }
            Some(EventDefinition::Signal {
                name,
            })
            | Some(EventDefinition::Message {
                name,
            }) => {
                let event_type = if matches!(&node.event, Some(EventDefinition::Signal { .. })) {
                    EventSubscription::SIGNAL
                } else {
                    EventSubscription::MESSAGE
                };
                ctx.session.insert_subscription(EventSubscription {
                    id: utils::longid(),
                    event_type: event_type.to_string(),
                    event_name: name.clone(),
                    execution_id: Some(execution.id.clone()),
                    process_instance_id: Some(execution.process_instance_id.clone()),
                    process_definition_id: execution.process_definition_id.clone(),
                    activity_id: node.id.clone(),
                    created: utils::time::time_millis(),
                    rev: 1,
                });
            }
            _ => {
                return Err(ProcflowError::Definition(format!("catch event {} has no event definition", node.id)));
            }
        }
        enter_wait_state(ctx, execution);
        Ok(())
    }

    fn signal(
        &self,
        ctx: &mut CommandContext,
        execution: &Execution,
        _definition: &ProcessDefinition,
        _node: &ActivityNode,
        _signal_name: Option<&str>,
        payload: &Vars,
    ) -> Result<()> {
        let owned = Query::new().push(Cond::Eq("execution_id".into(), json!(execution.id)));
        for sub in ctx.session.list_subscriptions(&owned)? {
            ctx.session.remove_subscription(&sub.id);
        }
        resume(ctx, execution, payload)
    }
}

struct ThrowEvent;

impl ActivityBehavior for ThrowEvent {
    fn execute(
        &self,
        ctx: &mut CommandContext,
        execution: &Execution,
        _definition: &ProcessDefinition,
        node: &ActivityNode,
    ) -> Result<()> {
        match &node.event {
            Some(EventDefinition::Signal {
                name,
            }) => {
                let name = name.clone();
                subscription::signal_received(ctx, &name, &Vars::new())?;
            }
            Some(EventDefinition::Compensate) => {
                compensation::trigger(ctx, execution)?;
            }
            _ => {}
        }
        leave(ctx, execution);
        Ok(())
    }
}
