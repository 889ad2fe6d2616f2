//! Boundary-event lifecycle.
//!
//! Subscriptions and timer jobs for boundary events attached to an
//! activity exist exactly while that activity is executing: created when
//! the activity's execute phase begins, removed when it ends, consumed
//! when the boundary fires.

use serde_json::json;

use crate::{
    ProcflowError, Result,
    command::CommandContext,
    common::Vars,
    events::{ActivityEvent, EngineEvent, JobEvent},
    job,
    model::{ActivityNode, EventDefinition, ProcessDefinition},
    runtime::{AtomicOperation, execution},
    store::{
        data::{EventSubscription, Execution, Job},
        query::{Cond, Query},
    },
    utils,
};

pub fn create_attachments(
    ctx: &mut CommandContext,
    execution: &Execution,
    definition: &ProcessDefinition,
    activity_id: &str,
) -> Result<()> {
    for boundary in definition.boundary_events(activity_id) {
        match &boundary.event {
            Some(EventDefinition::Timer {
                ..
            }) => {
                let timer = boundary.timer()?;
                let job = Job {
                    id: utils::longid(),
                    handler_type: job::TIMER_TRIGGER.to_string(),
                    handler_config: json!({
                        "activity_id": boundary.id,
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
                    &boundary.id,
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
                let event_type = if matches!(&boundary.event, Some(EventDefinition::Signal { .. })) {
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
                    activity_id: boundary.id.clone(),
                    created: utils::time::time_millis(),
                    rev: 1,
                });
            }
            // error and compensation boundaries are routed from the
            // definition, they need no persisted registration
            _ => {}
        }
    }
    Ok(())
}

/// Drop the subscriptions and timer jobs the executing activity held.
pub fn remove_attachments(
    ctx: &mut CommandContext,
    execution: &Execution,
    definition: &ProcessDefinition,
    activity_id: &str,
) -> Result<()> {
    let boundaries = definition.boundary_events(activity_id).iter().map(|b| b.id.clone()).collect::<Vec<_>>();
    if boundaries.is_empty() {
        return Ok(());
    }

    let owned = Query::new().push(Cond::Eq("execution_id".into(), json!(execution.id)));
    for subscription in ctx.session.list_subscriptions(&owned)? {
        if boundaries.contains(&subscription.activity_id) {
            ctx.session.remove_subscription(&subscription.id);
        }
    }
    for job in ctx.session.list_jobs(&owned)? {
        if job.handler_type != job::TIMER_TRIGGER {
            continue;
        }
        let aid = job.handler_config.get("activity_id").and_then(|v| v.as_str()).unwrap_or_default();
        if boundaries.contains(&aid.to_string()) {
            ctx.session.remove_job(&job.id);
        }
    }
    Ok(())
}

/// Enter a boundary event on the execution it is attached to.
///
/// An interrupting boundary cancels the executing activity and everything
/// below it, then continues on the boundary's outgoing path; a
/// non-interrupting one spawns a concurrent child and leaves the wait
/// state untouched.
pub fn fire(
    ctx: &mut CommandContext,
    execution: &Execution,
    boundary: &ActivityNode,
    payload: &Vars,
) -> Result<()> {
    if !payload.is_empty() {
        execution::set_variables(ctx, execution, payload)?;
    }

    if boundary.interrupting {
        if let Some(aid) = &execution.activity_id {
            ctx.emit(
                &execution.process_instance_id,
                aid,
                EngineEvent::Activity(ActivityEvent::Cancelled {
                    reason: format!("boundary event {}", boundary.id),
                }),
            );
        }
        for child in execution::children(ctx, &execution.id)? {
            execution::delete_cascade(ctx, &child.id, Some(&format!("boundary event {}", boundary.id)))?;
        }
        execution::delete_owned(ctx, &execution.id)?;

        let mut execution = ctx.session.find_execution(&execution.id)?;
        execution.activity_id = Some(boundary.id.clone());
        execution.is_active = true;
        ctx.session.put_execution(execution.clone());
        ctx.push_op(AtomicOperation::ActivityStart {
            execution_id: execution.id,
        });
    } else {
        let child = execution::create_child(ctx, execution, Some(boundary.id.clone()), false, true);
        ctx.push_op(AtomicOperation::ActivityStart {
            execution_id: child.id,
        });
    }
    Ok(())
}

/// Route a business fault to the closest matching error boundary, walking
/// the execution chain outwards. An unhandled fault surfaces to the
/// caller and rolls the command back.
pub fn propagate_error(
    ctx: &mut CommandContext,
    execution_id: &str,
    error_code: &str,
    message: &str,
) -> Result<()> {
    let mut current = ctx.session.find_execution(execution_id)?;
    loop {
        if let Some(aid) = current.activity_id.clone() {
            let definition = ctx.definition(&current.process_definition_id)?;
            let handler = definition
                .boundary_events(&aid)
                .into_iter()
                .find(|b| {
                    matches!(&b.event, Some(EventDefinition::Error { code }) if code.is_empty() || code == error_code)
                })
                .cloned();
            if let Some(boundary) = handler {
                return fire(ctx, &current, &boundary, &Vars::new());
            }
        }
        match current.parent_id.clone() {
            Some(parent_id) => current = ctx.session.find_execution(&parent_id)?,
            None => {
                return Err(ProcflowError::BusinessFault {
                    error_code: error_code.to_string(),
                    message: message.to_string(),
                });
            }
        }
    }
}
