//! The atomic-operation trampoline.
//!
//! One command runs this loop synchronously until no operation is pending
//! for any execution it touched: every execution is then either deleted
//! or persisted in a wait state. The loop is an explicit work queue, not
//! recursion, so deep scopes and long pass-through chains cannot grow the
//! stack.

use serde_json::json;

use crate::{
    ProcflowError, Result,
    command::CommandContext,
    common::Vars,
    events::{ActivityEvent, EngineEvent, ProcessEvent},
    job,
    model::{ActivityType, Transition},
    runtime::{behavior, boundary, execution},
    store::data::{Execution, Job},
    utils,
};

/// One deterministic state-machine step of the execution tree engine.
#[derive(Debug, Clone)]
pub enum AtomicOperation {
    ProcessStart {
        execution_id: String,
    },
    ActivityStart {
        execution_id: String,
    },
    ActivityExecute {
        execution_id: String,
    },
    ActivityEnd {
        execution_id: String,
    },
    TransitionTake {
        execution_id: String,
        transition_id: String,
    },
    TransitionCreateScope {
        execution_id: String,
        activity_id: String,
    },
    TransitionDestroyScope {
        execution_id: String,
    },
    ProcessEnd {
        execution_id: String,
    },
}

impl AtomicOperation {
    pub fn execution_id(&self) -> &str {
        match self {
            AtomicOperation::ProcessStart {
                execution_id,
            }
            | AtomicOperation::ActivityStart {
                execution_id,
            }
            | AtomicOperation::ActivityExecute {
                execution_id,
            }
            | AtomicOperation::ActivityEnd {
                execution_id,
            }
            | AtomicOperation::TransitionTake {
                execution_id, ..
            }
            | AtomicOperation::TransitionCreateScope {
                execution_id, ..
            }
            | AtomicOperation::TransitionDestroyScope {
                execution_id,
            }
            | AtomicOperation::ProcessEnd {
                execution_id,
            } => execution_id,
        }
    }
}

/// Drain the context's operation queue. A business fault raised by an
/// operation is routed to an error boundary before it may surface.
pub fn run(ctx: &mut CommandContext) -> Result<()> {
    while let Some(op) = ctx.next_op() {
        let execution_id = op.execution_id().to_string();
        match perform(ctx, op) {
            Ok(()) => {}
            Err(ProcflowError::BusinessFault {
                error_code,
                message,
            }) => {
                boundary::propagate_error(ctx, &execution_id, &error_code, &message)?;
            }
            Err(err) => return Err(err),
        }
    }
    Ok(())
}

fn perform(
    ctx: &mut CommandContext,
    op: AtomicOperation,
) -> Result<()> {
    match op {
        AtomicOperation::ProcessStart {
            execution_id,
        } => process_start(ctx, &execution_id),
        AtomicOperation::ActivityStart {
            execution_id,
        } => activity_start(ctx, &execution_id),
        AtomicOperation::ActivityExecute {
            execution_id,
        } => activity_execute(ctx, &execution_id),
        AtomicOperation::ActivityEnd {
            execution_id,
        } => activity_end(ctx, &execution_id),
        AtomicOperation::TransitionTake {
            execution_id,
            transition_id,
        } => transition_take(ctx, &execution_id, &transition_id),
        AtomicOperation::TransitionCreateScope {
            execution_id,
            activity_id,
        } => transition_create_scope(ctx, &execution_id, &activity_id),
        AtomicOperation::TransitionDestroyScope {
            execution_id,
        } => transition_destroy_scope(ctx, &execution_id),
        AtomicOperation::ProcessEnd {
            execution_id,
        } => process_end(ctx, &execution_id),
    }
}

fn current_activity(execution: &Execution) -> Result<String> {
    execution
        .activity_id
        .clone()
        .ok_or_else(|| ProcflowError::InvalidState(format!("execution {} has no current activity", execution.id)))
}

fn process_start(
    ctx: &mut CommandContext,
    execution_id: &str,
) -> Result<()> {
    let mut execution = ctx.session.find_execution(execution_id)?;
    let definition = ctx.definition(&execution.process_definition_id)?;
    let initial = definition.initial_activity(None)?.id.clone();

    execution.activity_id = Some(initial);
    ctx.session.put_execution(execution.clone());
    ctx.emit(&execution.process_instance_id, "", EngineEvent::Process(ProcessEvent::Started));
    ctx.push_op(AtomicOperation::ActivityStart {
        execution_id: execution.id,
    });
    Ok(())
}

fn activity_start(
    ctx: &mut CommandContext,
    execution_id: &str,
) -> Result<()> {
    let mut execution = ctx.session.find_execution(execution_id)?;
    let aid = current_activity(&execution)?;
    let definition = ctx.definition(&execution.process_definition_id)?;
    let node = definition.activity(&aid)?.clone();

    ctx.emit(&execution.process_instance_id, &aid, EngineEvent::Activity(ActivityEvent::Started));

    // async continuation: persist a job and stop here, a worker re-enters
    // at the execute phase later
    if node.is_async {
        let job = Job {
            id: utils::longid(),
            handler_type: job::ASYNC_CONTINUATION.to_string(),
            handler_config: json!({}),
            due_date: Some(utils::time::time_millis()),
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
            &aid,
            EngineEvent::Job(crate::events::JobEvent::Created {
                job_id: job.id.clone(),
                handler_type: job.handler_type.clone(),
            }),
        );
        ctx.session.insert_job(job);
        execution.is_active = false;
        ctx.session.put_execution(execution);
        return Ok(());
    }

    ctx.push_op(AtomicOperation::ActivityExecute {
        execution_id: execution.id,
    });
    Ok(())
}

fn activity_execute(
    ctx: &mut CommandContext,
    execution_id: &str,
) -> Result<()> {
    let execution = ctx.session.find_execution(execution_id)?;
    let aid = current_activity(&execution)?;
    let definition = ctx.definition(&execution.process_definition_id)?;
    let node = definition.activity(&aid)?.clone();

    if node.attached_to.is_none() {
        boundary::create_attachments(ctx, &execution, &definition, &aid)?;
    }

    behavior::of(node.activity_type).execute(ctx, &execution, &definition, &node)
}

fn activity_end(
    ctx: &mut CommandContext,
    execution_id: &str,
) -> Result<()> {
    let execution = ctx.session.find_execution(execution_id)?;
    let aid = current_activity(&execution)?;
    let definition = ctx.definition(&execution.process_definition_id)?;
    let node = definition.activity(&aid)?.clone();

    ctx.emit(&execution.process_instance_id, &aid, EngineEvent::Activity(ActivityEvent::Completed));

    if let Some(handler) = &node.compensation_handler {
        // registered on the root so it survives inner scope teardown and
        // can be collected most-recent-first at throw time
        ctx.session.insert_subscription(crate::store::data::EventSubscription {
            id: utils::longid(),
            event_type: crate::store::data::EventSubscription::COMPENSATE.to_string(),
            event_name: node.id.clone(),
            execution_id: Some(execution.process_instance_id.clone()),
            process_instance_id: Some(execution.process_instance_id.clone()),
            process_definition_id: execution.process_definition_id.clone(),
            activity_id: handler.clone(),
            created: utils::time::time_millis(),
            rev: 1,
        });
    }

    if node.attached_to.is_none() {
        boundary::remove_attachments(ctx, &execution, &definition, &aid)?;
    }

    let outgoing = definition.outgoing(&aid);
    if outgoing.is_empty() {
        return flow_end(ctx, execution);
    }

    // parallel fan-out takes every outgoing transition unconditionally
    if node.activity_type == ActivityType::ParallelGateway && outgoing.len() > 1 {
        return fork(ctx, execution, &outgoing);
    }

    let transition = select_transition(ctx, &execution, &outgoing)?;
    ctx.push_op(AtomicOperation::TransitionTake {
        execution_id: execution.id,
        transition_id: transition.id,
    });
    Ok(())
}

/// Exclusive selection: the first transition whose condition holds (an
/// unconditioned non-default transition always holds), falling back to
/// the default transition.
fn select_transition(
    ctx: &mut CommandContext,
    execution: &Execution,
    outgoing: &[Transition],
) -> Result<Transition> {
    let vars = execution::variables_of(ctx, execution)?;

    for transition in outgoing.iter().filter(|t| !t.is_default) {
        let satisfied = match &transition.condition {
            Some(condition) => ctx.evaluate_condition(condition, &vars)?,
            None => true,
        };
        if satisfied {
            return Ok(transition.clone());
        }
    }
    outgoing
        .iter()
        .find(|t| t.is_default)
        .cloned()
        .ok_or_else(|| ProcflowError::Engine(format!("no outgoing transition satisfied at activity {:?}", execution.activity_id)))
}

fn fork(
    ctx: &mut CommandContext,
    mut execution: Execution,
    outgoing: &[Transition],
) -> Result<()> {
    execution.is_active = false;
    ctx.session.put_execution(execution.clone());

    for transition in outgoing {
        let child = execution::create_child(ctx, &execution, execution.activity_id.clone(), false, true);
        ctx.push_op(AtomicOperation::TransitionTake {
            execution_id: child.id,
            transition_id: transition.id.clone(),
        });
    }
    Ok(())
}

/// The current flow has no outgoing transition: close the branch, the
/// scope, or the whole process instance.
fn flow_end(
    ctx: &mut CommandContext,
    execution: Execution,
) -> Result<()> {
    if execution.is_compensation {
        return branch_end(ctx, execution);
    }
    if execution.parent_id.is_none() {
        // the instance ends only once no concurrent child (compensation
        // handler, non-interrupting boundary path) is left; the last one
        // re-enters here through branch_end
        if !execution::children(ctx, &execution.id)?.is_empty() {
            let mut root = execution;
            root.is_active = false;
            ctx.session.put_execution(root);
            return Ok(());
        }
        ctx.push_op(AtomicOperation::ProcessEnd {
            execution_id: execution.id,
        });
        return Ok(());
    }
    if execution.is_scope {
        ctx.push_op(AtomicOperation::TransitionDestroyScope {
            execution_id: execution.id,
        });
        return Ok(());
    }
    branch_end(ctx, execution)
}

/// A concurrent branch ended without a join. Delete it; when it was the
/// last one, its parent's flow ends too.
fn branch_end(
    ctx: &mut CommandContext,
    execution: Execution,
) -> Result<()> {
    let parent_id = execution.parent_id.clone();
    execution::delete_cascade(ctx, &execution.id, None)?;

    if let Some(parent_id) = parent_id {
        if execution::children(ctx, &parent_id)?.is_empty() {
            let parent = ctx.session.find_execution(&parent_id)?;
            // the parent closes with its last branch only when it is
            // parked at a path end or a fork, not in its own wait state
            if let Some(aid) = parent.activity_id.clone() {
                let definition = ctx.definition(&parent.process_definition_id)?;
                let at_fork = definition.activity(&aid)?.activity_type == ActivityType::ParallelGateway;
                if at_fork || definition.outgoing(&aid).is_empty() {
                    return flow_end(ctx, parent);
                }
            }
        }
    }
    Ok(())
}

fn transition_take(
    ctx: &mut CommandContext,
    execution_id: &str,
    transition_id: &str,
) -> Result<()> {
    let mut execution = ctx.session.find_execution(execution_id)?;
    let definition = ctx.definition(&execution.process_definition_id)?;
    let transition = definition.transition(transition_id)?;

    ctx.emit(
        &execution.process_instance_id,
        &transition.source,
        EngineEvent::Activity(ActivityEvent::SequenceFlowTaken {
            transition_id: transition.id.clone(),
        }),
    );

    execution.activity_id = Some(transition.target.clone());
    execution.is_active = true;
    ctx.session.put_execution(execution);
    ctx.push_op(AtomicOperation::ActivityStart {
        execution_id: execution_id.to_string(),
    });
    Ok(())
}

fn transition_create_scope(
    ctx: &mut CommandContext,
    execution_id: &str,
    activity_id: &str,
) -> Result<()> {
    let mut parent = ctx.session.find_execution(execution_id)?;
    let definition = ctx.definition(&parent.process_definition_id)?;
    let initial = definition.initial_activity(Some(activity_id))?.id.clone();

    parent.is_active = false;
    ctx.session.put_execution(parent.clone());

    let child = execution::create_child(ctx, &parent, Some(initial), true, false);
    ctx.push_op(AtomicOperation::ActivityStart {
        execution_id: child.id,
    });
    Ok(())
}

fn transition_destroy_scope(
    ctx: &mut CommandContext,
    execution_id: &str,
) -> Result<()> {
    let scope = ctx.session.find_execution(execution_id)?;
    let parent_id = scope
        .parent_id
        .clone()
        .ok_or_else(|| ProcflowError::InvalidState(format!("scope {} has no parent to destroy into", scope.id)))?;

    execution::delete_cascade(ctx, &scope.id, None)?;

    let mut parent = ctx.session.find_execution(&parent_id)?;
    parent.is_active = true;
    ctx.session.put_execution(parent);
    ctx.push_op(AtomicOperation::ActivityEnd {
        execution_id: parent_id,
    });
    Ok(())
}

fn process_end(
    ctx: &mut CommandContext,
    execution_id: &str,
) -> Result<()> {
    let root = ctx.session.find_execution(execution_id)?;
    let super_execution_id = root.super_execution_id.clone();
    let variables = execution::variables_of(ctx, &root)?;

    ctx.emit(&root.process_instance_id, "", EngineEvent::Process(ProcessEvent::Ended));
    execution::delete_cascade(ctx, &root.id, None)?;

    // a called instance hands its variables back and resumes the caller
    if let Some(super_id) = super_execution_id {
        let mut caller = ctx.session.find_execution(&super_id)?;
        execution::set_variables(ctx, &caller, &variables)?;
        caller.is_active = true;
        ctx.session.put_execution(caller);
        ctx.push_op(AtomicOperation::ActivityEnd {
            execution_id: super_id,
        });
    }
    Ok(())
}

/// The single resume entry point for wait states.
///
/// External API calls, job handlers, and event subscriptions all re-enter
/// the tree through here. The caller runs the trampoline afterwards.
pub fn signal(
    ctx: &mut CommandContext,
    execution_id: &str,
    signal_name: Option<&str>,
    payload: &Vars,
) -> Result<()> {
    let execution = ctx.session.find_execution(execution_id)?;
    if execution.is_active {
        return Err(ProcflowError::InvalidState(format!("execution {} is not in a wait state", execution_id)));
    }
    let aid = current_activity(&execution)?;
    let definition = ctx.definition(&execution.process_definition_id)?;
    let node = definition.activity(&aid)?.clone();

    behavior::of(node.activity_type).signal(ctx, &execution, &definition, &node, signal_name, payload)
}
