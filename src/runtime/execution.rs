//! Execution-tree helpers: instance creation, child management, cascade
//! deletion, and scope-aware variable access.
//!
//! In-memory references are rebuilt per command from ids; the store is the
//! only owner of an execution across command boundaries.

use serde_json::{Value as JsonValue, json};

use crate::{
    Result,
    command::CommandContext,
    common::Vars,
    events::{ActivityEvent, EngineEvent, VariableEvent},
    model::ProcessDefinition,
    runtime::AtomicOperation,
    store::{
        data::{Execution, Variable},
        query::{Cond, Query},
    },
    utils,
};

/// Create the root execution of a fresh process instance and queue its
/// `ProcessStart`.
pub fn create_process_instance(
    ctx: &mut CommandContext,
    definition: &ProcessDefinition,
    business_key: Option<String>,
    super_execution_id: Option<String>,
    variables: &Vars,
) -> Result<Execution> {
    let id = utils::longid();
    let execution = Execution {
        id: id.clone(),
        parent_id: None,
        process_instance_id: id.clone(),
        process_definition_id: definition.id.clone(),
        activity_id: None,
        is_active: true,
        is_scope: true,
        is_concurrent: false,
        is_compensation: false,
        business_key,
        super_execution_id,
        start_time: utils::time::time_millis(),
        rev: 1,
    };
    ctx.session.insert_execution(execution.clone());

    for (name, value) in variables.iter() {
        create_variable(ctx, &execution, name, value.clone());
    }

    ctx.push_op(AtomicOperation::ProcessStart {
        execution_id: id,
    });
    Ok(execution)
}

/// Create a child execution under `parent`.
pub fn create_child(
    ctx: &mut CommandContext,
    parent: &Execution,
    activity_id: Option<String>,
    is_scope: bool,
    is_concurrent: bool,
) -> Execution {
    let child = Execution {
        id: utils::longid(),
        parent_id: Some(parent.id.clone()),
        process_instance_id: parent.process_instance_id.clone(),
        process_definition_id: parent.process_definition_id.clone(),
        activity_id,
        is_active: true,
        is_scope,
        is_concurrent,
        is_compensation: false,
        business_key: None,
        super_execution_id: None,
        start_time: utils::time::time_millis(),
        rev: 1,
    };
    ctx.session.insert_execution(child.clone());
    child
}

pub fn children(
    ctx: &mut CommandContext,
    parent_id: &str,
) -> Result<Vec<Execution>> {
    ctx.session.list_executions(&Query::new().push(Cond::Eq("parent_id".into(), json!(parent_id))))
}

/// Delete an execution and everything it owns: descendant executions,
/// variables, event subscriptions, tasks, and jobs. A cancel reason emits
/// an activity-cancelled event for the execution's current activity.
pub fn delete_cascade(
    ctx: &mut CommandContext,
    execution_id: &str,
    cancel_reason: Option<&str>,
) -> Result<()> {
    let execution = match ctx.session.find_execution(execution_id) {
        Ok(execution) => execution,
        // already gone, nothing to cascade
        Err(err) if matches!(err, crate::ProcflowError::NotFound { .. }) => return Ok(()),
        Err(err) => return Err(err),
    };

    for child in children(ctx, execution_id)? {
        delete_cascade(ctx, &child.id, cancel_reason)?;
    }
    delete_owned(ctx, execution_id)?;

    if let (Some(reason), Some(aid)) = (cancel_reason, &execution.activity_id) {
        ctx.emit(
            &execution.process_instance_id,
            aid,
            EngineEvent::Activity(ActivityEvent::Cancelled {
                reason: reason.to_string(),
            }),
        );
    }

    ctx.session.remove_execution(execution_id);
    Ok(())
}

/// Remove the variables, subscriptions, tasks, and jobs owned by one
/// execution, without touching the execution itself.
pub fn delete_owned(
    ctx: &mut CommandContext,
    execution_id: &str,
) -> Result<()> {
    let owned = Query::new().push(Cond::Eq("execution_id".into(), json!(execution_id)));

    for variable in ctx.session.list_variables(&owned)? {
        ctx.session.remove_variable(&variable.id);
    }
    for subscription in ctx.session.list_subscriptions(&owned)? {
        ctx.session.remove_subscription(&subscription.id);
    }
    for task in ctx.session.list_tasks(&owned)? {
        ctx.session.remove_task(&task.id);
    }
    for job in ctx.session.list_jobs(&owned)? {
        ctx.session.remove_job(&job.id);
    }
    Ok(())
}

/// The nearest enclosing scope: the execution itself when it is one, else
/// the closest ancestor that is (the root always is).
pub fn scope_of(
    ctx: &mut CommandContext,
    execution: &Execution,
) -> Result<Execution> {
    let mut current = execution.clone();
    while !current.is_scope {
        match &current.parent_id {
            Some(parent_id) => current = ctx.session.find_execution(parent_id)?,
            None => break,
        }
    }
    Ok(current)
}

fn variable_row(
    ctx: &mut CommandContext,
    scope_id: &str,
    name: &str,
) -> Result<Option<Variable>> {
    let rows = ctx
        .session
        .list_variables(&Query::new().push(Cond::Eq("execution_id".into(), json!(scope_id))).push(Cond::Eq("name".into(), json!(name))))?;
    Ok(rows.into_iter().next())
}

fn create_variable(
    ctx: &mut CommandContext,
    scope: &Execution,
    name: &str,
    value: JsonValue,
) {
    ctx.session.insert_variable(Variable {
        id: utils::longid(),
        name: name.to_string(),
        execution_id: scope.id.clone(),
        process_instance_id: scope.process_instance_id.clone(),
        value,
        rev: 1,
    });
    ctx.emit(
        &scope.process_instance_id,
        scope.activity_id.as_deref().unwrap_or(""),
        EngineEvent::Variable(VariableEvent::Created {
            name: name.to_string(),
        }),
    );
}

/// Set one variable with global lookup semantics: an existing variable on
/// any enclosing scope is updated where it lives; otherwise the variable
/// is created on the nearest scope.
pub fn set_variable(
    ctx: &mut CommandContext,
    execution: &Execution,
    name: &str,
    value: JsonValue,
) -> Result<()> {
    let nearest = scope_of(ctx, execution)?;

    let mut scope = nearest.clone();
    loop {
        if let Some(mut row) = variable_row(ctx, &scope.id, name)? {
            row.value = value;
            ctx.session.put_variable(row);
            ctx.emit(
                &scope.process_instance_id,
                execution.activity_id.as_deref().unwrap_or(""),
                EngineEvent::Variable(VariableEvent::Updated {
                    name: name.to_string(),
                }),
            );
            return Ok(());
        }
        match &scope.parent_id {
            Some(parent_id) => {
                let parent = ctx.session.find_execution(parent_id)?;
                scope = scope_of(ctx, &parent)?;
            }
            None => break,
        }
    }

    create_variable(ctx, &nearest, name, value);
    Ok(())
}

pub fn set_variables(
    ctx: &mut CommandContext,
    execution: &Execution,
    variables: &Vars,
) -> Result<()> {
    for (name, value) in variables.iter() {
        set_variable(ctx, execution, name, value.clone())?;
    }
    Ok(())
}

/// All variables visible from an execution, inner scopes shadowing outer
/// ones.
pub fn variables_of(
    ctx: &mut CommandContext,
    execution: &Execution,
) -> Result<Vars> {
    let mut chain = Vec::new();
    let mut scope = scope_of(ctx, execution)?;
    loop {
        chain.push(scope.clone());
        match &scope.parent_id {
            Some(parent_id) => {
                let parent = ctx.session.find_execution(parent_id)?;
                scope = scope_of(ctx, &parent)?;
            }
            None => break,
        }
    }

    let mut vars = Vars::new();
    // outermost first so inner scopes win
    for scope in chain.iter().rev() {
        let rows = ctx.session.list_variables(&Query::new().push(Cond::Eq("execution_id".into(), json!(scope.id))))?;
        for row in rows {
            vars.set(&row.name, row.value.clone());
        }
    }
    Ok(vars)
}
