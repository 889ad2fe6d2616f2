//! Signal and message event routing.
//!
//! A subscription either belongs to a waiting execution (catch or
//! boundary event) or, with no execution, is a deploy-time start
//! subscription that launches a fresh instance. Execution-bound
//! subscriptions are consumed when triggered; start subscriptions persist
//! until the definition is redeployed.

use serde_json::json;

use crate::{
    ProcflowError, Result,
    command::CommandContext,
    common::Vars,
    runtime::{atomic, boundary, execution},
    store::{
        data::EventSubscription,
        query::{Cond, Query},
    },
};

/// Broadcast: trigger every subscription for the signal name, across all
/// process instances, in one transaction.
pub fn signal_received(
    ctx: &mut CommandContext,
    name: &str,
    payload: &Vars,
) -> Result<()> {
    let query = Query::new()
        .push(Cond::Eq("event_type".into(), json!(EventSubscription::SIGNAL)))
        .push(Cond::Eq("event_name".into(), json!(name)));
    for sub in ctx.session.list_subscriptions(&query)? {
        trigger(ctx, sub, payload)?;
    }
    Ok(())
}

/// Point-to-point: trigger exactly one subscription for the message name,
/// optionally narrowed to one execution.
pub fn message_received(
    ctx: &mut CommandContext,
    name: &str,
    execution_id: Option<&str>,
    payload: &Vars,
) -> Result<()> {
    let mut query = Query::new()
        .push(Cond::Eq("event_type".into(), json!(EventSubscription::MESSAGE)))
        .push(Cond::Eq("event_name".into(), json!(name)));
    if let Some(execution_id) = execution_id {
        query = query.push(Cond::Eq("execution_id".into(), json!(execution_id)));
    }

    let sub = ctx
        .session
        .list_subscriptions(&query)?
        .into_iter()
        .next()
        .ok_or(ProcflowError::not_found("event_subscription", name))?;
    trigger(ctx, sub, payload)
}

fn trigger(
    ctx: &mut CommandContext,
    sub: EventSubscription,
    payload: &Vars,
) -> Result<()> {
    let Some(execution_id) = &sub.execution_id else {
        // start subscription
        let definition = ctx.definition(&sub.process_definition_id)?;
        execution::create_process_instance(ctx, &definition, None, None, payload)?;
        return Ok(());
    };

    ctx.session.remove_subscription(&sub.id);

    let target = ctx.session.find_execution(execution_id)?;
    let definition = ctx.definition(&target.process_definition_id)?;
    let node = definition.activity(&sub.activity_id)?.clone();

    if node.attached_to.is_some() {
        boundary::fire(ctx, &target, &node, payload)
    } else {
        atomic::signal(ctx, execution_id, Some(&sub.event_name), payload)
    }
}
