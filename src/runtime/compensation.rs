//! Compensation: undo completed work in reverse completion order.
//!
//! Completing an activity with a compensation handler registers a
//! compensate subscription on the instance root, so the registration
//! survives the teardown of the scope the activity ran in. A compensate
//! throw collects those subscriptions newest-first and runs each handler
//! on a short-lived concurrent execution.

use serde_json::json;

use crate::{
    Result,
    command::CommandContext,
    runtime::{AtomicOperation, execution},
    store::{
        data::{EventSubscription, Execution},
        query::{Cond, Query},
    },
};

pub fn trigger(
    ctx: &mut CommandContext,
    thrower: &Execution,
) -> Result<()> {
    let query = Query::new()
        .push(Cond::Eq("event_type".into(), json!(EventSubscription::COMPENSATE)))
        .push(Cond::Eq("process_instance_id".into(), json!(thrower.process_instance_id)))
        .order_by("created", true);

    for sub in ctx.session.list_subscriptions(&query)? {
        ctx.session.remove_subscription(&sub.id);

        let anchor_id = sub.execution_id.as_deref().unwrap_or(&thrower.process_instance_id);
        let anchor = ctx.session.find_execution(anchor_id)?;

        let mut handler = execution::create_child(ctx, &anchor, Some(sub.activity_id.clone()), false, true);
        handler.is_compensation = true;
        ctx.session.put_execution(handler.clone());
        ctx.push_op(AtomicOperation::ActivityStart {
            execution_id: handler.id,
        });
    }
    Ok(())
}
