//! Public process-instance commands.

use crate::{
    ProcflowError, Result,
    command::{Command, CommandContext},
    common::Vars,
    runtime::{atomic, execution, subscription},
};

/// Start a process instance from a definition id or the latest version of
/// a key. Runs synchronously until every leaf reaches a wait state or the
/// instance completes; returns the process instance id.
pub struct StartProcessInstanceCmd {
    pub definition_id: Option<String>,
    pub key: Option<String>,
    pub business_key: Option<String>,
    pub variables: Vars,
}

impl Command for StartProcessInstanceCmd {
    type Output = String;

    fn execute(
        &self,
        ctx: &mut CommandContext,
    ) -> Result<String> {
        let definition = match (&self.definition_id, &self.key) {
            (Some(id), _) => ctx.definition(id)?,
            (None, Some(key)) => ctx.definitions().latest_by_key(key)?,
            (None, None) => return Err(ProcflowError::Engine("start requires a definition id or a key".to_string())),
        };

        let root = execution::create_process_instance(ctx, &definition, self.business_key.clone(), None, &self.variables)?;
        atomic::run(ctx)?;
        Ok(root.process_instance_id)
    }
}

/// Resume a waiting execution directly (receive task, catch event).
pub struct SignalExecutionCmd {
    pub execution_id: String,
    pub payload: Vars,
}

impl Command for SignalExecutionCmd {
    type Output = ();

    fn execute(
        &self,
        ctx: &mut CommandContext,
    ) -> Result<()> {
        atomic::signal(ctx, &self.execution_id, None, &self.payload)?;
        atomic::run(ctx)
    }
}

/// Complete a user task and continue its execution.
pub struct CompleteTaskCmd {
    pub task_id: String,
    pub variables: Vars,
}

impl Command for CompleteTaskCmd {
    type Output = ();

    fn execute(
        &self,
        ctx: &mut CommandContext,
    ) -> Result<()> {
        let task = ctx.session.find_task(&self.task_id)?;
        atomic::signal(ctx, &task.execution_id, None, &self.variables)?;
        atomic::run(ctx)
    }
}

/// Broadcast a named signal to every matching subscription.
pub struct SignalEventReceivedCmd {
    pub name: String,
    pub payload: Vars,
}

impl Command for SignalEventReceivedCmd {
    type Output = ();

    fn execute(
        &self,
        ctx: &mut CommandContext,
    ) -> Result<()> {
        subscription::signal_received(ctx, &self.name, &self.payload)?;
        atomic::run(ctx)
    }
}

/// Deliver a named message to exactly one matching subscription.
pub struct MessageEventReceivedCmd {
    pub name: String,
    pub execution_id: Option<String>,
    pub payload: Vars,
}

impl Command for MessageEventReceivedCmd {
    type Output = ();

    fn execute(
        &self,
        ctx: &mut CommandContext,
    ) -> Result<()> {
        subscription::message_received(ctx, &self.name, self.execution_id.as_deref(), &self.payload)?;
        atomic::run(ctx)
    }
}
