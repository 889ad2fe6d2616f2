//! Process deployment.

use std::sync::Arc;

use serde_json::json;
use tracing::info;

use crate::{
    Result,
    command::{Command, CommandContext},
    job,
    model::{EventDefinition, ProcessDefinition, ProcessModel},
    store::{
        data::{EventSubscription, Job, ProcessDefinitionData},
        query::{Cond, Query},
    },
    utils,
};

/// Deploy a process model as the next version of its key.
///
/// The previous version stays startable by id; its start subscriptions
/// and timer-start jobs are replaced so event- and timer-started
/// instances always run the newest version. Returns the definition id.
pub struct DeployCmd {
    pub model: ProcessModel,
}

impl Command for DeployCmd {
    type Output = String;

    fn execute(
        &self,
        ctx: &mut CommandContext,
    ) -> Result<String> {
        let latest = ctx
            .session
            .list_definitions(&Query::new().push(Cond::Eq("key".into(), json!(self.model.key))).order_by("version", true).limit(1))?;
        let previous = latest.into_iter().next();
        let version = previous.as_ref().map(|d| d.version + 1).unwrap_or(1);

        let definition = Arc::new(ProcessDefinition::build(&self.model, version)?);
        let data = ProcessDefinitionData {
            id: definition.id.clone(),
            key: definition.key.clone(),
            version,
            name: definition.name.clone(),
            data: serde_json::to_string(&self.model)?,
            deploy_time: utils::time::time_millis(),
            rev: 1,
        };
        ctx.session.insert_definition(data);

        if let Some(previous) = &previous {
            remove_start_registrations(ctx, &previous.id)?;
        }
        create_start_registrations(ctx, &definition)?;

        let id = definition.id.clone();
        ctx.definitions().set(definition);
        info!("deployed process {} as {}", self.model.key, id);
        Ok(id)
    }
}

fn remove_start_registrations(
    ctx: &mut CommandContext,
    definition_id: &str,
) -> Result<()> {
    let subs = Query::new()
        .push(Cond::Eq("process_definition_id".into(), json!(definition_id)))
        .push(Cond::IsNull("execution_id".into()));
    for sub in ctx.session.list_subscriptions(&subs)? {
        ctx.session.remove_subscription(&sub.id);
    }

    let jobs = Query::new()
        .push(Cond::Eq("handler_type".into(), json!(job::TIMER_START_EVENT)))
        .push(Cond::Eq("process_definition_id".into(), json!(definition_id)));
    for job in ctx.session.list_jobs(&jobs)? {
        ctx.session.remove_job(&job.id);
    }
    Ok(())
}

fn create_start_registrations(
    ctx: &mut CommandContext,
    definition: &ProcessDefinition,
) -> Result<()> {
    for start in definition.start_events() {
        match &start.event {
            Some(EventDefinition::Signal {
                name,
            })
            | Some(EventDefinition::Message {
                name,
            }) => {
                let event_type = if matches!(&start.event, Some(EventDefinition::Signal { .. })) {
                    EventSubscription::SIGNAL
                } else {
                    EventSubscription::MESSAGE
                };
                ctx.session.insert_subscription(EventSubscription {
                    id: utils::longid(),
                    event_type: event_type.to_string(),
                    event_name: name.clone(),
                    execution_id: None,
                    process_instance_id: None,
                    process_definition_id: definition.id.clone(),
                    activity_id: start.id.clone(),
                    created: utils::time::time_millis(),
                    rev: 1,
                });
            }
            Some(EventDefinition::Timer {
                ..
            }) => {
                let timer = start.timer()?;
                ctx.session.insert_job(Job {
                    id: utils::longid(),
                    handler_type: job::TIMER_START_EVENT.to_string(),
                    handler_config: json!({
                        "activity_id": start.id,
                        "repeat": timer.repeat,
                        "duration_millis": timer.duration_millis,
                    }),
                    due_date: Some(utils::time::time_millis() + timer.duration_millis),
                    retries: ctx.config().job_executor.default_retries,
                    exclusive: false,
                    state: Job::AVAILABLE.to_string(),
                    lock_owner: None,
                    lock_expiration: None,
                    exception: None,
                    execution_id: None,
                    process_instance_id: None,
                    process_definition_id: Some(definition.id.clone()),
                    created: utils::time::time_millis(),
                    rev: 1,
                });
            }
            _ => {}
        }
    }
    Ok(())
}
