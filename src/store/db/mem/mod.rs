mod collect;

use std::{collections::HashMap, sync::Arc};

use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::{
    ProcflowError, Result,
    store::{DbCollection, DbStore, Store, data::*},
};
pub use collect::Collect;

/// In-memory storage backend, primarily for tests and embedded use.
#[derive(Debug, Clone)]
pub struct MemStore {
    process_definitions: Arc<Collect<ProcessDefinitionData>>,
    executions: Arc<Collect<Execution>>,
    variables: Arc<Collect<Variable>>,
    event_subscriptions: Arc<Collect<EventSubscription>>,
    jobs: Arc<Collect<Job>>,
    tasks: Arc<Collect<Task>>,
}

/// Record viewed as a JSON document, the mem backend's filter surface.
trait DbDocument: Entity + Serialize {
    fn doc(&self) -> Result<HashMap<String, JsonValue>> {
        match serde_json::to_value(self)? {
            JsonValue::Object(map) => Ok(map.into_iter().collect()),
            _ => Err(ProcflowError::Store("record is not a JSON object".to_string())),
        }
    }
}

impl<T: Entity + Serialize> DbDocument for T {}

impl DbStore for MemStore {
    fn init(
        &self,
        s: &Store,
    ) {
        s.register(self.process_definitions());
        s.register(self.executions());
        s.register(self.variables());
        s.register(self.event_subscriptions());
        s.register(self.jobs());
        s.register(self.tasks());
    }
}

impl Default for MemStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemStore {
    pub fn new() -> Self {
        let process_definitions = Collect::new("process_definition");
        let executions = Collect::new("execution");
        let variables = Collect::new("variable");
        let event_subscriptions = Collect::new("event_subscription");
        let jobs = Collect::new("job");
        let tasks = Collect::new("task");

        Self {
            process_definitions: Arc::new(process_definitions),
            executions: Arc::new(executions),
            variables: Arc::new(variables),
            event_subscriptions: Arc::new(event_subscriptions),
            jobs: Arc::new(jobs),
            tasks: Arc::new(tasks),
        }
    }

    pub fn process_definitions(&self) -> Arc<dyn DbCollection<Item = ProcessDefinitionData> + Send + Sync> {
        self.process_definitions.clone()
    }

    pub fn executions(&self) -> Arc<dyn DbCollection<Item = Execution> + Send + Sync> {
        self.executions.clone()
    }

    pub fn variables(&self) -> Arc<dyn DbCollection<Item = Variable> + Send + Sync> {
        self.variables.clone()
    }

    pub fn event_subscriptions(&self) -> Arc<dyn DbCollection<Item = EventSubscription> + Send + Sync> {
        self.event_subscriptions.clone()
    }

    pub fn jobs(&self) -> Arc<dyn DbCollection<Item = Job> + Send + Sync> {
        self.jobs.clone()
    }

    pub fn tasks(&self) -> Arc<dyn DbCollection<Item = Task> + Send + Sync> {
        self.tasks.clone()
    }
}
