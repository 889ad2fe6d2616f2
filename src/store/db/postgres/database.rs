use std::sync::Arc;

use tokio::runtime::Runtime;

use crate::store::{DbCollection, DbStore, Store, data::*};

use super::{DbInit, collection::*, synclient::SynClient};

pub struct PostgresStore {
    process_definitions: Arc<ProcessDefinitionCollection>,
    executions: Arc<ExecutionCollection>,
    variables: Arc<VariableCollection>,
    event_subscriptions: Arc<EventSubscriptionCollection>,
    jobs: Arc<JobCollection>,
    tasks: Arc<TaskCollection>,
}

impl DbStore for PostgresStore {
    fn init(
        &self,
        s: &Store,
    ) {
        self.process_definitions.init();
        self.executions.init();
        self.variables.init();
        self.event_subscriptions.init();
        self.jobs.init();
        self.tasks.init();

        s.register(self.process_definitions());
        s.register(self.executions());
        s.register(self.variables());
        s.register(self.event_subscriptions());
        s.register(self.jobs());
        s.register(self.tasks());
    }
}

impl PostgresStore {
    pub fn new(
        db_url: &str,
        runtime: Arc<Runtime>,
    ) -> Self {
        let conn = Arc::new(SynClient::connect(db_url, runtime));
        let process_definitions = ProcessDefinitionCollection::new(&conn);
        let executions = ExecutionCollection::new(&conn);
        let variables = VariableCollection::new(&conn);
        let event_subscriptions = EventSubscriptionCollection::new(&conn);
        let jobs = JobCollection::new(&conn);
        let tasks = TaskCollection::new(&conn);

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
