//! Process engine - the main entry point for Procflow.
//!
//! The engine owns the tokio runtime, the storage backend, the command
//! executor, the committed-event channel, and the background job
//! executor. All public operations run synchronously as commands; work
//! behind wait states is picked up by the job executor.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use serde_json::json;
use tokio::runtime::{Builder, Runtime};
use tracing::info;

use crate::{
    Config, ProcflowError, Result, StoreType,
    command::{CommandExecutor, CompleteTaskCmd, DeployCmd, MessageEventReceivedCmd, SignalEventReceivedCmd, SignalExecutionCmd, StartProcessInstanceCmd},
    common::Vars,
    job::{JobExecutor, JobHandlers},
    model::ProcessModel,
    runtime::{Channel, ConditionEvaluator, Definitions, TruthyConditionEvaluator},
    store::{
        DbStore, MemStore, PostgresStore, Store,
        data::{Execution, Job, Task},
        query::{Cond, Query},
    },
};

/// The central coordinator: wires the store, the definition cache, the
/// command executor, the event channel, and the job executor together.
///
/// # Example
///
/// ```rust,ignore
/// let engine = Engine::new_with_config(Config::default());
/// engine.launch();
///
/// let id = engine.deploy(&model)?;
/// let pid = engine.start_process_by_id(&id, &vars)?;
///
/// engine.shutdown();
/// ```
pub struct Engine {
    config: Arc<Config>,
    channel: Arc<Channel>,
    store: Arc<Store>,
    executor: Arc<CommandExecutor>,
    job_executor: JobExecutor,

    running: Arc<AtomicBool>,
}

impl Engine {
    pub fn new_with_config(config: Config) -> Self {
        let runtime = Arc::new(Builder::new_multi_thread().worker_threads(config.async_worker_thread_number.into()).enable_all().build().unwrap());
        Self::new(config, runtime, JobHandlers::default_handlers(), Arc::new(TruthyConditionEvaluator))
    }

    pub(crate) fn new(
        config: Config,
        runtime: Arc<Runtime>,
        handlers: JobHandlers,
        condition: Arc<dyn ConditionEvaluator>,
    ) -> Self {
        let store = Store::new();
        let db: Box<dyn DbStore> = match &config.store.store_type {
            StoreType::Mem => Box::new(MemStore::new()),
            StoreType::Postgres => {
                let postgres = config.store.postgres.as_ref().expect("Postgres configuration is required when store type is Postgres");
                Box::new(PostgresStore::new(&postgres.database_url, runtime.clone()))
            }
        };
        db.init(&store);

        let config = Arc::new(config);
        let store = Arc::new(store);
        let channel = Arc::new(Channel::new(runtime.clone()));
        let definitions = Arc::new(Definitions::new(store.clone()));
        let executor = Arc::new(CommandExecutor::new(
            config.clone(),
            store.clone(),
            definitions.clone(),
            Arc::new(handlers),
            condition,
            channel.clone(),
        ));
        let job_executor = JobExecutor::new(config.clone(), executor.clone(), runtime.clone());

        Self {
            config,
            channel,
            store,
            executor,
            job_executor,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Start the channel dispatch loop and, when enabled, the job
    /// executor's acquisition and worker loops.
    pub fn launch(&self) {
        if self.running.swap(true, Ordering::Relaxed) {
            return;
        }

        self.channel.listen();
        if self.config.job_executor.enabled {
            self.job_executor.start();
        }
        info!("engine launched");
    }

    pub fn shutdown(&self) {
        if !self.running.swap(false, Ordering::Relaxed) {
            return;
        }

        self.job_executor.shutdown();
        self.channel.shutdown();
        info!("engine stopped");
    }

    /// Deploy a process model as the next version of its key; returns the
    /// definition id (`key:version`).
    pub fn deploy(
        &self,
        model: &ProcessModel,
    ) -> Result<String> {
        self.executor.execute(&DeployCmd {
            model: model.clone(),
        })
    }

    /// Start a process instance from an exact definition id.
    pub fn start_process_by_id(
        &self,
        definition_id: &str,
        variables: &Vars,
    ) -> Result<String> {
        self.ensure_running()?;
        self.executor.execute(&StartProcessInstanceCmd {
            definition_id: Some(definition_id.to_string()),
            key: None,
            business_key: None,
            variables: variables.clone(),
        })
    }

    /// Start a process instance from the latest deployed version of a
    /// key, optionally tagged with a business key.
    pub fn start_process_by_key(
        &self,
        key: &str,
        business_key: Option<String>,
        variables: &Vars,
    ) -> Result<String> {
        self.ensure_running()?;
        self.executor.execute(&StartProcessInstanceCmd {
            definition_id: None,
            key: Some(key.to_string()),
            business_key,
            variables: variables.clone(),
        })
    }

    /// Resume an execution waiting in a receive task or catch event.
    pub fn signal_execution(
        &self,
        execution_id: &str,
        payload: &Vars,
    ) -> Result<()> {
        self.executor.execute(&SignalExecutionCmd {
            execution_id: execution_id.to_string(),
            payload: payload.clone(),
        })
    }

    /// Complete a user task.
    pub fn complete_task(
        &self,
        task_id: &str,
        variables: &Vars,
    ) -> Result<()> {
        self.executor.execute(&CompleteTaskCmd {
            task_id: task_id.to_string(),
            variables: variables.clone(),
        })
    }

    /// Broadcast a named signal to every waiting subscription and signal
    /// start event.
    pub fn signal_event(
        &self,
        name: &str,
        payload: &Vars,
    ) -> Result<()> {
        self.executor.execute(&SignalEventReceivedCmd {
            name: name.to_string(),
            payload: payload.clone(),
        })
    }

    /// Deliver a named message to exactly one subscription.
    pub fn message_event(
        &self,
        name: &str,
        execution_id: Option<&str>,
        payload: &Vars,
    ) -> Result<()> {
        self.executor.execute(&MessageEventReceivedCmd {
            name: name.to_string(),
            execution_id: execution_id.map(|s| s.to_string()),
            payload: payload.clone(),
        })
    }

    /// All executions of a process instance. Empty once the instance
    /// completed.
    pub fn executions(
        &self,
        process_instance_id: &str,
    ) -> Result<Vec<Execution>> {
        Ok(self.store.executions().query(&Query::new().push(Cond::Eq("process_instance_id".into(), json!(process_instance_id))))?.rows)
    }

    /// Open tasks of a process instance.
    pub fn tasks(
        &self,
        process_instance_id: &str,
    ) -> Result<Vec<Task>> {
        Ok(self.store.tasks().query(&Query::new().push(Cond::Eq("process_instance_id".into(), json!(process_instance_id))))?.rows)
    }

    /// Variables of a process instance across all of its scopes.
    pub fn variables(
        &self,
        process_instance_id: &str,
    ) -> Result<Vars> {
        let rows = self.store.variables().query(&Query::new().push(Cond::Eq("process_instance_id".into(), json!(process_instance_id))))?.rows;
        let mut vars = Vars::new();
        for row in rows {
            vars.set(&row.name, row.value.clone());
        }
        Ok(vars)
    }

    pub fn dead_letter_jobs(&self) -> Result<Vec<Job>> {
        Ok(self.store.jobs().query(&Query::new().push(Cond::Eq("state".into(), json!(Job::DEADLETTER))))?.rows)
    }

    /// Block until no runnable job remains or the timeout elapses. A
    /// dead-lettered job counts as settled.
    pub fn wait_for_jobs(
        &self,
        timeout: std::time::Duration,
    ) -> Result<()> {
        let deadline = std::time::Instant::now() + timeout;
        loop {
            let open = self
                .store
                .jobs()
                .query(&Query::new().push(Cond::Eq("state".into(), json!(Job::AVAILABLE))))?
                .count;
            if open == 0 {
                return Ok(());
            }
            if std::time::Instant::now() >= deadline {
                return Err(ProcflowError::Engine(format!("{} jobs still open after {:?}", open, timeout)));
            }
            std::thread::sleep(std::time::Duration::from_millis(20));
        }
    }

    pub fn channel(&self) -> Arc<Channel> {
        self.channel.clone()
    }

    pub fn store(&self) -> Arc<Store> {
        self.store.clone()
    }

    fn ensure_running(&self) -> Result<()> {
        if !self.running.load(Ordering::Relaxed) {
            return Err(ProcflowError::Engine("Engine is not running".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use serde_json::json;

    use crate::{Config, Engine, EngineBuilder, Vars, model::ProcessModel, store::query::Query};

    fn engine() -> Engine {
        let mut config = Config::default();
        config.async_worker_thread_number = 4;
        config.job_executor.wait_interval_millis = 20;
        config.job_executor.retry_wait_millis = 0;
        let engine = EngineBuilder::new().config(config).build().unwrap();
        engine.launch();
        engine
    }

    fn deploy(
        engine: &Engine,
        model: serde_json::Value,
    ) -> String {
        engine.deploy(&ProcessModel::from_json(&model.to_string()).unwrap()).unwrap()
    }

    #[test]
    fn test_user_task_lifecycle() {
        let engine = engine();
        let id = deploy(
            &engine,
            json!({
                "key": "review",
                "activities": [
                    { "id": "start", "type": "start_event" },
                    { "id": "approve", "type": "user_task", "name": "Approve" },
                    { "id": "end", "type": "end_event" }
                ],
                "transitions": [
                    { "id": "t1", "source": "start", "target": "approve" },
                    { "id": "t2", "source": "approve", "target": "end" }
                ]
            }),
        );

        let pid = engine.start_process_by_id(&id, &Vars::new()).unwrap();
        let tasks = engine.tasks(&pid).unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].name, "Approve");
        assert_eq!(engine.executions(&pid).unwrap().len(), 1);

        engine.complete_task(&tasks[0].id, &Vars::new()).unwrap();
        assert!(engine.executions(&pid).unwrap().is_empty());
        assert!(engine.tasks(&pid).unwrap().is_empty());
        engine.shutdown();
    }

    #[test]
    fn test_exclusive_gateway_routing() {
        let engine = engine();
        let id = deploy(
            &engine,
            json!({
                "key": "route",
                "activities": [
                    { "id": "start", "type": "start_event" },
                    { "id": "gw", "type": "exclusive_gateway" },
                    { "id": "a", "type": "user_task", "name": "A" },
                    { "id": "b", "type": "user_task", "name": "B" },
                    { "id": "end", "type": "end_event" }
                ],
                "transitions": [
                    { "id": "t1", "source": "start", "target": "gw" },
                    { "id": "t2", "source": "gw", "target": "a", "condition": "approved" },
                    { "id": "t3", "source": "gw", "target": "b", "is_default": true },
                    { "id": "t4", "source": "a", "target": "end" },
                    { "id": "t5", "source": "b", "target": "end" }
                ]
            }),
        );

        let mut vars = Vars::new();
        vars.set("approved", true);
        let pid = engine.start_process_by_id(&id, &vars).unwrap();
        assert_eq!(engine.tasks(&pid).unwrap()[0].name, "A");

        let pid = engine.start_process_by_id(&id, &Vars::new()).unwrap();
        assert_eq!(engine.tasks(&pid).unwrap()[0].name, "B");
        engine.shutdown();
    }

    #[test]
    fn test_parallel_fork_and_join() {
        let engine = engine();
        let id = deploy(
            &engine,
            json!({
                "key": "par",
                "activities": [
                    { "id": "start", "type": "start_event" },
                    { "id": "fork", "type": "parallel_gateway" },
                    { "id": "sa", "type": "service_task" },
                    { "id": "sb", "type": "service_task" },
                    { "id": "join", "type": "parallel_gateway" },
                    { "id": "after", "type": "user_task", "name": "After" },
                    { "id": "end", "type": "end_event" }
                ],
                "transitions": [
                    { "id": "t1", "source": "start", "target": "fork" },
                    { "id": "t2", "source": "fork", "target": "sa" },
                    { "id": "t3", "source": "fork", "target": "sb" },
                    { "id": "t4", "source": "sa", "target": "join" },
                    { "id": "t5", "source": "sb", "target": "join" },
                    { "id": "t6", "source": "join", "target": "after" },
                    { "id": "t7", "source": "after", "target": "end" }
                ]
            }),
        );

        let pid = engine.start_process_by_id(&id, &Vars::new()).unwrap();
        // the join fired exactly once and removed both branches
        let tasks = engine.tasks(&pid).unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(engine.executions(&pid).unwrap().len(), 1);

        engine.complete_task(&tasks[0].id, &Vars::new()).unwrap();
        assert!(engine.executions(&pid).unwrap().is_empty());
        engine.shutdown();
    }

    #[test]
    fn test_boundary_timer_escalates_subprocess() {
        let engine = engine();
        let id = deploy(
            &engine,
            json!({
                "key": "slow",
                "activities": [
                    { "id": "start", "type": "start_event" },
                    { "id": "sub", "type": "sub_process" },
                    { "id": "s2", "type": "start_event", "parent": "sub" },
                    { "id": "hold", "type": "receive_task", "parent": "sub" },
                    { "id": "e2", "type": "end_event", "parent": "sub" },
                    { "id": "late", "type": "boundary_event", "attached_to": "sub", "event": { "kind": "timer", "time": "PT1S" } },
                    { "id": "escalate", "type": "user_task", "name": "Escalate" },
                    { "id": "end", "type": "end_event" }
                ],
                "transitions": [
                    { "id": "t1", "source": "start", "target": "sub" },
                    { "id": "t2", "source": "s2", "target": "hold" },
                    { "id": "t3", "source": "hold", "target": "e2" },
                    { "id": "t4", "source": "sub", "target": "end" },
                    { "id": "t5", "source": "late", "target": "escalate" },
                    { "id": "t6", "source": "escalate", "target": "end" }
                ]
            }),
        );

        let pid = engine.start_process_by_id(&id, &Vars::new()).unwrap();
        // waiting inside the subprocess, timer armed
        assert_eq!(engine.executions(&pid).unwrap().len(), 2);

        engine.wait_for_jobs(Duration::from_secs(10)).unwrap();
        let tasks = engine.tasks(&pid).unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].name, "Escalate");
        assert_eq!(engine.executions(&pid).unwrap().len(), 1);

        engine.complete_task(&tasks[0].id, &Vars::new()).unwrap();
        assert!(engine.executions(&pid).unwrap().is_empty());
        engine.shutdown();
    }

    #[test]
    fn test_async_service_task_continues_in_background() {
        let engine = engine();
        let id = deploy(
            &engine,
            json!({
                "key": "async",
                "activities": [
                    { "id": "start", "type": "start_event" },
                    { "id": "work", "type": "service_task", "is_async": true },
                    { "id": "end", "type": "end_event" }
                ],
                "transitions": [
                    { "id": "t1", "source": "start", "target": "work" },
                    { "id": "t2", "source": "work", "target": "end" }
                ]
            }),
        );

        let pid = engine.start_process_by_id(&id, &Vars::new()).unwrap();
        engine.wait_for_jobs(Duration::from_secs(10)).unwrap();

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while !engine.executions(&pid).unwrap().is_empty() {
            assert!(std::time::Instant::now() < deadline, "instance did not complete");
            std::thread::sleep(Duration::from_millis(20));
        }
        engine.shutdown();
    }

    #[test]
    fn test_signal_catch_round_trip() {
        let engine = engine();
        let id = deploy(
            &engine,
            json!({
                "key": "sig",
                "activities": [
                    { "id": "start", "type": "start_event" },
                    { "id": "wait", "type": "intermediate_catch_event", "event": { "kind": "signal", "name": "go" } },
                    { "id": "after", "type": "user_task", "name": "After" },
                    { "id": "end", "type": "end_event" }
                ],
                "transitions": [
                    { "id": "t1", "source": "start", "target": "wait" },
                    { "id": "t2", "source": "wait", "target": "after" },
                    { "id": "t3", "source": "after", "target": "end" }
                ]
            }),
        );

        let pid = engine.start_process_by_id(&id, &Vars::new()).unwrap();
        let mut payload = Vars::new();
        payload.set("result", 42);
        engine.signal_event("go", &payload).unwrap();

        // the payload became process variables readable while waiting
        assert_eq!(engine.variables(&pid).unwrap().get::<i64>("result"), Some(42));
        let tasks = engine.tasks(&pid).unwrap();
        assert_eq!(tasks.len(), 1);
        engine.complete_task(&tasks[0].id, &Vars::new()).unwrap();
        assert!(engine.executions(&pid).unwrap().is_empty());
        engine.shutdown();
    }

    #[test]
    fn test_message_delivered_to_one_subscription() {
        let engine = engine();
        let id = deploy(
            &engine,
            json!({
                "key": "msg",
                "activities": [
                    { "id": "start", "type": "start_event" },
                    { "id": "wait", "type": "intermediate_catch_event", "event": { "kind": "message", "name": "order" } },
                    { "id": "end", "type": "end_event" }
                ],
                "transitions": [
                    { "id": "t1", "source": "start", "target": "wait" },
                    { "id": "t2", "source": "wait", "target": "end" }
                ]
            }),
        );

        let pid = engine.start_process_by_id(&id, &Vars::new()).unwrap();
        engine.message_event("order", None, &Vars::new()).unwrap();
        assert!(engine.executions(&pid).unwrap().is_empty());

        // nothing left to receive the same message again
        assert!(engine.message_event("order", None, &Vars::new()).is_err());
        engine.shutdown();
    }

    #[test]
    fn test_error_end_event_caught_by_boundary() {
        let engine = engine();
        let id = deploy(
            &engine,
            json!({
                "key": "err",
                "activities": [
                    { "id": "start", "type": "start_event" },
                    { "id": "risky", "type": "sub_process" },
                    { "id": "s2", "type": "start_event", "parent": "risky" },
                    { "id": "boom", "type": "end_event", "parent": "risky", "event": { "kind": "error", "code": "E1" } },
                    { "id": "catch", "type": "boundary_event", "attached_to": "risky", "event": { "kind": "error", "code": "E1" } },
                    { "id": "handle", "type": "user_task", "name": "Handle" },
                    { "id": "end", "type": "end_event" }
                ],
                "transitions": [
                    { "id": "t1", "source": "start", "target": "risky" },
                    { "id": "t2", "source": "s2", "target": "boom" },
                    { "id": "t3", "source": "risky", "target": "end" },
                    { "id": "t4", "source": "catch", "target": "handle" },
                    { "id": "t5", "source": "handle", "target": "end" }
                ]
            }),
        );

        let pid = engine.start_process_by_id(&id, &Vars::new()).unwrap();
        let tasks = engine.tasks(&pid).unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].name, "Handle");
        engine.shutdown();
    }

    #[test]
    fn test_call_activity_returns_variables_to_caller() {
        let engine = engine();
        deploy(
            &engine,
            json!({
                "key": "child-proc",
                "activities": [
                    { "id": "cstart", "type": "start_event" },
                    { "id": "cend", "type": "end_event" }
                ],
                "transitions": [
                    { "id": "ct1", "source": "cstart", "target": "cend" }
                ]
            }),
        );
        let id = deploy(
            &engine,
            json!({
                "key": "parent-proc",
                "activities": [
                    { "id": "start", "type": "start_event" },
                    { "id": "call", "type": "call_activity", "called_element": "child-proc" },
                    { "id": "after", "type": "user_task", "name": "After" },
                    { "id": "end", "type": "end_event" }
                ],
                "transitions": [
                    { "id": "t1", "source": "start", "target": "call" },
                    { "id": "t2", "source": "call", "target": "after" },
                    { "id": "t3", "source": "after", "target": "end" }
                ]
            }),
        );

        let mut vars = Vars::new();
        vars.set("x", 1);
        let pid = engine.start_process_by_id(&id, &vars).unwrap();

        // the child ran to completion synchronously and the caller moved on
        let tasks = engine.tasks(&pid).unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(engine.variables(&pid).unwrap().get::<i64>("x"), Some(1));
        engine.shutdown();
    }

    #[test]
    fn test_compensation_runs_registered_handler() {
        let engine = engine();
        let id = deploy(
            &engine,
            json!({
                "key": "comp",
                "activities": [
                    { "id": "start", "type": "start_event" },
                    { "id": "step", "type": "service_task", "compensation_handler": "undo" },
                    { "id": "undo", "type": "user_task", "name": "Undo" },
                    { "id": "endc", "type": "end_event", "event": { "kind": "compensate" } }
                ],
                "transitions": [
                    { "id": "t1", "source": "start", "target": "step" },
                    { "id": "t2", "source": "step", "target": "endc" }
                ]
            }),
        );

        let pid = engine.start_process_by_id(&id, &Vars::new()).unwrap();
        // the end event threw compensation, the instance waits for the handler
        let tasks = engine.tasks(&pid).unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].name, "Undo");

        engine.complete_task(&tasks[0].id, &Vars::new()).unwrap();
        assert!(engine.executions(&pid).unwrap().is_empty());
        engine.shutdown();
    }

    #[test]
    fn test_signal_start_subscription_starts_instance() {
        let engine = engine();
        deploy(
            &engine,
            json!({
                "key": "kickoff",
                "activities": [
                    { "id": "start", "type": "start_event", "event": { "kind": "signal", "name": "launch" } },
                    { "id": "inbox", "type": "user_task", "name": "Inbox" },
                    { "id": "end", "type": "end_event" }
                ],
                "transitions": [
                    { "id": "t1", "source": "start", "target": "inbox" },
                    { "id": "t2", "source": "inbox", "target": "end" }
                ]
            }),
        );

        engine.signal_event("launch", &Vars::new()).unwrap();
        let tasks = engine.store().tasks().query(&Query::new()).unwrap();
        assert_eq!(tasks.count, 1);
        assert_eq!(tasks.rows[0].name, "Inbox");
        engine.shutdown();
    }

    #[test]
    fn test_repeating_catch_timer_stops_once_resumed() {
        let engine = engine();
        let id = deploy(
            &engine,
            json!({
                "key": "cycle",
                "activities": [
                    { "id": "start", "type": "start_event" },
                    { "id": "wait", "type": "intermediate_catch_event", "event": { "kind": "timer", "time": "R2/PT1S" } },
                    { "id": "after", "type": "user_task", "name": "After" },
                    { "id": "end", "type": "end_event" }
                ],
                "transitions": [
                    { "id": "t1", "source": "start", "target": "wait" },
                    { "id": "t2", "source": "wait", "target": "after" },
                    { "id": "t3", "source": "after", "target": "end" }
                ]
            }),
        );

        let pid = engine.start_process_by_id(&id, &Vars::new()).unwrap();
        assert!(engine.tasks(&pid).unwrap().is_empty());

        // the first occurrence resumes the catch event; the execution id
        // survives, so only the activity check keeps the cycle from
        // re-signaling whatever the execution waits on next
        engine.wait_for_jobs(Duration::from_secs(10)).unwrap();
        assert_eq!(engine.store().jobs().query(&Query::new()).unwrap().count, 0);

        let tasks = engine.tasks(&pid).unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].name, "After");
        engine.complete_task(&tasks[0].id, &Vars::new()).unwrap();
        assert!(engine.executions(&pid).unwrap().is_empty());
        engine.shutdown();
    }

    #[test]
    fn test_repeating_boundary_timer_fires_while_host_waits() {
        let engine = engine();
        let id = deploy(
            &engine,
            json!({
                "key": "remind",
                "activities": [
                    { "id": "start", "type": "start_event" },
                    { "id": "hold", "type": "user_task", "name": "Hold" },
                    { "id": "nag", "type": "boundary_event", "attached_to": "hold", "interrupting": false, "event": { "kind": "timer", "time": "R2/PT1S" } },
                    { "id": "remind", "type": "user_task", "name": "Remind" },
                    { "id": "end", "type": "end_event" },
                    { "id": "end2", "type": "end_event" }
                ],
                "transitions": [
                    { "id": "t1", "source": "start", "target": "hold" },
                    { "id": "t2", "source": "hold", "target": "end" },
                    { "id": "t3", "source": "nag", "target": "remind" },
                    { "id": "t4", "source": "remind", "target": "end2" }
                ]
            }),
        );

        let pid = engine.start_process_by_id(&id, &Vars::new()).unwrap();

        // the host stays parked, so the cycle reschedules until its
        // occurrences are spent
        engine.wait_for_jobs(Duration::from_secs(10)).unwrap();
        let mut names = engine.tasks(&pid).unwrap().iter().map(|t| t.name.clone()).collect::<Vec<_>>();
        names.sort();
        assert_eq!(names, vec!["Hold", "Remind", "Remind"]);

        for task in engine.tasks(&pid).unwrap() {
            engine.complete_task(&task.id, &Vars::new()).unwrap();
        }
        assert!(engine.executions(&pid).unwrap().is_empty());
        engine.shutdown();
    }
}
