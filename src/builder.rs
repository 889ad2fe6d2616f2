use std::sync::Arc;

use tokio::runtime::{Builder, Runtime};

use crate::{
    Config, Engine, Result,
    job::{JobHandler, JobHandlers},
    runtime::{ConditionEvaluator, TruthyConditionEvaluator},
};

pub struct EngineBuilder {
    config: Config,
    rt: Option<Arc<Runtime>>,
    handlers: JobHandlers,
    condition: Option<Arc<dyn ConditionEvaluator>>,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self {
            config: Config::default(),
            rt: None,
            handlers: JobHandlers::default_handlers(),
            condition: None,
        }
    }
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(
        mut self,
        config: Config,
    ) -> Self {
        self.config = config;
        self
    }

    pub fn runtime(
        mut self,
        runtime: Arc<Runtime>,
    ) -> Self {
        self.rt = Some(runtime);
        self
    }

    /// Register an additional job handler next to the built-in ones.
    pub fn job_handler(
        mut self,
        handler: Arc<dyn JobHandler>,
    ) -> Self {
        self.handlers.register(handler);
        self
    }

    /// Replace the default truthiness condition evaluator.
    pub fn condition_evaluator(
        mut self,
        condition: Arc<dyn ConditionEvaluator>,
    ) -> Self {
        self.condition = Some(condition);
        self
    }

    pub fn build(self) -> Result<Engine> {
        let runtime = match &self.rt {
            Some(runtime) => runtime.clone(),
            None => Arc::new(Builder::new_multi_thread().worker_threads(self.config.async_worker_thread_number.into()).enable_all().build().unwrap()),
        };
        let condition = self.condition.unwrap_or_else(|| Arc::new(TruthyConditionEvaluator));

        Ok(Engine::new(self.config, runtime, self.handlers, condition))
    }
}
