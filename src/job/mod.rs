//! Background jobs: handler registry and the polling executor.

mod executor;
mod handlers;

use std::{collections::HashMap, sync::Arc};

pub use executor::JobExecutor;
pub use handlers::{AsyncContinuationHandler, TimerStartEventHandler, TimerTriggerHandler};
pub(crate) use handlers::timer_armed_at;

use crate::{Result, command::CommandContext, store::data::Job};

/// Resumes an execution parked before an async activity.
pub const ASYNC_CONTINUATION: &str = "async-continuation";
/// Fires a boundary or intermediate catch timer.
pub const TIMER_TRIGGER: &str = "timer-trigger";
/// Starts a new process instance from a timer start event.
pub const TIMER_START_EVENT: &str = "timer-start-event";

/// Executes one job type inside the worker's command, sharing its
/// transaction: the handler's writes and the job deletion commit together.
pub trait JobHandler: Send + Sync {
    fn handler_type(&self) -> &str;

    fn execute(
        &self,
        ctx: &mut CommandContext,
        job: &Job,
    ) -> Result<()>;
}

/// Registry of job handlers keyed by `handler_type`.
#[derive(Default)]
pub struct JobHandlers {
    handlers: HashMap<String, Arc<dyn JobHandler>>,
}

impl JobHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in handlers every engine carries.
    pub fn default_handlers() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(AsyncContinuationHandler));
        registry.register(Arc::new(TimerTriggerHandler));
        registry.register(Arc::new(TimerStartEventHandler));
        registry
    }

    pub fn register(
        &mut self,
        handler: Arc<dyn JobHandler>,
    ) {
        self.handlers.insert(handler.handler_type().to_string(), handler);
    }

    pub fn get(
        &self,
        handler_type: &str,
    ) -> Option<Arc<dyn JobHandler>> {
        self.handlers.get(handler_type).cloned()
    }
}
