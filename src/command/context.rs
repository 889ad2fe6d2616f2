use std::{collections::VecDeque, sync::Arc};

use crate::{
    Result,
    common::Vars,
    config::Config,
    events::{EngineEvent, Message},
    job::JobHandlers,
    model::ProcessDefinition,
    runtime::{AtomicOperation, ConditionEvaluator, Definitions},
    store::Store,
};

use super::session::DbSession;

pub type CloseListener = Box<dyn FnOnce(bool) + Send>;

/// Per-command state: the entity session, the pending atomic-operation
/// queue, buffered engine events, close listeners, and an attribute bag.
///
/// A context is created for each top-level command attempt and torn down
/// with it; nested engine logic receives `&mut CommandContext` explicitly,
/// never an ambient thread-local.
pub struct CommandContext {
    pub session: DbSession,
    pub attributes: Vars,

    config: Arc<Config>,
    store: Arc<Store>,
    definitions: Arc<Definitions>,
    handlers: Arc<JobHandlers>,
    condition: Arc<dyn ConditionEvaluator>,

    ops: VecDeque<AtomicOperation>,
    events: Vec<Message>,
    close_listeners: Vec<CloseListener>,
}

impl CommandContext {
    pub fn new(
        config: Arc<Config>,
        store: Arc<Store>,
        definitions: Arc<Definitions>,
        handlers: Arc<JobHandlers>,
        condition: Arc<dyn ConditionEvaluator>,
    ) -> Self {
        Self {
            session: DbSession::new(store.clone()),
            attributes: Vars::new(),
            config,
            store,
            definitions,
            handlers,
            condition,
            ops: VecDeque::new(),
            events: Vec::new(),
            close_listeners: Vec::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Direct store access, bypassing the session. Used only by job
    /// acquisition, which wants per-record conflict handling instead of
    /// failing the whole command.
    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn definition(
        &self,
        id: &str,
    ) -> Result<Arc<ProcessDefinition>> {
        self.definitions.get(id)
    }

    pub fn definitions(&self) -> &Arc<Definitions> {
        &self.definitions
    }

    pub fn handlers(&self) -> &Arc<JobHandlers> {
        &self.handlers
    }

    pub fn evaluate_condition(
        &self,
        condition: &str,
        vars: &Vars,
    ) -> Result<bool> {
        self.condition.evaluate(condition, vars)
    }

    /// Queue the next atomic operation of the trampoline.
    pub fn push_op(
        &mut self,
        op: AtomicOperation,
    ) {
        self.ops.push_back(op);
    }

    pub fn next_op(&mut self) -> Option<AtomicOperation> {
        self.ops.pop_front()
    }

    /// Buffer an engine event; dispatched on the channel only after the
    /// command committed.
    pub fn emit(
        &mut self,
        pid: &str,
        aid: &str,
        event: EngineEvent,
    ) {
        self.events.push(Message {
            pid: pid.to_string(),
            aid: aid.to_string(),
            event,
        });
    }

    pub fn take_events(&mut self) -> Vec<Message> {
        std::mem::take(&mut self.events)
    }

    /// Run `f(success)` when the command closes, after commit or rollback.
    pub fn on_close(
        &mut self,
        f: impl FnOnce(bool) + Send + 'static,
    ) {
        self.close_listeners.push(Box::new(f));
    }

    pub(crate) fn close(
        &mut self,
        success: bool,
    ) {
        for listener in self.close_listeners.drain(..) {
            listener(success);
        }
    }
}
