//! Event types dispatched by the engine.
//!
//! Events are observed by external collaborators (history/audit logging,
//! metrics) through the engine channel. They are dispatched only after the
//! command that produced them has committed; consumers must not mutate
//! engine state from within a callback except through a new command.

mod execution;
mod job;

pub use execution::*;
pub use job::*;

/// Generic event wrapper.
#[derive(Debug, Clone)]
pub struct Event<T> {
    inner: T,
}

/// Top-level engine event.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// Process-instance lifecycle events.
    Process(ProcessEvent),
    /// Activity lifecycle and sequence-flow events.
    Activity(ActivityEvent),
    /// User-task lifecycle events.
    Task(TaskEvent),
    /// Variable lifecycle events.
    Variable(VariableEvent),
    /// Job executor events.
    Job(JobEvent),
}

/// Event message containing process-instance and activity context.
#[derive(Debug, Clone)]
pub struct Message {
    /// Process instance that generated this event.
    pub pid: String,
    /// Activity id that generated this event (empty for instance-level events).
    pub aid: String,
    /// The actual event data.
    pub event: EngineEvent,
}

impl<T> std::ops::Deref for Event<T>
where
    T: std::fmt::Debug + Clone,
{
    type Target = T;
    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl<T> Event<T>
where
    T: std::fmt::Debug + Clone,
{
    pub fn new(inner: &T) -> Self {
        Self {
            inner: inner.clone(),
        }
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }
}

impl EngineEvent {
    /// The process instance reached its end and the tree was deleted.
    pub fn is_complete(&self) -> bool {
        matches!(self, EngineEvent::Process(ProcessEvent::Ended))
    }

    /// A job exhausted its retries and was dead-lettered.
    pub fn is_dead_letter(&self) -> bool {
        matches!(self, EngineEvent::Job(JobEvent::DeadLettered { .. }))
    }
}
