//! Persisted record types.
//!
//! Conceptual layout, not a fixed schema: each record carries a `rev`
//! column used for optimistic locking by both backends.

mod event_subscription;
mod execution;
mod job;
mod process_definition;
mod task;
mod variable;

pub use event_subscription::EventSubscription;
pub use execution::Execution;
pub use job::Job;
pub use process_definition::ProcessDefinitionData;
pub use task::Task;
pub use variable::Variable;

/// Common surface of persisted records, used by the command session to
/// flush generically.
pub trait Entity: Clone + Send + Sync + 'static {
    fn id(&self) -> &str;
    fn revision(&self) -> i32;
    fn set_revision(
        &mut self,
        rev: i32,
    );
}

macro_rules! impl_entity {
    ($ty:ty) => {
        impl crate::store::data::Entity for $ty {
            fn id(&self) -> &str {
                &self.id
            }

            fn revision(&self) -> i32 {
                self.rev
            }

            fn set_revision(
                &mut self,
                rev: i32,
            ) {
                self.rev = rev;
            }
        }
    };
}

pub(crate) use impl_entity;
