use serde::{Deserialize, Serialize};

use crate::store::{DbCollectionIden, StoreIden, data::impl_entity};

/// A runtime node of the hierarchical execution tree.
///
/// Exactly one execution per tree has no parent: the process instance,
/// whose `process_instance_id` equals its own id. A parent owns its
/// children; deleting it cascades to descendants, variables,
/// subscriptions, tasks, and jobs.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Execution {
    pub id: String,
    pub parent_id: Option<String>,
    pub process_instance_id: String,
    pub process_definition_id: String,
    /// current activity; `None` while the execution is between activities
    pub activity_id: Option<String>,
    /// can currently run further atomic operations
    pub is_active: bool,
    /// owns its own variable namespace and event subscriptions
    pub is_scope: bool,
    /// a parallel sibling branch sharing the nearest scope's variables
    pub is_concurrent: bool,
    /// temporary execution driving a compensation handler
    pub is_compensation: bool,
    pub business_key: Option<String>,
    /// caller execution when this tree was started by a call activity
    pub super_execution_id: Option<String>,
    pub start_time: i64,
    pub rev: i32,
}

impl DbCollectionIden for Execution {
    fn iden() -> StoreIden {
        StoreIden::Executions
    }
}

impl_entity!(Execution);

impl Execution {
    /// True for the root of a tree (the process instance itself).
    pub fn is_process_instance(&self) -> bool {
        self.parent_id.is_none()
    }
}
