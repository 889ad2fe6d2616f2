use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::store::{DbCollectionIden, StoreIden, data::impl_entity};

/// A persisted unit of deferred work (timer, async continuation).
///
/// Lifecycle: unlocked → locked by a worker with a lease → deleted on
/// success, unlocked with one retry fewer on failure, or dead-lettered
/// when retries are exhausted. An expired lease is treated exactly like
/// no lock.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Job {
    pub id: String,
    /// discriminates which registered handler runs this job
    pub handler_type: String,
    /// opaque configuration payload handed to the handler
    pub handler_config: JsonValue,
    /// `None` means due immediately
    pub due_date: Option<i64>,
    pub retries: i32,
    /// must not run concurrently with other exclusive jobs of the same
    /// process instance
    pub exclusive: bool,
    /// [`Job::AVAILABLE`] or [`Job::DEADLETTER`]
    pub state: String,
    pub lock_owner: Option<String>,
    pub lock_expiration: Option<i64>,
    /// summary of the last handler failure
    pub exception: Option<String>,
    pub execution_id: Option<String>,
    pub process_instance_id: Option<String>,
    pub process_definition_id: Option<String>,
    pub created: i64,
    pub rev: i32,
}

impl Job {
    pub const AVAILABLE: &'static str = "available";
    pub const DEADLETTER: &'static str = "deadletter";
}

impl DbCollectionIden for Job {
    fn iden() -> StoreIden {
        StoreIden::Jobs
    }
}

impl_entity!(Job);
