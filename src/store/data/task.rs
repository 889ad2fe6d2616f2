use serde::{Deserialize, Serialize};

use crate::store::{DbCollectionIden, StoreIden, data::impl_entity};

/// A user task created when a user-task wait state is entered.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Task {
    pub id: String,
    pub name: String,
    pub assignee: Option<String>,
    pub execution_id: String,
    pub process_instance_id: String,
    pub process_definition_id: String,
    pub activity_id: String,
    pub created: i64,
    pub rev: i32,
}

impl DbCollectionIden for Task {
    fn iden() -> StoreIden {
        StoreIden::Tasks
    }
}

impl_entity!(Task);
