use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::store::{DbCollectionIden, StoreIden, data::impl_entity};

/// A process variable owned by a scope execution.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Variable {
    pub id: String,
    pub name: String,
    pub execution_id: String,
    pub process_instance_id: String,
    pub value: JsonValue,
    pub rev: i32,
}

impl DbCollectionIden for Variable {
    fn iden() -> StoreIden {
        StoreIden::Variables
    }
}

impl_entity!(Variable);
