use serde::{Deserialize, Serialize};

use crate::store::{DbCollectionIden, StoreIden, data::impl_entity};

/// A deployed process definition revision.
///
/// `id` is `key:version`; the parsed graph lives in the definition cache,
/// `data` holds the model JSON it is rebuilt from.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ProcessDefinitionData {
    pub id: String,
    pub key: String,
    pub version: i32,
    pub name: String,
    pub data: String,
    pub deploy_time: i64,
    pub rev: i32,
}

impl DbCollectionIden for ProcessDefinitionData {
    fn iden() -> StoreIden {
        StoreIden::ProcessDefinitions
    }
}

impl_entity!(ProcessDefinitionData);
