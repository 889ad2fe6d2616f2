use serde::{Deserialize, Serialize};

use crate::store::{DbCollectionIden, StoreIden, data::impl_entity};

/// Binds an event key to an owning execution and target activity.
///
/// Start-event subscriptions have no owning execution yet; firing one
/// starts a fresh process instance from `process_definition_id`.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct EventSubscription {
    pub id: String,
    /// one of [`EventSubscription::SIGNAL`] etc.
    pub event_type: String,
    pub event_name: String,
    pub execution_id: Option<String>,
    pub process_instance_id: Option<String>,
    pub process_definition_id: String,
    pub activity_id: String,
    pub created: i64,
    pub rev: i32,
}

impl EventSubscription {
    pub const SIGNAL: &'static str = "signal";
    pub const MESSAGE: &'static str = "message";
    pub const COMPENSATE: &'static str = "compensate";
}

impl DbCollectionIden for EventSubscription {
    fn iden() -> StoreIden {
        StoreIden::EventSubscriptions
    }
}

impl_entity!(EventSubscription);
