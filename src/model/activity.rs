use serde::{Deserialize, Serialize};

use crate::model::ActivityId;

/// Behavior tag of an activity node, selecting its polymorphic execution
/// semantics at runtime.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, strum::AsRefStr, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ActivityType {
    #[default]
    None,
    StartEvent,
    EndEvent,
    /// Pass-through activity; work is observable via the event channel.
    ServiceTask,
    /// Wait state backed by a Task record, resumed by completing the task.
    UserTask,
    /// Wait state resumed by signaling the execution directly.
    ReceiveTask,
    ExclusiveGateway,
    ParallelGateway,
    SubProcess,
    CallActivity,
    /// Wait state resumed by its event definition (timer/signal/message).
    IntermediateCatchEvent,
    /// Fires its event definition (compensation) and continues.
    IntermediateThrowEvent,
    /// Attached to another activity; never entered by a transition.
    BoundaryEvent,
}

/// Event definition carried by start, catch, boundary, throw, and error
/// end nodes.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventDefinition {
    /// ISO-8601 duration (`PT5M`) or repeating cycle (`R3/PT10S`).
    Timer {
        time: String,
    },
    Signal {
        name: String,
    },
    Message {
        name: String,
    },
    /// On an end event: throws the fault. On a boundary event: catches it.
    /// An empty code on a boundary catches any fault.
    Error {
        #[serde(default)]
        code: String,
    },
    Compensate,
}

/// Serde-facing activity node.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActivityModel {
    pub id: ActivityId,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub activity_type: ActivityType,
    /// id of the enclosing sub-process, if any
    #[serde(default)]
    pub parent: Option<ActivityId>,
    /// continue this activity asynchronously through a job
    #[serde(default)]
    pub is_async: bool,
    /// boundary events name the activity they are attached to
    #[serde(default)]
    pub attached_to: Option<ActivityId>,
    /// interrupting boundary events cancel the attached activity
    #[serde(default = "default_true")]
    pub interrupting: bool,
    /// id of the activity run when this one is compensated
    #[serde(default)]
    pub compensation_handler: Option<ActivityId>,
    /// process key started by a call activity
    #[serde(default)]
    pub called_element: Option<String>,
    #[serde(default)]
    pub event: Option<EventDefinition>,
}

fn default_true() -> bool {
    true
}
