//! Process model and runtime definition.
//!
//! A [`ProcessModel`] is the serde-facing JSON shape a deployment hands to
//! the engine. It is compiled into an immutable [`ProcessDefinition`], a
//! directed graph of activity nodes and transitions, which is what the
//! execution runtime actually traverses. Definitions are cached
//! process-wide and replaced wholesale on redeploy.

mod activity;
mod definition;
mod process;
mod timer;
mod transition;

pub use activity::{ActivityModel, ActivityType, EventDefinition};
pub use definition::{ActivityNode, ProcessDefinition, Transition};
pub use process::ProcessModel;
pub use timer::TimerDefinition;
pub use transition::TransitionModel;

/// activity id within a definition
pub type ActivityId = String;
/// transition id within a definition
pub type TransitionId = String;
