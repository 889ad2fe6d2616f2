//! Runtime process definition as a directed graph.
//!
//! Compiled once from a [`ProcessModel`], then shared read-only through
//! the definition cache. All runtime graph questions (outgoing
//! transitions, join counts, boundary attachments, scope membership) are
//! answered here so the execution runtime never touches the serde model.

use std::collections::HashMap;

use petgraph::{
    Direction,
    graph::{DiGraph, NodeIndex},
};

use crate::{
    ProcflowError, Result,
    model::{ActivityId, ActivityType, EventDefinition, ProcessModel, TimerDefinition, TransitionId},
};

/// Runtime activity node.
#[derive(Debug, Clone)]
pub struct ActivityNode {
    pub id: ActivityId,
    pub name: String,
    pub activity_type: ActivityType,
    pub parent: Option<ActivityId>,
    pub is_async: bool,
    pub attached_to: Option<ActivityId>,
    pub interrupting: bool,
    pub compensation_handler: Option<ActivityId>,
    pub called_element: Option<String>,
    pub event: Option<EventDefinition>,
}

impl ActivityNode {
    pub fn timer(&self) -> Result<TimerDefinition> {
        match &self.event {
            Some(EventDefinition::Timer {
                time,
            }) => TimerDefinition::parse(time),
            _ => Err(ProcflowError::Definition(format!("activity {} has no timer definition", self.id))),
        }
    }
}

/// Runtime transition.
#[derive(Debug, Clone)]
pub struct Transition {
    pub id: TransitionId,
    pub source: ActivityId,
    pub target: ActivityId,
    pub condition: Option<String>,
    pub is_default: bool,
}

/// Immutable, cached process definition.
pub struct ProcessDefinition {
    /// definition id, `key:version`
    pub id: String,
    pub key: String,
    pub version: i32,
    pub name: String,

    graph: DiGraph<ActivityNode, Transition>,
    index: HashMap<ActivityId, NodeIndex>,
}

impl ProcessDefinition {
    /// Compile a model into a definition, validating referential
    /// integrity of transitions and boundary attachments.
    pub fn build(
        model: &ProcessModel,
        version: i32,
    ) -> Result<Self> {
        if model.key.is_empty() {
            return Err(ProcflowError::Definition("missing key in process model".into()));
        }

        let mut graph: DiGraph<ActivityNode, Transition> = DiGraph::new();
        let mut index = HashMap::new();

        for activity in model.activities.iter() {
            let node = ActivityNode {
                id: activity.id.clone(),
                name: activity.name.clone(),
                activity_type: activity.activity_type,
                parent: activity.parent.clone(),
                is_async: activity.is_async,
                attached_to: activity.attached_to.clone(),
                interrupting: activity.interrupting,
                compensation_handler: activity.compensation_handler.clone(),
                called_element: activity.called_element.clone(),
                event: activity.event.clone(),
            };
            if index.contains_key(&node.id) {
                return Err(ProcflowError::Definition(format!("duplicate activity id {}", node.id)));
            }
            let idx = graph.add_node(node);
            index.insert(activity.id.clone(), idx);
        }

        for transition in model.transitions.iter() {
            let source = index.get(&transition.source).ok_or(ProcflowError::Definition(format!("source activity {} not found", transition.source)))?;
            let target = index.get(&transition.target).ok_or(ProcflowError::Definition(format!("target activity {} not found", transition.target)))?;
            graph.add_edge(
                *source,
                *target,
                Transition {
                    id: transition.id.clone(),
                    source: transition.source.clone(),
                    target: transition.target.clone(),
                    condition: transition.condition.clone(),
                    is_default: transition.is_default,
                },
            );
        }

        let definition = Self {
            id: format!("{}:{}", model.key, version),
            key: model.key.clone(),
            version,
            name: model.name.clone(),
            graph,
            index,
        };

        for activity in model.activities.iter() {
            if let Some(attached) = &activity.attached_to {
                definition.activity(attached).map_err(|_| ProcflowError::Definition(format!("boundary {} attached to unknown activity {}", activity.id, attached)))?;
            }
            if let Some(handler) = &activity.compensation_handler {
                definition.activity(handler).map_err(|_| ProcflowError::Definition(format!("compensation handler {} of {} not found", handler, activity.id)))?;
            }
        }
        definition.initial_activity(None)?;

        Ok(definition)
    }

    pub fn activity(
        &self,
        id: &str,
    ) -> Result<&ActivityNode> {
        self.index.get(id).map(|idx| &self.graph[*idx]).ok_or(ProcflowError::Definition(format!("activity {} not found in definition {}", id, self.id)))
    }

    /// The start event of the given scope (`None` for the process level).
    pub fn initial_activity(
        &self,
        scope: Option<&str>,
    ) -> Result<&ActivityNode> {
        self.graph
            .node_indices()
            .map(|idx| &self.graph[idx])
            .find(|node| node.activity_type == ActivityType::StartEvent && node.attached_to.is_none() && node.parent.as_deref() == scope)
            .ok_or(ProcflowError::Definition(format!("definition {} has no start event for scope {:?}", self.id, scope)))
    }

    /// Outgoing transitions of an activity, in model order.
    pub fn outgoing(
        &self,
        id: &str,
    ) -> Vec<Transition> {
        self.index
            .get(id)
            .map(|idx| {
                let mut transitions: Vec<Transition> = self.graph.edges_directed(*idx, Direction::Outgoing).map(|e| e.weight().clone()).collect();
                // petgraph iterates newest-first; restore insertion order
                transitions.reverse();
                transitions
            })
            .unwrap_or_default()
    }

    /// Number of incoming transitions, derived from the graph each time a
    /// join asks (never cached at fork time).
    pub fn incoming_count(
        &self,
        id: &str,
    ) -> usize {
        self.index.get(id).map(|idx| self.graph.edges_directed(*idx, Direction::Incoming).count()).unwrap_or(0)
    }

    pub fn transition(
        &self,
        id: &str,
    ) -> Result<Transition> {
        self.graph
            .edge_indices()
            .find(|idx| self.graph[*idx].id == id)
            .map(|idx| self.graph[idx].clone())
            .ok_or(ProcflowError::Definition(format!("transition {} not found in definition {}", id, self.id)))
    }

    /// Boundary events attached to an activity.
    pub fn boundary_events(
        &self,
        id: &str,
    ) -> Vec<&ActivityNode> {
        self.graph.node_indices().map(|idx| &self.graph[idx]).filter(|node| node.attached_to.as_deref() == Some(id)).collect()
    }

    /// Start events of the process level (used for start subscriptions).
    pub fn start_events(&self) -> Vec<&ActivityNode> {
        self.graph
            .node_indices()
            .map(|idx| &self.graph[idx])
            .filter(|node| node.activity_type == ActivityType::StartEvent && node.attached_to.is_none() && node.parent.is_none())
            .collect()
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use crate::model::{ActivityType, ProcessDefinition, ProcessModel};

    fn sequence_model() -> ProcessModel {
        ProcessModel::from_json(
            &json!({
                "key": "order",
                "name": "Order handling",
                "activities": [
                    { "id": "start", "type": "start_event" },
                    { "id": "review", "type": "user_task", "name": "Review order" },
                    { "id": "end", "type": "end_event" }
                ],
                "transitions": [
                    { "id": "t1", "source": "start", "target": "review" },
                    { "id": "t2", "source": "review", "target": "end" }
                ]
            })
            .to_string(),
        )
        .unwrap()
    }

    #[test]
    fn test_build_and_query() {
        let definition = ProcessDefinition::build(&sequence_model(), 1).unwrap();
        assert_eq!(definition.id, "order:1");
        assert_eq!(definition.initial_activity(None).unwrap().id, "start");
        assert_eq!(definition.activity("review").unwrap().activity_type, ActivityType::UserTask);

        let outgoing = definition.outgoing("start");
        assert_eq!(outgoing.len(), 1);
        assert_eq!(outgoing[0].target, "review");
        assert_eq!(definition.incoming_count("end"), 1);
        assert!(definition.outgoing("end").is_empty());
    }

    #[test]
    fn test_build_rejects_dangling_transition() {
        let mut model = sequence_model();
        model.transitions[0].target = "nowhere".to_string();
        assert!(ProcessDefinition::build(&model, 1).is_err());
    }

    #[test]
    fn test_build_requires_start_event() {
        let mut model = sequence_model();
        model.activities.remove(0);
        model.transitions.remove(0);
        assert!(ProcessDefinition::build(&model, 1).is_err());
    }
}
