/// Process-instance lifecycle events.
#[derive(Debug, Clone)]
pub enum ProcessEvent {
    /// The root execution was created and the start node entered.
    Started,
    /// The tree was deleted after the last active path ended.
    Ended,
}

impl ProcessEvent {
    pub fn str(&self) -> &str {
        match self {
            ProcessEvent::Started => "Started",
            ProcessEvent::Ended => "Ended",
        }
    }
}

#[derive(Debug, Clone)]
pub enum ActivityEvent {
    Started,
    Completed,
    /// An outgoing transition was taken.
    SequenceFlowTaken {
        transition_id: String,
    },
    /// The activity was cancelled by an interrupting boundary event.
    Cancelled {
        reason: String,
    },
}

impl ActivityEvent {
    pub fn str(&self) -> &str {
        match self {
            ActivityEvent::Started => "Started",
            ActivityEvent::Completed => "Completed",
            ActivityEvent::SequenceFlowTaken { .. } => "SequenceFlowTaken",
            ActivityEvent::Cancelled { .. } => "Cancelled",
        }
    }
}

#[derive(Debug, Clone)]
pub enum TaskEvent {
    Created {
        task_id: String,
        name: String,
        assignee: Option<String>,
    },
    Completed {
        task_id: String,
    },
}

#[derive(Debug, Clone)]
pub enum VariableEvent {
    Created {
        name: String,
    },
    Updated {
        name: String,
    },
    Deleted {
        name: String,
    },
}
