//! Execution runtime: the atomic-operation trampoline, activity
//! behaviors, event routing, and the committed-event channel.

pub mod atomic;
pub mod behavior;
pub mod boundary;
pub mod channel;
pub mod compensation;
pub mod definitions;
pub mod execution;
pub mod subscription;

pub use atomic::AtomicOperation;
pub use channel::{Channel, ChannelEvent, ChannelOptions};
pub use definitions::Definitions;

use serde_json::Value as JsonValue;

use crate::{Result, common::Vars};

/// Evaluates transition conditions against the variables visible from the
/// taking execution. Pluggable so embedders can wire a real expression
/// language.
pub trait ConditionEvaluator: Send + Sync {
    fn evaluate(
        &self,
        condition: &str,
        vars: &Vars,
    ) -> Result<bool>;
}

/// Default evaluator: a condition is a variable name, optionally prefixed
/// with `!`, tested for JSON truthiness. Missing variables are false.
#[derive(Debug, Default)]
pub struct TruthyConditionEvaluator;

impl ConditionEvaluator for TruthyConditionEvaluator {
    fn evaluate(
        &self,
        condition: &str,
        vars: &Vars,
    ) -> Result<bool> {
        let expr = condition.trim();
        let (negated, name) = match expr.strip_prefix('!') {
            Some(rest) => (true, rest.trim()),
            None => (false, expr),
        };

        let truthy = match vars.get_value(name) {
            Some(JsonValue::Bool(b)) => *b,
            Some(JsonValue::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
            Some(JsonValue::String(s)) => !s.is_empty(),
            Some(JsonValue::Array(a)) => !a.is_empty(),
            Some(JsonValue::Object(o)) => !o.is_empty(),
            Some(JsonValue::Null) | None => false,
        };
        Ok(truthy != negated)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use crate::{
        command::CommandExecutor,
        config::Config,
        job::JobHandlers,
        runtime::{Channel, Definitions, TruthyConditionEvaluator},
        store::{DbStore, MemStore, Store},
    };

    /// A command executor over a fresh in-memory store, no background
    /// loops running.
    pub(crate) fn command_executor() -> CommandExecutor {
        command_executor_with(Config::default(), JobHandlers::default_handlers())
    }

    pub(crate) fn command_executor_with(
        config: Config,
        handlers: JobHandlers,
    ) -> CommandExecutor {
        let store = Arc::new(Store::new());
        MemStore::new().init(&store);

        let runtime = Arc::new(tokio::runtime::Builder::new_multi_thread().worker_threads(2).enable_all().build().unwrap());
        let channel = Arc::new(Channel::new(runtime));

        CommandExecutor::new(
            Arc::new(config),
            store.clone(),
            Arc::new(Definitions::new(store)),
            Arc::new(handlers),
            Arc::new(TruthyConditionEvaluator),
            channel,
        )
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::{ConditionEvaluator, TruthyConditionEvaluator};
    use crate::common::Vars;

    #[test]
    fn test_truthy_evaluator() {
        let evaluator = TruthyConditionEvaluator;
        let mut vars = Vars::new();
        vars.set("approved", true);
        vars.set("rejections", 0);
        vars.set("owner", "alice");
        vars.set("empty", json!(""));

        assert!(evaluator.evaluate("approved", &vars).unwrap());
        assert!(evaluator.evaluate("!rejections", &vars).unwrap());
        assert!(evaluator.evaluate("owner", &vars).unwrap());
        assert!(!evaluator.evaluate("empty", &vars).unwrap());
        assert!(!evaluator.evaluate("missing", &vars).unwrap());
        assert!(evaluator.evaluate(" !missing ", &vars).unwrap());
    }
}
