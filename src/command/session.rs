//! Per-command entity session.
//!
//! Every command works against an identity-mapped cache of the records it
//! touched. Nothing is written to the store until the command completes;
//! `flush` then applies creates, revision-checked updates, and deletes in
//! one pass. A failed command simply drops the session, which is the
//! rollback.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::{
    ProcflowError, Result,
    store::{
        DbCollection, Store,
        data::*,
        query::{self, Query},
    },
};

enum CacheEntry<T> {
    /// Created in this command, inserted at flush.
    New(T),
    /// Loaded from the store; written back at flush only when dirty.
    Loaded {
        data: T,
        dirty: bool,
    },
    /// Deleted in this command, removed from the store at flush.
    Removed,
}

struct EntityCache<T> {
    kind: &'static str,
    entries: HashMap<String, CacheEntry<T>>,
}

fn doc_of<T: Serialize>(item: &T) -> Result<HashMap<String, JsonValue>> {
    match serde_json::to_value(item)? {
        JsonValue::Object(map) => Ok(map.into_iter().collect()),
        _ => Err(ProcflowError::Store("record is not a JSON object".to_string())),
    }
}

impl<T> EntityCache<T>
where
    T: Entity + Serialize,
{
    fn new(kind: &'static str) -> Self {
        Self {
            kind,
            entries: HashMap::new(),
        }
    }

    fn find(
        &mut self,
        coll: &dyn DbCollection<Item = T>,
        id: &str,
    ) -> Result<T> {
        match self.entries.get(id) {
            Some(CacheEntry::New(data)) => Ok(data.clone()),
            Some(CacheEntry::Loaded {
                data, ..
            }) => Ok(data.clone()),
            Some(CacheEntry::Removed) => Err(ProcflowError::not_found(self.kind, id)),
            None => {
                let data = coll.find(id)?;
                self.entries.insert(
                    id.to_string(),
                    CacheEntry::Loaded {
                        data: data.clone(),
                        dirty: false,
                    },
                );
                Ok(data)
            }
        }
    }

    fn insert(
        &mut self,
        data: T,
    ) {
        self.entries.insert(data.id().to_string(), CacheEntry::New(data));
    }

    fn put(
        &mut self,
        data: T,
    ) {
        let id = data.id().to_string();
        match self.entries.get_mut(&id) {
            Some(CacheEntry::New(existing)) => *existing = data,
            _ => {
                self.entries.insert(
                    id,
                    CacheEntry::Loaded {
                        data,
                        dirty: true,
                    },
                );
            }
        }
    }

    fn remove(
        &mut self,
        id: &str,
    ) {
        match self.entries.get(id) {
            // never persisted, nothing to delete at flush
            Some(CacheEntry::New(_)) => {
                self.entries.remove(id);
            }
            _ => {
                self.entries.insert(id.to_string(), CacheEntry::Removed);
            }
        }
    }

    /// Query the store and overlay the session's view: removed records
    /// disappear, dirty records show their in-session state, and records
    /// created in this command are included when they match.
    fn list(
        &mut self,
        coll: &dyn DbCollection<Item = T>,
        q: &Query,
    ) -> Result<Vec<T>> {
        let page = coll.query(q)?;

        let mut rows: Vec<T> = Vec::new();
        let mut seen: Vec<String> = Vec::new();
        for row in page.rows {
            let id = row.id().to_string();
            match self.entries.get(&id) {
                Some(CacheEntry::Removed) => continue,
                Some(CacheEntry::New(data))
                | Some(CacheEntry::Loaded {
                    data, ..
                }) => rows.push(data.clone()),
                None => {
                    self.entries.insert(
                        id.clone(),
                        CacheEntry::Loaded {
                            data: row.clone(),
                            dirty: false,
                        },
                    );
                    rows.push(row);
                }
            }
            seen.push(id);
        }

        for (id, entry) in self.entries.iter() {
            if seen.contains(id) {
                continue;
            }
            let data = match entry {
                CacheEntry::New(data) => data,
                CacheEntry::Loaded {
                    data,
                    dirty: true,
                } => data,
                _ => continue,
            };
            let doc = doc_of(data)?;
            if q.conds().iter().all(|cond| cond.matches(&doc)) {
                rows.push(data.clone());
            }
        }

        if !q.order().is_empty() {
            let mut keyed = rows.iter().map(doc_of).collect::<Result<Vec<_>>>()?.into_iter().zip(rows).collect::<Vec<_>>();
            keyed.sort_by(|(a, _), (b, _)| {
                for (column, rev) in q.order().iter() {
                    let null = JsonValue::Null;
                    let ord = query::compare(a.get(column), b.get(column).unwrap_or(&null)).unwrap_or(std::cmp::Ordering::Equal);
                    let ord = if *rev { ord.reverse() } else { ord };
                    if !ord.is_eq() {
                        return ord;
                    }
                }
                std::cmp::Ordering::Equal
            });
            rows = keyed.into_iter().map(|(_, row)| row).collect();
        }

        Ok(rows)
    }

    fn flush(
        &mut self,
        coll: &dyn DbCollection<Item = T>,
    ) -> Result<()> {
        for (id, entry) in self.entries.drain() {
            match entry {
                CacheEntry::New(data) => {
                    coll.create(&data)?;
                }
                CacheEntry::Loaded {
                    data,
                    dirty: true,
                } => {
                    coll.update(&data)?;
                }
                CacheEntry::Loaded {
                    dirty: false, ..
                } => {}
                CacheEntry::Removed => {
                    coll.delete(&id)?;
                }
            }
        }
        Ok(())
    }
}

macro_rules! session_entity {
    ($cache:ident, $coll:ident, $ty:ty, $find:ident, $insert:ident, $put:ident, $remove:ident, $list:ident) => {
        pub fn $find(
            &mut self,
            id: &str,
        ) -> Result<$ty> {
            let coll = self.store.$coll();
            self.$cache.find(coll.as_ref(), id)
        }

        pub fn $insert(
            &mut self,
            data: $ty,
        ) {
            self.$cache.insert(data);
        }

        pub fn $put(
            &mut self,
            data: $ty,
        ) {
            self.$cache.put(data);
        }

        pub fn $remove(
            &mut self,
            id: &str,
        ) {
            self.$cache.remove(id);
        }

        pub fn $list(
            &mut self,
            q: &Query,
        ) -> Result<Vec<$ty>> {
            let coll = self.store.$coll();
            self.$cache.list(coll.as_ref(), q)
        }
    };
}

/// The command's view of the store.
pub struct DbSession {
    store: std::sync::Arc<Store>,

    definitions: EntityCache<ProcessDefinitionData>,
    executions: EntityCache<Execution>,
    variables: EntityCache<Variable>,
    subscriptions: EntityCache<EventSubscription>,
    tasks: EntityCache<Task>,
    jobs: EntityCache<Job>,
}

impl DbSession {
    pub fn new(store: std::sync::Arc<Store>) -> Self {
        Self {
            store,
            definitions: EntityCache::new("process_definition"),
            executions: EntityCache::new("execution"),
            variables: EntityCache::new("variable"),
            subscriptions: EntityCache::new("event_subscription"),
            tasks: EntityCache::new("task"),
            jobs: EntityCache::new("job"),
        }
    }

    session_entity!(definitions, process_definitions, ProcessDefinitionData, find_definition, insert_definition, put_definition, remove_definition, list_definitions);
    session_entity!(executions, executions, Execution, find_execution, insert_execution, put_execution, remove_execution, list_executions);
    session_entity!(variables, variables, Variable, find_variable, insert_variable, put_variable, remove_variable, list_variables);
    session_entity!(subscriptions, event_subscriptions, EventSubscription, find_subscription, insert_subscription, put_subscription, remove_subscription, list_subscriptions);
    session_entity!(tasks, tasks, Task, find_task, insert_task, put_task, remove_task, list_tasks);
    session_entity!(jobs, jobs, Job, find_job, insert_job, put_job, remove_job, list_jobs);

    /// Write every change of this command to the store. The first
    /// revision conflict aborts the flush and fails the command.
    pub fn flush(&mut self) -> Result<()> {
        self.definitions.flush(self.store.process_definitions().as_ref())?;
        self.executions.flush(self.store.executions().as_ref())?;
        self.variables.flush(self.store.variables().as_ref())?;
        self.subscriptions.flush(self.store.event_subscriptions().as_ref())?;
        self.tasks.flush(self.store.tasks().as_ref())?;
        self.jobs.flush(self.store.jobs().as_ref())?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use serde_json::json;

    use crate::{
        store::{
            DbStore, MemStore, Store,
            data::Variable,
            query::{Cond, Query},
        },
        utils,
    };

    use super::DbSession;

    fn variable(
        name: &str,
        execution_id: &str,
    ) -> Variable {
        Variable {
            id: utils::longid(),
            name: name.to_string(),
            execution_id: execution_id.to_string(),
            process_instance_id: execution_id.to_string(),
            value: json!(1),
            rev: 1,
        }
    }

    fn session() -> DbSession {
        let store = Store::new();
        MemStore::new().init(&store);
        DbSession::new(Arc::new(store))
    }

    #[test]
    fn test_insert_is_deferred_until_flush() {
        let mut session = session();
        let var = variable("amount", "e1");
        let id = var.id.clone();
        session.insert_variable(var);

        // visible inside the session, not yet in the store
        assert!(session.find_variable(&id).is_ok());

        session.flush().unwrap();
        let mut reread = DbSession::new(session.store.clone());
        assert_eq!(reread.find_variable(&id).unwrap().name, "amount");
    }

    #[test]
    fn test_list_overlays_session_state() {
        let mut session = session();
        let kept = variable("kept", "e1");
        let removed = variable("removed", "e1");
        session.insert_variable(kept);
        session.insert_variable(removed.clone());
        session.flush().unwrap();

        let mut session = DbSession::new(session.store.clone());
        session.remove_variable(&removed.id);
        session.insert_variable(variable("added", "e1"));

        let rows = session.list_variables(&Query::new().push(Cond::Eq("execution_id".into(), json!("e1")))).unwrap();
        let mut names = rows.iter().map(|v| v.name.as_str()).collect::<Vec<_>>();
        names.sort();
        assert_eq!(names, vec!["added", "kept"]);
    }

    #[test]
    fn test_dropped_session_rolls_back() {
        let mut session = session();
        let store = session.store.clone();
        session.insert_variable(variable("ghost", "e1"));
        drop(session);

        let mut reread = DbSession::new(store);
        let rows = reread.list_variables(&Query::new().push(Cond::Eq("name".into(), json!("ghost")))).unwrap();
        assert!(rows.is_empty());
    }
}
