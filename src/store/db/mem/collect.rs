use std::{collections::HashMap, sync::RwLock};

use crate::{
    ProcflowError, Result,
    store::{DbCollection, PageData, query},
};

use super::DbDocument;

/// A single in-memory collection with revision-checked updates.
#[derive(Debug)]
pub struct Collect<T> {
    kind: String,
    items: RwLock<HashMap<String, T>>,
}

impl<T> Collect<T> {
    pub fn new(kind: &str) -> Self {
        Self {
            kind: kind.to_string(),
            items: RwLock::new(HashMap::new()),
        }
    }
}

impl<T> DbCollection for Collect<T>
where
    T: DbDocument + Send + Sync,
{
    type Item = T;

    fn exists(
        &self,
        id: &str,
    ) -> Result<bool> {
        let items = self.items.read().unwrap();
        Ok(items.contains_key(id))
    }

    fn find(
        &self,
        id: &str,
    ) -> Result<Self::Item> {
        let items = self.items.read().unwrap();
        items.get(id).cloned().ok_or(ProcflowError::not_found(&self.kind, id))
    }

    fn query(
        &self,
        q: &query::Query,
    ) -> Result<PageData<Self::Item>> {
        let items = self.items.read().unwrap();

        let mut rows = Vec::new();
        for item in items.values() {
            let doc = item.doc()?;
            if q.conds().iter().all(|cond| cond.matches(&doc)) {
                rows.push((doc, item.clone()));
            }
        }

        if !q.order().is_empty() {
            rows.sort_by(|(a, _), (b, _)| {
                for (column, rev) in q.order().iter() {
                    let null = serde_json::Value::Null;
                    let rhs = b.get(column).unwrap_or(&null);
                    let ord = query::compare(a.get(column), rhs).unwrap_or(std::cmp::Ordering::Equal);
                    let ord = if *rev { ord.reverse() } else { ord };
                    if !ord.is_eq() {
                        return ord;
                    }
                }
                std::cmp::Ordering::Equal
            });
        }

        let count = rows.len();
        let page_count = count.div_ceil(q.get_limit());
        let page_num = q.get_offset() / q.get_limit() + 1;
        let rows = rows.into_iter().skip(q.get_offset()).take(q.get_limit()).map(|(_, item)| item).collect::<Vec<_>>();

        Ok(PageData {
            count,
            page_num,
            page_count,
            page_size: q.get_limit(),
            rows,
        })
    }

    fn create(
        &self,
        data: &Self::Item,
    ) -> Result<bool> {
        let mut items = self.items.write().unwrap();
        if items.contains_key(data.id()) {
            return Err(ProcflowError::Store(format!("{} {} already exists", self.kind, data.id())));
        }
        items.insert(data.id().to_string(), data.clone());
        Ok(true)
    }

    fn update(
        &self,
        data: &Self::Item,
    ) -> Result<bool> {
        let mut items = self.items.write().unwrap();
        match items.get_mut(data.id()) {
            None => Err(ProcflowError::OptimisticLocking(format!("{} {} was concurrently deleted", self.kind, data.id()))),
            Some(existing) if existing.revision() != data.revision() => {
                Err(ProcflowError::OptimisticLocking(format!("{} {} was concurrently updated", self.kind, data.id())))
            }
            Some(existing) => {
                let mut updated = data.clone();
                updated.set_revision(data.revision() + 1);
                *existing = updated;
                Ok(true)
            }
        }
    }

    fn delete(
        &self,
        id: &str,
    ) -> Result<bool> {
        let mut items = self.items.write().unwrap();
        Ok(items.remove(id).is_some())
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use crate::{
        store::{
            DbCollection,
            data::Job,
            query::{Cond, Query},
        },
        utils,
    };

    use super::Collect;

    fn job(
        id: &str,
        due: i64,
    ) -> Job {
        Job {
            id: id.to_string(),
            handler_type: "timer-trigger".to_string(),
            handler_config: json!({}),
            due_date: Some(due),
            retries: 3,
            exclusive: true,
            state: Job::AVAILABLE.to_string(),
            lock_owner: None,
            lock_expiration: None,
            exception: None,
            execution_id: None,
            process_instance_id: None,
            process_definition_id: None,
            created: utils::time::time_millis(),
            rev: 1,
        }
    }

    #[test]
    fn test_create_find_delete() {
        let jobs = Collect::new("job");
        jobs.create(&job("j1", 100)).unwrap();
        assert!(jobs.exists("j1").unwrap());
        assert!(jobs.create(&job("j1", 100)).is_err());

        let found = jobs.find("j1").unwrap();
        assert_eq!(found.due_date, Some(100));

        assert!(jobs.delete("j1").unwrap());
        assert!(jobs.find("j1").is_err());
    }

    #[test]
    fn test_update_checks_revision() {
        let jobs = Collect::new("job");
        jobs.create(&job("j1", 100)).unwrap();

        let mut first = jobs.find("j1").unwrap();
        let second = jobs.find("j1").unwrap();

        first.retries = 2;
        jobs.update(&first).unwrap();
        assert_eq!(jobs.find("j1").unwrap().rev, 2);

        // the stale copy loses the race
        let err = jobs.update(&second).unwrap_err();
        assert!(err.is_optimistic_locking());
    }

    #[test]
    fn test_query_filter_order_limit() {
        let jobs = Collect::new("job");
        for (id, due) in [("j1", 300), ("j2", 100), ("j3", 200)] {
            jobs.create(&job(id, due)).unwrap();
        }
        let mut dead = job("j4", 50);
        dead.state = Job::DEADLETTER.to_string();
        jobs.create(&dead).unwrap();

        let page = jobs
            .query(
                &Query::new()
                    .push(Cond::Eq("state".into(), json!(Job::AVAILABLE)))
                    .push(Cond::Le("due_date".into(), json!(250)))
                    .order_by("due_date", false)
                    .limit(10),
            )
            .unwrap();

        assert_eq!(page.count, 2);
        assert_eq!(page.rows.iter().map(|j| j.id.as_str()).collect::<Vec<_>>(), vec!["j2", "j3"]);
    }
}
