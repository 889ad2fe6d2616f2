//! Finder query filters.
//!
//! A `Query` is a conjunction of conditions plus ordering and pagination,
//! interpreted by each backend (JSON-document matching in the mem store,
//! sea-query expressions in postgres).

use serde_json::Value as JsonValue;

const DEFAULT_LIMIT: usize = 10_000;

/// A single filter condition over a column.
#[derive(Debug, Clone)]
pub enum Cond {
    Eq(String, JsonValue),
    Ne(String, JsonValue),
    Lt(String, JsonValue),
    Le(String, JsonValue),
    Gt(String, JsonValue),
    Ge(String, JsonValue),
    IsNull(String),
    NotNull(String),
    /// Disjunction of conditions, e.g. `lock_owner IS NULL OR
    /// lock_expiration <= now`.
    Or(Vec<Cond>),
}

/// Conjunctive filter with ordering and pagination.
#[derive(Debug, Clone)]
pub struct Query {
    conds: Vec<Cond>,
    order: Vec<(String, bool)>,
    limit: usize,
    offset: usize,
}

impl Default for Query {
    fn default() -> Self {
        Self::new()
    }
}

impl Query {
    pub fn new() -> Self {
        Self {
            conds: Vec::new(),
            order: Vec::new(),
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }

    pub fn push(
        mut self,
        cond: Cond,
    ) -> Self {
        self.conds.push(cond);
        self
    }

    pub fn order_by(
        mut self,
        column: &str,
        rev: bool,
    ) -> Self {
        self.order.push((column.to_string(), rev));
        self
    }

    pub fn limit(
        mut self,
        limit: usize,
    ) -> Self {
        self.limit = limit.max(1);
        self
    }

    pub fn offset(
        mut self,
        offset: usize,
    ) -> Self {
        self.offset = offset;
        self
    }

    pub fn conds(&self) -> &[Cond] {
        &self.conds
    }

    pub fn order(&self) -> &[(String, bool)] {
        &self.order
    }

    pub fn get_limit(&self) -> usize {
        self.limit
    }

    pub fn get_offset(&self) -> usize {
        self.offset
    }
}

impl Cond {
    /// Evaluate this condition against a JSON document (mem backend).
    pub fn matches(
        &self,
        doc: &std::collections::HashMap<String, JsonValue>,
    ) -> bool {
        match self {
            Cond::Eq(col, value) => doc.get(col).map(|v| v == value).unwrap_or(value.is_null()),
            Cond::Ne(col, value) => doc.get(col).map(|v| v != value).unwrap_or(!value.is_null()),
            Cond::Lt(col, value) => compare(doc.get(col), value).map(|o| o.is_lt()).unwrap_or(false),
            Cond::Le(col, value) => compare(doc.get(col), value).map(|o| o.is_le()).unwrap_or(false),
            Cond::Gt(col, value) => compare(doc.get(col), value).map(|o| o.is_gt()).unwrap_or(false),
            Cond::Ge(col, value) => compare(doc.get(col), value).map(|o| o.is_ge()).unwrap_or(false),
            Cond::IsNull(col) => doc.get(col).map(|v| v.is_null()).unwrap_or(true),
            Cond::NotNull(col) => doc.get(col).map(|v| !v.is_null()).unwrap_or(false),
            Cond::Or(conds) => conds.iter().any(|c| c.matches(doc)),
        }
    }
}

pub(crate) fn compare(
    lhs: Option<&JsonValue>,
    rhs: &JsonValue,
) -> Option<std::cmp::Ordering> {
    let lhs = lhs?;
    match (lhs, rhs) {
        (JsonValue::Number(a), JsonValue::Number(b)) => a.as_f64().partial_cmp(&b.as_f64()),
        (JsonValue::String(a), JsonValue::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

#[cfg(test)]
mod test {
    use std::collections::HashMap;

    use serde_json::{Value as JsonValue, json};

    use super::Cond;

    fn doc() -> HashMap<String, JsonValue> {
        let mut doc = HashMap::new();
        doc.insert("state".to_string(), json!("available"));
        doc.insert("due_date".to_string(), json!(100));
        doc.insert("lock_owner".to_string(), JsonValue::Null);
        doc
    }

    #[test]
    fn test_cond_matches() {
        let doc = doc();
        assert!(Cond::Eq("state".into(), json!("available")).matches(&doc));
        assert!(!Cond::Eq("state".into(), json!("deadletter")).matches(&doc));
        assert!(Cond::Le("due_date".into(), json!(100)).matches(&doc));
        assert!(!Cond::Lt("due_date".into(), json!(100)).matches(&doc));
        assert!(Cond::IsNull("lock_owner".into()).matches(&doc));
        // missing column counts as null
        assert!(Cond::IsNull("lock_expiration".into()).matches(&doc));
    }

    #[test]
    fn test_cond_or() {
        let doc = doc();
        let or = Cond::Or(vec![Cond::NotNull("lock_owner".into()), Cond::Le("due_date".into(), json!(500))]);
        assert!(or.matches(&doc));
    }
}
