use std::sync::Arc;

use sea_query::{Alias as SeaAlias, Cond as SeaCond, Expr as SeaExpr, Value as SeaValue};
use serde_json::Value as JsonValue;

use crate::store::query::{Cond, Query};

use super::synclient::SynClient;

mod event_subscription;
mod execution;
mod job;
mod process_definition;
mod task;
mod variable;

pub use event_subscription::EventSubscriptionCollection;
pub use execution::ExecutionCollection;
pub use job::JobCollection;
pub use process_definition::ProcessDefinitionCollection;
pub use task::TaskCollection;
pub use variable::VariableCollection;

pub(crate) use crate::store::map_db_err;

pub type DbConnection = Arc<SynClient>;

/// Translates a finder query into a sea-query condition tree.
pub fn into_query(q: &Query) -> SeaCond {
    let mut filter = SeaCond::all();
    for cond in q.conds() {
        filter = filter.add(sea_cond(cond));
    }
    filter
}

fn sea_cond(cond: &Cond) -> SeaCond {
    match cond {
        Cond::Eq(col, value) => SeaCond::all().add(SeaExpr::col(SeaAlias::new(col)).eq(sea_value(value))),
        Cond::Ne(col, value) => SeaCond::all().add(SeaExpr::col(SeaAlias::new(col)).ne(sea_value(value))),
        Cond::Lt(col, value) => SeaCond::all().add(SeaExpr::col(SeaAlias::new(col)).lt(sea_value(value))),
        Cond::Le(col, value) => SeaCond::all().add(SeaExpr::col(SeaAlias::new(col)).lte(sea_value(value))),
        Cond::Gt(col, value) => SeaCond::all().add(SeaExpr::col(SeaAlias::new(col)).gt(sea_value(value))),
        Cond::Ge(col, value) => SeaCond::all().add(SeaExpr::col(SeaAlias::new(col)).gte(sea_value(value))),
        Cond::IsNull(col) => SeaCond::all().add(SeaExpr::col(SeaAlias::new(col)).is_null()),
        Cond::NotNull(col) => SeaCond::all().add(SeaExpr::col(SeaAlias::new(col)).is_not_null()),
        Cond::Or(conds) => conds.iter().fold(SeaCond::any(), |any, c| any.add(sea_cond(c))),
    }
}

fn sea_value(value: &JsonValue) -> SeaValue {
    match value {
        JsonValue::String(v) => v.clone().into(),
        JsonValue::Bool(v) => (*v).into(),
        JsonValue::Number(v) if v.is_i64() => v.as_i64().into(),
        JsonValue::Number(v) => v.as_f64().into(),
        _ => SeaValue::String(None),
    }
}
