use sea_query::{
    Alias as SeaAlias, ColumnDef, Expr as SeaExpr, Func as SeaFunc, Iden, Index, Order as SeaOrder, PostgresQueryBuilder, Query as SeaQuery, Table,
};
use sea_query_binder::SqlxBinder;
use sqlx::{Error as DbError, Row, postgres::PgRow};

use crate::{
    ProcflowError, Result,
    store::{
        DbCollection, PageData, data,
        db::postgres::{DbInit, DbRow},
        query,
    },
};

use super::{DbConnection, into_query, map_db_err};

#[derive(Debug)]
pub struct EventSubscriptionCollection {
    conn: DbConnection,
}

#[derive(Iden)]
#[iden = "event_subscriptions"]
enum CollectionIden {
    Table,

    Id,
    EventType,
    EventName,
    ExecutionId,
    ProcessInstanceId,
    ProcessDefinitionId,
    ActivityId,
    Created,
    Rev,
}

const COLUMNS: [CollectionIden; 9] = [
    CollectionIden::Id,
    CollectionIden::EventType,
    CollectionIden::EventName,
    CollectionIden::ExecutionId,
    CollectionIden::ProcessInstanceId,
    CollectionIden::ProcessDefinitionId,
    CollectionIden::ActivityId,
    CollectionIden::Created,
    CollectionIden::Rev,
];

impl DbCollection for EventSubscriptionCollection {
    type Item = data::EventSubscription;

    fn exists(
        &self,
        id: &str,
    ) -> Result<bool> {
        let (sql, values) = SeaQuery::select()
            .from(CollectionIden::Table)
            .expr(SeaFunc::count(SeaExpr::col(CollectionIden::Id)))
            .and_where(SeaExpr::col(CollectionIden::Id).eq(id))
            .build_sqlx(PostgresQueryBuilder);

        let count = self.conn.query_one(sql.as_str(), values).map(|row| row.get::<i64, usize>(0)).map_err(map_db_err)?;

        Ok(count > 0)
    }

    fn find(
        &self,
        id: &str,
    ) -> Result<Self::Item> {
        let (sql, values) = SeaQuery::select()
            .from(CollectionIden::Table)
            .columns(COLUMNS)
            .and_where(SeaExpr::col(CollectionIden::Id).eq(id))
            .build_sqlx(PostgresQueryBuilder);

        self.conn.query_one(&sql, values).map(|row| Self::Item::from_row(&row).map_err(map_db_err)).map_err(map_db_err)?
    }

    fn query(
        &self,
        q: &query::Query,
    ) -> Result<PageData<Self::Item>> {
        let filter = into_query(q);

        let mut count_query = SeaQuery::select();
        count_query.from(CollectionIden::Table).expr(SeaFunc::count(SeaExpr::col(SeaAlias::new("id"))));

        let mut query = SeaQuery::select();
        query.columns(COLUMNS).from(CollectionIden::Table);

        if !filter.is_empty() {
            count_query.cond_where(filter.clone());
            query.cond_where(filter);
        }

        for (order, rev) in q.order().iter() {
            query.order_by(
                SeaAlias::new(order),
                if *rev {
                    SeaOrder::Desc
                } else {
                    SeaOrder::Asc
                },
            );
        }
        let (sql, values) = query.limit(q.get_limit() as u64).offset(q.get_offset() as u64).build_sqlx(PostgresQueryBuilder);

        let (count_sql, count_values) = count_query.build_sqlx(PostgresQueryBuilder);
        let count = self.conn.query_one(count_sql.as_str(), count_values).map_err(map_db_err)?.get::<i64, usize>(0) as usize;
        let page_count = count.div_ceil(q.get_limit());
        let page_num = q.get_offset() / q.get_limit() + 1;
        let data = PageData {
            count,
            page_size: q.get_limit(),
            page_num,
            page_count,
            rows: self.conn.query(&sql, values).map_err(map_db_err)?.iter().map(|row| Self::Item::from_row(row).unwrap()).collect::<Vec<_>>(),
        };
        Ok(data)
    }

    fn create(
        &self,
        data: &Self::Item,
    ) -> Result<bool> {
        let model = data.clone();
        let (sql, sql_values) = SeaQuery::insert()
            .into_table(CollectionIden::Table)
            .columns(COLUMNS)
            .values([
                model.id.into(),
                model.event_type.into(),
                model.event_name.into(),
                model.execution_id.into(),
                model.process_instance_id.into(),
                model.process_definition_id.into(),
                model.activity_id.into(),
                model.created.into(),
                model.rev.into(),
            ])
            .map_err(map_db_err)?
            .build_sqlx(PostgresQueryBuilder);

        let result = self.conn.execute(sql.as_str(), sql_values).map_err(map_db_err)?;
        Ok(result.rows_affected() > 0)
    }

    fn update(
        &self,
        data: &Self::Item,
    ) -> Result<bool> {
        let model = data.clone();
        let (sql, sql_values) = SeaQuery::update()
            .table(CollectionIden::Table)
            .values([
                (CollectionIden::EventType, model.event_type.into()),
                (CollectionIden::EventName, model.event_name.into()),
                (CollectionIden::ExecutionId, model.execution_id.into()),
                (CollectionIden::ProcessInstanceId, model.process_instance_id.into()),
                (CollectionIden::ProcessDefinitionId, model.process_definition_id.into()),
                (CollectionIden::ActivityId, model.activity_id.into()),
                (CollectionIden::Created, model.created.into()),
                (CollectionIden::Rev, (model.rev + 1).into()),
            ])
            .and_where(SeaExpr::col(CollectionIden::Id).eq(model.id.as_str()))
            .and_where(SeaExpr::col(CollectionIden::Rev).eq(model.rev))
            .build_sqlx(PostgresQueryBuilder);

        let result = self.conn.execute(sql.as_str(), sql_values).map_err(map_db_err)?;
        if result.rows_affected() == 0 {
            return Err(ProcflowError::OptimisticLocking(format!("event_subscription {} was concurrently updated", data.id)));
        }
        Ok(true)
    }

    fn delete(
        &self,
        id: &str,
    ) -> Result<bool> {
        let (sql, values) =
            SeaQuery::delete().from_table(CollectionIden::Table).and_where(SeaExpr::col(CollectionIden::Id).eq(id)).build_sqlx(PostgresQueryBuilder);

        let result = self.conn.execute(sql.as_str(), values).map_err(map_db_err)?;
        Ok(result.rows_affected() > 0)
    }
}

impl DbRow for data::EventSubscription {
    fn from_row(row: &PgRow) -> std::result::Result<Self, DbError>
    where
        Self: Sized,
    {
        Ok(Self {
            id: row.get("id"),
            event_type: row.get("event_type"),
            event_name: row.get("event_name"),
            execution_id: row.get("execution_id"),
            process_instance_id: row.get("process_instance_id"),
            process_definition_id: row.get("process_definition_id"),
            activity_id: row.get("activity_id"),
            created: row.get("created"),
            rev: row.get("rev"),
        })
    }
}

impl DbInit for EventSubscriptionCollection {
    fn init(&self) {
        let sql = [
            Table::create()
                .table(CollectionIden::Table)
                .if_not_exists()
                .col(ColumnDef::new(CollectionIden::Id).string().not_null().primary_key())
                .col(ColumnDef::new(CollectionIden::EventType).string().not_null())
                .col(ColumnDef::new(CollectionIden::EventName).string().not_null())
                .col(ColumnDef::new(CollectionIden::ExecutionId).string())
                .col(ColumnDef::new(CollectionIden::ProcessInstanceId).string())
                .col(ColumnDef::new(CollectionIden::ProcessDefinitionId).string().not_null())
                .col(ColumnDef::new(CollectionIden::ActivityId).string().not_null())
                .col(ColumnDef::new(CollectionIden::Created).big_integer().default(0))
                .col(ColumnDef::new(CollectionIden::Rev).integer().not_null().default(1))
                .build(PostgresQueryBuilder),
            Index::create()
                .name("idx_event_subscriptions_type_name")
                .if_not_exists()
                .table(CollectionIden::Table)
                .col(CollectionIden::EventType)
                .col(CollectionIden::EventName)
                .build(PostgresQueryBuilder),
            Index::create()
                .name("idx_event_subscriptions_execution_id")
                .if_not_exists()
                .table(CollectionIden::Table)
                .col(CollectionIden::ExecutionId)
                .build(PostgresQueryBuilder),
        ];
        self.conn.batch_execute(&sql).unwrap();
    }
}

impl EventSubscriptionCollection {
    pub fn new(conn: &DbConnection) -> Self {
        Self {
            conn: conn.clone(),
        }
    }
}
