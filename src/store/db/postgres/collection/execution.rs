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
pub struct ExecutionCollection {
    conn: DbConnection,
}

#[derive(Iden)]
#[iden = "executions"]
enum CollectionIden {
    Table,

    Id,
    ParentId,
    ProcessInstanceId,
    ProcessDefinitionId,
    ActivityId,
    IsActive,
    IsScope,
    IsConcurrent,
    IsCompensation,
    BusinessKey,
    SuperExecutionId,
    StartTime,
    Rev,
}

const COLUMNS: [CollectionIden; 13] = [
    CollectionIden::Id,
    CollectionIden::ParentId,
    CollectionIden::ProcessInstanceId,
    CollectionIden::ProcessDefinitionId,
    CollectionIden::ActivityId,
    CollectionIden::IsActive,
    CollectionIden::IsScope,
    CollectionIden::IsConcurrent,
    CollectionIden::IsCompensation,
    CollectionIden::BusinessKey,
    CollectionIden::SuperExecutionId,
    CollectionIden::StartTime,
    CollectionIden::Rev,
];

impl DbCollection for ExecutionCollection {
    type Item = data::Execution;

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
                model.parent_id.into(),
                model.process_instance_id.into(),
                model.process_definition_id.into(),
                model.activity_id.into(),
                model.is_active.into(),
                model.is_scope.into(),
                model.is_concurrent.into(),
                model.is_compensation.into(),
                model.business_key.into(),
                model.super_execution_id.into(),
                model.start_time.into(),
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
                (CollectionIden::ParentId, model.parent_id.into()),
                (CollectionIden::ProcessInstanceId, model.process_instance_id.into()),
                (CollectionIden::ProcessDefinitionId, model.process_definition_id.into()),
                (CollectionIden::ActivityId, model.activity_id.into()),
                (CollectionIden::IsActive, model.is_active.into()),
                (CollectionIden::IsScope, model.is_scope.into()),
                (CollectionIden::IsConcurrent, model.is_concurrent.into()),
                (CollectionIden::IsCompensation, model.is_compensation.into()),
                (CollectionIden::BusinessKey, model.business_key.into()),
                (CollectionIden::SuperExecutionId, model.super_execution_id.into()),
                (CollectionIden::StartTime, model.start_time.into()),
                (CollectionIden::Rev, (model.rev + 1).into()),
            ])
            .and_where(SeaExpr::col(CollectionIden::Id).eq(model.id.as_str()))
            .and_where(SeaExpr::col(CollectionIden::Rev).eq(model.rev))
            .build_sqlx(PostgresQueryBuilder);

        let result = self.conn.execute(sql.as_str(), sql_values).map_err(map_db_err)?;
        if result.rows_affected() == 0 {
            return Err(ProcflowError::OptimisticLocking(format!("execution {} was concurrently updated", data.id)));
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

impl DbRow for data::Execution {
    fn from_row(row: &PgRow) -> std::result::Result<Self, DbError>
    where
        Self: Sized,
    {
        Ok(Self {
            id: row.get("id"),
            parent_id: row.get("parent_id"),
            process_instance_id: row.get("process_instance_id"),
            process_definition_id: row.get("process_definition_id"),
            activity_id: row.get("activity_id"),
            is_active: row.get("is_active"),
            is_scope: row.get("is_scope"),
            is_concurrent: row.get("is_concurrent"),
            is_compensation: row.get("is_compensation"),
            business_key: row.get("business_key"),
            super_execution_id: row.get("super_execution_id"),
            start_time: row.get("start_time"),
            rev: row.get("rev"),
        })
    }
}

impl DbInit for ExecutionCollection {
    fn init(&self) {
        let sql = [
            Table::create()
                .table(CollectionIden::Table)
                .if_not_exists()
                .col(ColumnDef::new(CollectionIden::Id).string().not_null().primary_key())
                .col(ColumnDef::new(CollectionIden::ParentId).string())
                .col(ColumnDef::new(CollectionIden::ProcessInstanceId).string().not_null())
                .col(ColumnDef::new(CollectionIden::ProcessDefinitionId).string().not_null())
                .col(ColumnDef::new(CollectionIden::ActivityId).string())
                .col(ColumnDef::new(CollectionIden::IsActive).boolean().not_null())
                .col(ColumnDef::new(CollectionIden::IsScope).boolean().not_null())
                .col(ColumnDef::new(CollectionIden::IsConcurrent).boolean().not_null())
                .col(ColumnDef::new(CollectionIden::IsCompensation).boolean().not_null().default(false))
                .col(ColumnDef::new(CollectionIden::BusinessKey).string())
                .col(ColumnDef::new(CollectionIden::SuperExecutionId).string())
                .col(ColumnDef::new(CollectionIden::StartTime).big_integer().default(0))
                .col(ColumnDef::new(CollectionIden::Rev).integer().not_null().default(1))
                .build(PostgresQueryBuilder),
            Index::create()
                .name("idx_executions_process_instance_id")
                .if_not_exists()
                .table(CollectionIden::Table)
                .col(CollectionIden::ProcessInstanceId)
                .build(PostgresQueryBuilder),
            Index::create()
                .name("idx_executions_parent_id")
                .if_not_exists()
                .table(CollectionIden::Table)
                .col(CollectionIden::ParentId)
                .build(PostgresQueryBuilder),
        ];
        self.conn.batch_execute(&sql).unwrap();
    }
}

impl ExecutionCollection {
    pub fn new(conn: &DbConnection) -> Self {
        Self {
            conn: conn.clone(),
        }
    }
}
