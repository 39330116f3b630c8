//! Generic client trait for unified database access.

use crate::error::{OrmError, OrmResult};
use crate::scan::RowCursor;
use crate::value::Value;
use tokio_postgres::types::ToSql;
use tokio_postgres::{Row, Statement};

/// A trait that unifies database clients and transactions.
///
/// This allows [`Db`](crate::Db) to run over either a direct client
/// connection or a transaction.
pub trait GenericClient: Send + Sync {
    /// Prepare a statement on this connection.
    ///
    /// Prepared statements are **per-connection** and must not be used across connections.
    fn prepare_statement(
        &self,
        sql: &str,
    ) -> impl std::future::Future<Output = OrmResult<Statement>> + Send;

    /// Execute a prepared statement and return all rows.
    fn query_prepared(
        &self,
        stmt: &Statement,
        params: &[&(dyn ToSql + Sync)],
    ) -> impl std::future::Future<Output = OrmResult<Vec<Row>>> + Send;

    /// Execute a prepared statement and return the number of affected rows.
    fn execute_prepared(
        &self,
        stmt: &Statement,
        params: &[&(dyn ToSql + Sync)],
    ) -> impl std::future::Future<Output = OrmResult<u64>> + Send;
}

impl GenericClient for tokio_postgres::Client {
    async fn prepare_statement(&self, sql: &str) -> OrmResult<Statement> {
        tokio_postgres::Client::prepare(self, sql)
            .await
            .map_err(OrmError::from_db_error)
    }

    async fn query_prepared(
        &self,
        stmt: &Statement,
        params: &[&(dyn ToSql + Sync)],
    ) -> OrmResult<Vec<Row>> {
        tokio_postgres::Client::query(self, stmt, params)
            .await
            .map_err(OrmError::from_db_error)
    }

    async fn execute_prepared(
        &self,
        stmt: &Statement,
        params: &[&(dyn ToSql + Sync)],
    ) -> OrmResult<u64> {
        tokio_postgres::Client::execute(self, stmt, params)
            .await
            .map_err(OrmError::from_db_error)
    }
}

impl GenericClient for tokio_postgres::Transaction<'_> {
    async fn prepare_statement(&self, sql: &str) -> OrmResult<Statement> {
        tokio_postgres::Transaction::prepare(self, sql)
            .await
            .map_err(OrmError::from_db_error)
    }

    async fn query_prepared(
        &self,
        stmt: &Statement,
        params: &[&(dyn ToSql + Sync)],
    ) -> OrmResult<Vec<Row>> {
        tokio_postgres::Transaction::query(self, stmt, params)
            .await
            .map_err(OrmError::from_db_error)
    }

    async fn execute_prepared(
        &self,
        stmt: &Statement,
        params: &[&(dyn ToSql + Sync)],
    ) -> OrmResult<u64> {
        tokio_postgres::Transaction::execute(self, stmt, params)
            .await
            .map_err(OrmError::from_db_error)
    }
}

impl<C: GenericClient> GenericClient for &C {
    fn prepare_statement(
        &self,
        sql: &str,
    ) -> impl std::future::Future<Output = OrmResult<Statement>> + Send {
        (**self).prepare_statement(sql)
    }

    fn query_prepared(
        &self,
        stmt: &Statement,
        params: &[&(dyn ToSql + Sync)],
    ) -> impl std::future::Future<Output = OrmResult<Vec<Row>>> + Send {
        (**self).query_prepared(stmt, params)
    }

    fn execute_prepared(
        &self,
        stmt: &Statement,
        params: &[&(dyn ToSql + Sync)],
    ) -> impl std::future::Future<Output = OrmResult<u64>> + Send {
        (**self).execute_prepared(stmt, params)
    }
}

/// Rows fetched by the executor, exposed as a [`RowCursor`].
///
/// Column names come from the prepared statement, so they are known even
/// when the result is empty.
#[derive(Debug)]
pub struct PgRows {
    columns: Vec<String>,
    rows: std::vec::IntoIter<Row>,
}

impl PgRows {
    pub fn new(statement: &Statement, rows: Vec<Row>) -> Self {
        Self {
            columns: statement
                .columns()
                .iter()
                .map(|column| column.name().to_string())
                .collect(),
            rows: rows.into_iter(),
        }
    }
}

impl RowCursor for PgRows {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn next_row(&mut self) -> OrmResult<Option<Vec<Value>>> {
        self.rows.next().map(|row| decode_row(&row)).transpose()
    }

    fn close(&mut self) -> OrmResult<()> {
        self.rows = Vec::new().into_iter();
        Ok(())
    }
}

fn decode_row(row: &Row) -> OrmResult<Vec<Value>> {
    row.columns()
        .iter()
        .enumerate()
        .map(|(idx, column)| {
            row.try_get::<_, Value>(idx)
                .map_err(|e| OrmError::decode(column.name(), e.to_string()))
        })
        .collect()
}
