//! The executor: runs SQL through a [`GenericClient`] and materializes the
//! results.
//!
//! ```ignore
//! use dbx::{Db, named_args};
//!
//! let db = Db::new(client);
//!
//! let count: i64 = db.get("select count(*) from users", &[]).await?;
//! let users: Vec<User> = db
//!     .named_query(
//!         "select id, name from users where status in (:status)",
//!         &named_args! { "status" => vec!["active", "invited"] },
//!     )
//!     .await?;
//!
//! let mut user = User { name: "ann".into(), ..Default::default() };
//! db.insert(&mut user).await?; // user.id now holds the generated key
//! ```
//!
//! SQL passed to the positional methods uses Postgres `$n` placeholders; named
//! templates are compiled to `$n` as well.

use crate::client::{GenericClient, PgRows};
use crate::error::{OrmError, OrmResult};
use crate::generator::Generator;
use crate::log::SqlLogger;
use crate::named::{CompiledQuery, NamedArgs, Placeholder, compile_with};
use crate::reflect::{Record, Table};
use crate::scan::{Scan, scan_all, scan_all_into, scan_into, scan_one, scan_opt};
use crate::value::Value;
use std::future::Future;
use std::time::Duration;
use tokio_postgres::types::ToSql;

/// Executor configuration.
#[derive(Debug, Clone, Default)]
pub struct DbConfig {
    /// Upper bound on each round trip. `None` means no timeout.
    pub query_timeout: Option<Duration>,
    /// Statement logging.
    pub logger: SqlLogger,
}

impl DbConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail statements that take longer than `timeout`.
    pub fn query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = Some(timeout);
        self
    }

    /// Replace the statement logger.
    pub fn logger(mut self, logger: SqlLogger) -> Self {
        self.logger = logger;
        self
    }

    /// Log statements with their arguments inlined.
    pub fn log_sql(mut self, enabled: bool) -> Self {
        self.logger = self.logger.inline_args(enabled);
        self
    }

    /// Truncate logged SQL to `len` bytes.
    pub fn max_sql_length(mut self, len: usize) -> Self {
        self.logger = self.logger.max_sql_length(len);
        self
    }
}

/// SQL executor over a client or a transaction.
#[derive(Debug)]
pub struct Db<C> {
    pub(crate) client: C,
    pub(crate) config: DbConfig,
}

fn params(args: &[Value]) -> Vec<&(dyn ToSql + Sync)> {
    args.iter().map(|arg| arg as &(dyn ToSql + Sync)).collect()
}

impl<C: GenericClient> Db<C> {
    pub fn new(client: C) -> Self {
        Self::with_config(client, DbConfig::default())
    }

    pub fn with_config(client: C, config: DbConfig) -> Self {
        Self { client, config }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn config(&self) -> &DbConfig {
        &self.config
    }

    pub fn into_inner(self) -> C {
        self.client
    }

    /// The statement generator used by [`Db::insert`] and [`Db::update`].
    pub fn generator(&self) -> Generator {
        Generator::new(Placeholder::Dollar)
    }

    async fn timed<T, F>(&self, fut: F) -> OrmResult<T>
    where
        F: Future<Output = OrmResult<T>>,
    {
        match self.config.query_timeout {
            Some(timeout) => tokio::time::timeout(timeout, fut)
                .await
                .map_err(|_| OrmError::Timeout(timeout))?,
            None => fut.await,
        }
    }

    async fn prepare_raw(&self, sql: &str) -> OrmResult<tokio_postgres::Statement> {
        self.timed(self.client.prepare_statement(sql)).await
    }

    async fn fetch(
        &self,
        stmt: &tokio_postgres::Statement,
        sql: &str,
        args: &[Value],
    ) -> OrmResult<PgRows> {
        self.config.logger.log(sql, args);
        let params = params(args);
        let rows = self.timed(self.client.query_prepared(stmt, &params)).await?;
        Ok(PgRows::new(stmt, rows))
    }

    async fn run(&self, stmt: &tokio_postgres::Statement, sql: &str, args: &[Value]) -> OrmResult<u64> {
        self.config.logger.log(sql, args);
        let params = params(args);
        self.timed(self.client.execute_prepared(stmt, &params)).await
    }

    /// Run a query and return its rows as a cursor.
    pub async fn rows(&self, sql: &str, args: &[Value]) -> OrmResult<PgRows> {
        let stmt = self.prepare_raw(sql).await?;
        self.fetch(&stmt, sql, args).await
    }

    /// Execute a statement and return the number of affected rows.
    pub async fn exec(&self, sql: &str, args: &[Value]) -> OrmResult<u64> {
        let stmt = self.prepare_raw(sql).await?;
        self.run(&stmt, sql, args).await
    }

    /// Scan the first row.
    ///
    /// An empty result is [`OrmError::NoRows`].
    pub async fn get<T: Scan>(&self, sql: &str, args: &[Value]) -> OrmResult<T> {
        scan_one(self.rows(sql, args).await?)
    }

    /// Scan the first row onto an existing value.
    pub async fn get_into<T: Scan>(&self, dest: &mut T, sql: &str, args: &[Value]) -> OrmResult<()> {
        scan_into(self.rows(sql, args).await?, dest)
    }

    /// Scan the first row, if any.
    pub async fn get_opt<T: Scan>(&self, sql: &str, args: &[Value]) -> OrmResult<Option<T>> {
        scan_opt(self.rows(sql, args).await?)
    }

    /// Scan every row.
    pub async fn query<T: Scan>(&self, sql: &str, args: &[Value]) -> OrmResult<Vec<T>> {
        scan_all(self.rows(sql, args).await?)
    }

    /// Append every row to `dest`.
    pub async fn query_into<T: Scan>(
        &self,
        dest: &mut Vec<T>,
        sql: &str,
        args: &[Value],
    ) -> OrmResult<()> {
        scan_all_into(self.rows(sql, args).await?, dest)
    }

    fn compile(&self, template: &str, args: &NamedArgs) -> OrmResult<CompiledQuery> {
        compile_with(template, args, Placeholder::Dollar)
    }

    /// [`Db::exec`] with a named template.
    pub async fn named_exec(&self, template: &str, args: &NamedArgs) -> OrmResult<u64> {
        let q = self.compile(template, args)?;
        self.exec(&q.sql, &q.args).await
    }

    /// [`Db::get`] with a named template.
    pub async fn named_get<T: Scan>(&self, template: &str, args: &NamedArgs) -> OrmResult<T> {
        let q = self.compile(template, args)?;
        self.get(&q.sql, &q.args).await
    }

    /// [`Db::get_opt`] with a named template.
    pub async fn named_get_opt<T: Scan>(
        &self,
        template: &str,
        args: &NamedArgs,
    ) -> OrmResult<Option<T>> {
        let q = self.compile(template, args)?;
        self.get_opt(&q.sql, &q.args).await
    }

    /// [`Db::query`] with a named template.
    pub async fn named_query<T: Scan>(&self, template: &str, args: &NamedArgs) -> OrmResult<Vec<T>> {
        let q = self.compile(template, args)?;
        self.query(&q.sql, &q.args).await
    }

    /// Insert `record`.
    ///
    /// When the record has an auto-increment column the statement returns it
    /// and the generated key is written back into `record`.
    pub async fn insert<T: Record + Table>(&self, record: &mut T) -> OrmResult<u64> {
        let insert = self.generator().insert_sql(record)?;
        match insert.auto_increment_column() {
            Some(column) => {
                let sql = format!("{} returning {column}", insert.sql);
                let id: i64 = self.get(&sql, &insert.args).await?;
                insert.assign_id(record, id)?;
                Ok(1)
            }
            None => self.exec(&insert.sql, &insert.args).await,
        }
    }

    /// Update `record` by primary key.
    ///
    /// An empty `columns` writes every non-key column.
    pub async fn update<T: Record + Table>(&self, record: &T, columns: &[&str]) -> OrmResult<u64> {
        let update = self.generator().update_sql(record, columns)?;
        self.exec(&update.sql, &update.args).await
    }

    /// Prepare `sql` once for repeated execution.
    pub async fn prepare(&self, sql: &str) -> OrmResult<Statement<'_, C>> {
        let inner = self.prepare_raw(sql).await?;
        Ok(Statement {
            db: self,
            sql: sql.to_string(),
            inner,
        })
    }
}

/// A prepared statement bound to its executor.
#[derive(Debug)]
pub struct Statement<'a, C> {
    db: &'a Db<C>,
    sql: String,
    inner: tokio_postgres::Statement,
}

impl<C: GenericClient> Statement<'_, C> {
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Result column names.
    pub fn columns(&self) -> Vec<&str> {
        self.inner.columns().iter().map(|c| c.name()).collect()
    }

    pub async fn exec(&self, args: &[Value]) -> OrmResult<u64> {
        self.db.run(&self.inner, &self.sql, args).await
    }

    pub async fn get<T: Scan>(&self, args: &[Value]) -> OrmResult<T> {
        scan_one(self.db.fetch(&self.inner, &self.sql, args).await?)
    }

    pub async fn get_opt<T: Scan>(&self, args: &[Value]) -> OrmResult<Option<T>> {
        scan_opt(self.db.fetch(&self.inner, &self.sql, args).await?)
    }

    pub async fn query<T: Scan>(&self, args: &[Value]) -> OrmResult<Vec<T>> {
        scan_all(self.db.fetch(&self.inner, &self.sql, args).await?)
    }
}
