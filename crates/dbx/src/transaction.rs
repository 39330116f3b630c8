//! Transactions.
//!
//! [`Db::transaction`] opens a transaction and returns an executor over it;
//! every [`Db`] method works the same inside. The [`transaction!`] macro
//! commits or rolls back for you.
//!
//! # Example
//!
//! ```ignore
//! use dbx::{Db, OrmError};
//!
//! # async fn demo(db: &mut Db<tokio_postgres::Client>) -> dbx::OrmResult<()> {
//! dbx::transaction!(db, tx, {
//!     tx.exec("update accounts set balance = balance - $1 where id = $2", &[100_i64.into(), 1_i64.into()])
//!         .await?;
//!     tx.exec("update accounts set balance = balance + $1 where id = $2", &[100_i64.into(), 2_i64.into()])
//!         .await?;
//!     Ok::<(), OrmError>(())
//! })?;
//! # Ok(()) }
//! ```

use crate::db::Db;
use crate::error::{OrmError, OrmResult};
use tokio_postgres::{Client, Transaction};

/// Runs the given block inside a database transaction.
///
/// - Begins a transaction via `$db.transaction().await`.
/// - Commits on `Ok(_)`.
/// - Rolls back on `Err(_)`.
///
/// The block must evaluate to `dbx::OrmResult<T>`.
#[macro_export]
macro_rules! transaction {
    ($db:expr, $tx:ident, $body:block) => {{
        let $tx = ($db).transaction().await?;

        let __dbx_tx_body_result = async { $body }.await;
        match __dbx_tx_body_result {
            Ok(value) => {
                $tx.commit().await?;
                Ok(value)
            }
            Err(error) => match $tx.rollback().await {
                Ok(()) => Err(error),
                Err(rollback_err) => Err($crate::OrmError::Other(format!(
                    "{error} (rollback failed: {rollback_err})"
                ))),
            },
        }
    }};
}

impl Db<Client> {
    /// Begin a transaction.
    pub async fn transaction(&mut self) -> OrmResult<Db<Transaction<'_>>> {
        let tx = self
            .client
            .transaction()
            .await
            .map_err(OrmError::from_db_error)?;
        Ok(Db {
            client: tx,
            config: self.config.clone(),
        })
    }
}

impl Db<Transaction<'_>> {
    /// Begin a nested transaction (a savepoint).
    pub async fn transaction(&mut self) -> OrmResult<Db<Transaction<'_>>> {
        let tx = self
            .client
            .transaction()
            .await
            .map_err(OrmError::from_db_error)?;
        Ok(Db {
            client: tx,
            config: self.config.clone(),
        })
    }

    pub async fn commit(self) -> OrmResult<()> {
        self.client.commit().await.map_err(OrmError::from_db_error)
    }

    pub async fn rollback(self) -> OrmResult<()> {
        self.client.rollback().await.map_err(OrmError::from_db_error)
    }
}
