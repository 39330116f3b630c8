//! # dbx
//!
//! A struct-relational mapping layer for Postgres.
//!
//! ## Features
//!
//! - **Named parameters**: `:name` templates compiled to positional SQL, with
//!   sequence arguments expanded for `in (...)` lists
//! - **Tagged records**: `#[derive(Record)]` with `#[dbx("column:id,primary_key,auto_increment")]`
//!   field tags, embedded records flattened
//! - **Generated writes**: INSERT / UPDATE built from a record, generated keys
//!   written back
//! - **Row materialization**: results scanned into scalars, records, or
//!   vectors of either, checked against the column list up front
//! - **Transaction-friendly**: the same executor API over a client or a
//!   transaction
//!
//! ## Example
//!
//! ```ignore
//! use dbx::{Db, Record, named_args};
//!
//! #[derive(Debug, Default, Record)]
//! #[dbx(table = "users")]
//! struct User {
//!     #[dbx("column:id,primary_key,auto_increment")]
//!     id: i64,
//!     #[dbx("column:name")]
//!     name: String,
//!     #[dbx("column:updated_at,insert:now(),update:now()")]
//!     updated_at: Option<chrono::DateTime<chrono::Utc>>,
//! }
//!
//! let db = Db::new(client);
//! let mut user = User { name: "ann".into(), ..Default::default() };
//! db.insert(&mut user).await?;
//!
//! let found: Vec<User> = db
//!     .named_query("select id, name from users where id in (:ids)", &named_args! { "ids" => vec![user.id] })
//!     .await?;
//! ```

pub mod client;
pub mod db;
pub mod error;
pub mod escape;
pub mod format;
pub mod generator;
pub mod log;
pub mod named;
pub mod reflect;
pub mod scan;
pub mod tag;
pub mod transaction;
pub mod value;

pub use client::{GenericClient, PgRows};
pub use db::{Db, DbConfig, Statement};
pub use error::{OrmError, OrmResult};
pub use format::format_sql;
pub use generator::{Generator, InsertSql, UpdateSql};
pub use log::SqlLogger;
pub use named::{CompiledQuery, NamedArgs, Placeholder, compile, compile_with};
pub use reflect::{
    Column, Columns, ColumnsBuilder, FieldBinding, Mapping, Record, Table, reflect,
    reflect_columns,
};
pub use scan::{
    RecordPlan, RowCursor, Scan, ScanMode, VecCursor, materialize, scan_all, scan_all_into,
    scan_into, scan_one, scan_opt,
};
pub use tag::ColumnBinding;
pub use value::{ConversionError, FromValue, Kind, Value};

#[cfg(feature = "derive")]
pub use dbx_derive::Record;
