//! Row materialization.
//!
//! A [`RowCursor`] yields the column names of a result up front and then one
//! row of [`Value`]s at a time. The `scan_*` functions drain a cursor into a
//! destination implementing [`Scan`]:
//!
//! - scalars (`i64`, `String`, `Option<NaiveDateTime>`, ...) take exactly one
//!   column;
//! - records (`#[derive(Record)]`) take any columns, as long as every column
//!   maps to a field;
//! - `Box<T>` allocates a fresh `T` per row.
//!
//! The destination shape is checked against the column list before the first
//! row is read, and the cursor is closed exactly once on every path.

use crate::error::{OrmError, OrmResult};
use crate::reflect::{Column, Record, reflect_columns};
use crate::value::{FromValue, Value};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

/// A forward-only result cursor.
pub trait RowCursor {
    /// Result column names, in select order.
    fn columns(&self) -> &[String];

    /// The next row, or `None` once the result is exhausted.
    fn next_row(&mut self) -> OrmResult<Option<Vec<Value>>>;

    /// Release the cursor.
    fn close(&mut self) -> OrmResult<()>;
}

impl<C: RowCursor + ?Sized> RowCursor for &mut C {
    fn columns(&self) -> &[String] {
        (**self).columns()
    }

    fn next_row(&mut self) -> OrmResult<Option<Vec<Value>>> {
        (**self).next_row()
    }

    fn close(&mut self) -> OrmResult<()> {
        (**self).close()
    }
}

impl<C: RowCursor + ?Sized> RowCursor for Box<C> {
    fn columns(&self) -> &[String] {
        (**self).columns()
    }

    fn next_row(&mut self) -> OrmResult<Option<Vec<Value>>> {
        (**self).next_row()
    }

    fn close(&mut self) -> OrmResult<()> {
        (**self).close()
    }
}

/// An in-memory cursor over pre-built rows.
#[derive(Debug)]
pub struct VecCursor {
    columns: Vec<String>,
    rows: std::vec::IntoIter<Vec<Value>>,
    close_count: usize,
}

impl VecCursor {
    pub fn new<I, S>(columns: I, rows: Vec<Vec<Value>>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: rows.into_iter(),
            close_count: 0,
        }
    }

    /// How many times [`RowCursor::close`] was called.
    pub fn close_count(&self) -> usize {
        self.close_count
    }
}

impl RowCursor for VecCursor {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn next_row(&mut self) -> OrmResult<Option<Vec<Value>>> {
        if self.close_count > 0 {
            return Err(OrmError::Other("cursor is closed".to_string()));
        }
        Ok(self.rows.next())
    }

    fn close(&mut self) -> OrmResult<()> {
        self.close_count += 1;
        self.rows = Vec::new().into_iter();
        Ok(())
    }
}

/// Closes the cursor on drop unless it was closed explicitly.
struct CursorGuard<C: RowCursor> {
    cursor: C,
    closed: bool,
}

impl<C: RowCursor> CursorGuard<C> {
    fn new(cursor: C) -> Self {
        Self {
            cursor,
            closed: false,
        }
    }

    fn close(mut self) -> OrmResult<()> {
        self.closed = true;
        self.cursor.close()
    }
}

impl<C: RowCursor> Drop for CursorGuard<C> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(error) = self.cursor.close() {
            tracing::warn!(%error, "failed to close row cursor");
        }
    }
}

/// A destination rows can be scanned into.
pub trait Scan: Default {
    /// Per-result preparation derived from the column list.
    type Plan;

    /// Check the column list against this destination.
    fn plan(columns: &[String]) -> OrmResult<Self::Plan>;

    /// Write one row into `self`.
    fn scan_row(&mut self, plan: &Self::Plan, row: Vec<Value>) -> OrmResult<()>;
}

fn scalar_plan(columns: &[String]) -> OrmResult<String> {
    match columns {
        [only] => Ok(only.clone()),
        [] => Err(OrmError::mapping("result has no columns")),
        _ => Err(OrmError::mapping("multi columns not scan to a basic type")),
    }
}

fn scalar_value<T: FromValue>(column: &str, row: Vec<Value>) -> OrmResult<T> {
    let value = row
        .into_iter()
        .next()
        .ok_or_else(|| OrmError::decode(column, "row has no values"))?;
    T::from_value(value).map_err(|e| OrmError::decode(column, e.to_string()))
}

macro_rules! impl_scan_scalar {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Scan for $ty {
                type Plan = String;

                fn plan(columns: &[String]) -> OrmResult<String> {
                    scalar_plan(columns)
                }

                fn scan_row(&mut self, plan: &String, row: Vec<Value>) -> OrmResult<()> {
                    *self = scalar_value(plan, row)?;
                    Ok(())
                }
            }

            impl Scan for Option<$ty> {
                type Plan = String;

                fn plan(columns: &[String]) -> OrmResult<String> {
                    scalar_plan(columns)
                }

                fn scan_row(&mut self, plan: &String, row: Vec<Value>) -> OrmResult<()> {
                    *self = scalar_value(plan, row)?;
                    Ok(())
                }
            }
        )*
    };
}

impl_scan_scalar!(
    bool,
    i16,
    i32,
    i64,
    f32,
    f64,
    Decimal,
    String,
    Vec<u8>,
    NaiveDate,
    NaiveTime,
    NaiveDateTime,
    DateTime<Utc>,
    Uuid,
    serde_json::Value,
    Value,
    Vec<i32>,
    Vec<i64>,
    Vec<String>,
);

impl<T: Scan> Scan for Box<T> {
    type Plan = T::Plan;

    fn plan(columns: &[String]) -> OrmResult<Self::Plan> {
        T::plan(columns)
    }

    fn scan_row(&mut self, plan: &Self::Plan, row: Vec<Value>) -> OrmResult<()> {
        (**self).scan_row(plan, row)
    }
}

/// Column-to-field resolution for a record destination.
///
/// This is the [`Scan::Plan`] of every derived record.
pub struct RecordPlan<T: 'static> {
    targets: Vec<&'static Column<T>>,
}

impl<T: Record> RecordPlan<T> {
    /// Resolve every result column to a field of `T`.
    pub fn new(columns: &[String]) -> OrmResult<Self> {
        let table = reflect_columns::<T>()?;
        let targets = columns
            .iter()
            .map(|name| {
                table
                    .lookup(name)
                    .ok_or_else(|| OrmError::missing_field(name, std::any::type_name::<T>()))
            })
            .collect::<OrmResult<Vec<_>>>()?;
        Ok(Self { targets })
    }

    /// Write one row into `record`.
    pub fn apply(&self, record: &mut T, row: Vec<Value>) -> OrmResult<()> {
        if row.len() != self.targets.len() {
            return Err(OrmError::mapping(format!(
                "row has {} values for {} columns",
                row.len(),
                self.targets.len()
            )));
        }
        for (column, value) in self.targets.iter().zip(row) {
            column.set(record, value)?;
        }
        Ok(())
    }
}

/// How many rows a scan consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    /// Exactly the first row; no row is [`OrmError::NoRows`].
    Single,
    /// Every row; no row is an empty result.
    Collection,
}

/// Drive `cursor` in `mode`, handing each row to `emit`.
///
/// The destination plan is built before any row is read. The cursor is
/// closed once, whatever the outcome.
pub fn materialize<T, C, F>(cursor: C, mode: ScanMode, mut emit: F) -> OrmResult<()>
where
    T: Scan,
    C: RowCursor,
    F: FnMut(&T::Plan, Vec<Value>) -> OrmResult<()>,
{
    let mut guard = CursorGuard::new(cursor);
    let plan = T::plan(guard.cursor.columns())?;

    match mode {
        ScanMode::Single => {
            let row = guard.cursor.next_row()?.ok_or(OrmError::NoRows)?;
            emit(&plan, row)?;
        }
        ScanMode::Collection => {
            while let Some(row) = guard.cursor.next_row()? {
                emit(&plan, row)?;
            }
        }
    }

    guard.close()
}

/// Scan the first row onto an existing value.
pub fn scan_into<T: Scan, C: RowCursor>(cursor: C, dest: &mut T) -> OrmResult<()> {
    materialize::<T, _, _>(cursor, ScanMode::Single, |plan, row| dest.scan_row(plan, row))
}

/// Scan the first row into a new value.
pub fn scan_one<T: Scan, C: RowCursor>(cursor: C) -> OrmResult<T> {
    let mut dest = T::default();
    scan_into(cursor, &mut dest)?;
    Ok(dest)
}

/// Like [`scan_one`], with `None` in place of [`OrmError::NoRows`].
pub fn scan_opt<T: Scan, C: RowCursor>(cursor: C) -> OrmResult<Option<T>> {
    match scan_one(cursor) {
        Ok(value) => Ok(Some(value)),
        Err(OrmError::NoRows) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Append one element per row to `dest`.
///
/// On error `dest` is left as it was.
pub fn scan_all_into<T: Scan, C: RowCursor>(cursor: C, dest: &mut Vec<T>) -> OrmResult<()> {
    let len = dest.len();
    let result = materialize::<T, _, _>(cursor, ScanMode::Collection, |plan, row| {
        let mut item = T::default();
        item.scan_row(plan, row)?;
        dest.push(item);
        Ok(())
    });
    if result.is_err() {
        dest.truncate(len);
    }
    result
}

/// Collect one element per row.
pub fn scan_all<T: Scan, C: RowCursor>(cursor: C) -> OrmResult<Vec<T>> {
    let mut dest = Vec::new();
    scan_all_into(cursor, &mut dest)?;
    Ok(dest)
}
