//! Per-type binding tables and struct reflection.
//!
//! Every mapped type owns one [`Columns`] table listing its tagged fields in
//! declaration order, each with a getter and a setter that move values in and
//! out of the field. Embedded records are flattened into the parent's table
//! when it is built, and a strict embedded record makes the parent strict.
//! The table is built once (usually by `#[derive(Record)]`
//! into a `OnceLock`) and is read-only afterwards.
//!
//! [`reflect`] turns a record into a [`Mapping`]: column name to
//! [`FieldBinding`], sorted by column name, with a snapshot of each field's
//! current value.

use crate::error::{OrmError, OrmResult};
use crate::tag::ColumnBinding;
use crate::value::{ConversionError, FromValue, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

type Getter<T> = Arc<dyn Fn(&T) -> Value + Send + Sync>;
type Setter<T> = Arc<dyn Fn(&mut T, Value) -> Result<(), ConversionError> + Send + Sync>;

/// A type with a column binding table.
///
/// Usually implemented with `#[derive(Record)]`.
pub trait Record: Sized + 'static {
    fn columns() -> &'static Columns<Self>;
}

/// A type that names the table it is persisted to.
pub trait Table {
    fn table_name() -> &'static str;
}

/// One mapped field of `T`.
pub struct Column<T> {
    binding: ColumnBinding,
    get: Getter<T>,
    set: Setter<T>,
}

impl<T> Column<T> {
    pub fn name(&self) -> &str {
        &self.binding.column
    }

    pub fn binding(&self) -> &ColumnBinding {
        &self.binding
    }

    /// Read the field's current value.
    pub fn get(&self, record: &T) -> Value {
        (self.get)(record)
    }

    /// Write `value` into the field.
    pub fn set(&self, record: &mut T, value: Value) -> OrmResult<()> {
        (self.set)(record, value).map_err(|e| OrmError::decode(self.name(), e.to_string()))
    }
}

impl<T> Clone for Column<T> {
    fn clone(&self) -> Self {
        Self {
            binding: self.binding.clone(),
            get: Arc::clone(&self.get),
            set: Arc::clone(&self.set),
        }
    }
}

impl<T> fmt::Debug for Column<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Column")
            .field("binding", &self.binding)
            .finish_non_exhaustive()
    }
}

/// The binding table of `T`.
pub struct Columns<T> {
    entries: Vec<Column<T>>,
    index: BTreeMap<String, usize>,
    collisions: Vec<String>,
    primary_keys: usize,
    strict: bool,
}

impl<T: 'static> Columns<T> {
    pub fn builder() -> ColumnsBuilder<T> {
        ColumnsBuilder {
            entries: Vec::new(),
            strict: false,
        }
    }

    /// Every mapped field in declaration order, shadowed ones included.
    pub fn entries(&self) -> &[Column<T>] {
        &self.entries
    }

    /// The field that owns `column`.
    pub fn lookup(&self, column: &str) -> Option<&Column<T>> {
        self.index.get(column).map(|&i| &self.entries[i])
    }

    /// Distinct columns, sorted by name.
    pub fn iter(&self) -> impl Iterator<Item = &Column<T>> {
        self.index.values().map(|&i| &self.entries[i])
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Number of distinct columns flagged `primary_key`.
    pub fn primary_key_count(&self) -> usize {
        self.primary_keys
    }

    /// Columns claimed by more than one field.
    pub fn collisions(&self) -> &[String] {
        &self.collisions
    }

    pub(crate) fn check(&self) -> OrmResult<()> {
        match self.collisions.first() {
            Some(column) if self.strict => Err(OrmError::mapping(format!(
                "column `{column}` is mapped by more than one field of {}",
                std::any::type_name::<T>()
            ))),
            _ => Ok(()),
        }
    }
}

impl<T> fmt::Debug for Columns<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Columns")
            .field("entries", &self.entries)
            .field("strict", &self.strict)
            .finish_non_exhaustive()
    }
}

/// Builder for [`Columns`].
pub struct ColumnsBuilder<T> {
    entries: Vec<Column<T>>,
    strict: bool,
}

impl<T: 'static> ColumnsBuilder<T> {
    /// Register a field with its tag string.
    ///
    /// A tag without a `column` leaves the field unmapped.
    pub fn field<V>(mut self, tag: &str, get: fn(&T) -> &V, set: fn(&mut T) -> &mut V) -> Self
    where
        V: Clone + Into<Value> + FromValue + 'static,
    {
        let binding = ColumnBinding::parse(tag);
        if !binding.is_mapped() {
            return self;
        }

        let getter: Getter<T> = Arc::new(move |record: &T| -> Value { get(record).clone().into() });
        let setter: Setter<T> =
            Arc::new(move |record: &mut T, value: Value| -> Result<(), ConversionError> {
                *set(record) = V::from_value(value)?;
                Ok(())
            });

        self.entries.push(Column {
            binding,
            get: getter,
            set: setter,
        });
        self
    }

    /// Flatten the columns of an embedded record into this table.
    ///
    /// A strict embedded record makes this table strict as well.
    pub fn embed<U: Record>(mut self, get: fn(&T) -> &U, set: fn(&mut T) -> &mut U) -> Self {
        let inner = U::columns();
        self.strict |= inner.strict;
        for column in inner.entries() {
            let inner_get = Arc::clone(&column.get);
            let inner_set = Arc::clone(&column.set);

            self.entries.push(Column {
                binding: column.binding.clone(),
                get: Arc::new(move |record: &T| -> Value { inner_get(get(record)) }),
                set: Arc::new(
                    move |record: &mut T, value: Value| -> Result<(), ConversionError> {
                        inner_set(set(record), value)
                    },
                ),
            });
        }
        self
    }

    /// Reject column collisions at reflection time instead of letting the
    /// later field win.
    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    pub fn build(self) -> Columns<T> {
        let mut index = BTreeMap::new();
        let mut collisions = Vec::new();

        for (i, column) in self.entries.iter().enumerate() {
            if index.insert(column.name().to_string(), i).is_some() {
                tracing::debug!(
                    record = std::any::type_name::<T>(),
                    column = column.name(),
                    "column mapped by more than one field, the later field wins"
                );
                collisions.push(column.name().to_string());
            }
        }

        let primary_keys = index
            .values()
            .filter(|&&i| self.entries[i].binding.primary_key)
            .count();

        Columns {
            entries: self.entries,
            index,
            collisions,
            primary_keys,
            strict: self.strict,
        }
    }
}

/// A mapped field of one record instance.
pub struct FieldBinding<T: 'static> {
    column: &'static Column<T>,
    value: Value,
}

impl<T: 'static> FieldBinding<T> {
    pub fn name(&self) -> &'static str {
        self.column.name()
    }

    pub fn binding(&self) -> &'static ColumnBinding {
        self.column.binding()
    }

    /// The field's value when the record was reflected.
    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn into_value(self) -> Value {
        self.value
    }

    /// Handle to the originating field, for writing back.
    pub fn column(&self) -> &'static Column<T> {
        self.column
    }
}

impl<T: 'static> fmt::Debug for FieldBinding<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldBinding")
            .field("binding", self.binding())
            .field("value", &self.value)
            .finish()
    }
}

/// Column name to [`FieldBinding`], sorted by column name.
pub struct Mapping<T: 'static> {
    fields: BTreeMap<&'static str, FieldBinding<T>>,
}

impl<T: 'static> Mapping<T> {
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get(&self, column: &str) -> Option<&FieldBinding<T>> {
        self.fields.get(column)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.fields.contains_key(column)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldBinding<T>> {
        self.fields.values()
    }

    pub fn primary_keys(&self) -> impl Iterator<Item = &FieldBinding<T>> {
        self.iter().filter(|f| f.binding().primary_key)
    }
}

impl<T: 'static> IntoIterator for Mapping<T> {
    type Item = FieldBinding<T>;
    type IntoIter = std::collections::btree_map::IntoValues<&'static str, FieldBinding<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_values()
    }
}

impl<T: 'static> fmt::Debug for Mapping<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.fields.iter()).finish()
    }
}

/// Snapshot every mapped field of `record`.
pub fn reflect<T: Record>(record: &T) -> OrmResult<Mapping<T>> {
    let columns = T::columns();
    columns.check()?;

    let fields = columns
        .iter()
        .map(|column| {
            let binding = FieldBinding {
                column,
                value: column.get(record),
            };
            (column.name(), binding)
        })
        .collect();

    Ok(Mapping { fields })
}

/// The binding table of `T` without value snapshots.
pub fn reflect_columns<T: Record>() -> OrmResult<&'static Columns<T>> {
    let columns = T::columns();
    columns.check()?;
    Ok(columns)
}
