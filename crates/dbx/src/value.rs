//! Dynamic values exchanged between records, arguments and result rows.
//!
//! [`Value`] is the single currency of the crate: named arguments are maps of
//! values, record fields are read and written as values, and the executor
//! decodes every result cell into one. [`Value::kind`] is the type classifier
//! used by the named compiler to decide how an argument is bound.

use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::error::Error;
use thiserror::Error;
use tokio_postgres::types::{FromSql, IsNull, Kind as PgKind, ToSql, Type};
use uuid::Uuid;

/// A dynamically typed SQL value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    /// An exact `numeric`.
    Decimal(Decimal),
    String(String),
    /// A byte blob. Always bound as one argument, never expanded.
    Bytes(Vec<u8>),
    Date(NaiveDate),
    Time(NaiveTime),
    Timestamp(NaiveDateTime),
    TimestampTz(DateTime<Utc>),
    Uuid(Uuid),
    Json(serde_json::Value),
    /// A homogeneous sequence; expanded to one placeholder per element.
    List(Vec<Value>),
    /// A struct-like composite of named fields.
    Record(Vec<(String, Value)>),
    /// A keyed collection.
    Map(BTreeMap<String, Value>),
}

/// Shape category of a [`Value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    /// Bound as a single argument.
    Basic,
    /// Expanded into one argument per element.
    Slice,
    /// A composite with named fields.
    Struct,
    /// Anything else.
    Other,
}

impl Value {
    /// Classify this value.
    pub fn kind(&self) -> Kind {
        match self {
            Value::List(_) => Kind::Slice,
            Value::Record(_) => Kind::Struct,
            Value::Map(_) => Kind::Other,
            _ => Kind::Basic,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Build a [`Value::List`] from anything that yields values.
    pub fn list<I, V>(items: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Value::List(items.into_iter().map(Into::into).collect())
    }

    /// Short name of the variant, used in conversion errors.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "NULL",
            Value::Bool(_) => "bool",
            Value::I16(_) => "i16",
            Value::I32(_) => "i32",
            Value::I64(_) => "i64",
            Value::F32(_) => "f32",
            Value::F64(_) => "f64",
            Value::Decimal(_) => "decimal",
            Value::String(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::Date(_) => "date",
            Value::Time(_) => "time",
            Value::Timestamp(_) => "timestamp",
            Value::TimestampTz(_) => "timestamptz",
            Value::Uuid(_) => "uuid",
            Value::Json(_) => "json",
            Value::List(_) => "list",
            Value::Record(_) => "record",
            Value::Map(_) => "map",
        }
    }
}

macro_rules! impl_from_scalar {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Value::$variant(value.into())
                }
            }
        )*
    };
}

impl_from_scalar!(
    bool => Bool,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    u16 => I32,
    u32 => I64,
    f32 => F32,
    f64 => F64,
    Decimal => Decimal,
    String => String,
    &str => String,
    &String => String,
    Vec<u8> => Bytes,
    &[u8] => Bytes,
    NaiveDate => Date,
    NaiveTime => Time,
    NaiveDateTime => Timestamp,
    DateTime<Utc> => TimestampTz,
    Uuid => Uuid,
    serde_json::Value => Json,
);

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

macro_rules! impl_from_list {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<Vec<$ty>> for Value {
                fn from(items: Vec<$ty>) -> Self {
                    Value::list(items)
                }
            }

            impl From<&[$ty]> for Value {
                fn from(items: &[$ty]) -> Self {
                    Value::list(items.iter().cloned())
                }
            }
        )*
    };
}

impl_from_list!(
    bool,
    i16,
    i32,
    i64,
    f32,
    f64,
    Decimal,
    String,
    &str,
    Vec<u8>,
    NaiveDate,
    NaiveDateTime,
    DateTime<Utc>,
    Uuid,
);

/// Failure to convert a [`Value`] into a concrete Rust type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConversionError {
    #[error("cannot convert {found} into {expected}")]
    Mismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("value {value} out of range for {expected}")]
    OutOfRange { expected: &'static str, value: i64 },
}

impl ConversionError {
    fn mismatch<T>(found: &Value) -> Self {
        Self::Mismatch {
            expected: std::any::type_name::<T>(),
            found: found.type_name(),
        }
    }
}

/// Extraction of a concrete Rust type from a [`Value`].
pub trait FromValue: Sized {
    fn from_value(value: Value) -> Result<Self, ConversionError>;
}

impl FromValue for Value {
    fn from_value(value: Value) -> Result<Self, ConversionError> {
        Ok(value)
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

macro_rules! impl_from_value_exact {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl FromValue for $ty {
                fn from_value(value: Value) -> Result<Self, ConversionError> {
                    match value {
                        Value::$variant(v) => Ok(v),
                        other => Err(ConversionError::mismatch::<$ty>(&other)),
                    }
                }
            }
        )*
    };
}

impl_from_value_exact!(
    bool => Bool,
    String => String,
    Vec<u8> => Bytes,
    NaiveDate => Date,
    NaiveTime => Time,
    NaiveDateTime => Timestamp,
    DateTime<Utc> => TimestampTz,
    Uuid => Uuid,
    serde_json::Value => Json,
);

macro_rules! impl_from_value_int {
    ($($ty:ty),* $(,)?) => {
        $(
            impl FromValue for $ty {
                fn from_value(value: Value) -> Result<Self, ConversionError> {
                    let wide = match value {
                        Value::I16(v) => i64::from(v),
                        Value::I32(v) => i64::from(v),
                        Value::I64(v) => v,
                        other => return Err(ConversionError::mismatch::<$ty>(&other)),
                    };
                    <$ty>::try_from(wide).map_err(|_| ConversionError::OutOfRange {
                        expected: stringify!($ty),
                        value: wide,
                    })
                }
            }
        )*
    };
}

impl_from_value_int!(i16, i32, i64);

impl FromValue for f32 {
    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::F32(v) => Ok(v),
            other => Err(ConversionError::mismatch::<f32>(&other)),
        }
    }
}

impl FromValue for f64 {
    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::F32(v) => Ok(f64::from(v)),
            Value::F64(v) => Ok(v),
            other => Err(ConversionError::mismatch::<f64>(&other)),
        }
    }
}

macro_rules! impl_from_value_list {
    ($($ty:ty),* $(,)?) => {
        $(
            impl FromValue for Vec<$ty> {
                fn from_value(value: Value) -> Result<Self, ConversionError> {
                    match value {
                        Value::List(items) => items.into_iter().map(<$ty>::from_value).collect(),
                        other => Err(ConversionError::mismatch::<Vec<$ty>>(&other)),
                    }
                }
            }
        )*
    };
}

impl FromValue for Decimal {
    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::Decimal(v) => Ok(v),
            Value::I16(v) => Ok(Decimal::from(v)),
            Value::I32(v) => Ok(Decimal::from(v)),
            Value::I64(v) => Ok(Decimal::from(v)),
            other => Err(ConversionError::mismatch::<Decimal>(&other)),
        }
    }
}

impl_from_value_list!(bool, i16, i32, i64, f64, Decimal, String, Uuid);

impl ToSql for Value {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        match self {
            Value::Null => Ok(IsNull::Yes),
            Value::Bool(v) => v.to_sql_checked(ty, out),
            Value::I16(v) => v.to_sql_checked(ty, out),
            Value::I32(v) => v.to_sql_checked(ty, out),
            Value::I64(v) => v.to_sql_checked(ty, out),
            Value::F32(v) => v.to_sql_checked(ty, out),
            Value::F64(v) => v.to_sql_checked(ty, out),
            Value::Decimal(v) => v.to_sql_checked(ty, out),
            Value::String(v) => v.to_sql_checked(ty, out),
            Value::Bytes(v) => v.to_sql_checked(ty, out),
            Value::Date(v) => v.to_sql_checked(ty, out),
            Value::Time(v) => v.to_sql_checked(ty, out),
            Value::Timestamp(v) => v.to_sql_checked(ty, out),
            Value::TimestampTz(v) => v.to_sql_checked(ty, out),
            Value::Uuid(v) => v.to_sql_checked(ty, out),
            Value::Json(v) => v.to_sql_checked(ty, out),
            Value::List(items) => items.to_sql_checked(ty, out),
            Value::Record(_) | Value::Map(_) => {
                Err(format!("{} values cannot be bound as a parameter", self.type_name()).into())
            }
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    tokio_postgres::types::to_sql_checked!();
}

impl<'a> FromSql<'a> for Value {
    fn from_sql(ty: &Type, raw: &'a [u8]) -> Result<Self, Box<dyn Error + Sync + Send>> {
        if let PgKind::Array(_) = ty.kind() {
            return Vec::<Value>::from_sql(ty, raw).map(Value::List);
        }

        match *ty {
            Type::BOOL => bool::from_sql(ty, raw).map(Value::Bool),
            Type::INT2 => i16::from_sql(ty, raw).map(Value::I16),
            Type::INT4 => i32::from_sql(ty, raw).map(Value::I32),
            Type::INT8 => i64::from_sql(ty, raw).map(Value::I64),
            Type::OID => u32::from_sql(ty, raw).map(|v| Value::I64(i64::from(v))),
            Type::FLOAT4 => f32::from_sql(ty, raw).map(Value::F32),
            Type::FLOAT8 => f64::from_sql(ty, raw).map(Value::F64),
            Type::NUMERIC => Decimal::from_sql(ty, raw).map(Value::Decimal),
            Type::BYTEA => Vec::<u8>::from_sql(ty, raw).map(Value::Bytes),
            Type::DATE => NaiveDate::from_sql(ty, raw).map(Value::Date),
            Type::TIME => NaiveTime::from_sql(ty, raw).map(Value::Time),
            Type::TIMESTAMP => NaiveDateTime::from_sql(ty, raw).map(Value::Timestamp),
            Type::TIMESTAMPTZ => DateTime::<Utc>::from_sql(ty, raw).map(Value::TimestampTz),
            Type::UUID => Uuid::from_sql(ty, raw).map(Value::Uuid),
            Type::JSON | Type::JSONB => serde_json::Value::from_sql(ty, raw).map(Value::Json),
            _ if <String as FromSql>::accepts(ty) => String::from_sql(ty, raw).map(Value::String),
            _ => Err(format!("unsupported column type: {ty} (cast it to a supported type)").into()),
        }
    }

    fn from_sql_null(_ty: &Type) -> Result<Self, Box<dyn Error + Sync + Send>> {
        Ok(Value::Null)
    }

    fn accepts(ty: &Type) -> bool {
        match ty.kind() {
            PgKind::Array(member) => <Value as FromSql>::accepts(member),
            _ => {
                matches!(
                    *ty,
                    Type::BOOL
                        | Type::INT2
                        | Type::INT4
                        | Type::INT8
                        | Type::OID
                        | Type::FLOAT4
                        | Type::FLOAT8
                        | Type::NUMERIC
                        | Type::BYTEA
                        | Type::DATE
                        | Type::TIME
                        | Type::TIMESTAMP
                        | Type::TIMESTAMPTZ
                        | Type::UUID
                        | Type::JSON
                        | Type::JSONB
                ) || <String as FromSql>::accepts(ty)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifier_separates_blobs_from_sequences() {
        assert_eq!(Value::from(vec![1_u8, 2, 3]).kind(), Kind::Basic);
        assert_eq!(Value::from(vec![1_i64, 2, 3]).kind(), Kind::Slice);
        assert_eq!(Value::from(vec![vec![1_u8], vec![2_u8]]).kind(), Kind::Slice);
        assert_eq!(Value::Record(vec![]).kind(), Kind::Struct);
        assert_eq!(Value::Map(BTreeMap::new()).kind(), Kind::Other);
        assert_eq!(Value::Null.kind(), Kind::Basic);
        assert_eq!(Value::from(Some("x")).kind(), Kind::Basic);
    }

    #[test]
    fn option_maps_none_to_null() {
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Value::from(Some(7_i64)), Value::I64(7));
    }

    #[test]
    fn integers_widen_and_narrow_with_range_check() {
        assert_eq!(i64::from_value(Value::I32(5)), Ok(5));
        assert_eq!(i32::from_value(Value::I64(5)), Ok(5));
        assert_eq!(
            i16::from_value(Value::I64(70_000)),
            Err(ConversionError::OutOfRange {
                expected: "i16",
                value: 70_000
            })
        );
    }

    #[test]
    fn null_only_lands_in_options() {
        assert_eq!(Option::<String>::from_value(Value::Null), Ok(None));
        assert!(String::from_value(Value::Null).is_err());
    }

    #[test]
    fn lists_convert_element_wise() {
        let value = Value::from(vec!["a", "b"]);
        assert_eq!(
            Vec::<String>::from_value(value),
            Ok(vec!["a".to_string(), "b".to_string()])
        );
    }

    #[test]
    fn decoder_accepts_common_types() {
        assert!(<Value as FromSql>::accepts(&Type::INT8));
        assert!(<Value as FromSql>::accepts(&Type::VARCHAR));
        assert!(<Value as FromSql>::accepts(&Type::INT4_ARRAY));
        assert!(<Value as FromSql>::accepts(&Type::JSONB));
        assert!(<Value as FromSql>::accepts(&Type::NUMERIC));
        assert!(<Value as FromSql>::accepts(&Type::NUMERIC_ARRAY));
        assert!(!<Value as FromSql>::accepts(&Type::INTERVAL));
    }

    #[test]
    fn numeric_columns_decode_exactly() {
        let amount = Decimal::new(15, 1);
        let mut buf = BytesMut::new();
        amount.to_sql(&Type::NUMERIC, &mut buf).unwrap();

        let value = <Value as FromSql>::from_sql(&Type::NUMERIC, &buf).unwrap();
        assert_eq!(value, Value::Decimal(amount));
        assert_eq!(Decimal::from_value(value), Ok(amount));
        assert_eq!(Decimal::from_value(Value::I32(3)), Ok(Decimal::from(3)));
        assert!(f64::from_value(Value::Decimal(amount)).is_err());
    }

    #[test]
    fn decimals_bind_as_numeric() {
        let mut buf = BytesMut::new();
        let is_null = Value::from(Decimal::new(-2505, 2))
            .to_sql(&Type::NUMERIC, &mut buf)
            .unwrap();
        assert!(matches!(is_null, IsNull::No));
        assert_eq!(
            Decimal::from_sql(&Type::NUMERIC, &buf).unwrap(),
            Decimal::new(-2505, 2)
        );
    }
}
