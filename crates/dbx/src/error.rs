//! Error types for dbx

use thiserror::Error;

/// Result type alias for dbx operations
pub type OrmResult<T> = Result<T, OrmError>;

/// Error types for mapping and database operations
#[derive(Debug, Error)]
pub enum OrmError {
    /// Query execution error
    #[error("Query error: {0}")]
    Query(#[from] tokio_postgres::Error),

    /// A single-row read found nothing.
    ///
    /// This is an absence signal, not a failure; see [`OrmError::is_no_rows`].
    #[error("no rows in result set")]
    NoRows,

    /// A `:name` token has no entry in the argument map
    #[error("`{0}` not found")]
    MissingArgument(String),

    /// A named argument has a shape that cannot be bound
    #[error("unsupported argument `{token}`: {reason}")]
    UnsupportedArgument { token: String, reason: String },

    /// A template whose quoted text or block comment never closes
    #[error("malformed template: {0}")]
    MalformedTemplate(String),

    /// A column name passed by the caller is not mapped by the record
    #[error("unknown column `{0}`")]
    UnknownColumn(String),

    /// A result column has no field to land in
    #[error("missing field `{column}` in {record}")]
    MissingField { column: String, record: String },

    /// Shape mismatch between a record, a statement and a destination
    #[error("Mapping error: {0}")]
    Mapping(String),

    /// Row decode error
    #[error("Decode error on column '{column}': {message}")]
    Decode { column: String, message: String },

    /// Unique constraint violation
    #[error("Unique constraint violation: {0}")]
    UniqueViolation(String),

    /// Foreign key constraint violation
    #[error("Foreign key violation: {0}")]
    ForeignKeyViolation(String),

    /// Check constraint violation
    #[error("Check constraint violation: {0}")]
    CheckViolation(String),

    /// Query timeout error
    #[error("Query timeout after {0:?}")]
    Timeout(std::time::Duration),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl OrmError {
    /// Create a decode error for a specific column
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Create a mapping error
    pub fn mapping(message: impl Into<String>) -> Self {
        Self::Mapping(message.into())
    }

    /// Create an unsupported-argument error for a `:name` token
    pub fn unsupported(token: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UnsupportedArgument {
            token: token.into(),
            reason: reason.into(),
        }
    }

    /// Create a missing-field error naming the destination record type
    pub fn missing_field(column: impl Into<String>, record: impl Into<String>) -> Self {
        Self::MissingField {
            column: column.into(),
            record: record.into(),
        }
    }

    /// Check if this is the "no rows" absence signal
    pub fn is_no_rows(&self) -> bool {
        matches!(self, Self::NoRows)
    }

    /// Check if this is a unique violation error
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, Self::UniqueViolation(_))
    }

    /// Check if this is a timeout error
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    /// Parse a tokio_postgres error into a more specific OrmError
    pub fn from_db_error(err: tokio_postgres::Error) -> Self {
        if let Some(db_err) = err.as_db_error() {
            let constraint = db_err.constraint().unwrap_or("unknown");
            let message = db_err.message();

            match db_err.code().code() {
                "23505" => return Self::UniqueViolation(format!("{constraint}: {message}")),
                "23503" => return Self::ForeignKeyViolation(format!("{constraint}: {message}")),
                "23514" => return Self::CheckViolation(format!("{constraint}: {message}")),
                _ => {}
            }
        }
        Self::Query(err)
    }
}
