//! Statement logging through `tracing`.
//!
//! [`SqlLogger`] is carried by [`DbConfig`](crate::DbConfig) and emits one
//! event per statement before it runs.

use crate::format::{format_sql, truncate_sql_bytes};
use crate::value::Value;
use tracing::Level;

/// A `tracing`-based statement logger used by [`Db`](crate::Db).
///
/// Emits one event per statement on target `dbx.sql`, before it runs.
#[derive(Debug, Clone)]
pub struct SqlLogger {
    /// Tracing event level to emit at.
    pub level: Level,
    /// Truncate long SQL strings (in bytes). `None` means no truncation.
    pub max_sql_length: Option<usize>,
    /// Render arguments into the logged SQL with [`format_sql`].
    pub inline_args: bool,
}

impl Default for SqlLogger {
    fn default() -> Self {
        Self {
            level: Level::DEBUG,
            max_sql_length: Some(200),
            inline_args: false,
        }
    }
}

impl SqlLogger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the tracing event level.
    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Set maximum SQL length to display.
    pub fn max_sql_length(mut self, len: usize) -> Self {
        self.max_sql_length = Some(len);
        self
    }

    /// Disable SQL truncation.
    pub fn no_truncate(mut self) -> Self {
        self.max_sql_length = None;
        self
    }

    /// Log SQL with its arguments inlined instead of placeholders.
    pub fn inline_args(mut self, enabled: bool) -> Self {
        self.inline_args = enabled;
        self
    }

    pub(crate) fn render(&self, sql: &str, args: &[Value]) -> String {
        let rendered = if self.inline_args {
            format_sql(sql, args)
        } else {
            sql.to_string()
        };
        match self.max_sql_length {
            Some(max) if rendered.len() > max => {
                format!("{}...", truncate_sql_bytes(&rendered, max))
            }
            _ => rendered,
        }
    }

    pub(crate) fn log(&self, sql: &str, args: &[Value]) {
        macro_rules! emit_at_level {
            ($level:expr, $($field:tt)*) => {
                match $level {
                    Level::ERROR => tracing::error!($($field)*),
                    Level::WARN => tracing::warn!($($field)*),
                    Level::INFO => tracing::info!($($field)*),
                    Level::DEBUG => tracing::debug!($($field)*),
                    Level::TRACE => tracing::trace!($($field)*),
                }
            };
        }

        let sql = self.render(sql, args);
        emit_at_level!(
            self.level,
            target: "dbx.sql",
            param_count = args.len(),
            sql = %sql,
        );
    }
}
