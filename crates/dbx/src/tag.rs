//! Per-field column annotations.
//!
//! A field is annotated with a comma-separated tag string such as
//! `column:updated_at,update:current_timestamp,insert:current_timestamp`.
//! Each entry is either a bare flag or a `key:value` pair split on the first
//! `:`, so expressions may themselves contain colons (`insert:now()::date`).

use std::convert::Infallible;
use std::str::FromStr;

/// Parsed form of a field's tag string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnBinding {
    /// Column name. Empty means the field is not mapped.
    pub column: String,
    pub primary_key: bool,
    pub auto_increment: bool,
    /// Raw SQL used in place of a placeholder on insert.
    pub insert: Option<String>,
    /// Raw SQL used in place of a placeholder on update.
    pub update: Option<String>,
}

impl ColumnBinding {
    /// Parse a tag string. Unknown flags and keys are ignored.
    pub fn parse(raw: &str) -> Self {
        let mut binding = Self::default();

        for entry in raw.split(',') {
            match entry.split_once(':') {
                Some((key, value)) => {
                    let value = value.trim();
                    match key.trim() {
                        "column" => binding.column = value.to_string(),
                        "insert" => binding.insert = non_empty(value),
                        "update" => binding.update = non_empty(value),
                        _ => {}
                    }
                }
                None => match entry.trim() {
                    "primary_key" => binding.primary_key = true,
                    "auto_increment" => binding.auto_increment = true,
                    _ => {}
                },
            }
        }

        binding
    }

    /// Whether the field participates in any mapping.
    pub fn is_mapped(&self) -> bool {
        !self.column.is_empty()
    }
}

impl FromStr for ColumnBinding {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_flags_and_column() {
        let b = ColumnBinding::parse("column:id,primary_key,auto_increment");
        assert_eq!(b.column, "id");
        assert!(b.primary_key);
        assert!(b.auto_increment);
        assert_eq!(b.insert, None);
        assert_eq!(b.update, None);
    }

    #[test]
    fn parses_overrides() {
        let b = ColumnBinding::parse(
            "column:updated_at,update:current_timestamp,insert:current_timestamp",
        );
        assert_eq!(b.column, "updated_at");
        assert_eq!(b.update.as_deref(), Some("current_timestamp"));
        assert_eq!(b.insert.as_deref(), Some("current_timestamp"));
        assert!(!b.primary_key);
    }

    #[test]
    fn splits_on_first_colon_only() {
        let b = ColumnBinding::parse("column:day, insert:now()::date");
        assert_eq!(b.insert.as_deref(), Some("now()::date"));
    }

    #[test]
    fn trims_whitespace_everywhere() {
        let b = ColumnBinding::parse("  column : name ,  primary_key  ");
        assert_eq!(b.column, "name");
        assert!(b.primary_key);
    }

    #[test]
    fn ignores_unknown_entries() {
        let b = ColumnBinding::parse("column:x,nullable,size:255");
        assert_eq!(
            b,
            ColumnBinding {
                column: "x".into(),
                ..Default::default()
            }
        );
    }

    #[test]
    fn missing_column_is_unmapped() {
        let b = ColumnBinding::parse("primary_key");
        assert!(!b.is_mapped());
        assert!(!ColumnBinding::parse("").is_mapped());
    }

    #[test]
    fn from_str_never_fails() {
        let b: ColumnBinding = "column:email".parse().unwrap();
        assert_eq!(b.column, "email");
    }
}
