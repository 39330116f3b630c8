//! Diagnostic rendering of SQL with its arguments inlined.
//!
//! The output is for logs only. It is never sent to the database.

use crate::value::Value;

/// Replace `?` and `$n` placeholders in `sql` with literal renderings of `args`.
///
/// Placeholders inside quoted text are left alone, as are placeholders with
/// no matching argument.
pub fn format_sql(sql: &str, args: &[Value]) -> String {
    let mut out = String::with_capacity(sql.len() + args.len() * 8);
    let mut chars = sql.chars().peekable();
    let mut quote: Option<char> = None;
    let mut next = 0;

    while let Some(c) = chars.next() {
        if let Some(q) = quote {
            out.push(c);
            if c == q {
                quote = None;
            }
            continue;
        }

        match c {
            '\'' | '"' => {
                quote = Some(c);
                out.push(c);
            }
            '?' => match args.get(next) {
                Some(value) => {
                    next += 1;
                    out.push_str(&literal(value));
                }
                None => out.push('?'),
            },
            '$' => {
                let mut digits = String::new();
                while let Some(d) = chars.peek().copied().filter(char::is_ascii_digit) {
                    digits.push(d);
                    chars.next();
                }
                let value = digits
                    .parse::<usize>()
                    .ok()
                    .and_then(|n| n.checked_sub(1))
                    .and_then(|i| args.get(i));
                match value {
                    Some(value) => out.push_str(&literal(value)),
                    None => {
                        out.push('$');
                        out.push_str(&digits);
                    }
                }
            }
            _ => out.push(c),
        }
    }

    out
}

/// Render one value as a SQL literal.
pub fn literal(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(v) => v.to_string(),
        Value::I16(v) => v.to_string(),
        Value::I32(v) => v.to_string(),
        Value::I64(v) => v.to_string(),
        Value::F32(v) => v.to_string(),
        Value::F64(v) => v.to_string(),
        Value::Decimal(v) => v.to_string(),
        Value::String(v) => quoted(v),
        Value::Bytes(v) if v.is_empty() => "null".to_string(),
        Value::Bytes(v) => {
            let mut hex = String::with_capacity(2 + v.len() * 2);
            hex.push_str("0x");
            for b in v {
                hex.push_str(&format!("{b:02x}"));
            }
            hex
        }
        Value::Date(v) => quoted(&v.format("%Y-%m-%d").to_string()),
        Value::Time(v) => quoted(&v.format("%H:%M:%S%.3f").to_string()),
        Value::Timestamp(v) => quoted(&v.format("%Y-%m-%d %H:%M:%S%.3f").to_string()),
        Value::TimestampTz(v) => quoted(&v.format("%Y-%m-%d %H:%M:%S%.3f%:z").to_string()),
        Value::Uuid(v) => quoted(&v.to_string()),
        Value::Json(v) => quoted(&v.to_string()),
        Value::List(items) => items.iter().map(literal).collect::<Vec<_>>().join(","),
        Value::Record(_) | Value::Map(_) => quoted(&format!("{value:?}")),
    }
}

fn quoted(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// Cut `sql` to at most `max_bytes` bytes on a char boundary.
pub(crate) fn truncate_sql_bytes(sql: &str, max_bytes: usize) -> &str {
    if sql.len() <= max_bytes {
        return sql;
    }
    let mut end = max_bytes;
    while end > 0 && !sql.is_char_boundary(end) {
        end -= 1;
    }
    &sql[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn inlines_question_marks_in_order() {
        let sql = format_sql(
            "select * from t where a = ? and b = ?",
            &[Value::I64(1), Value::from("x")],
        );
        assert_eq!(sql, "select * from t where a = 1 and b = 'x'");
    }

    #[test]
    fn inlines_numbered_placeholders() {
        let sql = format_sql("where b = $2 and a = $1", &[Value::I64(1), Value::I64(2)]);
        assert_eq!(sql, "where b = 2 and a = 1");
    }

    #[test]
    fn leaves_quoted_text_and_extra_placeholders() {
        let sql = format_sql("select '?', ?, ?, $9", &[Value::Null]);
        assert_eq!(sql, "select '?', null, ?, $9");
    }

    #[test]
    fn renders_literals() {
        assert_eq!(literal(&Value::from("it's")), "'it''s'");
        assert_eq!(literal(&Value::Bytes(vec![0xde, 0xad])), "0xdead");
        assert_eq!(literal(&Value::Bytes(vec![])), "null");
        let ts = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_milli_opt(3, 4, 5, 60)
            .unwrap();
        assert_eq!(literal(&Value::Timestamp(ts)), "'2024-01-02 03:04:05.060'");
        assert_eq!(literal(&Value::from(vec![1_i64, 2])), "1,2");
    }

    #[test]
    fn truncates_on_char_boundary() {
        assert_eq!(truncate_sql_bytes("SELECT 1", 100), "SELECT 1");
        assert_eq!(truncate_sql_bytes("SELECT 1", 3), "SEL");
        assert_eq!(truncate_sql_bytes("héllo", 2), "h");
    }
}
