//! Named-parameter compilation.
//!
//! Rewrites `:name` tokens into positional placeholders and collects the
//! arguments in placeholder order:
//!
//! ```ignore
//! use dbx::{compile, named_args};
//!
//! let q = compile(
//!     "select * from users where id in (:ids) and status = :status",
//!     &named_args! { "ids" => vec![1_i64, 2, 3], "status" => "active" },
//! )?;
//! assert_eq!(q.sql, "select * from users where id in (?,?,?) and status = ?");
//! assert_eq!(q.args.len(), 4);
//! ```
//!
//! Tokens inside quoted literals, quoted identifiers and comments are left
//! alone, and so are `::` casts.

use crate::error::{OrmError, OrmResult};
use crate::value::{Kind, Value};
use std::collections::{BTreeMap, HashMap};
use std::ops::Range;

/// Positional placeholder style.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Placeholder {
    /// `?`
    #[default]
    Question,
    /// `$1`, `$2`, ... (Postgres)
    Dollar,
}

/// Emits consecutive placeholders of one style.
#[derive(Debug)]
pub(crate) struct Positional {
    style: Placeholder,
    count: usize,
}

impl Positional {
    pub(crate) fn new(style: Placeholder) -> Self {
        Self { style, count: 0 }
    }

    pub(crate) fn push(&mut self, sql: &mut String) {
        self.count += 1;
        match self.style {
            Placeholder::Question => sql.push('?'),
            Placeholder::Dollar => {
                sql.push('$');
                sql.push_str(&self.count.to_string());
            }
        }
    }
}

/// Arguments for a named template, keyed by token name (without the `:`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NamedArgs {
    values: BTreeMap<String, Value>,
}

impl NamedArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn set(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for NamedArgs {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut args = Self::new();
        for (name, value) in iter {
            args.insert(name, value);
        }
        args
    }
}

impl From<HashMap<String, Value>> for NamedArgs {
    fn from(values: HashMap<String, Value>) -> Self {
        values.into_iter().collect()
    }
}

impl From<BTreeMap<String, Value>> for NamedArgs {
    fn from(values: BTreeMap<String, Value>) -> Self {
        Self { values }
    }
}

/// Build [`NamedArgs`] from `name => value` pairs.
///
/// ```ignore
/// let args = dbx::named_args! { "id" => 7_i64, "tags" => vec!["a", "b"] };
/// ```
#[macro_export]
macro_rules! named_args {
    () => {
        $crate::NamedArgs::new()
    };
    ($($name:expr => $value:expr),+ $(,)?) => {{
        let mut args = $crate::NamedArgs::new();
        $(args.insert($name, $value);)+
        args
    }};
}

/// Positional SQL plus its arguments in placeholder order.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub sql: String,
    pub args: Vec<Value>,
}

/// Compile with `?` placeholders.
pub fn compile(template: &str, args: &NamedArgs) -> OrmResult<CompiledQuery> {
    compile_with(template, args, Placeholder::Question)
}

/// Compile with the given placeholder style.
pub fn compile_with(
    template: &str,
    args: &NamedArgs,
    placeholder: Placeholder,
) -> OrmResult<CompiledQuery> {
    let spans = scan_tokens(template)?;

    let mut names: Vec<&str> = spans.iter().map(|span| token_name(template, span)).collect();
    names.sort_unstable_by(|a, b| b.cmp(a));
    names.dedup();

    let mut bound: HashMap<&str, &[Value]> = HashMap::with_capacity(names.len());
    for name in names {
        let value = args
            .get(name)
            .ok_or_else(|| OrmError::MissingArgument(format!(":{name}")))?;
        bound.insert(name, bind(name, value)?);
    }

    let mut sql = String::with_capacity(template.len());
    let mut out = Vec::new();
    let mut positional = Positional::new(placeholder);
    let mut cursor = 0;

    for span in &spans {
        sql.push_str(&template[cursor..span.start]);
        let values = bound.get(token_name(template, span)).copied().unwrap_or_default();
        for (i, value) in values.iter().enumerate() {
            if i > 0 {
                sql.push(',');
            }
            positional.push(&mut sql);
            out.push(value.clone());
        }
        cursor = span.end;
    }
    sql.push_str(&template[cursor..]);

    Ok(CompiledQuery { sql, args: out })
}

fn token_name<'t>(template: &'t str, span: &Range<usize>) -> &'t str {
    &template[span.start + 1..span.end]
}

fn bind<'v>(name: &str, value: &'v Value) -> OrmResult<&'v [Value]> {
    match (value.kind(), value) {
        (Kind::Basic, _) => Ok(std::slice::from_ref(value)),
        (Kind::Slice, Value::List(items)) => {
            if items.iter().any(|item| item.kind() != Kind::Basic) {
                return Err(OrmError::unsupported(
                    format!(":{name}"),
                    "sequence elements must be scalar values",
                ));
            }
            if items.is_empty() {
                return Err(OrmError::unsupported(
                    format!(":{name}"),
                    "len must be greater than 0",
                ));
            }
            Ok(items)
        }
        (Kind::Struct, _) => Err(OrmError::unsupported(
            format!(":{name}"),
            "struct arguments are not supported",
        )),
        _ => Err(OrmError::unsupported(
            format!(":{name}"),
            format!("{} arguments are not supported", value.type_name()),
        )),
    }
}

fn is_word(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Byte spans of every `:name` token, left to right.
///
/// Each span starts at the `:` and covers the longest run of word characters
/// after it. Tokens inside quoted text (including `E'...'` strings with
/// backslash escapes) and comments are not tokens. Quoted text or a block
/// comment left open is an error.
fn scan_tokens(template: &str) -> OrmResult<Vec<Range<usize>>> {
    let bytes = template.as_bytes();
    let len = bytes.len();
    let mut spans = Vec::new();
    let mut i = 0;

    while i < len {
        match bytes[i] {
            quote @ (b'\'' | b'"') => {
                let start = i;
                let escapes = quote == b'\''
                    && i > 0
                    && matches!(bytes[i - 1], b'E' | b'e')
                    && (i < 2 || !is_word(bytes[i - 2]));
                i += 1;
                loop {
                    match bytes.get(i) {
                        None => return Err(unterminated("quoted text", start)),
                        Some(b'\\') if escapes => i += 2,
                        Some(&b) if b == quote => {
                            i += 1;
                            break;
                        }
                        Some(_) => i += 1,
                    }
                }
            }
            b'-' if bytes.get(i + 1) == Some(&b'-') => {
                while i < len && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                let start = i;
                i += 2;
                while !(bytes.get(i) == Some(&b'*') && bytes.get(i + 1) == Some(&b'/')) {
                    if i >= len {
                        return Err(unterminated("block comment", start));
                    }
                    i += 1;
                }
                i += 2;
            }
            b':' if bytes.get(i + 1) == Some(&b':') => {
                i += 2;
            }
            b':' => {
                let start = i;
                i += 1;
                while i < len && is_word(bytes[i]) {
                    i += 1;
                }
                if i > start + 1 {
                    spans.push(start..i);
                }
            }
            _ => i += 1,
        }
    }

    Ok(spans)
}

fn unterminated(what: &str, start: usize) -> OrmError {
    OrmError::MalformedTemplate(format!("unterminated {what} starting at byte {start}"))
}
