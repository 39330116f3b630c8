//! Derive macros for dbx
//!
//! Provides `#[derive(Record)]`.

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

mod common;
mod record;

/// Derive `Record` (and `Scan`, and `Table` when a table is named) for a struct.
///
/// # Example
///
/// ```ignore
/// use dbx::Record;
///
/// #[derive(Default, Record)]
/// struct Audit {
///     #[dbx("column:created_at,insert:now()")]
///     created_at: Option<chrono::DateTime<chrono::Utc>>,
///     #[dbx("column:updated_at,insert:now(),update:now()")]
///     updated_at: Option<chrono::DateTime<chrono::Utc>>,
/// }
///
/// #[derive(Default, Record)]
/// #[dbx(table = "users")]
/// struct User {
///     #[dbx("column:id,primary_key,auto_increment")]
///     id: i64,
///     #[dbx("column:name")]
///     name: String,
///     #[dbx(embed)]
///     audit: Audit,
///     // not mapped
///     scratch: String,
/// }
/// ```
///
/// # Attributes
///
/// - `#[dbx(table = "name")]` on the struct - implement `Table`
/// - `#[dbx(strict)]` on the struct - reject two fields mapping the same column
/// - `#[dbx("tag")]` on a field - map it with a tag string
///   (`column:<name>`, `primary_key`, `auto_increment`, `insert:<sql>`, `update:<sql>`)
/// - `#[dbx(embed)]` on a field - flatten another `Record` into this one
///
/// The struct must implement `Default` and must not be generic.
#[proc_macro_derive(Record, attributes(dbx))]
pub fn derive_record(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    record::expand(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}
