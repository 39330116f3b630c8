//! Attribute parsing for the Record derive macro.
//!
//! Handles struct-level and field-level `#[dbx(...)]` attributes.

use syn::{DeriveInput, LitStr, Result};

/// Struct-level options.
#[derive(Default)]
pub(super) struct StructAttr {
    pub table: Option<LitStr>,
    pub strict: bool,
}

impl syn::parse::Parse for StructAttr {
    fn parse(input: syn::parse::ParseStream) -> Result<Self> {
        let mut attr = StructAttr::default();

        loop {
            if input.is_empty() {
                break;
            }

            let ident: syn::Ident = input.parse()?;
            if ident == "strict" {
                attr.strict = true;
            } else if ident == "table" {
                let _: syn::Token![=] = input.parse()?;
                attr.table = Some(input.parse()?);
            } else {
                return Err(syn::Error::new(
                    ident.span(),
                    "unknown dbx attribute, expected `table = \"...\"` or `strict`",
                ));
            }

            if input.peek(syn::Token![,]) {
                let _: syn::Token![,] = input.parse()?;
            } else {
                break;
            }
        }

        Ok(attr)
    }
}

/// How a field takes part in the mapping.
pub(super) enum FieldAttr {
    /// `#[dbx("column:...")]`
    Tag(LitStr),
    /// `#[dbx(embed)]`
    Embed,
}

impl syn::parse::Parse for FieldAttr {
    fn parse(input: syn::parse::ParseStream) -> Result<Self> {
        if input.peek(LitStr) {
            return Ok(FieldAttr::Tag(input.parse()?));
        }

        let ident: syn::Ident = input.parse()?;
        if ident == "embed" {
            Ok(FieldAttr::Embed)
        } else {
            Err(syn::Error::new(
                ident.span(),
                "expected a tag string or `embed`",
            ))
        }
    }
}

/// Merge every struct-level `#[dbx(...)]` attribute.
pub(super) fn struct_attr(input: &DeriveInput) -> Result<StructAttr> {
    let mut merged = StructAttr::default();
    for attr in &input.attrs {
        if attr.path().is_ident("dbx") {
            let parsed: StructAttr = attr.parse_args()?;
            if parsed.table.is_some() {
                merged.table = parsed.table;
            }
            merged.strict |= parsed.strict;
        }
    }
    Ok(merged)
}

/// The field's `#[dbx(...)]` attribute, if any. At most one is allowed.
pub(super) fn field_attr(field: &syn::Field) -> Result<Option<FieldAttr>> {
    let mut found = None;
    for attr in &field.attrs {
        if !attr.path().is_ident("dbx") {
            continue;
        }
        if found.is_some() {
            return Err(syn::Error::new_spanned(
                attr,
                "only one #[dbx(...)] attribute is allowed per field",
            ));
        }
        found = Some(attr.parse_args::<FieldAttr>()?);
    }
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use syn::parse_quote;

    #[test]
    fn parses_table_and_strict() {
        let input: DeriveInput = parse_quote! {
            #[dbx(table = "users", strict)]
            struct User { id: i64 }
        };
        let attr = struct_attr(&input).unwrap();
        assert_eq!(attr.table.unwrap().value(), "users");
        assert!(attr.strict);
    }

    #[test]
    fn struct_attrs_merge() {
        let input: DeriveInput = parse_quote! {
            #[dbx(table = "users")]
            #[dbx(strict)]
            struct User { id: i64 }
        };
        let attr = struct_attr(&input).unwrap();
        assert!(attr.table.is_some());
        assert!(attr.strict);
    }

    #[test]
    fn rejects_unknown_struct_option() {
        let input: DeriveInput = parse_quote! {
            #[dbx(schema = "public")]
            struct User { id: i64 }
        };
        assert!(struct_attr(&input).is_err());
    }

    fn first_field(input: DeriveInput) -> syn::Field {
        match input.data {
            syn::Data::Struct(data) => data.fields.into_iter().next().unwrap(),
            _ => panic!("expected a struct"),
        }
    }

    #[test]
    fn parses_field_tag_and_embed() {
        let field = first_field(parse_quote! {
            struct S { #[dbx("column:id,primary_key")] id: i64 }
        });
        match field_attr(&field).unwrap() {
            Some(FieldAttr::Tag(tag)) => assert_eq!(tag.value(), "column:id,primary_key"),
            _ => panic!("expected a tag"),
        }

        let field = first_field(parse_quote! {
            struct S { #[dbx(embed)] base: Base }
        });
        assert!(matches!(field_attr(&field).unwrap(), Some(FieldAttr::Embed)));

        let field = first_field(parse_quote! {
            struct S { scratch: String }
        });
        assert!(field_attr(&field).unwrap().is_none());
    }

    #[test]
    fn rejects_duplicate_field_attrs() {
        let field = first_field(parse_quote! {
            struct S {
                #[dbx("column:a")]
                #[dbx("column:b")]
                a: String,
            }
        });
        assert!(field_attr(&field).is_err());
    }

    #[test]
    fn rejects_unknown_field_option() {
        let field = first_field(parse_quote! {
            struct S { #[dbx(skip)] a: String }
        });
        assert!(field_attr(&field).is_err());
    }
}
