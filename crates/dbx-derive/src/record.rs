//! Record derive macro implementation

mod attrs;

use crate::common::syn_types::option_inner;
use attrs::FieldAttr;
use proc_macro2::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Fields, Result};

pub fn expand(input: DeriveInput) -> Result<TokenStream> {
    let name = &input.ident;

    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "Record cannot be derived for generic structs",
        ));
    }

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    &input,
                    "Record can only be derived for structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                &input,
                "Record can only be derived for structs",
            ));
        }
    };

    let struct_attr = attrs::struct_attr(&input)?;

    let mut registrations = Vec::new();
    for field in fields {
        let Some(ident) = &field.ident else {
            continue;
        };
        let ty = &field.ty;

        match attrs::field_attr(field)? {
            Some(FieldAttr::Tag(tag)) => registrations.push(quote! {
                .field::<#ty>(#tag, |r: &#name| &r.#ident, |r: &mut #name| &mut r.#ident)
            }),
            Some(FieldAttr::Embed) => {
                if option_inner(ty).is_some() {
                    return Err(syn::Error::new_spanned(
                        ty,
                        "embedded records cannot be optional",
                    ));
                }
                registrations.push(quote! {
                    .embed::<#ty>(|r: &#name| &r.#ident, |r: &mut #name| &mut r.#ident)
                });
            }
            None => {}
        }
    }

    let strict = struct_attr.strict.then(|| quote! { .strict() });

    let table_impl = struct_attr.table.map(|table| {
        quote! {
            impl dbx::Table for #name {
                fn table_name() -> &'static str {
                    #table
                }
            }
        }
    });

    Ok(quote! {
        impl dbx::Record for #name {
            fn columns() -> &'static dbx::Columns<Self> {
                static COLUMNS: ::std::sync::OnceLock<dbx::Columns<#name>> =
                    ::std::sync::OnceLock::new();
                COLUMNS.get_or_init(|| {
                    dbx::Columns::<#name>::builder()
                        #(#registrations)*
                        #strict
                        .build()
                })
            }
        }

        impl dbx::Scan for #name {
            type Plan = dbx::RecordPlan<#name>;

            fn plan(columns: &[::std::string::String]) -> dbx::OrmResult<Self::Plan> {
                dbx::RecordPlan::new(columns)
            }

            fn scan_row(
                &mut self,
                plan: &Self::Plan,
                row: ::std::vec::Vec<dbx::Value>,
            ) -> dbx::OrmResult<()> {
                plan.apply(self, row)
            }
        }

        #table_impl
    })
}
