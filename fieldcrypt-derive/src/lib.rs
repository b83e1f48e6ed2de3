//! Derive macros for `fieldcrypt`.
//!
//! This crate provides `#[derive(EncryptedFields)]`, which attaches the list
//! of encrypted fields to a document type.

#![warn(clippy::pedantic, clippy::nursery)]

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{parse_macro_input, Attribute, Data, DeriveInput, Fields, LitStr};

/// Derive macro declaring which fields of a document are encrypted.
///
/// # Example
///
/// ```rust,ignore
/// use fieldcrypt::EncryptedFields;
///
/// #[derive(Serialize, Deserialize, EncryptedFields)]
/// #[encrypted(path = "address.street.second", alias = "one")]
/// struct Person {
///     #[encrypted(alias = "one")]
///     password: String,
///     #[encrypted]
///     address: Address,
///     #[serde(rename = "fullName")]
///     #[encrypted]
///     full_name: String,
/// }
/// ```
///
/// Container attributes come first, then fields in declaration order. A
/// field renamed with `#[serde(rename = "...")]` is declared under its
/// serialized name.
#[proc_macro_derive(EncryptedFields, attributes(encrypted))]
pub fn derive_encrypted_fields(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand(&input).unwrap_or_else(syn::Error::into_compile_error).into()
}

struct Declared {
    path: Vec<String>,
    alias: Option<String>,
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let Data::Struct(data) = &input.data else {
        return Err(syn::Error::new_spanned(
            &input.ident,
            "EncryptedFields can only be derived for structs",
        ));
    };
    let Fields::Named(named) = &data.fields else {
        return Err(syn::Error::new_spanned(
            &input.ident,
            "EncryptedFields requires named fields",
        ));
    };

    let mut declared = Vec::new();
    for attr in input.attrs.iter().filter(|a| a.path().is_ident("encrypted")) {
        declared.push(container_attribute(attr)?);
    }

    for field in &named.named {
        let Some(attr) = field.attrs.iter().find(|a| a.path().is_ident("encrypted")) else {
            continue;
        };
        let Some(ident) = &field.ident else {
            continue;
        };
        let name = serde_rename(&field.attrs)?
            .unwrap_or_else(|| ident.to_string().trim_start_matches("r#").to_string());
        declared.push(Declared { path: vec![name], alias: field_alias(attr)? });
    }

    let descriptors = declared.iter().map(|d| {
        let path = &d.path;
        let field = quote! { ::fieldcrypt::document::EncryptedField::new([#(#path),*]) };
        match &d.alias {
            Some(alias) => quote! { #field.with_alias(#alias) },
            None => field,
        }
    });

    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
    Ok(quote! {
        impl #impl_generics ::fieldcrypt::document::EncryptedFields for #name #ty_generics #where_clause {
            fn encrypted_fields() -> ::std::vec::Vec<::fieldcrypt::document::EncryptedField> {
                ::std::vec![#(#descriptors),*]
            }
        }
    })
}

/// Parses `#[encrypted(path = "a.b", alias = "x")]`.
fn container_attribute(attr: &Attribute) -> syn::Result<Declared> {
    let mut path = None;
    let mut alias = None;
    attr.parse_nested_meta(|meta| {
        if meta.path.is_ident("path") {
            let value: LitStr = meta.value()?.parse()?;
            if value.value().is_empty() {
                return Err(meta.error("path must not be empty"));
            }
            path = Some(value.value().split('.').map(ToString::to_string).collect());
            Ok(())
        } else if meta.path.is_ident("alias") {
            let value: LitStr = meta.value()?.parse()?;
            alias = Some(value.value());
            Ok(())
        } else {
            Err(meta.error("expected `path` or `alias`"))
        }
    })?;

    let path = path.ok_or_else(|| syn::Error::new_spanned(attr, "container attribute requires `path`"))?;
    Ok(Declared { path, alias })
}

/// Parses `#[encrypted]` or `#[encrypted(alias = "x")]`.
fn field_alias(attr: &Attribute) -> syn::Result<Option<String>> {
    if matches!(attr.meta, syn::Meta::Path(_)) {
        return Ok(None);
    }
    let mut alias = None;
    attr.parse_nested_meta(|meta| {
        if meta.path.is_ident("alias") {
            let value: LitStr = meta.value()?.parse()?;
            alias = Some(value.value());
            Ok(())
        } else {
            Err(meta.error("expected `alias`"))
        }
    })?;
    Ok(alias)
}

fn serde_rename(attrs: &[Attribute]) -> syn::Result<Option<String>> {
    let mut rename = None;
    for attr in attrs.iter().filter(|a| a.path().is_ident("serde")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("rename") && meta.input.peek(syn::Token![=]) {
                let value: LitStr = meta.value()?.parse()?;
                rename = Some(value.value());
            } else if meta.input.peek(syn::Token![=]) {
                // Skip the value of any other serde option.
                let _: syn::Expr = meta.value()?.parse()?;
            } else if meta.input.peek(syn::token::Paren) {
                let content;
                syn::parenthesized!(content in meta.input);
                content.parse::<TokenStream2>()?;
            }
            Ok(())
        })?;
    }
    Ok(rename)
}
