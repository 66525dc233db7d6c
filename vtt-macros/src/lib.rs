//! Proc macros for declaring macro-language built-ins.
//!
//! Provides `#[derive(Builtin)]`, which reads `#[builtin(...)]` attributes and
//! the doc comment of a unit struct and implements `vtt_core::registry::Describe`
//! for it.
//!
//! # Example
//!
//! ```ignore
//! /// Read a value out of a property list
//! #[derive(Builtin, Default)]
//! #[builtin(name = "getStrProp", min = 2, max = 4)]
//! struct GetStrProp;
//! ```

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{parse_macro_input, DeriveInput, Lit, LitInt, LitStr, Meta};

/// Derive macro for generating `Describe` implementations.
///
/// # Attributes
///
/// - `#[builtin(name = "...")]` - Invocable name (defaults to lowerCamelCase struct name)
/// - `#[builtin(alias = "...")]` - Additional invocable name, may repeat
/// - `#[builtin(min = N)]` / `#[builtin(max = N)]` - Arity bounds (default 0..0)
/// - `#[builtin(unlimited)]` - No upper arity bound
/// - `#[builtin(trusted)]` - Only callable from trusted macros
/// - `#[builtin(nondeterministic)]` - Results may differ between identical calls
#[proc_macro_derive(Builtin, attributes(builtin))]
pub fn derive_builtin(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand_builtin(input)
        .unwrap_or_else(|err| err.to_compile_error())
        .into()
}

/// Everything collected from the `#[builtin(...)]` attributes of one struct.
#[derive(Default)]
struct BuiltinArgs {
    names: Vec<String>,
    min: usize,
    max: Option<usize>,
    unlimited: bool,
    trusted: bool,
    nondeterministic: bool,
}

fn expand_builtin(input: DeriveInput) -> syn::Result<TokenStream2> {
    let struct_name = &input.ident;

    match &input.data {
        syn::Data::Struct(data) if matches!(data.fields, syn::Fields::Unit) => {}
        _ => {
            return Err(syn::Error::new_spanned(
                &input,
                "Builtin derive only supports unit structs",
            ))
        }
    }

    let mut args = parse_builtin_args(&input)?;
    if args.names.is_empty() {
        args.names.push(to_lower_camel_case(&struct_name.to_string()));
    }

    let min = args.min;
    let arity = if args.unlimited {
        if args.max.is_some() {
            return Err(syn::Error::new_spanned(
                &input,
                "`max` and `unlimited` are mutually exclusive",
            ));
        }
        quote! { ::vtt_core::registry::Arity::at_least(#min) }
    } else {
        let max = args.max.unwrap_or(min);
        if min > max {
            return Err(syn::Error::new_spanned(
                &input,
                format!("min ({min}) exceeds max ({max})"),
            ));
        }
        quote! { ::vtt_core::registry::Arity::between(#min, #max) }
    };

    let names = &args.names;
    let trusted = args.trusted;
    let deterministic = !args.nondeterministic;
    let description = get_doc_comment(&input.attrs);

    Ok(quote! {
        impl ::vtt_core::registry::Describe for #struct_name {
            fn descriptor() -> ::vtt_core::registry::FunctionDescriptor {
                ::vtt_core::registry::FunctionDescriptor::new(&[#(#names),*], #arity)
                    .trusted(#trusted)
                    .deterministic(#deterministic)
                    .with_description(#description)
            }
        }
    })
}

fn parse_builtin_args(input: &DeriveInput) -> syn::Result<BuiltinArgs> {
    let mut args = BuiltinArgs::default();

    for attr in &input.attrs {
        if !attr.path().is_ident("builtin") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("name") || meta.path.is_ident("alias") {
                let name: LitStr = meta.value()?.parse()?;
                args.names.push(name.value());
            } else if meta.path.is_ident("min") {
                let n: LitInt = meta.value()?.parse()?;
                args.min = n.base10_parse()?;
            } else if meta.path.is_ident("max") {
                let n: LitInt = meta.value()?.parse()?;
                args.max = Some(n.base10_parse()?);
            } else if meta.path.is_ident("unlimited") {
                args.unlimited = true;
            } else if meta.path.is_ident("trusted") {
                args.trusted = true;
            } else if meta.path.is_ident("nondeterministic") {
                args.nondeterministic = true;
            } else {
                return Err(meta.error("unsupported builtin attribute"));
            }
            Ok(())
        })?;
    }

    Ok(args)
}

fn get_doc_comment(attrs: &[syn::Attribute]) -> String {
    let mut docs = Vec::new();
    for attr in attrs {
        if attr.path().is_ident("doc") {
            if let Meta::NameValue(nv) = &attr.meta {
                if let syn::Expr::Lit(expr_lit) = &nv.value {
                    if let Lit::Str(s) = &expr_lit.lit {
                        docs.push(s.value().trim().to_string());
                    }
                }
            }
        }
    }
    docs.join(" ")
}

fn to_lower_camel_case(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_ascii_lowercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}
