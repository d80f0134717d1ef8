//! Derive macro for error enums.
//!
//! Generates `std::fmt::Display` and `std::error::Error` implementations from
//! `#[error("...")]` attributes, plus a `kind()` accessor when variants are
//! tagged with `#[kind(...)]`.
//!
//! # Usage
//!
//! ```ignore
//! use stackvm_derive::Error;
//!
//! #[derive(Debug, Error)]
//! pub enum VMError {
//!     #[error("stack overflow: requested {requested} bytes, {available} available")]
//!     #[kind(Capacity)]
//!     StackOverflow { requested: usize, available: usize },
//!
//!     #[error("unknown scope {0}")]
//!     #[kind(OutOfRange)]
//!     UnknownScope(u32),
//! }
//! ```
//!
//! Only fields referenced by the message are bound, so a variant may carry
//! context that is not printed. Kinds resolve to
//! `crate::virtual_machine::errors::ErrorKind::<Kind>`.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{Data, DeriveInput, Fields, Ident, LitStr, Variant, parse_macro_input};

pub fn derive_error(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match expand_error_derive(&input) {
        Ok(tokens) => TokenStream::from(tokens),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand_error_derive(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let Data::Enum(data_enum) = &input.data else {
        return Err(syn::Error::new_spanned(
            &input.ident,
            "Error derive only supports enums",
        ));
    };

    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let mut display_arms = Vec::with_capacity(data_enum.variants.len());
    let mut kind_arms = Vec::with_capacity(data_enum.variants.len());
    for variant in &data_enum.variants {
        display_arms.push(display_arm(variant)?);
        if let Some(kind) = variant_kind(variant)? {
            let pattern = wildcard_pattern(variant);
            kind_arms.push(quote! {
                #pattern => crate::virtual_machine::errors::ErrorKind::#kind,
            });
        }
    }

    let kind_impl = if kind_arms.is_empty() {
        quote! {}
    } else if kind_arms.len() != data_enum.variants.len() {
        return Err(syn::Error::new_spanned(
            name,
            "either every variant or no variant must declare #[kind(...)]",
        ));
    } else {
        quote! {
            impl #impl_generics #name #ty_generics #where_clause {
                /// Returns the category this error belongs to.
                pub fn kind(&self) -> crate::virtual_machine::errors::ErrorKind {
                    match self {
                        #(#kind_arms)*
                    }
                }
            }
        }
    };

    Ok(quote! {
        impl #impl_generics ::std::fmt::Display for #name #ty_generics #where_clause {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                match self {
                    #(#display_arms)*
                }
            }
        }

        impl #impl_generics ::std::error::Error for #name #ty_generics #where_clause {}

        #kind_impl
    })
}

/// Builds the `Display` match arm for one variant.
fn display_arm(variant: &Variant) -> syn::Result<TokenStream2> {
    let variant_name = &variant.ident;
    let message = error_message(variant)?;
    let text = message.value();

    let arm = match &variant.fields {
        Fields::Unit => quote! {
            Self::#variant_name => write!(f, #message),
        },
        Fields::Named(fields) => {
            let used: Vec<&Ident> = fields
                .named
                .iter()
                .filter_map(|field| field.ident.as_ref())
                .filter(|ident| references(&text, &ident.to_string()))
                .collect();
            quote! {
                Self::#variant_name { #(#used,)* .. } => write!(f, #message, #(#used = #used),*),
            }
        }
        Fields::Unnamed(fields) => {
            let mut format_text = text.clone();
            let mut patterns = Vec::with_capacity(fields.unnamed.len());
            let mut used = Vec::new();
            for index in 0..fields.unnamed.len() {
                let position = index.to_string();
                if references(&text, &position) {
                    let ident = format_ident!("f{}", index);
                    format_text = format_text
                        .replace(&format!("{{{position}}}"), &format!("{{{ident}}}"))
                        .replace(&format!("{{{position}:"), &format!("{{{ident}:"));
                    patterns.push(quote! { #ident });
                    used.push(ident);
                } else {
                    patterns.push(quote! { _ });
                }
            }
            let format_lit = LitStr::new(&format_text, message.span());
            quote! {
                Self::#variant_name(#(#patterns),*) => write!(f, #format_lit, #(#used = #used),*),
            }
        }
    };

    Ok(arm)
}

/// Returns true if `text` interpolates the argument `name`.
fn references(text: &str, name: &str) -> bool {
    text.contains(&format!("{{{name}}}")) || text.contains(&format!("{{{name}:"))
}

fn wildcard_pattern(variant: &Variant) -> TokenStream2 {
    let variant_name = &variant.ident;
    match &variant.fields {
        Fields::Unit => quote! { Self::#variant_name },
        Fields::Named(_) => quote! { Self::#variant_name { .. } },
        Fields::Unnamed(_) => quote! { Self::#variant_name(..) },
    }
}

/// Extracts the message from a variant's `#[error("...")]` attribute.
fn error_message(variant: &Variant) -> syn::Result<LitStr> {
    let attr = variant
        .attrs
        .iter()
        .find(|attr| attr.path().is_ident("error"))
        .ok_or_else(|| {
            syn::Error::new_spanned(
                &variant.ident,
                format!(
                    "missing #[error(\"...\")] attribute on variant `{}`; every error variant must declare a display message",
                    variant.ident
                ),
            )
        })?;

    attr.parse_args::<LitStr>().map_err(|_| {
        syn::Error::new_spanned(
            &attr.meta,
            "invalid #[error] attribute; expected a string literal like #[error(\"unknown scope {0}\")]",
        )
    })
}

/// Extracts the kind from a variant's optional `#[kind(Kind)]` attribute.
fn variant_kind(variant: &Variant) -> syn::Result<Option<Ident>> {
    let Some(attr) = variant.attrs.iter().find(|attr| attr.path().is_ident("kind")) else {
        return Ok(None);
    };

    attr.parse_args::<Ident>().map(Some).map_err(|_| {
        syn::Error::new_spanned(
            &attr.meta,
            "invalid #[kind] attribute; expected an ErrorKind variant like #[kind(OutOfRange)]",
        )
    })
}
