//! Derive macro for fixed-layout binary serialization.
//!
//! Generates `Encode` and `Decode` implementations against
//! `crate::types::encoding`.
//!
//! # Binary Format
//!
//! - Structs: fields in declaration order, no padding
//! - Enums: one `u8` discriminant, then the variant's fields in order
//!
//! Explicit discriminants (`Variant = 5`) are honored, so an enum with
//! `#[repr(u8)]` encodes to exactly its numeric value.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{Data, DataEnum, DeriveInput, Fields, parse_macro_input};

pub fn derive_binary_codec(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let bodies = match &input.data {
        Data::Struct(data_struct) => Ok(struct_bodies(&data_struct.fields)),
        Data::Enum(data_enum) => enum_bodies(data_enum),
        Data::Union(_) => Err(syn::Error::new_spanned(
            &input.ident,
            "BinaryCodec derive does not support unions",
        )),
    };

    let (encode_body, decode_body) = match bodies {
        Ok(bodies) => bodies,
        Err(err) => return err.to_compile_error().into(),
    };

    TokenStream::from(quote! {
        impl #impl_generics crate::types::encoding::Encode for #name #ty_generics #where_clause {
            fn encode<S: crate::types::encoding::EncodeSink>(&self, out: &mut S) {
                #encode_body
            }
        }

        impl #impl_generics crate::types::encoding::Decode for #name #ty_generics #where_clause {
            fn decode(input: &mut &[u8]) -> ::std::result::Result<Self, crate::types::encoding::DecodeError> {
                #decode_body
            }
        }
    })
}

/// Encode/decode bodies for a struct of any shape.
fn struct_bodies(fields: &Fields) -> (TokenStream2, TokenStream2) {
    match fields {
        Fields::Named(named) => {
            let names: Vec<_> = named.named.iter().map(|f| &f.ident).collect();
            (
                quote! { #( crate::types::encoding::Encode::encode(&self.#names, out); )* },
                quote! {
                    Ok(Self { #( #names: crate::types::encoding::Decode::decode(input)?, )* })
                },
            )
        }
        Fields::Unnamed(unnamed) => {
            let indices: Vec<_> = (0..unnamed.unnamed.len()).map(syn::Index::from).collect();
            let decoders = indices
                .iter()
                .map(|_| quote! { crate::types::encoding::Decode::decode(input)? });
            (
                quote! { #( crate::types::encoding::Encode::encode(&self.#indices, out); )* },
                quote! { Ok(Self( #(#decoders),* )) },
            )
        }
        Fields::Unit => (quote! { let _ = out; }, quote! { let _ = input; Ok(Self) }),
    }
}

/// Encode/decode bodies for an enum: a `u8` discriminant followed by fields.
fn enum_bodies(data_enum: &DataEnum) -> syn::Result<(TokenStream2, TokenStream2)> {
    let discriminants = compute_discriminants(data_enum)?;

    let mut encode_arms = Vec::with_capacity(discriminants.len());
    let mut decode_arms = Vec::with_capacity(discriminants.len());
    for (variant, tag) in data_enum.variants.iter().zip(discriminants) {
        let variant_name = &variant.ident;
        match &variant.fields {
            Fields::Unit => {
                encode_arms.push(quote! {
                    Self::#variant_name => crate::types::encoding::Encode::encode(&#tag, out),
                });
                decode_arms.push(quote! { #tag => Ok(Self::#variant_name), });
            }
            Fields::Unnamed(unnamed) => {
                let bindings: Vec<_> = (0..unnamed.unnamed.len())
                    .map(|i| format_ident!("f{}", i))
                    .collect();
                let decoders = bindings
                    .iter()
                    .map(|_| quote! { crate::types::encoding::Decode::decode(input)? });
                encode_arms.push(quote! {
                    Self::#variant_name(#(#bindings),*) => {
                        crate::types::encoding::Encode::encode(&#tag, out);
                        #( crate::types::encoding::Encode::encode(#bindings, out); )*
                    }
                });
                decode_arms.push(quote! { #tag => Ok(Self::#variant_name(#(#decoders),*)), });
            }
            Fields::Named(named) => {
                let names: Vec<_> = named.named.iter().map(|f| &f.ident).collect();
                encode_arms.push(quote! {
                    Self::#variant_name { #(#names),* } => {
                        crate::types::encoding::Encode::encode(&#tag, out);
                        #( crate::types::encoding::Encode::encode(#names, out); )*
                    }
                });
                decode_arms.push(quote! {
                    #tag => Ok(Self::#variant_name {
                        #( #names: crate::types::encoding::Decode::decode(input)?, )*
                    }),
                });
            }
        }
    }

    Ok((
        quote! {
            match self {
                #(#encode_arms)*
            }
        },
        quote! {
            let tag: u8 = crate::types::encoding::Decode::decode(input)?;
            match tag {
                #(#decode_arms)*
                _ => Err(crate::types::encoding::DecodeError::InvalidValue),
            }
        },
    ))
}

/// Resolves each variant's `u8` discriminant, following Rust's rules:
/// explicit values are used as written, implicit ones count up from the
/// previous variant (starting at 0).
fn compute_discriminants(data_enum: &DataEnum) -> syn::Result<Vec<u8>> {
    let mut discriminants = Vec::with_capacity(data_enum.variants.len());
    let mut next: u16 = 0;

    for variant in &data_enum.variants {
        let value = match &variant.discriminant {
            Some((_, expr)) => parse_discriminant(expr)?,
            None => u8::try_from(next).map_err(|_| {
                syn::Error::new_spanned(&variant.ident, "discriminant does not fit in a u8")
            })?,
        };
        discriminants.push(value);
        next = u16::from(value) + 1;
    }

    Ok(discriminants)
}

fn parse_discriminant(expr: &syn::Expr) -> syn::Result<u8> {
    match expr {
        syn::Expr::Lit(syn::ExprLit {
            lit: syn::Lit::Int(lit),
            ..
        }) => lit.base10_parse::<u8>(),
        _ => Err(syn::Error::new_spanned(
            expr,
            "BinaryCodec discriminants must be integer literals",
        )),
    }
}
