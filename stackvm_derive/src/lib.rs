//! Derive macros for the stackvm crate.
//!
//! Provides:
//! - `#[derive(BinaryCodec)]` - fixed-layout binary serialization
//! - `#[derive(Error)]` - error type boilerplate (thiserror replacement) with error kinds

mod binary_codec;
mod error;

use proc_macro::TokenStream;

/// Implements `Encode` and `Decode` for structs and enums.
#[proc_macro_derive(BinaryCodec)]
pub fn derive_binary_codec(input: TokenStream) -> TokenStream {
    binary_codec::derive_binary_codec(input)
}

/// Implements `Display`, `Error`, and an optional `kind()` accessor for error enums.
#[proc_macro_derive(Error, attributes(error, kind))]
pub fn derive_error(input: TokenStream) -> TokenStream {
    error::derive_error(input)
}
