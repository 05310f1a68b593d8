//! Derive macros for the lhvm crate.
//!
//! Provides `#[derive(Error)]`, which implements `Display` and
//! `std::error::Error` from `#[error("...")]` messages.

mod error;

use proc_macro::TokenStream;

/// Implements `Display` and `Error` for an error enum or struct.
#[proc_macro_derive(Error, attributes(error))]
pub fn derive_error(input: TokenStream) -> TokenStream {
    error::derive_error(input)
}
