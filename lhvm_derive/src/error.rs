//! `#[derive(Error)]` expansion.
//!
//! ```ignore
//! use lhvm_derive::Error;
//!
//! #[derive(Debug, Error)]
//! pub enum Fault {
//!     #[error("stack overflow at pc {pc}")]
//!     StackOverflow { pc: usize, capacity: usize },
//!
//!     #[error("bad opcode {0}")]
//!     BadOpcode(i64),
//!
//!     #[error("halted")]
//!     Halted,
//! }
//! ```
//!
//! Fields are interpolated by name (`{pc}`) or by position (`{0}`). Only the
//! fields a message mentions are bound, so a variant may carry extra context
//! that its message leaves out.

use proc_macro::TokenStream;
use proc_macro2::{Span, TokenStream as TokenStream2};
use quote::{ToTokens, format_ident, quote};
use syn::{Attribute, Data, DeriveInput, Fields, LitStr, parse_macro_input};

pub fn derive_error(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let body = match &input.data {
        Data::Enum(data) => {
            let arms = data
                .variants
                .iter()
                .map(|variant| {
                    let ident = &variant.ident;
                    let message = message_of(&variant.attrs, variant)?;
                    let (pattern, call) = render(&message, &variant.fields);
                    Ok(quote! { Self::#ident #pattern => #call, })
                })
                .collect::<syn::Result<Vec<_>>>()?;
            quote! {
                match self {
                    #(#arms)*
                }
            }
        }
        Data::Struct(data) => {
            let message = message_of(&input.attrs, &input.ident)?;
            let (pattern, call) = render(&message, &data.fields);
            quote! {
                let Self #pattern = self;
                #call
            }
        }
        Data::Union(_) => {
            return Err(syn::Error::new_spanned(
                input,
                "#[derive(Error)] is not supported on unions",
            ));
        }
    };

    Ok(quote! {
        impl #impl_generics ::std::fmt::Display for #name #ty_generics #where_clause {
            #[allow(unused_variables)]
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                #body
            }
        }

        impl #impl_generics ::std::error::Error for #name #ty_generics #where_clause {}
    })
}

/// Builds the destructuring pattern and the `write!` call for one message.
fn render(message: &LitStr, fields: &Fields) -> (TokenStream2, TokenStream2) {
    let text = message.value();
    match fields {
        Fields::Unit => (quote! {}, quote! { write!(f, #message) }),
        Fields::Named(named) => {
            let idents: Vec<_> = named.named.iter().filter_map(|f| f.ident.clone()).collect();
            let used: Vec<_> = idents
                .iter()
                .filter(|ident| mentions(&text, &ident.to_string()))
                .collect();
            (
                quote! { { #(#idents),* } },
                quote! { write!(f, #message, #(#used = #used),*) },
            )
        }
        Fields::Unnamed(unnamed) => {
            let binds: Vec<_> = (0..unnamed.unnamed.len())
                .map(|i| format_ident!("field{}", i))
                .collect();
            let mut rewritten = text.clone();
            let mut used = Vec::new();
            for (i, bind) in binds.iter().enumerate().rev() {
                let positional = i.to_string();
                if mentions(&rewritten, &positional) {
                    rewritten = rewritten
                        .replace(&format!("{{{positional}}}"), &format!("{{{bind}}}"))
                        .replace(&format!("{{{positional}:"), &format!("{{{bind}:"));
                    used.push(bind.clone());
                }
            }
            let rewritten = LitStr::new(&rewritten, message.span());
            (
                quote! { ( #(#binds),* ) },
                quote! { write!(f, #rewritten, #(#used = #used),*) },
            )
        }
    }
}

/// True when `text` interpolates `name` as `{name}` or `{name:fmt}`.
fn mentions(text: &str, name: &str) -> bool {
    text.contains(&format!("{{{name}}}")) || text.contains(&format!("{{{name}:"))
}

fn message_of<T: ToTokens>(attrs: &[Attribute], target: &T) -> syn::Result<LitStr> {
    let attr = attrs
        .iter()
        .find(|attr| attr.path().is_ident("error"))
        .ok_or_else(|| {
            syn::Error::new_spanned(target, "missing #[error(\"...\")] message")
        })?;

    attr.parse_args::<LitStr>().map_err(|_| {
        syn::Error::new(
            Span::call_site(),
            "expected a string literal, e.g. #[error(\"stack underflow at pc {pc}\")]",
        )
    })
}
