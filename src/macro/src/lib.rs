// Copyright 2024-present The Pregel Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use proc_macro::TokenStream;
use quote::quote;
use syn::parse::Parser;
use syn::punctuated::Punctuated;
use syn::spanned::Spanned;
use syn::{Expr, ItemFn, Lit, Meta, Token};

/// Run an async test on a fresh `pregel_runtime::ExecutorOwner`.
///
/// The number of executor threads defaults to 2 and can be changed with
/// `#[pregel_macro::test(threads = 4)]`.
#[proc_macro_attribute]
pub fn test(args: TokenStream, item: TokenStream) -> TokenStream {
    let mut input = syn::parse_macro_input!(item as ItemFn);
    if input.sig.asyncness.is_none() {
        return syn::Error::new(input.sig.span(), "async fn is required").to_compile_error().into();
    }

    let threads = match parse_threads(args) {
        Ok(threads) => threads,
        Err(err) => return err.to_compile_error().into(),
    };

    input.sig.asyncness = None;
    let body = input.block;
    input.block = syn::parse_quote! {
        {
            pregel_runtime::ExecutorOwner::new(#threads)
                .executor()
                .block_on(async move { #body });
        }
    };

    quote! {
        #[::core::prelude::v1::test]
        #input
    }
    .into()
}

fn parse_threads(args: TokenStream) -> syn::Result<usize> {
    let mut threads = 2usize;
    let metas = Punctuated::<Meta, Token![,]>::parse_terminated.parse(args)?;
    for meta in metas {
        let Meta::NameValue(nv) = &meta else {
            return Err(syn::Error::new(meta.span(), "expect `threads = <n>`"));
        };
        if !nv.path.is_ident("threads") {
            return Err(syn::Error::new(nv.path.span(), "unknown argument"));
        }
        match &nv.value {
            Expr::Lit(expr) => match &expr.lit {
                Lit::Int(lit) => threads = lit.base10_parse()?,
                lit => return Err(syn::Error::new(lit.span(), "expect an integer")),
            },
            expr => return Err(syn::Error::new(expr.span(), "expect an integer")),
        }
    }
    Ok(threads)
}
