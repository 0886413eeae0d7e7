//! Module that implements [super::approx_eq_derive]

use crate::imports::*;

pub fn approx_eq_derive(input: TokenStream) -> TokenStream {
    let ast = syn::parse_macro_input!(input as DeriveInput);
    let name = &ast.ident;
    let (impl_generics, ty_generics, where_clause) = ast.generics.split_for_impl();

    let fields = match &ast.data {
        syn::Data::Struct(s) => &s.fields,
        _ => abort_call_site!("#[derive(ApproxEq)] only works on structs"),
    };

    // `self.a.approx_eq(&other.a, tol)` for named fields, `self.0...` for tuple fields
    let comparisons: Vec<TokenStream2> = match fields {
        syn::Fields::Named(named) => named
            .named
            .iter()
            .filter_map(|f| f.ident.as_ref())
            .map(|ident| quote! { self.#ident.approx_eq(&other.#ident, tol) })
            .collect(),
        syn::Fields::Unnamed(unnamed) => (0..unnamed.unnamed.len())
            .map(|i| {
                let idx = syn::Index::from(i);
                quote! { self.#idx.approx_eq(&other.#idx, tol) }
            })
            .collect(),
        syn::Fields::Unit => vec![],
    };

    let mut generated = TokenStream2::new();
    generated.append_all(quote! {
        impl #impl_generics ApproxEq for #name #ty_generics #where_clause {
            fn approx_eq(&self, other: &Self, tol: f64) -> bool {
                true #(&& #comparisons)*
            }
        }
    });
    generated.into()
}
