//! Derive macros for `solarsim-core`.

mod imports;
use crate::imports::*;
mod approx_eq_derive;

/// Derives `ApproxEq` by comparing every field of a struct with the same
/// tolerance. Works for named, tuple and unit structs.
/// The trait must be in scope where the derive is used.
#[proc_macro_error]
#[proc_macro_derive(ApproxEq)]
pub fn approx_eq_derive(input: TokenStream) -> TokenStream {
    approx_eq_derive::approx_eq_derive(input)
}
