extern crate proc_macro;

use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, ItemFn};

/// Marks a test that touches the global id store. The store maps external string ids to
/// internal integer slots, so tests that build networks or populations must not interleave.
/// The attribute wraps the function with `serial_test::serial` and resets the store before
/// the body runs. The optional argument names the crate the test is compiled against
/// (integration tests pass the crate name, unit tests can omit it).
#[proc_macro_attribute]
pub fn integration_test(attr: TokenStream, item: TokenStream) -> TokenStream {
    let test_fn = parse_macro_input!(item as ItemFn);
    let krate: syn::Path = if attr.is_empty() {
        syn::parse_quote!(crate)
    } else {
        parse_macro_input!(attr as syn::Path)
    };

    let name = &test_fn.sig.ident;
    let output = &test_fn.sig.output;
    let body = &test_fn.block;
    let attrs = &test_fn.attrs;

    let wrapped = quote! {
        #(#attrs)*
        #[test]
        #[serial_test::serial]
        fn #name() #output {
            #krate::simulation::id::init_store();
            #krate::simulation::id::reset_store();
            #body
        }
    };

    TokenStream::from(wrapped)
}
