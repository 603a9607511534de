use proc_macro::TokenStream;
use quote::quote;
use syn::{ItemFn, LitInt, parse_macro_input};

/// A `#[test]` replacement that reports elapsed wall time and fails any
/// test that runs longer than its timeout (default: 1 second).
///
/// # Usage
/// ```ignore
/// use test_macros::timed_test;
///
/// #[timed_test]
/// fn fast_test() {
///     assert!(true);
/// }
///
/// #[timed_test(30)]
/// fn slow_test() {
///     // allowed up to 30 seconds
/// }
/// ```
#[proc_macro_attribute]
pub fn timed_test(attr: TokenStream, item: TokenStream) -> TokenStream {
    let timeout_secs = parse_timeout(attr);
    let test_fn = parse_macro_input!(item as ItemFn);

    let name = &test_fn.sig.ident;
    let body = &test_fn.block;
    let attrs = &test_fn.attrs;
    let vis = &test_fn.vis;

    quote! {
        #(#attrs)*
        #[test]
        #vis fn #name() {
            let __start = ::std::time::Instant::now();
            let __outcome = ::std::panic::catch_unwind(
                ::std::panic::AssertUnwindSafe(|| #body)
            );
            let __elapsed_ms = __start.elapsed().as_secs_f64() * 1_000.0;

            eprintln!("[timer] {}: {:.1}ms", stringify!(#name), __elapsed_ms);

            if let ::std::result::Result::Err(__panic) = __outcome {
                ::std::panic::resume_unwind(__panic);
            }

            let __limit_ms = (#timeout_secs as f64) * 1_000.0;
            assert!(
                __elapsed_ms < __limit_ms,
                "[timer] {} took {:.1}ms, over the {}s timeout",
                stringify!(#name),
                __elapsed_ms,
                #timeout_secs
            );
        }
    }
    .into()
}

fn parse_timeout(attr: TokenStream) -> u64 {
    if attr.is_empty() {
        return 1;
    }
    let lit: LitInt = syn::parse(attr).expect("timed_test takes an integer timeout in seconds");
    lit.base10_parse()
        .expect("timed_test timeout must fit in a u64")
}
