mod utils;

use proc_macro::TokenStream;

/// Turns an `async fn` into a `#[test]` that runs it as the test task of a
/// fresh in-process simulation.
///
/// The function may take the `Simulator` as its single parameter and must
/// evaluate to a `TaskResult`. The generated test panics unless the run
/// passes.
///
/// ```rust,ignore
/// #[strobe::test(max_time = 1_000)]
/// async fn waits(sim: Simulator) -> TaskResult {
///     Trigger::timer(10).await;
///     Ok(Value::None)
/// }
/// ```
#[proc_macro_attribute]
pub fn test(attr: TokenStream, item: TokenStream) -> TokenStream {
    let options = match utils::parse_test_options(attr) {
        Ok(options) => options,
        Err(msg) => return compile_error(&msg),
    };

    let test_fn = match utils::parse_test_fn(item) {
        Ok(test_fn) => test_fn,
        Err(msg) => return compile_error(&msg),
    };

    let mut builder = String::from("::strobe::sim::Simulator::builder()");

    if let Some(limit) = options.max_time {
        builder.push_str(&format!(".max_time({limit})"));
    }

    builder.push_str(".build()");

    let param = if test_fn.params.trim().is_empty() {
        String::from("_")
    } else {
        test_fn.params.clone()
    };

    // Keep the declared return type checked against the body.
    let body = match &test_fn.ret {
        Some(ret) => format!("let result: {ret} = {{ {} }}; result", test_fn.body),
        None => test_fn.body.clone(),
    };

    let output = format!(
        "#[test]
        {prefix} fn {name}() {{
            let simulator = {builder};
            simulator
                .run_test({name:?}, |{param}| async move {{ {body} }})
                .assert_passed();
        }}",
        prefix = test_fn.prefix,
        name = test_fn.name,
    );

    output
        .parse()
        .unwrap_or_else(|err| compile_error(&format!("strobe::test macro error: {err}")))
}

fn compile_error(msg: &str) -> TokenStream {
    format!("compile_error!({msg:?});")
        .parse()
        .unwrap_or_default()
}
