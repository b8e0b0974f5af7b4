use proc_macro::{Delimiter, TokenStream, TokenTree};

/// Splits a `TokenStream` into comma-separated arguments.
///
/// Each argument is returned as a `Vec<TokenTree>`.
/// Commas at the top level are used as separators.
pub(crate) fn split_args(input: TokenStream) -> Vec<Vec<TokenTree>> {
    let mut args = Vec::new();
    let mut current = Vec::new();

    for token in input {
        match &token {
            TokenTree::Punct(p) if p.as_char() == ',' => {
                if !current.is_empty() {
                    args.push(current);
                    current = Vec::new();
                }
            }
            _ => current.push(token),
        }
    }

    if !current.is_empty() {
        args.push(current);
    }

    args
}

/// Converts a slice of tokens into a Rust source string.
///
/// Consecutive identifiers are separated by a space to avoid accidental
/// token merging (e.g. `mut sim` vs `mutsim`).
pub(crate) fn tokens_to_string(tokens: &[TokenTree]) -> String {
    let mut out = String::new();
    let mut prev_was_ident = false;

    for t in tokens {
        let s = t.to_string();

        let needs_space = prev_was_ident && matches!(t, TokenTree::Ident(_));

        if needs_space {
            out.push(' ');
        }

        out.push_str(&s);
        prev_was_ident = matches!(t, TokenTree::Ident(_));
    }

    out
}

/// Options accepted by `#[strobe::test(...)]`.
#[derive(Default)]
pub(crate) struct TestOptions {
    pub(crate) max_time: Option<String>,
}

/// Parses `key = value` pairs from the attribute arguments.
pub(crate) fn parse_test_options(attr: TokenStream) -> Result<TestOptions, String> {
    let mut options = TestOptions::default();

    for arg in split_args(attr) {
        let text = tokens_to_string(&arg);
        let Some((key, value)) = text.split_once('=') else {
            return Err(format!("expected `key = value`, found `{text}`"));
        };

        match key.trim() {
            "max_time" => options.max_time = Some(value.trim().to_owned()),
            other => return Err(format!("unknown option `{other}`")),
        }
    }

    Ok(options)
}

/// The pieces of an `async fn` the test attribute rewrites.
pub(crate) struct TestFn {
    /// Attributes and visibility written before `fn`.
    pub(crate) prefix: String,
    pub(crate) name: String,
    /// Parameter list, without parentheses.
    pub(crate) params: String,
    /// Declared return type, if any.
    pub(crate) ret: Option<String>,
    /// Function body, without braces.
    pub(crate) body: String,
}

/// Splits an annotated function into prefix, name, parameters and body.
///
/// The `async` keyword is dropped.
pub(crate) fn parse_test_fn(item: TokenStream) -> Result<TestFn, String> {
    let tokens: Vec<TokenTree> = item.into_iter().collect();

    let fn_pos = tokens
        .iter()
        .position(|t| matches!(t, TokenTree::Ident(id) if id.to_string() == "fn"))
        .ok_or("expected a function")?;

    let name = match tokens.get(fn_pos + 1) {
        Some(TokenTree::Ident(id)) => id.to_string(),
        _ => return Err("expected a function name".into()),
    };

    let params = match tokens.get(fn_pos + 2) {
        Some(TokenTree::Group(g)) if g.delimiter() == Delimiter::Parenthesis => {
            g.stream().to_string()
        }
        _ => return Err("generic test functions are not supported".into()),
    };

    let body = match tokens.last() {
        Some(TokenTree::Group(g)) if g.delimiter() == Delimiter::Brace => g.stream().to_string(),
        _ => return Err("expected a function body".into()),
    };

    let ret = match &tokens[fn_pos + 3..tokens.len() - 1] {
        [] => None,
        [TokenTree::Punct(dash), TokenTree::Punct(arrow), ty @ ..]
            if dash.as_char() == '-' && arrow.as_char() == '>' && !ty.is_empty() =>
        {
            Some(tokens_to_string(ty))
        }
        _ => return Err("where clauses are not supported".into()),
    };

    let prefix: Vec<TokenTree> = tokens[..fn_pos]
        .iter()
        .filter(|t| !matches!(t, TokenTree::Ident(id) if id.to_string() == "async"))
        .cloned()
        .collect();

    Ok(TestFn {
        prefix: tokens_to_string(&prefix),
        name,
        params,
        ret,
        body,
    })
}
