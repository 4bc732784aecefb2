//! haku script evaluation tests using rstest for parameterization.
//!
//! Each case runs a snippet in a fresh scope and compares the `repr` of
//! every produced value, or the kind of the error it ends with.

use std::collections::HashMap;

use futures::StreamExt;
use haku_kernel::{parse, run, ErrorKind, ScopeHandle};
use rstest::rstest;

/// Run `source` and render each result as its repr, or `!Kind` for errors.
async fn outcomes(source: &str) -> Vec<String> {
    let scope = ScopeHandle::default();
    run(&scope, source, HashMap::new())
        .unwrap_or_else(|err| panic!("compile error for {source:?}: {err}"))
        .map(|item| match item {
            Ok(value) => value.repr(),
            Err(err) => format!("!{}", err.kind),
        })
        .collect()
        .await
}

// =============================================================================
// EXPRESSIONS
// =============================================================================

#[rstest]
#[case("1 + 2 * 3", "7")]
#[case("(1 + 2) * 3", "9")]
#[case("7 // 2", "3")]
#[case("-7 // 2", "-4")]
#[case("7 / 2", "3.5")]
#[case("-7 % 3", "2")]
#[case("\"ab\" + \"cd\"", "\"abcd\"")]
#[case("\"ab\" * 2", "\"abab\"")]
#[case("[1] * 3", "[1, 1, 1]")]
#[case("[\"a\", [2]] * 2", "[\"a\", [2], \"a\", [2]]")]
#[case("[1, 2] * 0", "[]")]
#[case("3 in [1, 2, 3]", "true")]
#[case("4 not in [1]", "true")]
#[case("not true or false", "false")]
#[case("1 < 2 and 2 <= 2", "true")]
#[case("{\"b\": 2, \"a\": 1}", "{\"a\": 1, \"b\": 2}")]
#[case("[1, \"two\", none]", "[1, \"two\", none]")]
#[case("[10, 20, 30][-1]", "30")]
#[tokio::test]
async fn expressions(#[case] source: &str, #[case] expected: &str) {
    assert_eq!(outcomes(source).await, vec![expected.to_string()]);
}

// =============================================================================
// BUILTINS
// =============================================================================

#[rstest]
#[case("len([1, 2, 3])", "3")]
#[case("sorted([3, 1, 2])", "[1, 2, 3]")]
#[case("join(split(\"a b c\"), \"-\")", "\"a-b-c\"")]
#[case("keys({\"y\": 1, \"x\": 2})", "[\"x\", \"y\"]")]
#[case("sum(range(5))", "10")]
#[case("max(4, 9, 2)", "9")]
#[case("upper(\"haku\")", "\"HAKU\"")]
#[case("push([1], 2)", "[1, 2]")]
#[case("type(1.5)", "\"float\"")]
#[case("abs(-3)", "3")]
#[tokio::test]
async fn builtins(#[case] source: &str, #[case] expected: &str) {
    assert_eq!(outcomes(source).await, vec![expected.to_string()]);
}

// =============================================================================
// STATEMENTS
// =============================================================================

#[rstest]
#[case("x = 1\nx += 4\nx", &["5"])]
#[case("m = {\"k\": 5}\nm.k", &["5"])]
#[case("m = {}\nm[\"x\"] = 1\nm", &["{\"x\": 1}"])]
#[case("def f(a, b) { return a - b }\nf(10, 3)", &["7"])]
#[case("total = 0\nfor i in range(5) { total += i }\ntotal", &["10"])]
#[case("i = 0\nwhile true {\n  i += 1\n  if i == 3 { break }\n}\ni", &["3"])]
#[case("for i in range(4) {\n  if i % 2 == 0 { continue }\n  yield i\n}", &["1", "3"])]
#[case("if 0 { 1 } elif 2 { \"elif\" } else { 3 }", &[])]
#[case("x = 2\nif x > 1 { y = \"big\" } else { y = \"small\" }\ny", &["\"big\""])]
#[case("none", &[])]
#[case("yield 1\nyield none\n2", &["1", "2"])]
#[case("return 9\n10", &["9"])]
#[tokio::test]
async fn statements(#[case] source: &str, #[case] expected: &[&str]) {
    assert_eq!(outcomes(source).await, expected.to_vec());
}

// =============================================================================
// RUNTIME ERRORS
// =============================================================================

#[rstest]
#[case("undefined_name", ErrorKind::Name)]
#[case("1 / 0", ErrorKind::ZeroDivision)]
#[case("5 % 0", ErrorKind::ZeroDivision)]
#[case("1 + \"a\"", ErrorKind::Type)]
#[case("[1][5]", ErrorKind::Index)]
#[case("{\"a\": 1}[\"b\"]", ErrorKind::Key)]
#[case("int(\"nope\")", ErrorKind::Value)]
#[case("(1).real", ErrorKind::Attribute)]
#[case("raise \"custom\"", ErrorKind::Raised)]
#[case("def f() { return f() }\nf()", ErrorKind::Recursion)]
#[tokio::test]
async fn runtime_errors(#[case] source: &str, #[case] kind: ErrorKind) {
    assert_eq!(outcomes(source).await, vec![format!("!{kind}")]);
}

#[tokio::test]
async fn values_before_an_error_are_kept() {
    assert_eq!(
        outcomes("yield \"first\"\nmissing").await,
        vec!["\"first\"".to_string(), "!NameError".to_string()]
    );
}

// =============================================================================
// COMPILE ERRORS
// =============================================================================

#[rstest]
#[case("x = (1 +")]
#[case("def f() { yield 1 }")]
#[case("break")]
#[case("if true { continue }")]
#[case("def f(a, a) { pass }")]
#[case("x = 'open")]
#[case("1 + 1 = 2")]
#[case("x = 1 y = 2")]
#[case("@")]
fn compile_errors(#[case] source: &str) {
    let err = parse(source).expect_err("should not compile");
    assert!(err.line().is_some(), "no line for {source:?}");
}
