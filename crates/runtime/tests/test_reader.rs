//! Reader tests: token shapes, sugar, error recovery, and the
//! print-then-reread round trip.

use sprig_runtime::{Interp, eql, print_to_string, read_form, release_ref};

fn read_one(src: &str) -> String {
    let mut interp = Interp::new();
    interp.set_input(Box::new(std::io::Cursor::new(src.as_bytes().to_vec())));
    let v = read_form(&mut interp).expect("expected a form");
    let text = print_to_string(&interp, v);
    release_ref(&mut interp, v);
    interp.shutdown();
    text
}

fn read_all(src: &str) -> Vec<String> {
    let mut interp = Interp::new();
    interp.set_input(Box::new(std::io::Cursor::new(src.as_bytes().to_vec())));
    let mut out = Vec::new();
    while let Some(v) = read_form(&mut interp) {
        out.push(print_to_string(&interp, v));
        release_ref(&mut interp, v);
    }
    interp.shutdown();
    out
}

/// Print the parsed value, reread the text, and require structural
/// equality with the original.
fn assert_rereads(src: &str) {
    let mut interp = Interp::new();
    interp.set_input(Box::new(std::io::Cursor::new(src.as_bytes().to_vec())));
    let v1 = read_form(&mut interp).expect("expected a form");
    let text = print_to_string(&interp, v1);
    interp.set_input(Box::new(std::io::Cursor::new(text.clone().into_bytes())));
    let v2 = read_form(&mut interp).expect("printed form must reread");
    assert!(
        eql(&interp, v1, v2),
        "round trip changed the value: {src:?} printed as {text:?}"
    );
    release_ref(&mut interp, v1);
    release_ref(&mut interp, v2);
    interp.shutdown();
}

#[test]
fn integers() {
    assert_eq!(read_one("42"), "42");
    assert_eq!(read_one("-17"), "-17");
    assert_eq!(read_one("+5"), "5");
}

#[test]
fn reals() {
    assert_eq!(read_one("3.5"), "3.5");
    assert_eq!(read_one(".5"), "0.5");
    assert_eq!(read_one("-2.5e3"), "-2500.0");
    assert_eq!(read_one("1e3"), "1000.0");
    assert_eq!(read_one("2E-1"), "0.2");
}

#[test]
fn integer_overflow_falls_back_to_real() {
    let mut interp = Interp::new();
    interp.set_input(Box::new(std::io::Cursor::new(
        b"123456789012345678901234567890".to_vec(),
    )));
    let v = read_form(&mut interp).expect("expected a form");
    assert!(matches!(v, sprig_runtime::Ref::Real(_)));
    release_ref(&mut interp, v);
    interp.shutdown();
}

#[test]
fn sign_and_dot_tokens_are_symbols() {
    assert_eq!(read_one("-"), "-");
    assert_eq!(read_one("+"), "+");
    // The dot is not in the bare-symbol alphabet, so it prints quoted.
    assert_eq!(read_one("."), "|.|");
    assert_eq!(read_one("-abc"), "-abc");
}

#[test]
fn trailing_garbage_after_a_number_is_an_error() {
    assert_eq!(read_one("1.2.3"), "nil");
    assert_eq!(read_one("1e"), "nil");
    // The bad token is consumed; reading continues at the next form.
    assert_eq!(read_all("1.2.3 42"), vec!["nil", "42"]);
}

#[test]
fn symbols() {
    assert_eq!(read_one("foo"), "foo");
    assert_eq!(read_one("set-car!"), "set-car!");
    assert_eq!(read_one("<=>"), "<=>");
}

#[test]
fn pipe_quoted_symbols() {
    assert_eq!(read_one("|a b|"), "|a b|");
    assert_eq!(read_one("|a\\nb|"), "|a\\nb|");
    assert_eq!(read_one("||"), "||");
    // A digit-led name needs the pipes to survive printing.
    assert_eq!(read_one("|1+|"), "|1+|");
}

#[test]
fn unterminated_pipe_symbol_is_an_error() {
    assert_eq!(read_one("|abc"), "nil");
}

#[test]
fn strings_with_escapes() {
    assert_eq!(read_one("\"hi\""), "\"hi\"");
    assert_eq!(read_one("\"a\\nb\""), "\"a\\nb\"");
    assert_eq!(read_one("\"q\\\"q\""), "\"q\\\"q\"");
    assert_eq!(read_one("\"tab\\there\""), "\"tab\\there\"");
    // Unknown escapes pass the character through.
    assert_eq!(read_one("\"\\x\""), "\"x\"");
}

#[test]
fn decimal_escapes_name_single_bytes() {
    // The printer writes non-graphic bytes as decimal \N; reading the
    // escape back yields the same byte again.
    assert_eq!(read_one("\"a\\1b\""), "\"a\\1b\"");
    assert_eq!(read_one("\"a\\127b\""), "\"a\\127b\"");
    // A graphic byte named by number prints as itself.
    assert_eq!(read_one("\"a\\65b\""), "\"aAb\"");
    // The run stops where another digit would overflow a byte.
    assert_eq!(read_one("\"\\2556\""), "\"\\2556\"");
    assert_eq!(read_one("|ctl\\1sym|"), "|ctl\\1sym|");
}

#[test]
fn unterminated_string_is_an_error() {
    assert_eq!(read_one("\"abc"), "nil");
}

#[test]
fn lists() {
    assert_eq!(read_one("(1 2 3)"), "(1 2 3)");
    assert_eq!(read_one("(a (b c) d)"), "(a (b c) d)");
    assert_eq!(read_one("()"), "nil");
    assert_eq!(read_one("( 1  2 )"), "(1 2)");
}

#[test]
fn dotted_pairs() {
    assert_eq!(read_one("(a . b)"), "(a . b)");
    assert_eq!(read_one("(1 2 . 3)"), "(1 2 . 3)");
    assert_eq!(read_one("(a . (b c))"), "(a b c)");
}

#[test]
fn quote_sugar() {
    assert_eq!(read_one("'x"), "(quote x)");
    assert_eq!(read_one("'(1 2)"), "(quote (1 2))");
    assert_eq!(read_one("`x"), "(quasiquote x)");
    assert_eq!(read_one("`(a ,b)"), "(quasiquote (a (unquote b)))");
}

#[test]
fn comments_are_whitespace() {
    assert_eq!(read_one("; leading\n42"), "42");
    assert_eq!(read_all("1 ; one\n2"), vec!["1", "2"]);
}

#[test]
fn stray_close_bracket_is_an_error() {
    assert_eq!(read_all(") 42"), vec!["nil", "42"]);
}

#[test]
fn unbalanced_open_bracket_is_an_error() {
    assert_eq!(read_one("(1 2"), "nil");
}

#[test]
fn end_of_input_is_clean() {
    let mut interp = Interp::new();
    interp.set_input(Box::new(std::io::Cursor::new(b"  ; just a comment\n".to_vec())));
    assert!(read_form(&mut interp).is_none());
    interp.shutdown();
}

#[test]
fn printed_forms_reread_to_equal_values() {
    for src in [
        "42",
        "-17",
        "3.5",
        "1e3",
        "foo",
        "|a b|",
        "|1+|",
        "\"plain\"",
        "\"esc \\\" \\\\ \\n \\t \\0 done\"",
        "\"ctl \\1 \\31 \\127 done\"",
        "|pipe \\1 sym|",
        "(1 2 3)",
        "(a . b)",
        "(a (b (c)) . d)",
        "'(quoted list)",
        "`(a ,b)",
    ] {
        assert_rereads(src);
    }
}
