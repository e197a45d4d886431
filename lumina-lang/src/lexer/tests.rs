use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::Arc;

use expect_test::{expect, Expect};

use crate::diagnostics::FatalError;
use crate::syntax::Token;

fn lex(source: &str) -> Result<Vec<Token>, FatalError> {
    super::tokenize_source(Arc::new(PathBuf::from("test.lum")), source)
}

fn check(source: &str, expect: Expect) {
    let tokens = lex(source).unwrap();
    let mut dump = String::new();
    for token in &tokens {
        writeln!(
            dump,
            "{:?} {:?} {}:{}..{}:{}",
            token.kind,
            token.text.as_str(),
            token.span.start.line,
            token.span.start.column,
            token.span.end.line,
            token.span.end.column,
        )
        .unwrap();
    }
    expect.assert_eq(&dump);
}

fn check_fatal(source: &str, expected_message: &str) {
    match lex(source) {
        Ok(tokens) => panic!("expected a fatal error, got {} tokens", tokens.len()),
        Err(err) => assert_eq!(err.to_string(), expected_message),
    }
}

#[test]
fn empty_input_is_a_single_eof() {
    check(
        "",
        expect![[r#"
            EOF "" 1:0..1:0
        "#]],
    );
}

#[test]
fn keywords_and_identifiers() {
    check(
        "struct Quat VertexPass position",
        expect![[r#"
            STRUCT_KW "struct" 1:0..1:6
            IDENT "Quat" 1:7..1:11
            VERTEX_PASS_KW "VertexPass" 1:12..1:22
            IDENT "position" 1:23..1:31
            EOF "" 1:31..1:31
        "#]],
    );
}

#[test]
fn booleans_are_keyword_tokens() {
    check(
        "true false trueish",
        expect![[r#"
            TRUE_KW "true" 1:0..1:4
            FALSE_KW "false" 1:5..1:10
            IDENT "trueish" 1:11..1:18
            EOF "" 1:18..1:18
        "#]],
    );
}

#[test]
fn numbers() {
    check(
        "0 42 4u 1.5 .5 2f 1e3 1.5e-3 0x1F 0xffu",
        expect![[r#"
            INT_NUMBER "0" 1:0..1:1
            INT_NUMBER "42" 1:2..1:4
            INT_NUMBER "4u" 1:5..1:7
            FLOAT_NUMBER "1.5" 1:8..1:11
            FLOAT_NUMBER ".5" 1:12..1:14
            FLOAT_NUMBER "2f" 1:15..1:17
            FLOAT_NUMBER "1e3" 1:18..1:21
            FLOAT_NUMBER "1.5e-3" 1:22..1:28
            INT_NUMBER "0x1F" 1:29..1:33
            INT_NUMBER "0xffu" 1:34..1:39
            EOF "" 1:39..1:39
        "#]],
    );
}

#[test]
fn number_then_member_access() {
    // `1.5f.abs()` style chains rely on the suffix ending the literal
    check(
        "1.5f.fract()",
        expect![[r#"
            FLOAT_NUMBER "1.5f" 1:0..1:4
            DOT "." 1:4..1:5
            IDENT "fract" 1:5..1:10
            L_PAREN "(" 1:10..1:11
            R_PAREN ")" 1:11..1:12
            EOF "" 1:12..1:12
        "#]],
    );
}

#[test]
fn operators_longest_match() {
    check(
        "<<= << <= < >>= >> >= > == = ++ += + -> -- -= - && &= & || |= | ^= ^ != ! :: : %= %",
        expect![[r#"
            SHL_EQ "<<=" 1:0..1:3
            SHL "<<" 1:4..1:6
            LTEQ "<=" 1:7..1:9
            L_ANGLE "<" 1:10..1:11
            SHR_EQ ">>=" 1:12..1:15
            SHR ">>" 1:16..1:18
            GTEQ ">=" 1:19..1:21
            R_ANGLE ">" 1:22..1:23
            EQ2 "==" 1:24..1:26
            EQ "=" 1:27..1:28
            PLUS2 "++" 1:29..1:31
            PLUS_EQ "+=" 1:32..1:34
            PLUS "+" 1:35..1:36
            THIN_ARROW "->" 1:37..1:39
            MINUS2 "--" 1:40..1:42
            MINUS_EQ "-=" 1:43..1:45
            MINUS "-" 1:46..1:47
            AMP2 "&&" 1:48..1:50
            AMP_EQ "&=" 1:51..1:53
            AMP "&" 1:54..1:55
            PIPE2 "||" 1:56..1:58
            PIPE_EQ "|=" 1:59..1:61
            PIPE "|" 1:62..1:63
            CARET_EQ "^=" 1:64..1:66
            CARET "^" 1:67..1:68
            NEQ "!=" 1:69..1:71
            BANG "!" 1:72..1:73
            COLON2 "::" 1:74..1:76
            COLON ":" 1:77..1:78
            PERCENT_EQ "%=" 1:79..1:81
            PERCENT "%" 1:82..1:83
            EOF "" 1:83..1:83
        "#]],
    );
}

#[test]
fn comments_are_skipped() {
    check(
        "a // line comment\nb /* block\ncomment */ c",
        expect![[r#"
            IDENT "a" 1:0..1:1
            IDENT "b" 2:0..2:1
            IDENT "c" 3:11..3:12
            EOF "" 3:12..3:12
        "#]],
    );
}

#[test]
fn header_literal_only_after_include() {
    check(
        "#include <math.lum>\na < b",
        expect![[r##"
            HASH "#" 1:0..1:1
            INCLUDE_KW "include" 1:1..1:8
            HEADER_NAME "<math.lum>" 1:9..1:19
            IDENT "a" 2:0..2:1
            L_ANGLE "<" 2:2..2:3
            IDENT "b" 2:4..2:5
            EOF "" 2:5..2:5
        "##]],
    );
}

#[test]
fn string_literal_with_escapes() {
    check(
        r#"#include "dir\\file.lum""#,
        expect![[r##"
            HASH "#" 1:0..1:1
            INCLUDE_KW "include" 1:1..1:8
            STRING "\"dir\\\\file.lum\"" 1:9..1:24
            EOF "" 1:24..1:24
        "##]],
    );
}

#[test]
fn crlf_is_normalized() {
    check(
        "a\r\nb",
        expect![[r#"
            IDENT "a" 1:0..1:1
            IDENT "b" 2:0..2:1
            EOF "" 2:1..2:1
        "#]],
    );
}

#[test]
fn unterminated_block_comment_is_fatal() {
    check_fatal(
        "a /* never closed",
        "test.lum:1:17: Unterminated block comment that started at line 1",
    );
}

#[test]
fn unterminated_string_is_fatal() {
    check_fatal(
        "\"oops\nnext line\"",
        "test.lum:2:0: Unterminated string literal",
    );
}

#[test]
fn malformed_exponent_is_fatal() {
    check_fatal("1e+", "test.lum:1:3: Malformed exponent in numeric literal");
}

#[test]
fn malformed_hex_is_fatal() {
    check_fatal("0xzz", "test.lum:1:2: Malformed hexadecimal literal");
}

#[test]
fn unexpected_character_is_fatal() {
    check_fatal("a @ b", "test.lum:1:2: Unexpected character '@'");
}

#[test]
fn spans_are_monotonic() {
    let tokens = lex("Input -> VertexPass : Vector3 position;\nTexture t;").unwrap();
    let mut previous = None;
    for token in &tokens {
        assert!(token.span.start <= token.span.end);
        if let Some(prev) = previous {
            assert!(token.span.start >= prev, "token positions went backwards");
        }
        if token.kind != crate::syntax::TokenKind::EOF {
            previous = Some(token.span.start);
        }
    }
}
