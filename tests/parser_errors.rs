// Parser error path tests
// These systematically test unhappy paths through the text syntax

use hocon_core::error::{HoconError, ParserError};
use hocon_core::parse_string;

fn parser_error(source: &str) -> ParserError {
    match parse_string(source) {
        Err(HoconError::Parser(err)) => err,
        Err(other) => panic!("Expected a ParserError, got {other:?}"),
        Ok(config) => panic!("Expected a ParserError, parsed {config}"),
    }
}

#[test]
fn test_parser_error_missing_closing_brace() {
    let err = parser_error("a { key = 123");
    assert!(matches!(err, ParserError::UnexpectedEof { .. }), "Should fail with missing }}");
}

#[test]
fn test_parser_error_missing_closing_bracket() {
    let err = parser_error("arr = [1, 2, 3 }");
    assert!(matches!(err, ParserError::UnexpectedToken { .. }), "Should fail with missing ]");
}

#[test]
fn test_parser_error_missing_separator() {
    let err = parser_error("key 123");
    assert!(matches!(err, ParserError::UnexpectedToken { .. }));
}

#[test]
fn test_parser_error_unexpected_eof() {
    let err = parser_error("key = ");
    assert!(matches!(err, ParserError::UnexpectedEof { .. }));
}

#[test]
fn test_parser_error_members_on_one_line_need_commas() {
    let err = parser_error("a = 1 b = 2");
    assert!(matches!(err, ParserError::UnexpectedToken { .. }));
}

#[test]
fn test_parser_error_unclosed_string() {
    let err = parser_error("a = \"never closed");
    assert!(matches!(err, ParserError::UnexpectedToken { .. }));
}

#[test]
fn test_parser_error_stray_closing_brace() {
    let err = parser_error("a = 1\n}");
    assert!(matches!(err, ParserError::UnexpectedToken { .. }));
}

#[test]
fn test_parser_error_empty_key_segment() {
    let err = parser_error("a..b = 1");
    assert!(matches!(err, ParserError::InvalidPath { .. }));
    let err = parser_error(".a = 1");
    assert!(matches!(err, ParserError::InvalidPath { .. }));
}

#[test]
fn test_parser_error_bad_substitution_path() {
    let err = parser_error("a = ${}");
    assert!(matches!(err, ParserError::InvalidPath { .. }));
    let err = parser_error("a = ${b..c}");
    assert!(matches!(err, ParserError::InvalidPath { .. }));
}

#[test]
fn test_parser_error_object_concatenated_with_text() {
    let err = parser_error("a = [1] tail");
    assert!(matches!(err, ParserError::InvalidConcatenation { .. }));
}

#[test]
fn test_parser_error_unknown_character() {
    let err = parser_error("a = $oops");
    assert!(matches!(err, ParserError::UnexpectedToken { .. }));
}

#[test]
fn test_parser_error_spans_point_at_offending_token() {
    match parser_error("key = value\nother 12") {
        ParserError::UnexpectedToken { span, .. } => {
            assert_eq!(span.offset(), "key = value\nother ".len());
            assert_eq!(span.len(), 2);
        }
        other => panic!("Unexpected error {other:?}"),
    }
}

#[test]
fn test_parser_accepts_trailing_commas_and_comments() {
    let config = parse_string(
        "a = 1, // first\n# a full-line comment\nb = [1, 2,],\nc { d = 3, },\n",
    )
    .unwrap();
    assert_eq!(config.get_int32("a").unwrap(), 1);
    assert_eq!(config.get_int32_list("b").unwrap(), vec![1, 2]);
    assert_eq!(config.get_int32("c.d").unwrap(), 3);
}

#[test]
fn test_parser_string_forms() {
    let config = parse_string(
        "escaped = \"tab\\tquote\\\" unicode\\u00e9\"\nraw = \"\"\"C:\\path \"quoted\" \"\"\"\nurl = \"http://example.org\"",
    )
    .unwrap();
    assert_eq!(config.get_string("escaped").unwrap(), "tab\tquote\" unicode\u{e9}");
    assert_eq!(config.get_string("raw").unwrap(), "C:\\path \"quoted\" ");
    assert_eq!(config.get_string("url").unwrap(), "http://example.org");
}
