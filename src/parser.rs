//! S-expression parsing from text.
//!
//! A line of input holds zero or more top-level expressions. The surface
//! syntax knows four token shapes: `(`, `)`, `'` and atoms (maximal runs of
//! characters that are not whitespace, parentheses or apostrophes). Atoms are
//! classified as `Int`, `Float`, `Bool` (`#t`/`#f`) or `Symbol`, in that
//! order. A leading `'` quotes the following expression: a quoted list comes
//! back with its `literal` flag set on every pair (nested sub-lists
//! included), while a quoted bare atom becomes a `QuotedString`.

use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::take_while1,
    character::complete::{char, multispace0},
    error::ErrorKind,
    multi::many0,
};

use crate::ast::{Value, list_from};
use crate::{Error, MAX_PARSE_DEPTH, ParseError};

/// Characters that may appear in an atom. Everything that is not structure.
fn is_atom_char(c: char) -> bool {
    !c.is_whitespace() && c != '(' && c != ')' && c != '\''
}

/// Infer the data type of a raw token. Ints win over floats, then the two
/// boolean spellings, and anything left is a symbol.
fn atomize(token: &str) -> Value {
    if let Ok(n) = token.parse::<i64>() {
        return Value::Int(n);
    }

    if let Ok(f) = token.parse::<f64>() {
        return Value::Float(f);
    }

    match token {
        "#t" => Value::Bool(true),
        "#f" => Value::Bool(false),
        _ => Value::Symbol(token.to_owned()),
    }
}

/// Parse one atom token, honoring quoting context: the direct target of a
/// `'` becomes a `QuotedString` instead of being classified.
fn parse_atom(input: &str, quoted_target: bool) -> IResult<&str, Value> {
    let (input, token) = take_while1(is_atom_char).parse(input)?;
    if quoted_target {
        Ok((input, Value::QuotedString(token.to_owned())))
    } else {
        Ok((input, atomize(token)))
    }
}

/// Parse a parenthesized list. `literal` marks every pair in the resulting
/// chain (and is inherited by nested lists) when the list sits under a quote.
fn parse_list(input: &str, literal: bool, depth: usize) -> IResult<&str, Value> {
    let (input, _) = char('(').parse(input)?;
    let (input, elements) =
        many0(|i| parse_element(i, false, literal, depth + 1)).parse(input)?;
    let (input, _) = multispace0.parse(input)?;

    // A missing close paren must escape the enclosing `many0`, so it is
    // reported as a hard failure at the current position.
    let (input, _) = char(')').parse(input).map_err(|_: nom::Err<nom::error::Error<&str>>| {
        nom::Err::Failure(nom::error::Error::new(input, ErrorKind::Char))
    })?;

    Ok((input, list_from(elements, literal)))
}

/// Parse a quote prefix and its target.
fn parse_quote(
    input: &str,
    quoted_target: bool,
    in_quoted_list: bool,
    depth: usize,
) -> IResult<&str, Value> {
    let (rest, _) = char('\'').parse(input)?;

    if quoted_target {
        // ''x: quoting a quote is not a thing in this dialect.
        return Err(nom::Err::Failure(nom::error::Error::new(
            input,
            ErrorKind::Not,
        )));
    }

    match parse_element(rest, true, in_quoted_list, depth + 1) {
        Ok(ok) => Ok(ok),
        Err(nom::Err::Failure(e)) => Err(nom::Err::Failure(e)),
        Err(_) => Err(nom::Err::Failure(nom::error::Error::new(
            rest,
            ErrorKind::Eof,
        ))),
    }
}

/// Parse one expression. `quoted_target` is true when this expression is the
/// direct target of a `'`; `in_quoted_list` is true anywhere inside a quoted
/// list, where atoms stay ordinary symbols but structure is already literal.
fn parse_element(
    input: &str,
    quoted_target: bool,
    in_quoted_list: bool,
    depth: usize,
) -> IResult<&str, Value> {
    if depth >= MAX_PARSE_DEPTH {
        return Err(nom::Err::Failure(nom::error::Error::new(
            input,
            ErrorKind::TooLarge,
        )));
    }

    let (input, _) = multispace0.parse(input)?;
    alt((
        |i| parse_quote(i, quoted_target, in_quoted_list, depth),
        |i| parse_list(i, quoted_target || in_quoted_list, depth),
        |i| parse_atom(i, quoted_target),
    ))
    .parse(input)
}

/// Convert a nom failure into a positioned [`ParseError`].
fn to_parse_error(input: &str, err: nom::Err<nom::error::Error<&str>>) -> ParseError {
    match err {
        nom::Err::Error(e) | nom::Err::Failure(e) => {
            let pos = input.len() - e.input.len();
            let reason = match e.code {
                ErrorKind::TooLarge => {
                    format!("expression too deeply nested (max depth: {MAX_PARSE_DEPTH})")
                }
                ErrorKind::Not => "unexpected quote in quoted expression".to_owned(),
                ErrorKind::Eof => "expected something to quote".to_owned(),
                ErrorKind::Char if e.input.is_empty() => "expecting \")\"".to_owned(),
                ErrorKind::Char if e.input.starts_with(')') => "unexpected \")\"".to_owned(),
                _ => {
                    if e.input.is_empty() {
                        "unexpected end of input".to_owned()
                    } else {
                        let near: String = e.input.chars().take(10).collect();
                        format!("invalid syntax near '{near}'")
                    }
                }
            };
            ParseError::new(pos, reason)
        }
        nom::Err::Incomplete(_) => ParseError::new(input.len(), "incomplete input"),
    }
}

/// Parse a line of input into its top-level expressions.
///
/// A blank line parses to an empty vector; the REPL evaluates each returned
/// expression in order.
pub fn parse_line(input: &str) -> Result<Vec<Value>, Error> {
    let parsed = many0(|i| parse_element(i, false, false, 0))
        .parse(input)
        .and_then(|(rest, values)| {
            let (rest, _) = multispace0::<&str, nom::error::Error<&str>>.parse(rest)?;
            Ok((rest, values))
        });

    match parsed {
        Ok(("", values)) => Ok(values),
        Ok((rest, _)) => {
            let pos = input.len() - rest.len();
            let reason = if rest.starts_with(')') {
                "unexpected \")\"".to_owned()
            } else {
                let near: String = rest.chars().take(10).collect();
                format!("invalid syntax near '{near}'")
            };
            Err(Error::Parse(ParseError::new(pos, reason)))
        }
        Err(e) => Err(Error::Parse(to_parse_error(input, e))),
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use crate::ast::{nil, sym};

    /// Expected outcome of parsing one line.
    #[derive(Debug)]
    enum ParseTestResult {
        /// Parsing succeeds; the display forms of the results match.
        Printed(Vec<&'static str>),
        /// Parsing fails with an error whose message contains this text.
        ErrorContaining(&'static str),
    }
    use ParseTestResult::*;

    fn run_parse_tests(cases: Vec<(&str, ParseTestResult)>) {
        for (i, (input, expected)) in cases.iter().enumerate() {
            let test_id = format!("Parse test #{}", i + 1);
            let result = parse_line(input);

            match (result, expected) {
                (Ok(values), Printed(expected_forms)) => {
                    let printed: Vec<String> =
                        values.iter().map(|v| format!("{v}")).collect();
                    assert_eq!(printed, *expected_forms, "{test_id}: display mismatch");

                    // Printed forms re-parse to the same printed forms.
                    for form in &printed {
                        let reparsed = parse_line(form).unwrap_or_else(|e| {
                            panic!("{test_id}: round-trip parse failed for '{form}': {e}")
                        });
                        let redisplayed: Vec<String> =
                            reparsed.iter().map(|v| format!("{v}")).collect();
                        assert_eq!(
                            redisplayed,
                            vec![form.clone()],
                            "{test_id}: round-trip display mismatch"
                        );
                    }
                }
                (Err(err), ErrorContaining(text)) => {
                    let message = format!("{err}");
                    assert!(
                        message.contains(text),
                        "{test_id}: error '{message}' should contain '{text}'"
                    );
                }
                (Ok(values), ErrorContaining(text)) => {
                    panic!("{test_id}: expected error containing '{text}', got {values:?}");
                }
                (Err(err), Printed(_)) => {
                    panic!("{test_id}: expected success, got error: {err}");
                }
            }
        }
    }

    #[test]
    fn test_parser_comprehensive() {
        let cases = vec![
            // ===== ATOM CLASSIFICATION =====
            ("42", Printed(vec!["42"])),
            ("-5", Printed(vec!["-5"])),
            ("+7", Printed(vec!["7"])),
            ("9223372036854775807", Printed(vec!["9223372036854775807"])),
            ("3.14", Printed(vec!["3.14"])),
            ("-0.5", Printed(vec!["-0.5"])),
            ("1e3", Printed(vec!["1000.0"])),
            ("#t", Printed(vec!["#t"])),
            ("#f", Printed(vec!["#f"])),
            ("foo", Printed(vec!["foo"])),
            ("most-probably?", Printed(vec!["most-probably?"])),
            ("<==>", Printed(vec!["<==>"])),
            // Not a number, so it falls back to being a symbol.
            ("123abc", Printed(vec!["123abc"])),
            ("#true", Printed(vec!["#true"])),
            // ===== LISTS =====
            ("()", Printed(vec!["()"])),
            ("(   )", Printed(vec!["()"])),
            ("(+ 1 2)", Printed(vec!["(+ 1 2)"])),
            ("( 1   2\t\n3 )", Printed(vec!["(1 2 3)"])),
            ("((1 2) (3 4))", Printed(vec!["((1 2) (3 4))"])),
            ("(((1)))", Printed(vec!["(((1)))"])),
            // ===== QUOTING =====
            ("'(1 2 3)", Printed(vec!["(1 2 3)"])),
            ("'()", Printed(vec!["()"])),
            ("'hi", Printed(vec!["'hi"])),
            ("(this-guy (1 2 3))", Printed(vec!["(this-guy (1 2 3))"])),
            // A quote inside a quoted list quotes that element.
            ("'(a 'b)", Printed(vec!["(a 'b)"])),
            // ===== MULTIPLE TOP-LEVEL EXPRESSIONS =====
            ("1 2 3", Printed(vec!["1", "2", "3"])),
            ("(+ 1 2) (+ 3 4)", Printed(vec!["(+ 1 2)", "(+ 3 4)"])),
            ("", Printed(vec![])),
            ("   \t ", Printed(vec![])),
            // ===== ERRORS =====
            (")", ErrorContaining("unexpected \")\"")),
            ("1 2 3)", ErrorContaining("unexpected \")\"")),
            ("(1 2 3", ErrorContaining("expecting \")\"")),
            ("((1 2)", ErrorContaining("expecting \")\"")),
            ("'", ErrorContaining("expected something to quote")),
            ("''x", ErrorContaining("unexpected quote in quoted expression")),
            ("('" , ErrorContaining("expected something to quote")),
        ];

        run_parse_tests(cases);
    }

    #[test]
    fn test_quoted_list_is_literal_throughout() {
        let values = parse_line("'(1 (2 3) 4)").unwrap();
        assert_eq!(values.len(), 1);

        fn assert_literal(value: &Value) {
            let mut current = value;
            while let Value::Pair(p) = current {
                assert!(p.is_literal(), "pair in {value} should be literal");
                assert_literal(&p.head);
                current = &p.tail;
            }
        }
        assert_literal(&values[0]);
        assert!(values[0].is_self_evaluating());
    }

    #[test]
    fn test_unquoted_list_is_not_literal() {
        let values = parse_line("(+ 1 (list 2 3))").unwrap();
        match &values[0] {
            Value::Pair(p) => assert!(!p.is_literal()),
            other => panic!("expected a pair, got {other:?}"),
        }
    }

    #[test]
    fn test_quoted_atom_classification() {
        // The direct target of a quote is a QuotedString, but atoms inside a
        // quoted list keep their ordinary classification.
        let values = parse_line("'abc '(x 1)").unwrap();
        assert_eq!(values[0], Value::QuotedString("abc".to_owned()));
        match &values[1] {
            Value::Pair(p) => {
                assert_eq!(p.head, sym("x"));
                match &p.tail {
                    Value::Pair(q) => assert_eq!(q.head, Value::Int(1)),
                    other => panic!("expected a pair, got {other:?}"),
                }
            }
            other => panic!("expected a pair, got {other:?}"),
        }
    }

    #[test]
    fn test_quoted_number_becomes_quoted_string() {
        // Quoting a bare token always yields a QuotedString, even when the
        // token would otherwise be a number.
        let values = parse_line("'42").unwrap();
        assert_eq!(values[0], Value::QuotedString("42".to_owned()));
    }

    #[test]
    fn test_empty_list_parses_to_nil() {
        let values = parse_line("()").unwrap();
        assert_eq!(values[0], nil());
    }

    #[test]
    fn test_parse_error_reports_position() {
        let err = parse_line("(+ 1 2))").unwrap_err();
        match err {
            Error::Parse(e) => {
                assert_eq!(e.pos, 7);
                assert!(format!("{e}").starts_with("parse error: pos 7:"));
            }
            other => panic!("expected a parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_parser_depth_limit() {
        let deep_open = "(".repeat(MAX_PARSE_DEPTH + 1);
        let deep_close = ")".repeat(MAX_PARSE_DEPTH + 1);
        let too_deep = format!("{deep_open}1{deep_close}");
        let err = parse_line(&too_deep).unwrap_err();
        assert!(format!("{err}").contains("too deeply nested"));

        let fine_open = "(".repeat(MAX_PARSE_DEPTH - 2);
        let fine_close = ")".repeat(MAX_PARSE_DEPTH - 2);
        let fine = format!("{fine_open}1{fine_close}");
        assert!(parse_line(&fine).is_ok());
    }
}
