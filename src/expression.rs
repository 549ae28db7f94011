//! Right-hand sides of `define` statements and quoted string literals.

use crate::ast::{Arg, Call, Expr};
use winnow::ascii::{float, multispace0};
use winnow::combinator::{alt, cut_err, delimited, opt, terminated};
use winnow::error::{ContextError, ErrMode, StrContext, StrContextValue};
use winnow::prelude::*;
use winnow::token::{any, one_of, take_while};

/// Whether `text` starts like `Name(`, i.e. should be parsed as a call.
pub fn looks_like_call(text: &str) -> bool {
    let text = text.trim_start();
    let end = text
        .find(|c: char| !(c.is_alphanumeric() || c == '_' || c == '.'))
        .unwrap_or(text.len());
    end > 0 && text[end..].trim_start().starts_with('(')
}

/// Parses a whole call expression such as `Character("Eileen", color="#c8ffc8")`.
pub fn parse_call(text: &str) -> Result<Call, String> {
    call_expression
        .parse(text.trim())
        .map_err(|e| e.to_string())
}

/// Splits a leading quoted literal off `text`, returning its unescaped
/// content and the rest of the input.
pub fn split_quoted(text: &str) -> Option<(String, &str)> {
    string_literal
        .parse_peek(text)
        .ok()
        .map(|(rest, content)| (content, rest))
}

fn call_expression(input: &mut &str) -> ModalResult<Call> {
    let name = identifier.parse_next(input)?;
    symbol('(').parse_next(input)?;
    let args = cut_err(arguments).parse_next(input)?;
    Ok(Call {
        name: name.to_string(),
        args,
    })
}

/// Argument list after the opening parenthesis, up to and including `)`.
fn arguments(input: &mut &str) -> ModalResult<Vec<Arg>> {
    let mut args = Vec::new();
    loop {
        if opt(symbol(')')).parse_next(input)?.is_some() {
            return Ok(args);
        }
        args.push(argument.parse_next(input)?);

        let sep = alt((symbol(','), symbol(')')))
            .context(StrContext::Expected(StrContextValue::Description(
                "`,` or `)`",
            )))
            .parse_next(input)?;
        if sep == ')' {
            return Ok(args);
        }
    }
}

fn argument(input: &mut &str) -> ModalResult<Arg> {
    let name = opt(terminated(identifier, keyword_equals)).parse_next(input)?;
    let value = expr.parse_next(input)?;
    Ok(Arg {
        name: name.map(str::to_string),
        value,
    })
}

fn expr(input: &mut &str) -> ModalResult<Expr> {
    alt((string_literal.map(Expr::Str), call_or_name, number))
        .context(StrContext::Label("value"))
        .parse_next(input)
}

fn call_or_name(input: &mut &str) -> ModalResult<Expr> {
    let name = identifier.parse_next(input)?;
    if opt(symbol('(')).parse_next(input)?.is_some() {
        let args = cut_err(arguments).parse_next(input)?;
        return Ok(Expr::Call(Call {
            name: name.to_string(),
            args,
        }));
    }
    Ok(Expr::Name(name.to_string()))
}

fn number(input: &mut &str) -> ModalResult<Expr> {
    float.map(Expr::Number).parse_next(input)
}

fn identifier<'s>(input: &mut &'s str) -> ModalResult<&'s str> {
    (
        one_of(|c: char| c.is_alphabetic() || c == '_'),
        take_while(0.., |c: char| c.is_alphanumeric() || c == '_' || c == '.'),
    )
        .take()
        .parse_next(input)
}

/// `=` of a keyword argument, but not the start of `==`.
fn keyword_equals(input: &mut &str) -> ModalResult<()> {
    let _ = symbol('=').parse_next(input)?;
    if input.starts_with('=') {
        return Err(ErrMode::Backtrack(ContextError::new()));
    }
    Ok(())
}

fn symbol<'s>(c: char) -> impl Parser<&'s str, char, ErrMode<ContextError>> {
    delimited(multispace0, c, multispace0)
}

fn string_literal(input: &mut &str) -> ModalResult<String> {
    let quote = quote_char.parse_next(input)?;
    let mut out = String::new();
    loop {
        let c = cut_err(next_char)
            .context(StrContext::Expected(StrContextValue::Description(
                "closing quote",
            )))
            .parse_next(input)?;
        if c == quote {
            return Ok(out);
        }
        if c == '\\' {
            let escaped = cut_err(next_char).parse_next(input)?;
            out.push(match escaped {
                'n' => '\n',
                't' => '\t',
                other => other,
            });
            continue;
        }
        out.push(c);
    }
}

fn quote_char(input: &mut &str) -> ModalResult<char> {
    one_of(['"', '\'']).parse_next(input)
}

fn next_char(input: &mut &str) -> ModalResult<char> {
    any.parse_next(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_character_call() {
        let call = parse_call(r##"Character("Eileen", color="#c8ffc8")"##).unwrap();
        assert_eq!(call.name, "Character");
        assert_eq!(
            call.args,
            vec![
                Arg {
                    name: None,
                    value: Expr::Str("Eileen".into())
                },
                Arg {
                    name: Some("color".into()),
                    value: Expr::Str("#c8ffc8".into())
                },
            ]
        );
    }

    #[test]
    fn test_nested_and_numeric_arguments() {
        let call = parse_call("Fade(0.5, 1, color = 'black', at=Transform(zoom=2))").unwrap();
        assert_eq!(call.args.len(), 4);
        assert_eq!(call.args[0].value, Expr::Number(0.5));
        assert_eq!(call.args[1].value, Expr::Number(1.0));
        assert_eq!(call.args[2].name.as_deref(), Some("color"));
        match &call.args[3].value {
            Expr::Call(inner) => assert_eq!(inner.name, "Transform"),
            other => panic!("expected call, got {:?}", other),
        }
    }

    #[test]
    fn test_trailing_comma_and_empty_list() {
        assert_eq!(parse_call("Character('Liam',)").unwrap().args.len(), 1);
        assert!(parse_call("Character()").unwrap().args.is_empty());
    }

    #[test]
    fn test_malformed_calls_are_rejected() {
        assert!(parse_call(r#"Character("Eileen""#).is_err());
        assert!(parse_call(r#"Character("Eileen" color="red")"#).is_err());
        assert!(parse_call(r#"Character("Eileen) "#).is_err());
        assert!(parse_call(r#"Character("Eileen") extra"#).is_err());
    }

    #[test]
    fn test_looks_like_call() {
        assert!(looks_like_call("Character(\"E\")"));
        assert!(looks_like_call(" renpy.random.choice (x)"));
        assert!(!looks_like_call("\"plain\""));
        assert!(!looks_like_call("5"));
        assert!(!looks_like_call("(1, 2)"));
    }

    #[test]
    fn test_split_quoted() {
        let (text, rest) = split_quoted(r#""Say \"hi\"" at left"#).unwrap();
        assert_eq!(text, r#"Say "hi""#);
        assert_eq!(rest, " at left");

        let (text, rest) = split_quoted("'it''s'").unwrap();
        assert_eq!(text, "it");
        assert_eq!(rest, "'s'");

        assert!(split_quoted("\"open").is_none());
        assert!(split_quoted("bare").is_none());
    }
}
