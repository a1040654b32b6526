//! Parser for condition expressions using chumsky.
//!
//! Grammar, loosest-binding first: `||`, `&&`, unary `!`, then atoms
//! (boolean literals, parenthesized expressions, `percent(seed) op N`
//! bucketing predicates, and `attribute op literal` comparisons).

use chumsky::input::{Stream, ValueInput};
use chumsky::prelude::*;

use super::ast::{CompareOp, Expr, Literal};
use super::lexer::{self, Token};
use super::ExpressionError;

/// Parses a condition expression into its AST.
pub fn parse(input: &str) -> Result<Expr, ExpressionError> {
    let tokens =
        lexer::lex(input).map_err(|span| ExpressionError::UnexpectedCharacter { span })?;
    let len = input.len();

    let token_iter = tokens.into_iter().map(|(token, span)| (token, span.into()));
    let token_stream = Stream::from_iter(token_iter)
        // Split (Token, SimpleSpan) into token and span parts
        .map((len..len).into(), |(t, s): (_, _)| (t, s));

    expression_parser()
        .parse(token_stream)
        .into_result()
        .map_err(|errors| {
            errors
                .into_iter()
                .next()
                .map(syntax_error)
                .unwrap_or_else(|| ExpressionError::Syntax {
                    span: 0..len,
                    message: "invalid expression".to_string(),
                })
        })
}

fn expression_parser<'a, I>() -> impl Parser<'a, I, Expr, extra::Err<Rich<'a, Token>>>
where
    I: ValueInput<'a, Token = Token, Span = SimpleSpan>,
{
    recursive(|expr| {
        let ident = select! {
            Token::Ident(name) => name,
        };
        let string_literal = select! {
            Token::String(value) => value,
        };
        let number = select! {
            Token::Number(value) => value,
        };

        let signed_number = just(Token::Minus)
            .or_not()
            .then(number)
            .map(|(negated, value)| if negated.is_some() { -value } else { value });

        let compare_op = choice((
            just(Token::EqEq).to(CompareOp::Equal),
            just(Token::NotEq).to(CompareOp::NotEqual),
            just(Token::LessOrEqual).to(CompareOp::LessOrEqual),
            just(Token::GreaterOrEqual).to(CompareOp::GreaterOrEqual),
            just(Token::Less).to(CompareOp::Less),
            just(Token::Greater).to(CompareOp::Greater),
        ));

        let literal = choice((
            string_literal.clone().map(Literal::String),
            signed_number.clone().map(Literal::Number),
            just(Token::True).to(Literal::Bool(true)),
            just(Token::False).to(Literal::Bool(false)),
        ));

        // Dotted attribute path: device.platform, app.version, country
        let attribute = ident
            .clone()
            .separated_by(just(Token::Dot))
            .at_least(1)
            .collect::<Vec<String>>()
            .map(|segments| segments.join("."));

        // percent(seed) op N; the seed is an identifier or a quoted string
        let percent = just(Token::Percent)
            .ignore_then(
                choice((ident, string_literal))
                    .delimited_by(just(Token::ParenOpen), just(Token::ParenClose)),
            )
            .then(compare_op.clone())
            .then(signed_number)
            .map(|((seed, op), threshold)| Expr::Percent {
                seed,
                op,
                threshold,
            });

        let comparison = attribute.then(compare_op).then(literal).map(
            |((attribute, op), value)| Expr::Compare {
                attribute,
                op,
                value,
            },
        );

        let atom = choice((
            just(Token::True).to(Expr::Literal(true)),
            just(Token::False).to(Expr::Literal(false)),
            percent,
            comparison,
            expr.clone()
                .delimited_by(just(Token::ParenOpen), just(Token::ParenClose)),
        ));

        let unary = recursive(|unary| {
            choice((
                just(Token::Not)
                    .ignore_then(unary)
                    .map(|inner| Expr::Not(Box::new(inner))),
                atom,
            ))
        });

        let conjunction = unary
            .clone()
            .then(
                just(Token::And)
                    .ignore_then(unary)
                    .repeated()
                    .collect::<Vec<_>>(),
            )
            .map(|(first, rest)| {
                rest.into_iter()
                    .fold(first, |lhs, rhs| Expr::And(Box::new(lhs), Box::new(rhs)))
            });

        conjunction
            .clone()
            .then(
                just(Token::Or)
                    .ignore_then(conjunction)
                    .repeated()
                    .collect::<Vec<_>>(),
            )
            .map(|(first, rest)| {
                rest.into_iter()
                    .fold(first, |lhs, rhs| Expr::Or(Box::new(lhs), Box::new(rhs)))
            })
    })
    .then_ignore(end())
}

/// Converts a chumsky diagnostic into the engine's expression error.
fn syntax_error(err: Rich<'_, Token>) -> ExpressionError {
    use chumsky::error::RichReason;

    let message = match err.reason() {
        RichReason::ExpectedFound { found, .. } => {
            let found_str = match found {
                Some(token) => format_token(token),
                None => "end of input".to_string(),
            };
            let expected: Vec<String> = err
                .expected()
                .filter_map(|pattern| match pattern {
                    chumsky::error::RichPattern::Token(token) => Some(format_token(token)),
                    chumsky::error::RichPattern::Label(label) => Some(label.to_string()),
                    chumsky::error::RichPattern::EndOfInput => Some("end of input".to_string()),
                    chumsky::error::RichPattern::Identifier(name) => {
                        Some(format!("identifier '{}'", name))
                    }
                    chumsky::error::RichPattern::Any => Some("any token".to_string()),
                    chumsky::error::RichPattern::SomethingElse => None,
                })
                .collect();
            if expected.is_empty() {
                format!("unexpected {}", found_str)
            } else {
                format!("unexpected {}, expected {}", found_str, expected.join(", "))
            }
        }
        RichReason::Custom(message) => message.to_string(),
    };

    ExpressionError::Syntax {
        span: err.span().into_range(),
        message,
    }
}

/// Formats a token for human-readable diagnostics.
fn format_token(token: &Token) -> String {
    match token {
        Token::Ident(name) => format!("identifier '{}'", name),
        Token::String(value) => format!("string '{}'", value),
        Token::Number(value) => format!("number {}", value),
        Token::And => "'&&'".to_string(),
        Token::Or => "'||'".to_string(),
        Token::Not => "'!'".to_string(),
        Token::EqEq => "'=='".to_string(),
        Token::NotEq => "'!='".to_string(),
        Token::Less => "'<'".to_string(),
        Token::LessOrEqual => "'<='".to_string(),
        Token::Greater => "'>'".to_string(),
        Token::GreaterOrEqual => "'>='".to_string(),
        Token::ParenOpen => "'('".to_string(),
        Token::ParenClose => "')'".to_string(),
        Token::Dot => "'.'".to_string(),
        Token::Minus => "'-'".to_string(),
        Token::Percent => "keyword 'percent'".to_string(),
        Token::True => "keyword 'true'".to_string(),
        Token::False => "keyword 'false'".to_string(),
    }
}
