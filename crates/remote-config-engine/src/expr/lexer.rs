//! Lexer for condition expressions using logos.

use logos::Logos;

/// Byte range in expression source text.
pub type Span = std::ops::Range<usize>;

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\n\r]+")]
pub enum Token {
    // Boolean combinators
    #[token("&&")]
    And,
    #[token("||")]
    Or,
    #[token("!")]
    Not,

    // Comparison operators (longest match wins, so != beats !)
    #[token("==")]
    EqEq,
    #[token("!=")]
    NotEq,
    #[token("<=")]
    LessOrEqual,
    #[token(">=")]
    GreaterOrEqual,
    #[token("<")]
    Less,
    #[token(">")]
    Greater,

    // Delimiters
    #[token("(")]
    ParenOpen,
    #[token(")")]
    ParenClose,
    #[token(".")]
    Dot,
    #[token("-")]
    Minus,

    // Keywords
    #[token("percent")]
    Percent,
    #[token("true")]
    True,
    #[token("false")]
    False,

    // Literals - identifiers must come after keywords
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice().to_string(), priority = 1)]
    Ident(String),

    #[regex(r#""([^"\\]|\\.)*""#, |lex| {
        let s = lex.slice();
        s[1..s.len()-1].to_string()
    })]
    #[regex(r#"'([^'\\]|\\.)*'"#, |lex| {
        let s = lex.slice();
        s[1..s.len()-1].to_string()
    })]
    String(String),

    #[regex(r"[0-9]+(\.[0-9]+)?", |lex| lex.slice().parse::<f64>().ok())]
    Number(f64),
}

/// Lexes an expression into tokens with spans.
///
/// Unlike a reporting pipeline, validation must reject any input the lexer
/// cannot tokenize, so the first unrecognized byte range is surfaced as an
/// error instead of being silently skipped.
pub fn lex(input: &str) -> Result<Vec<(Token, Span)>, Span> {
    let mut tokens = Vec::new();
    for (token, span) in Token::lexer(input).spanned() {
        match token {
            Ok(token) => tokens.push((token, span)),
            Err(()) => return Err(span),
        }
    }
    Ok(tokens)
}
