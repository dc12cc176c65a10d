//! Tokens of the expression language

use logos::Logos;
use std::ops::Range;

use super::ExprError;

/// Lexical element of an expression
///
/// Keywords (`AND`, `CAST`, `NULL`, ...) are lexed as identifiers and recognized
/// case-insensitively by the parser.
#[derive(Debug, Logos, PartialEq, Clone)]
#[logos(skip r"[ \t\r\n\f]+")]
pub(crate) enum Token {
    #[regex("[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice().to_string())]
    Ident(String),

    /// Back-quoted identifier, never treated as a keyword
    #[regex("`[^`]+`", lex_quoted_ident)]
    QuotedIdent(String),

    #[regex("[0-9]+", |lex| lex.slice().parse::<i64>().ok())]
    Int(i64),

    #[regex(r"[0-9]+\.[0-9]+([eE][+-]?[0-9]+)?", |lex| lex.slice().parse::<f64>().ok())]
    Float(f64),

    #[regex("'([^']|'')*'", lex_str_lit)]
    Str(String),

    #[token("+")]
    Plus,

    #[token("-")]
    Minus,

    #[token("*")]
    Star,

    #[token("/")]
    Slash,

    #[token("%")]
    Percent,

    #[token("=")]
    #[token("==")]
    Eq,

    #[token("<>")]
    #[token("!=")]
    Neq,

    #[token("<")]
    Lt,

    #[token("<=")]
    Lte,

    #[token(">")]
    Gt,

    #[token(">=")]
    Gte,

    #[token("(")]
    OpenParen,

    #[token(")")]
    CloseParen,

    #[token(",")]
    Comma,
}

fn lex_quoted_ident(lex: &mut logos::Lexer<Token>) -> String {
    let slice = lex.slice();
    slice[1..slice.len() - 1].to_string()
}

/// Strips the surrounding quotes and unescapes doubled single quotes
fn lex_str_lit(lex: &mut logos::Lexer<Token>) -> String {
    let slice = lex.slice();
    slice[1..slice.len() - 1].replace("''", "'")
}

/// Splits the whole input into spanned tokens
pub(crate) fn tokenize(expr: &str) -> Result<Vec<(Token, Range<usize>)>, ExprError> {
    let mut tokens = Vec::new();
    for (token, span) in Token::lexer(expr).spanned() {
        match token {
            Ok(token) => tokens.push((token, span)),
            Err(()) => {
                return Err(ExprError::Parse {
                    expr: expr.to_string(),
                    message: format!(
                        "unexpected '{}' at position {}",
                        &expr[span.clone()],
                        span.start
                    ),
                })
            }
        }
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(expr: &str) -> Vec<Token> {
        tokenize(expr)
            .unwrap()
            .into_iter()
            .map(|(token, _)| token)
            .collect()
    }

    #[test]
    fn test_tokenize_arithmetic() {
        assert_eq!(
            kinds("a + 1.5 * `b c`"),
            vec![
                Token::Ident("a".to_string()),
                Token::Plus,
                Token::Float(1.5),
                Token::Star,
                Token::QuotedIdent("b c".to_string()),
            ]
        );
    }

    #[test]
    fn test_tokenize_comparisons_and_strings() {
        assert_eq!(
            kinds("x <= 'it''s' <> y"),
            vec![
                Token::Ident("x".to_string()),
                Token::Lte,
                Token::Str("it's".to_string()),
                Token::Neq,
                Token::Ident("y".to_string()),
            ]
        );
    }

    #[test]
    fn test_tokenize_rejects_unknown_characters() {
        let err = tokenize("a # b").unwrap_err();
        assert!(matches!(err, ExprError::Parse { .. }));
        assert!(err.to_string().contains("position 2"));
    }
}
