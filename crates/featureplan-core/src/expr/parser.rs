//! Recursive-descent parser for the expression language
//!
//! Precedence, loosest first:
//! `OR` < `AND` < `NOT` < comparison / `IS [NOT] NULL` < `+ -` < `* / %` < unary `-`

use std::ops::Range;

use super::lexer::{tokenize, Token};
use super::{BinaryOperator, Expr, ExprError, Literal, UnaryOperator};
use crate::types::DataType;

const KEYWORDS: &[&str] = &[
    "AND", "OR", "NOT", "CAST", "AS", "CASE", "WHEN", "THEN", "ELSE", "END", "IS", "NULL",
    "TRUE", "FALSE",
];

/// Deepest nesting of parentheses, calls and unary operators the parser accepts
const MAX_DEPTH: usize = 128;

pub(crate) struct Parser<'a> {
    expr: &'a str,
    tokens: Vec<(Token, Range<usize>)>,
    pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    pub(crate) fn new(expr: &'a str) -> Result<Self, ExprError> {
        Ok(Self {
            expr,
            tokens: tokenize(expr)?,
            pos: 0,
            depth: 0,
        })
    }

    /// Parses the whole input as a single expression
    pub(crate) fn parse(mut self) -> Result<Expr, ExprError> {
        if self.tokens.is_empty() {
            return Err(self.error("expression is empty"));
        }
        let expr = self.parse_or()?;
        if let Some((token, span)) = self.tokens.get(self.pos) {
            return Err(self.error(format!(
                "unexpected {:?} at position {}",
                token, span.start
            )));
        }
        Ok(expr)
    }

    fn parse_or(&mut self) -> Result<Expr, ExprError> {
        self.nested(|p| {
            let mut left = p.parse_and()?;
            while p.eat_keyword("OR") {
                let right = p.parse_and()?;
                left = Expr::binary(left, BinaryOperator::Or, right);
            }
            Ok(left)
        })
    }

    fn parse_and(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.parse_not()?;
        while self.eat_keyword("AND") {
            let right = self.parse_not()?;
            left = Expr::binary(left, BinaryOperator::And, right);
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expr, ExprError> {
        if self.eat_keyword("NOT") {
            let expr = self.nested(Self::parse_not)?;
            return Ok(Expr::UnaryOp {
                op: UnaryOperator::Not,
                expr: Box::new(expr),
            });
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr, ExprError> {
        let left = self.parse_additive()?;

        if self.eat_keyword("IS") {
            let negated = self.eat_keyword("NOT");
            self.expect_keyword("NULL")?;
            return Ok(Expr::IsNull {
                expr: Box::new(left),
                negated,
            });
        }

        let op = match self.peek() {
            Some(Token::Eq) => BinaryOperator::Eq,
            Some(Token::Neq) => BinaryOperator::Neq,
            Some(Token::Lt) => BinaryOperator::Lt,
            Some(Token::Lte) => BinaryOperator::Lte,
            Some(Token::Gt) => BinaryOperator::Gt,
            Some(Token::Gte) => BinaryOperator::Gte,
            _ => return Ok(left),
        };
        self.pos += 1;
        let right = self.parse_additive()?;
        Ok(Expr::binary(left, op, right))
    }

    fn parse_additive(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOperator::Add,
                Some(Token::Minus) => BinaryOperator::Sub,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.parse_multiplicative()?;
            left = Expr::binary(left, op, right);
        }
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOperator::Mul,
                Some(Token::Slash) => BinaryOperator::Div,
                Some(Token::Percent) => BinaryOperator::Mod,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.parse_unary()?;
            left = Expr::binary(left, op, right);
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, ExprError> {
        if self.peek() == Some(&Token::Minus) {
            self.pos += 1;
            let expr = self.nested(Self::parse_unary)?;
            return Ok(Expr::UnaryOp {
                op: UnaryOperator::Minus,
                expr: Box::new(expr),
            });
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, ExprError> {
        let Some((token, span)) = self.tokens.get(self.pos).cloned() else {
            return Err(self.error("unexpected end of expression"));
        };
        self.pos += 1;

        match token {
            Token::Int(v) => Ok(Expr::Literal(Literal::Int(v))),
            Token::Float(v) => Ok(Expr::Literal(Literal::Float(v))),
            Token::Str(s) => Ok(Expr::Literal(Literal::String(s))),
            Token::QuotedIdent(name) => Ok(Expr::Column(name)),
            Token::OpenParen => {
                let expr = self.parse_or()?;
                self.expect(Token::CloseParen)?;
                Ok(expr)
            }
            Token::Ident(ident) => self.parse_ident(ident, span),
            other => Err(self.error(format!(
                "unexpected {:?} at position {}",
                other, span.start
            ))),
        }
    }

    fn parse_ident(&mut self, ident: String, span: Range<usize>) -> Result<Expr, ExprError> {
        match ident.to_ascii_uppercase().as_str() {
            "NULL" => return Ok(Expr::Literal(Literal::Null)),
            "TRUE" => return Ok(Expr::Literal(Literal::Boolean(true))),
            "FALSE" => return Ok(Expr::Literal(Literal::Boolean(false))),
            "CAST" => return self.parse_cast(),
            "CASE" => return self.parse_case(),
            upper if KEYWORDS.contains(&upper) => {
                return Err(self.error(format!(
                    "unexpected keyword {} at position {}",
                    upper, span.start
                )))
            }
            _ => {}
        }

        if self.peek() == Some(&Token::OpenParen) {
            self.pos += 1;
            let args = self.parse_args()?;
            return Ok(Expr::Function {
                name: ident.to_ascii_uppercase(),
                args,
            });
        }

        Ok(Expr::Column(ident))
    }

    fn parse_args(&mut self) -> Result<Vec<Expr>, ExprError> {
        let mut args = Vec::new();
        if self.peek() == Some(&Token::CloseParen) {
            self.pos += 1;
            return Ok(args);
        }
        loop {
            args.push(self.parse_or()?);
            match self.peek() {
                Some(Token::Comma) => self.pos += 1,
                Some(Token::CloseParen) => {
                    self.pos += 1;
                    return Ok(args);
                }
                _ => return Err(self.error("expected ',' or ')' in argument list")),
            }
        }
    }

    fn parse_cast(&mut self) -> Result<Expr, ExprError> {
        self.expect(Token::OpenParen)?;
        let expr = self.parse_or()?;
        self.expect_keyword("AS")?;
        let type_name = match self.tokens.get(self.pos) {
            Some((Token::Ident(name), _)) => name.clone(),
            _ => return Err(self.error("expected a type name after AS")),
        };
        self.pos += 1;
        self.expect(Token::CloseParen)?;

        let dtype = cast_target(&type_name)
            .ok_or_else(|| self.error(format!("unknown CAST target type '{}'", type_name)))?;
        Ok(Expr::Cast {
            expr: Box::new(expr),
            dtype,
        })
    }

    fn parse_case(&mut self) -> Result<Expr, ExprError> {
        let mut conditions = Vec::new();
        while self.eat_keyword("WHEN") {
            let when = self.parse_or()?;
            self.expect_keyword("THEN")?;
            let then = self.parse_or()?;
            conditions.push((when, then));
        }
        if conditions.is_empty() {
            return Err(self.error("CASE requires at least one WHEN branch"));
        }
        let else_expr = if self.eat_keyword("ELSE") {
            Some(Box::new(self.parse_or()?))
        } else {
            None
        };
        self.expect_keyword("END")?;
        Ok(Expr::Case {
            conditions,
            else_expr,
        })
    }

    /// Runs `parse` one nesting level deeper, failing past [`MAX_DEPTH`]
    fn nested<T>(
        &mut self,
        parse: impl FnOnce(&mut Self) -> Result<T, ExprError>,
    ) -> Result<T, ExprError> {
        if self.depth >= MAX_DEPTH {
            return Err(self.error("expression nested too deeply"));
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(token, _)| token)
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        match self.peek() {
            Some(Token::Ident(ident)) if ident.eq_ignore_ascii_case(keyword) => {
                self.pos += 1;
                true
            }
            _ => false,
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<(), ExprError> {
        if self.eat_keyword(keyword) {
            Ok(())
        } else {
            Err(self.error(format!("expected {}", keyword)))
        }
    }

    fn expect(&mut self, expected: Token) -> Result<(), ExprError> {
        if self.peek() == Some(&expected) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(format!("expected {:?}", expected)))
        }
    }

    fn error(&self, message: impl Into<String>) -> ExprError {
        ExprError::Parse {
            expr: self.expr.to_string(),
            message: message.into(),
        }
    }
}

/// Maps SQL type names accepted by CAST onto data types
fn cast_target(name: &str) -> Option<DataType> {
    match name.to_ascii_uppercase().as_str() {
        "INT" | "INTEGER" | "INT32" => Some(DataType::Int32),
        "BIGINT" | "LONG" | "INT64" => Some(DataType::Int64),
        "FLOAT" | "FLOAT32" => Some(DataType::Float32),
        "DOUBLE" | "FLOAT64" => Some(DataType::Float64),
        "STRING" | "VARCHAR" => Some(DataType::String),
        "BOOLEAN" | "BOOL" => Some(DataType::Bool),
        "TIMESTAMP" => Some(DataType::Timestamp),
        "BYTES" => Some(DataType::Bytes),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::super::parse;
    use super::*;

    #[test]
    fn test_precedence() {
        let parsed = parse("a + b * 2 > 10 AND NOT c").unwrap();
        let expected = Expr::binary(
            Expr::binary(
                Expr::binary(
                    Expr::column("a"),
                    BinaryOperator::Add,
                    Expr::binary(Expr::column("b"), BinaryOperator::Mul, Expr::literal(2i64)),
                ),
                BinaryOperator::Gt,
                Expr::literal(10i64),
            ),
            BinaryOperator::And,
            Expr::UnaryOp {
                op: UnaryOperator::Not,
                expr: Box::new(Expr::column("c")),
            },
        );
        assert_eq!(parsed, expected);
    }

    #[test]
    fn test_parse_cast_case_and_functions() {
        let parsed = parse("cast(amount as double)").unwrap();
        assert_eq!(
            parsed,
            Expr::Cast {
                expr: Box::new(Expr::column("amount")),
                dtype: DataType::Float64,
            }
        );

        let parsed = parse("CASE WHEN x IS NOT NULL THEN lower(name) ELSE 'n/a' END").unwrap();
        assert!(matches!(parsed, Expr::Case { ref conditions, .. } if conditions.len() == 1));

        let parsed = parse("unix_timestamp(ts, 'yyyy-MM-dd')").unwrap();
        assert!(matches!(
            parsed,
            Expr::Function { ref name, ref args } if name == "UNIX_TIMESTAMP" && args.len() == 2
        ));
    }

    #[test]
    fn test_parse_errors() {
        for bad in ["", "a +", "(a", "CAST(a AS DECIMAL)", "CASE END", "a b", "AND"] {
            let err = parse(bad).unwrap_err();
            assert!(
                matches!(err, ExprError::Parse { .. }),
                "expected parse error for {:?}, got {:?}",
                bad,
                err
            );
        }
    }

    #[test]
    fn test_deep_nesting_is_a_parse_error() {
        let parens = format!("{}x{}", "(".repeat(1000), ")".repeat(1000));
        let nots = format!("{}flag", "NOT ".repeat(1000));
        let minuses = format!("{}x", "- ".repeat(1000));
        let calls = format!("{}x{}", "abs(".repeat(1000), ")".repeat(1000));
        for deep in [parens, nots, minuses, calls] {
            let err = parse(&deep).unwrap_err();
            assert!(matches!(err, ExprError::Parse { .. }), "got {:?}", err);
            assert!(err.to_string().contains("nested too deeply"));
        }
    }

    #[test]
    fn test_moderate_nesting_still_parses() {
        let parens = format!("{}x{}", "(".repeat(64), ")".repeat(64));
        assert_eq!(parse(&parens).unwrap(), Expr::column("x"));

        let minuses = format!("{}x", "- ".repeat(64));
        assert!(matches!(
            parse(&minuses).unwrap(),
            Expr::UnaryOp {
                op: UnaryOperator::Minus,
                ..
            }
        ));
    }

    #[test]
    fn test_quoted_identifier_is_never_a_keyword() {
        assert_eq!(parse("`end`").unwrap(), Expr::column("end"));
    }
}
