//! Expression language used by feature transforms
//!
//! Feature definitions carry expressions as plain strings (`"amount * 2"`,
//! `"CAST(price AS DOUBLE)"`). This module turns them into an [`Expr`] tree and
//! answers the one question the resolution engine asks of an expression: given
//! the types of the variables in scope, what is the type of the result?
//!
//! ```
//! use featureplan_core::expr;
//! use featureplan_core::DataType;
//! use std::collections::HashMap;
//!
//! let mut variable_types = HashMap::new();
//! variable_types.insert("price".to_string(), DataType::Int32);
//! variable_types.insert("quantity".to_string(), DataType::Int64);
//!
//! let parsed = expr::parse("price * quantity").unwrap();
//! assert_eq!(parsed.eval_dtype(&variable_types).unwrap(), DataType::Int64);
//! ```

mod lexer;
mod parser;
mod typing;

use crate::types::DataType;
use thiserror::Error;

/// Parses an expression string into an [`Expr`]
pub fn parse(expr: &str) -> Result<Expr, ExprError> {
    parser::Parser::new(expr)?.parse()
}

/// Errors raised by the expression oracle
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExprError {
    /// The expression is malformed
    #[error("Failed to parse expression '{expr}': {message}")]
    Parse { expr: String, message: String },

    /// The expression references a variable with no known type
    #[error("Unknown variable '{0}'")]
    UnknownVariable(String),

    /// The expression calls a function the oracle does not know
    #[error("Unknown function '{0}'")]
    UnknownFunction(String),

    /// Operands do not fit the operator
    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    /// A function or aggregation received arguments it cannot handle
    #[error("Invalid argument for {function}: {message}")]
    InvalidArgument { function: String, message: String },
}

/// Expression (column references, literals, operations)
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Column reference
    Column(String),

    /// Literal value
    Literal(Literal),

    /// Binary operation (a + b, a > b, etc.)
    BinaryOp {
        left: Box<Expr>,
        op: BinaryOperator,
        right: Box<Expr>,
    },

    /// Unary operation (NOT a, -a, etc.)
    UnaryOp { op: UnaryOperator, expr: Box<Expr> },

    /// Function call
    Function { name: String, args: Vec<Expr> },

    /// CASE WHEN expression
    Case {
        conditions: Vec<(Expr, Expr)>,
        else_expr: Option<Box<Expr>>,
    },

    /// CAST(expr AS type)
    Cast { expr: Box<Expr>, dtype: DataType },

    /// expr IS [NOT] NULL
    IsNull { expr: Box<Expr>, negated: bool },
}

impl Expr {
    pub fn column(name: &str) -> Self {
        Self::Column(name.to_string())
    }

    pub fn literal<T: Into<Literal>>(value: T) -> Self {
        Self::Literal(value.into())
    }

    pub fn binary(left: Expr, op: BinaryOperator, right: Expr) -> Self {
        Self::BinaryOp {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    /// Names of all referenced columns, in order of first use
    pub fn variables(&self) -> Vec<String> {
        let mut names = Vec::new();
        self.collect_variables(&mut names);
        names
    }

    fn collect_variables(&self, names: &mut Vec<String>) {
        match self {
            Self::Column(name) => {
                if !names.contains(name) {
                    names.push(name.clone());
                }
            }
            Self::Literal(_) => {}
            Self::BinaryOp { left, right, .. } => {
                left.collect_variables(names);
                right.collect_variables(names);
            }
            Self::UnaryOp { expr, .. } | Self::Cast { expr, .. } | Self::IsNull { expr, .. } => {
                expr.collect_variables(names)
            }
            Self::Function { args, .. } => {
                for arg in args {
                    arg.collect_variables(names);
                }
            }
            Self::Case {
                conditions,
                else_expr,
            } => {
                for (when, then) in conditions {
                    when.collect_variables(names);
                    then.collect_variables(names);
                }
                if let Some(else_expr) = else_expr {
                    else_expr.collect_variables(names);
                }
            }
        }
    }
}

/// Literal value
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Null,
    Boolean(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl From<i64> for Literal {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for Literal {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Literal {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<bool> for Literal {
    fn from(v: bool) -> Self {
        Self::Boolean(v)
    }
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOperator {
    // Comparison
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,

    // Logical
    And,
    Or,

    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl BinaryOperator {
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Neq => "<>",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::And => "AND",
            Self::Or => "OR",
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Mod => "%",
        }
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOperator {
    Not,
    Minus,
}
