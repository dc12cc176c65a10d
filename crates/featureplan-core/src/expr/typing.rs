//! Static type evaluation of expressions
//!
//! `NULL` has no type of its own: internally an expression may evaluate to
//! `None`, which adopts the type of whatever it is combined with. Only a
//! top-level expression that stays untyped is an error.

use std::collections::HashMap;

use super::{BinaryOperator, Expr, ExprError, Literal, UnaryOperator};
use crate::types::DataType;

type Env = HashMap<String, DataType>;

impl Expr {
    /// Evaluates the result type of this expression given the variable types in scope
    pub fn eval_dtype(&self, variable_types: &Env) -> Result<DataType, ExprError> {
        self.infer(variable_types)?.ok_or_else(|| {
            ExprError::TypeMismatch(
                "cannot infer the type of an expression that is always NULL".to_string(),
            )
        })
    }

    fn infer(&self, env: &Env) -> Result<Option<DataType>, ExprError> {
        match self {
            Expr::Column(name) => env
                .get(name)
                .cloned()
                .map(Some)
                .ok_or_else(|| ExprError::UnknownVariable(name.clone())),
            Expr::Literal(literal) => Ok(literal_type(literal)),
            Expr::BinaryOp { left, op, right } => {
                let left = left.infer(env)?;
                let right = right.infer(env)?;
                binary_type(*op, left, right)
            }
            Expr::UnaryOp { op, expr } => {
                let operand = expr.infer(env)?;
                match (op, operand) {
                    (_, None) => Ok(None),
                    (UnaryOperator::Not, Some(DataType::Bool)) => Ok(Some(DataType::Bool)),
                    (UnaryOperator::Minus, Some(dtype)) if dtype.is_numeric() => Ok(Some(dtype)),
                    (UnaryOperator::Not, Some(dtype)) => Err(ExprError::TypeMismatch(format!(
                        "NOT cannot be applied to {}",
                        dtype
                    ))),
                    (UnaryOperator::Minus, Some(dtype)) => Err(ExprError::TypeMismatch(format!(
                        "unary minus cannot be applied to {}",
                        dtype
                    ))),
                }
            }
            Expr::Cast { expr, dtype } => {
                expr.infer(env)?;
                Ok(Some(dtype.clone()))
            }
            Expr::IsNull { expr, .. } => {
                expr.infer(env)?;
                Ok(Some(DataType::Bool))
            }
            Expr::Case {
                conditions,
                else_expr,
            } => {
                let mut result = None;
                for (when, then) in conditions {
                    match when.infer(env)? {
                        None | Some(DataType::Bool) => {}
                        Some(other) => {
                            return Err(ExprError::TypeMismatch(format!(
                                "CASE WHEN condition must be BOOL, got {}",
                                other
                            )))
                        }
                    }
                    result = unify_optional(result, then.infer(env)?, "CASE")?;
                }
                if let Some(else_expr) = else_expr {
                    result = unify_optional(result, else_expr.infer(env)?, "CASE")?;
                }
                Ok(result)
            }
            Expr::Function { name, args } => function_type(name, args, env),
        }
    }
}

fn literal_type(literal: &Literal) -> Option<DataType> {
    match literal {
        Literal::Null => None,
        Literal::Boolean(_) => Some(DataType::Bool),
        Literal::Int(v) if i32::try_from(*v).is_ok() => Some(DataType::Int32),
        Literal::Int(_) => Some(DataType::Int64),
        Literal::Float(_) => Some(DataType::Float64),
        Literal::String(_) => Some(DataType::String),
    }
}

fn binary_type(
    op: BinaryOperator,
    left: Option<DataType>,
    right: Option<DataType>,
) -> Result<Option<DataType>, ExprError> {
    let mismatch = |l: &DataType, r: &DataType| {
        ExprError::TypeMismatch(format!(
            "operator {} cannot be applied to {} and {}",
            op.symbol(),
            l,
            r
        ))
    };

    match op {
        BinaryOperator::Add
        | BinaryOperator::Sub
        | BinaryOperator::Mul
        | BinaryOperator::Div
        | BinaryOperator::Mod => match (left, right) {
            (Some(l), Some(r)) => l.wider_numeric(&r).map(Some).ok_or_else(|| mismatch(&l, &r)),
            (Some(t), None) | (None, Some(t)) if t.is_numeric() => Ok(Some(t)),
            (Some(t), None) | (None, Some(t)) => Err(ExprError::TypeMismatch(format!(
                "operator {} cannot be applied to {}",
                op.symbol(),
                t
            ))),
            (None, None) => Ok(None),
        },
        BinaryOperator::Eq
        | BinaryOperator::Neq
        | BinaryOperator::Gt
        | BinaryOperator::Gte
        | BinaryOperator::Lt
        | BinaryOperator::Lte => {
            if let (Some(l), Some(r)) = (&left, &right) {
                if l.unify(r).is_none() {
                    return Err(mismatch(l, r));
                }
            }
            Ok(Some(DataType::Bool))
        }
        BinaryOperator::And | BinaryOperator::Or => {
            for operand in [&left, &right].into_iter().flatten() {
                if *operand != DataType::Bool {
                    return Err(ExprError::TypeMismatch(format!(
                        "operator {} requires BOOL operands, got {}",
                        op.symbol(),
                        operand
                    )));
                }
            }
            Ok(Some(DataType::Bool))
        }
    }
}

fn unify_optional(
    current: Option<DataType>,
    next: Option<DataType>,
    context: &str,
) -> Result<Option<DataType>, ExprError> {
    match (current, next) {
        (Some(a), Some(b)) => a.unify(&b).map(Some).ok_or_else(|| {
            ExprError::TypeMismatch(format!(
                "{} branches have incompatible types {} and {}",
                context, a, b
            ))
        }),
        (Some(t), None) | (None, Some(t)) => Ok(Some(t)),
        (None, None) => Ok(None),
    }
}

fn function_type(name: &str, args: &[Expr], env: &Env) -> Result<Option<DataType>, ExprError> {
    let arg_types = args
        .iter()
        .map(|arg| arg.infer(env))
        .collect::<Result<Vec<_>, _>>()?;

    let invalid = |message: String| ExprError::InvalidArgument {
        function: name.to_string(),
        message,
    };
    let expect_arity = |min: usize, max: usize| {
        if arg_types.len() < min || arg_types.len() > max {
            Err(invalid(format!(
                "expected {} to {} arguments, got {}",
                min,
                max,
                arg_types.len()
            )))
        } else {
            Ok(())
        }
    };

    match name {
        "LOWER" | "UPPER" | "TRIM" => {
            expect_arity(1, 1)?;
            match &arg_types[0] {
                None | Some(DataType::String) => Ok(Some(DataType::String)),
                Some(other) => Err(invalid(format!("expected STRING, got {}", other))),
            }
        }
        "CONCAT" => {
            expect_arity(1, usize::MAX)?;
            Ok(Some(DataType::String))
        }
        "JSON_STRING" => {
            expect_arity(1, 1)?;
            Ok(Some(DataType::String))
        }
        "LENGTH" => {
            expect_arity(1, 1)?;
            match &arg_types[0] {
                None | Some(DataType::String) | Some(DataType::Bytes) => Ok(Some(DataType::Int32)),
                Some(other) => Err(invalid(format!("expected STRING or BYTES, got {}", other))),
            }
        }
        "SIZE" => {
            expect_arity(1, 1)?;
            match &arg_types[0] {
                None | Some(DataType::Vector(_)) | Some(DataType::Map(_, _)) => {
                    Ok(Some(DataType::Int32))
                }
                Some(other) => Err(invalid(format!("expected VECTOR or MAP, got {}", other))),
            }
        }
        "UNIX_TIMESTAMP" => {
            expect_arity(1, 2)?;
            match &arg_types[0] {
                None | Some(DataType::String) | Some(DataType::Timestamp) => {
                    Ok(Some(DataType::Int64))
                }
                Some(other) => Err(invalid(format!(
                    "expected STRING or TIMESTAMP, got {}",
                    other
                ))),
            }
        }
        "ABS" | "ROUND" | "FLOOR" | "CEIL" => {
            expect_arity(1, if name == "ROUND" { 2 } else { 1 })?;
            match &arg_types[0] {
                Some(dtype) if dtype.is_numeric() => Ok(Some(dtype.clone())),
                None => Ok(None),
                Some(other) => Err(invalid(format!("expected a numeric value, got {}", other))),
            }
        }
        "COALESCE" => {
            expect_arity(1, usize::MAX)?;
            arg_types
                .into_iter()
                .try_fold(None, |acc, next| unify_optional(acc, next, "COALESCE"))
        }
        _ => Err(ExprError::UnknownFunction(name.to_string())),
    }
}
