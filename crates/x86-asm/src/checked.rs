//! Overflow-checked arithmetic and fallible container growth.
//!
//! Constant folding in the evaluator and deferred-field resolution in the
//! linker never wrap: every operation reports overflow or division by zero.
//! Output containers grow through `try_reserve` so that exhausting memory
//! surfaces as [`AsmError::AllocationFailure`] instead of an abort.

use alloc::vec::Vec;
use core::fmt;

use crate::error::AsmError;
use crate::ir::{InfixOp, PrefixOp};

/// Failed checked integer operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithmeticError {
    /// Result does not fit in `i64`.
    Overflow,
    /// Division by zero.
    DivisionByZero,
}

impl fmt::Display for ArithmeticError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArithmeticError::Overflow => f.write_str("arithmetic overflow"),
            ArithmeticError::DivisionByZero => f.write_str("division by zero"),
        }
    }
}

/// Apply a binary operator with overflow checking.
pub fn apply(op: InfixOp, a: i64, b: i64) -> Result<i64, ArithmeticError> {
    let r = match op {
        InfixOp::Add => a.checked_add(b),
        InfixOp::Sub => a.checked_sub(b),
        InfixOp::Mul => a.checked_mul(b),
        InfixOp::Div => {
            if b == 0 {
                return Err(ArithmeticError::DivisionByZero);
            }
            a.checked_div(b)
        }
    };
    r.ok_or(ArithmeticError::Overflow)
}

/// Apply a unary operator with overflow checking.
pub fn unary(op: PrefixOp, v: i64) -> Result<i64, ArithmeticError> {
    match op {
        PrefixOp::Plus => Ok(v),
        PrefixOp::Neg => v.checked_neg().ok_or(ArithmeticError::Overflow),
        PrefixOp::Not => Ok(!v),
    }
}

/// Reserve room for `additional` more elements.
pub fn try_reserve<T>(vec: &mut Vec<T>, additional: usize) -> Result<(), AsmError> {
    vec.try_reserve(additional)
        .map_err(|_| AsmError::AllocationFailure {
            requested: additional,
        })
}

/// Push one element, growing fallibly.
pub fn try_push<T>(vec: &mut Vec<T>, item: T) -> Result<(), AsmError> {
    if vec.len() == vec.capacity() {
        try_reserve(vec, 1)?;
    }
    vec.push(item);
    Ok(())
}

/// Append a slice, growing fallibly.
pub fn try_extend<T: Clone>(vec: &mut Vec<T>, items: &[T]) -> Result<(), AsmError> {
    try_reserve(vec, items.len())?;
    vec.extend_from_slice(items);
    Ok(())
}
