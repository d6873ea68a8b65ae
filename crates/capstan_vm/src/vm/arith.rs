//! Operand checks and checked integer operations.

use capstan_bytecode::Instruction;
use capstan_foundation::{Error, ErrorKind, Int, Result, Value, ValueKind};

pub(super) fn expect_int(value: Value) -> Result<Int> {
    value
        .as_int()
        .ok_or_else(|| Error::type_mismatch(ValueKind::Int, value.kind()))
}

pub(super) fn expect_bool(value: Value) -> Result<bool> {
    value
        .as_bool()
        .ok_or_else(|| Error::type_mismatch(ValueKind::Bool, value.kind()))
}

/// Applies a binary instruction to `(a, b)`, where `b` was on top.
pub(super) fn binary(instruction: Instruction, a: Value, b: Value) -> Result<Value> {
    match instruction {
        Instruction::Eq => Ok(Value::Bool(a == b)),
        Instruction::Ne => Ok(Value::Bool(a != b)),
        Instruction::And => Ok(Value::Bool(expect_bool(a)? & expect_bool(b)?)),
        Instruction::Or => Ok(Value::Bool(expect_bool(a)? | expect_bool(b)?)),
        _ => {
            let (x, y) = (expect_int(a)?, expect_int(b)?);
            match instruction {
                Instruction::Add => x
                    .checked_add(y)
                    .map(Value::Int)
                    .ok_or_else(|| Error::overflow("add")),
                Instruction::Sub => x
                    .checked_sub(y)
                    .map(Value::Int)
                    .ok_or_else(|| Error::overflow("sub")),
                Instruction::Mul => x
                    .checked_mul(y)
                    .map(Value::Int)
                    .ok_or_else(|| Error::overflow("mul")),
                Instruction::Div => divide(x, y, Int::checked_div, "div"),
                Instruction::Rem => divide(x, y, Int::checked_rem, "rem"),
                Instruction::Lt => Ok(Value::Bool(x < y)),
                Instruction::Le => Ok(Value::Bool(x <= y)),
                Instruction::Gt => Ok(Value::Bool(x > y)),
                Instruction::Ge => Ok(Value::Bool(x >= y)),
                other => Err(Error::new(ErrorKind::Internal(format!(
                    "{} is not a binary operation",
                    other.opcode()
                )))),
            }
        }
    }
}

fn divide(x: Int, y: Int, op: fn(Int, Int) -> Option<Int>, name: &'static str) -> Result<Value> {
    if y == 0 {
        return Err(Error::new(ErrorKind::DivisionByZero));
    }
    op(x, y).map(Value::Int).ok_or_else(|| Error::overflow(name))
}

pub(super) fn negate(value: Value) -> Result<Value> {
    expect_int(value)?
        .checked_neg()
        .map(Value::Int)
        .ok_or_else(|| Error::overflow("neg"))
}

pub(super) fn not(value: Value) -> Result<Value> {
    Ok(Value::Bool(!expect_bool(value)?))
}
