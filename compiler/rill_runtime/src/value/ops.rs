//! Scalar operator semantics.
//!
//! Both operands are promoted to their common tag before the operation.
//! Integer arithmetic is checked; division and modulo by zero fail for
//! every numeric tag, floats included. Comparisons and logical operators
//! produce `bool`, and integer comparisons are exact even when the common
//! tag is `double`. `+` with a string on either side concatenates.
//! Failures name the operator builtin and the promoted type.

use rill_ir::{BinaryOp, UnaryOp};

use super::cast::compare_scalars;
use super::{cast, common_tag, Value, ValueTag};
use crate::errors::{
    division_by_zero, index_out_of_bounds, integer_overflow, invalid_binary_op, invalid_unary_op,
    modulo_by_zero, not_indexable, EvalError,
};
use crate::function::Builtin;

const BINARY_OP: &str = Builtin::BinaryOp.reserved_name();

macro_rules! int_binary {
    ($op:expr, $a:expr, $b:expr, $wrap:path, $ty:expr) => {{
        let (a, b) = ($a, $b);
        let overflow = |operation| integer_overflow(BINARY_OP, operation, $ty);
        match $op {
            BinaryOp::Add => a.checked_add(b).map($wrap).ok_or_else(|| overflow("addition")),
            BinaryOp::Sub => a.checked_sub(b).map($wrap).ok_or_else(|| overflow("subtraction")),
            BinaryOp::Mul => a.checked_mul(b).map($wrap).ok_or_else(|| overflow("multiplication")),
            BinaryOp::Div if b == 0 => Err(division_by_zero(BINARY_OP, $ty)),
            BinaryOp::Div => a.checked_div(b).map($wrap).ok_or_else(|| overflow("division")),
            BinaryOp::Mod if b == 0 => Err(modulo_by_zero(BINARY_OP, $ty)),
            BinaryOp::Mod => a.checked_rem(b).map($wrap).ok_or_else(|| overflow("modulo")),
            BinaryOp::Eq => Ok(Value::Bool(a == b)),
            BinaryOp::NotEq => Ok(Value::Bool(a != b)),
            BinaryOp::Lt => Ok(Value::Bool(a < b)),
            BinaryOp::LtEq => Ok(Value::Bool(a <= b)),
            BinaryOp::Gt => Ok(Value::Bool(a > b)),
            BinaryOp::GtEq => Ok(Value::Bool(a >= b)),
            BinaryOp::And => Ok(Value::Bool(a != 0 && b != 0)),
            BinaryOp::Or => Ok(Value::Bool(a != 0 || b != 0)),
            BinaryOp::BitAnd => Ok($wrap(a & b)),
            BinaryOp::BitOr => Ok($wrap(a | b)),
            BinaryOp::BitXor => Ok($wrap(a ^ b)),
            BinaryOp::Shl => u32::try_from(b)
                .ok()
                .and_then(|shift| a.checked_shl(shift))
                .map($wrap)
                .ok_or_else(|| overflow("left shift")),
            BinaryOp::Shr => u32::try_from(b)
                .ok()
                .and_then(|shift| a.checked_shr(shift))
                .map($wrap)
                .ok_or_else(|| overflow("right shift")),
        }
    }};
}

macro_rules! float_binary {
    ($op:expr, $a:expr, $b:expr, $wrap:path, $ty:expr, $invalid:expr) => {{
        let (a, b) = ($a, $b);
        match $op {
            BinaryOp::Add => Ok($wrap(a + b)),
            BinaryOp::Sub => Ok($wrap(a - b)),
            BinaryOp::Mul => Ok($wrap(a * b)),
            BinaryOp::Div if b == 0.0 => Err(division_by_zero(BINARY_OP, $ty)),
            BinaryOp::Div => Ok($wrap(a / b)),
            BinaryOp::Mod if b == 0.0 => Err(modulo_by_zero(BINARY_OP, $ty)),
            BinaryOp::Mod => Ok($wrap(a % b)),
            BinaryOp::Eq => Ok(Value::Bool(a == b)),
            BinaryOp::NotEq => Ok(Value::Bool(a != b)),
            BinaryOp::Lt => Ok(Value::Bool(a < b)),
            BinaryOp::LtEq => Ok(Value::Bool(a <= b)),
            BinaryOp::Gt => Ok(Value::Bool(a > b)),
            BinaryOp::GtEq => Ok(Value::Bool(a >= b)),
            BinaryOp::And => Ok(Value::Bool(a != 0.0 && b != 0.0)),
            BinaryOp::Or => Ok(Value::Bool(a != 0.0 || b != 0.0)),
            BinaryOp::BitAnd
            | BinaryOp::BitOr
            | BinaryOp::BitXor
            | BinaryOp::Shl
            | BinaryOp::Shr => Err($invalid()),
        }
    }};
}

/// Apply a binary operator to two concrete operands.
///
/// `==` and `!=` also accept non-primitive operands and compare them by
/// identity. Every other operator requires primitives.
pub fn binary(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, EvalError> {
    let invalid = || {
        invalid_binary_op(
            BINARY_OP,
            op.as_symbol(),
            left.type_name(),
            right.type_name(),
        )
    };

    if !left.is_primitive() || !right.is_primitive() {
        return match op {
            BinaryOp::Eq => Ok(Value::Bool(left == right)),
            BinaryOp::NotEq => Ok(Value::Bool(left != right)),
            _ => Err(invalid()),
        };
    }

    if op == BinaryOp::Add && (matches!(left, Value::Str(_)) || matches!(right, Value::Str(_))) {
        return Ok(Value::string(format!("{left}{right}")));
    }

    let tag = common_tag(left.tag(), right.tag()).ok_or_else(invalid)?;
    if op.is_comparison() && left.tag().is_integer() && right.tag().is_integer() {
        return Ok(Value::Bool(compare(op, compare_scalars(left, right))));
    }
    let a = cast(left, tag)?;
    let b = cast(right, tag)?;
    let ty = tag.name();

    match (&a, &b) {
        (Value::Bool(x), Value::Bool(y)) => bool_binary(op, *x, *y),
        (Value::Int8(x), Value::Int8(y)) => int_binary!(op, *x, *y, Value::Int8, ty),
        (Value::Int16(x), Value::Int16(y)) => int_binary!(op, *x, *y, Value::Int16, ty),
        (Value::Int32(x), Value::Int32(y)) => int_binary!(op, *x, *y, Value::Int32, ty),
        (Value::Int64(x), Value::Int64(y)) => int_binary!(op, *x, *y, Value::Int64, ty),
        (Value::UInt8(x), Value::UInt8(y)) => int_binary!(op, *x, *y, Value::UInt8, ty),
        (Value::UInt16(x), Value::UInt16(y)) => int_binary!(op, *x, *y, Value::UInt16, ty),
        (Value::UInt32(x), Value::UInt32(y)) => int_binary!(op, *x, *y, Value::UInt32, ty),
        (Value::UInt64(x), Value::UInt64(y)) => int_binary!(op, *x, *y, Value::UInt64, ty),
        (Value::Float(x), Value::Float(y)) => float_binary!(op, *x, *y, Value::Float, ty, invalid),
        (Value::Double(x), Value::Double(y)) => float_binary!(op, *x, *y, Value::Double, ty, invalid),
        (Value::Str(x), Value::Str(y)) => match op {
            BinaryOp::Eq => Ok(Value::Bool(x == y)),
            BinaryOp::NotEq => Ok(Value::Bool(x != y)),
            BinaryOp::Lt => Ok(Value::Bool(x < y)),
            BinaryOp::LtEq => Ok(Value::Bool(x <= y)),
            BinaryOp::Gt => Ok(Value::Bool(x > y)),
            BinaryOp::GtEq => Ok(Value::Bool(x >= y)),
            _ => Err(invalid()),
        },
        _ => Err(invalid()),
    }
}

/// Booleans compute as integers and convert back: any nonzero result is
/// `true`.
fn bool_binary(op: BinaryOp, a: bool, b: bool) -> Result<Value, EvalError> {
    let ty = ValueTag::Bool.name();
    let result = int_binary!(op, i64::from(a), i64::from(b), Value::Int64, ty)?;
    match result {
        Value::Int64(n) => Ok(Value::Bool(n != 0)),
        other => Ok(other),
    }
}

fn compare(op: BinaryOp, ordering: std::cmp::Ordering) -> bool {
    match op {
        BinaryOp::Eq => ordering.is_eq(),
        BinaryOp::NotEq => ordering.is_ne(),
        BinaryOp::Lt => ordering.is_lt(),
        BinaryOp::LtEq => ordering.is_le(),
        BinaryOp::Gt => ordering.is_gt(),
        _ => ordering.is_ge(),
    }
}

/// Apply a unary operator to a concrete operand.
pub fn unary(op: UnaryOp, operand: &Value) -> Result<Value, EvalError> {
    let invalid = || {
        invalid_unary_op(
            Builtin::UnaryOp.reserved_name(),
            op.as_symbol(),
            operand.type_name(),
        )
    };

    match op {
        UnaryOp::Not => match operand {
            Value::Str(_) => Err(invalid()),
            v if v.is_primitive() => Ok(Value::Bool(!v.truthy()?)),
            _ => Err(invalid()),
        },
        UnaryOp::Neg => match operand {
            Value::Int8(n) => n.checked_neg().map(Value::Int8),
            Value::Int16(n) => n.checked_neg().map(Value::Int16),
            Value::Int32(n) => n.checked_neg().map(Value::Int32),
            Value::Int64(n) => n.checked_neg().map(Value::Int64),
            Value::UInt8(n) => n.checked_neg().map(Value::UInt8),
            Value::UInt16(n) => n.checked_neg().map(Value::UInt16),
            Value::UInt32(n) => n.checked_neg().map(Value::UInt32),
            Value::UInt64(n) => n.checked_neg().map(Value::UInt64),
            Value::Float(f) => Some(Value::Float(-f)),
            Value::Double(f) => Some(Value::Double(-f)),
            _ => return Err(invalid()),
        }
        .ok_or_else(|| {
            integer_overflow(
                Builtin::UnaryOp.reserved_name(),
                "negation",
                operand.type_name(),
            )
        }),
        UnaryOp::BitNot => match operand {
            Value::Bool(b) => Ok(Value::Bool(!b)),
            Value::Int8(n) => Ok(Value::Int8(!n)),
            Value::Int16(n) => Ok(Value::Int16(!n)),
            Value::Int32(n) => Ok(Value::Int32(!n)),
            Value::Int64(n) => Ok(Value::Int64(!n)),
            Value::UInt8(n) => Ok(Value::UInt8(!n)),
            Value::UInt16(n) => Ok(Value::UInt16(!n)),
            Value::UInt32(n) => Ok(Value::UInt32(!n)),
            Value::UInt64(n) => Ok(Value::UInt64(!n)),
            _ => Err(invalid()),
        },
    }
}

/// Index a string by character position.
pub fn index_primitive(target: &Value, indices: &[Value]) -> Result<Value, EvalError> {
    let builtin = Builtin::Index.reserved_name();
    let describe = || {
        indices
            .iter()
            .map(Value::type_name)
            .collect::<Vec<_>>()
            .join(", ")
    };
    match (target, indices) {
        (Value::Str(s), [index]) => {
            let i = index
                .as_index()
                .ok_or_else(|| not_indexable(builtin, target.type_name(), &describe()))?;
            let len = s.chars().count();
            usize::try_from(i)
                .ok()
                .and_then(|i| s.chars().nth(i))
                .map(|c| Value::string(c.to_string()))
                .ok_or_else(|| index_out_of_bounds(i, len))
        }
        _ => Err(not_indexable(builtin, target.type_name(), &describe())),
    }
}
