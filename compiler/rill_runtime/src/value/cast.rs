//! Conversions between primitive tags.
//!
//! Every primitive converts to every other primitive except string to
//! bool. Narrowing is range-checked: a value that does not fit the target
//! is an error, never a silent wrap.

use std::cmp::Ordering;

use super::{Value, ValueTag};
use crate::errors::{cast_error, cast_out_of_range, EvalError};

/// Widest common representation of a scalar.
#[derive(Copy, Clone, Debug)]
enum Num {
    Int(i128),
    Float(f64),
}

impl Num {
    #[expect(clippy::cast_precision_loss, reason = "int to float conversion is the cast's contract")]
    fn as_f64(self) -> f64 {
        match self {
            Num::Int(n) => n as f64,
            Num::Float(f) => f,
        }
    }

    fn is_zero(self) -> bool {
        match self {
            Num::Int(n) => n == 0,
            Num::Float(f) => f == 0.0,
        }
    }
}

fn to_num(value: &Value) -> Option<Num> {
    Some(match value {
        Value::Bool(b) => Num::Int(i128::from(*b)),
        Value::Int8(n) => Num::Int(i128::from(*n)),
        Value::Int16(n) => Num::Int(i128::from(*n)),
        Value::Int32(n) => Num::Int(i128::from(*n)),
        Value::Int64(n) => Num::Int(i128::from(*n)),
        Value::UInt8(n) => Num::Int(i128::from(*n)),
        Value::UInt16(n) => Num::Int(i128::from(*n)),
        Value::UInt32(n) => Num::Int(i128::from(*n)),
        Value::UInt64(n) => Num::Int(i128::from(*n)),
        Value::Float(f) => Num::Float(f64::from(*f)),
        Value::Double(f) => Num::Float(*f),
        _ => return None,
    })
}

/// Tag both operands are converted to before a binary operation.
///
/// Normally the later of the two in promotion order. A signed and an
/// unsigned integer meet in the narrowest signed tag that holds every value
/// of both, which is `double` once `uint64` is involved.
pub fn common_tag(left: ValueTag, right: ValueTag) -> Option<ValueTag> {
    if !left.is_primitive() || !right.is_primitive() {
        return None;
    }
    let wider = left.max(right);
    let (Some(a), Some(b)) = (int_bits(left), int_bits(right)) else {
        return Some(wider);
    };
    if left.is_signed() == right.is_signed() {
        return Some(wider);
    }
    let (unsigned, signed) = if left.is_signed() { (b, a) } else { (a, b) };
    Some(match (unsigned * 2).max(signed) {
        16 => ValueTag::Int16,
        32 => ValueTag::Int32,
        64 => ValueTag::Int64,
        _ => ValueTag::Double,
    })
}

fn int_bits(tag: ValueTag) -> Option<u32> {
    match tag {
        ValueTag::Int8 | ValueTag::UInt8 => Some(8),
        ValueTag::Int16 | ValueTag::UInt16 => Some(16),
        ValueTag::Int32 | ValueTag::UInt32 => Some(32),
        ValueTag::Int64 | ValueTag::UInt64 => Some(64),
        _ => None,
    }
}

/// Convert `value` to `to`.
///
/// # Errors
/// - `Cast` when either tag is not primitive or for string to bool
/// - `CastOutOfRange` when the value does not fit, or a string does not
///   parse as a number
pub fn cast(value: &Value, to: ValueTag) -> Result<Value, EvalError> {
    let from = value.tag();
    if from == to {
        return Ok(value.clone());
    }
    if !from.is_primitive() || !to.is_primitive() {
        return Err(cast_error(from.name(), to.name()));
    }

    match (value, to) {
        (_, ValueTag::Str) => Ok(Value::string(value.to_string())),
        (Value::Str(_), ValueTag::Bool) => Err(cast_error(from.name(), to.name())),
        (Value::Str(s), _) => from_num(value, parse_num(s, to)?, to),
        _ => match to_num(value) {
            Some(num) => from_num(value, num, to),
            None => Err(cast_error(from.name(), to.name())),
        },
    }
}

fn parse_num(s: &str, to: ValueTag) -> Result<Num, EvalError> {
    let text = s.trim();
    if let Ok(n) = text.parse::<i128>() {
        return Ok(Num::Int(n));
    }
    text.parse::<f64>()
        .map(Num::Float)
        .map_err(|_| cast_out_of_range(format!("{s:?}"), to.name()))
}

fn from_num(original: &Value, num: Num, to: ValueTag) -> Result<Value, EvalError> {
    let out_of_range = || cast_out_of_range(original, to.name());
    let int = || -> Result<i128, EvalError> {
        match num {
            Num::Int(n) => Ok(n),
            Num::Float(f) if f.is_finite() => {
                #[expect(clippy::cast_possible_truncation, reason = "truncation toward zero is intended")]
                let whole = f.trunc() as i128;
                Ok(whole)
            }
            Num::Float(_) => Err(out_of_range()),
        }
    };

    Ok(match to {
        ValueTag::Bool => Value::Bool(!num.is_zero()),
        ValueTag::Int8 => Value::Int8(i8::try_from(int()?).map_err(|_| out_of_range())?),
        ValueTag::Int16 => Value::Int16(i16::try_from(int()?).map_err(|_| out_of_range())?),
        ValueTag::Int32 => Value::Int32(i32::try_from(int()?).map_err(|_| out_of_range())?),
        ValueTag::Int64 => Value::Int64(i64::try_from(int()?).map_err(|_| out_of_range())?),
        ValueTag::UInt8 => Value::UInt8(u8::try_from(int()?).map_err(|_| out_of_range())?),
        ValueTag::UInt16 => Value::UInt16(u16::try_from(int()?).map_err(|_| out_of_range())?),
        ValueTag::UInt32 => Value::UInt32(u32::try_from(int()?).map_err(|_| out_of_range())?),
        ValueTag::UInt64 => Value::UInt64(u64::try_from(int()?).map_err(|_| out_of_range())?),
        ValueTag::Float => {
            let wide = num.as_f64();
            #[expect(clippy::cast_possible_truncation, reason = "overflow is checked below")]
            let narrow = wide as f32;
            if wide.is_finite() && !narrow.is_finite() {
                return Err(out_of_range());
            }
            Value::Float(narrow)
        }
        ValueTag::Double => Value::Double(num.as_f64()),
        _ => return Err(cast_error(original.type_name(), to.name())),
    })
}

/// Numeric comparison of two scalars of any tags.
///
/// Exact for every pair of integer tags; mixed integer/float pairs compare
/// as doubles. NaN sorts after every number.
pub(super) fn compare_scalars(left: &Value, right: &Value) -> Ordering {
    match (to_num(left), to_num(right)) {
        (Some(Num::Int(a)), Some(Num::Int(b))) => a.cmp(&b),
        (Some(a), Some(b)) => a.as_f64().total_cmp(&b.as_f64()),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
