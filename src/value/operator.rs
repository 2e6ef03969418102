use super::error::OperatorError;
use super::{TypeTag, Value};
use crate::parser::expression::{BinaryOperator, CompareOperator, UnaryOperator};
use compact_str::CompactString;
use std::cmp::Ordering;
use std::rc::Rc;

pub type NativeBinaryFn = fn(&Value, &Value) -> Result<Value, OperatorError>;
pub type NativeUnaryFn = fn(&Value) -> Result<Value, OperatorError>;

/// What the resolver binds to a binary or comparison node.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedBinary {
    pub native: NativeBinaryFn,
    /// Method looked up on an object left operand before falling back to `native`.
    pub dunder: Option<&'static str>,
    pub symbol: &'static str,
}

#[derive(Debug, Clone, Copy)]
pub struct ResolvedUnary {
    pub native: NativeUnaryFn,
    pub dunder: Option<&'static str>,
    pub symbol: &'static str,
}

pub fn resolve_binary(operator: BinaryOperator) -> ResolvedBinary {
    let (native, dunder): (NativeBinaryFn, _) = match operator {
        BinaryOperator::Add => (add, "__add__"),
        BinaryOperator::Subtract => (subtract, "__sub__"),
        BinaryOperator::Multiply => (multiply, "__mul__"),
        BinaryOperator::Divide => (divide, "__truediv__"),
        BinaryOperator::FloorDivide => (floor_divide, "__floordiv__"),
        BinaryOperator::Modulo => (modulo, "__mod__"),
        BinaryOperator::Power => (power, "__pow__"),
    };
    ResolvedBinary {
        native,
        dunder: Some(dunder),
        symbol: operator.symbol(),
    }
}

pub fn resolve_compare(operator: CompareOperator) -> ResolvedBinary {
    let (native, dunder): (NativeBinaryFn, _) = match operator {
        CompareOperator::LessThan => (less_than, Some("__lt__")),
        CompareOperator::LessThanEqual => (less_equal, Some("__le__")),
        CompareOperator::GreaterThan => (greater_than, Some("__gt__")),
        CompareOperator::GreaterThanEqual => (greater_equal, Some("__ge__")),
        CompareOperator::Equal => (equal, Some("__eq__")),
        CompareOperator::NotEqual => (not_equal, Some("__ne__")),
        CompareOperator::Is => (is, None),
        CompareOperator::IsNot => (is_not, None),
        CompareOperator::In => (contains, None),
        CompareOperator::NotIn => (not_contains, None),
    };
    ResolvedBinary {
        native,
        dunder,
        symbol: operator.symbol(),
    }
}

pub fn resolve_unary(operator: UnaryOperator) -> ResolvedUnary {
    let (native, dunder): (NativeUnaryFn, _) = match operator {
        UnaryOperator::Minus => (negate, Some("__neg__")),
        UnaryOperator::Plus => (positive, Some("__pos__")),
        UnaryOperator::Not => (not, None),
    };
    ResolvedUnary {
        native,
        dunder,
        symbol: operator.symbol(),
    }
}

fn unsupported(symbol: &'static str, lhs: &Value, rhs: &Value) -> OperatorError {
    OperatorError::Unsupported {
        symbol,
        lhs: lhs.type_name(),
        rhs: rhs.type_name(),
    }
}

enum Operands {
    /// Both integers, widened, with the tag the result keeps.
    Integer(i128, i128, TypeTag),
    Float(f64, f64),
}

fn operands(lhs: &Value, rhs: &Value) -> Option<Operands> {
    match (lhs.as_integer(), rhs.as_integer()) {
        (Some(a), Some(b)) => {
            let tag = if lhs.tag() == rhs.tag() && lhs.tag() != TypeTag::BOOL {
                lhs.tag()
            } else {
                TypeTag::I64
            };
            Some(Operands::Integer(a, b, tag))
        }
        _ => Some(Operands::Float(lhs.as_float()?, rhs.as_float()?)),
    }
}

fn narrow(value: i128, tag: TypeTag, symbol: &'static str) -> Result<Value, OperatorError> {
    let overflow = |_| OperatorError::Overflow(symbol);
    let value = match tag {
        TypeTag::I8 => Value::I8(i8::try_from(value).map_err(overflow)?),
        TypeTag::I16 => Value::I16(i16::try_from(value).map_err(overflow)?),
        TypeTag::I32 => Value::I32(i32::try_from(value).map_err(overflow)?),
        TypeTag::U8 => Value::U8(u8::try_from(value).map_err(overflow)?),
        TypeTag::U16 => Value::U16(u16::try_from(value).map_err(overflow)?),
        TypeTag::U32 => Value::U32(u32::try_from(value).map_err(overflow)?),
        TypeTag::U64 => Value::U64(u64::try_from(value).map_err(overflow)?),
        _ => Value::I64(i64::try_from(value).map_err(overflow)?),
    };
    Ok(value)
}

fn arithmetic(
    lhs: &Value,
    rhs: &Value,
    symbol: &'static str,
    integer: fn(i128, i128) -> Option<i128>,
    float: fn(f64, f64) -> f64,
) -> Result<Value, OperatorError> {
    match operands(lhs, rhs) {
        Some(Operands::Integer(a, b, tag)) => {
            let result = integer(a, b).ok_or(OperatorError::Overflow(symbol))?;
            narrow(result, tag, symbol)
        }
        Some(Operands::Float(a, b)) => Ok(Value::F64(float(a, b))),
        None => Err(unsupported(symbol, lhs, rhs)),
    }
}

fn concat(a: &[Value], b: &[Value]) -> Vec<Value> {
    a.iter().chain(b.iter()).cloned().collect()
}

fn repeat<T: Clone>(items: &[T], count: i128) -> Vec<T> {
    let count = usize::try_from(count).unwrap_or(0);
    let mut out = Vec::with_capacity(items.len() * count);
    for _ in 0..count {
        out.extend_from_slice(items);
    }
    out
}

pub fn add(lhs: &Value, rhs: &Value) -> Result<Value, OperatorError> {
    match (lhs, rhs) {
        (Value::Str(a), Value::Str(b)) => {
            let mut joined = a.clone();
            joined.push_str(b);
            Ok(Value::Str(joined))
        }
        (Value::Tuple(a), Value::Tuple(b)) => Ok(Value::tuple(concat(a, b))),
        (Value::List(a), Value::List(b)) => Ok(Value::list(concat(&a.borrow(), &b.borrow()))),
        _ => arithmetic(lhs, rhs, "+", i128::checked_add, |a, b| a + b),
    }
}

pub fn subtract(lhs: &Value, rhs: &Value) -> Result<Value, OperatorError> {
    arithmetic(lhs, rhs, "-", i128::checked_sub, |a, b| a - b)
}

pub fn multiply(lhs: &Value, rhs: &Value) -> Result<Value, OperatorError> {
    let count = |value: &Value| value.as_integer().filter(|_| !value.is_float());
    match (lhs, rhs) {
        (Value::Str(text), other) | (other, Value::Str(text)) if count(other).is_some() => {
            let times = usize::try_from(count(other).unwrap_or(0)).unwrap_or(0);
            Ok(Value::Str(CompactString::from(text.repeat(times))))
        }
        (Value::Tuple(items), other) | (other, Value::Tuple(items)) if count(other).is_some() => {
            Ok(Value::Tuple(Rc::from(repeat(&items[..], count(other).unwrap_or(0)))))
        }
        (Value::List(items), other) | (other, Value::List(items)) if count(other).is_some() => {
            Ok(Value::list(repeat(&items.borrow()[..], count(other).unwrap_or(0))))
        }
        _ => arithmetic(lhs, rhs, "*", i128::checked_mul, |a, b| a * b),
    }
}

pub fn divide(lhs: &Value, rhs: &Value) -> Result<Value, OperatorError> {
    match (lhs.as_float(), rhs.as_float()) {
        (Some(_), Some(b)) if b == 0.0 => Err(OperatorError::ZeroDivision),
        (Some(a), Some(b)) => Ok(Value::F64(a / b)),
        _ => Err(unsupported("/", lhs, rhs)),
    }
}

fn floor_div_int(a: i128, b: i128) -> i128 {
    let quotient = a / b;
    if a % b != 0 && ((a < 0) != (b < 0)) {
        quotient - 1
    } else {
        quotient
    }
}

fn floor_mod_int(a: i128, b: i128) -> i128 {
    let remainder = a % b;
    if remainder != 0 && ((remainder < 0) != (b < 0)) {
        remainder + b
    } else {
        remainder
    }
}

fn floor_mod_float(a: f64, b: f64) -> f64 {
    let remainder = a % b;
    if remainder != 0.0 && ((remainder < 0.0) != (b < 0.0)) {
        remainder + b
    } else {
        remainder
    }
}

pub fn floor_divide(lhs: &Value, rhs: &Value) -> Result<Value, OperatorError> {
    match operands(lhs, rhs) {
        Some(Operands::Integer(_, 0, _)) => Err(OperatorError::ZeroDivision),
        Some(Operands::Integer(a, b, tag)) => narrow(floor_div_int(a, b), tag, "//"),
        Some(Operands::Float(_, b)) if b == 0.0 => Err(OperatorError::ZeroDivision),
        Some(Operands::Float(a, b)) => Ok(Value::F64((a / b).floor())),
        None => Err(unsupported("//", lhs, rhs)),
    }
}

pub fn modulo(lhs: &Value, rhs: &Value) -> Result<Value, OperatorError> {
    match operands(lhs, rhs) {
        Some(Operands::Integer(_, 0, _)) => Err(OperatorError::ZeroDivision),
        Some(Operands::Integer(a, b, tag)) => narrow(floor_mod_int(a, b), tag, "%"),
        Some(Operands::Float(_, b)) if b == 0.0 => Err(OperatorError::ZeroDivision),
        Some(Operands::Float(a, b)) => Ok(Value::F64(floor_mod_float(a, b))),
        None => Err(unsupported("%", lhs, rhs)),
    }
}

pub fn power(lhs: &Value, rhs: &Value) -> Result<Value, OperatorError> {
    match operands(lhs, rhs) {
        Some(Operands::Integer(0, b, _)) if b < 0 => Err(OperatorError::ZeroDivision),
        Some(Operands::Integer(a, b, _)) if b < 0 => Ok(Value::F64((a as f64).powf(b as f64))),
        Some(Operands::Integer(a, b, tag)) => {
            let exponent = u32::try_from(b).map_err(|_| OperatorError::Overflow("**"))?;
            let result = a
                .checked_pow(exponent)
                .ok_or(OperatorError::Overflow("**"))?;
            narrow(result, tag, "**")
        }
        Some(Operands::Float(a, b)) if a == 0.0 && b < 0.0 => Err(OperatorError::ZeroDivision),
        Some(Operands::Float(a, b)) => Ok(Value::F64(a.powf(b))),
        None => Err(unsupported("**", lhs, rhs)),
    }
}

/// Equality that treats `1 == 1.0 == True` the way scripts expect.
pub fn values_equal(lhs: &Value, rhs: &Value) -> bool {
    match (lhs, rhs) {
        (Value::Tuple(a), Value::Tuple(b)) => sequences_equal(a, b),
        (Value::List(a), Value::List(b)) => {
            Rc::ptr_eq(a, b) || sequences_equal(&a.borrow(), &b.borrow())
        }
        _ => match operands(lhs, rhs) {
            Some(Operands::Integer(a, b, _)) => a == b,
            Some(Operands::Float(a, b)) => a == b,
            None => lhs == rhs,
        },
    }
}

fn sequences_equal(a: &[Value], b: &[Value]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| values_equal(x, y))
}

/// `Err` when the operands cannot be ordered at all, `Ok(None)` when unordered (NaN).
fn ordering(lhs: &Value, rhs: &Value, symbol: &'static str) -> Result<Option<Ordering>, OperatorError> {
    match (lhs, rhs) {
        (Value::Str(a), Value::Str(b)) => Ok(Some(a.cmp(b))),
        (Value::Tuple(a), Value::Tuple(b)) => sequence_ordering(a, b, symbol),
        (Value::List(a), Value::List(b)) => sequence_ordering(&a.borrow(), &b.borrow(), symbol),
        _ => match operands(lhs, rhs) {
            Some(Operands::Integer(a, b, _)) => Ok(Some(a.cmp(&b))),
            Some(Operands::Float(a, b)) => Ok(a.partial_cmp(&b)),
            None => Err(unsupported(symbol, lhs, rhs)),
        },
    }
}

fn sequence_ordering(
    a: &[Value],
    b: &[Value],
    symbol: &'static str,
) -> Result<Option<Ordering>, OperatorError> {
    for (x, y) in a.iter().zip(b) {
        if !values_equal(x, y) {
            return ordering(x, y, symbol);
        }
    }
    Ok(Some(a.len().cmp(&b.len())))
}

fn compare(
    lhs: &Value,
    rhs: &Value,
    symbol: &'static str,
    accept: fn(Ordering) -> bool,
) -> Result<Value, OperatorError> {
    let result = ordering(lhs, rhs, symbol)?;
    Ok(Value::Bool(result.map(accept).unwrap_or(false)))
}

pub fn less_than(lhs: &Value, rhs: &Value) -> Result<Value, OperatorError> {
    compare(lhs, rhs, "<", Ordering::is_lt)
}

pub fn less_equal(lhs: &Value, rhs: &Value) -> Result<Value, OperatorError> {
    compare(lhs, rhs, "<=", Ordering::is_le)
}

pub fn greater_than(lhs: &Value, rhs: &Value) -> Result<Value, OperatorError> {
    compare(lhs, rhs, ">", Ordering::is_gt)
}

pub fn greater_equal(lhs: &Value, rhs: &Value) -> Result<Value, OperatorError> {
    compare(lhs, rhs, ">=", Ordering::is_ge)
}

pub fn equal(lhs: &Value, rhs: &Value) -> Result<Value, OperatorError> {
    Ok(Value::Bool(values_equal(lhs, rhs)))
}

pub fn not_equal(lhs: &Value, rhs: &Value) -> Result<Value, OperatorError> {
    Ok(Value::Bool(!values_equal(lhs, rhs)))
}

/// Identity: containers by pointer, scalars by value.
pub fn identical(lhs: &Value, rhs: &Value) -> bool {
    match (lhs, rhs) {
        (Value::Tuple(a), Value::Tuple(b)) => Rc::ptr_eq(a, b),
        (Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b),
        _ => lhs == rhs,
    }
}

pub fn is(lhs: &Value, rhs: &Value) -> Result<Value, OperatorError> {
    Ok(Value::Bool(identical(lhs, rhs)))
}

pub fn is_not(lhs: &Value, rhs: &Value) -> Result<Value, OperatorError> {
    Ok(Value::Bool(!identical(lhs, rhs)))
}

/// `lhs in rhs`.
pub fn contains(lhs: &Value, rhs: &Value) -> Result<Value, OperatorError> {
    let found = match rhs {
        Value::Str(haystack) => match lhs {
            Value::Str(needle) => haystack.contains(needle.as_str()),
            _ => return Err(unsupported("in", lhs, rhs)),
        },
        Value::Tuple(items) => items.iter().any(|item| values_equal(item, lhs)),
        Value::List(items) => items.borrow().iter().any(|item| values_equal(item, lhs)),
        _ => return Err(unsupported("in", lhs, rhs)),
    };
    Ok(Value::Bool(found))
}

pub fn not_contains(lhs: &Value, rhs: &Value) -> Result<Value, OperatorError> {
    match contains(lhs, rhs)? {
        Value::Bool(found) => Ok(Value::Bool(!found)),
        _ => Err(unsupported("not in", lhs, rhs)),
    }
}

pub fn negate(operand: &Value) -> Result<Value, OperatorError> {
    match operand {
        Value::F32(v) => Ok(Value::F32(-v)),
        Value::F64(v) => Ok(Value::F64(-v)),
        Value::Bool(v) => Ok(Value::I64(-(*v as i64))),
        _ => match operand.as_integer() {
            Some(v) => narrow(-v, operand.tag(), "-"),
            None => Err(OperatorError::BadOperand {
                symbol: "-",
                operand: operand.type_name(),
            }),
        },
    }
}

pub fn positive(operand: &Value) -> Result<Value, OperatorError> {
    match operand {
        Value::Bool(v) => Ok(Value::I64(*v as i64)),
        v if v.is_integer() || v.is_float() => Ok(v.clone()),
        _ => Err(OperatorError::BadOperand {
            symbol: "+",
            operand: operand.type_name(),
        }),
    }
}

pub fn not(operand: &Value) -> Result<Value, OperatorError> {
    Ok(Value::Bool(!operand.is_truthy()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_results_keep_their_width() {
        assert_eq!(add(&Value::I32(2), &Value::I32(3)).unwrap(), Value::I32(5));
        assert_eq!(add(&Value::I32(2), &Value::I8(3)).unwrap(), Value::I64(5));
        assert_eq!(
            add(&Value::I8(100), &Value::I8(100)),
            Err(OperatorError::Overflow("+"))
        );
    }

    #[test]
    fn division_follows_floor_semantics() {
        assert_eq!(divide(&Value::I64(7), &Value::I64(2)).unwrap(), Value::F64(3.5));
        assert_eq!(floor_divide(&Value::I64(-7), &Value::I64(2)).unwrap(), Value::I64(-4));
        assert_eq!(modulo(&Value::I64(-7), &Value::I64(2)).unwrap(), Value::I64(1));
        assert_eq!(modulo(&Value::I64(1), &Value::I64(0)), Err(OperatorError::ZeroDivision));
    }

    #[test]
    fn mixed_numbers_compare_by_value() {
        assert_eq!(equal(&Value::I64(1), &Value::F64(1.0)).unwrap(), Value::Bool(true));
        assert_eq!(less_than(&Value::Bool(false), &Value::I64(1)).unwrap(), Value::Bool(true));
        assert!(less_than(&Value::str("a"), &Value::I64(1)).is_err());
    }

    #[test]
    fn sequences_repeat_and_contain() {
        assert_eq!(multiply(&Value::str("ab"), &Value::I64(2)).unwrap(), Value::str("abab"));
        let list = Value::list(vec![Value::I64(1), Value::I64(2)]);
        assert_eq!(contains(&Value::F64(2.0), &list).unwrap(), Value::Bool(true));
    }
}
