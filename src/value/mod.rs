pub mod arena;
pub mod error;
pub mod object;
pub mod operator;
pub mod registry;

use crate::interpreter::generator::GeneratorObject;
use crate::interpreter::native::NativeFunction;
use compact_str::CompactString;
use error::CastError;
use object::{BoundMethod, Class, Function, ModuleObject, Object, SequenceIterator};
use std::cell::RefCell;
use std::rc::Rc;

/// Runtime type id. Built-in kinds have fixed ids; every class gets a fresh one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeTag(pub u32);

impl TypeTag {
    pub const INVALID: TypeTag = TypeTag(0);
    pub const NONE: TypeTag = TypeTag(1);
    pub const BOOL: TypeTag = TypeTag(2);
    pub const I8: TypeTag = TypeTag(3);
    pub const I16: TypeTag = TypeTag(4);
    pub const I32: TypeTag = TypeTag(5);
    pub const I64: TypeTag = TypeTag(6);
    pub const U8: TypeTag = TypeTag(7);
    pub const U16: TypeTag = TypeTag(8);
    pub const U32: TypeTag = TypeTag(9);
    pub const U64: TypeTag = TypeTag(10);
    pub const F32: TypeTag = TypeTag(11);
    pub const F64: TypeTag = TypeTag(12);
    pub const STR: TypeTag = TypeTag(13);
    pub const TUPLE: TypeTag = TypeTag(14);
    pub const LIST: TypeTag = TypeTag(15);
    pub const NATIVE: TypeTag = TypeTag(16);
    pub const FUNCTION: TypeTag = TypeTag(17);
    pub const BOUND_METHOD: TypeTag = TypeTag(18);
    pub const CLASS: TypeTag = TypeTag(19);
    pub const GENERATOR: TypeTag = TypeTag(20);
    pub const ITERATOR: TypeTag = TypeTag(21);
    pub const SIGNAL: TypeTag = TypeTag(22);
    pub const MODULE: TypeTag = TypeTag(23);
    /// First id handed out to user classes.
    pub const FIRST_CLASS: TypeTag = TypeTag(24);

    pub fn is_builtin(&self) -> bool {
        *self < Self::FIRST_CLASS
    }

    /// Script-visible name of a built-in tag.
    pub fn builtin_name(&self) -> Option<&'static str> {
        let name = match *self {
            Self::INVALID => "invalid",
            Self::NONE => "NoneType",
            Self::BOOL => "bool",
            Self::I8 => "i8",
            Self::I16 => "i16",
            Self::I32 => "i32",
            Self::I64 => "int",
            Self::U8 => "u8",
            Self::U16 => "u16",
            Self::U32 => "u32",
            Self::U64 => "u64",
            Self::F32 => "f32",
            Self::F64 => "float",
            Self::STR => "str",
            Self::TUPLE => "tuple",
            Self::LIST => "list",
            Self::NATIVE => "builtin_function_or_method",
            Self::FUNCTION => "function",
            Self::BOUND_METHOD => "method",
            Self::CLASS => "type",
            Self::GENERATOR => "generator",
            Self::ITERATOR => "iterator",
            Self::SIGNAL => "signal",
            Self::MODULE => "module",
            _ => return None,
        };
        Some(name)
    }
}

/// Control-flow outcomes passed up through nested block execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// An iterator or generator has nothing left.
    IterationDone,
    /// A generator body stopped at a `yield`; its blocks stay resumable.
    Paused,
}

#[derive(Debug, Clone, Default)]
pub enum Value {
    /// The missing marker, e.g. from a failed name lookup.
    #[default]
    Invalid,
    None,
    Bool(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    Str(CompactString),
    Tuple(Rc<[Value]>),
    List(Rc<RefCell<Vec<Value>>>),
    Native(NativeFunction),
    Function(Rc<Function>),
    BoundMethod(Rc<BoundMethod>),
    Class(Rc<Class>),
    Object(Rc<RefCell<Object>>),
    Generator(Rc<RefCell<GeneratorObject>>),
    Iterator(Rc<RefCell<SequenceIterator>>),
    Signal(Signal),
    Module(Rc<ModuleObject>),
}

impl Value {
    pub fn tag(&self) -> TypeTag {
        match self {
            Value::Invalid => TypeTag::INVALID,
            Value::None => TypeTag::NONE,
            Value::Bool(_) => TypeTag::BOOL,
            Value::I8(_) => TypeTag::I8,
            Value::I16(_) => TypeTag::I16,
            Value::I32(_) => TypeTag::I32,
            Value::I64(_) => TypeTag::I64,
            Value::U8(_) => TypeTag::U8,
            Value::U16(_) => TypeTag::U16,
            Value::U32(_) => TypeTag::U32,
            Value::U64(_) => TypeTag::U64,
            Value::F32(_) => TypeTag::F32,
            Value::F64(_) => TypeTag::F64,
            Value::Str(_) => TypeTag::STR,
            Value::Tuple(_) => TypeTag::TUPLE,
            Value::List(_) => TypeTag::LIST,
            Value::Native(_) => TypeTag::NATIVE,
            Value::Function(_) => TypeTag::FUNCTION,
            Value::BoundMethod(_) => TypeTag::BOUND_METHOD,
            Value::Class(_) => TypeTag::CLASS,
            Value::Object(object) => object.borrow().class.tag,
            Value::Generator(_) => TypeTag::GENERATOR,
            Value::Iterator(_) => TypeTag::ITERATOR,
            Value::Signal(_) => TypeTag::SIGNAL,
            Value::Module(_) => TypeTag::MODULE,
        }
    }

    /// Name used in script-level error messages.
    pub fn type_name(&self) -> String {
        match self {
            Value::Object(object) => object.borrow().class.name.to_string(),
            value => value.tag().builtin_name().unwrap_or("object").to_string(),
        }
    }

    /// Reads the payload as `T`, failing when the tag does not match.
    pub fn cast<T: FromValue>(&self) -> Result<T, CastError> {
        T::from_value(self).ok_or(CastError {
            expected: T::TAG,
            actual: self.tag(),
        })
    }

    /// The non-failing form of [`Value::cast`].
    pub fn is_valid<T: FromValue>(&self) -> bool {
        T::from_value(self).is_some()
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, Value::Invalid)
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    pub fn is_paused(&self) -> bool {
        matches!(self, Value::Signal(Signal::Paused))
    }

    pub fn is_done(&self) -> bool {
        matches!(self, Value::Signal(Signal::IterationDone))
    }

    /// Fully evaluated, as opposed to a marker or control signal.
    pub fn is_concrete(&self) -> bool {
        !matches!(self, Value::Invalid | Value::Signal(_))
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            Value::Bool(_)
                | Value::I8(_)
                | Value::I16(_)
                | Value::I32(_)
                | Value::I64(_)
                | Value::U8(_)
                | Value::U16(_)
                | Value::U32(_)
                | Value::U64(_)
        )
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Value::F32(_) | Value::F64(_))
    }

    /// Widens any integer payload (including `bool`) to `i128`.
    pub fn as_integer(&self) -> Option<i128> {
        let value = match *self {
            Value::Bool(v) => v as i128,
            Value::I8(v) => v as i128,
            Value::I16(v) => v as i128,
            Value::I32(v) => v as i128,
            Value::I64(v) => v as i128,
            Value::U8(v) => v as i128,
            Value::U16(v) => v as i128,
            Value::U32(v) => v as i128,
            Value::U64(v) => v as i128,
            _ => return None,
        };
        Some(value)
    }

    /// Any numeric payload as `f64`.
    pub fn as_float(&self) -> Option<f64> {
        match *self {
            Value::F32(v) => Some(v as f64),
            Value::F64(v) => Some(v),
            _ => self.as_integer().map(|v| v as f64),
        }
    }

    /// Python truthiness: zero, empty and `None` are false.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Invalid | Value::None => false,
            Value::Bool(v) => *v,
            Value::F32(v) => *v != 0.0,
            Value::F64(v) => *v != 0.0,
            Value::Str(v) => !v.is_empty(),
            Value::Tuple(v) => !v.is_empty(),
            Value::List(v) => !v.borrow().is_empty(),
            Value::Signal(_) => false,
            v => v.as_integer().map(|v| v != 0).unwrap_or(true),
        }
    }

    pub fn str(value: impl Into<CompactString>) -> Value {
        Value::Str(value.into())
    }

    pub fn tuple(values: Vec<Value>) -> Value {
        Value::Tuple(values.into())
    }

    pub fn list(values: Vec<Value>) -> Value {
        Value::List(Rc::new(RefCell::new(values)))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        if self.tag() != other.tag() {
            return false;
        }
        match (self, other) {
            (Value::Invalid, Value::Invalid) | (Value::None, Value::None) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::I8(a), Value::I8(b)) => a == b,
            (Value::I16(a), Value::I16(b)) => a == b,
            (Value::I32(a), Value::I32(b)) => a == b,
            (Value::I64(a), Value::I64(b)) => a == b,
            (Value::U8(a), Value::U8(b)) => a == b,
            (Value::U16(a), Value::U16(b)) => a == b,
            (Value::U32(a), Value::U32(b)) => a == b,
            (Value::U64(a), Value::U64(b)) => a == b,
            (Value::F32(a), Value::F32(b)) => a == b,
            (Value::F64(a), Value::F64(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Tuple(a), Value::Tuple(b)) => a == b,
            (Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow(),
            (Value::Native(a), Value::Native(b)) => a.name == b.name,
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::BoundMethod(a), Value::BoundMethod(b)) => Rc::ptr_eq(a, b),
            (Value::Class(a), Value::Class(b)) => Rc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            (Value::Generator(a), Value::Generator(b)) => Rc::ptr_eq(a, b),
            (Value::Iterator(a), Value::Iterator(b)) => Rc::ptr_eq(a, b),
            (Value::Signal(a), Value::Signal(b)) => a == b,
            (Value::Module(a), Value::Module(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Payload types a [`Value`] can be read as.
pub trait FromValue: Sized {
    const TAG: TypeTag;
    fn from_value(value: &Value) -> Option<Self>;
}

macro_rules! impl_from_value {
    ($ty:ty, $variant:ident, $tag:ident) => {
        impl FromValue for $ty {
            const TAG: TypeTag = TypeTag::$tag;

            fn from_value(value: &Value) -> Option<Self> {
                match value {
                    Value::$variant(v) => Some(v.clone()),
                    _ => None,
                }
            }
        }

        impl From<$ty> for Value {
            fn from(value: $ty) -> Self {
                Value::$variant(value)
            }
        }
    };
}

impl_from_value!(bool, Bool, BOOL);
impl_from_value!(i8, I8, I8);
impl_from_value!(i16, I16, I16);
impl_from_value!(i32, I32, I32);
impl_from_value!(i64, I64, I64);
impl_from_value!(u8, U8, U8);
impl_from_value!(u16, U16, U16);
impl_from_value!(u32, U32, U32);
impl_from_value!(u64, U64, U64);
impl_from_value!(f32, F32, F32);
impl_from_value!(f64, F64, F64);
impl_from_value!(CompactString, Str, STR);
impl_from_value!(Rc<[Value]>, Tuple, TUPLE);
impl_from_value!(Rc<RefCell<Vec<Value>>>, List, LIST);
impl_from_value!(Rc<Function>, Function, FUNCTION);
impl_from_value!(Rc<Class>, Class, CLASS);
impl_from_value!(Rc<RefCell<GeneratorObject>>, Generator, GENERATOR);

/// Objects carry per-class tags, so the registered tag only names the first class id.
impl FromValue for Rc<RefCell<Object>> {
    const TAG: TypeTag = TypeTag::FIRST_CLASS;

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Object(object) => Some(object.clone()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cast_checks_the_tag() {
        let value = Value::I64(3);
        assert_eq!(value.cast::<i64>().unwrap(), 3);
        assert!(value.cast::<f64>().is_err());
        assert!(!value.is_valid::<bool>());
    }

    #[test]
    fn equality_requires_matching_tags() {
        assert_ne!(Value::I64(1), Value::F64(1.0));
        assert_ne!(Value::I32(1), Value::I64(1));
        assert_eq!(Value::str("a"), Value::str("a"));
    }

    #[test]
    fn truthiness_follows_python() {
        assert!(!Value::I64(0).is_truthy());
        assert!(!Value::str("").is_truthy());
        assert!(!Value::None.is_truthy());
        assert!(Value::tuple(vec![Value::None]).is_truthy());
    }
}
