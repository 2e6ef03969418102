use super::error::RuntimeErrorKind;
use crate::value::error::CastError;
use crate::value::object::{BoundMethod, Class, Object};
use crate::value::registry::TypeRegistry;
use crate::value::{TypeTag, Value};
use std::cell::RefCell;
use std::fmt::Debug;
use std::rc::Rc;

pub type NativeFn = fn(&mut dyn NativeHost, &[Value]) -> Result<Value, NativeError>;

/// A host function callable from scripts.
#[derive(Clone, Copy)]
pub struct NativeFunction {
    pub name: &'static str,
    pub function: NativeFn,
}

impl Debug for NativeFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "NativeFunction({})", self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NativeError {
    /// Raise a built-in exception in the calling script.
    Raise {
        class: BuiltinException,
        message: String,
    },
    /// A script exception is already pending; unwind without raising another.
    Propagate,
    Runtime(RuntimeErrorKind),
}

impl From<CastError> for NativeError {
    fn from(error: CastError) -> Self {
        NativeError::Runtime(RuntimeErrorKind::Cast(error))
    }
}

impl NativeError {
    pub fn raise(class: BuiltinException, message: impl Into<String>) -> Self {
        NativeError::Raise {
            class,
            message: message.into(),
        }
    }
}

/// What native functions may ask of the evaluator.
pub trait NativeHost {
    fn write_line(&mut self, text: &str);
    fn registry(&self) -> &TypeRegistry;
    /// Next item, or `Signal::IterationDone`.
    fn get_next(&mut self, iterator: &Value) -> Result<Value, NativeError>;
    fn make_iterator(&mut self, iterable: &Value) -> Result<Value, NativeError>;
    fn allocate(&mut self, class: Rc<Class>) -> Value;
    fn adopt(&mut self, value: &Value);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinException {
    Exception,
    AssertionError,
    TypeError,
    ValueError,
    ZeroDivisionError,
    StopIteration,
    RuntimeError,
    AttributeError,
    IndexError,
    RecursionError,
    ImportError,
}

impl BuiltinException {
    pub const ALL: [BuiltinException; 11] = [
        BuiltinException::Exception,
        BuiltinException::AssertionError,
        BuiltinException::TypeError,
        BuiltinException::ValueError,
        BuiltinException::ZeroDivisionError,
        BuiltinException::StopIteration,
        BuiltinException::RuntimeError,
        BuiltinException::AttributeError,
        BuiltinException::IndexError,
        BuiltinException::RecursionError,
        BuiltinException::ImportError,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            BuiltinException::Exception => "Exception",
            BuiltinException::AssertionError => "AssertionError",
            BuiltinException::TypeError => "TypeError",
            BuiltinException::ValueError => "ValueError",
            BuiltinException::ZeroDivisionError => "ZeroDivisionError",
            BuiltinException::StopIteration => "StopIteration",
            BuiltinException::RuntimeError => "RuntimeError",
            BuiltinException::AttributeError => "AttributeError",
            BuiltinException::IndexError => "IndexError",
            BuiltinException::RecursionError => "RecursionError",
            BuiltinException::ImportError => "ImportError",
        }
    }

    pub fn index(&self) -> usize {
        *self as usize
    }
}

/// Attribute every exception object carries.
pub const MESSAGE_ATTRIBUTE: &str = "message";

pub const BUILTIN_FUNCTIONS: [NativeFunction; 12] = [
    NativeFunction { name: "print", function: print },
    NativeFunction { name: "len", function: len },
    NativeFunction { name: "range", function: range },
    NativeFunction { name: "iter", function: iter },
    NativeFunction { name: "next", function: next },
    NativeFunction { name: "str", function: to_str },
    NativeFunction { name: "int", function: to_int },
    NativeFunction { name: "float", function: to_float },
    NativeFunction { name: "bool", function: to_bool },
    NativeFunction { name: "isinstance", function: isinstance },
    NativeFunction { name: "copy", function: copy },
    NativeFunction { name: "hash", function: hash },
];

pub const EXCEPTION_INIT: NativeFunction = NativeFunction {
    name: "__init__",
    function: exception_init,
};

pub const LIST_APPEND: NativeFunction = NativeFunction {
    name: "append",
    function: list_append,
};

/// `list.append` bound to `list`.
pub fn bind_list_method(list: &Value, name: &str) -> Option<Value> {
    match name {
        "append" => Some(Value::BoundMethod(Rc::new(BoundMethod {
            receiver: list.clone(),
            method: Value::Native(LIST_APPEND),
        }))),
        _ => None,
    }
}

pub(super) fn arity(name: &str, args: &[Value], min: usize, max: usize) -> Result<(), NativeError> {
    if args.len() < min || args.len() > max {
        let expected = if min == max {
            format!("exactly {min}")
        } else if args.len() < min {
            format!("at least {min}")
        } else {
            format!("at most {max}")
        };
        let plural = if min == max && min == 1 { "" } else { "s" };
        return Err(NativeError::raise(
            BuiltinException::TypeError,
            format!("{name}() takes {expected} argument{plural} ({} given)", args.len()),
        ));
    }
    Ok(())
}

fn print(host: &mut dyn NativeHost, args: &[Value]) -> Result<Value, NativeError> {
    let line = args
        .iter()
        .map(|arg| host.registry().print(arg))
        .collect::<Vec<_>>()
        .join(" ");
    host.write_line(&line);
    Ok(Value::None)
}

fn len(_: &mut dyn NativeHost, args: &[Value]) -> Result<Value, NativeError> {
    arity("len", args, 1, 1)?;
    let length = match &args[0] {
        Value::Str(text) => text.chars().count(),
        Value::Tuple(items) => items.len(),
        Value::List(items) => items.borrow().len(),
        other => {
            return Err(NativeError::raise(
                BuiltinException::TypeError,
                format!("object of type '{}' has no len()", other.type_name()),
            ))
        }
    };
    Ok(Value::I64(length as i64))
}

fn integer_argument(name: &str, value: &Value) -> Result<i64, NativeError> {
    let integer = match value {
        Value::F32(_) | Value::F64(_) => None,
        value => value.as_integer().and_then(|v| i64::try_from(v).ok()),
    };
    integer.ok_or_else(|| {
        NativeError::raise(
            BuiltinException::TypeError,
            format!(
                "'{}' object cannot be interpreted as an integer in {name}()",
                value.type_name()
            ),
        )
    })
}

/// Materialises the range as a list.
fn range(_: &mut dyn NativeHost, args: &[Value]) -> Result<Value, NativeError> {
    arity("range", args, 1, 3)?;
    let bounds = args
        .iter()
        .map(|arg| integer_argument("range", arg))
        .collect::<Result<Vec<_>, _>>()?;
    let (start, stop, step) = match bounds.as_slice() {
        [] => (0, 0, 1),
        [stop] => (0, *stop, 1),
        [start, stop] => (*start, *stop, 1),
        [start, stop, step, ..] => (*start, *stop, *step),
    };
    if step == 0 {
        return Err(NativeError::raise(
            BuiltinException::ValueError,
            "range() arg 3 must not be zero",
        ));
    }
    let mut items = Vec::new();
    let mut current = start;
    while (step > 0 && current < stop) || (step < 0 && current > stop) {
        items.push(Value::I64(current));
        current += step;
    }
    Ok(Value::list(items))
}

fn iter(host: &mut dyn NativeHost, args: &[Value]) -> Result<Value, NativeError> {
    arity("iter", args, 1, 1)?;
    host.make_iterator(&args[0])
}

fn next(host: &mut dyn NativeHost, args: &[Value]) -> Result<Value, NativeError> {
    arity("next", args, 1, 2)?;
    let item = host.get_next(&args[0])?;
    if item.is_done() {
        return match args.get(1) {
            Some(default) => Ok(default.clone()),
            None => Err(NativeError::raise(BuiltinException::StopIteration, "")),
        };
    }
    Ok(item)
}

fn to_str(host: &mut dyn NativeHost, args: &[Value]) -> Result<Value, NativeError> {
    arity("str", args, 0, 1)?;
    let text = args
        .first()
        .map(|arg| host.registry().print(arg))
        .unwrap_or_default();
    Ok(Value::str(text))
}

fn to_int(_: &mut dyn NativeHost, args: &[Value]) -> Result<Value, NativeError> {
    arity("int", args, 0, 1)?;
    let Some(value) = args.first() else {
        return Ok(Value::I64(0));
    };
    let converted = match value {
        Value::F32(_) | Value::F64(_) => {
            let v = value.as_float().unwrap_or_default();
            if !v.is_finite() {
                return Err(NativeError::raise(
                    BuiltinException::ValueError,
                    "cannot convert float infinity or NaN to integer",
                ));
            }
            Some(v.trunc() as i64)
        }
        Value::Str(text) => Some(text.trim().replace('_', "").parse::<i64>().map_err(|_| {
            NativeError::raise(
                BuiltinException::ValueError,
                format!("invalid literal for int() with base 10: '{text}'"),
            )
        })?),
        value => value.as_integer().and_then(|v| i64::try_from(v).ok()),
    };
    converted.map(Value::I64).ok_or_else(|| {
        NativeError::raise(
            BuiltinException::TypeError,
            format!(
                "int() argument must be a string or a number, not '{}'",
                value.type_name()
            ),
        )
    })
}

fn to_float(_: &mut dyn NativeHost, args: &[Value]) -> Result<Value, NativeError> {
    arity("float", args, 0, 1)?;
    let Some(value) = args.first() else {
        return Ok(Value::F64(0.0));
    };
    let converted = match value {
        Value::Str(text) => {
            let trimmed = text.trim();
            let parsed = match trimmed.to_ascii_lowercase().as_str() {
                "nan" => Some(f64::NAN),
                "inf" | "+inf" | "infinity" => Some(f64::INFINITY),
                "-inf" | "-infinity" => Some(f64::NEG_INFINITY),
                _ => trimmed.parse::<f64>().ok(),
            };
            Some(parsed.ok_or_else(|| {
                NativeError::raise(
                    BuiltinException::ValueError,
                    format!("could not convert string to float: '{text}'"),
                )
            })?)
        }
        value => value.as_float(),
    };
    converted.map(Value::F64).ok_or_else(|| {
        NativeError::raise(
            BuiltinException::TypeError,
            format!(
                "float() argument must be a string or a number, not '{}'",
                value.type_name()
            ),
        )
    })
}

fn to_bool(_: &mut dyn NativeHost, args: &[Value]) -> Result<Value, NativeError> {
    arity("bool", args, 0, 1)?;
    Ok(Value::Bool(args.first().is_some_and(Value::is_truthy)))
}

fn instance_of(value: &Value, kind: &Value) -> Result<bool, NativeError> {
    match kind {
        Value::Class(class) => Ok(match value {
            Value::Object(object) => object.borrow().class.is_subclass_of(class),
            _ => false,
        }),
        Value::Tuple(kinds) => {
            for kind in kinds.iter() {
                if instance_of(value, kind)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        // The conversion builtins double as the built-in type names.
        Value::Native(native) => Ok(match native.name {
            "int" => value.is_integer(),
            "float" => value.is_float(),
            "str" => value.tag() == TypeTag::STR,
            "bool" => value.tag() == TypeTag::BOOL,
            _ => false,
        }),
        other => Err(NativeError::raise(
            BuiltinException::TypeError,
            format!(
                "isinstance() arg 2 must be a type or tuple of types, not '{}'",
                other.type_name()
            ),
        )),
    }
}

fn isinstance(_: &mut dyn NativeHost, args: &[Value]) -> Result<Value, NativeError> {
    arity("isinstance", args, 2, 2)?;
    Ok(Value::Bool(instance_of(&args[0], &args[1])?))
}

fn copy(host: &mut dyn NativeHost, args: &[Value]) -> Result<Value, NativeError> {
    arity("copy", args, 1, 1)?;
    let copied = host.registry().copy(&args[0]);
    host.adopt(&copied);
    Ok(copied)
}

fn hash(host: &mut dyn NativeHost, args: &[Value]) -> Result<Value, NativeError> {
    arity("hash", args, 1, 1)?;
    match host.registry().hash(&args[0]) {
        Some(hash) => Ok(Value::I64(hash as i64)),
        None => Err(NativeError::raise(
            BuiltinException::TypeError,
            format!("unhashable type: '{}'", args[0].type_name()),
        )),
    }
}

/// Only reachable through [`bind_list_method`], so the receiver is always a list.
fn list_append(_: &mut dyn NativeHost, args: &[Value]) -> Result<Value, NativeError> {
    let [receiver, item] = args else {
        return Err(NativeError::raise(
            BuiltinException::TypeError,
            format!("append() takes exactly one argument ({} given)", args.len().saturating_sub(1)),
        ));
    };
    let items = receiver.cast::<Rc<RefCell<Vec<Value>>>>()?;
    items.borrow_mut().push(item.clone());
    Ok(Value::None)
}

/// Called with the class when constructing, or with an existing instance when
/// a subclass `__init__` delegates to it.
fn exception_init(host: &mut dyn NativeHost, args: &[Value]) -> Result<Value, NativeError> {
    let Some((receiver, rest)) = args.split_first() else {
        return Err(NativeError::raise(
            BuiltinException::TypeError,
            "__init__() missing its receiver",
        ));
    };
    let message = match rest {
        [] => Value::None,
        [message] => message.clone(),
        many => Value::tuple(many.to_vec()),
    };
    if receiver.is_valid::<Rc<Class>>() {
        let class = receiver.cast::<Rc<Class>>()?;
        let object = host.allocate(class);
        object
            .cast::<Rc<RefCell<Object>>>()?
            .borrow_mut()
            .set(MESSAGE_ATTRIBUTE, message);
        return Ok(object);
    }
    receiver
        .cast::<Rc<RefCell<Object>>>()?
        .borrow_mut()
        .set(MESSAGE_ATTRIBUTE, message);
    Ok(Value::None)
}
