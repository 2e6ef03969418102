use super::object::Object;
use super::{TypeTag, Value};
use compact_str::CompactString;
use std::cell::RefCell;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher as _};
use std::rc::Rc;

pub type Printer = fn(&TypeRegistry, &Value) -> String;
pub type Copier = fn(&TypeRegistry, &Value) -> Value;
pub type Deleter = fn(&Value);
pub type Hasher = fn(&TypeRegistry, &Value) -> Option<u64>;

/// Per-type behaviour the runtime looks up by tag.
#[derive(Debug, Clone, Copy, Default)]
pub struct TypeHooks {
    pub printer: Option<Printer>,
    pub copier: Option<Copier>,
    pub deleter: Option<Deleter>,
    pub hasher: Option<Hasher>,
}

impl TypeHooks {
    /// Hooks for plain script objects.
    pub fn object() -> Self {
        Self {
            printer: Some(print_object),
            copier: Some(copy_object),
            deleter: Some(clear_object),
            hasher: Some(hash_identity),
        }
    }

    /// Objects whose printed form is their `message` attribute.
    pub fn exception() -> Self {
        Self {
            printer: Some(print_exception),
            ..Self::object()
        }
    }
}

#[derive(Debug, Clone)]
pub struct TypeMetadata {
    pub name: CompactString,
    pub hooks: TypeHooks,
}

/// Metadata table indexed by [`TypeTag`]. One per evaluator.
#[derive(Debug, Clone)]
pub struct TypeRegistry {
    types: Vec<TypeMetadata>,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeRegistry {
    pub fn new() -> Self {
        let mut registry = Self { types: Vec::new() };
        for id in 0..TypeTag::FIRST_CLASS.0 {
            let tag = TypeTag(id);
            let hooks = match tag {
                TypeTag::TUPLE => TypeHooks {
                    printer: Some(print_tuple),
                    copier: None,
                    deleter: None,
                    hasher: Some(hash_tuple),
                },
                TypeTag::LIST => TypeHooks {
                    printer: Some(print_list),
                    copier: Some(copy_list),
                    deleter: None,
                    hasher: None,
                },
                TypeTag::NATIVE
                | TypeTag::FUNCTION
                | TypeTag::BOUND_METHOD
                | TypeTag::CLASS
                | TypeTag::GENERATOR
                | TypeTag::ITERATOR
                | TypeTag::MODULE => TypeHooks {
                    printer: Some(print_callable),
                    copier: None,
                    deleter: None,
                    hasher: Some(hash_identity),
                },
                TypeTag::SIGNAL | TypeTag::INVALID => TypeHooks {
                    printer: Some(print_callable),
                    ..TypeHooks::default()
                },
                _ => TypeHooks {
                    hasher: Some(hash_scalar),
                    ..TypeHooks::default()
                },
            };
            registry.register(tag.builtin_name().unwrap_or("?"), hooks);
        }
        registry
    }

    /// Adds a type and hands out its tag.
    pub fn register(&mut self, name: &str, hooks: TypeHooks) -> TypeTag {
        let tag = TypeTag(self.types.len() as u32);
        self.types.push(TypeMetadata {
            name: name.into(),
            hooks,
        });
        tag
    }

    pub fn get(&self, tag: TypeTag) -> Option<&TypeMetadata> {
        self.types.get(tag.0 as usize)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn name(&self, tag: TypeTag) -> &str {
        self.get(tag).map(|meta| meta.name.as_str()).unwrap_or("?")
    }

    fn hooks(&self, value: &Value) -> TypeHooks {
        self.get(value.tag())
            .map(|meta| meta.hooks)
            .unwrap_or_default()
    }

    /// The `str()` form.
    pub fn print(&self, value: &Value) -> String {
        match value {
            Value::None => "None".into(),
            Value::Bool(true) => "True".into(),
            Value::Bool(false) => "False".into(),
            Value::I8(v) => v.to_string(),
            Value::I16(v) => v.to_string(),
            Value::I32(v) => v.to_string(),
            Value::I64(v) => v.to_string(),
            Value::U8(v) => v.to_string(),
            Value::U16(v) => v.to_string(),
            Value::U32(v) => v.to_string(),
            Value::U64(v) => v.to_string(),
            Value::F32(v) => print_float(*v as f64),
            Value::F64(v) => print_float(*v),
            Value::Str(v) => v.to_string(),
            value => match self.hooks(value).printer {
                Some(printer) => printer(self, value),
                None => format!("<{} value>", self.name(value.tag())),
            },
        }
    }

    /// The `repr()` form: strings are quoted, everything else prints as usual.
    pub fn repr(&self, value: &Value) -> String {
        match value {
            Value::Str(text) => {
                if text.contains('\'') && !text.contains('"') {
                    format!("\"{text}\"")
                } else {
                    format!("'{}'", text.replace('\'', "\\'"))
                }
            }
            value => self.print(value),
        }
    }

    /// Shallow copy. Types without a copier are immutable and shared.
    pub fn copy(&self, value: &Value) -> Value {
        match self.hooks(value).copier {
            Some(copier) => copier(self, value),
            None => value.clone(),
        }
    }

    /// `None` for unhashable values.
    pub fn hash(&self, value: &Value) -> Option<u64> {
        self.hooks(value).hasher.and_then(|hasher| hasher(self, value))
    }

    /// Runs the type's deleter, if it has one.
    pub fn delete(&self, value: &Value) {
        if let Some(deleter) = self.hooks(value).deleter {
            deleter(value);
        }
    }
}

fn print_float(value: f64) -> String {
    if value.is_nan() {
        "nan".into()
    } else if value.is_infinite() {
        let sign = if value > 0.0 { "" } else { "-" };
        format!("{sign}inf")
    } else {
        format!("{value:?}")
    }
}

fn join(registry: &TypeRegistry, items: &[Value]) -> String {
    items
        .iter()
        .map(|item| registry.repr(item))
        .collect::<Vec<_>>()
        .join(", ")
}

fn print_tuple(registry: &TypeRegistry, value: &Value) -> String {
    match value {
        Value::Tuple(items) if items.len() == 1 => format!("({},)", registry.repr(&items[0])),
        Value::Tuple(items) => format!("({})", join(registry, items)),
        _ => String::new(),
    }
}

fn print_list(registry: &TypeRegistry, value: &Value) -> String {
    match value {
        Value::List(items) => format!("[{}]", join(registry, &items.borrow())),
        _ => String::new(),
    }
}

fn print_callable(_: &TypeRegistry, value: &Value) -> String {
    match value {
        Value::Native(native) => format!("<built-in function {}>", native.name),
        Value::Function(function) => format!("<function {}>", function.name()),
        Value::BoundMethod(bound) => match &bound.method {
            Value::Function(function) => {
                format!("<bound method {}.{}>", bound.receiver.type_name(), function.name())
            }
            _ => format!("<bound method of {}>", bound.receiver.type_name()),
        },
        Value::Class(class) => format!("<class '{}'>", class.name),
        Value::Generator(generator) => {
            format!("<generator object {}>", generator.borrow().function.name())
        }
        Value::Iterator(_) => "<iterator>".into(),
        Value::Signal(signal) => format!("<signal {signal:?}>"),
        Value::Module(module) => format!("<module '{}'>", module.name),
        _ => "<invalid>".into(),
    }
}

fn print_object(registry: &TypeRegistry, value: &Value) -> String {
    let Value::Object(object) = value else {
        return String::new();
    };
    let object = object.borrow();
    if object.slots.is_empty() {
        return format!("<{} object>", object.class.name);
    }
    let fields = object
        .class
        .layout
        .iter()
        .zip(object.slots.iter())
        .map(|(slot, value)| format!("{}={}", slot.name, registry.repr(value)))
        .collect::<Vec<_>>()
        .join(", ");
    format!("({fields})")
}

fn print_exception(registry: &TypeRegistry, value: &Value) -> String {
    let Value::Object(object) = value else {
        return String::new();
    };
    let message = object.borrow().get("message");
    match message {
        Some(Value::None) | None => String::new(),
        Some(message) => registry.print(&message),
    }
}

fn copy_list(_: &TypeRegistry, value: &Value) -> Value {
    match value {
        Value::List(items) => Value::list(items.borrow().clone()),
        value => value.clone(),
    }
}

fn copy_object(_: &TypeRegistry, value: &Value) -> Value {
    match value {
        Value::Object(object) => {
            let object = object.borrow();
            Value::Object(Rc::new(RefCell::new(Object {
                class: object.class.clone(),
                slots: object.slots.clone(),
            })))
        }
        value => value.clone(),
    }
}

/// Drops the slot values so cycles through this object can be released.
fn clear_object(value: &Value) {
    if let Value::Object(object) = value {
        object.borrow_mut().slots.clear();
    }
}

fn hash_scalar(_: &TypeRegistry, value: &Value) -> Option<u64> {
    // Numbers that compare equal hash equal.
    if let Some(v) = value.as_integer() {
        return Some(v as u64);
    }
    let mut hasher = DefaultHasher::new();
    match value {
        Value::F32(_) | Value::F64(_) => {
            let v = value.as_float()?;
            if v.fract() == 0.0 && v.is_finite() {
                return Some(v as i128 as u64);
            }
            v.to_bits().hash(&mut hasher);
        }
        Value::Str(text) => text.hash(&mut hasher),
        Value::None => 0u8.hash(&mut hasher),
        _ => return None,
    }
    Some(hasher.finish())
}

fn hash_tuple(registry: &TypeRegistry, value: &Value) -> Option<u64> {
    let Value::Tuple(items) = value else {
        return None;
    };
    let mut hasher = DefaultHasher::new();
    for item in items.iter() {
        registry.hash(item)?.hash(&mut hasher);
    }
    Some(hasher.finish())
}

fn hash_identity(_: &TypeRegistry, value: &Value) -> Option<u64> {
    let address = match value {
        Value::Function(v) => Rc::as_ptr(v) as *const () as usize,
        Value::BoundMethod(v) => Rc::as_ptr(v) as *const () as usize,
        Value::Class(v) => Rc::as_ptr(v) as *const () as usize,
        Value::Object(v) => Rc::as_ptr(v) as *const () as usize,
        Value::Generator(v) => Rc::as_ptr(v) as *const () as usize,
        Value::Iterator(v) => Rc::as_ptr(v) as *const () as usize,
        Value::Module(v) => Rc::as_ptr(v) as *const () as usize,
        Value::Native(v) => v.function as usize,
        _ => return None,
    };
    Some(address as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_are_preregistered() {
        let registry = TypeRegistry::new();
        assert_eq!(registry.len(), TypeTag::FIRST_CLASS.0 as usize);
        assert_eq!(registry.name(TypeTag::I64), "int");
        assert_eq!(registry.name(TypeTag::F64), "float");
    }

    #[test]
    fn registered_classes_get_fresh_tags() {
        let mut registry = TypeRegistry::new();
        let first = registry.register("A", TypeHooks::object());
        let second = registry.register("B", TypeHooks::object());
        assert_eq!(first, TypeTag::FIRST_CLASS);
        assert_ne!(first, second);
        assert_eq!(registry.name(second), "B");
    }

    #[test]
    fn containers_print_their_items_as_repr() {
        let registry = TypeRegistry::new();
        let value = Value::list(vec![Value::I64(1), Value::str("a"), Value::F64(2.0)]);
        assert_eq!(registry.print(&value), "[1, 'a', 2.0]");
        assert_eq!(registry.print(&Value::tuple(vec![Value::None])), "(None,)");
    }

    #[test]
    fn equal_numbers_hash_equal() {
        let registry = TypeRegistry::new();
        assert_eq!(
            registry.hash(&Value::I64(3)),
            registry.hash(&Value::F64(3.0))
        );
        assert_eq!(registry.hash(&Value::list(vec![])), None);
    }

    #[test]
    fn list_copies_are_shallow_and_distinct() {
        let registry = TypeRegistry::new();
        let original = Value::list(vec![Value::I64(1)]);
        let copied = registry.copy(&original);
        if let (Value::List(a), Value::List(b)) = (&original, &copied) {
            assert!(!Rc::ptr_eq(a, b));
            b.borrow_mut().push(Value::I64(2));
            assert_eq!(a.borrow().len(), 1);
        } else {
            panic!("copy changed the type");
        }
    }
}
