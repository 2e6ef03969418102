use super::{TypeTag, Value};
use crate::interpreter::bindings::Binding;
use crate::parser::statement::{AttributeSlot, FunctionDef};
use crate::string::IdentName;
use std::cell::RefCell;
use std::fmt::Debug;
use std::rc::Rc;

/// A `def` evaluated at runtime.
pub struct Function {
    pub def: Rc<FunctionDef>,
    /// Evaluated defaults, one entry per parameter.
    pub defaults: Vec<Option<Value>>,
    /// Snapshot of the enclosing frame when the `def` ran inside a function.
    pub closure: Option<Vec<Binding>>,
}

impl Function {
    pub fn name(&self) -> &IdentName {
        &self.def.name
    }
}

impl Debug for Function {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Function({})", self.def.name)
    }
}

/// A method looked up through an instance; calling it passes the receiver first.
#[derive(Debug)]
pub struct BoundMethod {
    pub receiver: Value,
    pub method: Value,
}

pub struct Class {
    pub name: IdentName,
    pub tag: TypeTag,
    pub bases: Vec<Rc<Class>>,
    pub namespace: RefCell<Vec<Binding>>,
    /// Instance attributes, inherited slots first.
    pub layout: Rc<[AttributeSlot]>,
}

impl Class {
    /// Looks the name up in this class, then its bases depth first.
    pub fn find(&self, name: &str) -> Option<Value> {
        let local = self
            .namespace
            .borrow()
            .iter()
            .rev()
            .find(|binding| &*binding.name == name)
            .map(|binding| binding.value.clone());
        local.or_else(|| self.bases.iter().find_map(|base| base.find(name)))
    }

    pub fn set(&self, name: IdentName, value: Value) {
        let mut namespace = self.namespace.borrow_mut();
        match namespace.iter_mut().find(|binding| binding.name == name) {
            Some(binding) => binding.value = value,
            None => namespace.push(Binding { name, value }),
        }
    }

    pub fn is_subclass_of(&self, other: &Class) -> bool {
        self.tag == other.tag || self.bases.iter().any(|base| base.is_subclass_of(other))
    }

    pub fn slot(&self, name: &str) -> Option<usize> {
        self.layout
            .iter()
            .find(|slot| &*slot.name == name)
            .map(|slot| slot.offset as usize)
    }
}

impl Debug for Class {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Class({}, {:?})", self.name, self.tag)
    }
}

/// An instance: one value per slot of its class layout.
pub struct Object {
    pub class: Rc<Class>,
    pub slots: Vec<Value>,
}

impl Object {
    /// Slots start from the class-level value of the same name, or `None`.
    pub fn new(class: Rc<Class>) -> Self {
        let slots = class
            .layout
            .iter()
            .map(|slot| class.find(&slot.name).unwrap_or(Value::None))
            .collect();
        Self { class, slots }
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        let index = self.class.slot(name)?;
        self.slots.get(index).cloned()
    }

    /// Returns `false` when the class layout has no such attribute.
    pub fn set(&mut self, name: &str, value: Value) -> bool {
        match self.class.slot(name).and_then(|index| self.slots.get_mut(index)) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }
}

impl Debug for Object {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Object({}, {} slots)", self.class.name, self.slots.len())
    }
}

/// A namespace bound by `import`.
pub struct ModuleObject {
    pub name: IdentName,
    pub members: Vec<Binding>,
}

impl ModuleObject {
    pub fn find(&self, name: &str) -> Option<Value> {
        self.members
            .iter()
            .find(|binding| &*binding.name == name)
            .map(|binding| binding.value.clone())
    }
}

impl Debug for ModuleObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Module({}, {} members)", self.name, self.members.len())
    }
}

/// Cursor over a list, tuple or string.
#[derive(Debug)]
pub struct SequenceIterator {
    pub source: Value,
    pub index: usize,
}

impl SequenceIterator {
    pub fn new(source: Value) -> Self {
        Self { source, index: 0 }
    }

    /// `None` once the source is exhausted or is not a sequence.
    pub fn advance(&mut self) -> Option<Value> {
        let item = match &self.source {
            Value::List(items) => items.borrow().get(self.index).cloned(),
            Value::Tuple(items) => items.get(self.index).cloned(),
            Value::Str(text) => text
                .chars()
                .nth(self.index)
                .map(|c| Value::str(c.to_string())),
            _ => None,
        };
        if item.is_some() {
            self.index += 1;
        }
        item
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn class(name: &str, tag: u32, bases: Vec<Rc<Class>>, slots: &[&str]) -> Rc<Class> {
        let layout: Vec<AttributeSlot> = slots
            .iter()
            .enumerate()
            .map(|(offset, name)| AttributeSlot {
                name: (*name).into(),
                offset: offset as u32,
            })
            .collect();
        Rc::new(Class {
            name: name.into(),
            tag: TypeTag(tag),
            bases,
            namespace: RefCell::new(Vec::new()),
            layout: layout.into(),
        })
    }

    #[test]
    fn lookups_fall_back_to_bases() {
        let base = class("Base", 30, vec![], &[]);
        base.set("greet".into(), Value::I64(1));
        let derived = class("Derived", 31, vec![base.clone()], &[]);
        assert_eq!(derived.find("greet"), Some(Value::I64(1)));
        assert!(derived.is_subclass_of(&base));
        assert!(!base.is_subclass_of(&derived));
    }

    #[test]
    fn objects_reject_unknown_attributes() {
        let point = class("Point", 30, vec![], &["x", "y"]);
        let mut object = Object::new(point);
        assert!(object.set("y", Value::F64(2.0)));
        assert!(!object.set("z", Value::F64(2.0)));
        assert_eq!(object.get("y"), Some(Value::F64(2.0)));
        assert_eq!(object.get("x"), Some(Value::None));
    }

    #[test]
    fn string_iteration_yields_characters() {
        let mut iterator = SequenceIterator::new(Value::str("ab"));
        assert_eq!(iterator.advance(), Some(Value::str("a")));
        assert_eq!(iterator.advance(), Some(Value::str("b")));
        assert_eq!(iterator.advance(), None);
    }
}
