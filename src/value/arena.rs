use super::object::{Class, Object};
use super::registry::TypeRegistry;
use super::Value;
use std::cell::RefCell;
use std::rc::Rc;

/// Owns every script object. Scopes never free; only [`Arena::sweep`] does.
#[derive(Debug, Default)]
pub struct Arena {
    objects: Vec<Rc<RefCell<Object>>>,
}

impl Arena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a default-initialised instance of `class`.
    pub fn new_object(&mut self, class: Rc<Class>) -> Value {
        let object = Rc::new(RefCell::new(Object::new(class)));
        self.objects.push(object.clone());
        Value::Object(object)
    }

    /// Takes ownership of an object made elsewhere (e.g. by a copier).
    /// Linear in the number of live objects.
    pub fn adopt(&mut self, value: &Value) {
        if let Value::Object(object) = value {
            if !self.objects.iter().any(|owned| Rc::ptr_eq(owned, object)) {
                self.objects.push(object.clone());
            }
        }
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Releases objects only the arena still refers to, running each type's
    /// deleter once. Repeats until nothing more is freed, since clearing one
    /// object can orphan the objects it referenced. Returns the number released.
    ///
    /// Liveness is `Rc::strong_count == 1`, so objects that reference each
    /// other in a cycle are never released, even once no script value reaches
    /// them. There is no cycle detection.
    pub fn sweep(&mut self, registry: &TypeRegistry) -> usize {
        let mut released = 0;
        loop {
            let (dead, live): (Vec<_>, Vec<_>) = std::mem::take(&mut self.objects)
                .into_iter()
                .partition(|object| Rc::strong_count(object) == 1);
            self.objects = live;
            if dead.is_empty() {
                break;
            }
            released += dead.len();
            for object in dead {
                registry.delete(&Value::Object(object));
            }
        }
        tracing::debug!(released, remaining = self.objects.len(), "Swept arena.");
        released
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::statement::AttributeSlot;
    use crate::value::registry::TypeHooks;

    fn node_class(registry: &mut TypeRegistry) -> Rc<Class> {
        let tag = registry.register("Node", TypeHooks::object());
        let layout: Vec<AttributeSlot> = vec![AttributeSlot {
            name: "next".into(),
            offset: 0,
        }];
        Rc::new(Class {
            name: "Node".into(),
            tag,
            bases: Vec::new(),
            namespace: RefCell::new(Vec::new()),
            layout: layout.into(),
        })
    }

    #[test]
    fn sweep_keeps_referenced_objects() {
        let mut registry = TypeRegistry::new();
        let class = node_class(&mut registry);
        let mut arena = Arena::new();
        let kept = arena.new_object(class.clone());
        let _ = arena.new_object(class);
        assert_eq!(arena.len(), 2);
        assert_eq!(arena.sweep(&registry), 1);
        assert_eq!(arena.len(), 1);
        drop(kept);
        assert_eq!(arena.sweep(&registry), 1);
        assert!(arena.is_empty());
    }

    #[test]
    fn sweep_releases_chains_through_the_deleter() {
        let mut registry = TypeRegistry::new();
        let class = node_class(&mut registry);
        let mut arena = Arena::new();
        let head = arena.new_object(class.clone());
        let tail = arena.new_object(class);
        if let Value::Object(object) = &head {
            object.borrow_mut().set("next", tail);
        }
        drop(head);
        assert_eq!(arena.sweep(&registry), 2);
        assert!(arena.is_empty());
    }

    #[test]
    fn sweep_cannot_release_cycles() {
        let mut registry = TypeRegistry::new();
        let class = node_class(&mut registry);
        let mut arena = Arena::new();
        let first = arena.new_object(class.clone());
        let second = arena.new_object(class);
        if let (Value::Object(a), Value::Object(b)) = (&first, &second) {
            a.borrow_mut().set("next", second.clone());
            b.borrow_mut().set("next", first.clone());
        }
        drop(first);
        drop(second);
        assert_eq!(arena.sweep(&registry), 0);
        assert_eq!(arena.len(), 2);
    }
}
