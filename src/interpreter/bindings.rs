use crate::string::IdentName;
use crate::value::Value;
use std::ops::Range;

#[derive(Debug, Clone)]
pub struct Binding {
    pub name: IdentName,
    pub value: Value,
}

impl Binding {
    pub fn new(name: IdentName, value: Value) -> Self {
        Self { name, value }
    }
}

/// A remembered length of the binding array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scope(usize);

impl Scope {
    pub fn start(&self) -> usize {
        self.0
    }
}

/// Every visible variable of every active frame, innermost last.
///
/// Scopes are plain lengths: leaving one truncates the array and never runs
/// destructors, since heap values are owned by the arena.
#[derive(Debug, Default, Clone)]
pub struct Bindings {
    entries: Vec<Binding>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn enter(&self) -> Scope {
        Scope(self.entries.len())
    }

    pub fn exit(&mut self, scope: Scope) {
        self.entries.truncate(scope.0);
    }

    pub fn push(&mut self, name: IdentName, value: Value) {
        self.entries.push(Binding::new(name, value));
    }

    pub fn extend(&mut self, bindings: impl IntoIterator<Item = Binding>) {
        self.entries.extend(bindings);
    }

    /// Innermost binding of `name` within `range`.
    pub fn find(&self, name: &str, range: Range<usize>) -> Option<&Value> {
        let end = range.end.min(self.entries.len());
        let start = range.start.min(end);
        self.entries[start..end]
            .iter()
            .rev()
            .find(|binding| &*binding.name == name)
            .map(|binding| &binding.value)
    }

    /// Overwrites the innermost binding at or after `from`, or appends a new one.
    pub fn assign(&mut self, name: IdentName, value: Value, from: usize) {
        let from = from.min(self.entries.len());
        match self.entries[from..]
            .iter_mut()
            .rev()
            .find(|binding| binding.name == name)
        {
            Some(binding) => binding.value = value,
            None => self.entries.push(Binding::new(name, value)),
        }
    }

    pub fn slice(&self, from: usize) -> &[Binding] {
        &self.entries[from.min(self.entries.len())..]
    }

    /// Removes and returns every binding at or after `from`.
    pub fn split_off(&mut self, from: usize) -> Vec<Binding> {
        self.entries.split_off(from.min(self.entries.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exiting_a_scope_drops_its_bindings() {
        let mut bindings = Bindings::new();
        bindings.push("a".into(), Value::I64(1));
        let scope = bindings.enter();
        bindings.push("b".into(), Value::I64(2));
        assert!(bindings.find("b", 0..bindings.len()).is_some());
        bindings.exit(scope);
        assert!(bindings.find("b", 0..bindings.len()).is_none());
        assert_eq!(bindings.len(), 1);
    }

    #[test]
    fn lookups_prefer_the_innermost_binding() {
        let mut bindings = Bindings::new();
        bindings.push("x".into(), Value::I64(1));
        bindings.push("x".into(), Value::I64(2));
        assert_eq!(bindings.find("x", 0..2), Some(&Value::I64(2)));
        assert_eq!(bindings.find("x", 0..1), Some(&Value::I64(1)));
    }

    #[test]
    fn assignment_stays_inside_the_frame() {
        let mut bindings = Bindings::new();
        bindings.push("x".into(), Value::I64(1));
        let frame = bindings.enter();
        bindings.assign("x".into(), Value::I64(5), frame.start());
        assert_eq!(bindings.len(), 2);
        assert_eq!(bindings.find("x", 0..1), Some(&Value::I64(1)));
        bindings.assign("x".into(), Value::I64(6), frame.start());
        assert_eq!(bindings.len(), 2);
        assert_eq!(bindings.find("x", 1..2), Some(&Value::I64(6)));
    }
}
