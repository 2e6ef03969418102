use std::collections::HashSet;
use std::rc::Rc;

pub type IdentName = Rc<str>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Ident {
    pub name: IdentName,
    pub line: u32,
}

impl std::fmt::Display for Ident {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Deduplicates identifier text so every occurrence of a name shares one allocation.
#[derive(Debug, Default)]
pub struct Interner {
    names: HashSet<IdentName>,
}

impl Interner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&mut self, text: &str) -> IdentName {
        if let Some(name) = self.names.get(text) {
            return name.clone();
        }
        let name: IdentName = text.into();
        self.names.insert(name.clone());
        name
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interned_names_share_storage() {
        let mut interner = Interner::new();
        let a = interner.intern("self");
        let b = interner.intern("self");
        assert!(Rc::ptr_eq(&a, &b));
        assert_eq!(interner.len(), 1);
    }
}
