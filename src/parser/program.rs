use super::statement::{Body, Statement};
use std::rc::Rc;

/// A parsed source file.
#[derive(Debug, Clone)]
pub struct Module {
    pub body: Body,
    pub source: Rc<str>,
}

impl Module {
    pub fn new(statements: Vec<Statement>, source: &str) -> Self {
        Self {
            body: statements.into(),
            source: source.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    pub fn get_statement(&self, index: usize) -> Option<&Statement> {
        self.body.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Statement> {
        self.body.iter()
    }
}
