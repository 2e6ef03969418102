use super::bindings::Binding;
use super::block::ExecBlock;
use crate::value::object::Function;
use std::fmt::Debug;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorState {
    /// Arguments bound, body not started.
    Created,
    Suspended,
    Running,
    Exhausted,
}

/// A paused call: its bindings and block stack as of the last `yield`.
pub struct GeneratorObject {
    pub function: Rc<Function>,
    pub environment: Vec<Binding>,
    pub blocks: Vec<ExecBlock>,
    pub state: GeneratorState,
}

impl GeneratorObject {
    pub fn new(function: Rc<Function>, environment: Vec<Binding>, blocks: Vec<ExecBlock>) -> Self {
        Self {
            function,
            environment,
            blocks,
            state: GeneratorState::Created,
        }
    }
}

impl Debug for GeneratorObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeneratorObject")
            .field("function", &self.function.name())
            .field("state", &self.state)
            .field("blocks", &self.blocks.len())
            .finish()
    }
}
