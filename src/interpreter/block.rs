use super::trace::Exception;
use crate::parser::statement::Body;
use crate::value::Value;
use std::fmt::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Module,
    FunctionBody,
    ClassBody,
    IfBody,
    WhileBody,
    WhileElse,
    ForBody,
    ForElse,
    TryBody,
    TryHandler,
    TryElse,
    TryFinally,
    WithBody,
    MatchBody,
}

impl Display for BlockKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            BlockKind::Module => "module",
            BlockKind::FunctionBody => "function body",
            BlockKind::ClassBody => "class body",
            BlockKind::IfBody => "if body",
            BlockKind::WhileBody => "while body",
            BlockKind::WhileElse => "while else",
            BlockKind::ForBody => "for body",
            BlockKind::ForElse => "for else",
            BlockKind::TryBody => "try body",
            BlockKind::TryHandler => "except handler",
            BlockKind::TryElse => "try else",
            BlockKind::TryFinally => "finally",
            BlockKind::WithBody => "with body",
            BlockKind::MatchBody => "case body",
        };
        write!(f, "{name}")
    }
}

/// Control state parked while a `finally` body runs.
#[derive(Debug, Clone, Default)]
pub struct PendingControl {
    pub exception: Option<Exception>,
    pub return_value: Option<Value>,
    pub loop_break: bool,
    pub loop_continue: bool,
}

/// One in-progress statement list.
///
/// `next_index` only moves past a statement once it has fully completed, so a
/// suspended generator resumes at the statement that yielded.
#[derive(Debug, Clone)]
pub struct ExecBlock {
    pub kind: BlockKind,
    pub body: Body,
    pub next_index: usize,
    /// Context managers whose `__exit__` is still owed.
    pub resources: Vec<Value>,
    /// The iterator of the `for` loop that owns this body.
    pub iterator: Option<Value>,
    /// The exception an `except` body is handling, for bare `raise`.
    pub handled: Option<Exception>,
    pub saved: Option<PendingControl>,
}

impl ExecBlock {
    pub fn new(kind: BlockKind, body: Body) -> Self {
        Self {
            kind,
            body,
            next_index: 0,
            resources: Vec::new(),
            iterator: None,
            handled: None,
            saved: None,
        }
    }

    pub fn with_resources(mut self, resources: Vec<Value>) -> Self {
        self.resources = resources;
        self
    }

    pub fn with_iterator(mut self, iterator: Value) -> Self {
        self.iterator = Some(iterator);
        self
    }

    pub fn with_handled(mut self, exception: Exception) -> Self {
        self.handled = Some(exception);
        self
    }

    pub fn with_saved(mut self, saved: PendingControl) -> Self {
        self.saved = Some(saved);
        self
    }
}
