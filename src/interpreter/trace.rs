use super::block::ExecBlock;
use crate::value::Value;
use compact_str::CompactString;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceKind {
    Module,
    Function,
    /// A class body; its bindings become the class namespace.
    Class,
}

/// One active call: its own block stack and where its bindings start.
#[derive(Debug, Clone)]
pub struct StackTrace {
    pub name: CompactString,
    pub kind: TraceKind,
    pub blocks: Vec<ExecBlock>,
    pub frame_start: usize,
    /// Line of the statement currently executing in this frame.
    pub line: u32,
}

impl StackTrace {
    pub fn new(name: impl Into<CompactString>, kind: TraceKind, frame_start: usize, line: u32) -> Self {
        Self {
            name: name.into(),
            kind,
            blocks: Vec::new(),
            frame_start,
            line,
        }
    }

    pub fn summary(&self) -> FrameSummary {
        FrameSummary {
            name: self.name.clone(),
            line: self.line,
        }
    }
}

/// A frame as it was when an exception was raised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameSummary {
    pub name: CompactString,
    pub line: u32,
}

/// A raised script exception travelling outwards.
#[derive(Debug, Clone)]
pub struct Exception {
    pub value: Value,
    /// Outermost frame first.
    pub traces: Vec<FrameSummary>,
    pub cause: Option<Value>,
}
