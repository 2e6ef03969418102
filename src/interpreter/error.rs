use crate::value::error::CastError;
use thiserror::Error;

/// Faults in the evaluator or the tree it was handed. Scripts cannot catch these.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RuntimeErrorKind {
    #[error("'{type_name}' has no attribute '{name}'.")]
    UndefinedAttribute { type_name: String, name: String },
    #[error("Cannot unpack {actual} values into {expected} targets.")]
    TupleArity { expected: usize, actual: usize },
    #[error("Cannot assign to this expression.")]
    InvalidTarget,
    #[error("{0}")]
    Cast(#[from] CastError),
    #[error("Expression tree refers to a missing node.")]
    MalformedTree,
    #[error("No active frame.")]
    EmptyStack,
    #[error("Resumed a block that is not suspended.")]
    InvalidResume,
    #[error("Uncaught exception:\n{0}")]
    Uncaught(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("[line {line}] {kind}")]
pub struct RuntimeError {
    #[source]
    pub kind: RuntimeErrorKind,
    pub line: u32,
}

impl RuntimeError {
    pub fn new(kind: RuntimeErrorKind, line: u32) -> Self {
        Self { kind, line }
    }

    pub fn code(&self) -> &'static str {
        match self.kind {
            RuntimeErrorKind::UndefinedAttribute { .. } => "RT001",
            RuntimeErrorKind::TupleArity { .. } => "RT002",
            RuntimeErrorKind::InvalidTarget => "RT003",
            RuntimeErrorKind::Cast(_) => "RT004",
            RuntimeErrorKind::MalformedTree => "RT005",
            RuntimeErrorKind::EmptyStack => "RT006",
            RuntimeErrorKind::InvalidResume => "RT007",
            RuntimeErrorKind::Uncaught(_) => "RT008",
        }
    }
}
