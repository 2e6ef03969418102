use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResolutionErrorKind {
    #[error("'return' outside function.")]
    NonFunctionReturn,
    #[error("'yield' outside function.")]
    NonFunctionYield,
    #[error("'yield' inside a class body.")]
    ClassBodyYield,
    #[error("'break' outside loop.")]
    NonLoopBreak,
    #[error("'continue' not properly in loop.")]
    NonLoopContinue,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{kind}")]
pub struct ResolutionError {
    pub kind: ResolutionErrorKind,
    pub line: u32,
}

impl ResolutionError {
    pub fn code(&self) -> &'static str {
        match self.kind {
            ResolutionErrorKind::NonFunctionReturn => "RA001",
            ResolutionErrorKind::NonFunctionYield => "RA002",
            ResolutionErrorKind::ClassBodyYield => "RA003",
            ResolutionErrorKind::NonLoopBreak => "RA004",
            ResolutionErrorKind::NonLoopContinue => "RA005",
        }
    }
}
