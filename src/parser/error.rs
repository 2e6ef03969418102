use crate::lexer::{LexicalError, TokenKind};
use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum ParserErrorKind {
    #[error("Expected {expected} but got token {actual}.")]
    UnexpectedToken {
        actual: TokenKind,
        expected: TokenKind,
    },
    #[error("Expected an expression but got token {0}.")]
    NonExpression(TokenKind),
    #[error("Expected a non-EOF token.")]
    UnexpectedEof,
    #[error("Expected a statement but got {0}.")]
    InvalidStatement(TokenKind),
    #[error("Cannot assign to this expression.")]
    InvalidLValue,
    #[error("Expected a pattern but got {0}.")]
    InvalidPattern(TokenKind),
    #[error("Integer literal does not fit in 64 bits.")]
    IntegerOverflow,
    #[error("Encountered a lexer error {0}.")]
    LexicalError(#[from] LexicalError),
}

#[derive(Debug, Error, Clone)]
#[error("[line {line}] {kind}")]
pub struct ParserError {
    #[source]
    pub kind: ParserErrorKind,
    pub line: u32,
}

impl ParserError {
    pub fn code(&self) -> &'static str {
        match self.kind {
            ParserErrorKind::UnexpectedToken { .. } => "PA001",
            ParserErrorKind::NonExpression(_) => "PA002",
            ParserErrorKind::UnexpectedEof => "PA003",
            ParserErrorKind::InvalidStatement(_) => "PA004",
            ParserErrorKind::InvalidLValue => "PA005",
            ParserErrorKind::InvalidPattern(_) => "PA006",
            ParserErrorKind::IntegerOverflow => "PA007",
            ParserErrorKind::LexicalError(_) => "LX001",
        }
    }
}
