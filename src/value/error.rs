use super::TypeTag;
use thiserror::Error;

/// A payload was read through the wrong accessor.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Expected a value tagged {expected:?} but it is tagged {actual:?}.")]
pub struct CastError {
    pub expected: TypeTag,
    pub actual: TypeTag,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OperatorError {
    #[error("unsupported operand type(s) for {symbol}: '{lhs}' and '{rhs}'")]
    Unsupported {
        symbol: &'static str,
        lhs: String,
        rhs: String,
    },
    #[error("bad operand type for unary {symbol}: '{operand}'")]
    BadOperand {
        symbol: &'static str,
        operand: String,
    },
    #[error("division by zero")]
    ZeroDivision,
    #[error("integer overflow in {0}")]
    Overflow(&'static str),
}

impl OperatorError {
    pub fn code(&self) -> &'static str {
        match self {
            OperatorError::Unsupported { .. } => "OP001",
            OperatorError::BadOperand { .. } => "OP002",
            OperatorError::ZeroDivision => "OP003",
            OperatorError::Overflow(_) => "OP004",
        }
    }
}
