use std::fmt::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Minus,
    Plus,
    Not,
}

impl UnaryOperator {
    pub fn get_binding_power(&self) -> u8 {
        match self {
            // Logical not sits between `and` and the comparisons.
            UnaryOperator::Not => 7,
            // Arithmetic sign binds tighter than everything but `**` and postfix.
            UnaryOperator::Minus | UnaryOperator::Plus => 15,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            UnaryOperator::Minus => "-",
            UnaryOperator::Plus => "+",
            UnaryOperator::Not => "not",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
    FloorDivide,
    Modulo,
    Power,
}

impl BinaryOperator {
    pub fn get_binding_power(&self) -> (u8, u8) {
        match self {
            // Power is right associative and binds tighter than unary minus on its left.
            Self::Power => (18, 17),
            Self::Multiply | Self::Divide | Self::FloorDivide | Self::Modulo => (13, 14),
            Self::Add | Self::Subtract => (11, 12),
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Subtract => "-",
            Self::Multiply => "*",
            Self::Divide => "/",
            Self::FloorDivide => "//",
            Self::Modulo => "%",
            Self::Power => "**",
        }
    }
}

impl Display for BinaryOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolOperator {
    And,
    Or,
}

impl BoolOperator {
    pub fn get_binding_power(&self) -> (u8, u8) {
        match self {
            Self::And => (5, 6),
            Self::Or => (3, 4),
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Self::And => "and",
            Self::Or => "or",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOperator {
    LessThan,
    LessThanEqual,
    GreaterThan,
    GreaterThanEqual,
    Equal,
    NotEqual,
    Is,
    IsNot,
    In,
    NotIn,
}

impl CompareOperator {
    /// Every link of a comparison chain shares one binding power.
    pub const BINDING_POWER: (u8, u8) = (9, 10);

    pub fn symbol(&self) -> &'static str {
        match self {
            Self::LessThan => "<",
            Self::LessThanEqual => "<=",
            Self::GreaterThan => ">",
            Self::GreaterThanEqual => ">=",
            Self::Equal => "==",
            Self::NotEqual => "!=",
            Self::Is => "is",
            Self::IsNot => "is not",
            Self::In => "in",
            Self::NotIn => "not in",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostfixOperator {
    Call,
    Attribute,
    Subscript,
}

impl PostfixOperator {
    pub fn get_binding_power(&self) -> u8 {
        19
    }
}

/// Binding power of the `a if cond else b` conditional.
pub const TERNARY_BINDING_POWER: u8 = 2;
