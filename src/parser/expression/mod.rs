mod operator;
mod tree;

pub use operator::{
    BinaryOperator, BoolOperator, CompareOperator, PostfixOperator, UnaryOperator,
    TERNARY_BINDING_POWER,
};
pub use tree::{
    ComparisonLink, Expression, ExpressionAtom, ExpressionAtomKind, ExpressionNode,
    ExpressionNodeRef, IncompleteExpression, KeywordArgument,
};
