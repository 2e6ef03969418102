use super::{BinaryOperator, BoolOperator, CompareOperator, UnaryOperator};
use crate::string::IdentName;
use crate::value::operator::{ResolvedBinary, ResolvedUnary};
use compact_str::CompactString;
use std::cell::OnceCell;

#[derive(Debug, Clone, PartialEq)]
pub enum ExpressionAtomKind {
    Integer(i64),
    Float(f64),
    Bool(bool),
    None,
    Identifier(IdentName),
    StringLiteral(CompactString),
}

#[derive(Debug, Clone)]
pub struct ExpressionAtom {
    pub kind: ExpressionAtomKind,
    pub line: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpressionNodeRef(pub u32);

/// One `<op> rhs` link in a comparison chain such as `a < b <= c`.
#[derive(Debug, Clone)]
pub struct ComparisonLink {
    pub operator: CompareOperator,
    pub rhs: ExpressionNodeRef,
    pub resolved: OnceCell<ResolvedBinary>,
}

#[derive(Debug, Clone)]
pub struct KeywordArgument {
    pub name: IdentName,
    pub value: ExpressionNodeRef,
}

#[derive(Debug, Clone)]
pub enum ExpressionNode {
    Atom(ExpressionAtom),
    Group {
        inner: ExpressionNodeRef,
    },
    Unary {
        operator: UnaryOperator,
        rhs: ExpressionNodeRef,
        resolved: OnceCell<ResolvedUnary>,
    },
    Binary {
        operator: BinaryOperator,
        lhs: ExpressionNodeRef,
        rhs: ExpressionNodeRef,
        resolved: OnceCell<ResolvedBinary>,
    },
    BoolOp {
        operator: BoolOperator,
        lhs: ExpressionNodeRef,
        rhs: ExpressionNodeRef,
    },
    Compare {
        first: ExpressionNodeRef,
        links: Vec<ComparisonLink>,
    },
    IfExp {
        test: ExpressionNodeRef,
        body: ExpressionNodeRef,
        orelse: ExpressionNodeRef,
    },
    Call {
        callee: ExpressionNodeRef,
        arguments: Vec<ExpressionNodeRef>,
        keywords: Vec<KeywordArgument>,
        line: u32,
    },
    Attribute {
        value: ExpressionNodeRef,
        name: IdentName,
    },
    Subscript {
        value: ExpressionNodeRef,
        index: ExpressionNodeRef,
    },
    Tuple {
        elements: Vec<ExpressionNodeRef>,
        line: u32,
    },
    List {
        elements: Vec<ExpressionNodeRef>,
        line: u32,
    },
    Yield {
        value: Option<ExpressionNodeRef>,
        line: u32,
    },
}

#[derive(Debug, Clone, Default)]
pub struct IncompleteExpression {
    nodes: Vec<ExpressionNode>,
}

impl IncompleteExpression {
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    pub fn push(&mut self, node: ExpressionNode) -> ExpressionNodeRef {
        self.nodes.push(node);
        ExpressionNodeRef(self.nodes.len() as u32 - 1)
    }

    pub fn get_node(&self, index: &ExpressionNodeRef) -> Option<&ExpressionNode> {
        self.nodes.get(index.0 as usize)
    }
}

/// A flattened expression tree; children always precede their parents.
#[derive(Debug, Clone)]
pub struct Expression {
    pub nodes: Vec<ExpressionNode>,
    pub root: ExpressionNodeRef,
}

impl Expression {
    pub fn new(tree: IncompleteExpression, root: ExpressionNodeRef) -> Option<Self> {
        if !(0..tree.nodes.len()).contains(&(root.0 as usize)) {
            None
        } else {
            Some(Self {
                nodes: tree.nodes,
                root,
            })
        }
    }

    pub fn get_root_ref(&self) -> ExpressionNodeRef {
        self.root
    }

    pub fn get_root(&self) -> Option<&ExpressionNode> {
        self.get_node(&self.root)
    }

    pub fn get_node(&self, node: &ExpressionNodeRef) -> Option<&ExpressionNode> {
        self.nodes.get(node.0 as usize)
    }

    pub fn get_line(&self, node: &ExpressionNodeRef) -> Option<u32> {
        match self.get_node(node)? {
            ExpressionNode::Atom(ExpressionAtom { line, .. })
            | ExpressionNode::Call { line, .. }
            | ExpressionNode::Tuple { line, .. }
            | ExpressionNode::List { line, .. }
            | ExpressionNode::Yield { line, .. } => Some(*line),
            ExpressionNode::Group { inner } => self.get_line(inner),
            ExpressionNode::Unary { rhs, .. } => self.get_line(rhs),
            ExpressionNode::Binary { lhs, .. } | ExpressionNode::BoolOp { lhs, .. } => {
                self.get_line(lhs)
            }
            ExpressionNode::Compare { first, .. } => self.get_line(first),
            ExpressionNode::IfExp { body, .. } => self.get_line(body),
            ExpressionNode::Attribute { value, .. } | ExpressionNode::Subscript { value, .. } => {
                self.get_line(value)
            }
        }
    }

    /// The identifier the expression names, if it is a bare name.
    pub fn get_identifier(&self) -> Option<&IdentName> {
        let mut node = self.get_root()?;
        loop {
            match node {
                ExpressionNode::Group { inner } => node = self.get_node(inner)?,
                ExpressionNode::Atom(ExpressionAtom {
                    kind: ExpressionAtomKind::Identifier(name),
                    ..
                }) => return Some(name),
                _ => return None,
            }
        }
    }

    pub fn contains_yield(&self) -> bool {
        self.nodes
            .iter()
            .any(|node| matches!(node, ExpressionNode::Yield { .. }))
    }
}
