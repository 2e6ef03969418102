use super::expression::{BinaryOperator, Expression};
use crate::string::IdentName;
use crate::value::operator::ResolvedBinary;
use std::cell::{Cell, OnceCell};
use std::rc::Rc;

/// A statement list. Shared so execution blocks can hold on to it while suspended.
pub type Body = Rc<[Statement]>;

#[derive(Debug, Clone)]
pub struct Statement {
    pub kind: StatementKind,
    pub line: u32,
}

#[derive(Debug, Clone)]
pub enum StatementKind {
    Expression(Expression),
    Assign {
        targets: Vec<Expression>,
        value: Expression,
    },
    AugAssign {
        target: Expression,
        operator: BinaryOperator,
        value: Expression,
        resolved: OnceCell<ResolvedBinary>,
    },
    AnnAssign {
        target: Expression,
        annotation: Expression,
        value: Option<Expression>,
    },
    Pass,
    Break,
    Continue,
    Return(Option<Expression>),
    Raise {
        exception: Option<Expression>,
        cause: Option<Expression>,
    },
    Assert {
        test: Expression,
        message: Option<Expression>,
    },
    If(IfStatement),
    While(WhileStatement),
    For(ForStatement),
    Try(Rc<TryStatement>),
    With(WithStatement),
    Match(MatchStatement),
    FunctionDef(Rc<FunctionDef>),
    ClassDef(Rc<ClassDef>),
    /// `import a, b as c`
    Import(Vec<ImportAlias>),
    /// `from a import b, c as d`
    ImportFrom {
        module: IdentName,
        names: Vec<ImportAlias>,
    },
}

#[derive(Debug, Clone)]
pub struct ImportAlias {
    pub name: IdentName,
    pub alias: Option<IdentName>,
}

impl ImportAlias {
    /// The name the import binds in the current scope.
    pub fn binding(&self) -> &IdentName {
        self.alias.as_ref().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone)]
pub struct IfStatement {
    pub test: Expression,
    pub body: Body,
    /// `elif` chains are nested `If` statements in here.
    pub orelse: Body,
}

#[derive(Debug, Clone)]
pub struct WhileStatement {
    pub test: Expression,
    pub body: Body,
    pub orelse: Body,
}

#[derive(Debug, Clone)]
pub struct ForStatement {
    pub target: Expression,
    pub iter: Expression,
    pub body: Body,
    pub orelse: Body,
}

#[derive(Debug, Clone)]
pub struct ExceptHandler {
    pub kind: Option<Expression>,
    pub name: Option<IdentName>,
    pub body: Body,
    pub line: u32,
}

#[derive(Debug, Clone)]
pub struct TryStatement {
    pub body: Body,
    pub handlers: Vec<ExceptHandler>,
    pub orelse: Body,
    pub finalbody: Body,
}

#[derive(Debug, Clone)]
pub struct WithItem {
    pub context: Expression,
    pub target: Option<Expression>,
}

#[derive(Debug, Clone)]
pub struct WithStatement {
    pub items: Vec<WithItem>,
    pub body: Body,
}

#[derive(Debug, Clone)]
pub enum Pattern {
    /// `_`
    Wildcard,
    /// A bare name binds the subject.
    Capture(IdentName),
    /// Literals and dotted names compare by equality.
    Value(Expression),
    Sequence(Vec<Pattern>),
    /// `*rest` inside a sequence pattern; `*_` binds nothing.
    Star(Option<IdentName>),
    Or(Vec<Pattern>),
    As {
        pattern: Box<Pattern>,
        name: IdentName,
    },
    Class {
        class: Expression,
        positional: Vec<Pattern>,
        keywords: Vec<(IdentName, Pattern)>,
    },
}

#[derive(Debug, Clone)]
pub struct MatchCase {
    pub pattern: Pattern,
    pub guard: Option<Expression>,
    pub body: Body,
}

#[derive(Debug, Clone)]
pub struct MatchStatement {
    pub subject: Expression,
    pub cases: Vec<MatchCase>,
}

#[derive(Debug, Clone)]
pub struct Parameter {
    pub name: IdentName,
    pub annotation: Option<Expression>,
    pub default: Option<Expression>,
}

#[derive(Debug)]
pub struct FunctionDef {
    pub name: IdentName,
    pub parameters: Vec<Parameter>,
    pub returns: Option<Expression>,
    pub body: Body,
    pub line: u32,
    /// Set by the resolver when the body yields.
    pub is_generator: Cell<bool>,
}

/// One attribute slot of a class layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeSlot {
    pub name: IdentName,
    pub offset: u32,
}

#[derive(Debug)]
pub struct ClassDef {
    pub name: IdentName,
    pub bases: Vec<Expression>,
    pub body: Body,
    pub line: u32,
    /// Filled by the resolver: the attributes this class declares itself.
    pub layout: OnceCell<Rc<[AttributeSlot]>>,
}
