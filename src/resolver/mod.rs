mod error;
pub mod formatter;

use crate::{
    parser::{
        expression::{Expression, ExpressionAtom, ExpressionAtomKind, ExpressionNode},
        statement::{AttributeSlot, ClassDef, FunctionDef, Pattern, Statement, StatementKind},
        Module,
    },
    string::IdentName,
    value::operator::{resolve_binary, resolve_compare, resolve_unary},
};
pub use error::{ResolutionError, ResolutionErrorKind};
use std::rc::Rc;

#[derive(Clone, Copy, PartialEq, Eq)]
enum FunctionEnvironment {
    None,
    Function,
    Class,
}

/// The method currently being resolved: its receiver name and the class
/// whose layout `self.<name>` stores extend.
#[derive(Clone)]
struct Receiver {
    name: IdentName,
    class: usize,
}

/// Fills the tree's resolution cells: operators, generator flags and class
/// layouts. Reports every misplaced `return`, `yield`, `break` and `continue`.
pub struct Resolver {
    errors: Vec<ResolutionError>,
    function: FunctionEnvironment,
    loop_depth: usize,
    yielded: bool,
    layouts: Vec<Vec<IdentName>>,
    receiver: Option<Receiver>,
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new()
    }
}

impl Resolver {
    pub fn new() -> Self {
        Self {
            errors: Vec::new(),
            function: FunctionEnvironment::None,
            loop_depth: 0,
            yielded: false,
            layouts: Vec::new(),
            receiver: None,
        }
    }

    pub fn resolve(mut self, module: &Module) -> Result<(), Vec<ResolutionError>> {
        self.resolve_body(&module.body);
        self.finish()
    }

    pub fn resolve_expression(mut self, expr: &Expression) -> Result<(), Vec<ResolutionError>> {
        let line = expr.get_line(&expr.get_root_ref()).unwrap_or(0);
        self.visit_expression(expr, line);
        self.finish()
    }

    fn finish(self) -> Result<(), Vec<ResolutionError>> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self.errors)
        }
    }

    fn report(&mut self, kind: ResolutionErrorKind, line: u32) {
        self.errors.push(ResolutionError { kind, line });
    }
}

// Statements
impl Resolver {
    fn resolve_body(&mut self, body: &[Statement]) {
        for statement in body {
            self.resolve_statement(statement);
        }
    }

    fn resolve_loop_body(&mut self, body: &[Statement]) {
        self.loop_depth += 1;
        self.resolve_body(body);
        self.loop_depth -= 1;
    }

    fn resolve_statement(&mut self, statement: &Statement) {
        let line = statement.line;
        match &statement.kind {
            StatementKind::Expression(expr) => self.visit_expression(expr, line),
            StatementKind::Assign { targets, value } => {
                self.visit_expression(value, line);
                for target in targets {
                    self.visit_expression(target, line);
                    self.record_store(target);
                }
            }
            StatementKind::AugAssign {
                target,
                operator,
                value,
                resolved,
            } => {
                resolved.get_or_init(|| resolve_binary(*operator));
                self.visit_expression(target, line);
                self.visit_expression(value, line);
                self.record_store(target);
            }
            StatementKind::AnnAssign { target, value, .. } => {
                self.visit_expression(target, line);
                if let Some(value) = value {
                    self.visit_expression(value, line);
                }
                self.record_store(target);
                if self.function == FunctionEnvironment::Class {
                    if let (Some(name), Some(layout)) =
                        (target.get_identifier(), self.layouts.last_mut())
                    {
                        push_unique(layout, name);
                    }
                }
            }
            StatementKind::Pass | StatementKind::Import(_) | StatementKind::ImportFrom { .. } => {}
            StatementKind::Break => {
                if self.loop_depth == 0 {
                    self.report(ResolutionErrorKind::NonLoopBreak, line);
                }
            }
            StatementKind::Continue => {
                if self.loop_depth == 0 {
                    self.report(ResolutionErrorKind::NonLoopContinue, line);
                }
            }
            StatementKind::Return(value) => {
                if self.function != FunctionEnvironment::Function {
                    self.report(ResolutionErrorKind::NonFunctionReturn, line);
                }
                if let Some(value) = value {
                    self.visit_expression(value, line);
                }
            }
            StatementKind::Raise { exception, cause } => {
                for expr in exception.iter().chain(cause.iter()) {
                    self.visit_expression(expr, line);
                }
            }
            StatementKind::Assert { test, message } => {
                self.visit_expression(test, line);
                if let Some(message) = message {
                    self.visit_expression(message, line);
                }
            }
            StatementKind::If(stmt) => {
                self.visit_expression(&stmt.test, line);
                self.resolve_body(&stmt.body);
                self.resolve_body(&stmt.orelse);
            }
            StatementKind::While(stmt) => {
                self.visit_expression(&stmt.test, line);
                self.resolve_loop_body(&stmt.body);
                self.resolve_body(&stmt.orelse);
            }
            StatementKind::For(stmt) => {
                self.visit_expression(&stmt.iter, line);
                self.visit_expression(&stmt.target, line);
                self.record_store(&stmt.target);
                self.resolve_loop_body(&stmt.body);
                self.resolve_body(&stmt.orelse);
            }
            StatementKind::Try(stmt) => {
                self.resolve_body(&stmt.body);
                for handler in stmt.handlers.iter() {
                    if let Some(kind) = &handler.kind {
                        self.visit_expression(kind, handler.line);
                    }
                    self.resolve_body(&handler.body);
                }
                self.resolve_body(&stmt.orelse);
                self.resolve_body(&stmt.finalbody);
            }
            StatementKind::With(stmt) => {
                for item in stmt.items.iter() {
                    self.visit_expression(&item.context, line);
                    if let Some(target) = &item.target {
                        self.visit_expression(target, line);
                        self.record_store(target);
                    }
                }
                self.resolve_body(&stmt.body);
            }
            StatementKind::Match(stmt) => {
                self.visit_expression(&stmt.subject, line);
                for case in stmt.cases.iter() {
                    self.visit_pattern(&case.pattern, line);
                    if let Some(guard) = &case.guard {
                        self.visit_expression(guard, line);
                    }
                    self.resolve_body(&case.body);
                }
            }
            StatementKind::FunctionDef(def) => self.resolve_function(def),
            StatementKind::ClassDef(def) => self.resolve_class(def),
        }
    }

    fn resolve_function(&mut self, def: &Rc<FunctionDef>) {
        for parameter in def.parameters.iter() {
            if let Some(default) = &parameter.default {
                self.visit_expression(default, def.line);
            }
        }

        // Methods record `self.<name>` stores into the class layout; nested
        // functions do not.
        let receiver = match (self.function, def.parameters.first()) {
            (FunctionEnvironment::Class, Some(first)) => {
                self.layouts.len().checked_sub(1).map(|class| Receiver {
                    name: first.name.clone(),
                    class,
                })
            }
            _ => None,
        };

        let enclosing = self.function;
        let enclosing_loops = std::mem::take(&mut self.loop_depth);
        let enclosing_yield = std::mem::take(&mut self.yielded);
        let enclosing_receiver = std::mem::replace(&mut self.receiver, receiver);
        self.function = FunctionEnvironment::Function;

        self.resolve_body(&def.body);
        def.is_generator.set(self.yielded);

        self.function = enclosing;
        self.loop_depth = enclosing_loops;
        self.yielded = enclosing_yield;
        self.receiver = enclosing_receiver;
    }

    fn resolve_class(&mut self, def: &Rc<ClassDef>) {
        for base in def.bases.iter() {
            self.visit_expression(base, def.line);
        }

        let enclosing = self.function;
        let enclosing_loops = std::mem::take(&mut self.loop_depth);
        let enclosing_receiver = self.receiver.take();
        self.function = FunctionEnvironment::Class;
        self.layouts.push(Vec::new());

        self.resolve_body(&def.body);

        let names = self.layouts.pop().unwrap_or_default();
        let layout: Rc<[AttributeSlot]> = names
            .into_iter()
            .enumerate()
            .map(|(offset, name)| AttributeSlot {
                name,
                offset: offset as u32,
            })
            .collect();
        // A class body resolved twice keeps its first layout.
        let _ = def.layout.set(layout);

        self.function = enclosing;
        self.loop_depth = enclosing_loops;
        self.receiver = enclosing_receiver;
    }

    /// Adds `self.<name>` stores inside a method to its class layout.
    fn record_store(&mut self, target: &Expression) {
        let Some(receiver) = self.receiver.clone() else {
            return;
        };
        for node in target.nodes.iter() {
            let ExpressionNode::Attribute { value, name } = node else {
                continue;
            };
            let is_receiver = matches!(
                target.get_node(value),
                Some(ExpressionNode::Atom(ExpressionAtom {
                    kind: ExpressionAtomKind::Identifier(object),
                    ..
                })) if *object == receiver.name
            );
            if is_receiver {
                if let Some(layout) = self.layouts.get_mut(receiver.class) {
                    push_unique(layout, name);
                }
            }
        }
    }
}

// Expressions
impl Resolver {
    /// Expressions are flat arenas, so every node can be visited in order.
    fn visit_expression(&mut self, expr: &Expression, line: u32) {
        for node in expr.nodes.iter() {
            match node {
                ExpressionNode::Unary {
                    operator, resolved, ..
                } => {
                    resolved.get_or_init(|| resolve_unary(*operator));
                }
                ExpressionNode::Binary {
                    operator, resolved, ..
                } => {
                    resolved.get_or_init(|| resolve_binary(*operator));
                }
                ExpressionNode::Compare { links, .. } => {
                    for link in links {
                        link.resolved.get_or_init(|| resolve_compare(link.operator));
                    }
                }
                ExpressionNode::Yield { line: at, .. } => {
                    let at = if *at == 0 { line } else { *at };
                    match self.function {
                        FunctionEnvironment::Function => self.yielded = true,
                        FunctionEnvironment::Class => {
                            self.report(ResolutionErrorKind::ClassBodyYield, at)
                        }
                        FunctionEnvironment::None => {
                            self.report(ResolutionErrorKind::NonFunctionYield, at)
                        }
                    }
                }
                _ => {}
            }
        }
    }

    fn visit_pattern(&mut self, pattern: &Pattern, line: u32) {
        match pattern {
            Pattern::Wildcard | Pattern::Capture(_) | Pattern::Star(_) => {}
            Pattern::Value(expr) => self.visit_expression(expr, line),
            Pattern::Sequence(patterns) | Pattern::Or(patterns) => {
                for pattern in patterns {
                    self.visit_pattern(pattern, line);
                }
            }
            Pattern::As { pattern, .. } => self.visit_pattern(pattern, line),
            Pattern::Class {
                class,
                positional,
                keywords,
            } => {
                self.visit_expression(class, line);
                for pattern in positional.iter().chain(keywords.iter().map(|(_, p)| p)) {
                    self.visit_pattern(pattern, line);
                }
            }
        }
    }
}

fn push_unique(layout: &mut Vec<IdentName>, name: &IdentName) {
    if !layout.contains(name) {
        layout.push(name.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;

    fn resolve(source: &str) -> (Module, Result<(), Vec<ResolutionError>>) {
        let module = Parser::new(source).parse().expect("valid source");
        let result = Resolver::new().resolve(&module);
        (module, result)
    }

    fn kinds(source: &str) -> Vec<ResolutionErrorKind> {
        match resolve(source).1 {
            Ok(()) => Vec::new(),
            Err(errors) => errors.into_iter().map(|error| error.kind).collect(),
        }
    }

    #[test]
    fn marks_only_yielding_functions_as_generators() {
        let source = "def gen():\n    yield 1\n\ndef plain():\n    def inner():\n        yield 2\n    return inner\n";
        let (module, result) = resolve(source);
        assert!(result.is_ok());
        let flags: Vec<bool> = module
            .body
            .iter()
            .filter_map(|statement| match &statement.kind {
                StatementKind::FunctionDef(def) => Some(def.is_generator.get()),
                _ => None,
            })
            .collect();
        assert_eq!(flags, vec![true, false]);
    }

    #[test]
    fn collects_annotations_and_receiver_stores_into_the_layout() {
        let source = "class Point:\n    tag: str = 'p'\n    def __init__(self, x, y):\n        self.x = x\n        self.y = y\n        self.x = 0\n";
        let (module, result) = resolve(source);
        assert!(result.is_ok());
        let StatementKind::ClassDef(def) = &module.body[0].kind else {
            panic!("expected a class");
        };
        let names: Vec<String> = def
            .layout
            .get()
            .expect("layout resolved")
            .iter()
            .map(|slot| slot.name.to_string())
            .collect();
        assert_eq!(names, vec!["tag", "x", "y"]);
    }

    #[test]
    fn reports_every_misplaced_statement() {
        let source = "return 1\nbreak\ncontinue\nclass A:\n    x = yield 3\n";
        assert_eq!(
            kinds(source),
            vec![
                ResolutionErrorKind::NonFunctionReturn,
                ResolutionErrorKind::NonLoopBreak,
                ResolutionErrorKind::NonLoopContinue,
                ResolutionErrorKind::ClassBodyYield,
            ]
        );
    }

    #[test]
    fn loop_depth_does_not_leak_into_functions() {
        let source = "while True:\n    def f():\n        break\n    break\n";
        assert_eq!(kinds(source), vec![ResolutionErrorKind::NonLoopBreak]);
    }
}
