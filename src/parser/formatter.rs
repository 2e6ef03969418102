use super::{
    expression::{Expression, ExpressionAtomKind, ExpressionNode, ExpressionNodeRef},
    statement::{ImportAlias, Pattern, Statement, StatementKind},
    Module, ParserError, ParserErrorKind,
};
use crate::lexer::{
    formatter::{LineFormatter, PrettyFormatter, TokenFormatter, ARIADNE_MSG, ARIADNE_WRITE_MSG},
    LineBreaks,
};
use ariadne::{Color, Label, Report, ReportKind, Source};
use std::{fmt::Write, path::Path};

const WRITE_FMT_MSG: &str = "Encountered an error while attempting to write format string to buffer.";

pub trait ExpressionFormatter {
    fn format(&self, tree: &Expression) -> String;
}

pub struct DebugExpressionFormatter;

impl ExpressionFormatter for DebugExpressionFormatter {
    fn format(&self, tree: &Expression) -> String {
        format!("{tree:?}")
    }
}

pub struct SExpressionFormatter;

impl SExpressionFormatter {
    fn format_atom(kind: &ExpressionAtomKind) -> String {
        match kind {
            ExpressionAtomKind::Integer(v) => format!("{v}"),
            ExpressionAtomKind::Float(v) => format!("{v:?}"),
            ExpressionAtomKind::Bool(true) => "True".into(),
            ExpressionAtomKind::Bool(false) => "False".into(),
            ExpressionAtomKind::None => "None".into(),
            ExpressionAtomKind::Identifier(name) => format!("{name}"),
            ExpressionAtomKind::StringLiteral(v) => format!("{v:?}"),
        }
    }

    fn format_list(tree: &Expression, head: &str, nodes: &[ExpressionNodeRef]) -> String {
        let mut buffer = format!("({head}");
        for node in nodes {
            write!(buffer, " {}", Self::format_node(tree, node)).expect(WRITE_FMT_MSG);
        }
        buffer.push(')');
        buffer
    }

    pub fn format_node(tree: &Expression, node: &ExpressionNodeRef) -> String {
        let Some(current_node) = tree.get_node(node) else {
            return "<dangling>".into();
        };

        match current_node {
            ExpressionNode::Atom(atom) => Self::format_atom(&atom.kind),
            ExpressionNode::Group { inner } => {
                format!("(group {})", Self::format_node(tree, inner))
            }
            ExpressionNode::Unary { operator, rhs, .. } => {
                format!("({} {})", operator.symbol(), Self::format_node(tree, rhs))
            }
            ExpressionNode::Binary {
                operator, lhs, rhs, ..
            } => format!(
                "({} {} {})",
                operator.symbol(),
                Self::format_node(tree, lhs),
                Self::format_node(tree, rhs)
            ),
            ExpressionNode::BoolOp { operator, lhs, rhs } => format!(
                "({} {} {})",
                operator.symbol(),
                Self::format_node(tree, lhs),
                Self::format_node(tree, rhs)
            ),
            ExpressionNode::Compare { first, links } => {
                let mut buffer = format!("(compare {}", Self::format_node(tree, first));
                for link in links {
                    write!(
                        buffer,
                        " {} {}",
                        link.operator.symbol(),
                        Self::format_node(tree, &link.rhs)
                    )
                    .expect(WRITE_FMT_MSG);
                }
                buffer.push(')');
                buffer
            }
            ExpressionNode::IfExp { test, body, orelse } => format!(
                "(if {} {} {})",
                Self::format_node(tree, test),
                Self::format_node(tree, body),
                Self::format_node(tree, orelse)
            ),
            ExpressionNode::Call {
                callee,
                arguments,
                keywords,
                ..
            } => {
                let mut buffer = format!("(call {}", Self::format_node(tree, callee));
                for argument in arguments {
                    write!(buffer, " {}", Self::format_node(tree, argument)).expect(WRITE_FMT_MSG);
                }
                for keyword in keywords {
                    write!(
                        buffer,
                        " (= {} {})",
                        keyword.name,
                        Self::format_node(tree, &keyword.value)
                    )
                    .expect(WRITE_FMT_MSG);
                }
                buffer.push(')');
                buffer
            }
            ExpressionNode::Attribute { value, name } => {
                format!("(. {} {name})", Self::format_node(tree, value))
            }
            ExpressionNode::Subscript { value, index } => format!(
                "([] {} {})",
                Self::format_node(tree, value),
                Self::format_node(tree, index)
            ),
            ExpressionNode::Tuple { elements, .. } => Self::format_list(tree, "tuple", elements),
            ExpressionNode::List { elements, .. } => Self::format_list(tree, "list", elements),
            ExpressionNode::Yield { value, .. } => match value {
                Some(value) => format!("(yield {})", Self::format_node(tree, value)),
                None => "(yield)".into(),
            },
        }
    }
}

impl ExpressionFormatter for SExpressionFormatter {
    fn format(&self, tree: &Expression) -> String {
        Self::format_node(tree, &tree.get_root_ref())
    }
}

/// Renders a whole module as indented s-expressions, one statement per line.
pub struct ModuleFormatter;

impl ModuleFormatter {
    pub fn format(&self, module: &Module) -> String {
        let mut buffer = String::new();
        for statement in module.iter() {
            Self::format_statement(&mut buffer, statement, 0);
        }
        buffer
    }

    fn expr(expression: &Expression) -> String {
        SExpressionFormatter.format(expression)
    }

    fn pattern(pattern: &Pattern) -> String {
        match pattern {
            Pattern::Wildcard => "_".into(),
            Pattern::Capture(name) => format!("{name}"),
            Pattern::Value(value) => Self::expr(value),
            Pattern::Sequence(patterns) => {
                let inner: Vec<_> = patterns.iter().map(Self::pattern).collect();
                format!("[{}]", inner.join(", "))
            }
            Pattern::Star(Some(name)) => format!("*{name}"),
            Pattern::Star(None) => "*_".into(),
            Pattern::Or(patterns) => {
                let inner: Vec<_> = patterns.iter().map(Self::pattern).collect();
                format!("(or {})", inner.join(" "))
            }
            Pattern::As { pattern, name } => format!("(as {} {name})", Self::pattern(pattern)),
            Pattern::Class {
                class,
                positional,
                keywords,
            } => {
                let mut inner: Vec<_> = positional.iter().map(Self::pattern).collect();
                inner.extend(
                    keywords
                        .iter()
                        .map(|(name, pattern)| format!("{name}={}", Self::pattern(pattern))),
                );
                format!("({} {})", Self::expr(class), inner.join(" "))
            }
        }
    }

    fn aliases(names: &[ImportAlias]) -> String {
        names
            .iter()
            .map(|alias| match alias.alias {
                Some(ref binding) => format!("{} as {binding}", alias.name),
                None => alias.name.to_string(),
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn line(buffer: &mut String, depth: usize, text: &str) {
        writeln!(buffer, "{}{text}", "  ".repeat(depth)).expect(WRITE_FMT_MSG);
    }

    fn body(buffer: &mut String, header: &str, body: &[Statement], depth: usize) {
        if body.is_empty() {
            return;
        }
        Self::line(buffer, depth, header);
        for statement in body {
            Self::format_statement(buffer, statement, depth + 1);
        }
    }

    fn format_statement(buffer: &mut String, statement: &Statement, depth: usize) {
        match &statement.kind {
            StatementKind::Expression(value) => Self::line(buffer, depth, &Self::expr(value)),
            StatementKind::Assign { targets, value } => {
                let targets: Vec<_> = targets.iter().map(Self::expr).collect();
                let text = format!("(= {} {})", targets.join(" "), Self::expr(value));
                Self::line(buffer, depth, &text);
            }
            StatementKind::AugAssign {
                target,
                operator,
                value,
                ..
            } => {
                let text = format!(
                    "({}= {} {})",
                    operator.symbol(),
                    Self::expr(target),
                    Self::expr(value)
                );
                Self::line(buffer, depth, &text);
            }
            StatementKind::AnnAssign {
                target,
                annotation,
                value,
            } => {
                let value = value.as_ref().map(Self::expr).unwrap_or_default();
                let text = format!("(: {} {} {value})", Self::expr(target), Self::expr(annotation));
                Self::line(buffer, depth, text.trim_end());
            }
            StatementKind::Pass => Self::line(buffer, depth, "(pass)"),
            StatementKind::Break => Self::line(buffer, depth, "(break)"),
            StatementKind::Continue => Self::line(buffer, depth, "(continue)"),
            StatementKind::Return(value) => {
                let text = match value {
                    Some(value) => format!("(return {})", Self::expr(value)),
                    None => "(return)".into(),
                };
                Self::line(buffer, depth, &text);
            }
            StatementKind::Raise { exception, cause } => {
                let mut text = String::from("(raise");
                if let Some(exception) = exception {
                    write!(text, " {}", Self::expr(exception)).expect(WRITE_FMT_MSG);
                }
                if let Some(cause) = cause {
                    write!(text, " from {}", Self::expr(cause)).expect(WRITE_FMT_MSG);
                }
                text.push(')');
                Self::line(buffer, depth, &text);
            }
            StatementKind::Assert { test, message } => {
                let text = match message {
                    Some(message) => format!("(assert {} {})", Self::expr(test), Self::expr(message)),
                    None => format!("(assert {})", Self::expr(test)),
                };
                Self::line(buffer, depth, &text);
            }
            StatementKind::If(stmt) => {
                Self::line(buffer, depth, &format!("(if {})", Self::expr(&stmt.test)));
                Self::body(buffer, "then:", &stmt.body, depth + 1);
                Self::body(buffer, "else:", &stmt.orelse, depth + 1);
            }
            StatementKind::While(stmt) => {
                Self::line(buffer, depth, &format!("(while {})", Self::expr(&stmt.test)));
                Self::body(buffer, "do:", &stmt.body, depth + 1);
                Self::body(buffer, "else:", &stmt.orelse, depth + 1);
            }
            StatementKind::For(stmt) => {
                let text = format!(
                    "(for {} {})",
                    Self::expr(&stmt.target),
                    Self::expr(&stmt.iter)
                );
                Self::line(buffer, depth, &text);
                Self::body(buffer, "do:", &stmt.body, depth + 1);
                Self::body(buffer, "else:", &stmt.orelse, depth + 1);
            }
            StatementKind::Try(stmt) => {
                Self::line(buffer, depth, "(try)");
                Self::body(buffer, "body:", &stmt.body, depth + 1);
                for handler in stmt.handlers.iter() {
                    let kind = handler.kind.as_ref().map(Self::expr).unwrap_or_default();
                    let header = match handler.name {
                        Some(ref name) => format!("except {kind} as {name}:"),
                        None => format!("except {kind}:"),
                    };
                    Self::body(buffer, &header, &handler.body, depth + 1);
                }
                Self::body(buffer, "else:", &stmt.orelse, depth + 1);
                Self::body(buffer, "finally:", &stmt.finalbody, depth + 1);
            }
            StatementKind::With(stmt) => {
                let items: Vec<_> = stmt
                    .items
                    .iter()
                    .map(|item| match item.target {
                        Some(ref target) => {
                            format!("{} as {}", Self::expr(&item.context), Self::expr(target))
                        }
                        None => Self::expr(&item.context),
                    })
                    .collect();
                Self::line(buffer, depth, &format!("(with {})", items.join(", ")));
                Self::body(buffer, "do:", &stmt.body, depth + 1);
            }
            StatementKind::Match(stmt) => {
                Self::line(buffer, depth, &format!("(match {})", Self::expr(&stmt.subject)));
                for case in stmt.cases.iter() {
                    let header = match case.guard {
                        Some(ref guard) => format!(
                            "case {} if {}:",
                            Self::pattern(&case.pattern),
                            Self::expr(guard)
                        ),
                        None => format!("case {}:", Self::pattern(&case.pattern)),
                    };
                    Self::body(buffer, &header, &case.body, depth + 1);
                }
            }
            StatementKind::FunctionDef(def) => {
                let parameters: Vec<_> = def.parameters.iter().map(|p| p.name.to_string()).collect();
                let text = format!("(def {} ({}))", def.name, parameters.join(" "));
                Self::line(buffer, depth, &text);
                for statement in def.body.iter() {
                    Self::format_statement(buffer, statement, depth + 1);
                }
            }
            StatementKind::ClassDef(def) => {
                let bases: Vec<_> = def.bases.iter().map(Self::expr).collect();
                let text = format!("(class {} ({}))", def.name, bases.join(" "));
                Self::line(buffer, depth, &text);
                for statement in def.body.iter() {
                    Self::format_statement(buffer, statement, depth + 1);
                }
            }
            StatementKind::Import(names) => {
                let text = format!("(import {})", Self::aliases(names));
                Self::line(buffer, depth, &text);
            }
            StatementKind::ImportFrom { module, names } => {
                let text = format!("(from {module} import {})", Self::aliases(names));
                Self::line(buffer, depth, &text);
            }
        }
    }
}

pub trait ParserFormatter {
    fn format_error(&self, error: &ParserError) -> String;
}

pub struct DebugParserFormatter;

impl ParserFormatter for DebugParserFormatter {
    fn format_error(&self, error: &ParserError) -> String {
        format!("{error:?}")
    }
}

pub struct BasicParserFormatter<'src> {
    token_formatter: LineFormatter<'src>,
}

impl<'src> BasicParserFormatter<'src> {
    pub fn new(text: &'src str) -> Self {
        Self {
            token_formatter: LineFormatter::new(text),
        }
    }

    pub fn get_line_breaks(&self) -> &LineBreaks {
        self.token_formatter.get_line_breaks()
    }
}

impl<'src> ParserFormatter for BasicParserFormatter<'src> {
    fn format_error(&self, error: &ParserError) -> String {
        match &error.kind {
            ParserErrorKind::LexicalError(inner) => self.token_formatter.format_error(inner),
            kind => format!("({}) {kind}", error.line),
        }
    }
}

pub struct PrettyParserFormatter<'src> {
    token_formatter: PrettyFormatter<'src>,
    line_breaks: LineBreaks,
}

impl<'src> PrettyParserFormatter<'src> {
    pub fn new(text: &'src str, path: &'src Path) -> Self {
        Self {
            token_formatter: PrettyFormatter::new(text, path),
            line_breaks: LineBreaks::new(text),
        }
    }
}

impl<'src> ParserFormatter for PrettyParserFormatter<'src> {
    fn format_error(&self, error: &ParserError) -> String {
        if let ParserErrorKind::LexicalError(inner) = &error.kind {
            return self.token_formatter.format_error(inner);
        }
        let text = self.token_formatter.get_text();
        let path = &self.token_formatter.get_path().to_string_lossy();
        let span = self.line_breaks.get_line_range(text, error.line);
        let mut output = std::io::Cursor::new(Vec::new());
        Report::build(ReportKind::Error, (path, span.clone()))
            .with_code(error.code())
            .with_message("Failed to parse")
            .with_label(
                Label::new((path, span))
                    .with_message(format!("{}", error.kind))
                    .with_color(Color::BrightRed),
            )
            .finish()
            .write((path, Source::from(text)), &mut output)
            .expect(ARIADNE_WRITE_MSG);
        String::from_utf8(output.into_inner()).expect(ARIADNE_MSG)
    }
}
