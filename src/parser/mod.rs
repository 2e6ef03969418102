mod error;
pub mod expression;
pub mod formatter;
mod program;
pub mod statement;

use crate::lexer::{unescape_string, Lexer, Token, TokenKind};
use crate::string::{IdentName, Interner};
pub use error::{ParserError, ParserErrorKind};
use expression::{
    BinaryOperator, BoolOperator, CompareOperator, ComparisonLink, Expression, ExpressionAtom,
    ExpressionAtomKind, ExpressionNode, ExpressionNodeRef, IncompleteExpression, KeywordArgument,
    PostfixOperator, UnaryOperator, TERNARY_BINDING_POWER,
};
pub use program::Module;
use statement::{
    Body, ClassDef, ExceptHandler, ForStatement, FunctionDef, IfStatement, ImportAlias, MatchCase,
    MatchStatement, Parameter, Pattern, Statement, StatementKind, TryStatement, WhileStatement,
    WithItem, WithStatement,
};
use std::cell::{Cell, OnceCell};
use std::rc::Rc;

/// Binding power used for assignment-like targets so that `in` and `=` stay outside them.
const TARGET_BINDING_POWER: u8 = 11;

pub struct Parser<'src> {
    lexer: Lexer<'src>,
    lookahead: Option<Result<Token, ParserError>>,
    interner: Interner,
}

impl<'src> Parser<'src> {
    pub fn new(source: &'src str) -> Self {
        Self {
            lexer: Lexer::new(source),
            lookahead: None,
            interner: Interner::new(),
        }
    }

    pub fn get_source(&self) -> &'src str {
        self.lexer.get_source()
    }

    fn peek(&mut self) -> Result<Token, ParserError> {
        match self.lookahead {
            Some(ref token_or_error) => token_or_error.clone(),
            None => {
                let next_token = self.next_token();
                self.lookahead = Some(next_token.clone());
                next_token
            }
        }
    }

    fn peek_kind(&mut self) -> Result<TokenKind, ParserError> {
        Ok(self.peek()?.kind)
    }

    fn next_token(&mut self) -> Result<Token, ParserError> {
        match self.lookahead.take() {
            Some(token_or_error) => token_or_error,
            None => self.lexer.next_token().map_err(|e| ParserError {
                line: e.line,
                kind: e.into(),
            }),
        }
    }

    fn expect(&mut self, expected: TokenKind) -> Result<Token, ParserError> {
        let next_token = self.next_token()?;
        if next_token.kind != expected {
            Err(ParserError {
                line: next_token.line,
                kind: match next_token.kind {
                    TokenKind::Eof => ParserErrorKind::UnexpectedEof,
                    actual => ParserErrorKind::UnexpectedToken { actual, expected },
                },
            })
        } else {
            Ok(next_token)
        }
    }

    fn eat_if(&mut self, next: TokenKind) -> Result<Option<Token>, ParserError> {
        let next_token = self.peek()?;
        if next_token.kind != next {
            Ok(None)
        } else {
            self.next_token()?;
            Ok(Some(next_token))
        }
    }

    fn lexeme(&self, token: &Token) -> &'src str {
        self.lexer.get_lexeme(&token.span).unwrap_or_default()
    }

    fn intern(&mut self, token: &Token) -> IdentName {
        let lexeme = self.lexeme(token);
        self.interner.intern(lexeme)
    }

    fn expect_identifier(&mut self) -> Result<IdentName, ParserError> {
        let token = self.expect(TokenKind::Ident)?;
        Ok(self.intern(&token))
    }

    fn starts_expression(kind: TokenKind) -> bool {
        matches!(
            kind,
            TokenKind::IntegerLiteral
                | TokenKind::FloatLiteral
                | TokenKind::StringLiteral
                | TokenKind::Ident
                | TokenKind::KeywordTrue
                | TokenKind::KeywordFalse
                | TokenKind::KeywordNone
                | TokenKind::LeftParenthesis
                | TokenKind::LeftBracket
                | TokenKind::Minus
                | TokenKind::Plus
                | TokenKind::KeywordNot
                | TokenKind::KeywordYield
        )
    }
}

// Pratt parser for expressions
impl<'src> Parser<'src> {
    pub fn parse_expression(&mut self) -> Result<Expression, ParserError> {
        let mut tree = IncompleteExpression::new();
        let root = self.parse_expression_pratt(0, &mut tree)?;
        Self::finish_expression(tree, root)
    }

    /// Parses `a, b, c` as a tuple and a lone `a` as itself.
    pub fn parse_expression_list(&mut self) -> Result<Expression, ParserError> {
        let mut tree = IncompleteExpression::new();
        let root = self.parse_expression_list_into(0, &mut tree)?;
        Self::finish_expression(tree, root)
    }

    fn parse_target_list(&mut self) -> Result<Expression, ParserError> {
        let mut tree = IncompleteExpression::new();
        let root = self.parse_expression_list_into(TARGET_BINDING_POWER, &mut tree)?;
        Self::finish_expression(tree, root)
    }

    /// A lone target such as `x`, `obj.attr`, `items[0]` or a parenthesised `(a, b)`.
    fn parse_single_target(&mut self) -> Result<Expression, ParserError> {
        let mut tree = IncompleteExpression::new();
        let root = self.parse_expression_pratt(TARGET_BINDING_POWER, &mut tree)?;
        Self::finish_expression(tree, root)
    }

    fn finish_expression(
        tree: IncompleteExpression,
        root: ExpressionNodeRef,
    ) -> Result<Expression, ParserError> {
        Expression::new(tree, root).ok_or(ParserError {
            kind: ParserErrorKind::UnexpectedEof,
            line: 0,
        })
    }

    fn parse_expression_list_into(
        &mut self,
        min_bp: u8,
        tree: &mut IncompleteExpression,
    ) -> Result<ExpressionNodeRef, ParserError> {
        let line = self.peek()?.line;
        let first = self.parse_expression_pratt(min_bp, tree)?;
        if self.peek_kind()? != TokenKind::Comma {
            return Ok(first);
        }
        let mut elements = vec![first];
        while self.eat_if(TokenKind::Comma)?.is_some() {
            if !Self::starts_expression(self.peek_kind()?) {
                break;
            }
            elements.push(self.parse_expression_pratt(min_bp, tree)?);
        }
        Ok(tree.push(ExpressionNode::Tuple { elements, line }))
    }

    fn peek_binary_operator(&mut self) -> Result<Option<BinaryOperator>, ParserError> {
        let operator = match self.peek_kind()? {
            TokenKind::Plus => BinaryOperator::Add,
            TokenKind::Minus => BinaryOperator::Subtract,
            TokenKind::Star => BinaryOperator::Multiply,
            TokenKind::Slash => BinaryOperator::Divide,
            TokenKind::DoubleSlash => BinaryOperator::FloorDivide,
            TokenKind::Percent => BinaryOperator::Modulo,
            TokenKind::DoubleStar => BinaryOperator::Power,
            _ => return Ok(None),
        };
        Ok(Some(operator))
    }

    fn peek_comparison(&mut self) -> Result<bool, ParserError> {
        Ok(matches!(
            self.peek_kind()?,
            TokenKind::LessThan
                | TokenKind::LessThanEqual
                | TokenKind::GreaterThan
                | TokenKind::GreaterThanEqual
                | TokenKind::EqualEqual
                | TokenKind::BangEqual
                | TokenKind::KeywordIs
                | TokenKind::KeywordIn
                | TokenKind::KeywordNot
        ))
    }

    fn next_comparison(&mut self) -> Result<CompareOperator, ParserError> {
        let token = self.next_token()?;
        let operator = match token.kind {
            TokenKind::LessThan => CompareOperator::LessThan,
            TokenKind::LessThanEqual => CompareOperator::LessThanEqual,
            TokenKind::GreaterThan => CompareOperator::GreaterThan,
            TokenKind::GreaterThanEqual => CompareOperator::GreaterThanEqual,
            TokenKind::EqualEqual => CompareOperator::Equal,
            TokenKind::BangEqual => CompareOperator::NotEqual,
            TokenKind::KeywordIn => CompareOperator::In,
            TokenKind::KeywordIs => match self.eat_if(TokenKind::KeywordNot)? {
                Some(_) => CompareOperator::IsNot,
                None => CompareOperator::Is,
            },
            TokenKind::KeywordNot => {
                self.expect(TokenKind::KeywordIn)?;
                CompareOperator::NotIn
            }
            kind => {
                return Err(ParserError {
                    kind: ParserErrorKind::NonExpression(kind),
                    line: token.line,
                })
            }
        };
        Ok(operator)
    }

    fn parse_atom(&mut self, token: Token) -> Result<ExpressionAtomKind, ParserError> {
        let lexeme = self.lexeme(&token);
        let kind = match token.kind {
            TokenKind::IntegerLiteral => {
                let value = lexeme.replace('_', "").parse().map_err(|_| ParserError {
                    kind: ParserErrorKind::IntegerOverflow,
                    line: token.line,
                })?;
                ExpressionAtomKind::Integer(value)
            }
            TokenKind::FloatLiteral => {
                let value = lexeme.replace('_', "").parse().map_err(|_| ParserError {
                    kind: ParserErrorKind::NonExpression(token.kind),
                    line: token.line,
                })?;
                ExpressionAtomKind::Float(value)
            }
            TokenKind::StringLiteral => {
                let mut value = unescape_string(lexeme);
                // Adjacent literals concatenate.
                while let Some(next) = self.eat_if(TokenKind::StringLiteral)? {
                    value.push_str(&unescape_string(self.lexeme(&next)));
                }
                ExpressionAtomKind::StringLiteral(value)
            }
            TokenKind::Ident => ExpressionAtomKind::Identifier(self.intern(&token)),
            TokenKind::KeywordTrue => ExpressionAtomKind::Bool(true),
            TokenKind::KeywordFalse => ExpressionAtomKind::Bool(false),
            TokenKind::KeywordNone => ExpressionAtomKind::None,
            TokenKind::Eof => {
                return Err(ParserError {
                    kind: ParserErrorKind::UnexpectedEof,
                    line: token.line,
                })
            }
            kind => {
                return Err(ParserError {
                    kind: ParserErrorKind::NonExpression(kind),
                    line: token.line,
                })
            }
        };
        Ok(kind)
    }

    fn expect_left_expression(
        &mut self,
        tree: &mut IncompleteExpression,
    ) -> Result<ExpressionNodeRef, ParserError> {
        let token = self.next_token()?;

        let node = match token.kind {
            // Unary operators
            TokenKind::Minus | TokenKind::Plus | TokenKind::KeywordNot => {
                let operator = match token.kind {
                    TokenKind::Minus => UnaryOperator::Minus,
                    TokenKind::Plus => UnaryOperator::Plus,
                    _ => UnaryOperator::Not,
                };
                let rhs = self.parse_expression_pratt(operator.get_binding_power(), tree)?;
                tree.push(ExpressionNode::Unary {
                    operator,
                    rhs,
                    resolved: OnceCell::new(),
                })
            }
            // Bracketed expression or tuple
            TokenKind::LeftParenthesis => {
                if self.eat_if(TokenKind::RightParenthesis)?.is_some() {
                    return Ok(tree.push(ExpressionNode::Tuple {
                        elements: Vec::new(),
                        line: token.line,
                    }));
                }
                let inner = self.parse_expression_pratt(0, tree)?;
                if self.peek_kind()? == TokenKind::Comma {
                    let mut elements = vec![inner];
                    while self.eat_if(TokenKind::Comma)?.is_some() {
                        if self.peek_kind()? == TokenKind::RightParenthesis {
                            break;
                        }
                        elements.push(self.parse_expression_pratt(0, tree)?);
                    }
                    self.expect(TokenKind::RightParenthesis)?;
                    tree.push(ExpressionNode::Tuple {
                        elements,
                        line: token.line,
                    })
                } else {
                    self.expect(TokenKind::RightParenthesis)?;
                    tree.push(ExpressionNode::Group { inner })
                }
            }
            TokenKind::LeftBracket => {
                let mut elements = Vec::new();
                while self.peek_kind()? != TokenKind::RightBracket {
                    elements.push(self.parse_expression_pratt(0, tree)?);
                    if self.eat_if(TokenKind::Comma)?.is_none() {
                        break;
                    }
                }
                self.expect(TokenKind::RightBracket)?;
                tree.push(ExpressionNode::List {
                    elements,
                    line: token.line,
                })
            }
            TokenKind::KeywordYield => {
                let value = if Self::starts_expression(self.peek_kind()?) {
                    Some(self.parse_expression_list_into(0, tree)?)
                } else {
                    None
                };
                tree.push(ExpressionNode::Yield {
                    value,
                    line: token.line,
                })
            }
            _ => {
                let line = token.line;
                let kind = self.parse_atom(token)?;
                tree.push(ExpressionNode::Atom(ExpressionAtom { kind, line }))
            }
        };
        Ok(node)
    }

    fn parse_expression_pratt(
        &mut self,
        min_bp: u8,
        tree: &mut IncompleteExpression,
    ) -> Result<ExpressionNodeRef, ParserError> {
        let mut lhs = self.expect_left_expression(tree)?;

        loop {
            let token = self.peek()?;
            let postfix = match token.kind {
                TokenKind::LeftParenthesis => Some(PostfixOperator::Call),
                TokenKind::Dot => Some(PostfixOperator::Attribute),
                TokenKind::LeftBracket => Some(PostfixOperator::Subscript),
                _ => None,
            };
            if let Some(operator) = postfix {
                if operator.get_binding_power() < min_bp {
                    break;
                }
                self.next_token()?;
                lhs = self.parse_postfix(operator, lhs, token.line, tree)?;
                continue;
            }

            if let Some(operator) = self.peek_binary_operator()? {
                let (lbp, rbp) = operator.get_binding_power();
                if lbp < min_bp {
                    break;
                }
                self.next_token()?;
                let rhs = self.parse_expression_pratt(rbp, tree)?;
                lhs = tree.push(ExpressionNode::Binary {
                    operator,
                    lhs,
                    rhs,
                    resolved: OnceCell::new(),
                });
                continue;
            }

            if self.peek_comparison()? {
                let (lbp, rbp) = CompareOperator::BINDING_POWER;
                if lbp < min_bp {
                    break;
                }
                let mut links = Vec::new();
                while self.peek_comparison()? {
                    let operator = self.next_comparison()?;
                    let rhs = self.parse_expression_pratt(rbp, tree)?;
                    links.push(ComparisonLink {
                        operator,
                        rhs,
                        resolved: OnceCell::new(),
                    });
                }
                lhs = tree.push(ExpressionNode::Compare { first: lhs, links });
                continue;
            }

            let bool_operator = match token.kind {
                TokenKind::KeywordAnd => Some(BoolOperator::And),
                TokenKind::KeywordOr => Some(BoolOperator::Or),
                _ => None,
            };
            if let Some(operator) = bool_operator {
                let (lbp, rbp) = operator.get_binding_power();
                if lbp < min_bp {
                    break;
                }
                self.next_token()?;
                let rhs = self.parse_expression_pratt(rbp, tree)?;
                lhs = tree.push(ExpressionNode::BoolOp { operator, lhs, rhs });
                continue;
            }

            if token.kind == TokenKind::KeywordIf {
                if TERNARY_BINDING_POWER < min_bp {
                    break;
                }
                self.next_token()?;
                let test = self.parse_expression_pratt(TERNARY_BINDING_POWER + 1, tree)?;
                self.expect(TokenKind::KeywordElse)?;
                let orelse = self.parse_expression_pratt(TERNARY_BINDING_POWER, tree)?;
                lhs = tree.push(ExpressionNode::IfExp {
                    test,
                    body: lhs,
                    orelse,
                });
                continue;
            }
            break;
        }
        Ok(lhs)
    }

    fn parse_postfix(
        &mut self,
        operator: PostfixOperator,
        lhs: ExpressionNodeRef,
        line: u32,
        tree: &mut IncompleteExpression,
    ) -> Result<ExpressionNodeRef, ParserError> {
        let node = match operator {
            PostfixOperator::Call => {
                let mut arguments = Vec::new();
                let mut keywords = Vec::new();
                while self.peek_kind()? != TokenKind::RightParenthesis {
                    let argument = self.parse_expression_pratt(0, tree)?;
                    if self.peek_kind()? == TokenKind::Equal {
                        let token = self.next_token()?;
                        let name = match tree.get_node(&argument) {
                            Some(ExpressionNode::Atom(ExpressionAtom {
                                kind: ExpressionAtomKind::Identifier(name),
                                ..
                            })) => name.clone(),
                            _ => {
                                return Err(ParserError {
                                    kind: ParserErrorKind::InvalidLValue,
                                    line: token.line,
                                })
                            }
                        };
                        let value = self.parse_expression_pratt(0, tree)?;
                        keywords.push(KeywordArgument { name, value });
                    } else {
                        arguments.push(argument);
                    }
                    if self.eat_if(TokenKind::Comma)?.is_none() {
                        break;
                    }
                }
                self.expect(TokenKind::RightParenthesis)?;
                ExpressionNode::Call {
                    callee: lhs,
                    arguments,
                    keywords,
                    line,
                }
            }
            PostfixOperator::Attribute => {
                let name = self.expect_identifier()?;
                ExpressionNode::Attribute { value: lhs, name }
            }
            PostfixOperator::Subscript => {
                let index = self.parse_expression_list_into(0, tree)?;
                self.expect(TokenKind::RightBracket)?;
                ExpressionNode::Subscript { value: lhs, index }
            }
        };
        Ok(tree.push(node))
    }
}

// Parse module/statements
impl<'src> Parser<'src> {
    pub fn parse(&mut self) -> Result<Module, ParserError> {
        let mut statements = Vec::new();
        loop {
            match self.peek_kind()? {
                TokenKind::Eof => break,
                TokenKind::Newline => {
                    self.next_token()?;
                }
                _ => self.parse_statement(&mut statements)?,
            }
        }
        Ok(Module::new(statements, self.get_source()))
    }

    fn parse_statement(&mut self, statements: &mut Vec<Statement>) -> Result<(), ParserError> {
        let token = self.peek()?;
        let line = token.line;
        let kind = match token.kind {
            TokenKind::KeywordIf => {
                self.next_token()?;
                StatementKind::If(self.parse_if()?)
            }
            TokenKind::KeywordWhile => {
                self.next_token()?;
                let test = self.parse_expression()?;
                let body = self.parse_suite()?;
                let orelse = self.parse_else()?;
                StatementKind::While(WhileStatement { test, body, orelse })
            }
            TokenKind::KeywordFor => {
                self.next_token()?;
                let target = self.parse_target_list()?;
                Self::validate_target(&target, line)?;
                self.expect(TokenKind::KeywordIn)?;
                let iter = self.parse_expression_list()?;
                let body = self.parse_suite()?;
                let orelse = self.parse_else()?;
                StatementKind::For(ForStatement {
                    target,
                    iter,
                    body,
                    orelse,
                })
            }
            TokenKind::KeywordTry => {
                self.next_token()?;
                StatementKind::Try(Rc::new(self.parse_try()?))
            }
            TokenKind::KeywordWith => {
                self.next_token()?;
                StatementKind::With(self.parse_with()?)
            }
            TokenKind::KeywordMatch => {
                self.next_token()?;
                StatementKind::Match(self.parse_match()?)
            }
            TokenKind::KeywordDef => {
                self.next_token()?;
                StatementKind::FunctionDef(Rc::new(self.parse_function(line)?))
            }
            TokenKind::KeywordClass => {
                self.next_token()?;
                StatementKind::ClassDef(Rc::new(self.parse_class(line)?))
            }
            _ => return self.parse_simple_statements(statements),
        };
        statements.push(Statement { kind, line });
        Ok(())
    }

    /// Parses `;`-separated simple statements up to and including the newline.
    fn parse_simple_statements(
        &mut self,
        statements: &mut Vec<Statement>,
    ) -> Result<(), ParserError> {
        loop {
            statements.push(self.parse_simple_statement()?);
            if self.eat_if(TokenKind::Semicolon)?.is_none() {
                break;
            }
            if matches!(self.peek_kind()?, TokenKind::Newline | TokenKind::Eof) {
                break;
            }
        }
        match self.peek_kind()? {
            TokenKind::Eof => Ok(()),
            _ => self.expect(TokenKind::Newline).map(|_| ()),
        }
    }

    fn parse_simple_statement(&mut self) -> Result<Statement, ParserError> {
        let token = self.peek()?;
        let line = token.line;
        let kind = match token.kind {
            TokenKind::KeywordPass => {
                self.next_token()?;
                StatementKind::Pass
            }
            TokenKind::KeywordBreak => {
                self.next_token()?;
                StatementKind::Break
            }
            TokenKind::KeywordContinue => {
                self.next_token()?;
                StatementKind::Continue
            }
            TokenKind::KeywordReturn => {
                self.next_token()?;
                let value = if Self::starts_expression(self.peek_kind()?) {
                    Some(self.parse_expression_list()?)
                } else {
                    None
                };
                StatementKind::Return(value)
            }
            TokenKind::KeywordRaise => {
                self.next_token()?;
                let exception = if Self::starts_expression(self.peek_kind()?) {
                    Some(self.parse_expression()?)
                } else {
                    None
                };
                let cause = match self.eat_if(TokenKind::KeywordFrom)? {
                    Some(_) => Some(self.parse_expression()?),
                    None => None,
                };
                StatementKind::Raise { exception, cause }
            }
            TokenKind::KeywordImport => {
                self.next_token()?;
                StatementKind::Import(self.parse_import_aliases()?)
            }
            TokenKind::KeywordFrom => {
                self.next_token()?;
                let module = self.expect_identifier()?;
                self.expect(TokenKind::KeywordImport)?;
                let names = if self.eat_if(TokenKind::LeftParenthesis)?.is_some() {
                    let names = self.parse_import_aliases()?;
                    self.expect(TokenKind::RightParenthesis)?;
                    names
                } else {
                    self.parse_import_aliases()?
                };
                StatementKind::ImportFrom { module, names }
            }
            TokenKind::KeywordAssert => {
                self.next_token()?;
                let test = self.parse_expression()?;
                let message = match self.eat_if(TokenKind::Comma)? {
                    Some(_) => Some(self.parse_expression()?),
                    None => None,
                };
                StatementKind::Assert { test, message }
            }
            kind if Self::starts_expression(kind) => self.parse_assignment_or_expression(line)?,
            kind => {
                return Err(ParserError {
                    kind: match kind {
                        TokenKind::Eof => ParserErrorKind::UnexpectedEof,
                        kind => ParserErrorKind::InvalidStatement(kind),
                    },
                    line,
                })
            }
        };
        Ok(Statement { kind, line })
    }

    /// `name [as alias], ...`
    fn parse_import_aliases(&mut self) -> Result<Vec<ImportAlias>, ParserError> {
        let mut aliases = Vec::new();
        loop {
            let name = self.expect_identifier()?;
            let alias = match self.eat_if(TokenKind::KeywordAs)? {
                Some(_) => Some(self.expect_identifier()?),
                None => None,
            };
            aliases.push(ImportAlias { name, alias });
            if self.peek_kind()? != TokenKind::Comma {
                break;
            }
            self.next_token()?;
            if self.peek_kind()? != TokenKind::Ident {
                break;
            }
        }
        Ok(aliases)
    }

    fn parse_assignment_or_expression(&mut self, line: u32) -> Result<StatementKind, ParserError> {
        let first = self.parse_expression_list()?;

        if self.eat_if(TokenKind::Colon)?.is_some() {
            Self::validate_target(&first, line)?;
            let annotation = self.parse_expression()?;
            let value = match self.eat_if(TokenKind::Equal)? {
                Some(_) => Some(self.parse_expression_list()?),
                None => None,
            };
            return Ok(StatementKind::AnnAssign {
                target: first,
                annotation,
                value,
            });
        }

        let augmented = match self.peek_kind()? {
            TokenKind::PlusEqual => Some(BinaryOperator::Add),
            TokenKind::MinusEqual => Some(BinaryOperator::Subtract),
            TokenKind::StarEqual => Some(BinaryOperator::Multiply),
            TokenKind::SlashEqual => Some(BinaryOperator::Divide),
            TokenKind::DoubleSlashEqual => Some(BinaryOperator::FloorDivide),
            TokenKind::PercentEqual => Some(BinaryOperator::Modulo),
            _ => None,
        };
        if let Some(operator) = augmented {
            self.next_token()?;
            Self::validate_target(&first, line)?;
            let value = self.parse_expression_list()?;
            return Ok(StatementKind::AugAssign {
                target: first,
                operator,
                value,
                resolved: OnceCell::new(),
            });
        }

        if self.peek_kind()? != TokenKind::Equal {
            return Ok(StatementKind::Expression(first));
        }

        let mut targets = vec![first];
        let value = loop {
            self.expect(TokenKind::Equal)?;
            let value = self.parse_expression_list()?;
            if self.peek_kind()? != TokenKind::Equal {
                break value;
            }
            targets.push(value);
        };
        for target in targets.iter() {
            Self::validate_target(target, line)?;
        }
        Ok(StatementKind::Assign { targets, value })
    }

    fn validate_target(target: &Expression, line: u32) -> Result<(), ParserError> {
        fn valid(expression: &Expression, node: &ExpressionNodeRef) -> bool {
            match expression.get_node(node) {
                Some(ExpressionNode::Atom(ExpressionAtom {
                    kind: ExpressionAtomKind::Identifier(_),
                    ..
                }))
                | Some(ExpressionNode::Attribute { .. })
                | Some(ExpressionNode::Subscript { .. }) => true,
                Some(ExpressionNode::Group { inner }) => valid(expression, inner),
                Some(ExpressionNode::Tuple { elements, .. })
                | Some(ExpressionNode::List { elements, .. }) => {
                    elements.iter().all(|element| valid(expression, element))
                }
                _ => false,
            }
        }

        if valid(target, &target.get_root_ref()) {
            Ok(())
        } else {
            Err(ParserError {
                kind: ParserErrorKind::InvalidLValue,
                line,
            })
        }
    }

    fn parse_suite(&mut self) -> Result<Body, ParserError> {
        self.expect(TokenKind::Colon)?;
        let mut statements = Vec::new();
        if self.eat_if(TokenKind::Newline)?.is_none() {
            self.parse_simple_statements(&mut statements)?;
            return Ok(statements.into());
        }
        self.expect(TokenKind::Indent)?;
        loop {
            match self.peek_kind()? {
                TokenKind::Dedent => {
                    self.next_token()?;
                    break;
                }
                TokenKind::Eof => break,
                TokenKind::Newline => {
                    self.next_token()?;
                }
                _ => self.parse_statement(&mut statements)?,
            }
        }
        Ok(statements.into())
    }

    fn parse_else(&mut self) -> Result<Body, ParserError> {
        match self.eat_if(TokenKind::KeywordElse)? {
            Some(_) => self.parse_suite(),
            None => Ok(Rc::from(Vec::new())),
        }
    }

    fn parse_if(&mut self) -> Result<IfStatement, ParserError> {
        let test = self.parse_expression()?;
        let body = self.parse_suite()?;
        let orelse = match self.peek()? {
            Token {
                kind: TokenKind::KeywordElif,
                line,
                ..
            } => {
                self.next_token()?;
                let nested = self.parse_if()?;
                Rc::from(vec![Statement {
                    kind: StatementKind::If(nested),
                    line,
                }])
            }
            _ => self.parse_else()?,
        };
        Ok(IfStatement { test, body, orelse })
    }

    fn parse_try(&mut self) -> Result<TryStatement, ParserError> {
        let body = self.parse_suite()?;
        let mut handlers = Vec::new();
        while let Some(token) = self.eat_if(TokenKind::KeywordExcept)? {
            let kind = if self.peek_kind()? != TokenKind::Colon {
                Some(self.parse_expression()?)
            } else {
                None
            };
            let name = match self.eat_if(TokenKind::KeywordAs)? {
                Some(_) => Some(self.expect_identifier()?),
                None => None,
            };
            let body = self.parse_suite()?;
            handlers.push(ExceptHandler {
                kind,
                name,
                body,
                line: token.line,
            });
        }
        let orelse = self.parse_else()?;
        let finalbody = match self.eat_if(TokenKind::KeywordFinally)? {
            Some(_) => self.parse_suite()?,
            None => Rc::from(Vec::new()),
        };
        if handlers.is_empty() && finalbody.is_empty() {
            let token = self.peek()?;
            return Err(ParserError {
                kind: ParserErrorKind::UnexpectedToken {
                    actual: token.kind,
                    expected: TokenKind::KeywordExcept,
                },
                line: token.line,
            });
        }
        Ok(TryStatement {
            body,
            handlers,
            orelse,
            finalbody,
        })
    }

    fn parse_with(&mut self) -> Result<WithStatement, ParserError> {
        let mut items = Vec::new();
        loop {
            let context = self.parse_expression()?;
            let target = match self.eat_if(TokenKind::KeywordAs)? {
                Some(token) => {
                    let target = self.parse_single_target()?;
                    Self::validate_target(&target, token.line)?;
                    Some(target)
                }
                None => None,
            };
            items.push(WithItem { context, target });
            if self.eat_if(TokenKind::Comma)?.is_none() {
                break;
            }
        }
        let body = self.parse_suite()?;
        Ok(WithStatement { items, body })
    }

    fn parse_function(&mut self, line: u32) -> Result<FunctionDef, ParserError> {
        let name = self.expect_identifier()?;
        self.expect(TokenKind::LeftParenthesis)?;
        let mut parameters = Vec::new();
        while self.peek_kind()? != TokenKind::RightParenthesis {
            let name = self.expect_identifier()?;
            let annotation = match self.eat_if(TokenKind::Colon)? {
                Some(_) => Some(self.parse_expression()?),
                None => None,
            };
            let default = match self.eat_if(TokenKind::Equal)? {
                Some(_) => Some(self.parse_expression()?),
                None => None,
            };
            parameters.push(Parameter {
                name,
                annotation,
                default,
            });
            if self.eat_if(TokenKind::Comma)?.is_none() {
                break;
            }
        }
        self.expect(TokenKind::RightParenthesis)?;
        let returns = match self.eat_if(TokenKind::Arrow)? {
            Some(_) => Some(self.parse_expression()?),
            None => None,
        };
        let body = self.parse_suite()?;
        Ok(FunctionDef {
            name,
            parameters,
            returns,
            body,
            line,
            is_generator: Cell::new(false),
        })
    }

    fn parse_class(&mut self, line: u32) -> Result<ClassDef, ParserError> {
        let name = self.expect_identifier()?;
        let mut bases = Vec::new();
        if self.eat_if(TokenKind::LeftParenthesis)?.is_some() {
            while self.peek_kind()? != TokenKind::RightParenthesis {
                bases.push(self.parse_expression()?);
                if self.eat_if(TokenKind::Comma)?.is_none() {
                    break;
                }
            }
            self.expect(TokenKind::RightParenthesis)?;
        }
        let body = self.parse_suite()?;
        Ok(ClassDef {
            name,
            bases,
            body,
            line,
            layout: OnceCell::new(),
        })
    }
}

// Structural pattern matching
impl<'src> Parser<'src> {
    fn parse_match(&mut self) -> Result<MatchStatement, ParserError> {
        let subject = self.parse_expression_list()?;
        self.expect(TokenKind::Colon)?;
        self.expect(TokenKind::Newline)?;
        self.expect(TokenKind::Indent)?;
        let mut cases = Vec::new();
        loop {
            match self.peek_kind()? {
                TokenKind::Dedent => {
                    self.next_token()?;
                    break;
                }
                TokenKind::Eof => break,
                TokenKind::Newline => {
                    self.next_token()?;
                }
                _ => {
                    self.expect(TokenKind::KeywordCase)?;
                    let pattern = self.parse_pattern_top()?;
                    let guard = match self.eat_if(TokenKind::KeywordIf)? {
                        Some(_) => Some(self.parse_expression()?),
                        None => None,
                    };
                    let body = self.parse_suite()?;
                    cases.push(MatchCase {
                        pattern,
                        guard,
                        body,
                    });
                }
            }
        }
        Ok(MatchStatement { subject, cases })
    }

    /// A top-level case pattern, where `case a, b:` is an open sequence.
    fn parse_pattern_top(&mut self) -> Result<Pattern, ParserError> {
        let first = self.parse_pattern()?;
        if self.peek_kind()? != TokenKind::Comma {
            return Ok(first);
        }
        let mut patterns = vec![first];
        while self.eat_if(TokenKind::Comma)?.is_some() {
            if matches!(self.peek_kind()?, TokenKind::Colon | TokenKind::KeywordIf) {
                break;
            }
            patterns.push(self.parse_pattern()?);
        }
        Ok(Pattern::Sequence(patterns))
    }

    fn parse_pattern(&mut self) -> Result<Pattern, ParserError> {
        let token = self.next_token()?;
        self.parse_pattern_after(token)
    }

    fn parse_pattern_after(&mut self, first: Token) -> Result<Pattern, ParserError> {
        let mut pattern = self.parse_closed_pattern(first)?;
        if self.peek_kind()? == TokenKind::Pipe {
            let mut alternatives = vec![pattern];
            while self.eat_if(TokenKind::Pipe)?.is_some() {
                let token = self.next_token()?;
                alternatives.push(self.parse_closed_pattern(token)?);
            }
            pattern = Pattern::Or(alternatives);
        }
        if self.eat_if(TokenKind::KeywordAs)?.is_some() {
            let name = self.expect_identifier()?;
            pattern = Pattern::As {
                pattern: Box::new(pattern),
                name,
            };
        }
        Ok(pattern)
    }

    fn parse_pattern_sequence(&mut self, close: TokenKind) -> Result<Vec<Pattern>, ParserError> {
        let mut patterns = Vec::new();
        while self.peek_kind()? != close {
            patterns.push(self.parse_pattern()?);
            if self.eat_if(TokenKind::Comma)?.is_none() {
                break;
            }
        }
        self.expect(close)?;
        Ok(patterns)
    }

    fn parse_closed_pattern(&mut self, token: Token) -> Result<Pattern, ParserError> {
        let pattern = match token.kind {
            TokenKind::Ident if self.lexeme(&token) == "_" => Pattern::Wildcard,
            TokenKind::Ident => {
                let name = self.intern(&token);
                let mut tree = IncompleteExpression::new();
                let mut node = tree.push(ExpressionNode::Atom(ExpressionAtom {
                    kind: ExpressionAtomKind::Identifier(name.clone()),
                    line: token.line,
                }));
                let mut dotted = false;
                while self.eat_if(TokenKind::Dot)?.is_some() {
                    let attribute = self.expect_identifier()?;
                    node = tree.push(ExpressionNode::Attribute {
                        value: node,
                        name: attribute,
                    });
                    dotted = true;
                }
                if self.eat_if(TokenKind::LeftParenthesis)?.is_some() {
                    let class = Self::finish_expression(tree, node)?;
                    return self.parse_class_pattern(class);
                }
                if dotted {
                    Pattern::Value(Self::finish_expression(tree, node)?)
                } else {
                    Pattern::Capture(name)
                }
            }
            TokenKind::Star => {
                let name_token = self.expect(TokenKind::Ident)?;
                match self.lexeme(&name_token) {
                    "_" => Pattern::Star(None),
                    _ => Pattern::Star(Some(self.intern(&name_token))),
                }
            }
            TokenKind::LeftBracket => {
                Pattern::Sequence(self.parse_pattern_sequence(TokenKind::RightBracket)?)
            }
            TokenKind::LeftParenthesis => {
                if self.eat_if(TokenKind::RightParenthesis)?.is_some() {
                    return Ok(Pattern::Sequence(Vec::new()));
                }
                let inner = self.parse_pattern()?;
                if self.eat_if(TokenKind::RightParenthesis)?.is_some() {
                    return Ok(inner);
                }
                self.expect(TokenKind::Comma)?;
                let mut patterns = vec![inner];
                patterns.extend(self.parse_pattern_sequence(TokenKind::RightParenthesis)?);
                Pattern::Sequence(patterns)
            }
            TokenKind::Minus => {
                let number = self.next_token()?;
                if !matches!(
                    number.kind,
                    TokenKind::IntegerLiteral | TokenKind::FloatLiteral
                ) {
                    return Err(ParserError {
                        kind: ParserErrorKind::InvalidPattern(number.kind),
                        line: number.line,
                    });
                }
                let line = number.line;
                let kind = self.parse_atom(number)?;
                let mut tree = IncompleteExpression::new();
                let rhs = tree.push(ExpressionNode::Atom(ExpressionAtom { kind, line }));
                let root = tree.push(ExpressionNode::Unary {
                    operator: UnaryOperator::Minus,
                    rhs,
                    resolved: OnceCell::new(),
                });
                Pattern::Value(Self::finish_expression(tree, root)?)
            }
            TokenKind::IntegerLiteral
            | TokenKind::FloatLiteral
            | TokenKind::StringLiteral
            | TokenKind::KeywordTrue
            | TokenKind::KeywordFalse
            | TokenKind::KeywordNone => {
                let line = token.line;
                let kind = self.parse_atom(token)?;
                let mut tree = IncompleteExpression::new();
                let root = tree.push(ExpressionNode::Atom(ExpressionAtom { kind, line }));
                Pattern::Value(Self::finish_expression(tree, root)?)
            }
            kind => {
                return Err(ParserError {
                    kind: ParserErrorKind::InvalidPattern(kind),
                    line: token.line,
                })
            }
        };
        Ok(pattern)
    }

    fn parse_class_pattern(&mut self, class: Expression) -> Result<Pattern, ParserError> {
        let mut positional = Vec::new();
        let mut keywords = Vec::new();
        while self.peek_kind()? != TokenKind::RightParenthesis {
            let token = self.next_token()?;
            if token.kind == TokenKind::Ident && self.eat_if(TokenKind::Equal)?.is_some() {
                let name = self.intern(&token);
                keywords.push((name, self.parse_pattern()?));
            } else {
                positional.push(self.parse_pattern_after(token)?);
            }
            if self.eat_if(TokenKind::Comma)?.is_none() {
                break;
            }
        }
        self.expect(TokenKind::RightParenthesis)?;
        Ok(Pattern::Class {
            class,
            positional,
            keywords,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elif_chains_nest_in_orelse() {
        let source = "if a:\n    pass\nelif b:\n    pass\nelse:\n    pass\n";
        let module = Parser::new(source).parse().unwrap();
        let StatementKind::If(ref outer) = module.body[0].kind else {
            panic!("expected if");
        };
        assert!(matches!(outer.orelse[0].kind, StatementKind::If(_)));
        assert_eq!(outer.orelse[0].line, 3);
    }

    #[test]
    fn statement_level_commas_build_tuples() {
        let module = Parser::new("a, b = 1, 2\n").parse().unwrap();
        let StatementKind::Assign { ref value, .. } = module.body[0].kind else {
            panic!("expected assignment");
        };
        assert!(matches!(
            value.get_root(),
            Some(ExpressionNode::Tuple { elements, .. }) if elements.len() == 2
        ));
    }

    #[test]
    fn with_items_bind_one_target_each() {
        let source = "with A() as first, B() as (x, y), C():\n    pass\n";
        let module = Parser::new(source).parse().unwrap();
        let StatementKind::With(ref with) = module.body[0].kind else {
            panic!("expected with");
        };
        assert_eq!(with.items.len(), 3);
        assert!(matches!(
            with.items[0].target.as_ref().and_then(|target| target.get_root()),
            Some(ExpressionNode::Atom(_))
        ));
        assert!(matches!(
            with.items[1].target.as_ref().and_then(|target| target.get_root()),
            Some(ExpressionNode::Tuple { elements, .. }) if elements.len() == 2
        ));
        assert!(with.items[2].target.is_none());
    }
}
