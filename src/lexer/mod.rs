mod error;
pub mod formatter;
mod token;

use compact_str::CompactString;
pub use error::{LexicalError, LexicalErrorKind};
use std::collections::VecDeque;
use std::iter::Peekable;
use std::ops::Range;
use std::rc::Rc;
use std::str::CharIndices;
pub use token::{Span, Token, TokenKind, KEYWORD_HASHMAP};

/// Byte ranges of every line in the source, used to map spans back to lines.
#[derive(Debug, Clone)]
pub struct LineBreaks {
    line_breaks: Rc<[Range<u32>]>,
}

impl LineBreaks {
    pub fn new(text: &str) -> Self {
        let mut line_breaks = Vec::new();
        let mut cursor = 0u32;
        for (offset, byte) in text.bytes().enumerate() {
            if byte == b'\n' {
                let end = offset as u32 + 1;
                line_breaks.push(cursor..end);
                cursor = end;
            }
        }
        if line_breaks.is_empty() || !text.ends_with('\n') {
            line_breaks.push(cursor..text.len() as u32 + 1);
        }
        Self {
            line_breaks: line_breaks.into(),
        }
    }

    pub fn get_max_line(&self) -> u32 {
        self.line_breaks.len() as u32
    }

    pub fn get_line(&self, offset: u32) -> u32 {
        self.line_breaks
            .binary_search_by(|r| {
                if offset < r.start {
                    std::cmp::Ordering::Greater
                } else if offset >= r.end {
                    std::cmp::Ordering::Less
                } else {
                    std::cmp::Ordering::Equal
                }
            })
            .map(|v| (v + 1) as u32)
            .unwrap_or(self.get_max_line())
    }

    pub fn get_line_from_span(&self, span: Span) -> u32 {
        self.get_line(span.start)
    }

    /// The text of a 1-based line without its trailing newline.
    pub fn get_line_text<'src>(&self, text: &'src str, line: u32) -> Option<&'src str> {
        let range = self.line_breaks.get((line as usize).checked_sub(1)?)?;
        let end = (range.end as usize).min(text.len());
        text.get(range.start as usize..end)
            .map(|line| line.trim_end_matches(['\n', '\r']))
    }

    /// Byte range of a 1-based line without its newline; an empty range at the end if absent.
    pub fn get_line_range(&self, text: &str, line: u32) -> Range<usize> {
        let Some(line_text) = self.get_line_text(text, line) else {
            return text.len()..text.len();
        };
        let start = self.line_breaks[line as usize - 1].start as usize;
        start..start + line_text.len()
    }
}

#[derive(Debug)]
pub struct Lexer<'src> {
    source: &'src str,
    chars: Peekable<CharIndices<'src>>,
    line_breaks: LineBreaks,
    line: u32,
    indents: Vec<u32>,
    pending: VecDeque<Token>,
    nesting: u32,
    at_line_start: bool,
    previous: Option<TokenKind>,
    finished: bool,
}

impl<'src> Lexer<'src> {
    pub fn new(source: &'src str) -> Self {
        Self {
            source,
            chars: source.char_indices().peekable(),
            line_breaks: LineBreaks::new(source),
            line: 1,
            indents: vec![0],
            pending: VecDeque::new(),
            nesting: 0,
            at_line_start: true,
            previous: None,
            finished: false,
        }
    }

    pub fn get_source(&self) -> &'src str {
        self.source
    }

    pub fn get_line_breaks(&self) -> LineBreaks {
        self.line_breaks.clone()
    }

    pub fn get_lexeme(&self, span: &Span) -> Option<&'src str> {
        self.source.get(span.range())
    }

    /// Collects every token up to and including `Eof`, stopping at the first error.
    pub fn tokenize(mut self) -> Result<Vec<Token>, LexicalError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            tokens.push(token);
            if token.kind == TokenKind::Eof {
                return Ok(tokens);
            }
        }
    }
}

impl<'src> Lexer<'src> {
    fn offset(&mut self) -> usize {
        self.chars
            .peek()
            .map(|(offset, _)| *offset)
            .unwrap_or(self.source.len())
    }

    fn peek_char(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, c)| *c)
    }

    fn peek_second(&self) -> Option<char> {
        let mut lookahead = self.chars.clone();
        lookahead.next();
        lookahead.next().map(|(_, c)| c)
    }

    fn advance(&mut self) -> Option<char> {
        let (_, c) = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
        }
        Some(c)
    }

    fn advance_if(&mut self, expected: char) -> bool {
        if self.peek_char() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn skip_comment(&mut self) {
        while let Some(c) = self.peek_char() {
            if c == '\n' {
                break;
            }
            self.advance();
        }
    }

    fn emit(&mut self, kind: TokenKind, start: usize, line: u32) -> Token {
        let end = self.offset();
        let token = Token {
            kind,
            span: Span::new(start, end),
            line,
        };
        self.previous = Some(kind);
        token
    }

    fn error(&self, kind: LexicalErrorKind, start: usize, end: usize, line: u32) -> LexicalError {
        LexicalError {
            kind,
            span: Span::new(start, end),
            line,
        }
    }

    /// Measures the indentation of a fresh logical line and queues the layout tokens it implies.
    fn scan_indentation(&mut self) -> Result<(), LexicalError> {
        loop {
            let start = self.offset();
            let mut width = 0u32;
            while let Some(c) = self.peek_char() {
                match c {
                    ' ' => width += 1,
                    '\t' => width += 8 - width % 8,
                    '\r' | '\x0c' => {}
                    _ => break,
                }
                self.advance();
            }
            match self.peek_char() {
                Some('\n') => {
                    self.advance();
                    continue;
                }
                Some('#') => {
                    self.skip_comment();
                    continue;
                }
                None => return Ok(()),
                Some(_) => {}
            }

            let line = self.line;
            let offset = self.offset();
            let current = self.indents.last().copied().unwrap_or(0);
            if width > current {
                self.indents.push(width);
                self.pending.push_back(Token {
                    kind: TokenKind::Indent,
                    span: Span::new(start, offset),
                    line,
                });
            } else if width < current {
                while self.indents.last().is_some_and(|&level| level > width) {
                    self.indents.pop();
                    self.pending.push_back(Token {
                        kind: TokenKind::Dedent,
                        span: Span::new(offset, offset),
                        line,
                    });
                }
                if self.indents.last().copied().unwrap_or(0) != width {
                    self.pending.clear();
                    return Err(self.error(
                        LexicalErrorKind::InconsistentDedent,
                        start,
                        offset,
                        line,
                    ));
                }
            }
            return Ok(());
        }
    }

    fn finish(&mut self) -> Token {
        let offset = self.source.len();
        let line = self.line;
        if !matches!(
            self.previous,
            None | Some(TokenKind::Newline) | Some(TokenKind::Dedent)
        ) {
            self.pending.push_back(Token {
                kind: TokenKind::Newline,
                span: Span::new(offset, offset),
                line,
            });
        }
        while self.indents.len() > 1 {
            self.indents.pop();
            self.pending.push_back(Token {
                kind: TokenKind::Dedent,
                span: Span::new(offset, offset),
                line,
            });
        }
        self.pending.push_back(Token {
            kind: TokenKind::Eof,
            span: Span::new(offset, offset),
            line,
        });
        self.finished = true;
        self.next_pending()
    }

    fn next_pending(&mut self) -> Token {
        match self.pending.pop_front() {
            Some(token) => {
                self.previous = Some(token.kind);
                token
            }
            None => Token {
                kind: TokenKind::Eof,
                span: Span::new(self.source.len(), self.source.len()),
                line: self.line,
            },
        }
    }

    pub fn next_token(&mut self) -> Result<Token, LexicalError> {
        if !self.pending.is_empty() || self.finished {
            return Ok(self.next_pending());
        }

        if self.at_line_start && self.nesting == 0 {
            self.at_line_start = false;
            self.scan_indentation()?;
            if !self.pending.is_empty() {
                return Ok(self.next_pending());
            }
        }

        loop {
            let start = self.offset();
            let line = self.line;
            let Some(c) = self.advance() else {
                return Ok(self.finish());
            };

            let kind = match c {
                ' ' | '\t' | '\r' | '\x0c' => continue,
                '#' => {
                    self.skip_comment();
                    continue;
                }
                '\\' if self.peek_char() == Some('\n') => {
                    self.advance();
                    continue;
                }
                '\n' => {
                    if self.nesting > 0 {
                        continue;
                    }
                    self.at_line_start = true;
                    return Ok(self.emit(TokenKind::Newline, start, line));
                }
                '(' => {
                    self.nesting += 1;
                    TokenKind::LeftParenthesis
                }
                ')' => {
                    self.nesting = self.nesting.saturating_sub(1);
                    TokenKind::RightParenthesis
                }
                '[' => {
                    self.nesting += 1;
                    TokenKind::LeftBracket
                }
                ']' => {
                    self.nesting = self.nesting.saturating_sub(1);
                    TokenKind::RightBracket
                }
                ',' => TokenKind::Comma,
                ':' => TokenKind::Colon,
                ';' => TokenKind::Semicolon,
                '|' => TokenKind::Pipe,
                '.' if self.peek_char().is_some_and(|c| c.is_ascii_digit()) => {
                    self.scan_number(true)
                }
                '.' => TokenKind::Dot,
                '+' if self.advance_if('=') => TokenKind::PlusEqual,
                '+' => TokenKind::Plus,
                '-' if self.advance_if('=') => TokenKind::MinusEqual,
                '-' if self.advance_if('>') => TokenKind::Arrow,
                '-' => TokenKind::Minus,
                '*' if self.advance_if('*') => TokenKind::DoubleStar,
                '*' if self.advance_if('=') => TokenKind::StarEqual,
                '*' => TokenKind::Star,
                '/' if self.advance_if('/') => {
                    if self.advance_if('=') {
                        TokenKind::DoubleSlashEqual
                    } else {
                        TokenKind::DoubleSlash
                    }
                }
                '/' if self.advance_if('=') => TokenKind::SlashEqual,
                '/' => TokenKind::Slash,
                '%' if self.advance_if('=') => TokenKind::PercentEqual,
                '%' => TokenKind::Percent,
                '=' if self.advance_if('=') => TokenKind::EqualEqual,
                '=' => TokenKind::Equal,
                '!' if self.advance_if('=') => TokenKind::BangEqual,
                '<' if self.advance_if('=') => TokenKind::LessThanEqual,
                '<' => TokenKind::LessThan,
                '>' if self.advance_if('=') => TokenKind::GreaterThanEqual,
                '>' => TokenKind::GreaterThan,
                '"' | '\'' => self.scan_string(c, start, line)?,
                c if c.is_ascii_digit() => self.scan_number(false),
                c if c.is_alphabetic() || c == '_' => {
                    while self
                        .peek_char()
                        .is_some_and(|c| c.is_alphanumeric() || c == '_')
                    {
                        self.advance();
                    }
                    let end = self.offset();
                    KEYWORD_HASHMAP
                        .get(&self.source[start..end])
                        .copied()
                        .unwrap_or(TokenKind::Ident)
                }
                c => {
                    let end = self.offset();
                    return Err(self.error(LexicalErrorKind::Unrecognized(c), start, end, line));
                }
            };
            return Ok(self.emit(kind, start, line));
        }
    }

    fn scan_number(&mut self, mut seen_dot: bool) -> TokenKind {
        let mut is_float = seen_dot;
        loop {
            match self.peek_char() {
                Some(c) if c.is_ascii_digit() || c == '_' => {
                    self.advance();
                }
                Some('.')
                    if !seen_dot && !self.peek_second().is_some_and(|c| c.is_alphabetic()) =>
                {
                    seen_dot = true;
                    is_float = true;
                    self.advance();
                }
                Some('e' | 'E')
                    if self
                        .peek_second()
                        .is_some_and(|c| c.is_ascii_digit() || c == '-' || c == '+') =>
                {
                    is_float = true;
                    self.advance();
                    if matches!(self.peek_char(), Some('-' | '+')) {
                        self.advance();
                    }
                    while self.peek_char().is_some_and(|c| c.is_ascii_digit()) {
                        self.advance();
                    }
                    break;
                }
                _ => break,
            }
        }
        if is_float {
            TokenKind::FloatLiteral
        } else {
            TokenKind::IntegerLiteral
        }
    }

    fn scan_string(
        &mut self,
        quote: char,
        start: usize,
        line: u32,
    ) -> Result<TokenKind, LexicalError> {
        let triple = self.peek_char() == Some(quote) && self.peek_second() == Some(quote);
        if triple {
            self.advance();
            self.advance();
        } else if self.peek_char() == Some(quote) {
            self.advance();
            return Ok(TokenKind::StringLiteral);
        }

        loop {
            let Some(c) = self.advance() else {
                let end = self.offset();
                return Err(self.error(LexicalErrorKind::UnclosedString, start, end, line));
            };
            match c {
                '\\' => {
                    self.advance();
                }
                '\n' if !triple => {
                    let end = self.offset();
                    self.at_line_start = true;
                    return Err(self.error(LexicalErrorKind::UnclosedString, start, end, line));
                }
                c if c == quote => {
                    if !triple {
                        return Ok(TokenKind::StringLiteral);
                    }
                    if self.peek_char() == Some(quote) && self.peek_second() == Some(quote) {
                        self.advance();
                        self.advance();
                        return Ok(TokenKind::StringLiteral);
                    }
                }
                _ => {}
            }
        }
    }
}

/// Strips the quotes off a string literal's lexeme and resolves its escapes.
pub fn unescape_string(lexeme: &str) -> CompactString {
    let quote_len = if lexeme.starts_with("\"\"\"") || lexeme.starts_with("'''") {
        3
    } else {
        1
    };
    let inner = lexeme
        .get(quote_len..lexeme.len().saturating_sub(quote_len))
        .unwrap_or_default();

    let mut value = CompactString::default();
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            value.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => value.push('\n'),
            Some('t') => value.push('\t'),
            Some('r') => value.push('\r'),
            Some('0') => value.push('\0'),
            Some('\n') => {}
            Some(other @ ('\\' | '\'' | '"')) => value.push(other),
            Some(other) => {
                value.push('\\');
                value.push(other);
            }
            None => value.push('\\'),
        }
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_text_lookup_strips_newlines() {
        let text = "a = 1\nb = 2\n";
        let breaks = LineBreaks::new(text);
        assert_eq!(breaks.get_line_text(text, 2), Some("b = 2"));
        assert_eq!(breaks.get_line(6), 2);
    }

    #[test]
    fn escapes_are_resolved() {
        assert_eq!(unescape_string(r#""a\tb\n""#), "a\tb\n");
        assert_eq!(unescape_string("'it\\'s'"), "it's");
    }
}
