use std::collections::HashMap;
use std::fmt::Display;
use std::ops::Range;
use std::sync::LazyLock;

/// The hashmap for keywords
pub static KEYWORD_HASHMAP: LazyLock<HashMap<&'static str, TokenKind>> = LazyLock::new(|| {
    let mut map = HashMap::new();
    map.insert("and", TokenKind::KeywordAnd);
    map.insert("as", TokenKind::KeywordAs);
    map.insert("assert", TokenKind::KeywordAssert);
    map.insert("break", TokenKind::KeywordBreak);
    map.insert("case", TokenKind::KeywordCase);
    map.insert("class", TokenKind::KeywordClass);
    map.insert("continue", TokenKind::KeywordContinue);
    map.insert("def", TokenKind::KeywordDef);
    map.insert("elif", TokenKind::KeywordElif);
    map.insert("else", TokenKind::KeywordElse);
    map.insert("except", TokenKind::KeywordExcept);
    map.insert("False", TokenKind::KeywordFalse);
    map.insert("finally", TokenKind::KeywordFinally);
    map.insert("for", TokenKind::KeywordFor);
    map.insert("from", TokenKind::KeywordFrom);
    map.insert("if", TokenKind::KeywordIf);
    map.insert("import", TokenKind::KeywordImport);
    map.insert("in", TokenKind::KeywordIn);
    map.insert("is", TokenKind::KeywordIs);
    map.insert("match", TokenKind::KeywordMatch);
    map.insert("None", TokenKind::KeywordNone);
    map.insert("not", TokenKind::KeywordNot);
    map.insert("or", TokenKind::KeywordOr);
    map.insert("pass", TokenKind::KeywordPass);
    map.insert("raise", TokenKind::KeywordRaise);
    map.insert("return", TokenKind::KeywordReturn);
    map.insert("True", TokenKind::KeywordTrue);
    map.insert("try", TokenKind::KeywordTry);
    map.insert("while", TokenKind::KeywordWhile);
    map.insert("with", TokenKind::KeywordWith);
    map.insert("yield", TokenKind::KeywordYield);
    map
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    /// The byte position of the start of the token.
    pub start: u32,
    /// The length of the token in bytes.
    pub length: u32,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self {
            start: start as u32,
            length: end.saturating_sub(start) as u32,
        }
    }

    pub fn range(&self) -> Range<usize> {
        self.start as usize..self.end() as usize
    }

    pub fn end(&self) -> u32 {
        self.start + self.length
    }

    pub fn merge(&self, other: &Span) -> Span {
        let start = self.start.min(other.start);
        let end = self.end().max(other.end());
        Span {
            start,
            length: end - start,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TokenKind {
    // Brackets
    LeftParenthesis,
    RightParenthesis,
    LeftBracket,
    RightBracket,
    // Punctuation
    Comma,
    Dot,
    Colon,
    Semicolon,
    Arrow,
    Pipe,
    // Arithmetic
    Plus,
    Minus,
    Star,
    DoubleStar,
    Slash,
    DoubleSlash,
    Percent,
    // Comparison
    EqualEqual,
    BangEqual,
    LessThan,
    LessThanEqual,
    GreaterThan,
    GreaterThanEqual,
    // Assignment
    Equal,
    PlusEqual,
    MinusEqual,
    StarEqual,
    SlashEqual,
    DoubleSlashEqual,
    PercentEqual,

    // Literals
    IntegerLiteral,
    FloatLiteral,
    StringLiteral,
    Ident,

    // Keywords
    KeywordAnd,
    KeywordAs,
    KeywordAssert,
    KeywordBreak,
    KeywordCase,
    KeywordClass,
    KeywordContinue,
    KeywordDef,
    KeywordElif,
    KeywordElse,
    KeywordExcept,
    KeywordFalse,
    KeywordFinally,
    KeywordFor,
    KeywordFrom,
    KeywordIf,
    KeywordImport,
    KeywordIn,
    KeywordIs,
    KeywordMatch,
    KeywordNone,
    KeywordNot,
    KeywordOr,
    KeywordPass,
    KeywordRaise,
    KeywordReturn,
    KeywordTrue,
    KeywordTry,
    KeywordWhile,
    KeywordWith,
    KeywordYield,

    // Layout
    Newline,
    Indent,
    Dedent,

    // End of file.
    Eof,
}

impl TokenKind {
    pub fn is_keyword(&self) -> bool {
        KEYWORD_HASHMAP.values().any(|kind| kind == self)
    }
}

impl Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TokenKind::LeftParenthesis => "LEFT_PAREN",
            TokenKind::RightParenthesis => "RIGHT_PAREN",
            TokenKind::LeftBracket => "LEFT_BRACKET",
            TokenKind::RightBracket => "RIGHT_BRACKET",
            TokenKind::Comma => "COMMA",
            TokenKind::Dot => "DOT",
            TokenKind::Colon => "COLON",
            TokenKind::Semicolon => "SEMICOLON",
            TokenKind::Arrow => "ARROW",
            TokenKind::Pipe => "PIPE",
            TokenKind::Plus => "PLUS",
            TokenKind::Minus => "MINUS",
            TokenKind::Star => "STAR",
            TokenKind::DoubleStar => "DOUBLE_STAR",
            TokenKind::Slash => "SLASH",
            TokenKind::DoubleSlash => "DOUBLE_SLASH",
            TokenKind::Percent => "PERCENT",
            TokenKind::EqualEqual => "EQUAL_EQUAL",
            TokenKind::BangEqual => "BANG_EQUAL",
            TokenKind::LessThan => "LESS",
            TokenKind::LessThanEqual => "LESS_EQUAL",
            TokenKind::GreaterThan => "GREATER",
            TokenKind::GreaterThanEqual => "GREATER_EQUAL",
            TokenKind::Equal => "EQUAL",
            TokenKind::PlusEqual => "PLUS_EQUAL",
            TokenKind::MinusEqual => "MINUS_EQUAL",
            TokenKind::StarEqual => "STAR_EQUAL",
            TokenKind::SlashEqual => "SLASH_EQUAL",
            TokenKind::DoubleSlashEqual => "DOUBLE_SLASH_EQUAL",
            TokenKind::PercentEqual => "PERCENT_EQUAL",
            TokenKind::IntegerLiteral => "INTEGER",
            TokenKind::FloatLiteral => "FLOAT",
            TokenKind::StringLiteral => "STRING",
            TokenKind::Ident => "IDENTIFIER",
            TokenKind::KeywordAnd => "AND",
            TokenKind::KeywordAs => "AS",
            TokenKind::KeywordAssert => "ASSERT",
            TokenKind::KeywordBreak => "BREAK",
            TokenKind::KeywordCase => "CASE",
            TokenKind::KeywordClass => "CLASS",
            TokenKind::KeywordContinue => "CONTINUE",
            TokenKind::KeywordDef => "DEF",
            TokenKind::KeywordElif => "ELIF",
            TokenKind::KeywordElse => "ELSE",
            TokenKind::KeywordExcept => "EXCEPT",
            TokenKind::KeywordFalse => "FALSE",
            TokenKind::KeywordFinally => "FINALLY",
            TokenKind::KeywordFor => "FOR",
            TokenKind::KeywordFrom => "FROM",
            TokenKind::KeywordIf => "IF",
            TokenKind::KeywordImport => "IMPORT",
            TokenKind::KeywordIn => "IN",
            TokenKind::KeywordIs => "IS",
            TokenKind::KeywordMatch => "MATCH",
            TokenKind::KeywordNone => "NONE",
            TokenKind::KeywordNot => "NOT",
            TokenKind::KeywordOr => "OR",
            TokenKind::KeywordPass => "PASS",
            TokenKind::KeywordRaise => "RAISE",
            TokenKind::KeywordReturn => "RETURN",
            TokenKind::KeywordTrue => "TRUE",
            TokenKind::KeywordTry => "TRY",
            TokenKind::KeywordWhile => "WHILE",
            TokenKind::KeywordWith => "WITH",
            TokenKind::KeywordYield => "YIELD",
            TokenKind::Newline => "NEWLINE",
            TokenKind::Indent => "INDENT",
            TokenKind::Dedent => "DEDENT",
            TokenKind::Eof => "EOF",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
    pub line: u32,
}
