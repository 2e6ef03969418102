use super::{unescape_string, LexicalError, LexicalErrorKind, LineBreaks, Token, TokenKind};
use ariadne::{Color, Label, Report, ReportKind, Source};
use std::path::Path;

pub(crate) const ARIADNE_MSG: &str = "Ariadne produces valid utf-8 strings";
pub(crate) const ARIADNE_WRITE_MSG: &str = "Write into buffer should not fail.";

/// Interface for creating new token formatters.
pub trait TokenFormatter {
    /// Formats a token into a string.
    fn format(&self, token: &Token) -> String;
    /// Formats a lexer error into a string.
    fn format_error(&self, error: &LexicalError) -> String;
}

pub struct DebugFormatter;

impl TokenFormatter for DebugFormatter {
    fn format(&self, token: &Token) -> String {
        format!("{token:?}")
    }

    fn format_error(&self, error: &LexicalError) -> String {
        format!("{error:?}")
    }
}

/// One token per line as `(line) KIND lexeme value`.
pub struct LineFormatter<'src> {
    text: &'src str,
    line_breaks: LineBreaks,
}

impl<'src> LineFormatter<'src> {
    pub fn new(text: &'src str) -> Self {
        Self {
            text,
            line_breaks: LineBreaks::new(text),
        }
    }

    pub fn get_line_breaks(&self) -> &LineBreaks {
        &self.line_breaks
    }

    pub fn get_text(&self) -> &'src str {
        self.text
    }
}

impl<'src> TokenFormatter for LineFormatter<'src> {
    fn format(&self, token: &Token) -> String {
        let lexeme = self.text.get(token.span.range()).unwrap_or_default();
        let value = match token.kind {
            TokenKind::IntegerLiteral => match lexeme.replace('_', "").parse::<i64>() {
                Ok(v) => v.to_string(),
                Err(_) => "overflow".into(),
            },
            TokenKind::FloatLiteral => match lexeme.replace('_', "").parse::<f64>() {
                Ok(v) => format!("{v:?}"),
                Err(_) => "invalid".into(),
            },
            TokenKind::StringLiteral => unescape_string(lexeme).to_string(),
            _ => "null".into(),
        };
        match token.kind {
            TokenKind::Newline | TokenKind::Indent | TokenKind::Dedent | TokenKind::Eof => {
                format!("({}) {} null", token.line, token.kind)
            }
            kind => format!("({}) {kind} {lexeme} {value}", token.line),
        }
    }

    fn format_error(&self, error: &LexicalError) -> String {
        let line = self.line_breaks.get_line_from_span(error.span);
        match error.kind {
            LexicalErrorKind::Unrecognized(c) => format!("({line}) ERROR UNEXPECTED_CHAR {c}"),
            LexicalErrorKind::UnclosedString => format!("({line}) ERROR UNTERMINATED_STRING null"),
            LexicalErrorKind::InconsistentDedent => {
                format!("({line}) ERROR INCONSISTENT_DEDENT null")
            }
        }
    }
}

pub struct PrettyFormatter<'src> {
    inner: LineFormatter<'src>,
    path: &'src Path,
}

impl<'src> PrettyFormatter<'src> {
    pub fn new(text: &'src str, path: &'src Path) -> Self {
        Self {
            inner: LineFormatter::new(text),
            path,
        }
    }

    pub fn get_text(&self) -> &'src str {
        self.inner.get_text()
    }

    pub fn get_path(&self) -> &'src Path {
        self.path
    }
}

impl<'src> TokenFormatter for PrettyFormatter<'src> {
    fn format(&self, token: &Token) -> String {
        self.inner.format(token)
    }

    fn format_error(&self, error: &LexicalError) -> String {
        let text = self.get_text();
        let path = &self.path.to_string_lossy();
        let span = error.span;
        let mut output = std::io::Cursor::new(Vec::new());
        let (message, label) = match error.kind {
            LexicalErrorKind::Unrecognized(c) => {
                ("Unrecognized character", format!("{c:?} is not valid here"))
            }
            LexicalErrorKind::UnclosedString => {
                ("Unterminated string", "The string starts here".to_string())
            }
            LexicalErrorKind::InconsistentDedent => (
                "Inconsistent dedent",
                "Indentation does not match any enclosing block".to_string(),
            ),
        };
        Report::build(ReportKind::Error, (path, span.range()))
            .with_message(message)
            .with_label(
                Label::new((path, span.range()))
                    .with_message(label)
                    .with_color(Color::BrightRed),
            )
            .finish()
            .write((path, Source::from(text)), &mut output)
            .expect(ARIADNE_WRITE_MSG);
        String::from_utf8(output.into_inner()).expect(ARIADNE_MSG)
    }
}
