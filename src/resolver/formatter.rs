use super::{ResolutionError, ResolutionErrorKind};
use crate::lexer::formatter::{ARIADNE_MSG, ARIADNE_WRITE_MSG};
use crate::lexer::LineBreaks;
use ariadne::{Color, Label, Report, ReportKind, Source};
use std::{fmt::Write, path::Path};

const WRITE_FMT_MSG: &str = "Encountered an error while attempting to write format string to buffer.";

pub trait ResolverFormatter {
    fn format_error(&self, error: &ResolutionError) -> String {
        let mut buffer = String::new();
        self.format_error_in_place(&mut buffer, error);
        buffer
    }
    fn format_error_in_place(&self, buffer: &mut String, error: &ResolutionError);
}

pub struct DebugResolverFormatter;

impl ResolverFormatter for DebugResolverFormatter {
    fn format_error_in_place(&self, buffer: &mut String, error: &ResolutionError) {
        write!(buffer, "{error:?}").expect(WRITE_FMT_MSG);
    }
}

pub struct BasicResolverFormatter;

impl ResolverFormatter for BasicResolverFormatter {
    fn format_error_in_place(&self, buffer: &mut String, error: &ResolutionError) {
        write!(buffer, "({}) ", error.line).expect(WRITE_FMT_MSG);
        buffer.push_str(match error.kind {
            ResolutionErrorKind::NonFunctionReturn => "Returning in a non-function context",
            ResolutionErrorKind::NonFunctionYield => "Yielding in a non-function context",
            ResolutionErrorKind::ClassBodyYield => "Yielding in a class body",
            ResolutionErrorKind::NonLoopBreak => "Breaking outside of a loop",
            ResolutionErrorKind::NonLoopContinue => "Continuing outside of a loop",
        });
    }
}

pub struct PrettyResolverFormatter<'src> {
    text: &'src str,
    path: &'src Path,
    line_breaks: LineBreaks,
}

impl<'src> PrettyResolverFormatter<'src> {
    pub fn new(text: &'src str, path: &'src Path) -> Self {
        Self {
            text,
            path,
            line_breaks: LineBreaks::new(text),
        }
    }
}

impl<'src> ResolverFormatter for PrettyResolverFormatter<'src> {
    fn format_error_in_place(&self, buffer: &mut String, error: &ResolutionError) {
        let text = self.text;
        let path = &self.path.to_string_lossy();
        let span = self.line_breaks.get_line_range(text, error.line);
        let (message, label) = match error.kind {
            ResolutionErrorKind::NonFunctionReturn => (
                "Returning from a non-function context",
                "Returning from here is an invalid operation",
            ),
            ResolutionErrorKind::NonFunctionYield => (
                "Yielding from a non-function context",
                "Only function bodies can yield",
            ),
            ResolutionErrorKind::ClassBodyYield => (
                "Yielding from a class body",
                "Class bodies run once and cannot be suspended",
            ),
            ResolutionErrorKind::NonLoopBreak => {
                ("Breaking outside of a loop", "There is no loop to break out of")
            }
            ResolutionErrorKind::NonLoopContinue => {
                ("Continuing outside of a loop", "There is no loop to continue")
            }
        };
        let mut output = std::io::Cursor::new(Vec::new());
        Report::build(ReportKind::Error, (path, span.clone()))
            .with_code(error.code())
            .with_message(message)
            .with_label(
                Label::new((path, span))
                    .with_message(label)
                    .with_color(Color::BrightRed),
            )
            .finish()
            .write((path, Source::from(text)), &mut output)
            .expect(ARIADNE_WRITE_MSG);
        buffer.push_str(&String::from_utf8(output.into_inner()).expect(ARIADNE_MSG));
    }
}
