use super::error::RuntimeError;
use super::native::MESSAGE_ATTRIBUTE;
use super::trace::Exception;
use crate::lexer::formatter::{ARIADNE_MSG, ARIADNE_WRITE_MSG};
use crate::lexer::LineBreaks;
use crate::value::registry::TypeRegistry;
use crate::value::Value;
use ariadne::{Color, Label, Report, ReportKind, Source};
use std::fmt::Write;
use std::path::Path;

const WRITE_FMT_MSG: &str = "Encountered an error while attempting to write format string to buffer.";

/// Renders an uncaught script exception the way CPython does.
pub struct TracebackFormatter<'src> {
    text: &'src str,
    line_breaks: &'src LineBreaks,
    file_name: &'src str,
}

impl<'src> TracebackFormatter<'src> {
    pub fn new(text: &'src str, line_breaks: &'src LineBreaks, file_name: &'src str) -> Self {
        Self {
            text,
            line_breaks,
            file_name,
        }
    }

    pub fn format(&self, exception: &Exception, registry: &TypeRegistry) -> String {
        let mut buffer = String::new();
        if let Some(cause) = &exception.cause {
            writeln!(buffer, "{}", exception_line(cause, registry)).expect(WRITE_FMT_MSG);
            buffer.push('\n');
            buffer.push_str(
                "The above exception was the direct cause of the following exception:\n\n",
            );
        }
        buffer.push_str("Traceback (most recent call last):\n");
        for frame in exception.traces.iter() {
            writeln!(
                buffer,
                "  File \"{}\", line {}, in {}",
                self.file_name, frame.line, frame.name
            )
            .expect(WRITE_FMT_MSG);
            let source = self
                .line_breaks
                .get_line_text(self.text, frame.line)
                .map(str::trim)
                .unwrap_or_default();
            if !source.is_empty() {
                writeln!(buffer, "    {source}").expect(WRITE_FMT_MSG);
            }
        }
        buffer.push_str(&exception_line(&exception.value, registry));
        buffer
    }
}

/// `Type: message`, or just `Type` when there is no message.
pub fn exception_line(value: &Value, registry: &TypeRegistry) -> String {
    let Value::Object(object) = value else {
        return registry.print(value);
    };
    let object = object.borrow();
    let name = object.class.name.to_string();
    let message = match object.get(MESSAGE_ATTRIBUTE) {
        None | Some(Value::None) => String::new(),
        Some(message) => registry.print(&message),
    };
    if message.is_empty() {
        name
    } else {
        format!("{name}: {message}")
    }
}

pub trait RuntimeFormatter {
    fn format_error(&self, error: &RuntimeError) -> String;
}

pub struct DebugRuntimeFormatter;

impl RuntimeFormatter for DebugRuntimeFormatter {
    fn format_error(&self, error: &RuntimeError) -> String {
        format!("{error:?}")
    }
}

pub struct BasicRuntimeFormatter;

impl RuntimeFormatter for BasicRuntimeFormatter {
    fn format_error(&self, error: &RuntimeError) -> String {
        format!("({}) {}", error.line, error.kind)
    }
}

pub struct PrettyRuntimeFormatter<'src> {
    text: &'src str,
    path: &'src Path,
    line_breaks: LineBreaks,
}

impl<'src> PrettyRuntimeFormatter<'src> {
    pub fn new(text: &'src str, path: &'src Path) -> Self {
        Self {
            text,
            path,
            line_breaks: LineBreaks::new(text),
        }
    }
}

impl<'src> RuntimeFormatter for PrettyRuntimeFormatter<'src> {
    fn format_error(&self, error: &RuntimeError) -> String {
        let path = &self.path.to_string_lossy();
        let span = self.line_breaks.get_line_range(self.text, error.line);
        let mut output = std::io::Cursor::new(Vec::new());
        Report::build(ReportKind::Error, (path, span.clone()))
            .with_code(error.code())
            .with_message("Internal runtime error")
            .with_label(
                Label::new((path, span))
                    .with_message(format!("{}", error.kind))
                    .with_color(Color::BrightRed),
            )
            .finish()
            .write((path, Source::from(self.text)), &mut output)
            .expect(ARIADNE_WRITE_MSG);
        String::from_utf8(output.into_inner()).expect(ARIADNE_MSG)
    }
}
