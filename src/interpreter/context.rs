use super::SystemContext;

/// Prints to stdout and reports tracebacks on stderr.
pub struct StdioContext;

impl SystemContext for StdioContext {
    fn writeln(&mut self, text: &str) {
        println!("{text}");
    }

    fn write_traceback(&mut self, text: &str) {
        eprintln!("{text}");
    }
}

/// Captures output and tracebacks in one buffer, in the order they happened.
#[derive(Debug, Default)]
pub struct BufferedContext {
    buffer: String,
    lines: usize,
}

impl BufferedContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_data(&self) -> &str {
        &self.buffer
    }

    /// Number of `writeln` and `write_traceback` calls so far.
    pub fn line_count(&self) -> usize {
        self.lines
    }

    pub fn into_data(self) -> String {
        self.buffer
    }
}

impl SystemContext for BufferedContext {
    fn writeln(&mut self, text: &str) {
        self.buffer.push_str(text);
        self.buffer.push('\n');
        self.lines += 1;
    }

    fn write_traceback(&mut self, text: &str) {
        self.writeln(text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_keeps_output_and_tracebacks_in_order() {
        let mut context = BufferedContext::new();
        context.writeln("before");
        context.write_traceback("Traceback (most recent call last):\nValueError");
        assert_eq!(context.line_count(), 2);
        assert_eq!(
            context.get_data(),
            "before\nTraceback (most recent call last):\nValueError\n"
        );
    }
}
