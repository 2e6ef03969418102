pub mod bindings;
pub mod block;
mod call;
pub mod context;
pub mod error;
mod expression;
pub mod formatter;
pub mod generator;
pub mod module;
pub mod native;
mod stack;
mod statement;
pub mod trace;
mod tree;

use compact_str::CompactString;
pub use tree::TreeEvaluator;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgramState {
    Run,
    Terminate,
    /// An exception escaped a top-level statement; holds the rendered traceback.
    Exception(String),
}

/// Where script output and uncaught tracebacks go.
pub trait SystemContext {
    /// Output of `print`.
    fn writeln(&mut self, text: &str);
    /// A traceback that escaped the module.
    fn write_traceback(&mut self, text: &str);
}

#[derive(Debug, Clone)]
pub struct EvaluatorConfig {
    /// Active calls allowed before `RecursionError`.
    pub max_depth: usize,
    /// File name shown in tracebacks.
    pub file_name: CompactString,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            max_depth: 200,
            file_name: "<input>".into(),
        }
    }
}
