use super::bindings::{Binding, Bindings};
use super::block::{BlockKind, ExecBlock, PendingControl};
use super::error::{RuntimeError, RuntimeErrorKind};
use super::formatter::TracebackFormatter;
use super::module::{NativeModule, NATIVE_MODULES};
use super::native::{
    BuiltinException, NativeError, NativeHost, BUILTIN_FUNCTIONS, EXCEPTION_INIT,
    MESSAGE_ATTRIBUTE,
};
use super::trace::{Exception, StackTrace, TraceKind};
use super::{EvaluatorConfig, ProgramState, SystemContext};
use crate::lexer::LineBreaks;
use crate::parser::expression::Expression;
use crate::parser::statement::AttributeSlot;
use crate::parser::Module;
use crate::string::IdentName;
use crate::value::arena::Arena;
use crate::value::object::{Class, ModuleObject};
use crate::value::registry::{TypeHooks, TypeRegistry};
use crate::value::{Signal, Value};
use std::cell::RefCell;
use std::rc::Rc;

/// How a block loop should react after a statement.
pub(super) enum Flow {
    Next,
    Unwind,
    Paused,
}

/// Flags a call must not leak into or inherit from its caller.
pub(super) struct CallControl {
    return_value: Option<Value>,
    loop_break: bool,
    loop_continue: bool,
    yielding: bool,
    yield_value: Value,
    resuming: bool,
}

pub struct TreeEvaluator<C: SystemContext> {
    pub(super) module: Module,
    pub(super) line_breaks: LineBreaks,
    pub(super) context: C,
    pub(super) config: EvaluatorConfig,
    pub(super) registry: TypeRegistry,
    pub(super) arena: Arena,
    pub(super) builtins: Vec<Binding>,
    pub(super) exception_classes: Vec<Rc<Class>>,
    /// What `import` can bind, by module name.
    pub(super) modules: Vec<Rc<ModuleObject>>,
    pub(super) variables: Bindings,
    pub(super) traces: Vec<StackTrace>,
    /// Raised and not yet caught.
    pub(super) exceptions: Vec<Exception>,
    pub(super) return_value: Option<Value>,
    pub(super) loop_break: bool,
    pub(super) loop_continue: bool,
    pub(super) yielding: bool,
    pub(super) yield_value: Value,
    /// Set while re-entering the statement that last yielded.
    pub(super) resuming: bool,
}

impl<C> TreeEvaluator<C>
where
    C: SystemContext,
{
    /// `module` should already have been through the resolver.
    pub fn new(module: Module, context: C, config: EvaluatorConfig) -> Self {
        let mut registry = TypeRegistry::new();
        let mut builtins: Vec<Binding> = BUILTIN_FUNCTIONS
            .iter()
            .map(|native| Binding::new(native.name.into(), Value::Native(*native)))
            .collect();

        let message_layout: Rc<[AttributeSlot]> = Rc::new([AttributeSlot {
            name: MESSAGE_ATTRIBUTE.into(),
            offset: 0,
        }]);
        let mut exception_classes: Vec<Rc<Class>> = Vec::new();
        for kind in BuiltinException::ALL {
            let tag = registry.register(kind.name(), TypeHooks::exception());
            let bases = match kind {
                BuiltinException::Exception => Vec::new(),
                _ => exception_classes.first().cloned().into_iter().collect(),
            };
            let class = Rc::new(Class {
                name: kind.name().into(),
                tag,
                bases,
                namespace: RefCell::new(vec![Binding::new(
                    "__init__".into(),
                    Value::Native(EXCEPTION_INIT),
                )]),
                layout: message_layout.clone(),
            });
            builtins.push(Binding::new(kind.name().into(), Value::Class(class.clone())));
            exception_classes.push(class);
        }

        let mut module_trace = StackTrace::new("<module>", TraceKind::Module, 0, 1);
        module_trace
            .blocks
            .push(ExecBlock::new(BlockKind::Module, module.body.clone()));
        let line_breaks = LineBreaks::new(&module.source);

        Self {
            module,
            line_breaks,
            context,
            config,
            registry,
            arena: Arena::new(),
            builtins,
            exception_classes,
            modules: NATIVE_MODULES.iter().map(NativeModule::instantiate).collect(),
            variables: Bindings::new(),
            traces: vec![module_trace],
            exceptions: Vec::new(),
            return_value: None,
            loop_break: false,
            loop_continue: false,
            yielding: false,
            yield_value: Value::None,
            resuming: false,
        }
    }

    /// Executes the next top-level statement.
    pub fn step(&mut self) -> Result<ProgramState, RuntimeError> {
        let (body, index) = {
            let block = self.block(0)?;
            (block.body.clone(), block.next_index)
        };
        let Some(statement) = body.get(index) else {
            return Ok(ProgramState::Terminate);
        };
        let result = self.exec_statement(statement);
        let uncaught = self.exceptions.pop();
        self.reset_to_module();
        self.block_mut(0)?.next_index += 1;
        result?;
        match uncaught {
            Some(exception) => Ok(ProgramState::Exception(self.format_traceback(&exception))),
            None => Ok(ProgramState::Run),
        }
    }

    /// Runs until the module ends or an exception escapes. The traceback is
    /// written to the context.
    pub fn run(&mut self) -> Result<(), RuntimeError> {
        loop {
            match self.step()? {
                ProgramState::Run => {}
                ProgramState::Terminate => return Ok(()),
                ProgramState::Exception(traceback) => {
                    self.context.write_traceback(&traceback);
                    return Ok(());
                }
            }
        }
    }

    /// Evaluates an expression against the module bindings.
    pub fn eval(&mut self, expr: &Expression) -> Result<Value, RuntimeError> {
        let result = self.evaluate(expr);
        let uncaught = self.exceptions.pop();
        self.reset_to_module();
        let value = result?;
        match uncaught {
            Some(exception) => Err(self.error(RuntimeErrorKind::Uncaught(
                self.format_traceback(&exception),
            ))),
            None => Ok(value),
        }
    }

    pub fn get_context(&self) -> &C {
        &self.context
    }

    pub fn into_context(self) -> C {
        self.context
    }

    pub fn get_registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// A module-level binding.
    pub fn get_global(&self, name: &str) -> Option<Value> {
        let end = self.module_frame_end();
        self.variables.find(name, 0..end).cloned()
    }

    /// Makes `members` importable as `name`, replacing any module of that name.
    pub fn add_module(&mut self, name: &str, members: Vec<(&str, Value)>) {
        let members = members
            .into_iter()
            .map(|(name, value)| Binding::new(name.into(), value))
            .collect();
        let module = Rc::new(ModuleObject {
            name: name.into(),
            members,
        });
        self.modules.retain(|existing| &*existing.name != name);
        tracing::debug!(module = name, "Registered module.");
        self.modules.push(module);
    }

    pub fn print_value(&self, value: &Value) -> String {
        self.registry.print(value)
    }

    /// Releases unreachable objects; returns how many were freed.
    pub fn collect_garbage(&mut self) -> usize {
        self.arena.sweep(&self.registry)
    }

    pub fn live_objects(&self) -> usize {
        self.arena.len()
    }

    fn reset_to_module(&mut self) {
        let end = self.module_frame_end();
        self.variables.split_off(end);
        self.traces.truncate(1);
        if let Some(module) = self.traces.first_mut() {
            module.blocks.truncate(1);
        }
        self.exceptions.clear();
        self.return_value = None;
        self.loop_break = false;
        self.loop_continue = false;
        self.yielding = false;
        self.yield_value = Value::None;
        self.resuming = false;
    }

    pub(super) fn format_traceback(&self, exception: &Exception) -> String {
        TracebackFormatter::new(&self.module.source, &self.line_breaks, &self.config.file_name)
            .format(exception, &self.registry)
    }
}

// Frames and blocks
impl<C> TreeEvaluator<C>
where
    C: SystemContext,
{
    pub(super) fn line(&self) -> u32 {
        self.traces.last().map(|trace| trace.line).unwrap_or(0)
    }

    pub(super) fn set_line(&mut self, line: u32) {
        if let Some(trace) = self.traces.last_mut() {
            trace.line = line;
        }
    }

    pub(super) fn error(&self, kind: RuntimeErrorKind) -> RuntimeError {
        RuntimeError::new(kind, self.line())
    }

    pub(super) fn trace(&self) -> Result<&StackTrace, RuntimeError> {
        self.traces
            .last()
            .ok_or_else(|| self.error(RuntimeErrorKind::EmptyStack))
    }

    pub(super) fn trace_mut(&mut self) -> Result<&mut StackTrace, RuntimeError> {
        let line = self.line();
        self.traces
            .last_mut()
            .ok_or(RuntimeError::new(RuntimeErrorKind::EmptyStack, line))
    }

    pub(super) fn block(&self, level: usize) -> Result<&ExecBlock, RuntimeError> {
        self.trace()?
            .blocks
            .get(level)
            .ok_or_else(|| self.error(RuntimeErrorKind::InvalidResume))
    }

    pub(super) fn block_mut(&mut self, level: usize) -> Result<&mut ExecBlock, RuntimeError> {
        let line = self.line();
        self.trace_mut()?
            .blocks
            .get_mut(level)
            .ok_or(RuntimeError::new(RuntimeErrorKind::InvalidResume, line))
    }

    pub(super) fn frame_start(&self) -> usize {
        self.traces.last().map(|trace| trace.frame_start).unwrap_or(0)
    }

    /// Module bindings end where the first call frame begins.
    pub(super) fn module_frame_end(&self) -> usize {
        self.traces
            .get(1)
            .map(|trace| trace.frame_start)
            .unwrap_or(self.variables.len())
    }

    /// Pushes a block and runs it to completion or suspension.
    pub(super) fn enter_block(&mut self, block: ExecBlock) -> Result<Value, RuntimeError> {
        let trace = self.trace_mut()?;
        let level = trace.blocks.len();
        trace.blocks.push(block);
        self.run_block(level)
    }

    pub(super) fn settle(&self) -> Flow {
        if self.yielding {
            Flow::Paused
        } else if self.unwinding() {
            Flow::Unwind
        } else {
            Flow::Next
        }
    }

    /// Executes the block at `level` from its `next_index`. Completed and
    /// unwound blocks are popped; a suspended one stays for `resume_block`.
    pub(super) fn run_block(&mut self, level: usize) -> Result<Value, RuntimeError> {
        loop {
            let (body, index) = {
                let block = self.block(level)?;
                (block.body.clone(), block.next_index)
            };
            let Some(statement) = body.get(index) else {
                break;
            };
            self.exec_statement(statement)?;
            self.resuming = false;
            match self.settle() {
                Flow::Paused => return Ok(Value::Signal(Signal::Paused)),
                Flow::Unwind => break,
                Flow::Next => self.block_mut(level)?.next_index += 1,
            }
        }
        self.trace_mut()?.blocks.truncate(level);
        Ok(Value::None)
    }

    /// Continues a suspended block: the innermost one re-enters the statement
    /// that yielded, outer ones first finish the statement that owns the next
    /// block in.
    pub(super) fn resume_block(&mut self, level: usize) -> Result<Value, RuntimeError> {
        let depth = self.trace()?.blocks.len();
        if level + 1 >= depth {
            self.resuming = true;
            return self.run_block(level);
        }
        let (body, index) = {
            let block = self.block(level)?;
            (block.body.clone(), block.next_index)
        };
        let statement = body
            .get(index)
            .ok_or_else(|| self.error(RuntimeErrorKind::InvalidResume))?;
        self.set_line(statement.line);
        self.resume_statement(statement, level + 1)?;
        match self.settle() {
            Flow::Paused => return Ok(Value::Signal(Signal::Paused)),
            Flow::Unwind => {
                self.trace_mut()?.blocks.truncate(level);
                return Ok(Value::None);
            }
            Flow::Next => self.block_mut(level)?.next_index += 1,
        }
        self.run_block(level)
    }
}

// Control state
impl<C> TreeEvaluator<C>
where
    C: SystemContext,
{
    pub(super) fn unwinding(&self) -> bool {
        self.return_value.is_some()
            || self.loop_break
            || self.loop_continue
            || !self.exceptions.is_empty()
    }

    /// Expression evaluation must stop: something raised or yielded.
    pub(super) fn interrupted(&self) -> bool {
        self.yielding || !self.exceptions.is_empty()
    }

    pub(super) fn save_control(&mut self) -> CallControl {
        CallControl {
            return_value: self.return_value.take(),
            loop_break: std::mem::take(&mut self.loop_break),
            loop_continue: std::mem::take(&mut self.loop_continue),
            yielding: std::mem::take(&mut self.yielding),
            yield_value: std::mem::replace(&mut self.yield_value, Value::None),
            resuming: std::mem::take(&mut self.resuming),
        }
    }

    pub(super) fn restore_control(&mut self, saved: CallControl) {
        self.return_value = saved.return_value;
        self.loop_break = saved.loop_break;
        self.loop_continue = saved.loop_continue;
        self.yielding = saved.yielding;
        self.yield_value = saved.yield_value;
        self.resuming = saved.resuming;
    }

    pub(super) fn take_pending(&mut self) -> PendingControl {
        PendingControl {
            exception: self.exceptions.pop(),
            return_value: self.return_value.take(),
            loop_break: std::mem::take(&mut self.loop_break),
            loop_continue: std::mem::take(&mut self.loop_continue),
        }
    }

    pub(super) fn restore_pending(&mut self, pending: PendingControl) {
        if let Some(exception) = pending.exception {
            self.exceptions.push(exception);
        }
        self.return_value = pending.return_value;
        self.loop_break = pending.loop_break;
        self.loop_continue = pending.loop_continue;
    }
}

// Names and exceptions
impl<C> TreeEvaluator<C>
where
    C: SystemContext,
{
    /// Frame bindings, then module bindings, then builtins. A miss is not an
    /// error: it logs and yields the missing marker.
    pub(super) fn lookup(&self, name: &str) -> Value {
        let frame_start = self.frame_start();
        if let Some(value) = self.variables.find(name, frame_start..self.variables.len()) {
            return value.clone();
        }
        if frame_start > 0 {
            if let Some(value) = self.variables.find(name, 0..self.module_frame_end()) {
                return value.clone();
            }
        }
        if let Some(binding) = self.builtins.iter().find(|binding| &*binding.name == name) {
            return binding.value.clone();
        }
        tracing::warn!(name, line = self.line(), "Unbound variable.");
        Value::Invalid
    }

    pub(super) fn assign_name(&mut self, name: IdentName, value: Value) {
        let frame_start = self.frame_start();
        self.variables.assign(name, value, frame_start);
    }

    pub(super) fn exception_class(&self, kind: BuiltinException) -> Rc<Class> {
        self.exception_classes[kind.index()].clone()
    }

    pub(super) fn is_exception(&self, value: &Value) -> bool {
        let base = self.exception_class(BuiltinException::Exception);
        match value {
            Value::Object(object) => object.borrow().class.is_subclass_of(&base),
            _ => false,
        }
    }

    /// Marks `value` as the pending exception, recording the active frames.
    pub(super) fn raise(&mut self, value: Value, cause: Option<Value>) {
        let traces = self.traces.iter().map(StackTrace::summary).collect();
        tracing::debug!(
            exception = %value.type_name(),
            message = %self.registry.print(&value),
            depth = self.traces.len(),
            "Raised exception."
        );
        self.exceptions.push(Exception {
            value,
            traces,
            cause,
        });
    }

    pub(super) fn raise_builtin(&mut self, kind: BuiltinException, message: Value) {
        let object = self.arena.new_object(self.exception_class(kind));
        if let Value::Object(inner) = &object {
            inner.borrow_mut().set(MESSAGE_ATTRIBUTE, message);
        }
        self.raise(object, None);
    }

    pub(super) fn raise_message(&mut self, kind: BuiltinException, message: impl Into<String>) {
        let message: String = message.into();
        self.raise_builtin(kind, Value::str(message));
    }

    /// Turns a native failure into a script exception or an internal error.
    pub(super) fn handle_native_error(&mut self, error: NativeError) -> Result<Value, RuntimeError> {
        match error {
            NativeError::Raise { class, message } => {
                let message = if message.is_empty() {
                    Value::None
                } else {
                    Value::str(message)
                };
                self.raise_builtin(class, message);
                Ok(Value::Invalid)
            }
            NativeError::Propagate => Ok(Value::Invalid),
            NativeError::Runtime(kind) => Err(self.error(kind)),
        }
    }

    /// The exception the innermost active `except` body is handling.
    pub(super) fn handled_exception(&self) -> Option<Exception> {
        self.traces
            .iter()
            .rev()
            .flat_map(|trace| trace.blocks.iter().rev())
            .find_map(|block| block.handled.clone())
    }
}

impl<C> NativeHost for TreeEvaluator<C>
where
    C: SystemContext,
{
    fn write_line(&mut self, text: &str) {
        self.context.writeln(text);
    }

    fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    fn get_next(&mut self, iterator: &Value) -> Result<Value, NativeError> {
        let item = self
            .get_next(iterator)
            .map_err(|error| NativeError::Runtime(error.kind))?;
        if self.interrupted() {
            return Err(NativeError::Propagate);
        }
        Ok(item)
    }

    fn make_iterator(&mut self, iterable: &Value) -> Result<Value, NativeError> {
        let iterator = self
            .make_iterator(iterable)
            .map_err(|error| NativeError::Runtime(error.kind))?;
        if self.interrupted() {
            return Err(NativeError::Propagate);
        }
        Ok(iterator)
    }

    fn allocate(&mut self, class: Rc<Class>) -> Value {
        self.arena.new_object(class)
    }

    fn adopt(&mut self, value: &Value) {
        self.arena.adopt(value);
    }
}
