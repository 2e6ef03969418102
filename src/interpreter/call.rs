use super::bindings::Binding;
use super::block::{BlockKind, ExecBlock};
use super::error::RuntimeError;
use super::generator::{GeneratorObject, GeneratorState};
use super::native::{BuiltinException, NativeFunction};
use super::stack::ensure_sufficient_stack;
use super::trace::{StackTrace, TraceKind};
use super::{SystemContext, TreeEvaluator};
use crate::string::IdentName;
use crate::value::object::{Class, Function, SequenceIterator};
use crate::value::{Signal, Value};
use std::cell::RefCell;
use std::rc::Rc;

impl<C> TreeEvaluator<C>
where
    C: SystemContext,
{
    pub(super) fn call_value(
        &mut self,
        callee: Value,
        args: Vec<Value>,
        keywords: Vec<(IdentName, Value)>,
    ) -> Result<Value, RuntimeError> {
        match callee {
            Value::Native(native) => {
                if !keywords.is_empty() {
                    self.raise_message(
                        BuiltinException::TypeError,
                        format!("{}() takes no keyword arguments", native.name),
                    );
                    return Ok(Value::Invalid);
                }
                self.call_native(native, &args)
            }
            Value::Function(function) => self.call_function(function, args, keywords),
            Value::BoundMethod(method) => {
                let mut receiver_first = Vec::with_capacity(args.len() + 1);
                receiver_first.push(method.receiver.clone());
                receiver_first.extend(args);
                self.call_value(method.method.clone(), receiver_first, keywords)
            }
            Value::Class(class) => self.construct(class, args, keywords),
            other => {
                self.raise_message(
                    BuiltinException::TypeError,
                    format!("'{}' object is not callable", other.type_name()),
                );
                Ok(Value::Invalid)
            }
        }
    }

    fn call_native(&mut self, native: NativeFunction, args: &[Value]) -> Result<Value, RuntimeError> {
        tracing::trace!(function = native.name, args = args.len(), "Calling native function.");
        match (native.function)(self, args) {
            Ok(value) => Ok(value),
            Err(error) => self.handle_native_error(error),
        }
    }

    /// Runs a script function in a fresh frame. Generator functions only bind
    /// their arguments and hand back a suspended generator.
    fn call_function(
        &mut self,
        function: Rc<Function>,
        args: Vec<Value>,
        keywords: Vec<(IdentName, Value)>,
    ) -> Result<Value, RuntimeError> {
        ensure_sufficient_stack(|| self.call_function_inner(function, args, keywords))
    }

    fn call_function_inner(
        &mut self,
        function: Rc<Function>,
        args: Vec<Value>,
        keywords: Vec<(IdentName, Value)>,
    ) -> Result<Value, RuntimeError> {
        if self.traces.len() >= self.config.max_depth {
            self.raise_message(
                BuiltinException::RecursionError,
                "maximum recursion depth exceeded",
            );
            return Ok(Value::Invalid);
        }

        let frame_start = self.variables.len();
        if let Some(closure) = &function.closure {
            self.variables.extend(closure.iter().cloned());
            self.variables
                .push(function.name().clone(), Value::Function(function.clone()));
        }
        if !self.bind_parameters(&function, args, keywords) {
            self.variables.split_off(frame_start);
            return Ok(Value::Invalid);
        }

        if function.def.is_generator.get() {
            let environment = self.variables.split_off(frame_start);
            return Ok(self.make_generator(function, environment));
        }

        tracing::trace!(
            function = %function.name(),
            depth = self.traces.len(),
            "Calling function."
        );
        let saved = self.save_control();
        self.traces.push(StackTrace::new(
            &**function.name(),
            TraceKind::Function,
            frame_start,
            function.def.line,
        ));
        let result = self.enter_block(ExecBlock::new(
            BlockKind::FunctionBody,
            function.def.body.clone(),
        ));
        self.traces.pop();
        self.variables.split_off(frame_start);
        let value = self.return_value.take().unwrap_or(Value::None);
        self.restore_control(saved);
        result?;
        if self.exceptions.is_empty() {
            Ok(value)
        } else {
            Ok(Value::Invalid)
        }
    }

    /// Pushes one binding per parameter. Returns `false` after raising
    /// `TypeError` when the arguments do not fit.
    fn bind_parameters(
        &mut self,
        function: &Function,
        args: Vec<Value>,
        keywords: Vec<(IdentName, Value)>,
    ) -> bool {
        let name = function.name();
        let parameters = &function.def.parameters;
        if args.len() > parameters.len() {
            let plural = if parameters.len() == 1 { "" } else { "s" };
            let verb = if args.len() == 1 { "was" } else { "were" };
            self.raise_message(
                BuiltinException::TypeError,
                format!(
                    "{name}() takes {} positional argument{plural} but {} {verb} given",
                    parameters.len(),
                    args.len()
                ),
            );
            return false;
        }

        let mut values: Vec<Option<Value>> = vec![None; parameters.len()];
        for (slot, arg) in values.iter_mut().zip(args) {
            *slot = Some(arg);
        }
        for (keyword, value) in keywords {
            match parameters.iter().position(|p| p.name == keyword) {
                None => {
                    self.raise_message(
                        BuiltinException::TypeError,
                        format!("{name}() got an unexpected keyword argument '{keyword}'"),
                    );
                    return false;
                }
                Some(index) if values[index].is_some() => {
                    self.raise_message(
                        BuiltinException::TypeError,
                        format!("{name}() got multiple values for argument '{keyword}'"),
                    );
                    return false;
                }
                Some(index) => values[index] = Some(value),
            }
        }

        let mut missing = Vec::new();
        for (index, (parameter, value)) in parameters.iter().zip(values).enumerate() {
            let default = || function.defaults.get(index).cloned().flatten();
            match value.or_else(default) {
                Some(value) => self.variables.push(parameter.name.clone(), value),
                None => missing.push(format!("'{}'", parameter.name)),
            }
        }
        if missing.is_empty() {
            return true;
        }
        let plural = if missing.len() == 1 { "" } else { "s" };
        let count = missing.len();
        let names = match missing.as_slice() {
            [only] => only.clone(),
            [first, second] => format!("{first} and {second}"),
            [init @ .., last] => format!("{}, and {last}", init.join(", ")),
            [] => String::new(),
        };
        self.raise_message(
            BuiltinException::TypeError,
            format!("{name}() missing {count} required positional argument{plural}: {names}"),
        );
        false
    }

    /// A native `__init__` allocates the instance itself; a script one gets a
    /// fresh object as `self`.
    fn construct(
        &mut self,
        class: Rc<Class>,
        args: Vec<Value>,
        keywords: Vec<(IdentName, Value)>,
    ) -> Result<Value, RuntimeError> {
        match class.find("__init__") {
            Some(Value::Native(native)) => {
                let mut class_first = Vec::with_capacity(args.len() + 1);
                class_first.push(Value::Class(class));
                class_first.extend(args);
                self.call_value(Value::Native(native), class_first, keywords)
            }
            Some(init) => {
                let object = self.arena.new_object(class);
                let mut object_first = Vec::with_capacity(args.len() + 1);
                object_first.push(object.clone());
                object_first.extend(args);
                self.call_value(init, object_first, keywords)?;
                if self.interrupted() {
                    return Ok(Value::Invalid);
                }
                Ok(object)
            }
            None => {
                if !args.is_empty() || !keywords.is_empty() {
                    self.raise_message(
                        BuiltinException::TypeError,
                        format!("{}() takes no arguments", class.name),
                    );
                    return Ok(Value::Invalid);
                }
                Ok(self.arena.new_object(class))
            }
        }
    }

    /// The body does not start running until the first `next`.
    fn make_generator(&mut self, function: Rc<Function>, environment: Vec<Binding>) -> Value {
        tracing::debug!(
            generator = %function.name(),
            bindings = environment.len(),
            "Created generator."
        );
        let blocks = vec![ExecBlock::new(
            BlockKind::FunctionBody,
            function.def.body.clone(),
        )];
        let generator = GeneratorObject::new(function, environment, blocks);
        Value::Generator(Rc::new(RefCell::new(generator)))
    }

    /// Runs a generator until its next `yield`. Returns the yielded value, or
    /// `Signal::IterationDone` once the body has finished.
    pub(super) fn resume(
        &mut self,
        generator: &Rc<RefCell<GeneratorObject>>,
    ) -> Result<Value, RuntimeError> {
        let state = generator.borrow().state;
        match state {
            GeneratorState::Exhausted => return Ok(Value::Signal(Signal::IterationDone)),
            GeneratorState::Running => {
                self.raise_message(BuiltinException::ValueError, "generator already executing");
                return Ok(Value::Invalid);
            }
            GeneratorState::Created | GeneratorState::Suspended => {}
        }
        if self.traces.len() >= self.config.max_depth {
            self.raise_message(
                BuiltinException::RecursionError,
                "maximum recursion depth exceeded",
            );
            return Ok(Value::Invalid);
        }

        let (function, environment, blocks) = {
            let mut generator = generator.borrow_mut();
            generator.state = GeneratorState::Running;
            (
                generator.function.clone(),
                std::mem::take(&mut generator.environment),
                std::mem::take(&mut generator.blocks),
            )
        };
        tracing::debug!(generator = %function.name(), ?state, "Resuming generator.");

        let frame_start = self.variables.len();
        self.variables.extend(environment);
        let saved = self.save_control();
        let mut trace = StackTrace::new(
            &**function.name(),
            TraceKind::Function,
            frame_start,
            function.def.line,
        );
        trace.blocks = blocks;
        self.traces.push(trace);

        let result = match state {
            GeneratorState::Created => self.run_block(0),
            _ => self.resume_block(0),
        };

        let trace = self.traces.pop();
        let environment = self.variables.split_off(frame_start);
        let yielded = self.yielding;
        let value = std::mem::replace(&mut self.yield_value, Value::None);
        self.restore_control(saved);

        let mut generator = generator.borrow_mut();
        if let Err(error) = result {
            generator.state = GeneratorState::Exhausted;
            return Err(error);
        }
        if yielded {
            generator.environment = environment;
            generator.blocks = trace.map(|trace| trace.blocks).unwrap_or_default();
            generator.state = GeneratorState::Suspended;
            Ok(value)
        } else {
            tracing::debug!(generator = %function.name(), "Generator exhausted.");
            generator.state = GeneratorState::Exhausted;
            Ok(Value::Signal(Signal::IterationDone))
        }
    }

    pub(super) fn make_iterator(&mut self, iterable: &Value) -> Result<Value, RuntimeError> {
        match iterable {
            Value::List(_) | Value::Tuple(_) | Value::Str(_) => Ok(Value::Iterator(Rc::new(
                RefCell::new(SequenceIterator::new(iterable.clone())),
            ))),
            Value::Generator(_) | Value::Iterator(_) => Ok(iterable.clone()),
            Value::Object(object) if object.borrow().class.find("__iter__").is_some() => {
                self.call_method(iterable, "__iter__", Vec::new())
            }
            other => {
                self.raise_message(
                    BuiltinException::TypeError,
                    format!("'{}' object is not iterable", other.type_name()),
                );
                Ok(Value::Invalid)
            }
        }
    }

    /// The next item, or `Signal::IterationDone`. A `StopIteration` raised by
    /// a script `__next__` ends the iteration instead of propagating.
    pub(super) fn get_next(&mut self, iterator: &Value) -> Result<Value, RuntimeError> {
        match iterator {
            Value::Iterator(cursor) => Ok(cursor
                .borrow_mut()
                .advance()
                .unwrap_or(Value::Signal(Signal::IterationDone))),
            Value::Generator(generator) => self.resume(generator),
            Value::Object(_) => {
                let item = self.call_method(iterator, "__next__", Vec::new())?;
                if self.stop_iteration_pending() {
                    self.exceptions.pop();
                    return Ok(Value::Signal(Signal::IterationDone));
                }
                Ok(item)
            }
            other => {
                self.raise_message(
                    BuiltinException::TypeError,
                    format!("'{}' object is not an iterator", other.type_name()),
                );
                Ok(Value::Invalid)
            }
        }
    }

    fn stop_iteration_pending(&self) -> bool {
        let stop = self.exception_class(BuiltinException::StopIteration);
        self.exceptions.last().is_some_and(|exception| match &exception.value {
            Value::Object(object) => object.borrow().class.is_subclass_of(&stop),
            _ => false,
        })
    }

    /// Calls a method found on the receiver's class with the receiver first.
    pub(super) fn call_method(
        &mut self,
        receiver: &Value,
        name: &str,
        args: Vec<Value>,
    ) -> Result<Value, RuntimeError> {
        let method = match receiver {
            Value::Object(object) => object.borrow().class.find(name),
            _ => None,
        };
        let Some(method) = method else {
            self.raise_message(
                BuiltinException::AttributeError,
                format!("'{}' object has no attribute '{name}'", receiver.type_name()),
            );
            return Ok(Value::Invalid);
        };
        let mut receiver_first = Vec::with_capacity(args.len() + 1);
        receiver_first.push(receiver.clone());
        receiver_first.extend(args);
        self.call_value(method, receiver_first, Vec::new())
    }
}
