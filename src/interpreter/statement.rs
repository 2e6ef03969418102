use super::block::{BlockKind, ExecBlock, PendingControl};
use super::error::{RuntimeError, RuntimeErrorKind};
use super::native::BuiltinException;
use super::stack::ensure_sufficient_stack;
use super::trace::{StackTrace, TraceKind};
use super::{SystemContext, TreeEvaluator};
use crate::parser::expression::{
    Expression, ExpressionAtom, ExpressionAtomKind, ExpressionNode, ExpressionNodeRef,
};
use crate::parser::statement::{
    AttributeSlot, ClassDef, ForStatement, FunctionDef, IfStatement, ImportAlias, MatchStatement,
    Pattern, Statement, StatementKind, TryStatement, WhileStatement, WithStatement,
};
use crate::string::IdentName;
use crate::value::object::{Class, Function, ModuleObject};
use crate::value::operator::{resolve_binary, values_equal};
use crate::value::registry::TypeHooks;
use crate::value::{TypeTag, Value};
use std::cell::RefCell;
use std::rc::Rc;

impl<C> TreeEvaluator<C>
where
    C: SystemContext,
{
    pub(super) fn exec_statement(&mut self, statement: &Statement) -> Result<(), RuntimeError> {
        ensure_sufficient_stack(|| self.exec_statement_inner(statement))
    }

    fn exec_statement_inner(&mut self, statement: &Statement) -> Result<(), RuntimeError> {
        self.set_line(statement.line);
        match &statement.kind {
            StatementKind::Expression(expr) => {
                self.evaluate(expr)?;
            }
            StatementKind::Assign { targets, value } => {
                let value = self.evaluate(value)?;
                if self.interrupted() {
                    return Ok(());
                }
                for target in targets {
                    self.assign(target, value.clone())?;
                    if self.interrupted() {
                        break;
                    }
                }
            }
            StatementKind::AugAssign {
                target,
                operator,
                value,
                resolved,
            } => {
                let current = self.evaluate(target)?;
                if self.interrupted() {
                    return Ok(());
                }
                let rhs = self.evaluate(value)?;
                if self.interrupted() {
                    return Ok(());
                }
                let resolved = *resolved.get_or_init(|| resolve_binary(*operator));
                let result = self.apply_binary(&resolved, current, rhs)?;
                if self.interrupted() {
                    return Ok(());
                }
                self.assign(target, result)?;
            }
            StatementKind::AnnAssign { target, value, .. } => {
                if let Some(value) = value {
                    let value = self.evaluate(value)?;
                    if !self.interrupted() {
                        self.assign(target, value)?;
                    }
                }
            }
            StatementKind::Pass => {}
            StatementKind::Break => self.loop_break = true,
            StatementKind::Continue => self.loop_continue = true,
            StatementKind::Return(value) => {
                let value = match value {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::None,
                };
                if !self.interrupted() {
                    self.return_value = Some(value);
                }
            }
            StatementKind::Raise { exception, cause } => {
                self.exec_raise(exception.as_ref(), cause.as_ref())?
            }
            StatementKind::Assert { test, message } => {
                let test = self.evaluate(test)?;
                if self.interrupted() || test.is_truthy() {
                    return Ok(());
                }
                let message = match message {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::None,
                };
                if !self.interrupted() {
                    self.raise_builtin(BuiltinException::AssertionError, message);
                }
            }
            StatementKind::If(stmt) => self.exec_if(stmt, None)?,
            StatementKind::While(stmt) => self.exec_while(stmt, statement.line, None)?,
            StatementKind::For(stmt) => self.exec_for(stmt, statement.line, None)?,
            StatementKind::Try(stmt) => self.exec_try(stmt, None)?,
            StatementKind::With(stmt) => self.exec_with(stmt, None)?,
            StatementKind::Match(stmt) => self.exec_match(stmt, None)?,
            StatementKind::FunctionDef(def) => self.define_function(def)?,
            StatementKind::ClassDef(def) => self.define_class(def)?,
            StatementKind::Import(names) => self.exec_import(names),
            StatementKind::ImportFrom { module, names } => self.exec_import_from(module, names),
        }
        Ok(())
    }

    /// The registered module called `name`, or `None` after raising `ImportError`.
    fn find_module(&mut self, name: &IdentName) -> Option<Rc<ModuleObject>> {
        let module = self.modules.iter().find(|module| module.name == *name).cloned();
        if module.is_none() {
            self.raise_message(
                BuiltinException::ImportError,
                format!("No module named '{name}'"),
            );
        }
        module
    }

    fn exec_import(&mut self, names: &[ImportAlias]) {
        for alias in names {
            let Some(module) = self.find_module(&alias.name) else {
                return;
            };
            tracing::trace!(module = %alias.name, "Imported module.");
            self.assign_name(alias.binding().clone(), Value::Module(module));
        }
    }

    fn exec_import_from(&mut self, module: &IdentName, names: &[ImportAlias]) {
        let Some(module) = self.find_module(module) else {
            return;
        };
        for alias in names {
            let Some(member) = module.find(&alias.name) else {
                self.raise_message(
                    BuiltinException::ImportError,
                    format!("cannot import name '{}' from '{}'", alias.name, module.name),
                );
                return;
            };
            self.assign_name(alias.binding().clone(), member);
        }
    }

    /// Finishes a compound statement whose child block at `level` was suspended.
    pub(super) fn resume_statement(
        &mut self,
        statement: &Statement,
        level: usize,
    ) -> Result<(), RuntimeError> {
        match &statement.kind {
            StatementKind::If(stmt) => self.exec_if(stmt, Some(level)),
            StatementKind::While(stmt) => self.exec_while(stmt, statement.line, Some(level)),
            StatementKind::For(stmt) => self.exec_for(stmt, statement.line, Some(level)),
            StatementKind::Try(stmt) => self.exec_try(stmt, Some(level)),
            StatementKind::With(stmt) => self.exec_with(stmt, Some(level)),
            StatementKind::Match(stmt) => self.exec_match(stmt, Some(level)),
            _ => Err(self.error(RuntimeErrorKind::InvalidResume)),
        }
    }

    fn exec_raise(
        &mut self,
        exception: Option<&Expression>,
        cause: Option<&Expression>,
    ) -> Result<(), RuntimeError> {
        let Some(exception) = exception else {
            match self.handled_exception() {
                Some(active) => self.exceptions.push(active),
                None => self.raise_message(
                    BuiltinException::RuntimeError,
                    "No active exception to reraise",
                ),
            }
            return Ok(());
        };
        let value = self.evaluate(exception)?;
        if self.interrupted() {
            return Ok(());
        }
        let Some(value) = self.instantiate_exception(value)? else {
            return Ok(());
        };
        let cause = match cause {
            Some(expr) => {
                let cause = self.evaluate(expr)?;
                if self.interrupted() {
                    return Ok(());
                }
                if cause.is_none() {
                    None
                } else {
                    match self.instantiate_exception(cause)? {
                        Some(cause) => Some(cause),
                        None => return Ok(()),
                    }
                }
            }
            None => None,
        };
        self.raise(value, cause);
        Ok(())
    }

    /// A raised class is called with no arguments. Anything that is not an
    /// exception raises `TypeError` instead and yields `None`.
    fn instantiate_exception(&mut self, value: Value) -> Result<Option<Value>, RuntimeError> {
        let value = match value {
            Value::Class(_) => {
                let instance = self.call_value(value, Vec::new(), Vec::new())?;
                if self.interrupted() {
                    return Ok(None);
                }
                instance
            }
            value => value,
        };
        if self.is_exception(&value) {
            Ok(Some(value))
        } else {
            self.raise_message(
                BuiltinException::TypeError,
                "exceptions must derive from BaseException",
            );
            Ok(None)
        }
    }

    fn exec_if(&mut self, stmt: &IfStatement, resume: Option<usize>) -> Result<(), RuntimeError> {
        if let Some(level) = resume {
            self.resume_block(level)?;
            return Ok(());
        }
        let test = self.evaluate(&stmt.test)?;
        if self.interrupted() {
            return Ok(());
        }
        let body = if test.is_truthy() {
            stmt.body.clone()
        } else {
            stmt.orelse.clone()
        };
        if !body.is_empty() {
            self.enter_block(ExecBlock::new(BlockKind::IfBody, body))?;
        }
        Ok(())
    }

    /// Consumes a `break` or `continue` after one loop iteration. True when
    /// the loop has to stop.
    fn finish_iteration(&mut self) -> bool {
        if self.loop_break {
            self.loop_break = false;
            return true;
        }
        self.loop_continue = false;
        self.return_value.is_some() || !self.exceptions.is_empty()
    }

    fn exec_while(
        &mut self,
        stmt: &WhileStatement,
        line: u32,
        resume: Option<usize>,
    ) -> Result<(), RuntimeError> {
        if let Some(level) = resume {
            let kind = self.block(level)?.kind;
            self.resume_block(level)?;
            if self.yielding || kind == BlockKind::WhileElse || self.finish_iteration() {
                return Ok(());
            }
        }
        loop {
            self.set_line(line);
            let test = self.evaluate(&stmt.test)?;
            if self.interrupted() {
                return Ok(());
            }
            if !test.is_truthy() {
                if !stmt.orelse.is_empty() {
                    self.enter_block(ExecBlock::new(BlockKind::WhileElse, stmt.orelse.clone()))?;
                }
                return Ok(());
            }
            self.enter_block(ExecBlock::new(BlockKind::WhileBody, stmt.body.clone()))?;
            if self.yielding || self.finish_iteration() {
                return Ok(());
            }
        }
    }

    fn exec_for(
        &mut self,
        stmt: &ForStatement,
        line: u32,
        resume: Option<usize>,
    ) -> Result<(), RuntimeError> {
        let iterator = match resume {
            Some(level) => {
                let (kind, iterator) = {
                    let block = self.block(level)?;
                    (block.kind, block.iterator.clone())
                };
                self.resume_block(level)?;
                if self.yielding || kind == BlockKind::ForElse || self.finish_iteration() {
                    return Ok(());
                }
                iterator.ok_or_else(|| self.error(RuntimeErrorKind::InvalidResume))?
            }
            None => {
                let iterable = self.evaluate(&stmt.iter)?;
                if self.interrupted() {
                    return Ok(());
                }
                let iterator = self.make_iterator(&iterable)?;
                if self.interrupted() {
                    return Ok(());
                }
                iterator
            }
        };
        loop {
            self.set_line(line);
            let item = self.get_next(&iterator)?;
            if self.interrupted() {
                return Ok(());
            }
            if item.is_done() {
                if !stmt.orelse.is_empty() {
                    self.enter_block(ExecBlock::new(BlockKind::ForElse, stmt.orelse.clone()))?;
                }
                return Ok(());
            }
            self.assign(&stmt.target, item)?;
            if self.interrupted() {
                return Ok(());
            }
            let block =
                ExecBlock::new(BlockKind::ForBody, stmt.body.clone()).with_iterator(iterator.clone());
            self.enter_block(block)?;
            if self.yielding || self.finish_iteration() {
                return Ok(());
            }
        }
    }

    fn exec_try(
        &mut self,
        stmt: &Rc<TryStatement>,
        resume: Option<usize>,
    ) -> Result<(), RuntimeError> {
        if let Some(level) = resume {
            let (kind, saved) = {
                let block = self.block(level)?;
                (block.kind, block.saved.clone())
            };
            self.resume_block(level)?;
            if self.yielding {
                return Ok(());
            }
            return match kind {
                BlockKind::TryBody => self.after_try_body(stmt),
                BlockKind::TryHandler | BlockKind::TryElse => self.run_finally(stmt),
                BlockKind::TryFinally => {
                    self.settle_finally(saved);
                    Ok(())
                }
                _ => Err(self.error(RuntimeErrorKind::InvalidResume)),
            };
        }
        let block = ExecBlock::new(BlockKind::TryBody, stmt.body.clone());
        self.enter_block(block)?;
        if self.yielding {
            return Ok(());
        }
        self.after_try_body(stmt)
    }

    fn after_try_body(&mut self, stmt: &Rc<TryStatement>) -> Result<(), RuntimeError> {
        if !self.exceptions.is_empty() {
            if !stmt.handlers.is_empty() {
                self.match_handler(stmt)?;
            }
        } else if !self.unwinding() && !stmt.orelse.is_empty() {
            self.enter_block(ExecBlock::new(BlockKind::TryElse, stmt.orelse.clone()))?;
        }
        if self.yielding {
            return Ok(());
        }
        self.run_finally(stmt)
    }

    /// Runs the first handler matching the pending exception. The exception
    /// stays pending when none matches.
    fn match_handler(&mut self, stmt: &TryStatement) -> Result<(), RuntimeError> {
        let Some(exception) = self.exceptions.pop() else {
            return Ok(());
        };
        for handler in &stmt.handlers {
            let matched = match &handler.kind {
                None => true,
                Some(kind) => {
                    self.set_line(handler.line);
                    let kind = self.evaluate(kind)?;
                    if self.interrupted() {
                        return Ok(());
                    }
                    match exception_matches(&exception.value, &kind) {
                        Some(matched) => matched,
                        None => {
                            self.raise_message(
                                BuiltinException::TypeError,
                                "catching classes that do not inherit from BaseException is not allowed",
                            );
                            return Ok(());
                        }
                    }
                }
            };
            if matched {
                tracing::trace!(
                    exception = %exception.value.type_name(),
                    line = handler.line,
                    "Handled exception."
                );
                if let Some(name) = &handler.name {
                    self.assign_name(name.clone(), exception.value.clone());
                }
                let block =
                    ExecBlock::new(BlockKind::TryHandler, handler.body.clone()).with_handled(exception);
                self.enter_block(block)?;
                return Ok(());
            }
        }
        self.exceptions.push(exception);
        Ok(())
    }

    /// Runs `finally` with any pending return, break or exception parked.
    fn run_finally(&mut self, stmt: &TryStatement) -> Result<(), RuntimeError> {
        if stmt.finalbody.is_empty() {
            return Ok(());
        }
        let pending = self.take_pending();
        let block =
            ExecBlock::new(BlockKind::TryFinally, stmt.finalbody.clone()).with_saved(pending.clone());
        self.enter_block(block)?;
        if self.yielding {
            return Ok(());
        }
        self.settle_finally(Some(pending));
        Ok(())
    }

    /// Control raised inside `finally` replaces whatever was parked.
    fn settle_finally(&mut self, saved: Option<PendingControl>) {
        if self.unwinding() {
            return;
        }
        if let Some(pending) = saved {
            self.restore_pending(pending);
        }
    }

    fn exec_with(&mut self, stmt: &WithStatement, resume: Option<usize>) -> Result<(), RuntimeError> {
        if let Some(level) = resume {
            let resources = self.block(level)?.resources.clone();
            self.resume_block(level)?;
            if self.yielding {
                return Ok(());
            }
            return self.finish_with(resources);
        }
        let mut resources = Vec::with_capacity(stmt.items.len());
        for item in &stmt.items {
            let manager = self.evaluate(&item.context)?;
            if self.interrupted() {
                break;
            }
            let entered = self.call_method(&manager, "__enter__", Vec::new())?;
            if self.interrupted() {
                break;
            }
            resources.push(manager);
            if let Some(target) = &item.target {
                self.assign(target, entered)?;
                if self.interrupted() {
                    break;
                }
            }
        }
        if !self.interrupted() {
            let block =
                ExecBlock::new(BlockKind::WithBody, stmt.body.clone()).with_resources(resources.clone());
            self.enter_block(block)?;
        }
        if self.yielding {
            return Ok(());
        }
        self.finish_with(resources)
    }

    /// Calls `__exit__` once per entered manager, in entry order. A truthy
    /// result swallows the pending exception.
    fn finish_with(&mut self, resources: Vec<Value>) -> Result<(), RuntimeError> {
        for manager in resources {
            let pending = self.exceptions.pop();
            let args = match &pending {
                Some(exception) => {
                    let kind = match &exception.value {
                        Value::Object(object) => Value::Class(object.borrow().class.clone()),
                        other => other.clone(),
                    };
                    vec![kind, exception.value.clone(), Value::None]
                }
                None => vec![Value::None, Value::None, Value::None],
            };
            let suppress = self.call_method(&manager, "__exit__", args)?;
            if !self.exceptions.is_empty() {
                continue;
            }
            if let Some(exception) = pending {
                if !suppress.is_truthy() {
                    self.exceptions.push(exception);
                }
            }
        }
        Ok(())
    }

    fn exec_match(&mut self, stmt: &MatchStatement, resume: Option<usize>) -> Result<(), RuntimeError> {
        if let Some(level) = resume {
            self.resume_block(level)?;
            return Ok(());
        }
        let subject = self.evaluate(&stmt.subject)?;
        if self.interrupted() {
            return Ok(());
        }
        for case in &stmt.cases {
            let matched = self.match_pattern(&case.pattern, &subject)?;
            if self.interrupted() {
                return Ok(());
            }
            if !matched {
                continue;
            }
            if let Some(guard) = &case.guard {
                let guard = self.evaluate(guard)?;
                if self.interrupted() {
                    return Ok(());
                }
                if !guard.is_truthy() {
                    continue;
                }
            }
            if !case.body.is_empty() {
                self.enter_block(ExecBlock::new(BlockKind::MatchBody, case.body.clone()))?;
            }
            return Ok(());
        }
        Ok(())
    }

    fn match_pattern(&mut self, pattern: &Pattern, subject: &Value) -> Result<bool, RuntimeError> {
        match pattern {
            Pattern::Wildcard => Ok(true),
            Pattern::Capture(name) => {
                self.assign_name(name.clone(), subject.clone());
                Ok(true)
            }
            Pattern::Value(expr) => {
                let value = self.evaluate(expr)?;
                Ok(!self.interrupted() && values_equal(subject, &value))
            }
            Pattern::Sequence(patterns) => {
                let items = match subject {
                    Value::List(items) => items.borrow().clone(),
                    Value::Tuple(items) => items.to_vec(),
                    _ => return Ok(false),
                };
                self.match_sequence(patterns, &items)
            }
            // Only meaningful inside a sequence.
            Pattern::Star(_) => Ok(false),
            Pattern::Or(alternatives) => {
                for alternative in alternatives {
                    if self.match_pattern(alternative, subject)? {
                        return Ok(true);
                    }
                    if self.interrupted() {
                        return Ok(false);
                    }
                }
                Ok(false)
            }
            Pattern::As { pattern, name } => {
                let matched = self.match_pattern(pattern, subject)?;
                if matched {
                    self.assign_name(name.clone(), subject.clone());
                }
                Ok(matched)
            }
            Pattern::Class {
                class,
                positional,
                keywords,
            } => self.match_class(class, positional, keywords, subject),
        }
    }

    fn match_sequence(&mut self, patterns: &[Pattern], items: &[Value]) -> Result<bool, RuntimeError> {
        let star = patterns
            .iter()
            .position(|pattern| matches!(pattern, Pattern::Star(_)));
        let Some(star) = star else {
            if patterns.len() != items.len() {
                return Ok(false);
            }
            for (pattern, item) in patterns.iter().zip(items) {
                if !self.match_pattern(pattern, item)? {
                    return Ok(false);
                }
            }
            return Ok(true);
        };
        let after = patterns.len() - star - 1;
        if items.len() < star + after {
            return Ok(false);
        }
        for (pattern, item) in patterns[..star].iter().zip(items) {
            if !self.match_pattern(pattern, item)? {
                return Ok(false);
            }
        }
        let tail = items.len() - after;
        for (pattern, item) in patterns[star + 1..].iter().zip(&items[tail..]) {
            if !self.match_pattern(pattern, item)? {
                return Ok(false);
            }
        }
        if let Pattern::Star(Some(name)) = &patterns[star] {
            self.assign_name(name.clone(), Value::list(items[star..tail].to_vec()));
        }
        Ok(true)
    }

    fn match_class(
        &mut self,
        class: &Expression,
        positional: &[Pattern],
        keywords: &[(IdentName, Pattern)],
        subject: &Value,
    ) -> Result<bool, RuntimeError> {
        let class = self.evaluate(class)?;
        if self.interrupted() {
            return Ok(false);
        }
        let class = match class {
            Value::Class(class) => class,
            // `case int(x)` style checks on built-in values bind the value itself.
            Value::Native(native) => {
                let matches = match native.name {
                    "int" => subject.is_integer(),
                    "float" => subject.is_float(),
                    "str" => subject.tag() == TypeTag::STR,
                    "bool" => subject.tag() == TypeTag::BOOL,
                    _ => false,
                };
                return match (matches, positional) {
                    (false, _) => Ok(false),
                    (true, []) => Ok(keywords.is_empty()),
                    (true, [pattern]) => self.match_pattern(pattern, subject),
                    (true, _) => Ok(false),
                };
            }
            other => {
                self.raise_message(
                    BuiltinException::TypeError,
                    format!("called match pattern must be a class, not '{}'", other.type_name()),
                );
                return Ok(false);
            }
        };
        let Value::Object(object) = subject else {
            return Ok(false);
        };
        if !object.borrow().class.is_subclass_of(&class) {
            return Ok(false);
        }
        let names = match_arguments(&class);
        if positional.len() > names.len() {
            self.raise_message(
                BuiltinException::TypeError,
                format!(
                    "{}() accepts {} positional sub-pattern{} ({} given)",
                    class.name,
                    names.len(),
                    if names.len() == 1 { "" } else { "s" },
                    positional.len()
                ),
            );
            return Ok(false);
        }
        let named = positional
            .iter()
            .zip(names.iter())
            .map(|(pattern, name)| (name.clone(), pattern))
            .chain(keywords.iter().map(|(name, pattern)| (name.clone(), pattern)));
        for (name, pattern) in named.collect::<Vec<_>>() {
            let attribute = {
                let object = object.borrow();
                object.get(&name).or_else(|| object.class.find(&name))
            };
            let Some(attribute) = attribute else {
                return Ok(false);
            };
            if !self.match_pattern(pattern, &attribute)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn define_function(&mut self, def: &Rc<FunctionDef>) -> Result<(), RuntimeError> {
        let mut defaults = Vec::with_capacity(def.parameters.len());
        for parameter in &def.parameters {
            let default = match &parameter.default {
                Some(expr) => {
                    let value = self.evaluate(expr)?;
                    if self.interrupted() {
                        return Ok(());
                    }
                    Some(value)
                }
                None => None,
            };
            defaults.push(default);
        }
        let closure = match self.trace()?.kind {
            TraceKind::Function => Some(self.variables.slice(self.frame_start()).to_vec()),
            TraceKind::Module | TraceKind::Class => None,
        };
        let function = Function {
            def: def.clone(),
            defaults,
            closure,
        };
        self.assign_name(def.name.clone(), Value::Function(Rc::new(function)));
        Ok(())
    }

    /// Runs the class body in its own frame; whatever it binds becomes the
    /// class namespace.
    fn define_class(&mut self, def: &Rc<ClassDef>) -> Result<(), RuntimeError> {
        let mut bases = Vec::with_capacity(def.bases.len());
        for base in &def.bases {
            match self.evaluate(base)? {
                _ if self.interrupted() => return Ok(()),
                Value::Class(class) => bases.push(class),
                other => {
                    self.raise_message(
                        BuiltinException::TypeError,
                        format!("bases must be types, not '{}'", other.type_name()),
                    );
                    return Ok(());
                }
            }
        }

        let hooks = bases
            .first()
            .and_then(|base| self.registry.get(base.tag))
            .map(|metadata| metadata.hooks)
            .unwrap_or_else(TypeHooks::object);
        let tag = self.registry.register(&def.name, hooks);

        let mut names: Vec<IdentName> = Vec::new();
        let own = def.layout.get().cloned().unwrap_or_else(|| Rc::new([]));
        let inherited = bases.iter().flat_map(|base| base.layout.iter());
        for slot in inherited.chain(own.iter()) {
            if !names.contains(&slot.name) {
                names.push(slot.name.clone());
            }
        }
        let layout: Rc<[AttributeSlot]> = names
            .into_iter()
            .enumerate()
            .map(|(offset, name)| AttributeSlot {
                name,
                offset: offset as u32,
            })
            .collect();

        let frame_start = self.variables.len();
        self.traces.push(StackTrace::new(
            &*def.name,
            TraceKind::Class,
            frame_start,
            def.line,
        ));
        let result = self.enter_block(ExecBlock::new(BlockKind::ClassBody, def.body.clone()));
        self.traces.pop();
        let namespace = self.variables.split_off(frame_start);
        result?;
        if self.interrupted() {
            return Ok(());
        }

        tracing::debug!(class = %def.name, ?tag, slots = layout.len(), "Defined class.");
        let class = Class {
            name: def.name.clone(),
            tag,
            bases,
            namespace: RefCell::new(namespace),
            layout,
        };
        self.assign_name(def.name.clone(), Value::Class(Rc::new(class)));
        Ok(())
    }

    pub(super) fn assign(&mut self, target: &Expression, value: Value) -> Result<(), RuntimeError> {
        self.assign_node(target, target.root, value)
    }

    fn assign_node(
        &mut self,
        expr: &Expression,
        node: ExpressionNodeRef,
        value: Value,
    ) -> Result<(), RuntimeError> {
        let node = expr
            .get_node(&node)
            .ok_or_else(|| self.error(RuntimeErrorKind::MalformedTree))?;
        match node {
            ExpressionNode::Atom(ExpressionAtom {
                kind: ExpressionAtomKind::Identifier(name),
                ..
            }) => {
                self.assign_name(name.clone(), value);
                Ok(())
            }
            ExpressionNode::Group { inner } => self.assign_node(expr, *inner, value),
            ExpressionNode::Attribute { value: object, name } => {
                let object = self.evaluate_node(expr, *object)?;
                if self.interrupted() {
                    return Ok(());
                }
                self.set_attribute(&object, name, value)
            }
            ExpressionNode::Subscript {
                value: container,
                index,
            } => {
                let container = self.evaluate_node(expr, *container)?;
                if self.interrupted() {
                    return Ok(());
                }
                let index = self.evaluate_node(expr, *index)?;
                if self.interrupted() {
                    return Ok(());
                }
                self.set_item(&container, &index, value)
            }
            ExpressionNode::Tuple { elements, .. } | ExpressionNode::List { elements, .. } => {
                let items = self.unpack(value, elements.len())?;
                if self.interrupted() {
                    return Ok(());
                }
                for (element, item) in elements.iter().zip(items) {
                    self.assign_node(expr, *element, item)?;
                    if self.interrupted() {
                        break;
                    }
                }
                Ok(())
            }
            _ => Err(self.error(RuntimeErrorKind::InvalidTarget)),
        }
    }

    /// Splits a sequence or iterator into exactly `expected` values.
    fn unpack(&mut self, value: Value, expected: usize) -> Result<Vec<Value>, RuntimeError> {
        let items = match &value {
            Value::List(items) => items.borrow().clone(),
            Value::Tuple(items) => items.to_vec(),
            Value::Str(text) => text.chars().map(|c| Value::str(c.to_string())).collect(),
            _ => {
                let iterator = self.make_iterator(&value)?;
                let mut items = Vec::new();
                while !self.interrupted() {
                    let item = self.get_next(&iterator)?;
                    if item.is_done() || self.interrupted() {
                        break;
                    }
                    items.push(item);
                }
                if self.interrupted() {
                    return Ok(Vec::new());
                }
                items
            }
        };
        if items.len() != expected {
            return Err(self.error(RuntimeErrorKind::TupleArity {
                expected,
                actual: items.len(),
            }));
        }
        Ok(items)
    }
}

/// `None` when `kind` is not something an `except` clause can name.
fn exception_matches(value: &Value, kind: &Value) -> Option<bool> {
    match kind {
        Value::Class(class) => Some(match value {
            Value::Object(object) => object.borrow().class.is_subclass_of(class),
            _ => false,
        }),
        Value::Tuple(kinds) => {
            let mut matched = false;
            for kind in kinds.iter() {
                matched |= exception_matches(value, kind)?;
            }
            Some(matched)
        }
        _ => None,
    }
}

/// Attribute names positional class sub-patterns bind to: `__match_args__`
/// when the class declares it, the instance layout otherwise.
fn match_arguments(class: &Class) -> Vec<IdentName> {
    match class.find("__match_args__") {
        Some(Value::Tuple(names)) => names
            .iter()
            .filter_map(|name| match name {
                Value::Str(name) => Some(IdentName::from(name.as_str())),
                _ => None,
            })
            .collect(),
        _ => class.layout.iter().map(|slot| slot.name.clone()).collect(),
    }
}
