use super::error::{RuntimeError, RuntimeErrorKind};
use super::native::{bind_list_method, BuiltinException};
use super::stack::ensure_sufficient_stack;
use super::{SystemContext, TreeEvaluator};
use crate::parser::expression::{
    BoolOperator, Expression, ExpressionAtom, ExpressionAtomKind, ExpressionNode, ExpressionNodeRef,
};
use crate::string::IdentName;
use crate::value::error::OperatorError;
use crate::value::object::BoundMethod;
use crate::value::operator::{
    resolve_binary, resolve_compare, resolve_unary, ResolvedBinary, ResolvedUnary,
};
use crate::value::{Signal, Value};
use std::rc::Rc;

impl<C> TreeEvaluator<C>
where
    C: SystemContext,
{
    pub(super) fn evaluate(&mut self, expr: &Expression) -> Result<Value, RuntimeError> {
        self.evaluate_node(expr, expr.root)
    }

    /// Evaluates one node. Once an exception or a yield interrupts evaluation
    /// the remaining operands are skipped and `Value::Invalid` comes back.
    pub(super) fn evaluate_node(
        &mut self,
        expr: &Expression,
        node: ExpressionNodeRef,
    ) -> Result<Value, RuntimeError> {
        ensure_sufficient_stack(|| self.evaluate_node_inner(expr, node))
    }

    fn evaluate_node_inner(
        &mut self,
        expr: &Expression,
        node: ExpressionNodeRef,
    ) -> Result<Value, RuntimeError> {
        let node = expr
            .get_node(&node)
            .ok_or_else(|| self.error(RuntimeErrorKind::MalformedTree))?;
        match node {
            ExpressionNode::Atom(atom) => Ok(self.evaluate_atom(atom)),
            ExpressionNode::Group { inner } => self.evaluate_node(expr, *inner),
            ExpressionNode::Unary {
                operator,
                rhs,
                resolved,
            } => {
                let operand = self.evaluate_node(expr, *rhs)?;
                if self.interrupted() {
                    return Ok(Value::Invalid);
                }
                let resolved = *resolved.get_or_init(|| resolve_unary(*operator));
                self.apply_unary(&resolved, operand)
            }
            ExpressionNode::Binary {
                operator,
                lhs,
                rhs,
                resolved,
            } => {
                let lhs = self.evaluate_node(expr, *lhs)?;
                if self.interrupted() {
                    return Ok(Value::Invalid);
                }
                let rhs = self.evaluate_node(expr, *rhs)?;
                if self.interrupted() {
                    return Ok(Value::Invalid);
                }
                let resolved = *resolved.get_or_init(|| resolve_binary(*operator));
                self.apply_binary(&resolved, lhs, rhs)
            }
            ExpressionNode::BoolOp { operator, lhs, rhs } => {
                let lhs = self.evaluate_node(expr, *lhs)?;
                if self.interrupted() {
                    return Ok(Value::Invalid);
                }
                let short_circuit = match operator {
                    BoolOperator::And => !lhs.is_truthy(),
                    BoolOperator::Or => lhs.is_truthy(),
                };
                if short_circuit {
                    Ok(lhs)
                } else {
                    self.evaluate_node(expr, *rhs)
                }
            }
            ExpressionNode::Compare { first, links } => {
                let mut lhs = self.evaluate_node(expr, *first)?;
                if self.interrupted() {
                    return Ok(Value::Invalid);
                }
                let mut result = Value::Bool(true);
                for link in links {
                    let rhs = self.evaluate_node(expr, link.rhs)?;
                    if self.interrupted() {
                        return Ok(Value::Invalid);
                    }
                    let resolved = *link.resolved.get_or_init(|| resolve_compare(link.operator));
                    result = self.apply_binary(&resolved, lhs, rhs.clone())?;
                    if self.interrupted() || !result.is_truthy() {
                        return Ok(result);
                    }
                    lhs = rhs;
                }
                Ok(result)
            }
            ExpressionNode::IfExp { test, body, orelse } => {
                let test = self.evaluate_node(expr, *test)?;
                if self.interrupted() {
                    return Ok(Value::Invalid);
                }
                let branch = if test.is_truthy() { body } else { orelse };
                self.evaluate_node(expr, *branch)
            }
            ExpressionNode::Call {
                callee,
                arguments,
                keywords,
                line,
            } => {
                let callee = self.evaluate_node(expr, *callee)?;
                if self.interrupted() {
                    return Ok(Value::Invalid);
                }
                let mut args = Vec::with_capacity(arguments.len());
                for argument in arguments {
                    let value = self.evaluate_node(expr, *argument)?;
                    if self.interrupted() {
                        return Ok(Value::Invalid);
                    }
                    args.push(value);
                }
                let mut named: Vec<(IdentName, Value)> = Vec::with_capacity(keywords.len());
                for keyword in keywords {
                    let value = self.evaluate_node(expr, keyword.value)?;
                    if self.interrupted() {
                        return Ok(Value::Invalid);
                    }
                    named.push((keyword.name.clone(), value));
                }
                self.set_line(*line);
                self.call_value(callee, args, named)
            }
            ExpressionNode::Attribute { value, name } => {
                let object = self.evaluate_node(expr, *value)?;
                if self.interrupted() {
                    return Ok(Value::Invalid);
                }
                self.get_attribute(&object, name)
            }
            ExpressionNode::Subscript { value, index } => {
                let container = self.evaluate_node(expr, *value)?;
                if self.interrupted() {
                    return Ok(Value::Invalid);
                }
                let index = self.evaluate_node(expr, *index)?;
                if self.interrupted() {
                    return Ok(Value::Invalid);
                }
                self.get_item(&container, &index)
            }
            ExpressionNode::Tuple { elements, .. } => {
                let items = self.evaluate_elements(expr, elements)?;
                Ok(items.map(Value::tuple).unwrap_or_default())
            }
            ExpressionNode::List { elements, .. } => {
                let items = self.evaluate_elements(expr, elements)?;
                Ok(items.map(Value::list).unwrap_or_default())
            }
            ExpressionNode::Yield { value, .. } => {
                if self.resuming {
                    // Re-entering the statement that yielded: the yield
                    // expression itself evaluates to the sent value.
                    self.resuming = false;
                    return Ok(Value::None);
                }
                let value = match value {
                    Some(value) => self.evaluate_node(expr, *value)?,
                    None => Value::None,
                };
                if self.interrupted() {
                    return Ok(Value::Invalid);
                }
                self.yield_value = value;
                self.yielding = true;
                Ok(Value::Signal(Signal::Paused))
            }
        }
    }

    fn evaluate_atom(&self, atom: &ExpressionAtom) -> Value {
        match &atom.kind {
            ExpressionAtomKind::Integer(v) => Value::I64(*v),
            ExpressionAtomKind::Float(v) => Value::F64(*v),
            ExpressionAtomKind::Bool(v) => Value::Bool(*v),
            ExpressionAtomKind::None => Value::None,
            ExpressionAtomKind::StringLiteral(text) => Value::Str(text.clone()),
            ExpressionAtomKind::Identifier(name) => self.lookup(name),
        }
    }

    fn evaluate_elements(
        &mut self,
        expr: &Expression,
        elements: &[ExpressionNodeRef],
    ) -> Result<Option<Vec<Value>>, RuntimeError> {
        let mut items = Vec::with_capacity(elements.len());
        for element in elements {
            let value = self.evaluate_node(expr, *element)?;
            if self.interrupted() {
                return Ok(None);
            }
            items.push(value);
        }
        Ok(Some(items))
    }

    /// Calls the left operand's dunder method when its class defines one,
    /// the bound native operator otherwise.
    pub(super) fn apply_binary(
        &mut self,
        resolved: &ResolvedBinary,
        lhs: Value,
        rhs: Value,
    ) -> Result<Value, RuntimeError> {
        if let (Some(dunder), Value::Object(object)) = (resolved.dunder, &lhs) {
            let method = object.borrow().class.find(dunder);
            if let Some(method) = method {
                return self.call_value(method, vec![lhs.clone(), rhs], Vec::new());
            }
        }
        match (resolved.native)(&lhs, &rhs) {
            Ok(value) => Ok(value),
            Err(error) => {
                self.raise_operator_error(error);
                Ok(Value::Invalid)
            }
        }
    }

    pub(super) fn apply_unary(
        &mut self,
        resolved: &ResolvedUnary,
        operand: Value,
    ) -> Result<Value, RuntimeError> {
        if let (Some(dunder), Value::Object(object)) = (resolved.dunder, &operand) {
            let method = object.borrow().class.find(dunder);
            if let Some(method) = method {
                return self.call_value(method, vec![operand.clone()], Vec::new());
            }
        }
        match (resolved.native)(&operand) {
            Ok(value) => Ok(value),
            Err(error) => {
                self.raise_operator_error(error);
                Ok(Value::Invalid)
            }
        }
    }

    fn raise_operator_error(&mut self, error: OperatorError) {
        let kind = match error {
            OperatorError::ZeroDivision => BuiltinException::ZeroDivisionError,
            OperatorError::Overflow(_) => BuiltinException::ValueError,
            OperatorError::Unsupported { .. } | OperatorError::BadOperand { .. } => {
                BuiltinException::TypeError
            }
        };
        self.raise_message(kind, error.to_string());
    }

    /// Instance slots first, then class members; functions found on the class
    /// come back bound to the instance.
    pub(super) fn get_attribute(&mut self, value: &Value, name: &str) -> Result<Value, RuntimeError> {
        match value {
            Value::Object(object) => {
                let (slot, member) = {
                    let object = object.borrow();
                    (object.get(name), object.class.find(name))
                };
                if let Some(slot) = slot {
                    return Ok(slot);
                }
                match member {
                    Some(method @ (Value::Function(_) | Value::Native(_))) => {
                        Ok(Value::BoundMethod(Rc::new(BoundMethod {
                            receiver: value.clone(),
                            method,
                        })))
                    }
                    Some(member) => Ok(member),
                    None => Err(self.error(RuntimeErrorKind::UndefinedAttribute {
                        type_name: value.type_name(),
                        name: name.into(),
                    })),
                }
            }
            Value::Class(class) => class.find(name).ok_or_else(|| {
                self.error(RuntimeErrorKind::UndefinedAttribute {
                    type_name: class.name.to_string(),
                    name: name.into(),
                })
            }),
            Value::Module(module) => match module.find(name) {
                Some(member) => Ok(member),
                None => {
                    self.raise_message(
                        BuiltinException::AttributeError,
                        format!("module '{}' has no attribute '{name}'", module.name),
                    );
                    Ok(Value::Invalid)
                }
            },
            other => match bind_list_method(other, name) {
                Some(method) => Ok(method),
                None => {
                    self.raise_message(
                        BuiltinException::AttributeError,
                        format!("'{}' object has no attribute '{name}'", other.type_name()),
                    );
                    Ok(Value::Invalid)
                }
            },
        }
    }

    pub(super) fn set_attribute(
        &mut self,
        target: &Value,
        name: &IdentName,
        value: Value,
    ) -> Result<(), RuntimeError> {
        match target {
            Value::Object(object) => {
                if object.borrow_mut().set(name, value) {
                    Ok(())
                } else {
                    Err(self.error(RuntimeErrorKind::UndefinedAttribute {
                        type_name: target.type_name(),
                        name: name.to_string(),
                    }))
                }
            }
            Value::Class(class) => {
                class.set(name.clone(), value);
                Ok(())
            }
            other => {
                self.raise_message(
                    BuiltinException::AttributeError,
                    format!(
                        "'{}' object attribute '{name}' is read-only",
                        other.type_name()
                    ),
                );
                Ok(())
            }
        }
    }

    pub(super) fn get_item(&mut self, container: &Value, index: &Value) -> Result<Value, RuntimeError> {
        let item = match container {
            Value::List(items) => {
                let length = items.borrow().len();
                self.sequence_index("list", index, length)
                    .and_then(|i| items.borrow().get(i).cloned())
            }
            Value::Tuple(items) => self
                .sequence_index("tuple", index, items.len())
                .and_then(|i| items.get(i).cloned()),
            Value::Str(text) => {
                let length = text.chars().count();
                self.sequence_index("string", index, length)
                    .and_then(|i| text.chars().nth(i))
                    .map(|c| Value::str(c.to_string()))
            }
            Value::Object(object) if object.borrow().class.find("__getitem__").is_some() => {
                return self.call_method(container, "__getitem__", vec![index.clone()]);
            }
            other => {
                self.raise_message(
                    BuiltinException::TypeError,
                    format!("'{}' object is not subscriptable", other.type_name()),
                );
                None
            }
        };
        Ok(item.unwrap_or_default())
    }

    pub(super) fn set_item(
        &mut self,
        container: &Value,
        index: &Value,
        value: Value,
    ) -> Result<(), RuntimeError> {
        match container {
            Value::List(items) => {
                let length = items.borrow().len();
                if let Some(i) = self.sequence_index("list assignment", index, length) {
                    items.borrow_mut()[i] = value;
                }
            }
            Value::Object(object) if object.borrow().class.find("__setitem__").is_some() => {
                self.call_method(container, "__setitem__", vec![index.clone(), value])?;
            }
            other => self.raise_message(
                BuiltinException::TypeError,
                format!(
                    "'{}' object does not support item assignment",
                    other.type_name()
                ),
            ),
        }
        Ok(())
    }

    /// Maps a possibly negative index into `0..length`, raising when it is
    /// not an integer or falls outside.
    fn sequence_index(&mut self, kind: &str, index: &Value, length: usize) -> Option<usize> {
        let Some(position) = index.as_integer() else {
            let sequence = kind.split(' ').next().unwrap_or(kind);
            self.raise_message(
                BuiltinException::TypeError,
                format!(
                    "{sequence} indices must be integers, not {}",
                    index.type_name()
                ),
            );
            return None;
        };
        let length = length as i128;
        let position = if position < 0 { position + length } else { position };
        if (0..length).contains(&position) {
            Some(position as usize)
        } else {
            self.raise_message(
                BuiltinException::IndexError,
                format!("{kind} index out of range"),
            );
            None
        }
    }
}
