//! Expression evaluation.

use std::sync::Arc;

use rill_ir::{BinaryOp, CallArgExpr, ExprId, ExprKind, Location, Name, UnaryOp};
use rill_runtime::errors::{type_mismatch, undefined_member};
use rill_runtime::{Array, CallArg, EvalError, EvalResult, Frame, HeapObject, Value};

use super::Interpreter;

impl Interpreter {
    /// Evaluate one expression of the current arena.
    pub fn eval_expr(&mut self, id: ExprId) -> EvalResult {
        let ast = Arc::clone(&self.ast);
        let expr = ast.expr(id);
        self.nested(|interp| interp.eval_kind(&expr.kind, expr.loc))
            .map_err(|e| e.located_at(expr.loc))
    }

    fn eval_kind(&mut self, kind: &ExprKind, loc: Location) -> EvalResult {
        match kind {
            ExprKind::Literal(literal) => Ok(Value::from_literal(*literal, self.context().names())),
            ExprKind::Array(items) => self.eval_array(items),
            ExprKind::Sequence(items) => {
                let values = self.eval_all(items)?;
                Ok(self
                    .context()
                    .with_heap(|heap| heap.alloc_value(HeapObject::Sequence(values))))
            }
            ExprKind::FrameLit(body) => {
                let frame = self.scope.child_frame(self.scope.frame(), Frame::as_this)?;
                self.with_frame(frame, |scoped| scoped.exec_stmt(*body))?;
                Ok(Value::Frame(frame))
            }
            ExprKind::Ident(name) => self.scope.lookup(*name),
            ExprKind::This => self.scope.this_frame().map(Value::Frame),
            ExprKind::Member { object, member } => {
                let object = self.eval_expr(*object)?;
                self.member(&object, *member)
            }
            ExprKind::Index { object, indices } => {
                let mut operands = Vec::with_capacity(indices.len() + 1);
                operands.push(self.eval_expr(*object)?);
                for &index in indices {
                    operands.push(self.eval_expr(index)?);
                }
                let index = self.context().reserved().index;
                self.call_reserved(index, operands, loc)
            }
            ExprKind::Call { callee, args } => {
                let callee = self.eval_expr(*callee)?;
                let args = self.eval_call_args(args)?;
                self.call_value(&callee, args, loc)
            }
            ExprKind::Unary { op, operand } => {
                let operand = self.eval_expr(*operand)?;
                self.apply_unary(*op, operand, loc)
            }
            ExprKind::Binary { op, left, right } => {
                let left = self.eval_expr(*left)?;
                if let Some(result) = short_circuit(*op, &left)? {
                    return Ok(result);
                }
                let right = self.eval_expr(*right)?;
                self.apply_binary(*op, left, right, loc)
            }
            ExprKind::Ternary {
                cond,
                then_expr,
                else_expr,
            } => {
                if self.eval_expr(*cond)?.truthy()? {
                    self.eval_expr(*then_expr)
                } else {
                    self.eval_expr(*else_expr)
                }
            }
        }
    }

    fn eval_all(&mut self, items: &[ExprId]) -> Result<Vec<Value>, EvalError> {
        items.iter().map(|&item| self.eval_expr(item)).collect()
    }

    fn eval_call_args(&mut self, args: &[CallArgExpr]) -> Result<Vec<CallArg>, EvalError> {
        args.iter()
            .map(|arg| {
                let value = self.eval_expr(arg.value)?;
                Ok(CallArg {
                    name: arg.name,
                    value,
                })
            })
            .collect()
    }

    /// `[a, b, c]`. Elements are primitives, or arrays of one shape that
    /// stack into a new leading dimension.
    fn eval_array(&mut self, items: &[ExprId]) -> EvalResult {
        let values = self.eval_all(items)?;
        let array = self.context().with_heap(|heap| {
            if values.is_empty() || values.iter().all(Value::is_primitive) {
                return Array::vector(values);
            }
            let mut inner_dims: Option<Vec<usize>> = None;
            let mut flat = Vec::new();
            for value in &values {
                let Value::Array(id) = value else {
                    return Err(type_mismatch("primitive or array", value.type_name()));
                };
                let inner = heap.array(*id)?;
                match &inner_dims {
                    Some(dims) if dims.as_slice() != inner.dims() => {
                        return Err(EvalError::new(format!(
                            "array rows differ in shape: {:?} and {:?}",
                            dims,
                            inner.dims()
                        )));
                    }
                    Some(_) => {}
                    None => inner_dims = Some(inner.dims().to_vec()),
                }
                flat.extend_from_slice(inner.items());
            }
            let mut dims = vec![values.len()];
            dims.extend(inner_dims.unwrap_or_default());
            Array::new(&dims, flat)
        })?;
        Ok(self
            .context()
            .with_heap(|heap| heap.alloc_value(HeapObject::Array(array))))
    }

    /// `object.member`: a frame binding or a node port.
    pub(crate) fn member(&mut self, object: &Value, member: Name) -> EvalResult {
        match object {
            Value::Frame(id) => self.scope.member(*id, member),
            Value::Node(id) => {
                let names = self.context().names().clone();
                let key = names.lookup(member);
                self.context().with_heap(|heap| {
                    let node = heap.node(*id)?;
                    node.port_value(*id, key)
                        .ok_or_else(|| undefined_member(node.name(), key))
                })
            }
            other => Err(undefined_member(
                other.type_name(),
                self.context().names().lookup(member),
            )),
        }
    }

    /// `.binaryOp(symbol, left, right)` through scope lookup.
    pub(crate) fn apply_binary(
        &mut self,
        op: BinaryOp,
        left: Value,
        right: Value,
        loc: Location,
    ) -> EvalResult {
        let name = self.context().reserved().binary_op;
        self.call_reserved(name, vec![Value::string(op.as_symbol()), left, right], loc)
    }

    fn apply_unary(&mut self, op: UnaryOp, operand: Value, loc: Location) -> EvalResult {
        let name = self.context().reserved().unary_op;
        self.call_reserved(name, vec![Value::string(op.as_symbol()), operand], loc)
    }

    fn call_reserved(&mut self, name: Name, operands: Vec<Value>, loc: Location) -> EvalResult {
        let function = self.scope.lookup(name)?;
        let args = operands.into_iter().map(CallArg::positional).collect();
        self.call_value(&function, args, loc)
    }
}

/// `false && x` and `true || x` skip `x` when the left side is a concrete
/// scalar. A streaming left side always builds the full operator node.
fn short_circuit(op: BinaryOp, left: &Value) -> Result<Option<Value>, EvalError> {
    let decided = match op {
        BinaryOp::And => false,
        BinaryOp::Or => true,
        _ => return Ok(None),
    };
    if !left.is_primitive() || left.as_str().is_some() {
        return Ok(None);
    }
    Ok((left.truthy()? == decided).then_some(Value::Bool(decided)))
}
