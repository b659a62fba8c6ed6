//! Statement execution.

use std::sync::Arc;

use rill_ir::{AssignTarget, BinaryOp, ExprId, Location, Name, ParamDecl, StmtId, StmtKind};
use rill_runtime::errors::{not_assignable, type_mismatch, undefined_member};
use rill_runtime::{
    ArgDecl, Args, EvalError, Function, HeapObject, PortKind, PortRef, Value,
};

use super::{ExecFlow, Interpreter};
use crate::dispatch::source_port;

impl Interpreter {
    /// Execute one statement of the current arena.
    pub fn exec_stmt(&mut self, id: StmtId) -> Result<ExecFlow, EvalError> {
        let ast = Arc::clone(&self.ast);
        let stmt = ast.stmt(id);
        self.nested(|interp| interp.exec_kind(&stmt.kind, stmt.loc))
            .map_err(|e| e.located_at(stmt.loc))
    }

    /// Execute statements in order until one returns.
    pub(crate) fn exec_block(&mut self, stmts: &[StmtId]) -> Result<ExecFlow, EvalError> {
        for &stmt in stmts {
            if let flow @ ExecFlow::Return(_) = self.exec_stmt(stmt)? {
                return Ok(flow);
            }
        }
        Ok(ExecFlow::Continue)
    }

    fn exec_kind(&mut self, kind: &StmtKind, loc: Location) -> Result<ExecFlow, EvalError> {
        match kind {
            StmtKind::Compound { stmts, new_frame } => {
                if *new_frame {
                    let frame = self.scope.child_frame(self.scope.frame(), |f| f)?;
                    self.with_frame(frame, |scoped| scoped.exec_block(stmts))
                } else {
                    self.exec_block(stmts)
                }
            }
            StmtKind::FunctionDecl { name, params, body } => {
                let function = self.declare_function(*name, params, *body)?;
                self.scope.create(*name, function)?;
                Ok(ExecFlow::Continue)
            }
            StmtKind::VarDecl { name, init } => {
                let value = match init {
                    Some(init) => self.eval_expr(*init)?,
                    None => Value::Absent,
                };
                self.scope.create(*name, value)?;
                Ok(ExecFlow::Continue)
            }
            StmtKind::Assign { target, op, value } => {
                self.exec_assign(target, *op, *value, loc)?;
                Ok(ExecFlow::Continue)
            }
            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                if self.eval_expr(*cond)?.truthy()? {
                    self.exec_stmt(*then_branch)
                } else if let Some(else_branch) = else_branch {
                    self.exec_stmt(*else_branch)
                } else {
                    Ok(ExecFlow::Continue)
                }
            }
            StmtKind::For {
                init,
                cond,
                step,
                body,
            } => {
                let frame = self.scope.child_frame(self.scope.frame(), |f| f)?;
                self.with_frame(frame, |scoped| {
                    if let Some(init) = init {
                        scoped.exec_stmt(*init)?;
                    }
                    loop {
                        if let Some(cond) = cond {
                            if !scoped.eval_expr(*cond)?.truthy()? {
                                break;
                            }
                        }
                        if let flow @ ExecFlow::Return(_) = scoped.exec_stmt(*body)? {
                            return Ok(flow);
                        }
                        if let Some(step) = step {
                            scoped.exec_stmt(*step)?;
                        }
                    }
                    Ok(ExecFlow::Continue)
                })
            }
            StmtKind::ForEach {
                var,
                iterable,
                body,
            } => {
                let iterable = self.eval_expr(*iterable)?;
                for item in self.iteration_items(&iterable)? {
                    let frame = self.scope.child_frame(self.scope.frame(), |f| f)?;
                    let flow = self.with_frame(frame, |scoped| {
                        scoped.scope.create(*var, item)?;
                        scoped.exec_stmt(*body)
                    })?;
                    if let ExecFlow::Return(_) = flow {
                        return Ok(flow);
                    }
                }
                Ok(ExecFlow::Continue)
            }
            StmtKind::Expr(expr) => {
                self.eval_expr(*expr)?;
                Ok(ExecFlow::Continue)
            }
            StmtKind::Return(value) => {
                let value = match value {
                    Some(value) => self.eval_expr(*value)?,
                    None => Value::Absent,
                };
                Ok(ExecFlow::Return(value))
            }
        }
    }

    /// Function object for a declaration. Defaults are evaluated now, in
    /// the declaring scope; the current frame becomes the closure.
    fn declare_function(
        &mut self,
        name: Name,
        params: &[ParamDecl],
        body: StmtId,
    ) -> Result<Value, EvalError> {
        let mut decls = Vec::with_capacity(params.len());
        for param in params {
            decls.push(match param.default {
                Some(default) => ArgDecl::optional(param.name, self.eval_expr(default)?),
                None => ArgDecl::required(param.name),
            });
        }
        let function = Function::script(
            name,
            Args::new(decls),
            self.scope.frame(),
            Arc::clone(&self.ast),
            body,
        );
        Ok(self
            .context()
            .with_heap(|heap| heap.alloc_value(HeapObject::Function(function))))
    }

    /// Values a `for (x : iterable)` loop visits.
    fn iteration_items(&self, iterable: &Value) -> Result<Vec<Value>, EvalError> {
        self.context().with_heap(|heap| match iterable {
            Value::Sequence(id) => Ok(heap.sequence(*id)?.to_vec()),
            Value::Array(id) => Ok(heap.array(*id)?.items().to_vec()),
            Value::Frame(id) => Ok(heap.frame(*id)?.bindings().map(|(_, v)| v.clone()).collect()),
            other => Err(type_mismatch("sequence, array or frame", other.type_name())),
        })
    }

    fn exec_assign(
        &mut self,
        target: &AssignTarget,
        op: Option<BinaryOp>,
        value: ExprId,
        loc: Location,
    ) -> Result<(), EvalError> {
        match target {
            AssignTarget::Ident(name) => {
                let rhs = self.eval_expr(value)?;
                let value = match op {
                    Some(op) => {
                        let current = self.scope.lookup(*name)?;
                        self.apply_binary(op, current, rhs, loc)?
                    }
                    None => rhs,
                };
                self.scope.set(*name, value)
            }
            AssignTarget::Member { object, member } => {
                let object = self.eval_expr(*object)?;
                let rhs = self.eval_expr(value)?;
                let value = match op {
                    Some(op) => {
                        let current = self.member(&object, *member)?;
                        self.apply_binary(op, current, rhs, loc)?
                    }
                    None => rhs,
                };
                self.assign_member(&object, *member, value)
            }
            AssignTarget::Index { object, indices } => {
                let object = self.eval_expr(*object)?;
                let mut keys = Vec::with_capacity(indices.len());
                for &index in indices {
                    keys.push(self.eval_expr(index)?);
                }
                let rhs = self.eval_expr(value)?;
                let value = match op {
                    Some(op) => {
                        let current = self.context().with_heap(|heap| heap.index(&object, &keys))?;
                        self.apply_binary(op, current, rhs, loc)?
                    }
                    None => rhs,
                };
                self.context()
                    .with_heap(|heap| heap.set_index(&object, &keys, value))
            }
        }
    }

    /// `object.member = value`.
    ///
    /// On a frame this binds the member. On a node, an input is connected
    /// to the value (through a constant node when the value is concrete)
    /// and a param is set.
    fn assign_member(&mut self, object: &Value, member: Name, value: Value) -> Result<(), EvalError> {
        let ctx = Arc::clone(self.context());
        let key = ctx.names().lookup(member);
        match object {
            Value::Frame(id) => ctx.with_heap(|heap| heap.bind(*id, member, value)),
            Value::Node(id) => ctx.with_heap(|heap| {
                let node = heap.node(*id)?;
                match node.find_port(key) {
                    Some((PortKind::Input, index)) => {
                        let source = source_port(&ctx, heap, &value)?;
                        heap.connect(PortRef::new(*id, index), source)
                    }
                    Some((PortKind::Param, index)) => heap.set_param(PortRef::new(*id, index), value),
                    Some((PortKind::Output, _)) => Err(not_assignable(node.name(), key)),
                    None => Err(undefined_member(node.name(), key)),
                }
            }),
            other => Err(not_assignable(other.type_name(), key)),
        }
    }
}
