//! Tree-walking interpreter.
//!
//! Expressions evaluate to [`Value`]s, statements to an [`ExecFlow`] that
//! says whether a `return` was reached. Every nested evaluation counts
//! against the configured maximum depth, and the native stack is grown on
//! demand so that limit is reached before the stack runs out.
//!
//! Operators, indexing and casts are not computed here: they are calls to
//! the reserved builtins found through ordinary scope lookup, which decide
//! between scalar computation and graph construction (see
//! [`crate::dispatch`]).

mod builder;
mod call;
mod expr;
mod scope_guard;
mod stmt;

use std::sync::Arc;

use rill_ir::{Program, SharedAst, StmtId};
use rill_runtime::errors::recursion_limit_exceeded;
use rill_runtime::{EvalError, ObjectId, Value};

use crate::context::Context;
use crate::scope::Scope;
use crate::stack::ensure_sufficient_stack;

pub use builder::InterpreterBuilder;
pub use scope_guard::ScopedInterpreter;

/// How a statement finished.
#[derive(Clone, Debug, PartialEq)]
pub enum ExecFlow {
    Continue,
    Return(Value),
}

/// Outcome of [`Interpreter::run_program`].
#[derive(Debug, Default)]
pub struct RunReport {
    /// Top-level statements that finished without an error.
    pub completed: usize,
    /// One error per failed top-level statement, in order.
    pub failures: Vec<EvalError>,
    /// Value of a top-level `return`, which ends the program.
    pub returned: Option<Value>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Evaluator for one AST arena.
///
/// Function calls run in a child interpreter holding the callee's arena and
/// a scope at the call's argument frame; the depth counter is carried into
/// the child.
pub struct Interpreter {
    pub(crate) scope: Scope,
    pub(crate) ast: SharedAst,
    depth: usize,
    max_depth: usize,
}

impl Interpreter {
    pub fn new(scope: Scope, ast: SharedAst) -> Self {
        let max_depth = scope.context().config().max_depth;
        Interpreter {
            scope,
            ast,
            depth: 0,
            max_depth,
        }
    }

    pub fn builder() -> InterpreterBuilder {
        InterpreterBuilder::new()
    }

    /// Start counting nesting from `depth` instead of zero.
    #[must_use]
    pub(crate) fn at_depth(mut self, depth: usize) -> Self {
        self.depth = depth;
        self
    }

    /// Interpreter for a call: `scope` at the callee's frame, `ast` the
    /// arena the callee was declared in.
    pub(crate) fn child(&self, scope: Scope, ast: SharedAst) -> Self {
        Interpreter {
            scope,
            ast,
            depth: self.depth,
            max_depth: self.max_depth,
        }
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn context(&self) -> &Arc<Context> {
        self.scope.context()
    }

    pub fn ast(&self) -> &SharedAst {
        &self.ast
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Run `f` one level deeper, failing once the maximum depth is reached.
    pub(crate) fn nested<R>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<R, EvalError>,
    ) -> Result<R, EvalError> {
        if self.depth >= self.max_depth {
            return Err(recursion_limit_exceeded(self.max_depth));
        }
        self.depth += 1;
        self.context().set_eval_depth(self.depth);
        let result = ensure_sufficient_stack(|| f(self));
        self.depth -= 1;
        self.context().set_eval_depth(self.depth);
        result
    }

    /// Execute `stmts` in `frame`, stopping at the first error or `return`.
    pub fn run_in(&mut self, frame: ObjectId, stmts: &[StmtId]) -> Result<ExecFlow, EvalError> {
        let mut scoped = self.scoped(frame)?;
        scoped.exec_block(stmts)
    }

    /// Run a whole program in the current frame.
    ///
    /// Each top-level statement is isolated: a failure is logged, recorded
    /// in the report, and execution continues with the next statement.
    /// Garbage is collected between statements once the heap asks for it.
    #[tracing::instrument(level = "debug", skip_all, fields(statements = program.top_level.len()))]
    pub fn run_program(&mut self, program: &Program) -> RunReport {
        self.ast = Arc::clone(&program.ast);
        let ctx = Arc::clone(self.context());
        let mut report = RunReport::default();

        for &stmt in &program.top_level {
            match self.exec_stmt(stmt) {
                Ok(ExecFlow::Continue) => report.completed += 1,
                Ok(ExecFlow::Return(value)) => {
                    report.completed += 1;
                    report.returned = Some(value);
                    break;
                }
                Err(error) => {
                    tracing::warn!(error = %error.render(&**ctx.names()), "top-level statement failed");
                    report.failures.push(error);
                }
            }
            if let Some(stats) = ctx.collect_if_needed() {
                tracing::debug!(freed = stats.freed, survivors = stats.survivors, "collected between statements");
            }
        }
        report
    }
}

#[cfg(test)]
mod tests;
