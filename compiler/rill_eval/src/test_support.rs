//! Hand-built ASTs and small node plugins for evaluator tests.

use std::sync::Arc;

use rill_ir::{
    AssignTarget, Ast, BinaryOp, CallArgExpr, ExprId, ExprKind, Literal, Location, Name,
    ParamDecl, Program, SharedInterner, StmtId, StmtKind, UnaryOp,
};
use rill_runtime::value::binary;
use rill_runtime::{EvalError, Node, NodeKernel, NodeRequest, PluginHandle, TickContext, Value};
use smallvec::{smallvec, SmallVec};

/// Builds one arena. Every node gets its own line so errors carry distinct,
/// non-builtin locations.
pub(crate) struct AstBuilder {
    ast: Ast,
    names: SharedInterner,
    file: Name,
    line: u32,
}

impl AstBuilder {
    pub fn new(names: &SharedInterner, file: &str) -> Self {
        AstBuilder {
            ast: Ast::new(),
            file: names.intern(file),
            names: names.clone(),
            line: 0,
        }
    }

    pub fn name(&self, s: &str) -> Name {
        self.names.intern(s)
    }

    fn loc(&mut self) -> Location {
        self.line += 1;
        Location::new(self.file, self.line, 1)
    }

    pub fn expr(&mut self, kind: ExprKind) -> ExprId {
        let loc = self.loc();
        self.ast.alloc_expr(kind, loc)
    }

    pub fn stmt(&mut self, kind: StmtKind) -> StmtId {
        let loc = self.loc();
        self.ast.alloc_stmt(kind, loc)
    }

    pub fn int(&mut self, n: i32) -> ExprId {
        self.expr(ExprKind::Literal(Literal::Int32(n)))
    }

    pub fn double(&mut self, x: f64) -> ExprId {
        self.expr(ExprKind::Literal(Literal::Double(x)))
    }

    pub fn boolean(&mut self, b: bool) -> ExprId {
        self.expr(ExprKind::Literal(Literal::Bool(b)))
    }

    pub fn string(&mut self, s: &str) -> ExprId {
        let name = self.name(s);
        self.expr(ExprKind::Literal(Literal::Str(name)))
    }

    pub fn ident(&mut self, s: &str) -> ExprId {
        let name = self.name(s);
        self.expr(ExprKind::Ident(name))
    }

    pub fn binary(&mut self, op: BinaryOp, left: ExprId, right: ExprId) -> ExprId {
        self.expr(ExprKind::Binary { op, left, right })
    }

    pub fn unary(&mut self, op: UnaryOp, operand: ExprId) -> ExprId {
        self.expr(ExprKind::Unary { op, operand })
    }

    pub fn member(&mut self, object: ExprId, member: &str) -> ExprId {
        let member = self.name(member);
        self.expr(ExprKind::Member { object, member })
    }

    pub fn index(&mut self, object: ExprId, indices: Vec<ExprId>) -> ExprId {
        self.expr(ExprKind::Index { object, indices })
    }

    /// `callee(args...)`; a `Some(label)` makes the argument labeled.
    pub fn call(&mut self, callee: &str, args: Vec<(Option<&str>, ExprId)>) -> ExprId {
        let callee = self.ident(callee);
        self.call_expr(callee, args)
    }

    pub fn call_expr(&mut self, callee: ExprId, args: Vec<(Option<&str>, ExprId)>) -> ExprId {
        let args = args
            .into_iter()
            .map(|(label, value)| CallArgExpr {
                name: label.map(|l| self.names.intern(l)),
                value,
            })
            .collect();
        self.expr(ExprKind::Call { callee, args })
    }

    pub fn sequence(&mut self, items: Vec<ExprId>) -> ExprId {
        self.expr(ExprKind::Sequence(items))
    }

    pub fn array(&mut self, items: Vec<ExprId>) -> ExprId {
        self.expr(ExprKind::Array(items))
    }

    pub fn block(&mut self, stmts: Vec<StmtId>) -> StmtId {
        self.stmt(StmtKind::Compound {
            stmts,
            new_frame: true,
        })
    }

    /// Body of a function or frame literal, which runs in a frame the
    /// caller already made.
    pub fn body(&mut self, stmts: Vec<StmtId>) -> StmtId {
        self.stmt(StmtKind::Compound {
            stmts,
            new_frame: false,
        })
    }

    pub fn frame_lit(&mut self, stmts: Vec<StmtId>) -> ExprId {
        let body = self.body(stmts);
        self.expr(ExprKind::FrameLit(body))
    }

    pub fn var(&mut self, name: &str, init: Option<ExprId>) -> StmtId {
        let name = self.name(name);
        self.stmt(StmtKind::VarDecl { name, init })
    }

    pub fn assign(&mut self, name: &str, value: ExprId) -> StmtId {
        let name = self.name(name);
        self.stmt(StmtKind::Assign {
            target: AssignTarget::Ident(name),
            op: None,
            value,
        })
    }

    pub fn assign_target(&mut self, target: AssignTarget, op: Option<BinaryOp>, value: ExprId) -> StmtId {
        self.stmt(StmtKind::Assign { target, op, value })
    }

    /// `def name(params) { body }`; a `Some(default)` makes the param
    /// optional.
    pub fn function(&mut self, name: &str, params: Vec<(&str, Option<ExprId>)>, body: Vec<StmtId>) -> StmtId {
        let name = self.name(name);
        let params = params
            .into_iter()
            .map(|(param, default)| ParamDecl {
                name: self.names.intern(param),
                default,
            })
            .collect();
        let body = self.body(body);
        self.stmt(StmtKind::FunctionDecl { name, params, body })
    }

    pub fn ret(&mut self, value: Option<ExprId>) -> StmtId {
        self.stmt(StmtKind::Return(value))
    }

    pub fn if_else(&mut self, cond: ExprId, then_branch: StmtId, else_branch: Option<StmtId>) -> StmtId {
        self.stmt(StmtKind::If {
            cond,
            then_branch,
            else_branch,
        })
    }

    pub fn expr_stmt(&mut self, expr: ExprId) -> StmtId {
        self.stmt(StmtKind::Expr(expr))
    }

    pub fn for_each(&mut self, var: &str, iterable: ExprId, body: StmtId) -> StmtId {
        let var = self.name(var);
        self.stmt(StmtKind::ForEach { var, iterable, body })
    }

    pub fn finish(self, top_level: Vec<StmtId>) -> Program {
        Program::new(self.ast, self.file, top_level)
    }
}

pub(crate) fn handle(library: &str) -> PluginHandle {
    PluginHandle::new(library, Arc::new(()))
}

/// Emits its `freq` param.
struct Osc;

impl NodeKernel for Osc {
    fn tick(&mut self, cx: &TickContext<'_>) -> Result<SmallVec<[Value; 1]>, EvalError> {
        Ok(smallvec![cx.param("freq").cloned().unwrap_or_default()])
    }
}

/// `osc`: param `freq`, output `out`.
pub(crate) fn osc(request: NodeRequest<'_>) -> Result<Node, EvalError> {
    Ok(Node::new(request.name, request.kind, Box::new(Osc))
        .with_param("freq", Value::Double(440.0))
        .with_output("out"))
}

/// `out = in * factor`
struct Gain;

impl NodeKernel for Gain {
    fn tick(&mut self, cx: &TickContext<'_>) -> Result<SmallVec<[Value; 1]>, EvalError> {
        let factor = cx.param("factor").cloned().unwrap_or(Value::Double(1.0));
        let [input] = cx.inputs else {
            return Err(EvalError::new("gain takes one input"));
        };
        Ok(smallvec![binary(BinaryOp::Mul, input, &factor)?])
    }
}

/// `gain`: input `in`, param `factor`, output `out`.
pub(crate) fn gain(request: NodeRequest<'_>) -> Result<Node, EvalError> {
    Ok(Node::new(request.name, request.kind, Box::new(Gain))
        .with_input("in")
        .with_param("factor", Value::Double(1.0))
        .with_output("out"))
}
