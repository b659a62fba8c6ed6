//! Abstract syntax tree.
//!
//! Nodes live in an [`Ast`] arena and refer to each other through
//! `ExprId` / `StmtId` indices. An arena is immutable once the parser hands
//! it over; functions keep it alive through a [`SharedAst`] so a closure
//! can outlive the program that declared it.
//!
//! Two sealed families:
//! - [`ExprKind`]: literals, array/sequence/frame literals, identifier,
//!   member and index lookups, calls, unary/binary operators, ternary
//! - [`StmtKind`]: compound blocks, function and variable declarations,
//!   the three assignment forms, `if`, both `for` forms, bare expression
//!   statements and `return`

use std::sync::Arc;

use crate::{BinaryOp, Location, Name, UnaryOp};

/// Index of an expression in its [`Ast`].
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct ExprId(u32);

/// Index of a statement in its [`Ast`].
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct StmtId(u32);

impl ExprId {
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl StmtId {
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Literal constant.
///
/// Integer literals carry their width so the parser decides the tag
/// (`1` vs `1u8` vs `1.0f`), and string literals are interned.
#[derive(Copy, Clone, PartialEq, Debug)]
pub enum Literal {
    Absent,
    Bool(bool),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    UInt8(u8),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),
    Float(f32),
    Double(f64),
    Str(Name),
}

/// One argument at a call site: `f(1, scale = 2)`.
#[derive(Clone, Debug, PartialEq)]
pub struct CallArgExpr {
    pub name: Option<Name>,
    pub value: ExprId,
}

/// One declared parameter: `def f(a, b = 2)`.
#[derive(Clone, Debug, PartialEq)]
pub struct ParamDecl {
    pub name: Name,
    pub default: Option<ExprId>,
}

/// Left-hand side of an assignment.
#[derive(Clone, Debug, PartialEq)]
pub enum AssignTarget {
    /// `x = ...`
    Ident(Name),
    /// `obj.member = ...`
    Member { object: ExprId, member: Name },
    /// `obj[i, j] = ...`
    Index { object: ExprId, indices: Vec<ExprId> },
}

#[derive(Clone, Debug, PartialEq)]
pub enum ExprKind {
    Literal(Literal),
    /// `[a, b, c]`; nested array literals of equal length form extra
    /// dimensions.
    Array(Vec<ExprId>),
    /// `(a, b, c)` heterogeneous ordered sequence.
    Sequence(Vec<ExprId>),
    /// `{ x = 1; y = 2; }` evaluated into a new frame value. The statement is
    /// a compound block executed with that frame as the current scope.
    FrameLit(StmtId),
    Ident(Name),
    /// `this`: the nearest enclosing frame literal.
    This,
    Member {
        object: ExprId,
        member: Name,
    },
    Index {
        object: ExprId,
        indices: Vec<ExprId>,
    },
    Call {
        callee: ExprId,
        args: Vec<CallArgExpr>,
    },
    Unary {
        op: UnaryOp,
        operand: ExprId,
    },
    Binary {
        op: BinaryOp,
        left: ExprId,
        right: ExprId,
    },
    Ternary {
        cond: ExprId,
        then_expr: ExprId,
        else_expr: ExprId,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub loc: Location,
}

#[derive(Clone, Debug, PartialEq)]
pub enum StmtKind {
    /// `{ ... }`. `new_frame` is false for bodies whose frame was already
    /// created by the caller (function bodies, frame literals).
    Compound {
        stmts: Vec<StmtId>,
        new_frame: bool,
    },
    FunctionDecl {
        name: Name,
        params: Vec<ParamDecl>,
        body: StmtId,
    },
    VarDecl {
        name: Name,
        init: Option<ExprId>,
    },
    /// `target = value` or, with `op`, `target op= value`.
    Assign {
        target: AssignTarget,
        op: Option<BinaryOp>,
        value: ExprId,
    },
    If {
        cond: ExprId,
        then_branch: StmtId,
        else_branch: Option<StmtId>,
    },
    /// `for (init; cond; step) body`
    For {
        init: Option<StmtId>,
        cond: Option<ExprId>,
        step: Option<StmtId>,
        body: StmtId,
    },
    /// `for (var : iterable) body`
    ForEach {
        var: Name,
        iterable: ExprId,
        body: StmtId,
    },
    /// Bare expression statement, usually a call.
    Expr(ExprId),
    Return(Option<ExprId>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub loc: Location,
}

/// Arena holding every node of one parsed source file.
#[derive(Clone, Debug, Default)]
pub struct Ast {
    exprs: Vec<Expr>,
    stmts: Vec<Stmt>,
}

/// Reference-counted arena shared by a program and the functions it declares.
pub type SharedAst = Arc<Ast>;

impl Ast {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an expression node and return its id.
    ///
    /// # Panics
    /// Panics if the arena exceeds `u32::MAX` expressions.
    pub fn alloc_expr(&mut self, kind: ExprKind, loc: Location) -> ExprId {
        let id = u32::try_from(self.exprs.len()).unwrap_or_else(|_| panic!("expression arena full"));
        self.exprs.push(Expr { kind, loc });
        ExprId(id)
    }

    /// Add a statement node and return its id.
    ///
    /// # Panics
    /// Panics if the arena exceeds `u32::MAX` statements.
    pub fn alloc_stmt(&mut self, kind: StmtKind, loc: Location) -> StmtId {
        let id = u32::try_from(self.stmts.len()).unwrap_or_else(|_| panic!("statement arena full"));
        self.stmts.push(Stmt { kind, loc });
        StmtId(id)
    }

    /// # Panics
    /// Panics if `id` was allocated by a different arena.
    #[inline]
    pub fn expr(&self, id: ExprId) -> &Expr {
        &self.exprs[id.index()]
    }

    /// # Panics
    /// Panics if `id` was allocated by a different arena.
    #[inline]
    pub fn stmt(&self, id: StmtId) -> &Stmt {
        &self.stmts[id.index()]
    }

    pub fn expr_count(&self) -> usize {
        self.exprs.len()
    }

    pub fn stmt_count(&self) -> usize {
        self.stmts.len()
    }
}

/// A parsed source file: its arena plus the top-level statements in order.
#[derive(Clone, Debug)]
pub struct Program {
    pub ast: SharedAst,
    pub file: Name,
    pub top_level: Vec<StmtId>,
}

impl Program {
    pub fn new(ast: Ast, file: Name, top_level: Vec<StmtId>) -> Self {
        Program {
            ast: Arc::new(ast),
            file,
            top_level,
        }
    }
}
