//! Rill IR - names, locations and the parsed-program representation.
//!
//! This crate is the leaf of the Rill workspace. It provides:
//! - `Name` + `StringInterner`: compact interned identifiers
//! - `Location`: file/line/column tags carried by every AST node
//! - `BinaryOp` / `UnaryOp`: operator enums shared by the evaluator and the
//!   dataflow node kernels
//! - `Ast`: an arena of immutable expression and statement nodes addressed by
//!   `ExprId` / `StmtId`
//!
//! The AST is produced by an external parser and never mutated afterwards.
//! Functions capture a `SharedAst` so their bodies stay valid for as long as
//! the function object lives.

pub mod ast;
mod interner;
mod location;
mod name;
mod operators;

pub use ast::{
    AssignTarget, Ast, CallArgExpr, Expr, ExprId, ExprKind, Literal, ParamDecl, Program,
    SharedAst, Stmt, StmtId, StmtKind,
};
pub use interner::{SharedInterner, StringInterner, StringLookup};
pub use location::Location;
pub use name::Name;
pub use operators::{BinaryOp, UnaryOp};
