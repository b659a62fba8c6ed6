//! Rill Eval - scope resolution and the dual-mode interpreter.
//!
//! # Architecture
//!
//! - [`Context`]: heap, root frame, interner and the injected seams
//!   ([`PluginRegistry`], [`ScriptLoader`]) shared by every evaluation
//! - [`Scope`]: cursor at the current frame; identifier lookup walks the
//!   frame chain and resolves directory-bound names on demand
//! - [`Interpreter`]: tree walker over `rill_ir` arenas. Operators route
//!   through the reserved builtins, which compute scalars or build dataflow
//!   nodes depending on whether an operand is a streaming `Output`
//! - [`Interpreter::run_program`]: top-level driver isolating failures per
//!   statement and collecting garbage between statements
//!
//! # Re-exports
//!
//! The runtime's value, error and heap types are re-exported so hosts can
//! depend on this crate alone.

mod config;
mod context;
pub mod dispatch;
pub mod interpreter;
pub mod plugins;
mod resolver;
mod scope;
mod stack;

#[cfg(test)]
mod test_support;

use std::sync::Once;

pub use config::{EvalConfig, DEFAULT_MAX_DEPTH, DEFAULT_SCRIPT_EXTENSION};
pub use context::Context;
pub use interpreter::{ExecFlow, Interpreter, InterpreterBuilder, RunReport, ScopedInterpreter};
pub use plugins::{FunctionFactory, FunctionRequest, PluginRegistry, ScriptLoader};
pub use rill_runtime::{EvalError, EvalErrorKind, EvalResult, Heap, ObjectId, Value};
pub use scope::{Scope, ScopeGuard};
pub use stack::ensure_sufficient_stack;

static TRACING_INIT: Once = Once::new();

/// Install a `tracing` subscriber driven by `RUST_LOG`.
///
/// Does nothing when `RUST_LOG` is unset, and only the first call has any
/// effect.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        if std::env::var("RUST_LOG").is_ok() {
            let filter = EnvFilter::from_default_env();
            tracing_subscriber::registry()
                .with(fmt::layer().with_target(true).with_level(true))
                .with(filter)
                .init();
        }
    });
}
