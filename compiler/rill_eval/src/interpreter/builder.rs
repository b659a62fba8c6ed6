//! `InterpreterBuilder`: assembles a [`Context`] and a root-level
//! [`Interpreter`] from configuration and the injected seams.

use std::path::PathBuf;
use std::sync::Arc;

use rill_ir::{Ast, SharedAst, SharedInterner};
use rill_runtime::EvalError;

use super::Interpreter;
use crate::config::EvalConfig;
use crate::context::Context;
use crate::plugins::{PluginRegistry, ScriptLoader};
use crate::scope::Scope;

#[derive(Default)]
pub struct InterpreterBuilder {
    config: EvalConfig,
    names: Option<SharedInterner>,
    plugins: PluginRegistry,
    loader: Option<Arc<dyn ScriptLoader>>,
    ast: Option<SharedAst>,
}

impl InterpreterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn config(mut self, config: EvalConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.config.max_depth = max_depth;
        self
    }

    /// Directory the root frame resolves unknown identifiers against.
    #[must_use]
    pub fn root_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.root_dir = Some(dir.into());
        self
    }

    /// Share an interner with the parser. A fresh one is created otherwise.
    #[must_use]
    pub fn interner(mut self, names: SharedInterner) -> Self {
        self.names = Some(names);
        self
    }

    #[must_use]
    pub fn plugins(mut self, plugins: PluginRegistry) -> Self {
        self.plugins = plugins;
        self
    }

    #[must_use]
    pub fn loader(mut self, loader: impl ScriptLoader + 'static) -> Self {
        self.loader = Some(Arc::new(loader));
        self
    }

    /// Arena evaluated by `eval_expr` / `exec_stmt` before any
    /// `run_program` call.
    #[must_use]
    pub fn ast(mut self, ast: SharedAst) -> Self {
        self.ast = Some(ast);
        self
    }

    pub fn build(self) -> Result<Interpreter, EvalError> {
        let names = self.names.unwrap_or_default();
        let ctx = Context::new(self.config, names, self.plugins, self.loader)?;
        let ast = self.ast.unwrap_or_else(|| Arc::new(Ast::new()));
        Ok(Interpreter::new(Scope::new(Arc::new(ctx)), ast))
    }
}
