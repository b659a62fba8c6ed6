//! Injected seams for lazy resolution: native plugins and script loading.
//!
//! A plugin library exposes factories under two symbol conventions,
//! `<id>_create_Function` and `<id>_create_Node`. The registry maps those
//! symbols to factory closures so the evaluator never deals with dynamic
//! loading itself; a host that does load shared libraries registers what
//! it found here.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rill_ir::{Name, Program, StringInterner};
use rill_runtime::{EvalError, Function, Heap, NodeFactory, ObjectId, PluginHandle};
use rustc_hash::FxHashMap;

/// What a function factory receives when an identifier resolves to it.
pub struct FunctionRequest<'a> {
    /// Identifier being resolved.
    pub ident: &'a str,
    pub name: Name,
    /// Frame the identifier is being resolved in.
    pub frame: ObjectId,
    pub plugin: &'a PluginHandle,
    pub heap: &'a mut Heap,
}

/// Produces the function bound to an identifier.
pub trait FunctionFactory: Send + Sync {
    fn create_function(&self, request: FunctionRequest<'_>) -> Result<Function, EvalError>;
}

impl<F> FunctionFactory for F
where
    F: Fn(FunctionRequest<'_>) -> Result<Function, EvalError> + Send + Sync,
{
    fn create_function(&self, request: FunctionRequest<'_>) -> Result<Function, EvalError> {
        self(request)
    }
}

/// Parses script files found by lazy resolution.
pub trait ScriptLoader: Send + Sync {
    fn load(&self, path: &Path, names: &StringInterner) -> Result<Program, EvalError>;
}

impl<F> ScriptLoader for F
where
    F: Fn(&Path, &StringInterner) -> Result<Program, EvalError> + Send + Sync,
{
    fn load(&self, path: &Path, names: &StringInterner) -> Result<Program, EvalError> {
        self(path, names)
    }
}

/// Symbol a plugin exports for `ident`.
pub fn factory_symbol(ident: &str, kind: FactoryKind) -> String {
    format!("{ident}_create_{}", kind.suffix())
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum FactoryKind {
    Function,
    Node,
}

impl FactoryKind {
    const fn suffix(self) -> &'static str {
        match self {
            FactoryKind::Function => "Function",
            FactoryKind::Node => "Node",
        }
    }
}

/// One registered factory.
pub struct PluginEntry<F: ?Sized> {
    pub factory: Arc<F>,
    pub handle: PluginHandle,
    /// Directory the library lives in. `None` makes it visible from the
    /// root frame only.
    pub dir: Option<PathBuf>,
}

impl<F: ?Sized> PluginEntry<F> {
    fn visible_from(&self, dir: Option<&Path>, is_root: bool) -> bool {
        match &self.dir {
            Some(own) => dir == Some(own.as_path()),
            None => is_root,
        }
    }
}

/// Factories keyed by exported symbol.
#[derive(Default)]
pub struct PluginRegistry {
    functions: FxHashMap<String, Vec<PluginEntry<dyn FunctionFactory>>>,
    nodes: FxHashMap<String, Vec<PluginEntry<dyn NodeFactory>>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `<ident>_create_Function`, visible from the root frame.
    pub fn register_function(
        &mut self,
        ident: &str,
        handle: PluginHandle,
        factory: impl FunctionFactory + 'static,
    ) -> &mut Self {
        self.add_function(ident, handle, None, Arc::new(factory))
    }

    /// Register `<ident>_create_Function` for the namespace frame of `dir`.
    pub fn register_function_in(
        &mut self,
        dir: impl Into<PathBuf>,
        ident: &str,
        handle: PluginHandle,
        factory: impl FunctionFactory + 'static,
    ) -> &mut Self {
        self.add_function(ident, handle, Some(dir.into()), Arc::new(factory))
    }

    /// Register `<ident>_create_Node`, visible from the root frame.
    pub fn register_node(
        &mut self,
        ident: &str,
        handle: PluginHandle,
        factory: impl NodeFactory + 'static,
    ) -> &mut Self {
        self.add_node(ident, handle, None, Arc::new(factory))
    }

    /// Register `<ident>_create_Node` for the namespace frame of `dir`.
    pub fn register_node_in(
        &mut self,
        dir: impl Into<PathBuf>,
        ident: &str,
        handle: PluginHandle,
        factory: impl NodeFactory + 'static,
    ) -> &mut Self {
        self.add_node(ident, handle, Some(dir.into()), Arc::new(factory))
    }

    fn add_function(
        &mut self,
        ident: &str,
        handle: PluginHandle,
        dir: Option<PathBuf>,
        factory: Arc<dyn FunctionFactory>,
    ) -> &mut Self {
        let symbol = factory_symbol(ident, FactoryKind::Function);
        tracing::trace!(%symbol, library = handle.library(), "registered plugin factory");
        self.functions.entry(symbol).or_default().push(PluginEntry {
            factory,
            handle,
            dir,
        });
        self
    }

    fn add_node(
        &mut self,
        ident: &str,
        handle: PluginHandle,
        dir: Option<PathBuf>,
        factory: Arc<dyn NodeFactory>,
    ) -> &mut Self {
        let symbol = factory_symbol(ident, FactoryKind::Node);
        tracing::trace!(%symbol, library = handle.library(), "registered plugin factory");
        self.nodes.entry(symbol).or_default().push(PluginEntry {
            factory,
            handle,
            dir,
        });
        self
    }

    /// Function factory for `ident` as seen from a frame bound to `dir`.
    pub fn function_factory(
        &self,
        ident: &str,
        dir: Option<&Path>,
        is_root: bool,
    ) -> Option<&PluginEntry<dyn FunctionFactory>> {
        self.functions
            .get(&factory_symbol(ident, FactoryKind::Function))?
            .iter()
            .find(|entry| entry.visible_from(dir, is_root))
    }

    /// Node factory for `ident` as seen from a frame bound to `dir`.
    pub fn node_factory(
        &self,
        ident: &str,
        dir: Option<&Path>,
        is_root: bool,
    ) -> Option<&PluginEntry<dyn NodeFactory>> {
        self.nodes
            .get(&factory_symbol(ident, FactoryKind::Node))?
            .iter()
            .find(|entry| entry.visible_from(dir, is_root))
    }

    /// Every registered symbol, for diagnostics.
    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().chain(self.nodes.keys()).map(String::as_str)
    }
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.symbols()).finish()
    }
}
