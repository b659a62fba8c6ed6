//! State shared by every interpreter evaluating against one root frame.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use rill_ir::{Name, SharedInterner};
use rill_runtime::{
    Builtin, CollectStats, EvalError, Frame, Function, Heap, HeapObject, ObjectId,
};
use rustc_hash::FxHashSet;

use crate::config::EvalConfig;
use crate::plugins::{PluginRegistry, ScriptLoader};

/// Pre-interned names of the reserved operator builtins.
#[derive(Copy, Clone, Debug)]
pub(crate) struct ReservedNames {
    pub binary_op: Name,
    pub unary_op: Name,
    pub index: Name,
}

impl ReservedNames {
    fn new(names: &SharedInterner) -> Self {
        ReservedNames {
            binary_op: names.intern(Builtin::BinaryOp.reserved_name()),
            unary_op: names.intern(Builtin::UnaryOp.reserved_name()),
            index: names.intern(Builtin::Index.reserved_name()),
        }
    }
}

/// Heap, root frame, interner and the injected resolution seams.
///
/// Shared as `Arc<Context>` by every [`Scope`](crate::Scope) cursor. The
/// heap sits behind a mutex and is only locked for short, non-nested
/// critical sections through [`Context::with_heap`].
pub struct Context {
    heap: Mutex<Heap>,
    names: SharedInterner,
    root: ObjectId,
    node_counter: AtomicU64,
    /// Depth of the innermost running evaluation. Scripts loaded during a
    /// lookup start from here.
    eval_depth: AtomicUsize,
    plugins: PluginRegistry,
    loader: Option<Arc<dyn ScriptLoader>>,
    /// Script files currently being loaded, to stop a script that refers to
    /// its own name from loading itself again.
    loading: Mutex<FxHashSet<PathBuf>>,
    reserved: ReservedNames,
    config: EvalConfig,
}

impl Context {
    /// Create the heap and a pinned root frame holding every builtin.
    pub fn new(
        config: EvalConfig,
        names: SharedInterner,
        plugins: PluginRegistry,
        loader: Option<Arc<dyn ScriptLoader>>,
    ) -> Result<Self, EvalError> {
        let mut heap = Heap::with_threshold(names.clone(), config.gc_threshold);
        let root = heap.alloc(HeapObject::Frame(Frame::root(config.root_dir.clone())));
        heap.pin(root)?;
        for builtin in Builtin::all() {
            let name = names.intern(builtin.reserved_name());
            let function = heap.alloc_value(HeapObject::Function(Function::builtin(name, builtin)));
            heap.define(root, name, function)?;
        }
        tracing::debug!(root_dir = ?config.root_dir, "evaluation context created");

        Ok(Context {
            heap: Mutex::new(heap),
            reserved: ReservedNames::new(&names),
            names,
            root,
            node_counter: AtomicU64::new(0),
            eval_depth: AtomicUsize::new(0),
            plugins,
            loader,
            loading: Mutex::new(FxHashSet::default()),
            config,
        })
    }

    /// Run `f` with exclusive access to the heap.
    ///
    /// Must not be called from inside another `with_heap` closure.
    pub fn with_heap<R>(&self, f: impl FnOnce(&mut Heap) -> R) -> R {
        f(&mut self.heap.lock())
    }

    pub fn names(&self) -> &SharedInterner {
        &self.names
    }

    pub fn root(&self) -> ObjectId {
        self.root
    }

    pub fn config(&self) -> &EvalConfig {
        &self.config
    }

    pub fn plugins(&self) -> &PluginRegistry {
        &self.plugins
    }

    pub(crate) fn loader(&self) -> Option<&Arc<dyn ScriptLoader>> {
        self.loader.as_ref()
    }

    pub(crate) fn reserved(&self) -> ReservedNames {
        self.reserved
    }

    /// Globally unique node name, `<kind>#<n>`.
    pub fn next_node_name(&self, kind: &str) -> String {
        let n = self.node_counter.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{kind}#{n}")
    }

    /// Number of nodes named so far.
    pub fn nodes_created(&self) -> u64 {
        self.node_counter.load(Ordering::Relaxed)
    }

    pub(crate) fn eval_depth(&self) -> usize {
        self.eval_depth.load(Ordering::Relaxed)
    }

    pub(crate) fn set_eval_depth(&self, depth: usize) {
        self.eval_depth.store(depth, Ordering::Relaxed);
    }

    /// Mark `path` as being loaded. Returns `false` if it already is.
    pub(crate) fn begin_load(&self, path: &Path) -> bool {
        self.loading.lock().insert(path.to_path_buf())
    }

    pub(crate) fn end_load(&self, path: &Path) {
        self.loading.lock().remove(path);
    }

    /// Collect with the configured generation bound once enough
    /// allocations happened. Only safe between top-level statements.
    pub fn collect_if_needed(&self) -> Option<CollectStats> {
        self.with_heap(|heap| {
            heap.should_collect()
                .then(|| heap.collect(self.config.gc_generation, &[]))
        })
    }

    /// Unconditional collection. `extra_roots` stay alive in addition to
    /// the root frame and every pinned object.
    pub fn collect(&self, bound: u8, extra_roots: &[ObjectId]) -> CollectStats {
        self.with_heap(|heap| heap.collect(bound, extra_roots))
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("root", &self.root)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
