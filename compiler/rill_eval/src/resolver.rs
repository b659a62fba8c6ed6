//! On-demand resolution of identifiers a directory-bound frame does not
//! bind yet.
//!
//! For `ident` looked up in a frame bound to directory `dir`, the first
//! match wins:
//! 1. subdirectory `dir/ident` becomes a namespace frame
//! 2. a registered `ident_create_Function` factory produces a function
//! 3. a registered `ident_create_Node` factory becomes a node creator
//! 4. script `dir/ident.<ext>` runs in a fresh child frame and its
//!    top-level binding of `ident` is the result
//!
//! The root frame takes part even without a directory, for plugins
//! registered without one. Whatever is found is bound in the frame, so a
//! second lookup never reaches this module.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rill_ir::Name;
use rill_runtime::errors::{plugin_failed, script_load_failed};
use rill_runtime::{EvalError, Frame, Function, HeapObject, ObjectId, Value};

use crate::context::Context;
use crate::interpreter::Interpreter;
use crate::plugins::{factory_symbol, FactoryKind, FunctionRequest, ScriptLoader};
use crate::scope::Scope;

/// Resolve `name` in `frame`, caching the result there. `Ok(None)` means
/// nothing matched and the caller should keep walking the chain.
#[tracing::instrument(level = "debug", skip(ctx, name), fields(ident = ctx.names().lookup(name)))]
pub(crate) fn resolve(
    ctx: &Arc<Context>,
    frame: ObjectId,
    name: Name,
) -> Result<Option<Value>, EvalError> {
    let ident = ctx.names().lookup(name);
    let dir = ctx.with_heap(|heap| heap.frame(frame).map(|f| f.path().map(Path::to_path_buf)))?;
    let is_root = frame == ctx.root();

    let resolved = if let Some(sub) = dir.as_deref().map(|d| d.join(ident)).filter(|p| p.is_dir()) {
        Some(namespace(ctx, frame, sub)?)
    } else if let Some(value) = function_plugin(ctx, frame, name, ident, dir.as_deref(), is_root)? {
        Some(value)
    } else if let Some(value) = node_plugin(ctx, name, ident, dir.as_deref(), is_root) {
        Some(value)
    } else if let Some(dir) = dir.as_deref() {
        script(ctx, frame, name, ident, dir)?
    } else {
        None
    };

    if let Some(value) = &resolved {
        ctx.with_heap(|heap| heap.bind(frame, name, value.clone()))?;
    }
    Ok(resolved)
}

fn namespace(ctx: &Context, frame: ObjectId, path: PathBuf) -> Result<Value, EvalError> {
    tracing::debug!(path = %path.display(), "resolved namespace directory");
    ctx.with_heap(|heap| {
        let depth = heap.frame(frame)?.depth();
        let child = Frame::child(frame, depth).with_path(path);
        Ok(heap.alloc_value(HeapObject::Frame(child)))
    })
}

fn function_plugin(
    ctx: &Context,
    frame: ObjectId,
    name: Name,
    ident: &str,
    dir: Option<&Path>,
    is_root: bool,
) -> Result<Option<Value>, EvalError> {
    let Some(entry) = ctx.plugins().function_factory(ident, dir, is_root) else {
        return Ok(None);
    };
    tracing::debug!(library = entry.handle.library(), "resolved function plugin");
    ctx.with_heap(|heap| {
        let function = entry
            .factory
            .create_function(FunctionRequest {
                ident,
                name,
                frame,
                plugin: &entry.handle,
                heap,
            })
            .map_err(|e| {
                let symbol = factory_symbol(ident, FactoryKind::Function);
                plugin_failed(&symbol, format!("{e} (in {})", entry.handle.library()))
            })?;
        let function = if function.plugin.is_some() {
            function
        } else {
            function.with_plugin(entry.handle.clone())
        };
        Ok(Some(heap.alloc_value(HeapObject::Function(function))))
    })
}

fn node_plugin(
    ctx: &Context,
    name: Name,
    ident: &str,
    dir: Option<&Path>,
    is_root: bool,
) -> Option<Value> {
    let entry = ctx.plugins().node_factory(ident, dir, is_root)?;
    tracing::debug!(library = entry.handle.library(), "resolved node plugin");
    let creator = Function::node_creator(name, Arc::clone(&entry.factory)).with_plugin(entry.handle.clone());
    Some(ctx.with_heap(|heap| heap.alloc_value(HeapObject::Function(creator))))
}

fn script(
    ctx: &Arc<Context>,
    frame: ObjectId,
    name: Name,
    ident: &str,
    dir: &Path,
) -> Result<Option<Value>, EvalError> {
    let path = dir.join(format!("{ident}.{}", ctx.config().script_extension));
    if !path.is_file() {
        return Ok(None);
    }
    let Some(loader) = ctx.loader() else {
        tracing::debug!(path = %path.display(), "no script loader installed");
        return Ok(None);
    };
    if !ctx.begin_load(&path) {
        // Already loading: the script refers to itself before binding it.
        return Ok(None);
    }

    let result = run_script(ctx, &**loader, frame, name, ident, &path);
    ctx.end_load(&path);
    result.map(Some)
}

fn run_script(
    ctx: &Arc<Context>,
    loader: &dyn ScriptLoader,
    frame: ObjectId,
    name: Name,
    ident: &str,
    path: &Path,
) -> Result<Value, EvalError> {
    let shown = path.display().to_string();
    tracing::debug!(path = %shown, "loading script");
    let program = loader
        .load(path, ctx.names())
        .map_err(|e| e.with_note(format!("while loading {shown}")))?;

    let scope = Scope::new(Arc::clone(ctx));
    let script_frame = scope.child_frame(frame, |f| f)?;
    let mut interpreter =
        Interpreter::new(scope.at(frame), Arc::clone(&program.ast)).at_depth(ctx.eval_depth());
    interpreter
        .run_in(script_frame, &program.top_level)
        .map_err(|e| e.with_note(format!("while loading {shown}")))?;

    ctx.with_heap(|heap| heap.lookup_local(script_frame, name))?
        .ok_or_else(|| script_load_failed(&shown, format!("script does not define `{ident}`")))
}
