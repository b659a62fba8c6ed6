//! Scope cursor: the current frame plus the shared context.
//!
//! Identifier lookup walks the frame chain from the current frame to the
//! root. A frame that stands for a directory (or the root frame) resolves
//! names it does not bind yet on demand, see [`crate::resolver`].

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use rill_ir::Name;
use rill_runtime::errors::{this_outside_frame, undefined_member, undefined_variable};
use rill_runtime::{EvalError, EvalResult, Frame, HeapObject, ObjectId, Value};

use crate::context::Context;
use crate::resolver;

/// Current frame of an evaluation. Cheap to clone.
#[derive(Clone, Debug)]
pub struct Scope {
    ctx: Arc<Context>,
    frame: ObjectId,
}

impl Scope {
    /// Cursor at the context's root frame.
    pub fn new(ctx: Arc<Context>) -> Self {
        let frame = ctx.root();
        Scope { ctx, frame }
    }

    /// Cursor at `frame` sharing this scope's context.
    #[must_use]
    pub fn at(&self, frame: ObjectId) -> Self {
        Scope {
            ctx: Arc::clone(&self.ctx),
            frame,
        }
    }

    pub fn context(&self) -> &Arc<Context> {
        &self.ctx
    }

    pub fn frame(&self) -> ObjectId {
        self.frame
    }

    /// Find `name` in the current frame or its ancestors, resolving it on
    /// demand in directory-bound frames.
    pub fn lookup(&self, name: Name) -> EvalResult {
        let root = self.ctx.root();
        let mut cursor = Some(self.frame);
        while let Some(frame) = cursor {
            let (found, parent, lazy) = self.ctx.with_heap(|heap| {
                heap.frame(frame).map(|f| {
                    (
                        f.get(name).cloned(),
                        f.parent(),
                        f.path().is_some() || frame == root,
                    )
                })
            })?;
            if let Some(value) = found {
                return Ok(value);
            }
            if lazy {
                if let Some(value) = resolver::resolve(&self.ctx, frame, name)? {
                    return Ok(value);
                }
            }
            cursor = parent;
        }
        Err(undefined_variable(self.ctx.names().lookup(name)))
    }

    /// Member of a frame value. Only the frame itself is searched; namespace
    /// frames resolve missing members on demand.
    pub fn member(&self, frame: ObjectId, name: Name) -> EvalResult {
        let (found, lazy) = self.ctx.with_heap(|heap| {
            heap.frame(frame)
                .map(|f| (f.get(name).cloned(), f.path().is_some() || frame == self.ctx.root()))
        })?;
        if let Some(value) = found {
            return Ok(value);
        }
        if lazy {
            if let Some(value) = resolver::resolve(&self.ctx, frame, name)? {
                return Ok(value);
            }
        }
        Err(undefined_member("frame", self.ctx.names().lookup(name)))
    }

    /// Define `name` in the current frame.
    ///
    /// # Errors
    /// `DuplicateBinding` if the current frame already binds it.
    pub fn create(&self, name: Name, value: Value) -> Result<(), EvalError> {
        self.ctx.with_heap(|heap| heap.define(self.frame, name, value))
    }

    /// Overwrite the nearest existing binding of `name`; define it in the
    /// current frame when no frame in the chain binds it.
    pub fn set(&self, name: Name, value: Value) -> Result<(), EvalError> {
        self.ctx.with_heap(|heap| {
            let mut cursor = Some(self.frame);
            while let Some(frame) = cursor {
                let f = heap.frame(frame)?;
                if f.contains(name) {
                    heap.assign(frame, name, value)?;
                    return Ok(());
                }
                cursor = f.parent();
            }
            heap.define(self.frame, name, value)
        })
    }

    /// Nearest enclosing frame literal.
    pub fn this_frame(&self) -> Result<ObjectId, EvalError> {
        self.ctx.with_heap(|heap| {
            let mut cursor = Some(self.frame);
            while let Some(frame) = cursor {
                let f = heap.frame(frame)?;
                if f.is_this() {
                    return Ok(frame);
                }
                cursor = f.parent();
            }
            Err(this_outside_frame())
        })
    }

    /// Allocate a frame nested in `parent`, letting `build` adjust it.
    pub fn child_frame(
        &self,
        parent: ObjectId,
        build: impl FnOnce(Frame) -> Frame,
    ) -> Result<ObjectId, EvalError> {
        self.ctx.with_heap(|heap| {
            let depth = heap.frame(parent)?.depth();
            Ok(heap.alloc(HeapObject::Frame(build(Frame::child(parent, depth)))))
        })
    }

    /// Make `frame` current, pinning it. Returns the previous frame for
    /// [`Scope::leave`].
    pub(crate) fn switch_to(&mut self, frame: ObjectId) -> Result<ObjectId, EvalError> {
        self.ctx.with_heap(|heap| heap.pin(frame))?;
        Ok(std::mem::replace(&mut self.frame, frame))
    }

    /// Undo a [`Scope::switch_to`].
    pub(crate) fn leave(&mut self, previous: ObjectId) {
        let entered = std::mem::replace(&mut self.frame, previous);
        self.ctx.with_heap(|heap| heap.unpin(entered));
    }

    /// Enter `frame` until the guard drops.
    pub fn enter(&mut self, frame: ObjectId) -> Result<ScopeGuard<'_>, EvalError> {
        let previous = self.switch_to(frame)?;
        Ok(ScopeGuard {
            scope: self,
            previous,
        })
    }
}

/// Restores the previous frame on drop, including during unwinding.
pub struct ScopeGuard<'a> {
    scope: &'a mut Scope,
    previous: ObjectId,
}

impl Drop for ScopeGuard<'_> {
    fn drop(&mut self) {
        self.scope.leave(self.previous);
    }
}

impl Deref for ScopeGuard<'_> {
    type Target = Scope;

    fn deref(&self) -> &Scope {
        self.scope
    }
}

impl DerefMut for ScopeGuard<'_> {
    fn deref_mut(&mut self) -> &mut Scope {
        self.scope
    }
}
