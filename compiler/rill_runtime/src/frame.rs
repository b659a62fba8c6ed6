//! Lexical frames.
//!
//! A frame is an ordered name → value table with an optional parent. Frames
//! are heap objects: closures capture them by id, and a frame literal is a
//! first-class value. Lookup here is strictly local; walking the parent
//! chain and resolving missing names lazily is the evaluator's job, since
//! only it knows about the filesystem and plugins.

use std::path::{Path, PathBuf};

use rill_ir::Name;
use rustc_hash::FxHashMap;

use crate::gc::ObjectId;
use crate::value::Value;

#[derive(Clone, Debug, Default)]
pub struct Frame {
    bindings: Vec<(Name, Value)>,
    index: FxHashMap<Name, usize>,
    parent: Option<ObjectId>,
    /// Directory this frame stands for, when it was created for a script
    /// directory; lazy resolution looks for `name` inside it.
    path: Option<PathBuf>,
    depth: u32,
    is_this: bool,
}

impl Frame {
    /// Root of a scope chain.
    pub fn root(path: Option<PathBuf>) -> Self {
        Frame {
            path,
            ..Frame::default()
        }
    }

    /// Frame nested in `parent`, one level deeper.
    pub fn child(parent: ObjectId, parent_depth: u32) -> Self {
        Frame {
            parent: Some(parent),
            depth: parent_depth.saturating_add(1),
            ..Frame::default()
        }
    }

    #[must_use]
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Mark as the target of `this` for the code running inside it.
    #[must_use]
    pub fn as_this(mut self) -> Self {
        self.is_this = true;
        self
    }

    #[inline]
    pub fn get(&self, name: Name) -> Option<&Value> {
        self.index.get(&name).map(|&i| &self.bindings[i].1)
    }

    #[inline]
    pub fn contains(&self, name: Name) -> bool {
        self.index.contains_key(&name)
    }

    /// Bindings in definition order.
    pub fn bindings(&self) -> impl Iterator<Item = (Name, &Value)> {
        self.bindings.iter().map(|(name, value)| (*name, value))
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn parent(&self) -> Option<ObjectId> {
        self.parent
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn is_this(&self) -> bool {
        self.is_this
    }

    /// Add a new binding. Hands the value back if the name is taken.
    pub(crate) fn insert(&mut self, name: Name, value: Value) -> Result<(), Value> {
        if self.index.contains_key(&name) {
            return Err(value);
        }
        self.index.insert(name, self.bindings.len());
        self.bindings.push((name, value));
        Ok(())
    }

    /// Overwrite an existing binding, returning the previous value.
    pub(crate) fn replace(&mut self, name: Name, value: Value) -> Option<Value> {
        let slot = *self.index.get(&name)?;
        Some(std::mem::replace(&mut self.bindings[slot].1, value))
    }

    pub(crate) fn values(&self) -> impl Iterator<Item = &Value> {
        self.bindings.iter().map(|(_, value)| value)
    }
}
