//! Mark-and-sweep collector with generations.
//!
//! Every frame, function, node, sequence, array and ref cell lives in a
//! [`Heap`] slot and is addressed by an [`ObjectId`]. Ids carry the slot's
//! stamp, so an id that outlives its object is detected (`DeadObject`)
//! instead of aliasing whatever reuses the slot.
//!
//! # Roots
//!
//! Roots are explicit. An object is a root for a collection when
//! - it is pinned (`pin` / `unpin` keep a count),
//! - it is listed in `extra_roots`, or
//! - its age exceeds the collection's generation bound.
//!
//! Each root's age is bumped by one per collection it survives as a root.
//! Ages drop back to zero whenever an object might have lost a reference:
//! when it is unpinned, when a collection no longer lists it among the
//! extra roots it was given last time, when a value pointing at it is
//! overwritten through one of the heap's mutators, or when a garbage object
//! that pointed at it is reclaimed. A collection with a high bound (`collect_all`) therefore
//! revisits everything; a low bound skips long-lived objects.
//!
//! # Sweep
//!
//! Garbage is reclaimed in three phases so no object is touched after it
//! was freed:
//! 1. **detach**: every unmarked slot is emptied into a garbage list
//! 2. **clear**: each garbage object drops its edges into survivors
//!    (downstream node ports are disconnected, survivor ages reset)
//! 3. **free**: slots get a new stamp and join the free list

mod mutate;
mod ports;

use std::fmt;

use rill_ir::SharedInterner;
use rustc_hash::FxHashSet;

use crate::array::Array;
use crate::errors::{dead_object, type_mismatch, EvalError};
use crate::frame::Frame;
use crate::function::Function;
use crate::node::Node;
use crate::value::Value;

const DEFAULT_THRESHOLD: usize = 10_000;

/// Generation bound that makes every object a candidate.
pub const FULL_COLLECTION: u8 = u8::MAX;

/// Handle to a heap object.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct ObjectId {
    index: u32,
    stamp: u32,
}

impl ObjectId {
    #[inline]
    pub const fn index(self) -> u32 {
        self.index
    }

    #[inline]
    pub const fn stamp(self) -> u32 {
        self.stamp
    }

    #[inline]
    fn slot(self) -> usize {
        self.index as usize
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.index)
    }
}

/// Anything the collector manages.
#[derive(Debug)]
pub enum HeapObject {
    Frame(Frame),
    Function(Function),
    Node(Node),
    Sequence(Vec<Value>),
    Array(Array),
    Ref(Value),
}

impl HeapObject {
    pub fn kind_name(&self) -> &'static str {
        match self {
            HeapObject::Frame(_) => "frame",
            HeapObject::Function(_) => "function",
            HeapObject::Node(_) => "node",
            HeapObject::Sequence(_) => "sequence",
            HeapObject::Array(_) => "array",
            HeapObject::Ref(_) => "ref",
        }
    }

    /// Value constructor matching this object's kind.
    pub fn handle(&self) -> fn(ObjectId) -> Value {
        match self {
            HeapObject::Frame(_) => Value::Frame,
            HeapObject::Function(_) => Value::Function,
            HeapObject::Node(_) => Value::Node,
            HeapObject::Sequence(_) => Value::Sequence,
            HeapObject::Array(_) => Value::Array,
            HeapObject::Ref(_) => Value::Ref,
        }
    }

    fn for_each_child(&self, mut f: impl FnMut(ObjectId)) {
        match self {
            HeapObject::Frame(frame) => {
                frame.parent().into_iter().for_each(&mut f);
                frame.values().filter_map(Value::referent).for_each(f);
            }
            HeapObject::Function(function) => function.children().for_each(f),
            HeapObject::Node(node) => node.children().for_each(f),
            HeapObject::Sequence(items) => items.iter().filter_map(Value::referent).for_each(f),
            HeapObject::Array(_) => {}
            HeapObject::Ref(value) => value.referent().into_iter().for_each(f),
        }
    }
}

struct Entry {
    object: HeapObject,
    age: u8,
    pins: u32,
}

struct Slot {
    stamp: u32,
    entry: Option<Entry>,
}

/// Summary of one collection.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct CollectStats {
    pub bound: u8,
    pub roots: usize,
    pub survivors: usize,
    pub freed: usize,
}

/// Object store and collector.
pub struct Heap {
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
    allocs_since_collect: usize,
    threshold: usize,
    total_collections: usize,
    /// Extra roots of the previous collection.
    held: FxHashSet<ObjectId>,
    names: SharedInterner,
}

impl Heap {
    pub fn new(names: SharedInterner) -> Self {
        Self::with_threshold(names, DEFAULT_THRESHOLD)
    }

    /// Heap whose `should_collect` fires after `threshold` allocations.
    pub fn with_threshold(names: SharedInterner, threshold: usize) -> Self {
        Heap {
            slots: Vec::new(),
            free: Vec::new(),
            live: 0,
            allocs_since_collect: 0,
            threshold: threshold.max(1),
            total_collections: 0,
            held: FxHashSet::default(),
            names,
        }
    }

    /// Interner used to name bindings in diagnostics.
    pub fn names(&self) -> &SharedInterner {
        &self.names
    }

    /// Number of live objects.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn total_collections(&self) -> usize {
        self.total_collections
    }

    /// Whether enough allocations happened since the last collection.
    pub fn should_collect(&self) -> bool {
        self.allocs_since_collect >= self.threshold
    }

    /// Store an object. It starts unpinned at age zero, so it is reclaimed
    /// by the next collection unless something reachable refers to it.
    pub fn alloc(&mut self, object: HeapObject) -> ObjectId {
        self.allocs_since_collect += 1;
        self.live += 1;
        let entry = Entry {
            object,
            age: 0,
            pins: 0,
        };

        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.entry = Some(entry);
            return ObjectId {
                index,
                stamp: slot.stamp,
            };
        }

        let index = u32::try_from(self.slots.len()).unwrap_or_else(|_| panic!("heap slot space exhausted"));
        self.slots.push(Slot {
            stamp: 0,
            entry: Some(entry),
        });
        ObjectId { index, stamp: 0 }
    }

    /// `alloc` returning the value handle.
    pub fn alloc_value(&mut self, object: HeapObject) -> Value {
        let handle = object.handle();
        handle(self.alloc(object))
    }

    /// Take an object out of the heap, e.g. to hand it to another heap.
    /// Ids that still refer to it report `DeadObject` from then on.
    pub fn remove(&mut self, id: ObjectId) -> Result<HeapObject, EvalError> {
        let slot = self
            .slots
            .get_mut(id.slot())
            .filter(|slot| slot.stamp == id.stamp && slot.entry.is_some())
            .ok_or_else(|| dead_object(&format!("object {id}")))?;
        let entry = slot.entry.take().ok_or_else(|| dead_object(&format!("object {id}")))?;
        slot.stamp = slot.stamp.wrapping_add(1);
        self.free.push(id.index);
        self.live -= 1;
        entry.object.for_each_child(|child| self.reset_age(child));
        Ok(entry.object)
    }

    #[inline]
    pub fn contains(&self, id: ObjectId) -> bool {
        self.entry(id).is_some()
    }

    fn entry(&self, id: ObjectId) -> Option<&Entry> {
        self.slots
            .get(id.slot())
            .filter(|slot| slot.stamp == id.stamp)
            .and_then(|slot| slot.entry.as_ref())
    }

    fn entry_mut(&mut self, id: ObjectId) -> Option<&mut Entry> {
        self.slots
            .get_mut(id.slot())
            .filter(|slot| slot.stamp == id.stamp)
            .and_then(|slot| slot.entry.as_mut())
    }

    pub fn get(&self, id: ObjectId) -> Result<&HeapObject, EvalError> {
        self.entry(id)
            .map(|entry| &entry.object)
            .ok_or_else(|| dead_object(&format!("object {id}")))
    }

    pub(crate) fn get_mut(&mut self, id: ObjectId) -> Result<&mut HeapObject, EvalError> {
        self.entry_mut(id)
            .map(|entry| &mut entry.object)
            .ok_or_else(|| dead_object(&format!("object {id}")))
    }

    pub fn frame(&self, id: ObjectId) -> Result<&Frame, EvalError> {
        match self.get(id)? {
            HeapObject::Frame(frame) => Ok(frame),
            other => Err(type_mismatch("frame", other.kind_name())),
        }
    }

    pub fn function(&self, id: ObjectId) -> Result<&Function, EvalError> {
        match self.get(id)? {
            HeapObject::Function(function) => Ok(function),
            other => Err(type_mismatch("function", other.kind_name())),
        }
    }

    pub fn node(&self, id: ObjectId) -> Result<&Node, EvalError> {
        match self.get(id)? {
            HeapObject::Node(node) => Ok(node),
            other => Err(type_mismatch("node", other.kind_name())),
        }
    }

    pub fn sequence(&self, id: ObjectId) -> Result<&[Value], EvalError> {
        match self.get(id)? {
            HeapObject::Sequence(items) => Ok(items),
            other => Err(type_mismatch("sequence", other.kind_name())),
        }
    }

    pub fn array(&self, id: ObjectId) -> Result<&Array, EvalError> {
        match self.get(id)? {
            HeapObject::Array(array) => Ok(array),
            other => Err(type_mismatch("array", other.kind_name())),
        }
    }

    pub fn ref_value(&self, id: ObjectId) -> Result<&Value, EvalError> {
        match self.get(id)? {
            HeapObject::Ref(value) => Ok(value),
            other => Err(type_mismatch("ref", other.kind_name())),
        }
    }

    /// Keep `id` (and everything reachable from it) alive until a matching
    /// `unpin`.
    pub fn pin(&mut self, id: ObjectId) -> Result<(), EvalError> {
        let entry = self
            .entry_mut(id)
            .ok_or_else(|| dead_object(&format!("object {id}")))?;
        entry.pins += 1;
        Ok(())
    }

    /// Release one pin. The object's age resets once the last pin goes.
    pub fn unpin(&mut self, id: ObjectId) {
        if let Some(entry) = self.entry_mut(id) {
            entry.pins = entry.pins.saturating_sub(1);
            if entry.pins == 0 {
                entry.age = 0;
            }
        }
    }

    pub fn pin_count(&self, id: ObjectId) -> u32 {
        self.entry(id).map_or(0, |entry| entry.pins)
    }

    /// Generation of a live object.
    pub fn age(&self, id: ObjectId) -> Option<u8> {
        self.entry(id).map(|entry| entry.age)
    }

    fn reset_age(&mut self, id: ObjectId) {
        if let Some(entry) = self.entry_mut(id) {
            entry.age = 0;
        }
    }

    /// Write barrier: `old` was just overwritten, so its referent may have
    /// lost its last reference.
    fn release(&mut self, old: &Value) {
        if let Some(id) = old.referent() {
            self.reset_age(id);
        }
    }

    /// Collection that treats every object as a candidate.
    pub fn collect_all(&mut self, extra_roots: &[ObjectId]) -> CollectStats {
        self.collect(FULL_COLLECTION, extra_roots)
    }

    /// Reclaim every object not reachable from the roots.
    ///
    /// Objects older than `bound` count as roots, so a small bound only
    /// examines recently allocated or recently released objects.
    #[tracing::instrument(level = "debug", skip_all, fields(bound = bound))]
    pub fn collect(&mut self, bound: u8, extra_roots: &[ObjectId]) -> CollectStats {
        let previous = std::mem::replace(&mut self.held, extra_roots.iter().copied().collect());
        for id in previous {
            if !self.held.contains(&id) && self.pin_count(id) == 0 {
                self.reset_age(id);
            }
        }

        let mut marked = vec![false; self.slots.len()];
        let mut worklist: Vec<usize> = Vec::new();

        for (index, slot) in self.slots.iter().enumerate() {
            if let Some(entry) = &slot.entry {
                if entry.pins > 0 || entry.age > bound {
                    marked[index] = true;
                    worklist.push(index);
                }
            }
        }
        for &id in extra_roots {
            if self.contains(id) && !marked[id.slot()] {
                marked[id.slot()] = true;
                worklist.push(id.slot());
            }
        }

        let roots = worklist.len();
        for &index in &worklist {
            if let Some(entry) = self.slots[index].entry.as_mut() {
                entry.age = entry.age.saturating_add(1);
            }
        }

        let mut children = Vec::new();
        while let Some(index) = worklist.pop() {
            let slot = &self.slots[index];
            if let Some(entry) = &slot.entry {
                entry.object.for_each_child(|child| children.push(child));
            }
            for child in children.drain(..) {
                if self.contains(child) && !marked[child.slot()] {
                    marked[child.slot()] = true;
                    worklist.push(child.slot());
                }
            }
        }

        // Phase 1: detach.
        let mut garbage: Vec<(ObjectId, HeapObject)> = Vec::new();
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if marked[index] {
                continue;
            }
            if let Some(entry) = slot.entry.take() {
                #[expect(clippy::cast_possible_truncation, reason = "slot count fits u32 by construction")]
                let id = ObjectId {
                    index: index as u32,
                    stamp: slot.stamp,
                };
                garbage.push((id, entry.object));
            }
        }

        // Phase 2: clear edges into survivors.
        for (id, object) in &garbage {
            self.clear_edges(*id, object);
        }

        // Phase 3: free.
        let freed = garbage.len();
        for (id, object) in garbage {
            let slot = &mut self.slots[id.slot()];
            slot.stamp = slot.stamp.wrapping_add(1);
            self.free.push(id.index);
            drop(object);
        }

        self.live -= freed;
        self.allocs_since_collect = 0;
        self.total_collections += 1;

        let stats = CollectStats {
            bound,
            roots,
            survivors: self.live,
            freed,
        };
        tracing::debug!(
            roots = stats.roots,
            survivors = stats.survivors,
            freed = stats.freed,
            "collection finished"
        );
        stats
    }

    fn clear_edges(&mut self, id: ObjectId, object: &HeapObject) {
        object.for_each_child(|child| self.reset_age(child));

        let HeapObject::Node(node) = object else {
            return;
        };
        for (index, input) in node.inputs().iter().enumerate() {
            if let Some(source) = input.source {
                let this = crate::value::PortRef::new(id, u16::try_from(index).unwrap_or(u16::MAX));
                self.unlink_target(source, this);
            }
        }
        for output in node.outputs() {
            for target in &output.targets {
                if let Ok(HeapObject::Node(downstream)) = self.get_mut(target.node) {
                    if let Some(input) = downstream.input_mut(target.index) {
                        input.source = None;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests;
