//! Mutators for heap objects.
//!
//! All writes to stored values go through these so the write barrier sees
//! every overwritten reference.

use rill_ir::Name;

use super::{Heap, HeapObject, ObjectId};
use crate::errors::{
    duplicate_binding, index_out_of_bounds, not_assignable, not_indexable, type_mismatch,
    undefined_member, EvalError, EvalResult,
};
use crate::function::Builtin;
use crate::value::{index_primitive, Value};

impl Heap {
    /// Add a binding to a frame.
    ///
    /// # Errors
    /// `DuplicateBinding` if the frame already binds `name`.
    pub fn define(&mut self, frame: ObjectId, name: Name, value: Value) -> Result<(), EvalError> {
        let names = self.names.clone();
        match self.get_mut(frame)? {
            HeapObject::Frame(f) => f
                .insert(name, value)
                .map_err(|_| duplicate_binding(names.lookup(name))),
            other => Err(type_mismatch("frame", other.kind_name())),
        }
    }

    /// Overwrite a binding that exists in `frame` itself. Returns `false`
    /// when the frame has no such binding.
    pub fn assign(&mut self, frame: ObjectId, name: Name, value: Value) -> Result<bool, EvalError> {
        let old = match self.get_mut(frame)? {
            HeapObject::Frame(f) => f.replace(name, value),
            other => return Err(type_mismatch("frame", other.kind_name())),
        };
        match old {
            Some(old) => {
                self.release(&old);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Add or overwrite a binding.
    pub fn bind(&mut self, frame: ObjectId, name: Name, value: Value) -> Result<(), EvalError> {
        if !self.assign(frame, name, value.clone())? {
            self.define(frame, name, value)?;
        }
        Ok(())
    }

    /// Local binding of a frame, without walking parents.
    pub fn lookup_local(&self, frame: ObjectId, name: Name) -> Result<Option<Value>, EvalError> {
        Ok(self.frame(frame)?.get(name).cloned())
    }

    pub fn push_element(&mut self, sequence: ObjectId, value: Value) -> Result<(), EvalError> {
        match self.get_mut(sequence)? {
            HeapObject::Sequence(items) => {
                items.push(value);
                Ok(())
            }
            other => Err(type_mismatch("sequence", other.kind_name())),
        }
    }

    pub fn set_ref(&mut self, cell: ObjectId, value: Value) -> Result<(), EvalError> {
        let old = match self.get_mut(cell)? {
            HeapObject::Ref(slot) => std::mem::replace(slot, value),
            other => return Err(type_mismatch("ref", other.kind_name())),
        };
        self.release(&old);
        Ok(())
    }

    /// `target[indices...]` for concrete operands.
    ///
    /// Sequences take one integer, arrays one integer per dimension, frames
    /// and nodes one string naming a binding or port, strings one integer.
    pub fn index(&self, target: &Value, indices: &[Value]) -> EvalResult {
        let builtin = Builtin::Index.reserved_name();
        let unsupported = || {
            let described: Vec<&str> = indices.iter().map(Value::type_name).collect();
            not_indexable(builtin, target.type_name(), &described.join(", "))
        };

        match (target, indices) {
            (Value::Sequence(id), [index]) => {
                let items = self.sequence(*id)?;
                let i = index.as_index().ok_or_else(unsupported)?;
                usize::try_from(i)
                    .ok()
                    .and_then(|i| items.get(i))
                    .cloned()
                    .ok_or_else(|| index_out_of_bounds(i, items.len()))
            }
            (Value::Array(id), _) => {
                let coords = indices
                    .iter()
                    .map(Value::as_index)
                    .collect::<Option<Vec<i64>>>()
                    .ok_or_else(unsupported)?;
                self.array(*id)?.get(&coords).cloned()
            }
            (Value::Frame(id), [Value::Str(key)]) => {
                // A key nobody interned cannot be bound anywhere.
                let frame = self.frame(*id)?;
                self.names
                    .get(key)
                    .and_then(|name| frame.get(name))
                    .cloned()
                    .ok_or_else(|| undefined_member("frame", key))
            }
            (Value::Node(id), [Value::Str(key)]) => {
                let node = self.node(*id)?;
                node.port_value(*id, key)
                    .ok_or_else(|| undefined_member(node.name(), key))
            }
            (Value::Ref(id), []) => self.ref_value(*id).cloned(),
            _ if target.is_primitive() => index_primitive(target, indices),
            _ => Err(unsupported()),
        }
    }

    /// `target[indices...] = value` for sequences, arrays, frames and ref
    /// cells.
    pub fn set_index(&mut self, target: &Value, indices: &[Value], value: Value) -> Result<(), EvalError> {
        let builtin = Builtin::Index.reserved_name();
        let unsupported = || {
            let described: Vec<&str> = indices.iter().map(Value::type_name).collect();
            not_indexable(builtin, target.type_name(), &described.join(", "))
        };

        let old = match (target, indices) {
            (Value::Sequence(id), [index]) => {
                let i = index.as_index().ok_or_else(unsupported)?;
                match self.get_mut(*id)? {
                    HeapObject::Sequence(items) => {
                        let len = items.len();
                        let slot = usize::try_from(i)
                            .ok()
                            .and_then(|i| items.get_mut(i))
                            .ok_or_else(|| index_out_of_bounds(i, len))?;
                        std::mem::replace(slot, value)
                    }
                    other => return Err(type_mismatch("sequence", other.kind_name())),
                }
            }
            (Value::Array(id), _) => {
                let coords = indices
                    .iter()
                    .map(Value::as_index)
                    .collect::<Option<Vec<i64>>>()
                    .ok_or_else(unsupported)?;
                match self.get_mut(*id)? {
                    HeapObject::Array(array) => array.set(&coords, value)?,
                    other => return Err(type_mismatch("array", other.kind_name())),
                }
            }
            (Value::Frame(id), [Value::Str(key)]) => {
                let name = self.names.intern(key);
                return self.bind(*id, name, value);
            }
            (Value::Ref(id), []) => return self.set_ref(*id, value),
            _ if target.is_primitive() => {
                return Err(not_assignable(target.type_name(), "[]"));
            }
            _ => return Err(unsupported()),
        };
        self.release(&old);
        Ok(())
    }
}
