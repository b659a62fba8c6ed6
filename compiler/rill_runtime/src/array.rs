//! Dense multi-dimensional arrays of primitives.

use smallvec::SmallVec;

use crate::errors::{index_out_of_bounds, type_mismatch, wrong_operand_count, EvalError};
use crate::function::Builtin;
use crate::value::Value;

/// Row-major array. Elements are always primitives, so an array never
/// references other heap objects.
#[derive(Clone, Debug, PartialEq)]
pub struct Array {
    dims: SmallVec<[usize; 4]>,
    items: Vec<Value>,
}

impl Array {
    /// One-dimensional array.
    pub fn vector(items: Vec<Value>) -> Result<Self, EvalError> {
        let len = items.len();
        Self::new(&[len], items)
    }

    /// # Errors
    /// Fails if the dimensions do not multiply to `items.len()` or an item
    /// is not a primitive.
    pub fn new(dims: &[usize], items: Vec<Value>) -> Result<Self, EvalError> {
        let expected: usize = dims.iter().product();
        if expected != items.len() {
            return Err(EvalError::new(format!(
                "array of shape {dims:?} needs {expected} elements, got {}",
                items.len()
            )));
        }
        if let Some(bad) = items.iter().find(|v| !v.is_primitive()) {
            return Err(type_mismatch("primitive array element", bad.type_name()));
        }
        Ok(Array {
            dims: dims.iter().copied().collect(),
            items,
        })
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    pub fn items(&self) -> &[Value] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Row-major offset of a coordinate, one index per dimension.
    pub fn offset(&self, coords: &[i64]) -> Result<usize, EvalError> {
        if coords.len() != self.dims.len() {
            return Err(wrong_operand_count(
                Builtin::Index.reserved_name(),
                self.dims.len(),
                coords.len(),
            ));
        }
        let mut offset = 0usize;
        for (&coord, &extent) in coords.iter().zip(&self.dims) {
            let i = usize::try_from(coord)
                .ok()
                .filter(|i| *i < extent)
                .ok_or_else(|| index_out_of_bounds(coord, extent))?;
            offset = offset * extent + i;
        }
        Ok(offset)
    }

    pub fn get(&self, coords: &[i64]) -> Result<&Value, EvalError> {
        let offset = self.offset(coords)?;
        Ok(&self.items[offset])
    }

    pub(crate) fn set(&mut self, coords: &[i64], value: Value) -> Result<Value, EvalError> {
        if !value.is_primitive() {
            return Err(type_mismatch("primitive array element", value.type_name()));
        }
        let offset = self.offset(coords)?;
        Ok(std::mem::replace(&mut self.items[offset], value))
    }
}
