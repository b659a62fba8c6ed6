//! Identifier handles.

use std::fmt;

/// Handle to an identifier held by a `StringInterner`.
///
/// Only meaningful together with the interner that produced it. Two names
/// from the same interner are equal exactly when their strings are.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Default)]
#[repr(transparent)]
pub struct Name(u32);

impl Name {
    /// The empty identifier, present in every interner. Used as the file
    /// of synthetic locations.
    pub const EMPTY: Name = Name(0);

    #[inline]
    pub(crate) const fn from_slot(slot: u32) -> Self {
        Name(slot)
    }

    #[inline]
    pub(crate) const fn slot(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Name#{}", self.0)
    }
}
