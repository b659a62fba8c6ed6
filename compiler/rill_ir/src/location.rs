//! Source locations.

use std::fmt;

use crate::{Name, StringLookup};

/// Source location of an AST node: file, 1-based line and column.
///
/// `Location` is `Copy` so every node carries one by value. The chain of
/// enclosing locations (call sites, script loads) is assembled at runtime on
/// the error as it unwinds, not stored in the tree.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Default)]
pub struct Location {
    pub file: Name,
    pub line: u32,
    pub column: u32,
}

impl Location {
    /// Location for nodes synthesized by the runtime.
    pub const BUILTIN: Location = Location {
        file: Name::EMPTY,
        line: 0,
        column: 0,
    };

    #[inline]
    pub const fn new(file: Name, line: u32, column: u32) -> Self {
        Location { file, line, column }
    }

    #[inline]
    pub fn is_builtin(self) -> bool {
        self.line == 0
    }

    /// Render as `file:line:column` using the interner for the file name.
    pub fn display<'a>(self, names: &'a dyn StringLookup) -> LocationDisplay<'a> {
        LocationDisplay {
            location: self,
            names,
        }
    }
}

impl fmt::Debug for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}@{}:{}", self.file, self.line, self.column)
    }
}

/// Display adapter returned by [`Location::display`].
pub struct LocationDisplay<'a> {
    location: Location,
    names: &'a dyn StringLookup,
}

impl fmt::Display for LocationDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.location.is_builtin() {
            return write!(f, "<builtin>");
        }
        let file = self.names.lookup(self.location.file);
        write!(f, "{file}:{}:{}", self.location.line, self.location.column)
    }
}
