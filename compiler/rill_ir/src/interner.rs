//! Identifier table shared by the parser, the evaluator and plugins.
//!
//! Identifiers that appear in programs are interned once and never freed,
//! so `lookup` can hand out `&'static str`. Strings computed at runtime
//! (frame keys built by a script, port names from an index expression) must
//! not grow the table on reads: they go through [`StringInterner::get`],
//! which only finds names that something already bound.

use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use super::Name;

#[derive(Default)]
struct Table {
    slots: FxHashMap<&'static str, Name>,
    strings: Vec<&'static str>,
}

impl Table {
    fn with_empty() -> Self {
        let mut table = Table::default();
        table.slots.insert("", Name::EMPTY);
        table.strings.push("");
        table
    }
}

/// Append-only identifier table.
pub struct StringInterner {
    table: RwLock<Table>,
}

impl StringInterner {
    pub fn new() -> Self {
        StringInterner {
            table: RwLock::new(Table::with_empty()),
        }
    }

    /// Name for `s`, adding it if it is new.
    ///
    /// Use this for identifiers and for keys that are about to be bound;
    /// every new string lives until the process exits.
    ///
    /// # Panics
    /// If more than `u32::MAX` distinct strings are interned.
    pub fn intern(&self, s: &str) -> Name {
        if let Some(name) = self.get(s) {
            return name;
        }

        let mut table = self.table.write();
        // Raced with another writer between the two locks.
        if let Some(&name) = table.slots.get(s) {
            return name;
        }
        let Ok(slot) = u32::try_from(table.strings.len()) else {
            panic!("identifier table is full");
        };
        let name = Name::from_slot(slot);
        let stored: &'static str = Box::leak(s.to_owned().into_boxed_str());
        table.strings.push(stored);
        table.slots.insert(stored, name);
        name
    }

    /// Name for `s` if it has been interned, without adding it.
    pub fn get(&self, s: &str) -> Option<Name> {
        self.table.read().slots.get(s).copied()
    }

    /// String for `name`. Names from another interner read as `<unknown>`.
    pub fn lookup(&self, name: Name) -> &'static str {
        self.table
            .read()
            .strings
            .get(name.slot())
            .copied()
            .unwrap_or("<unknown>")
    }

    /// Number of interned strings, the empty one included.
    pub fn len(&self) -> usize {
        self.table.read().strings.len()
    }

    /// Whether nothing beyond the empty string has been interned.
    pub fn is_empty(&self) -> bool {
        self.len() <= 1
    }
}

impl Default for StringInterner {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-only access to interned names, so diagnostics can be rendered
/// without the concrete interner type.
pub trait StringLookup {
    fn lookup(&self, name: Name) -> &str;
}

impl StringLookup for StringInterner {
    fn lookup(&self, name: Name) -> &str {
        StringInterner::lookup(self, name)
    }
}

/// Interner shared between the evaluation context, script loaders and
/// plugin factories.
#[derive(Clone, Default)]
pub struct SharedInterner(Arc<StringInterner>);

impl SharedInterner {
    pub fn new() -> Self {
        Self::default()
    }
}

impl std::ops::Deref for SharedInterner {
    type Target = StringInterner;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
