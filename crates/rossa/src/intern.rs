//! Process-wide identifier interning (§4.2, the "Hash" table).
//!
//! Strings are interned into stable small integer handles. The table is
//! append-only and, per §5 ("the interned-name table [is] process-wide and
//! initialized once"), lives in a single global instance shared by every
//! [`crate::scope::Scope`] in the process — there is no per-interpreter
//! instance to thread through every call, matching the spec's wording
//! exactly. `hash(0)` is reserved for `<LAMBDA>`, the anonymous-function
//! marker (§4.2).

use std::sync::{Mutex, OnceLock};

use ahash::AHashMap;

/// A stable small-integer handle for an interned identifier.
///
/// Kept as a `u32` newtype, the same way the teacher's `StringId` is sized,
/// to keep name handles cheap to copy and compare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct NameId(u32);

impl NameId {
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    #[must_use]
    pub fn from_index(index: usize) -> Self {
        Self(index as u32)
    }
}

/// The anonymous-function marker, always handle 0 (§4.2).
pub const LAMBDA: NameId = NameId(0);

struct Table {
    strings: Vec<String>,
    lookup: AHashMap<String, NameId>,
}

impl Table {
    fn new() -> Self {
        let mut t = Table { strings: Vec::new(), lookup: AHashMap::new() };
        let lambda = t.intern("<LAMBDA>");
        debug_assert_eq!(lambda, LAMBDA);
        t
    }

    fn intern(&mut self, s: &str) -> NameId {
        if let Some(&id) = self.lookup.get(s) {
            return id;
        }
        let id = NameId::from_index(self.strings.len());
        self.strings.push(s.to_string());
        self.lookup.insert(s.to_string(), id);
        id
    }
}

fn table() -> &'static Mutex<Table> {
    static TABLE: OnceLock<Mutex<Table>> = OnceLock::new();
    TABLE.get_or_init(|| Mutex::new(Table::new()))
}

/// Interns `s`, returning its existing handle or appending a new one.
#[must_use]
pub fn hash(s: &str) -> NameId {
    table().lock().unwrap_or_else(std::sync::PoisonError::into_inner).intern(s)
}

/// Recovers the original string for a handle produced by [`hash`].
///
/// # Panics
/// Panics if `id` was never produced by [`hash`] in this process — the
/// table is append-only, so this can only happen with a handle forged
/// outside the interner.
#[must_use]
pub fn dehash(id: NameId) -> String {
    table()
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
        .strings
        .get(id.index())
        .cloned()
        .expect("dehash: handle was never interned")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lambda_is_handle_zero() {
        assert_eq!(LAMBDA.index(), 0);
        assert_eq!(dehash(LAMBDA), "<LAMBDA>");
    }

    #[test]
    fn repeated_interning_returns_same_handle() {
        let a = hash("some_unique_test_name_xyz");
        let b = hash("some_unique_test_name_xyz");
        assert_eq!(a, b);
        assert_eq!(dehash(a), "some_unique_test_name_xyz");
    }

    #[test]
    fn distinct_strings_get_distinct_handles() {
        let a = hash("distinct_one");
        let b = hash("distinct_two");
        assert_ne!(a, b);
    }
}
