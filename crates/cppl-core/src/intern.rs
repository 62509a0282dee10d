//! Process-wide string interning for unit identifiers.
//!
//! Graph nodes and serialized records refer to units by dense integer IDs
//! rather than owned strings; this keeps node IDs packable into a single
//! 64-bit word and edge sets cheap to hash.

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// Dense identifier of an interned string.
///
/// IDs are allocated sequentially starting at 0 and are stable for the
/// lifetime of the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StringId(pub u32);

impl std::fmt::Display for StringId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Append-only intern table with thread-safe insertion.
#[derive(Debug, Default)]
pub struct StringPool {
    inner: RwLock<PoolInner>,
}

#[derive(Debug, Default)]
struct PoolInner {
    by_value: FxHashMap<Arc<str>, StringId>,
    by_id: Vec<Arc<str>>,
}

impl StringPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a string, returning its ID. Idempotent.
    pub fn intern(&self, value: &str) -> StringId {
        if let Some(id) = self.inner.read().by_value.get(value) {
            return *id;
        }

        let mut inner = self.inner.write();
        // Another thread may have interned between the read and write locks.
        if let Some(id) = inner.by_value.get(value) {
            return *id;
        }

        let id = StringId(inner.by_id.len() as u32);
        let stored: Arc<str> = Arc::from(value);
        inner.by_id.push(stored.clone());
        inner.by_value.insert(stored, id);
        id
    }

    /// Look up a previously interned string without inserting.
    pub fn get(&self, value: &str) -> Option<StringId> {
        self.inner.read().by_value.get(value).copied()
    }

    /// Resolve an ID back to its string.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not produced by this pool; IDs never cross pool
    /// boundaries in the coordinator.
    pub fn resolve(&self, id: StringId) -> Arc<str> {
        self.inner.read().by_id[id.0 as usize].clone()
    }

    pub fn len(&self) -> usize {
        self.inner.read().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
