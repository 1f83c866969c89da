// Reference tables
//
// Session-local, bidirectional mapping between snapshot handles and the
// 64-bit ids a debugger sees. Every table of a session draws from one
// counter, so ids are unique across kinds and never reused. Id 0 is null.

use crate::adapter::Handle;
use std::collections::HashMap;
use std::hash::Hash;
use std::panic::Location;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// Lock `mutex`, recovering the guard if a panicking holder poisoned it
#[track_caller]
pub(crate) fn lock<'a, T>(mutex: &'a Mutex<T>, context: &'static str) -> MutexGuard<'a, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(err) => {
            let loc = Location::caller();
            tracing::error!(
                context,
                file = loc.file(),
                line = loc.line(),
                "mutex poisoned; continuing with recovered guard"
            );
            err.into_inner()
        }
    }
}

/// A field, identified by its declaring type and position in it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldKey {
    pub declaring_type: Handle,
    pub index: usize,
}

/// A frame, identified by its thread and depth (0 = innermost)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameKey {
    pub thread: Handle,
    pub depth: usize,
}

#[derive(Debug)]
struct Entries<K> {
    by_key: HashMap<K, u64>,
    by_id: HashMap<u64, K>,
}

#[derive(Debug)]
pub struct ReferenceTable<K> {
    name: &'static str,
    counter: Arc<AtomicU64>,
    entries: Mutex<Entries<K>>,
}

impl<K: Copy + Eq + Hash> ReferenceTable<K> {
    pub fn new(name: &'static str, counter: Arc<AtomicU64>) -> Self {
        Self {
            name,
            counter,
            entries: Mutex::new(Entries {
                by_key: HashMap::new(),
                by_id: HashMap::new(),
            }),
        }
    }

    /// Id for `key`, assigned on first sight
    pub fn id_for(&self, key: K) -> u64 {
        let mut entries = lock(&self.entries, self.name);
        if let Some(id) = entries.by_key.get(&key) {
            return *id;
        }
        let id = self.counter.fetch_add(1, Ordering::Relaxed);
        entries.by_key.insert(key, id);
        entries.by_id.insert(id, key);
        id
    }

    pub fn lookup(&self, id: u64) -> Option<K> {
        lock(&self.entries, self.name).by_id.get(&id).copied()
    }

    pub fn len(&self) -> usize {
        lock(&self.entries, self.name).by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// All id namespaces of one session
#[derive(Debug)]
pub struct ReferenceTables {
    pub objects: ReferenceTable<Handle>,
    pub types: ReferenceTable<Handle>,
    pub methods: ReferenceTable<Handle>,
    pub fields: ReferenceTable<FieldKey>,
    pub frames: ReferenceTable<FrameKey>,
}

impl ReferenceTables {
    pub fn new() -> Self {
        let counter = Arc::new(AtomicU64::new(1));
        Self {
            objects: ReferenceTable::new("objects", counter.clone()),
            types: ReferenceTable::new("types", counter.clone()),
            methods: ReferenceTable::new("methods", counter.clone()),
            fields: ReferenceTable::new("fields", counter.clone()),
            frames: ReferenceTable::new("frames", counter),
        }
    }

    /// Object id for `handle`; the null handle stays 0
    pub fn object_id(&self, handle: Handle) -> u64 {
        if handle == 0 {
            0
        } else {
            self.objects.id_for(handle)
        }
    }
}

impl Default for ReferenceTables {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_ids_are_stable() {
        let tables = ReferenceTables::new();
        let first = tables.objects.id_for(0x7000);
        assert_eq!(tables.objects.id_for(0x7000), first);
        assert_ne!(tables.objects.id_for(0x7010), first);
        assert_eq!(tables.objects.lookup(first), Some(0x7000));
        assert_eq!(tables.objects.lookup(999), None);
    }

    #[test]
    fn test_kinds_share_one_counter() {
        let tables = ReferenceTables::new();
        let object = tables.objects.id_for(0x10);
        let ty = tables.types.id_for(0x10);
        let field = tables.fields.id_for(FieldKey {
            declaring_type: 0x10,
            index: 0,
        });
        assert_ne!(object, ty);
        assert_ne!(ty, field);
        // A type id is not an object id
        assert_eq!(tables.objects.lookup(ty), None);
    }

    #[test]
    fn test_null_is_zero() {
        let tables = ReferenceTables::new();
        assert_eq!(tables.object_id(0), 0);
        assert!(tables.objects.is_empty());
        assert!(tables.object_id(0x20) > 0);
    }

    #[test]
    fn test_concurrent_assignment() {
        let tables = Arc::new(ReferenceTables::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let tables = tables.clone();
                thread::spawn(move || (0..100u64).map(|h| tables.objects.id_for(h + 1)).collect::<Vec<_>>())
            })
            .collect();
        let results: Vec<Vec<u64>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(results.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(tables.objects.len(), 100);
    }
}
