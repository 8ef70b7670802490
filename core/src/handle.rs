use crate::attribute::AttributeIndex;
use crate::lexical::LexicalIndex;
use crate::record::RecordStore;
use parking_lot::RwLock;
use std::sync::Arc;

/// Everything one query reads, built and swapped as a unit.
#[derive(Debug, Default)]
pub struct SearchIndex {
    pub store: RecordStore,
    pub lexical: LexicalIndex,
    pub attributes: AttributeIndex,
}

impl SearchIndex {
    pub fn build(store: RecordStore) -> Self {
        let lexical = LexicalIndex::build(&store);
        Self::with_lexical(store, lexical)
    }

    /// Pair a loaded lexical artifact with the record store it was built from.
    pub fn with_lexical(store: RecordStore, lexical: LexicalIndex) -> Self {
        let stale = lexical.keys.iter().filter(|k| !store.contains(k)).count();
        if stale > 0 || lexical.len() != store.len() {
            tracing::warn!(
                artifact_docs = lexical.len(),
                records = store.len(),
                unknown_ids = stale,
                "index artifact and record store differ; rebuild the index"
            );
        }
        let attributes = AttributeIndex::build(&store);
        Self { store, lexical, attributes }
    }
}

/// Shared slot holding the live index. Readers take an `Arc` snapshot and
/// keep using it even if a rebuild swaps in a new value meanwhile.
pub struct IndexHandle<T> {
    slot: RwLock<Arc<T>>,
}

impl<T> IndexHandle<T> {
    pub fn new(value: T) -> Self {
        Self { slot: RwLock::new(Arc::new(value)) }
    }

    pub fn current(&self) -> Arc<T> {
        Arc::clone(&self.slot.read())
    }

    /// Publish a fully built value; returns the one it replaced.
    pub fn replace(&self, value: T) -> Arc<T> {
        let next = Arc::new(value);
        std::mem::replace(&mut *self.slot.write(), next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_survives_replace() {
        let handle = IndexHandle::new(1u32);
        let before = handle.current();
        let old = handle.replace(2);
        assert_eq!(*before, 1);
        assert_eq!(*old, 1);
        assert_eq!(*handle.current(), 2);
    }

    #[test]
    fn concurrent_readers_see_whole_values() {
        let handle = Arc::new(IndexHandle::new(vec![0u32; 64]));
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let h = Arc::clone(&handle);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        let snap = h.current();
                        assert!(snap.iter().all(|&v| v == snap[0]));
                    }
                })
            })
            .collect();
        for i in 1..50u32 {
            handle.replace(vec![i; 64]);
        }
        for r in readers {
            r.join().unwrap();
        }
    }
}
