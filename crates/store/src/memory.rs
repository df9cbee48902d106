//! In-memory table store
//!
//! A `BTreeMap` behind a read-write lock, with the same key ordering
//! semantics as the durable backend. Scans snapshot the matching range up
//! front so no lock is held while the caller drains the iterator.

use crate::error::Result;
use crate::{ScanIter, TableStore};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::ops::Bound;

/// Table store for tests and embedded use.
#[derive(Default)]
pub struct MemoryStore {
    data: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TableStore for MemoryStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.data.read().get(key).cloned())
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.data.write().insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<()> {
        self.data.write().remove(key);
        Ok(())
    }

    fn scan_prefix(&self, prefix: &[u8]) -> Result<ScanIter<'_>> {
        let pairs: Vec<(Vec<u8>, Vec<u8>)> = self
            .data
            .read()
            .range((Bound::Included(prefix.to_vec()), Bound::Unbounded))
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        Ok(Box::new(pairs.into_iter().map(Ok)))
    }

    fn scan_after(&self, prefix: &[u8], after: &[u8]) -> Result<ScanIter<'_>> {
        let pairs: Vec<(Vec<u8>, Vec<u8>)> = self
            .data
            .read()
            .range((Bound::Excluded(after.to_vec()), Bound::Unbounded))
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        Ok(Box::new(pairs.into_iter().map(Ok)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_after_excludes_start_key() {
        let store = MemoryStore::new();
        store.put(b"q/1", b"a").unwrap();
        store.put(b"q/2", b"b").unwrap();
        store.put(b"r/1", b"c").unwrap();

        let keys: Vec<Vec<u8>> = store
            .scan_after(b"q/", b"q/1")
            .unwrap()
            .map(|item| item.unwrap().0)
            .collect();
        assert_eq!(keys, vec![b"q/2".to_vec()]);
    }

    #[test]
    fn overwrite_replaces_value() {
        let store = MemoryStore::new();
        store.put(b"k", b"old").unwrap();
        store.put(b"k", b"new").unwrap();
        assert_eq!(store.get(b"k").unwrap(), Some(b"new".to_vec()));
    }
}
