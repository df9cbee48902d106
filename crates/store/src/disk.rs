//! Fjall-backed table store
//!
//! One keyspace with a single data partition. Every `put`/`delete` is a
//! single atomic key operation followed by a persist at the configured mode,
//! and scans map fjall's ordered iterators onto the boundary's byte-pair
//! iterator shape.

use crate::config::StoreConfig;
use crate::error::{Result, StoreError};
use crate::{ScanIter, TableStore};
use fjall::{Keyspace, Partition, PartitionCreateOptions};
use std::ops::Bound;

/// Durable table store over a fjall keyspace.
pub struct FjallStore {
    keyspace: Keyspace,
    data: Partition,
    persist_mode: fjall::PersistMode,
}

impl FjallStore {
    /// Open (or create) a store at the configured data directory.
    pub fn open(config: StoreConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir)?;

        let keyspace = fjall::Config::new(&config.data_dir)
            .cache_size(config.block_cache_size)
            .open()?;

        let data = keyspace.open_partition(
            "table_data",
            PartitionCreateOptions::default()
                .block_size(64 * 1024)
                .compression(config.compression),
        )?;

        Ok(Self {
            keyspace,
            data,
            persist_mode: config.persist_mode,
        })
    }
}

impl TableStore for FjallStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.data.get(key)?.map(|value| value.to_vec()))
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.data.insert(key, value)?;
        self.keyspace.persist(self.persist_mode)?;
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<()> {
        self.data.remove(key)?;
        self.keyspace.persist(self.persist_mode)?;
        Ok(())
    }

    fn scan_prefix(&self, prefix: &[u8]) -> Result<ScanIter<'_>> {
        let iter = self.data.prefix(prefix).map(|item| {
            item.map(|(key, value)| (key.to_vec(), value.to_vec()))
                .map_err(StoreError::from)
        });
        Ok(Box::new(iter))
    }

    fn scan_after(&self, prefix: &[u8], after: &[u8]) -> Result<ScanIter<'_>> {
        let prefix = prefix.to_vec();
        let range = (Bound::Excluded(after.to_vec()), Bound::<Vec<u8>>::Unbounded);
        let iter = self
            .data
            .range(range)
            .map(|item| {
                item.map(|(key, value)| (key.to_vec(), value.to_vec()))
                    .map_err(StoreError::from)
            })
            .take_while(move |item| match item {
                Ok((key, _)) => key.starts_with(&prefix),
                Err(_) => true,
            });
        Ok(Box::new(iter))
    }
}

impl Drop for FjallStore {
    fn drop(&mut self) {
        // Ensure data is persisted on drop
        let _ = self.keyspace.persist(fjall::PersistMode::SyncAll);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_temp() -> FjallStore {
        FjallStore::open(StoreConfig::default()).unwrap()
    }

    #[test]
    fn put_get_delete_roundtrip() {
        let store = open_temp();
        store.put(b"k1", b"v1").unwrap();
        assert_eq!(store.get(b"k1").unwrap(), Some(b"v1".to_vec()));

        store.delete(b"k1").unwrap();
        assert_eq!(store.get(b"k1").unwrap(), None);
    }

    #[test]
    fn scans_are_key_ordered_and_bounded() {
        let store = open_temp();
        store.put(b"a/1", b"1").unwrap();
        store.put(b"a/3", b"3").unwrap();
        store.put(b"a/2", b"2").unwrap();
        store.put(b"b/1", b"x").unwrap();

        let keys: Vec<Vec<u8>> = store
            .scan_prefix(b"a/")
            .unwrap()
            .map(|item| item.unwrap().0)
            .collect();
        assert_eq!(keys, vec![b"a/1".to_vec(), b"a/2".to_vec(), b"a/3".to_vec()]);

        let keys: Vec<Vec<u8>> = store
            .scan_after(b"a/", b"a/1")
            .unwrap()
            .map(|item| item.unwrap().0)
            .collect();
        assert_eq!(keys, vec![b"a/2".to_vec(), b"a/3".to_vec()]);
    }

    #[test]
    fn survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig::new(dir.path().to_path_buf());
        {
            let store = FjallStore::open(config.clone()).unwrap();
            store.put(b"durable", b"yes").unwrap();
        }
        let store = FjallStore::open(config).unwrap();
        assert_eq!(store.get(b"durable").unwrap(), Some(b"yes".to_vec()));
    }
}
