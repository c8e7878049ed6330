//! Expiring key/value store.
//!
//! Keys and values are raw bytes; Redis strings are binary-safe. Entries
//! carry an optional absolute expiry timestamp. Expired entries are never
//! returned: reads evict them lazily, and inserting an entry that is already
//! expired is a no-op.

use std::collections::HashMap;
use std::sync::Arc;

use jiff::Timestamp;
use parking_lot::RwLock;

/// Discriminator for stored values. The keyspace is shared with future data
/// types (streams); only strings are implemented.
#[derive(Debug, Clone, PartialEq)]
pub enum DataType {
    String(Vec<u8>),
}

/// A stored value and its optional absolute expiry.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub data: DataType,
    pub expire_at: Option<Timestamp>,
}

impl Entry {
    pub fn string(value: impl Into<Vec<u8>>, expire_at: Option<Timestamp>) -> Self {
        Self {
            data: DataType::String(value.into()),
            expire_at,
        }
    }

    /// An entry with `expire_at == None` never expires.
    pub fn is_expired_at(&self, now: Timestamp) -> bool {
        match self.expire_at {
            Some(expire_at) => now >= expire_at,
            None => false,
        }
    }
}

/// Concurrent map of key to [`Entry`].
///
/// Cloning is cheap and shares the underlying map. Reads take the lock in
/// shared mode; eviction and writes take it exclusively. No critical section
/// is held across an await point.
#[derive(Debug, Clone, Default)]
pub struct Store {
    entries: Arc<RwLock<HashMap<Vec<u8>, Entry>>>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or overwrites an entry. Entries already expired at insertion
    /// time are dropped instead of recorded.
    pub fn set(&self, key: impl Into<Vec<u8>>, entry: Entry) {
        let key = key.into();

        if entry.is_expired_at(Timestamp::now()) {
            self.entries.write().remove(&key);
            return;
        }

        self.entries.write().insert(key, entry);
    }

    /// Looks up a key, evicting it first when its expiry has passed.
    pub fn get(&self, key: &[u8]) -> Option<Entry> {
        let now = Timestamp::now();

        {
            let entries = self.entries.read();

            match entries.get(key) {
                None => return None,
                Some(entry) if !entry.is_expired_at(now) => return Some(entry.clone()),
                Some(_) => {}
            }
        }

        // Expired: upgrade to a write lock and re-check, since another
        // reader may have evicted the key in the meantime.
        let mut entries = self.entries.write();
        if let Some(entry) = entries.get(key) {
            if entry.is_expired_at(now) {
                entries.remove(key);
            } else {
                return Some(entry.clone());
            }
        }

        None
    }

    /// Removes a key, reporting whether anything was removed.
    pub fn delete(&self, key: &[u8]) -> bool {
        self.entries.write().remove(key).is_some()
    }

    /// All live keys. Expired entries encountered during the scan are
    /// evicted.
    pub fn keys(&self) -> Vec<Vec<u8>> {
        let now = Timestamp::now();
        let mut entries = self.entries.write();

        entries.retain(|_, entry| !entry.is_expired_at(now));
        entries.keys().cloned().collect()
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        self.keys().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jiff::SignedDuration;

    #[test]
    fn test_set_then_get() {
        let store = Store::new();
        store.set("fruit", Entry::string("mango", None));

        assert_eq!(store.get(b"fruit"), Some(Entry::string("mango", None)));
        assert_eq!(store.get(b"vegetable"), None);
    }

    #[test]
    fn test_set_overwrites() {
        let store = Store::new();
        store.set("fruit", Entry::string("mango", None));
        store.set("fruit", Entry::string("papaya", None));

        assert_eq!(store.get(b"fruit"), Some(Entry::string("papaya", None)));
    }

    #[test]
    fn test_binary_keys_and_values() {
        let store = Store::new();
        let key = vec![0xFF, 0x00, b'k'];
        let value = vec![0x00, 0xFE, 0xFF];

        store.set(key.clone(), Entry::string(value.clone(), None));

        assert_eq!(store.get(&key), Some(Entry::string(value, None)));
        assert_eq!(store.keys(), vec![key]);
    }

    #[test]
    fn test_expired_entry_is_dropped_on_insert() {
        let store = Store::new();
        let past = Timestamp::now() - SignedDuration::from_secs(1);
        store.set("fruit", Entry::string("mango", Some(past)));

        assert_eq!(store.get(b"fruit"), None);
        assert!(store.keys().is_empty());
    }

    #[test]
    fn test_insert_of_expired_entry_removes_previous_value() {
        let store = Store::new();
        store.set("fruit", Entry::string("mango", None));

        let past = Timestamp::now() - SignedDuration::from_secs(1);
        store.set("fruit", Entry::string("papaya", Some(past)));

        assert_eq!(store.get(b"fruit"), None);
    }

    #[test]
    fn test_get_evicts_expired_entry() {
        let store = Store::new();
        let future = Timestamp::now() + SignedDuration::from_millis(10);
        store.set("fruit", Entry::string("mango", Some(future)));

        assert!(store.get(b"fruit").is_some());

        std::thread::sleep(std::time::Duration::from_millis(20));

        assert_eq!(store.get(b"fruit"), None);
        assert!(store.keys().is_empty());
    }

    #[test]
    fn test_delete() {
        let store = Store::new();
        store.set("fruit", Entry::string("mango", None));

        assert!(store.delete(b"fruit"));
        assert!(!store.delete(b"fruit"));
        assert_eq!(store.get(b"fruit"), None);
    }

    #[test]
    fn test_keys_skips_expired_entries() {
        let store = Store::new();
        let future = Timestamp::now() + SignedDuration::from_millis(10);
        store.set("live", Entry::string("a", None));
        store.set("dying", Entry::string("b", Some(future)));

        let mut keys = store.keys();
        keys.sort();
        assert_eq!(keys, vec![b"dying".to_vec(), b"live".to_vec()]);

        std::thread::sleep(std::time::Duration::from_millis(20));

        assert_eq!(store.keys(), vec![b"live".to_vec()]);
    }
}
