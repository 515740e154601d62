use bytes::Bytes;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::task::JoinHandle;
use tokio::time::{self, Duration, Instant, MissedTickBehavior};
use tracing::debug;

pub const DEFAULT_BUCKETS: usize = 1024;

/// The Store maps keys to values, each with an optional expiration instant. Entries live in a
/// fixed number of buckets, each one a chain of the entries whose key hashes to it.
///
/// Expiration is lazy: an expired entry is invisible to every read but stays linked until it is
/// removed, overwritten or swept by the optional reaper task.
///
/// The store is a handle around a single lock and can be shared and cloned cheaply.
#[derive(Clone)]
pub struct Store {
    inner: Arc<Mutex<Table>>,
}

impl Store {
    pub fn new() -> Store {
        Self::with_buckets(DEFAULT_BUCKETS)
    }

    /// Creates a store with a custom number of buckets (at least one).
    pub fn with_buckets(buckets: usize) -> Store {
        let table = Table {
            buckets: (0..buckets.max(1)).map(|_| Vec::new()).collect(),
            count: 0,
        };

        Self {
            inner: Arc::new(Mutex::new(table)),
        }
    }

    pub fn lock(&self) -> StoreLocked<'_> {
        lock_table(&self.inner)
    }

    /// Periodically unlinks expired entries. The task stops once every handle to the store has
    /// been dropped.
    pub fn spawn_reaper(&self, period: Duration) -> JoinHandle<()> {
        let table = Arc::downgrade(&self.inner);
        let period = period.max(Duration::from_millis(1));

        tokio::spawn(async move { remove_expired_keys(table, period).await })
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

pub struct StoreLocked<'a> {
    table: MutexGuard<'a, Table>,
}

/// Remaining lifetime of a key.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum KeyTtl {
    Missing,
    Persistent,
    Expires(Duration),
}

impl<'a> StoreLocked<'a> {
    /// Inserts the entry, or replaces value and expiration of the existing one.
    pub fn set(&mut self, key: Bytes, data: Bytes, expires_at: Option<Instant>) {
        let index = self.table.bucket_index(&key);
        let chain = &mut self.table.buckets[index];

        if let Some(entry) = chain.iter_mut().find(|entry| entry.key == key) {
            entry.data = data;
            entry.expires_at = expires_at;
            return;
        }

        chain.push(Entry {
            key,
            data,
            expires_at,
        });
        self.table.count += 1;
    }

    /// Like `set`, expiring `ttl` from now. A deadline past the range of the clock never fires.
    pub fn set_with_ttl(&mut self, key: Bytes, data: Bytes, ttl: Duration) {
        self.set(key, data, Instant::now().checked_add(ttl));
    }

    pub fn get(&self, key: &[u8]) -> Option<Bytes> {
        let now = Instant::now();
        self.table
            .find(key)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.data.clone())
    }

    /// Unlinks the entry whether or not it has expired. Returns `true` if there was one.
    pub fn remove(&mut self, key: &[u8]) -> bool {
        let index = self.table.bucket_index(key);
        let chain = &mut self.table.buckets[index];

        match chain.iter().position(|entry| entry.key == key) {
            Some(position) => {
                chain.swap_remove(position);
                self.table.count -= 1;
                true
            }
            None => false,
        }
    }

    pub fn exists(&self, key: &[u8]) -> bool {
        self.get(key).is_some()
    }

    /// All keys that have not expired, in bucket order.
    pub fn keys(&self) -> Vec<Bytes> {
        let now = Instant::now();
        self.table
            .buckets
            .iter()
            .flatten()
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.key.clone())
            .collect()
    }

    pub fn ttl(&self, key: &[u8]) -> KeyTtl {
        let now = Instant::now();
        match self.table.find(key) {
            Some(entry) if entry.is_expired(now) => KeyTtl::Missing,
            Some(entry) => match entry.expires_at {
                Some(expires_at) => KeyTtl::Expires(expires_at - now),
                None => KeyTtl::Persistent,
            },
            None => KeyTtl::Missing,
        }
    }

    /// Number of linked entries, expired ones that were not swept yet included.
    pub fn len(&self) -> usize {
        self.table.count
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Unlinks every expired entry and returns how many were removed.
    pub fn remove_expired(&mut self) -> usize {
        let now = Instant::now();
        let mut removed = 0;

        for chain in self.table.buckets.iter_mut() {
            let before = chain.len();
            chain.retain(|entry| !entry.is_expired(now));
            removed += before - chain.len();
        }

        self.table.count -= removed;
        removed
    }
}

struct Table {
    buckets: Vec<Vec<Entry>>,
    count: usize,
}

impl Table {
    fn bucket_index(&self, key: &[u8]) -> usize {
        hash(key) as usize % self.buckets.len()
    }

    fn find(&self, key: &[u8]) -> Option<&Entry> {
        self.buckets[self.bucket_index(key)]
            .iter()
            .find(|entry| entry.key == key)
    }
}

struct Entry {
    key: Bytes,
    data: Bytes,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|expires_at| now >= expires_at)
    }
}

/// djb2: `h = h * 33 + byte`, seeded with 5381.
fn hash(key: &[u8]) -> u32 {
    key.iter().fold(5381u32, |hash, &byte| {
        hash.wrapping_mul(33).wrapping_add(u32::from(byte))
    })
}

fn lock_table(table: &Mutex<Table>) -> StoreLocked<'_> {
    // Every mutation leaves the table consistent before it can panic, so a poisoned lock is
    // still safe to use.
    let table = table.lock().unwrap_or_else(PoisonError::into_inner);
    StoreLocked { table }
}

async fn remove_expired_keys(table: Weak<Mutex<Table>>, period: Duration) {
    let mut interval = time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        interval.tick().await;

        let Some(store) = table.upgrade() else {
            break;
        };

        let removed = lock_table(&store).remove_expired();
        if removed > 0 {
            debug!("Removed {} expired keys", removed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::distributions::Alphanumeric;
    use rand::Rng;
    use std::collections::HashSet;

    fn key(s: &str) -> Bytes {
        Bytes::from(s.to_string())
    }

    #[test]
    fn set_and_get() {
        let store = Store::new();
        let mut state = store.lock();

        state.set(key("foo"), Bytes::from("bar"), None);

        assert_eq!(state.get(b"foo"), Some(Bytes::from("bar")));
        assert_eq!(state.get(b"missing"), None);
        assert_eq!(state.len(), 1);
    }

    #[test]
    fn latest_write_wins() {
        let store = Store::new();
        let mut state = store.lock();

        state.set(key("foo"), Bytes::from("v1"), None);
        state.set(key("foo"), Bytes::from("v2"), None);

        assert_eq!(state.get(b"foo"), Some(Bytes::from("v2")));
        assert_eq!(state.len(), 1);
    }

    #[test]
    fn remove_counts_only_actual_removals() {
        let store = Store::new();
        let mut state = store.lock();

        state.set(key("a"), Bytes::from("1"), None);
        state.set(key("c"), Bytes::from("3"), None);

        assert!(state.remove(b"a"));
        assert!(!state.remove(b"b"));
        assert!(state.remove(b"c"));
        assert!(!state.remove(b"a"));
        assert!(state.is_empty());
    }

    #[test]
    fn colliding_keys_share_a_chain() {
        let store = Store::with_buckets(1);
        let mut state = store.lock();

        for i in 0..10 {
            state.set(key(&format!("key{}", i)), Bytes::from(i.to_string()), None);
        }
        assert!(state.remove(b"key3"));
        state.set(key("key7"), Bytes::from("seven"), None);

        assert_eq!(state.len(), 9);
        assert_eq!(state.get(b"key3"), None);
        assert_eq!(state.get(b"key7"), Some(Bytes::from("seven")));
        assert_eq!(state.get(b"key9"), Some(Bytes::from("9")));
        assert_eq!(state.keys().len(), 9);
    }

    #[test]
    fn many_random_keys() {
        let store = Store::new();
        let mut rng = rand::thread_rng();
        let keys: HashSet<String> = (0..5000)
            .map(|_| {
                (&mut rng)
                    .sample_iter(&Alphanumeric)
                    .take(12)
                    .map(char::from)
                    .collect()
            })
            .collect();

        let mut state = store.lock();
        for k in &keys {
            state.set(key(k), key(k), None);
        }

        assert_eq!(state.len(), keys.len());
        for k in &keys {
            assert_eq!(state.get(k.as_bytes()), Some(key(k)));
        }

        let listed: HashSet<String> = state
            .keys()
            .into_iter()
            .map(|k| String::from_utf8(k.to_vec()).unwrap())
            .collect();
        assert_eq!(listed, keys);
    }

    #[test]
    fn hash_is_djb2() {
        assert_eq!(hash(b""), 5381);
        assert_eq!(hash(b"a"), 5381 * 33 + 97);
    }

    #[tokio::test(start_paused = true)]
    async fn lazy_expiry() {
        let store = Store::new();

        store
            .lock()
            .set_with_ttl(key("key1"), Bytes::from("value1"), Duration::from_secs(1));
        store
            .lock()
            .set(key("key2"), Bytes::from("value2"), None);

        assert_eq!(store.lock().get(b"key1"), Some(Bytes::from("value1")));
        assert!(store.lock().exists(b"key1"));

        time::advance(Duration::from_secs(1)).await;

        let state = store.lock();
        assert_eq!(state.get(b"key1"), None);
        assert!(!state.exists(b"key1"));
        assert_eq!(state.keys(), vec![key("key2")]);
        assert_eq!(state.ttl(b"key1"), KeyTtl::Missing);
        // Still linked, nothing removed it.
        assert_eq!(state.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn overwrite_clears_expiration() {
        let store = Store::new();

        store
            .lock()
            .set_with_ttl(key("foo"), Bytes::from("old"), Duration::from_secs(1));
        store.lock().set(key("foo"), Bytes::from("new"), None);

        time::advance(Duration::from_secs(5)).await;

        assert_eq!(store.lock().get(b"foo"), Some(Bytes::from("new")));
        assert_eq!(store.lock().ttl(b"foo"), KeyTtl::Persistent);
    }

    #[tokio::test(start_paused = true)]
    async fn remove_works_on_expired_entries() {
        let store = Store::new();

        store
            .lock()
            .set_with_ttl(key("foo"), Bytes::from("bar"), Duration::from_secs(1));
        time::advance(Duration::from_secs(2)).await;

        assert!(store.lock().remove(b"foo"));
        assert!(store.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn ttl() {
        let store = Store::new();

        store
            .lock()
            .set_with_ttl(key("foo"), Bytes::from("bar"), Duration::from_secs(10));
        time::advance(Duration::from_secs(4)).await;

        assert_eq!(
            store.lock().ttl(b"foo"),
            KeyTtl::Expires(Duration::from_secs(6))
        );
        assert_eq!(store.lock().ttl(b"missing"), KeyTtl::Missing);
    }

    #[tokio::test(start_paused = true)]
    async fn remove_expired() {
        let store = Store::with_buckets(4);

        {
            let mut state = store.lock();
            state.set_with_ttl(key("key1"), Bytes::from("1"), Duration::from_secs(10));
            state.set_with_ttl(key("key2"), Bytes::from("2"), Duration::from_secs(20));
            state.set(key("key3"), Bytes::from("3"), None);
        }

        time::advance(Duration::from_secs(10)).await;

        let mut state = store.lock();
        assert_eq!(state.remove_expired(), 1);
        assert_eq!(state.len(), 2);
        assert!(state.exists(b"key2"));
        assert_eq!(state.remove_expired(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn reaper_unlinks_expired_entries() {
        let store = Store::new();
        let reaper = store.spawn_reaper(Duration::from_secs(1));

        store
            .lock()
            .set_with_ttl(key("key1"), Bytes::from("1"), Duration::from_secs(2));
        assert_eq!(store.lock().len(), 1);

        time::sleep(Duration::from_secs(4)).await;

        assert_eq!(store.lock().len(), 0);

        drop(store);
        time::sleep(Duration::from_secs(2)).await;
        assert!(reaper.is_finished());
    }
}
