//! Thread-Safe Store with Lazy Expiry
//!
//! This module implements the key space shared by every connection.
//! Keys map to either a string or a list, each with an optional absolute
//! expiry instant.
//!
//! ## Design Decisions
//!
//! 1. **One Lock**: The whole map sits behind a single `RwLock`. Writers
//!    serialize against each other across all keys; readers share.
//! 2. **Lazy Expiry**: A record whose expiry has passed is reported as
//!    absent but stays in the map until a later write replaces it or `del`
//!    removes it. There is no background sweeper, so memory held by expired
//!    keys that are never touched again is not reclaimed.
//! 3. **Wall-Clock Expiry**: Expiry instants are `SystemTime` so that
//!    absolute Unix timestamps (`EXAT`/`PXAT`) need no translation.
//!
//! ## Concurrency Model
//!
//! ```text
//! ┌───────────────────────────────────────────┐
//! │                   Store                   │
//! │  ┌─────────────────────────────────────┐  │
//! │  │ RwLock<HashMap<Bytes, Record>>      │  │
//! │  │   read lock:  get / exists / lookup │  │
//! │  │   write lock: set / del / incr /    │  │
//! │  │               left_push_list        │  │
//! │  └─────────────────────────────────────┘  │
//! └───────────────────────────────────────────┘
//! ```
//!
//! No operation awaits or performs I/O while holding the lock.

use bytes::Bytes;
use std::collections::{HashMap, VecDeque};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Errors returned by store operations.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum StoreError {
    /// The stored string does not parse as a signed 64-bit integer
    #[error("value is not an integer or out of range")]
    NotAnInteger,

    /// The result of INCR/DECR does not fit in 64 bits
    #[error("increment or decrement would overflow")]
    Overflow,

    /// The key holds a different kind of value than the operation needs
    #[error("Operation against a key holding the wrong kind of value")]
    WrongType,
}

/// The payload of a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    String(Bytes),
    List(VecDeque<Bytes>),
}

/// A stored value plus its optional expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub value: Value,
    /// When this record stops being visible (None = never expires)
    pub expires_at: Option<SystemTime>,
}

impl Record {
    /// Creates a record without expiry.
    pub fn new(value: Value) -> Self {
        Self {
            value,
            expires_at: None,
        }
    }

    pub fn with_expiry(value: Value, expires_at: SystemTime) -> Self {
        Self {
            value,
            expires_at: Some(expires_at),
        }
    }

    /// Checks whether this record has expired as of `now`.
    #[inline]
    pub fn is_expired_at(&self, now: SystemTime) -> bool {
        self.expires_at.is_some_and(|exp| now >= exp)
    }

    #[inline]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(SystemTime::now())
    }
}

/// The key-value store shared by all client connections.
///
/// Wrap it in an `Arc` and hand clones to each connection's command
/// handler. All operations are thread-safe.
///
/// # Example
///
/// ```
/// use lazykv::storage::Store;
/// use bytes::Bytes;
/// use std::time::Duration;
///
/// let store = Store::new();
///
/// store.set(Bytes::from("name"), Bytes::from("Ariz"));
/// assert_eq!(store.get(b"name"), Some(Bytes::from("Ariz")));
///
/// store.set_with_expire(Bytes::from("session"), Bytes::from("abc123"), Duration::from_secs(60));
/// assert!(store.exists(b"session"));
/// ```
#[derive(Debug, Default)]
pub struct Store {
    data: RwLock<HashMap<Bytes, Record>>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    // Poisoning is ignored: every mutation is a single insert, remove or
    // in-place push.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<Bytes, Record>> {
        self.data.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<Bytes, Record>> {
        self.data.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sets a string value, replacing whatever the key held and clearing
    /// any expiry.
    pub fn set(&self, key: Bytes, value: Bytes) {
        self.write().insert(key, Record::new(Value::String(value)));
    }

    /// Sets a string value that expires `ttl` from now.
    ///
    /// A `ttl` too large to represent as a wall-clock instant never expires.
    pub fn set_with_expire(&self, key: Bytes, value: Bytes, ttl: Duration) {
        let record = match SystemTime::now().checked_add(ttl) {
            Some(at) => Record::with_expiry(Value::String(value), at),
            None => Record::new(Value::String(value)),
        };
        self.write().insert(key, record);
    }

    /// Sets a string value that expires at the absolute instant `at`.
    ///
    /// An instant in the past stores a record that is already invisible.
    pub fn set_with_expire_at(&self, key: Bytes, value: Bytes, at: SystemTime) {
        self.write()
            .insert(key, Record::with_expiry(Value::String(value), at));
    }

    /// Gets the string stored at `key`.
    ///
    /// Returns `None` if the key was never set, has expired, or holds a list.
    pub fn get(&self, key: &[u8]) -> Option<Bytes> {
        match self.lookup(key)? {
            Value::String(s) => Some(s),
            Value::List(_) => None,
        }
    }

    /// Gets the list stored at `key`, head first.
    pub fn get_list(&self, key: &[u8]) -> Option<Vec<Bytes>> {
        match self.lookup(key)? {
            Value::List(list) => Some(list.into()),
            Value::String(_) => None,
        }
    }

    /// Returns a copy of the live value at `key`, whichever kind it is.
    pub fn lookup(&self, key: &[u8]) -> Option<Value> {
        let data = self.read();
        data.get(key)
            .filter(|record| !record.is_expired())
            .map(|record| record.value.clone())
    }

    /// Checks if a key is present and not expired.
    pub fn exists(&self, key: &[u8]) -> bool {
        let data = self.read();
        data.get(key).is_some_and(|record| !record.is_expired())
    }

    /// Removes a key from the map.
    ///
    /// Expired records are removed as well, but only a live record counts
    /// as deleted.
    pub fn del(&self, key: &[u8]) -> bool {
        let mut data = self.write();
        data.remove(key).is_some_and(|record| !record.is_expired())
    }

    /// Increments the integer stored at `key` by 1.
    ///
    /// An absent key counts as `"0"`. The existing expiry is kept.
    pub fn incr(&self, key: &Bytes) -> Result<i64, StoreError> {
        self.add(key, 1)
    }

    /// Decrements the integer stored at `key` by 1.
    pub fn decr(&self, key: &Bytes) -> Result<i64, StoreError> {
        self.add(key, -1)
    }

    fn add(&self, key: &Bytes, delta: i64) -> Result<i64, StoreError> {
        let mut data = self.write();
        let now = SystemTime::now();

        let (current, expires_at) = match data.get(key).filter(|r| !r.is_expired_at(now)) {
            None => (0, None),
            Some(Record {
                value: Value::String(s),
                expires_at,
            }) => (parse_integer(s)?, *expires_at),
            Some(_) => return Err(StoreError::WrongType),
        };

        let new_value = current.checked_add(delta).ok_or(StoreError::Overflow)?;

        data.insert(
            key.clone(),
            Record {
                value: Value::String(Bytes::from(new_value.to_string())),
                expires_at,
            },
        );

        Ok(new_value)
    }

    /// Pushes `elements` onto the head of the list at `key`.
    ///
    /// The elements are pushed one at a time, so `[a, b, c]` lands as
    /// `c, b, a` in front of the existing contents. An absent key becomes a
    /// new list.
    ///
    /// # Returns
    /// The length of the list after the push.
    pub fn left_push_list(&self, key: Bytes, elements: Vec<Bytes>) -> Result<usize, StoreError> {
        let mut data = self.write();
        let now = SystemTime::now();

        if let Some(record) = data.get_mut(&key) {
            if !record.is_expired_at(now) {
                return match &mut record.value {
                    Value::List(list) => {
                        for element in elements {
                            list.push_front(element);
                        }
                        Ok(list.len())
                    }
                    Value::String(_) => Err(StoreError::WrongType),
                };
            }
        }

        if elements.is_empty() {
            return Ok(0);
        }

        let list: VecDeque<Bytes> = elements.into_iter().rev().collect();
        let len = list.len();
        data.insert(key, Record::new(Value::List(list)));
        Ok(len)
    }

    /// Gets the remaining time to live for a key in milliseconds.
    ///
    /// # Returns
    ///
    /// - `Some(ms)` if the key exists and has an expiry
    /// - `Some(-1)` if the key exists but has no expiry
    /// - `None` if the key doesn't exist
    pub fn pttl(&self, key: &[u8]) -> Option<i64> {
        let data = self.read();
        let now = SystemTime::now();
        let record = data.get(key).filter(|r| !r.is_expired_at(now))?;

        Some(match record.expires_at {
            Some(exp) => exp
                .duration_since(now)
                .map(|left| i64::try_from(left.as_millis()).unwrap_or(i64::MAX))
                .unwrap_or(0),
            None => -1,
        })
    }

    /// Returns the number of entries in the map, including expired records
    /// that have not been overwritten or deleted yet.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn parse_integer(value: &[u8]) -> Result<i64, StoreError> {
    std::str::from_utf8(value)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or(StoreError::NotAnInteger)
}

/// Converts a Unix timestamp in milliseconds to a wall-clock instant.
///
/// Negative timestamps clamp to the epoch, which is always in the past.
pub fn unix_millis(ms: i64) -> SystemTime {
    let ms = u64::try_from(ms).unwrap_or(0);
    UNIX_EPOCH
        .checked_add(Duration::from_millis(ms))
        .unwrap_or(UNIX_EPOCH)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn b(s: &str) -> Bytes {
        Bytes::from(s.to_string())
    }

    #[test]
    fn test_set_and_get() {
        let store = Store::new();
        assert_eq!(store.get(b"key"), None);

        store.set(b("key"), b("value"));
        assert_eq!(store.get(b"key"), Some(b("value")));
    }

    #[test]
    fn test_set_overwrites_and_clears_expiry() {
        let store = Store::new();
        store.set_with_expire(b("key"), b("old"), Duration::from_secs(100));
        assert!(store.pttl(b"key").unwrap() > 0);

        store.set(b("key"), b("new"));
        assert_eq!(store.get(b"key"), Some(b("new")));
        assert_eq!(store.pttl(b"key"), Some(-1));
    }

    #[test]
    fn test_expiry() {
        let store = Store::new();
        store.set_with_expire(b("k"), b("v"), Duration::from_millis(50));

        assert_eq!(store.get(b"k"), Some(b("v")));

        thread::sleep(Duration::from_millis(100));

        assert_eq!(store.get(b"k"), None);
        assert!(!store.exists(b"k"));
        // Lazily expired: the record still occupies the map
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_set_with_expire_at() {
        let store = Store::new();
        let past = SystemTime::now() - Duration::from_secs(1);
        store.set_with_expire_at(b("gone"), b("v"), past);
        assert_eq!(store.get(b"gone"), None);

        let future = SystemTime::now() + Duration::from_secs(60);
        store.set_with_expire_at(b("kept"), b("v"), future);
        assert_eq!(store.get(b"kept"), Some(b("v")));
        let ttl = store.pttl(b"kept").unwrap();
        assert!(ttl > 59_000 && ttl <= 60_000);
    }

    #[test]
    fn test_huge_ttl_never_expires() {
        let store = Store::new();
        store.set_with_expire(b("k"), b("v"), Duration::MAX);
        assert_eq!(store.get(b"k"), Some(b("v")));
    }

    #[test]
    fn test_del() {
        let store = Store::new();
        store.set(b("key"), b("value"));

        assert!(store.del(b"key"));
        assert_eq!(store.get(b"key"), None);
        assert!(!store.del(b"key"));
    }

    #[test]
    fn test_del_expired_key_removes_but_reports_absent() {
        let store = Store::new();
        store.set_with_expire_at(b("key"), b("value"), UNIX_EPOCH);
        assert_eq!(store.len(), 1);

        assert!(!store.del(b"key"));
        assert!(store.is_empty());
    }

    #[test]
    fn test_exists_any_kind() {
        let store = Store::new();
        assert!(!store.exists(b"s"));

        store.set(b("s"), b("v"));
        store.left_push_list(b("l"), vec![b("a")]).unwrap();
        assert!(store.exists(b"s"));
        assert!(store.exists(b"l"));
    }

    #[test]
    fn test_incr() {
        let store = Store::new();

        assert_eq!(store.incr(&b("counter")), Ok(1));
        assert_eq!(store.incr(&b("counter")), Ok(2));
        assert_eq!(store.incr(&b("counter")), Ok(3));
        assert_eq!(store.get(b"counter"), Some(b("3")));

        store.set(b("num"), b("-10"));
        assert_eq!(store.incr(&b("num")), Ok(-9));
    }

    #[test]
    fn test_decr() {
        let store = Store::new();
        assert_eq!(store.decr(&b("counter")), Ok(-1));
        assert_eq!(store.decr(&b("counter")), Ok(-2));
    }

    #[test]
    fn test_incr_non_integer() {
        let store = Store::new();
        store.set(b("text"), b("abc"));
        assert_eq!(store.incr(&b("text")), Err(StoreError::NotAnInteger));
        assert_eq!(store.decr(&b("text")), Err(StoreError::NotAnInteger));
        assert_eq!(store.get(b"text"), Some(b("abc")));
    }

    #[test]
    fn test_incr_overflow() {
        let store = Store::new();
        store.set(b("max"), Bytes::from(i64::MAX.to_string()));
        assert_eq!(store.incr(&b("max")), Err(StoreError::Overflow));

        store.set(b("min"), Bytes::from(i64::MIN.to_string()));
        assert_eq!(store.decr(&b("min")), Err(StoreError::Overflow));
    }

    #[test]
    fn test_incr_on_list_is_wrong_type() {
        let store = Store::new();
        store.left_push_list(b("list"), vec![b("a")]).unwrap();
        assert_eq!(store.incr(&b("list")), Err(StoreError::WrongType));
    }

    #[test]
    fn test_incr_preserves_ttl() {
        let store = Store::new();
        store.set_with_expire(b("n"), b("5"), Duration::from_secs(100));

        assert_eq!(store.incr(&b("n")), Ok(6));
        let ttl = store.pttl(b"n").unwrap();
        assert!(ttl > 0 && ttl <= 100_000);
    }

    #[test]
    fn test_incr_on_expired_key_starts_from_zero() {
        let store = Store::new();
        store.set_with_expire_at(b("n"), b("41"), UNIX_EPOCH);

        assert_eq!(store.incr(&b("n")), Ok(1));
        assert_eq!(store.pttl(b"n"), Some(-1));
    }

    #[test]
    fn test_left_push_ordering() {
        let store = Store::new();

        assert_eq!(
            store.left_push_list(b("k"), vec![b("a"), b("b"), b("c")]),
            Ok(3)
        );
        assert_eq!(store.get_list(b"k"), Some(vec![b("c"), b("b"), b("a")]));

        assert_eq!(store.left_push_list(b("k"), vec![b("d"), b("e")]), Ok(5));
        assert_eq!(
            store.get_list(b"k"),
            Some(vec![b("e"), b("d"), b("c"), b("b"), b("a")])
        );
    }

    #[test]
    fn test_left_push_on_string_is_wrong_type() {
        let store = Store::new();
        store.set(b("s"), b("v"));
        assert_eq!(
            store.left_push_list(b("s"), vec![b("a")]),
            Err(StoreError::WrongType)
        );
        assert_eq!(store.get(b"s"), Some(b("v")));
    }

    #[test]
    fn test_left_push_replaces_expired_string() {
        let store = Store::new();
        store.set_with_expire_at(b("k"), b("v"), UNIX_EPOCH);
        assert_eq!(store.left_push_list(b("k"), vec![b("a")]), Ok(1));
        assert_eq!(store.get_list(b"k"), Some(vec![b("a")]));
    }

    #[test]
    fn test_kind_specific_reads() {
        let store = Store::new();
        store.set(b("s"), b("v"));
        store.left_push_list(b("l"), vec![b("a")]).unwrap();

        assert_eq!(store.get(b"l"), None);
        assert_eq!(store.get_list(b"s"), None);
        assert_eq!(store.lookup(b"s"), Some(Value::String(b("v"))));
        assert_eq!(
            store.lookup(b"l"),
            Some(Value::List(VecDeque::from(vec![b("a")])))
        );
    }

    #[test]
    fn test_pttl() {
        let store = Store::new();
        assert_eq!(store.pttl(b"missing"), None);

        store.set(b("persistent"), b("v"));
        assert_eq!(store.pttl(b"persistent"), Some(-1));
    }

    #[test]
    fn test_unix_millis() {
        assert_eq!(unix_millis(-5), UNIX_EPOCH);
        assert_eq!(unix_millis(1_500), UNIX_EPOCH + Duration::from_millis(1_500));
    }

    #[test]
    fn test_concurrent_access() {
        let store = Arc::new(Store::new());
        let mut handles = vec![];

        for i in 0..10 {
            let store = Arc::clone(&store);
            handles.push(thread::spawn(move || {
                for j in 0..100 {
                    let key = Bytes::from(format!("key-{}-{}", i, j));
                    store.set(key.clone(), Bytes::from("value"));
                    assert_eq!(store.get(&key), Some(Bytes::from("value")));
                    // Overlapping keys shared by every thread
                    let shared = Bytes::from(format!("shared-{}", j % 10));
                    store.set(shared.clone(), Bytes::from(i.to_string()));
                    store.get(&shared);
                    store.del(&shared);
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        for i in 0..10 {
            for j in 0..100 {
                assert!(store.exists(format!("key-{}-{}", i, j).as_bytes()));
            }
        }
    }

    #[test]
    fn test_concurrent_incr_loses_no_updates() {
        let store = Arc::new(Store::new());
        let threads = 16;
        let per_thread = 500;

        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for _ in 0..per_thread {
                        store.incr(&Bytes::from("counter")).unwrap();
                        store.left_push_list(Bytes::from("log"), vec![Bytes::from("x")]).unwrap();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        let expected = (threads * per_thread) as i64;
        assert_eq!(store.get(b"counter"), Some(Bytes::from(expected.to_string())));
        assert_eq!(store.get_list(b"log").unwrap().len(), expected as usize);
    }
}
