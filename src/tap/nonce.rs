//! Replay protection store
//!
//! Accepted `(keyid, nonce)` pairs are held in a set with a companion
//! min-heap ordered by signature expiry. When the set reaches the
//! high-water mark, entries whose `expires` has passed are dropped until
//! the size falls to the low-water mark. Entries still inside their
//! validity window are never dropped, so the store may exceed the
//! high-water mark under sustained load rather than reopen a replay
//! window.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashSet};

/// Default eviction trigger
pub const DEFAULT_HIGH_WATER: usize = 10_000;
/// Default eviction target
pub const DEFAULT_LOW_WATER: usize = 8_000;

/// Bounded set of accepted `(keyid, nonce)` pairs
#[derive(Debug)]
pub struct NonceStore {
    seen: HashSet<(String, String)>,
    by_expiry: BinaryHeap<Reverse<(i64, (String, String))>>,
    high_water: usize,
    low_water: usize,
}

impl NonceStore {
    /// Create a store with the given water marks
    pub fn new(high_water: usize, low_water: usize) -> Self {
        Self {
            seen: HashSet::new(),
            by_expiry: BinaryHeap::new(),
            high_water,
            low_water: low_water.min(high_water),
        }
    }

    /// Number of resident pairs
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// Whether the store is empty
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// Whether a pair has already been accepted
    pub fn contains(&self, keyid: &str, nonce: &str) -> bool {
        self.seen
            .contains(&(keyid.to_string(), nonce.to_string()))
    }

    /// Check-and-insert: returns `false` when the pair was already present.
    /// The caller passes the signature's `expires` and the current time.
    pub fn insert(&mut self, keyid: &str, nonce: &str, expires: i64, now: i64) -> bool {
        let pair = (keyid.to_string(), nonce.to_string());
        if !self.seen.insert(pair.clone()) {
            return false;
        }
        self.by_expiry.push(Reverse((expires, pair)));

        if self.seen.len() >= self.high_water {
            self.evict_expired(now);
        }
        true
    }

    fn evict_expired(&mut self, now: i64) {
        while self.seen.len() > self.low_water {
            let head_expired =
                matches!(self.by_expiry.peek(), Some(Reverse((expires, _))) if *expires < now);
            if !head_expired {
                break;
            }
            if let Some(Reverse((_, pair))) = self.by_expiry.pop() {
                self.seen.remove(&pair);
            }
        }
    }
}

impl Default for NonceStore {
    fn default() -> Self {
        Self::new(DEFAULT_HIGH_WATER, DEFAULT_LOW_WATER)
    }
}
