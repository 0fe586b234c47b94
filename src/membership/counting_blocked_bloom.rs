//! Counting filter over the blocked-Bloom addressing
//!
//! Same 4-bit counters as [`CountingBloom`], but the four counter
//! positions per key are the four bit positions the blocked Bloom filter
//! would set: two in a start word and two in one of the 16 words after
//! it.
//!
//! [`CountingBloom`]: super::CountingBloom

use super::counting_bloom::NibbleCounters;
use crate::common::hash::{mix64, random_seed, reduce};
use crate::common::{Filter, FilterError, MutableFilter, RemovableFilter, Result};

const SLACK_WORDS: usize = 16;

/// Blocked counting Bloom filter over 64-bit keys.
#[derive(Clone, Debug)]
pub struct CountingBlockedBloom {
    counters: NibbleCounters,
    buckets: u32,
    seed: u64,
}

impl CountingBlockedBloom {
    /// Creates an empty filter sized for `capacity` keys at
    /// `bits_per_key` logical bits each, with a random seed.
    ///
    /// # Errors
    /// Returns [`FilterError::InvalidParameter`] if `bits_per_key` is 0
    /// or greater than 64.
    pub fn with_capacity(capacity: usize, bits_per_key: u32) -> Result<Self> {
        Self::with_capacity_and_seed(capacity, bits_per_key, random_seed())
    }

    /// Creates an empty filter with an explicit seed.
    pub fn with_capacity_and_seed(capacity: usize, bits_per_key: u32, seed: u64) -> Result<Self> {
        if bits_per_key == 0 || bits_per_key > 64 {
            return Err(FilterError::InvalidParameter {
                param: "bits_per_key".to_string(),
                value: bits_per_key.to_string(),
                constraint: "must be in range [1, 64]".to_string(),
            });
        }
        let buckets = ((capacity as u64 * u64::from(bits_per_key)) / 64).max(1) as u32;
        Ok(CountingBlockedBloom {
            counters: NibbleCounters::new((buckets as usize + SLACK_WORDS) * 64),
            buckets,
            seed,
        })
    }

    /// Builds a filter containing `keys`.
    pub fn from_keys(keys: &[u64], bits_per_key: u32) -> Result<Self> {
        Self::from_keys_with_seed(keys, bits_per_key, random_seed())
    }

    /// Builds a filter containing `keys` with an explicit seed.
    pub fn from_keys_with_seed(keys: &[u64], bits_per_key: u32, seed: u64) -> Result<Self> {
        let mut filter = Self::with_capacity_and_seed(keys.len(), bits_per_key, seed)?;
        for &key in keys {
            filter.add(key)?;
        }
        Ok(filter)
    }

    /// The four counter indices the blocked addressing derives for a key.
    #[inline]
    fn counter_indices(&self, key: u64) -> [usize; 4] {
        let h = mix64(key, self.seed);
        let start = reduce(h as u32, self.buckets) as usize;
        let spread = h ^ h.rotate_left(32);
        let second = start + 1 + ((h >> 60) as usize);
        [
            (start << 6) | (spread & 63) as usize,
            (start << 6) | ((spread >> 6) & 63) as usize,
            (second << 6) | ((spread >> 12) & 63) as usize,
            (second << 6) | ((spread >> 18) & 63) as usize,
        ]
    }
}

impl Filter for CountingBlockedBloom {
    fn may_contain(&self, key: u64) -> bool {
        self.counter_indices(key)
            .iter()
            .all(|&i| self.counters.get(i) > 0)
    }

    fn bit_count(&self) -> u64 {
        self.counters.bit_count()
    }

    fn cardinality(&self) -> i64 {
        self.counters.non_zero()
    }
}

impl MutableFilter for CountingBlockedBloom {
    /// Increments the key's four counters. As with [`CountingBloom`],
    /// increments before a [`FilterError::CounterOverflow`] are not
    /// rolled back.
    ///
    /// [`CountingBloom`]: super::CountingBloom
    fn add(&mut self, key: u64) -> Result<()> {
        for index in self.counter_indices(key) {
            self.counters.increment(index)?;
        }
        Ok(())
    }
}

impl RemovableFilter for CountingBlockedBloom {
    fn remove(&mut self, key: u64) -> bool {
        if !self.may_contain(key) {
            return false;
        }
        for index in self.counter_indices(key) {
            self.counters.decrement(index);
        }
        true
    }
}
