//! Blocked Bloom filter
//!
//! Sets four bits per key spread over just two words: two bits in a
//! start word chosen by the hash and two bits in one of the 16 words
//! after it. A query touches at most two cache lines, trading a small
//! false-positive penalty for memory locality.

use crate::common::hash::{mix64, random_seed, reduce};
use crate::common::{Filter, FilterError, MutableFilter, Result};

/// Number of slack words past the addressable buckets; the second probe
/// lands at most 16 words after the start.
const SLACK_WORDS: usize = 16;

/// Cache-friendly Bloom variant over 64-bit keys.
#[derive(Clone, Debug)]
pub struct BlockedBloom {
    words: Vec<u64>,
    buckets: u32,
    seed: u64,
}

impl BlockedBloom {
    /// Creates an empty filter sized for `capacity` keys at
    /// `bits_per_key` bits each, with a random seed.
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
        Ok(BlockedBloom {
            words: vec![0u64; buckets as usize + SLACK_WORDS],
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
            filter.insert(key);
        }
        Ok(filter)
    }

    /// The two probed word indices and their masks for a key.
    #[inline]
    fn probes(&self, key: u64) -> (usize, u64, usize, u64) {
        let h = mix64(key, self.seed);
        let start = reduce(h as u32, self.buckets) as usize;
        let spread = h ^ h.rotate_left(32);
        let m1 = (1u64 << (spread & 63)) | (1u64 << ((spread >> 6) & 63));
        let m2 = (1u64 << ((spread >> 12) & 63)) | (1u64 << ((spread >> 18) & 63));
        let second = start + 1 + ((h >> 60) as usize);
        (start, m1, second, m2)
    }

    #[inline]
    fn insert(&mut self, key: u64) {
        let (w1, m1, w2, m2) = self.probes(key);
        self.words[w1] |= m1;
        self.words[w2] |= m2;
    }
}

impl Filter for BlockedBloom {
    fn may_contain(&self, key: u64) -> bool {
        let (w1, m1, w2, m2) = self.probes(key);
        self.words[w1] & m1 == m1 && self.words[w2] & m2 == m2
    }

    fn bit_count(&self) -> u64 {
        self.words.len() as u64 * 64
    }

    fn cardinality(&self) -> i64 {
        self.words
            .iter()
            .map(|w| i64::from(w.count_ones()))
            .sum()
    }
}

impl MutableFilter for BlockedBloom {
    fn add(&mut self, key: u64) -> Result<()> {
        self.insert(key);
        Ok(())
    }
}
