//! Standard Bloom filter
//!
//! The baseline k-hash filter: `k` bit positions per key, derived from
//! one 64-bit mix split into two 32-bit halves that are combined
//! additively (double hashing). Queries AND the same positions.
//!
//! # Example
//! ```
//! use filter_oxide::membership::Bloom;
//! use filter_oxide::common::Filter;
//!
//! let filter = Bloom::from_keys(&[1, 2, 3], 10).unwrap();
//! assert!(filter.may_contain(1));
//! assert!(filter.may_contain(3));
//! ```

use crate::common::hash::{mix64, random_seed, reduce};
use crate::common::{Filter, FilterError, MutableFilter, Result};

/// Bloom filter over 64-bit keys.
#[derive(Clone, Debug)]
pub struct Bloom {
    words: Vec<u64>,
    word_count: u32,
    k: u32,
    seed: u64,
}

impl Bloom {
    /// Creates an empty filter sized for `capacity` keys at
    /// `bits_per_key` bits each, with a random seed.
    ///
    /// # Errors
    /// Returns [`FilterError::InvalidParameter`] if `bits_per_key` is 0
    /// or greater than 64.
    pub fn with_capacity(capacity: usize, bits_per_key: u32) -> Result<Self> {
        Self::with_capacity_and_seed(capacity, bits_per_key, random_seed())
    }

    /// Creates an empty filter with an explicit seed, for reproducible
    /// layouts in tests.
    pub fn with_capacity_and_seed(capacity: usize, bits_per_key: u32, seed: u64) -> Result<Self> {
        if bits_per_key == 0 || bits_per_key > 64 {
            return Err(FilterError::InvalidParameter {
                param: "bits_per_key".to_string(),
                value: bits_per_key.to_string(),
                constraint: "must be in range [1, 64]".to_string(),
            });
        }
        let bits = (capacity as u64).saturating_mul(u64::from(bits_per_key));
        let word_count = bits.div_ceil(64).max(1) as u32;
        let k = ((f64::from(bits_per_key) * std::f64::consts::LN_2).round() as u32).max(1);
        Ok(Bloom {
            words: vec![0u64; word_count as usize],
            word_count,
            k,
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

    /// Number of hash probes per key.
    pub fn num_hashes(&self) -> u32 {
        self.k
    }

    #[inline]
    fn insert(&mut self, key: u64) {
        let h = mix64(key, self.seed);
        let mut a = (h >> 32) as u32;
        let b = h as u32;
        for _ in 0..self.k {
            self.words[reduce(a, self.word_count) as usize] |= 1u64 << (a & 63);
            a = a.wrapping_add(b);
        }
    }
}

impl Filter for Bloom {
    fn may_contain(&self, key: u64) -> bool {
        let h = mix64(key, self.seed);
        let mut a = (h >> 32) as u32;
        let b = h as u32;
        for _ in 0..self.k {
            if self.words[reduce(a, self.word_count) as usize] & (1u64 << (a & 63)) == 0 {
                return false;
            }
            a = a.wrapping_add(b);
        }
        true
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

impl MutableFilter for Bloom {
    fn add(&mut self, key: u64) -> Result<()> {
        self.insert(key);
        Ok(())
    }
}
