//! Counting Bloom filter with 4-bit counters
//!
//! Replaces each bit of the plain Bloom layout with a 4-bit counter so
//! keys can be removed again. Memory cost is 4x the plain filter.

use crate::common::hash::{mix64, random_seed, reduce};
use crate::common::{Filter, FilterError, MutableFilter, RemovableFilter, Result};

/// Packed 4-bit saturating counters, 16 per word.
///
/// Shared by the plain and blocked counting filters.
#[derive(Clone, Debug)]
pub(crate) struct NibbleCounters {
    words: Vec<u64>,
}

impl NibbleCounters {
    const MAX: u64 = 15;

    pub(crate) fn new(counter_count: usize) -> Self {
        NibbleCounters {
            words: vec![0u64; counter_count.div_ceil(16)],
        }
    }

    #[inline]
    pub(crate) fn get(&self, index: usize) -> u64 {
        (self.words[index >> 4] >> ((index & 15) * 4)) & 0xf
    }

    /// Increments a counter.
    ///
    /// # Errors
    /// Returns [`FilterError::CounterOverflow`] when the counter already
    /// holds 15.
    #[inline]
    pub(crate) fn increment(&mut self, index: usize) -> Result<()> {
        if self.get(index) == Self::MAX {
            return Err(FilterError::CounterOverflow { index });
        }
        self.words[index >> 4] += 1u64 << ((index & 15) * 4);
        Ok(())
    }

    #[inline]
    pub(crate) fn decrement(&mut self, index: usize) {
        if self.get(index) > 0 {
            self.words[index >> 4] -= 1u64 << ((index & 15) * 4);
        }
    }

    pub(crate) fn non_zero(&self) -> i64 {
        let mut count = 0i64;
        for &w in &self.words {
            let mut w = w;
            while w != 0 {
                if w & 0xf != 0 {
                    count += 1;
                }
                w >>= 4;
            }
        }
        count
    }

    pub(crate) fn bit_count(&self) -> u64 {
        self.words.len() as u64 * 64
    }
}

/// Counting Bloom filter over 64-bit keys.
///
/// # Example
/// ```
/// use filter_oxide::membership::CountingBloom;
/// use filter_oxide::common::{Filter, MutableFilter, RemovableFilter};
///
/// let mut filter = CountingBloom::with_capacity(100, 10).unwrap();
/// filter.add(7).unwrap();
/// assert!(filter.may_contain(7));
/// filter.remove(7);
/// assert!(!filter.may_contain(7));
/// ```
#[derive(Clone, Debug)]
pub struct CountingBloom {
    counters: NibbleCounters,
    word_count: u32,
    k: u32,
    seed: u64,
}

impl CountingBloom {
    /// Creates an empty filter sized for `capacity` keys at
    /// `bits_per_key` logical bits each, with a random seed. The counter
    /// array itself occupies four times that.
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
        let bits = (capacity as u64).saturating_mul(u64::from(bits_per_key));
        let word_count = bits.div_ceil(64).max(1) as u32;
        let k = ((f64::from(bits_per_key) * std::f64::consts::LN_2).round() as u32).max(1);
        Ok(CountingBloom {
            counters: NibbleCounters::new(word_count as usize * 64),
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
            filter.add(key)?;
        }
        Ok(filter)
    }

    /// The k logical counter indices for a key, identical to the bit
    /// positions the plain Bloom filter would set.
    #[inline]
    fn counter_indices(&self, key: u64) -> impl Iterator<Item = usize> + '_ {
        let h = mix64(key, self.seed);
        let b = h as u32;
        let mut a = (h >> 32) as u32;
        (0..self.k).map(move |_| {
            let index = ((reduce(a, self.word_count) as usize) << 6) | (a & 63) as usize;
            a = a.wrapping_add(b);
            index
        })
    }
}

impl Filter for CountingBloom {
    fn may_contain(&self, key: u64) -> bool {
        self.counter_indices(key).all(|i| self.counters.get(i) > 0)
    }

    fn bit_count(&self) -> u64 {
        self.counters.bit_count()
    }

    fn cardinality(&self) -> i64 {
        self.counters.non_zero()
    }
}

impl MutableFilter for CountingBloom {
    /// Increments the key's k counters.
    ///
    /// On [`FilterError::CounterOverflow`] the counters incremented
    /// before the failing one are left incremented; the filter still
    /// reports no false negatives, but a later balanced removal will not
    /// bring those counters back to zero.
    fn add(&mut self, key: u64) -> Result<()> {
        let indices: Vec<usize> = self.counter_indices(key).collect();
        for index in indices {
            self.counters.increment(index)?;
        }
        Ok(())
    }
}

impl RemovableFilter for CountingBloom {
    fn remove(&mut self, key: u64) -> bool {
        if !self.may_contain(key) {
            return false;
        }
        let indices: Vec<usize> = self.counter_indices(key).collect();
        for index in indices {
            self.counters.decrement(index);
        }
        true
    }
}
