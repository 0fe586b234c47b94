//! Cuckoo filter: two-choice fingerprint table with eviction
//!
//! Each key stores a short non-zero fingerprint in one of two candidate
//! buckets of four slots. The alternate bucket is reachable from either
//! bucket and the fingerprint alone, so entries can be relocated without
//! the original key. Insertion kicks a random occupant to its alternate
//! bucket when both candidates are full, up to a bounded number of
//! relocations.
//!
//! # Time Complexity
//!
//! - Insert: O(1) amortized, worst case bounded by the kick limit
//! - Remove: O(1)
//! - Query: O(1), two bucket probes
//!
//! # Reference
//!
//! Fan et al. "Cuckoo Filter: Practically Better Than Bloom" (CoNEXT
//! 2014)
//!
//! # Example
//! ```
//! use filter_oxide::membership::Cuckoo8;
//! use filter_oxide::common::{Filter, MutableFilter, RemovableFilter};
//!
//! let mut filter = Cuckoo8::with_capacity_and_seed(100, 1).unwrap();
//! filter.add(42).unwrap();
//! assert!(filter.may_contain(42));
//! filter.remove(42);
//! ```

use super::FingerprintBits;
use crate::common::hash::{mix64, random_seed, reduce};
use crate::common::{Filter, FilterError, MutableFilter, RemovableFilter, Result};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// Fingerprints per bucket.
pub(crate) const ENTRIES_PER_BUCKET: usize = 4;

/// Relocations attempted before an insert reports the table full.
pub(crate) const MAX_KICKS: usize = 1000;

/// Whole-table rebuilds attempted by `from_keys` before giving up.
pub(crate) const MAX_SEED_ATTEMPTS: usize = 10;

/// Storage type for cuckoo fingerprints.
///
/// Zero is the reserved empty slot, and `bucket_has` is the branchless
/// four-lane equality test on a packed bucket word.
pub trait CuckooFingerprint: FingerprintBits {
    /// Tests all four lanes of a packed bucket word for `fp` at once,
    /// using the has-zero bit pattern on the lane-wise XOR.
    fn bucket_has(packed: u64, fp: Self) -> bool;
}

impl CuckooFingerprint for u8 {
    #[inline]
    fn bucket_has(packed: u64, fp: Self) -> bool {
        let w = (packed as u32) ^ (0x0101_0101u32).wrapping_mul(u32::from(fp));
        w.wrapping_sub(0x0101_0101) & !w & 0x8080_8080 != 0
    }
}

impl CuckooFingerprint for u16 {
    #[inline]
    fn bucket_has(packed: u64, fp: Self) -> bool {
        let w = packed ^ (0x0001_0001_0001_0001u64).wrapping_mul(u64::from(fp));
        w.wrapping_sub(0x0001_0001_0001_0001) & !w & 0x8000_8000_8000_8000 != 0
    }
}

/// Odd offset derived from a fingerprint; drives the alternate-bucket
/// involution `b2 = (buckets - b - r) mod buckets`.
#[inline]
pub(crate) fn odd_offset(fp: u64, bucket_count: u32) -> u32 {
    2 * reduce((mix64(fp, 0) >> 32) as u32, bucket_count / 2) + 1
}

/// Applies the alternate-bucket involution.
#[inline]
pub(crate) fn alternate_bucket(bucket: u32, r: u32, bucket_count: u32) -> u32 {
    (i64::from(bucket_count) - i64::from(bucket) - i64::from(r))
        .rem_euclid(i64::from(bucket_count)) as u32
}

/// Cuckoo filter over 64-bit keys, generic in fingerprint width.
///
/// Use the [`Cuckoo8`] and [`Cuckoo16`] aliases.
#[derive(Clone, Debug)]
pub struct Cuckoo<F: CuckooFingerprint> {
    table: Vec<F>,
    bucket_count: u32,
    count: usize,
    seed: u64,
    rng: SmallRng,
}

/// Cuckoo filter with 8-bit fingerprints (~0.03 false-positive rate
/// contribution per probed bucket pair).
pub type Cuckoo8 = Cuckoo<u8>;
/// Cuckoo filter with 16-bit fingerprints.
pub type Cuckoo16 = Cuckoo<u16>;

impl<F: CuckooFingerprint> Cuckoo<F> {
    /// Creates an empty filter able to hold `capacity` keys at a ~95%
    /// load target, with a random seed.
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        Self::with_capacity_and_seed(capacity, random_seed())
    }

    /// Creates an empty filter with an explicit seed.
    pub fn with_capacity_and_seed(capacity: usize, seed: u64) -> Result<Self> {
        let slots = ((capacity as f64 / 0.95).ceil() as u64).max(ENTRIES_PER_BUCKET as u64);
        let mut bucket_count = slots.div_ceil(ENTRIES_PER_BUCKET as u64) as u32;
        bucket_count += bucket_count & 1; // even, so the involution closes
        bucket_count = bucket_count.max(2);
        Ok(Cuckoo {
            table: vec![F::from_u64(0); bucket_count as usize * ENTRIES_PER_BUCKET],
            bucket_count,
            count: 0,
            seed,
            rng: SmallRng::seed_from_u64(seed ^ 0xc3a5_c85c_97cb_3127),
        })
    }

    /// Builds a filter containing `keys`, retrying the whole
    /// construction with fresh seeds and a lower load target when an
    /// insert exhausts its eviction budget.
    ///
    /// # Errors
    /// Returns [`FilterError::TableFull`] if every rebuild fails.
    pub fn from_keys(keys: &[u64]) -> Result<Self> {
        Self::from_keys_with_seed(keys, random_seed())
    }

    /// Builds a filter containing `keys`, with a deterministic first
    /// seed.
    pub fn from_keys_with_seed(keys: &[u64], seed: u64) -> Result<Self> {
        let mut seed = seed;
        let mut last = FilterError::TableFull { kicks: MAX_KICKS };
        for attempt in 0..MAX_SEED_ATTEMPTS {
            // give later attempts a little extra head room
            let capacity = keys.len() + keys.len() / 20 * attempt;
            let mut filter = Self::with_capacity_and_seed(capacity, seed)?;
            match keys.iter().try_for_each(|&key| filter.add(key)) {
                Ok(()) => return Ok(filter),
                Err(err) => last = err,
            }
            seed = mix64(seed, attempt as u64 + 1);
        }
        Err(last)
    }

    /// Number of live fingerprints.
    pub fn len(&self) -> usize {
        self.count
    }

    /// Whether the filter holds no fingerprints.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    #[inline]
    fn fingerprint(&self, hash: u64) -> F {
        let mask = (1u64 << F::BITS) - 1;
        let fp = hash & mask;
        F::from_u64(if fp == 0 { 1 } else { fp })
    }

    #[inline]
    fn primary_bucket(&self, hash: u64) -> u32 {
        reduce((hash >> 32) as u32, self.bucket_count)
    }

    #[inline]
    fn alt(&self, bucket: u32, fp: F) -> u32 {
        let r = odd_offset(fp.to_u64(), self.bucket_count);
        alternate_bucket(bucket, r, self.bucket_count)
    }

    #[inline]
    fn packed_bucket(&self, bucket: u32) -> u64 {
        let base = bucket as usize * ENTRIES_PER_BUCKET;
        let mut word = 0u64;
        for i in 0..ENTRIES_PER_BUCKET {
            word |= self.table[base + i].to_u64() << (i as u32 * F::BITS);
        }
        word
    }

    /// Places `fp` in an empty slot of `bucket`, or reports it already
    /// present.
    fn bucket_insert(&mut self, bucket: u32, fp: F) -> bool {
        let base = bucket as usize * ENTRIES_PER_BUCKET;
        for i in 0..ENTRIES_PER_BUCKET {
            let current = self.table[base + i];
            if current.to_u64() == 0 {
                self.table[base + i] = fp;
                self.count += 1;
                return true;
            }
            if current == fp {
                return true;
            }
        }
        false
    }

    fn bucket_remove(&mut self, bucket: u32, fp: F) -> bool {
        let base = bucket as usize * ENTRIES_PER_BUCKET;
        for i in 0..ENTRIES_PER_BUCKET {
            if self.table[base + i] == fp {
                self.table[base + i] = F::from_u64(0);
                self.count -= 1;
                return true;
            }
        }
        false
    }
}

impl<F: CuckooFingerprint> Filter for Cuckoo<F> {
    fn may_contain(&self, key: u64) -> bool {
        let hash = mix64(key, self.seed);
        let fp = self.fingerprint(hash);
        let b1 = self.primary_bucket(hash);
        if F::bucket_has(self.packed_bucket(b1), fp) {
            return true;
        }
        let b2 = self.alt(b1, fp);
        F::bucket_has(self.packed_bucket(b2), fp)
    }

    fn bit_count(&self) -> u64 {
        self.table.len() as u64 * u64::from(F::BITS)
    }

    fn cardinality(&self) -> i64 {
        self.count as i64
    }
}

impl<F: CuckooFingerprint> MutableFilter for Cuckoo<F> {
    fn add(&mut self, key: u64) -> Result<()> {
        let hash = mix64(key, self.seed);
        let mut fp = self.fingerprint(hash);
        let b1 = self.primary_bucket(hash);
        let b2 = self.alt(b1, fp);
        if self.bucket_insert(b1, fp) || self.bucket_insert(b2, fp) {
            return Ok(());
        }
        let mut bucket = if self.rng.random::<bool>() { b1 } else { b2 };
        for _ in 0..MAX_KICKS {
            let slot = bucket as usize * ENTRIES_PER_BUCKET + self.rng.random_range(0..ENTRIES_PER_BUCKET);
            std::mem::swap(&mut fp, &mut self.table[slot]);
            bucket = self.alt(bucket, fp);
            if self.bucket_insert(bucket, fp) {
                return Ok(());
            }
        }
        Err(FilterError::TableFull { kicks: MAX_KICKS })
    }
}

impl<F: CuckooFingerprint> RemovableFilter for Cuckoo<F> {
    fn remove(&mut self, key: u64) -> bool {
        let hash = mix64(key, self.seed);
        let fp = self.fingerprint(hash);
        let b1 = self.primary_bucket(hash);
        if self.bucket_remove(b1, fp) {
            return true;
        }
        let b2 = self.alt(b1, fp);
        self.bucket_remove(b2, fp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_false_negatives() {
        let keys: Vec<u64> = (0..10_000u64).map(|i| mix64(i, 77)).collect();
        let filter = Cuckoo8::from_keys_with_seed(&keys, 3).unwrap();
        for &k in &keys {
            assert!(filter.may_contain(k));
        }
    }

    #[test]
    fn test_sixteen_bit_no_false_negatives() {
        let keys: Vec<u64> = (0..10_000u64).map(|i| mix64(i, 78)).collect();
        let filter = Cuckoo16::from_keys_with_seed(&keys, 3).unwrap();
        for &k in &keys {
            assert!(filter.may_contain(k));
        }
    }

    #[test]
    fn test_involution_closes() {
        let filter = Cuckoo8::with_capacity_and_seed(1000, 5).unwrap();
        for key in 0..1000u64 {
            let hash = mix64(key, filter.seed);
            let fp = filter.fingerprint(hash);
            let b1 = filter.primary_bucket(hash);
            let b2 = filter.alt(b1, fp);
            assert_ne!(b1, b2, "key {}", key);
            assert_eq!(filter.alt(b2, fp), b1, "key {}", key);
        }
    }

    #[test]
    fn test_remove_and_readd() {
        let keys: Vec<u64> = (1..=64u64).collect();
        let mut filter = Cuckoo8::from_keys_with_seed(&keys, 9).unwrap();
        assert!(filter.remove(32));
        // membership may linger only through a fingerprint collision
        filter.add(32).unwrap();
        assert!(filter.may_contain(32));
        for &k in &keys {
            assert!(filter.may_contain(k));
        }
    }

    #[test]
    fn test_len_tracks_entries() {
        let mut filter = Cuckoo16::with_capacity_and_seed(100, 2).unwrap();
        assert!(filter.is_empty());
        filter.add(1).unwrap();
        filter.add(2).unwrap();
        assert_eq!(filter.len(), 2);
        filter.remove(1);
        assert_eq!(filter.len(), 1);
    }

    #[test]
    fn test_fingerprint_never_zero() {
        let filter = Cuckoo8::with_capacity_and_seed(10, 0).unwrap();
        for h in 0..100_000u64 {
            assert_ne!(filter.fingerprint(h).to_u64(), 0);
        }
    }

    #[test]
    fn test_bucket_has_matches_scan() {
        let mut filter = Cuckoo8::with_capacity_and_seed(100, 1).unwrap();
        for key in 0..300u64 {
            let _ = filter.add(key);
        }
        for bucket in 0..filter.bucket_count {
            let packed = filter.packed_bucket(bucket);
            let base = bucket as usize * ENTRIES_PER_BUCKET;
            for probe in 1..=255u64 {
                let fp = probe as u8;
                let expected = filter.table[base..base + ENTRIES_PER_BUCKET].contains(&fp);
                assert_eq!(u8::bucket_has(packed, fp), expected);
            }
        }
    }

    #[test]
    fn test_table_full_surfaces() {
        // a tiny table cannot absorb many distinct keys
        let mut filter = Cuckoo8::with_capacity_and_seed(8, 1).unwrap();
        let mut result = Ok(());
        for key in 0..1000u64 {
            result = filter.add(key);
            if result.is_err() {
                break;
            }
        }
        assert!(matches!(result, Err(FilterError::TableFull { .. })));
    }
}
