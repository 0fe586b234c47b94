//! Cuckoo filter variant with packed residence flags
//!
//! Trades two fingerprint bits for a SECOND flag (the entry lives in its
//! alternate bucket) and a SHIFTED flag (the entry spilled into the
//! bucket after its candidate). The spill gives an insert four places to
//! try before evicting, which raises the achievable load; the query
//! covers `{b1, b1+1, b2, b2+1}`, so the two-bucket closure holds up to
//! the one-bucket shift.

use super::cuckoo::{
    alternate_bucket, odd_offset, CuckooFingerprint, ENTRIES_PER_BUCKET, MAX_KICKS,
    MAX_SEED_ATTEMPTS,
};
use super::FingerprintBits;
use crate::common::hash::{mix64, random_seed, reduce};
use crate::common::{Filter, FilterError, MutableFilter, RemovableFilter, Result};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// Cuckoo filter with flagged fingerprints, generic in slot width.
///
/// Use the [`CuckooPlus8`] and [`CuckooPlus16`] aliases; fingerprints
/// are two bits narrower than the slot (6 and 14 bits).
#[derive(Clone, Debug)]
pub struct CuckooPlus<F: CuckooFingerprint> {
    table: Vec<F>,
    bucket_count: u32,
    count: usize,
    seed: u64,
    rng: SmallRng,
}

/// Flagged cuckoo filter in 8-bit slots (6-bit fingerprints).
pub type CuckooPlus8 = CuckooPlus<u8>;
/// Flagged cuckoo filter in 16-bit slots (14-bit fingerprints).
pub type CuckooPlus16 = CuckooPlus<u16>;

impl<F: CuckooFingerprint> CuckooPlus<F> {
    const FP_BITS: u32 = F::BITS - 2;
    const FP_MASK: u64 = (1 << (F::BITS - 2)) - 1;
    const SECOND: u64 = 1 << (F::BITS - 1);
    const SHIFTED: u64 = 1 << (F::BITS - 2);

    /// Creates an empty filter able to hold `capacity` keys, with a
    /// random seed.
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        Self::with_capacity_and_seed(capacity, random_seed())
    }

    /// Creates an empty filter with an explicit seed.
    pub fn with_capacity_and_seed(capacity: usize, seed: u64) -> Result<Self> {
        let slots = ((capacity as f64 / 0.95).ceil() as u64).max(ENTRIES_PER_BUCKET as u64);
        let mut bucket_count = slots.div_ceil(ENTRIES_PER_BUCKET as u64) as u32;
        bucket_count += bucket_count & 1;
        bucket_count = bucket_count.max(2);
        Ok(CuckooPlus {
            table: vec![F::from_u64(0); bucket_count as usize * ENTRIES_PER_BUCKET],
            bucket_count,
            count: 0,
            seed,
            rng: SmallRng::seed_from_u64(seed ^ 0x9ae1_6a3b_2f90_404f),
        })
    }

    /// Builds a filter containing `keys`, retrying with fresh seeds on a
    /// full table.
    pub fn from_keys(keys: &[u64]) -> Result<Self> {
        Self::from_keys_with_seed(keys, random_seed())
    }

    /// Builds a filter containing `keys`, with a deterministic first
    /// seed.
    pub fn from_keys_with_seed(keys: &[u64], seed: u64) -> Result<Self> {
        let mut seed = seed;
        let mut last = FilterError::TableFull { kicks: MAX_KICKS };
        for attempt in 0..MAX_SEED_ATTEMPTS {
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
    fn fingerprint(&self, hash: u64) -> u64 {
        let fp = hash & Self::FP_MASK;
        if fp == 0 {
            1
        } else {
            fp
        }
    }

    #[inline]
    fn primary_bucket(&self, hash: u64) -> u32 {
        reduce((hash >> 32) as u32, self.bucket_count)
    }

    #[inline]
    fn alt(&self, bucket: u32, fp: u64) -> u32 {
        let r = odd_offset(fp, self.bucket_count);
        alternate_bucket(bucket, r, self.bucket_count)
    }

    #[inline]
    fn successor(&self, bucket: u32) -> u32 {
        if bucket + 1 == self.bucket_count {
            0
        } else {
            bucket + 1
        }
    }

    #[inline]
    fn compose(fp: u64, second: bool, shifted: bool) -> F {
        let mut v = fp;
        if second {
            v |= Self::SECOND;
        }
        if shifted {
            v |= Self::SHIFTED;
        }
        F::from_u64(v)
    }

    #[inline]
    fn decompose(value: F) -> (u64, bool, bool) {
        let v = value.to_u64();
        (
            v & Self::FP_MASK,
            v & Self::SECOND != 0,
            v & Self::SHIFTED != 0,
        )
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

    fn bucket_insert(&mut self, bucket: u32, value: F) -> bool {
        let base = bucket as usize * ENTRIES_PER_BUCKET;
        for i in 0..ENTRIES_PER_BUCKET {
            let current = self.table[base + i];
            if current.to_u64() == 0 {
                self.table[base + i] = value;
                self.count += 1;
                return true;
            }
            if current == value {
                return true;
            }
        }
        false
    }

    fn bucket_remove(&mut self, bucket: u32, value: F) -> bool {
        let base = bucket as usize * ENTRIES_PER_BUCKET;
        for i in 0..ENTRIES_PER_BUCKET {
            if self.table[base + i] == value {
                self.table[base + i] = F::from_u64(0);
                self.count -= 1;
                return true;
            }
        }
        false
    }

    /// Tries the candidate bucket and its successor (shifted).
    fn try_place(&mut self, fp: u64, base: u32, second: bool) -> bool {
        if self.bucket_insert(base, Self::compose(fp, second, false)) {
            return true;
        }
        let spill = self.successor(base);
        self.bucket_insert(spill, Self::compose(fp, second, true))
    }
}

impl<F: CuckooFingerprint> Filter for CuckooPlus<F> {
    fn may_contain(&self, key: u64) -> bool {
        let hash = mix64(key, self.seed);
        let fp = self.fingerprint(hash);
        let b1 = self.primary_bucket(hash);
        let b2 = self.alt(b1, fp);
        F::bucket_has(self.packed_bucket(b1), Self::compose(fp, false, false))
            || F::bucket_has(self.packed_bucket(b2), Self::compose(fp, true, false))
            || F::bucket_has(
                self.packed_bucket(self.successor(b1)),
                Self::compose(fp, false, true),
            )
            || F::bucket_has(
                self.packed_bucket(self.successor(b2)),
                Self::compose(fp, true, true),
            )
    }

    fn bit_count(&self) -> u64 {
        self.table.len() as u64 * u64::from(F::BITS)
    }

    fn cardinality(&self) -> i64 {
        self.count as i64
    }
}

impl<F: CuckooFingerprint> MutableFilter for CuckooPlus<F> {
    fn add(&mut self, key: u64) -> Result<()> {
        let hash = mix64(key, self.seed);
        let fp = self.fingerprint(hash);
        let b1 = self.primary_bucket(hash);
        let b2 = self.alt(b1, fp);
        if self.try_place(fp, b1, false) || self.try_place(fp, b2, true) {
            return Ok(());
        }
        // evict from the home bucket and walk the chain
        let mut fp_cur = fp;
        let mut base = b1;
        let mut second = false;
        for _ in 0..MAX_KICKS {
            let slot =
                base as usize * ENTRIES_PER_BUCKET + self.rng.random_range(0..ENTRIES_PER_BUCKET);
            let victim = self.table[slot];
            self.table[slot] = Self::compose(fp_cur, second, false);
            let (fp_v, second_v, shifted_v) = Self::decompose(victim);
            let base_v = if shifted_v {
                if base == 0 {
                    self.bucket_count - 1
                } else {
                    base - 1
                }
            } else {
                base
            };
            let other = self.alt(base_v, fp_v);
            if self.try_place(fp_v, other, !second_v) {
                return Ok(());
            }
            fp_cur = fp_v;
            base = other;
            second = !second_v;
        }
        Err(FilterError::TableFull { kicks: MAX_KICKS })
    }
}

impl<F: CuckooFingerprint> RemovableFilter for CuckooPlus<F> {
    fn remove(&mut self, key: u64) -> bool {
        let hash = mix64(key, self.seed);
        let fp = self.fingerprint(hash);
        let b1 = self.primary_bucket(hash);
        let b2 = self.alt(b1, fp);
        self.bucket_remove(b1, Self::compose(fp, false, false))
            || self.bucket_remove(b2, Self::compose(fp, true, false))
            || self.bucket_remove(self.successor(b1), Self::compose(fp, false, true))
            || self.bucket_remove(self.successor(b2), Self::compose(fp, true, true))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_false_negatives() {
        let keys: Vec<u64> = (0..10_000u64).map(|i| mix64(i, 81)).collect();
        let filter = CuckooPlus8::from_keys_with_seed(&keys, 7).unwrap();
        for &k in &keys {
            assert!(filter.may_contain(k));
        }
    }

    #[test]
    fn test_sixteen_bit_no_false_negatives() {
        let keys: Vec<u64> = (0..10_000u64).map(|i| mix64(i, 82)).collect();
        let filter = CuckooPlus16::from_keys_with_seed(&keys, 7).unwrap();
        for &k in &keys {
            assert!(filter.may_contain(k));
        }
    }

    #[test]
    fn test_remove_and_readd() {
        let keys: Vec<u64> = (1..=64u64).collect();
        let mut filter = CuckooPlus16::from_keys_with_seed(&keys, 15).unwrap();
        assert!(filter.remove(32));
        filter.add(32).unwrap();
        for &k in &keys {
            assert!(filter.may_contain(k));
        }
    }

    #[test]
    fn test_eviction_preserves_membership() {
        // fill close to the limit so spills and evictions both happen
        let keys: Vec<u64> = (0..1000u64).map(|i| mix64(i, 83)).collect();
        let mut filter = CuckooPlus8::with_capacity_and_seed(1050, 19).unwrap();
        for &k in &keys {
            filter.add(k).unwrap();
        }
        for &k in &keys {
            assert!(filter.may_contain(k), "lost key {:#x}", k);
        }
    }

    #[test]
    fn test_flag_roundtrip() {
        for fp in [1u64, 5, 63] {
            for second in [false, true] {
                for shifted in [false, true] {
                    let v = CuckooPlus8::compose(fp, second, shifted);
                    assert_eq!(CuckooPlus8::decompose(v), (fp, second, shifted));
                }
            }
        }
    }
}
