//! Minimal-perfect-hash filter
//!
//! Builds a perfect mapping from the key set onto `[0, n)` and stores
//! one explicit fingerprint per slot. Keys are bucketed by a hash
//! prefix; inside a bucket the key set is split recursively into halves
//! by searching for a supplemental-hash index that produces the wanted
//! partition, down to leaf-sized sets where the index is searched until
//! it maps the leaf bijectively onto its slots. The searched indices are
//! Golomb-Rice coded with size-dependent shifts; a query re-walks the
//! coding, skipping the subtrees it does not descend into.
//!
//! Experimental: the heaviest construction machinery in the crate, kept
//! behind the same `Filter` surface but exercised by smoke tests only.

use crate::bits::{sort_unsigned, BitBuffer, MonotoneList};
use crate::common::hash::{mix64, random_seed, reduce};
use crate::common::{Filter, FilterError, Result};

/// Largest set solved by a direct bijection search.
const LEAF_SIZE: usize = 8;

/// Mean keys per bucket.
const AVG_BUCKET: usize = 16;

/// Bound on the supplemental-hash index search.
const MAX_INDEX: u32 = 1 << 20;

/// Decorrelates stored fingerprints from the placement hash.
const FINGERPRINT_SEED: u64 = 0xC4CE_B9FE_1A85_EC53;

/// Rice shifts for the leaf bijection indices, by leaf size. Derived
/// from the expected number of tries `size^size / size!`.
const LEAF_SHIFT: [u32; LEAF_SIZE + 1] = [0, 0, 1, 2, 3, 4, 6, 7, 8];

/// Rice shift for a balanced split of `size` keys; the expected number
/// of tries grows with the square root of the size.
fn split_shift(size: usize) -> u32 {
    (63 - (size as u64).leading_zeros()) / 2
}

#[inline]
fn supplemental(hash: u64, index: u32) -> u32 {
    (mix64(hash, u64::from(index)) >> 32) as u32
}

/// Minimal-perfect-hash filter over 64-bit keys.
#[derive(Clone, Debug)]
pub struct Mphf {
    seed: u64,
    bucket_count: u32,
    fingerprint_bits: u32,
    key_starts: MonotoneList,
    bit_starts: MonotoneList,
    descriptors: BitBuffer,
    fingerprints: BitBuffer,
    key_count: usize,
}

impl Mphf {
    /// Builds a filter from unique keys at `fingerprint_bits` bits per
    /// stored fingerprint, with a random seed.
    ///
    /// # Errors
    /// [`FilterError::InvalidParameter`] for a fingerprint width outside
    /// `[1, 32]`, [`FilterError::DuplicateKey`] on repeated keys, and
    /// [`FilterError::ConstructionFailed`] if an index search exhausts
    /// its bound.
    pub fn from_keys(keys: &[u64], fingerprint_bits: u32) -> Result<Self> {
        Self::from_keys_with_seed(keys, fingerprint_bits, random_seed())
    }

    /// Builds a filter with an explicit seed.
    pub fn from_keys_with_seed(keys: &[u64], fingerprint_bits: u32, seed: u64) -> Result<Self> {
        if !(1..=32).contains(&fingerprint_bits) {
            return Err(FilterError::InvalidParameter {
                param: "fingerprint_bits".to_string(),
                value: fingerprint_bits.to_string(),
                constraint: "must be in range [1, 32]".to_string(),
            });
        }
        let n = keys.len();
        {
            let mut sorted = keys.to_vec();
            sort_unsigned(&mut sorted);
            for pair in sorted.windows(2) {
                if pair[0] == pair[1] {
                    return Err(FilterError::DuplicateKey { key: pair[0] });
                }
            }
        }

        let bucket_count = n.div_ceil(AVG_BUCKET).max(1) as u32;
        let mut buckets: Vec<Vec<u64>> = vec![Vec::new(); bucket_count as usize];
        for &key in keys {
            let h = mix64(key, seed);
            buckets[reduce((h >> 32) as u32, bucket_count) as usize].push(h);
        }

        let mut key_offsets = Vec::with_capacity(bucket_count as usize + 1);
        let mut bit_offsets = Vec::with_capacity(bucket_count as usize + 1);
        let mut scratch = BitBuffer::new(4096 + n * 64 + bucket_count as usize * 128);
        let mut slots: Vec<u64> = Vec::with_capacity(n);
        let mut key_base = 0u64;
        for bucket in &mut buckets {
            key_offsets.push(key_base);
            bit_offsets.push(scratch.position() as u64);
            Self::encode_set(bucket, key_base, &mut scratch, &mut slots)?;
            key_base += bucket.len() as u64;
        }
        key_offsets.push(key_base);
        bit_offsets.push(scratch.position() as u64);

        let mut descriptors = BitBuffer::new(scratch.position());
        descriptors.write_buffer(&scratch);

        // slots carry (slot << fingerprint_bits) | fingerprint; sorting
        // by slot lets the packed array be written in one pass
        sort_unsigned(&mut slots);
        let fpb = fingerprint_bits;
        let mut fingerprints = BitBuffer::new(n * fpb as usize);
        for entry in &slots {
            fingerprints.write_number(entry & ((1u64 << fpb) - 1), fpb);
        }

        Ok(Mphf {
            seed,
            bucket_count,
            fingerprint_bits,
            key_starts: MonotoneList::new(&key_offsets),
            bit_starts: MonotoneList::new(&bit_offsets),
            descriptors,
            fingerprints,
            key_count: n,
        })
    }

    fn fingerprint(hash: u64, bits: u32) -> u64 {
        mix64(hash, FINGERPRINT_SEED) & ((1u64 << bits) - 1)
    }

    /// Recursively encodes one key set and records each key's slot and
    /// fingerprint. `hashes` are the mixed key hashes of the set;
    /// `slot_base` is the first slot the set owns.
    fn encode_set(
        hashes: &mut [u64],
        slot_base: u64,
        buf: &mut BitBuffer,
        slots: &mut Vec<u64>,
    ) -> Result<()> {
        let size = hashes.len();
        if size == 0 {
            return Ok(());
        }
        if size <= LEAF_SIZE {
            'search: for index in 0..MAX_INDEX {
                let mut used = 0u16;
                for &h in hashes.iter() {
                    let slot = reduce(supplemental(h, index), size as u32);
                    if used & (1 << slot) != 0 {
                        continue 'search;
                    }
                    used |= 1 << slot;
                }
                buf.write_golomb_rice(LEAF_SHIFT[size], u64::from(index));
                for &h in hashes.iter() {
                    let slot = slot_base + u64::from(reduce(supplemental(h, index), size as u32));
                    slots.push((slot << 32) | Self::fingerprint(h, 32));
                }
                return Ok(());
            }
            return Err(FilterError::ConstructionFailed {
                attempts: MAX_INDEX as usize,
            });
        }

        let first = size / 2;
        'split: for index in 0..MAX_INDEX {
            let left = hashes
                .iter()
                .filter(|&&h| (reduce(supplemental(h, index), size as u32) as usize) < first)
                .count();
            if left != first {
                continue 'split;
            }
            buf.write_golomb_rice(split_shift(size), u64::from(index));
            let (mut lo, mut hi) = (Vec::with_capacity(first), Vec::with_capacity(size - first));
            for &h in hashes.iter() {
                if (reduce(supplemental(h, index), size as u32) as usize) < first {
                    lo.push(h);
                } else {
                    hi.push(h);
                }
            }
            hashes[..first].copy_from_slice(&lo);
            hashes[first..].copy_from_slice(&hi);
            Self::encode_set(&mut hashes[..first], slot_base, buf, slots)?;
            return Self::encode_set(&mut hashes[first..], slot_base + first as u64, buf, slots);
        }
        Err(FilterError::ConstructionFailed {
            attempts: MAX_INDEX as usize,
        })
    }

    /// Reads a Golomb-Rice code at an absolute position; returns the
    /// value and the position past the code.
    fn read_rice_at(&self, pos: usize, shift: u32) -> (u64, usize) {
        let q = u64::from(self.descriptors.read_until_zero_at(pos));
        let after_unary = pos + q as usize + 1;
        let r = self.descriptors.read_number_at(after_unary, shift);
        ((q << shift) | r, after_unary + shift as usize)
    }

    /// Position past the whole encoding of a set of `size` keys.
    fn skip_set(&self, pos: usize, size: usize) -> usize {
        if size == 0 {
            return pos;
        }
        if size <= LEAF_SIZE {
            return self.descriptors.skip_golomb_rice(pos, LEAF_SHIFT[size]);
        }
        let pos = self.descriptors.skip_golomb_rice(pos, split_shift(size));
        let first = size / 2;
        let pos = self.skip_set(pos, first);
        self.skip_set(pos, size - first)
    }

    /// Number of keys the filter was built from.
    pub fn len(&self) -> usize {
        self.key_count
    }

    /// Whether the filter was built from no keys.
    pub fn is_empty(&self) -> bool {
        self.key_count == 0
    }
}

impl Filter for Mphf {
    fn may_contain(&self, key: u64) -> bool {
        let h = mix64(key, self.seed);
        let bucket = reduce((h >> 32) as u32, self.bucket_count) as usize;
        let mut slot = self.key_starts.get(bucket);
        let mut size = (self.key_starts.get(bucket + 1) - slot) as usize;
        if size == 0 {
            return false;
        }
        let mut pos = self.bit_starts.get(bucket) as usize;
        while size > LEAF_SIZE {
            let (index, after) = self.read_rice_at(pos, split_shift(size));
            pos = after;
            let first = size / 2;
            if (reduce(supplemental(h, index as u32), size as u32) as usize) < first {
                size = first;
            } else {
                pos = self.skip_set(pos, first);
                slot += first as u64;
                size -= first;
            }
        }
        let (index, _) = self.read_rice_at(pos, LEAF_SHIFT[size]);
        let slot = slot + u64::from(reduce(supplemental(h, index as u32), size as u32));
        let stored = self
            .fingerprints
            .read_number_at(slot as usize * self.fingerprint_bits as usize, self.fingerprint_bits);
        stored == Self::fingerprint(h, self.fingerprint_bits)
    }

    fn bit_count(&self) -> u64 {
        self.descriptors.capacity() as u64
            + self.fingerprints.capacity() as u64
            + self.key_starts.bit_count()
            + self.bit_starts.bit_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_false_negatives_smoke() {
        let keys: Vec<u64> = (0..2_000u64).map(|i| mix64(i, 91)).collect();
        let filter = Mphf::from_keys_with_seed(&keys, 8, 1).unwrap();
        for &k in &keys {
            assert!(filter.may_contain(k));
        }
    }

    #[test]
    fn test_slots_form_a_bijection() {
        let keys: Vec<u64> = (0..500u64).map(|i| mix64(i, 92)).collect();
        let filter = Mphf::from_keys_with_seed(&keys, 16, 2).unwrap();
        // every key's fingerprint is stored at a distinct slot, so n
        // stored fingerprints must all be reachable
        assert_eq!(filter.len(), keys.len());
        for &k in &keys {
            assert!(filter.may_contain(k));
        }
    }

    #[test]
    fn test_duplicate_keys_rejected() {
        assert!(matches!(
            Mphf::from_keys_with_seed(&[4, 4], 8, 3),
            Err(FilterError::DuplicateKey { key: 4 })
        ));
    }

    #[test]
    fn test_empty_and_tiny() {
        let filter = Mphf::from_keys_with_seed(&[], 8, 4).unwrap();
        assert!(!filter.may_contain(1));
        let filter = Mphf::from_keys_with_seed(&[42], 8, 5).unwrap();
        assert!(filter.may_contain(42));
    }
}
