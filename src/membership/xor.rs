//! Xor filter: peelable three-hash fingerprint table
//!
//! Every key maps to one slot in each of three equal blocks; after
//! construction the XOR of the three slot fingerprints equals the key's
//! own fingerprint, so a query is three loads and one comparison.
//! Construction peels the 3-uniform hypergraph: slots covered by exactly
//! one remaining key are removed onto a stack, and walking the stack
//! backwards assigns each key's fingerprint to the slot that was alone
//! for it.
//!
//! # Reference
//!
//! Graf, Thomas M., and Daniel Lemire. "Xor Filters: Faster and Smaller
//! Than Bloom and Cuckoo Filters." ACM Journal of Experimental
//! Algorithmics 25 (2020).
//!
//! # Example
//! ```
//! use filter_oxide::membership::Xor8;
//! use filter_oxide::common::Filter;
//!
//! let filter = Xor8::from_keys(&[1, 2, 3]).unwrap();
//! assert!(filter.may_contain(2));
//! ```

use super::FingerprintBits;
use crate::bits::sort_unsigned;
use crate::common::hash::{mix64, random_seed, reduce};
use crate::common::{Filter, FilterError, Result};

/// Seeds tried before construction gives up.
pub(crate) const MAX_SEED_ATTEMPTS: usize = 10;

/// One slot index per block for a mixed key hash.
#[inline]
pub(crate) fn slot_index(hash: u64, block: u32, block_length: u32) -> usize {
    let r = hash.rotate_left(21 * block) as u32;
    (block * block_length + reduce(r, block_length)) as usize
}

/// Fingerprint of a mixed key hash: its low bits.
#[inline]
pub(crate) fn fingerprint_of<F: FingerprintBits>(hash: u64) -> u64 {
    hash & ((1u64 << F::BITS) - 1)
}

/// Array length for `n` keys: 1.23x load plus a fixed offset, rounded to
/// three equal blocks.
pub(crate) fn array_length(n: usize) -> usize {
    let raw = 32 + (123 * n + 99) / 100 + 2;
    raw.div_ceil(3) * 3
}

/// Runs the peel-and-assign construction, retrying with derived seeds.
/// Returns the successful seed and the fingerprint array.
pub(crate) fn construct<F: FingerprintBits>(
    keys: &[u64],
    first_seed: u64,
) -> Result<(u64, u32, Vec<F>)> {
    let n = keys.len();
    let m = array_length(n);
    let block_length = (m / 3) as u32;

    let mut reverse_order = vec![0u64; n];
    let mut reverse_slot = vec![0u8; n];
    let mut occupancy = vec![0u32; m];
    let mut xor_acc = vec![0u64; m];
    let mut alone = vec![0u32; m];

    let mut seed = first_seed;
    let mut checked_duplicates = false;
    for attempt in 0..MAX_SEED_ATTEMPTS {
        occupancy.fill(0);
        xor_acc.fill(0);
        for &key in keys {
            let h = mix64(key, seed);
            for block in 0..3 {
                let idx = slot_index(h, block, block_length);
                xor_acc[idx] ^= h;
                occupancy[idx] += 1;
            }
        }

        let mut alone_top = 0;
        for (i, &count) in occupancy.iter().enumerate() {
            if count == 1 {
                alone[alone_top] = i as u32;
                alone_top += 1;
            }
        }

        let mut peeled = 0;
        while alone_top > 0 {
            alone_top -= 1;
            let slot = alone[alone_top] as usize;
            if occupancy[slot] != 1 {
                continue;
            }
            let h = xor_acc[slot];
            reverse_order[peeled] = h;
            for block in 0..3u32 {
                let idx = slot_index(h, block, block_length);
                xor_acc[idx] ^= h;
                occupancy[idx] -= 1;
                if idx == slot {
                    reverse_slot[peeled] = block as u8;
                } else if occupancy[idx] == 1 {
                    alone[alone_top] = idx as u32;
                    alone_top += 1;
                }
            }
            peeled += 1;
        }

        if peeled == n {
            let mut fingerprints = vec![F::from_u64(0); m];
            for j in (0..n).rev() {
                let h = reverse_order[j];
                let chosen = u32::from(reverse_slot[j]);
                let mut x = fingerprint_of::<F>(h);
                let mut target = 0usize;
                for block in 0..3 {
                    let idx = slot_index(h, block, block_length);
                    if block == chosen {
                        target = idx;
                    } else {
                        x ^= fingerprints[idx].to_u64();
                    }
                }
                fingerprints[target] = F::from_u64(x);
            }
            return Ok((seed, block_length, fingerprints));
        }

        // a failed peel is usually bad luck, but duplicate keys can
        // never peel; check once before burning further seeds
        if !checked_duplicates {
            checked_duplicates = true;
            let mut sorted = keys.to_vec();
            sort_unsigned(&mut sorted);
            for pair in sorted.windows(2) {
                if pair[0] == pair[1] {
                    return Err(FilterError::DuplicateKey { key: pair[0] });
                }
            }
        }
        seed = mix64(seed, attempt as u64 + 1);
    }
    Err(FilterError::ConstructionFailed {
        attempts: MAX_SEED_ATTEMPTS,
    })
}

/// Immutable xor filter over 64-bit keys, generic in fingerprint width.
///
/// Use the [`Xor8`] and [`Xor16`] aliases.
#[derive(Clone, Debug)]
pub struct Xor<F: FingerprintBits> {
    seed: u64,
    block_length: u32,
    fingerprints: Vec<F>,
    key_count: usize,
}

/// Xor filter with 8-bit fingerprints (~0.39% false-positive rate).
pub type Xor8 = Xor<u8>;
/// Xor filter with 16-bit fingerprints (~0.0015% false-positive rate).
pub type Xor16 = Xor<u16>;

impl<F: FingerprintBits> Xor<F> {
    /// Builds a filter from unique keys with a random seed.
    ///
    /// # Errors
    /// [`FilterError::DuplicateKey`] on repeated keys,
    /// [`FilterError::ConstructionFailed`] if peeling fails for every
    /// seed.
    pub fn from_keys(keys: &[u64]) -> Result<Self> {
        Self::from_keys_with_seed(keys, random_seed())
    }

    /// Builds a filter with a deterministic first seed.
    pub fn from_keys_with_seed(keys: &[u64], seed: u64) -> Result<Self> {
        let (seed, block_length, fingerprints) = construct::<F>(keys, seed)?;
        Ok(Xor {
            seed,
            block_length,
            fingerprints,
            key_count: keys.len(),
        })
    }

    /// Number of keys the filter was built from.
    pub fn len(&self) -> usize {
        self.key_count
    }

    /// Whether the filter was built from an empty key set.
    pub fn is_empty(&self) -> bool {
        self.key_count == 0
    }

    /// Achieved storage cost.
    pub fn bits_per_key(&self) -> f64 {
        if self.key_count == 0 {
            return 0.0;
        }
        self.bit_count() as f64 / self.key_count as f64
    }
}

impl<F: FingerprintBits> Filter for Xor<F> {
    fn may_contain(&self, key: u64) -> bool {
        let h = mix64(key, self.seed);
        let mut x = fingerprint_of::<F>(h);
        for block in 0..3 {
            x ^= self.fingerprints[slot_index(h, block, self.block_length)].to_u64();
        }
        x == 0
    }

    fn bit_count(&self) -> u64 {
        self.fingerprints.len() as u64 * u64::from(F::BITS)
    }
}
