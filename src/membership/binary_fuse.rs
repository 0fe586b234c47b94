//! Binary fuse filter: segmented refinement of the xor filter
//!
//! Keys map into three consecutive segments of a window chosen by one
//! hash, with in-segment offsets chosen by rotations of the same hash.
//! The overlapping windows raise the peelable load from the xor
//! filter's ~1.23x to ~1.13x for large sets, at identical query cost:
//! three loads and a fingerprint comparison.
//!
//! The 16-bit variant defines the crate's one wire format; all
//! multi-byte values are written big-endian, MSB first.
//!
//! # Space Efficiency
//!
//! | Filter | bits/key @ large n |
//! |--------|--------------------|
//! | Bloom (1% FP) | ~10 |
//! | Xor8 | ~9.8 |
//! | BinaryFuse8 | ~9.1 |
//!
//! # Reference
//!
//! Graf, Thomas M., and Daniel Lemire. "Binary Fuse Filters: Fast and
//! Smaller Than Xor Filters." ACM Journal of Experimental Algorithmics
//! 27 (2022).
//!
//! # Example
//! ```
//! use filter_oxide::membership::BinaryFuse8;
//! use filter_oxide::common::Filter;
//!
//! let keys: Vec<u64> = (0..1000).collect();
//! let filter = BinaryFuse8::from_keys(&keys).unwrap();
//! assert!(filter.may_contain(500));
//! ```

use super::xor::fingerprint_of;
use super::FingerprintBits;
use crate::bits::sort_unsigned;
use crate::common::hash::{mix64, random_seed, reduce};
use crate::common::{Filter, FilterError, Result};

/// Seeds tried before construction gives up; every third failure also
/// lowers the load target.
const MAX_SEED_ATTEMPTS: usize = 12;

/// Version-and-endianness marker leading the 16-bit wire format.
const SERIAL_HEADER: u8 = 0xF6;

/// Segment length from the key count: the precomputed small-set curve,
/// capped at 4096.
fn segment_length_for(n: usize) -> u32 {
    match n {
        0..=316 => 64,
        317..=3_162 => 256,
        3_163..=31_622 => 1024,
        _ => 4096,
    }
}

/// Initial load target; small sets need proportionally more slack.
fn size_factor(n: usize) -> f64 {
    if n < 2 {
        return 2.0;
    }
    (0.875 + 0.25 * 1_000_000f64.ln() / (n as f64).ln()).max(1.125)
}

/// Segment count and array length for a load target.
fn layout(n: usize, factor: f64, segment_length: u32) -> (u32, usize) {
    let capacity = ((n as f64 * factor).round() as u64).max(1);
    let segment_count = capacity
        .div_ceil(u64::from(segment_length))
        .saturating_sub(2)
        .max(1) as u32;
    let array_length = (segment_count as usize + 2) * segment_length as usize;
    (segment_count, array_length)
}

/// The three slot indices for a mixed key hash: one per consecutive
/// segment of the window picked by a further mix of the hash.
#[inline]
fn fuse_indices(hash: u64, segment_count: u32, segment_length: u32) -> [usize; 3] {
    let segment = reduce((mix64(hash, 0) >> 32) as u32, segment_count);
    let mut indices = [0usize; 3];
    for (i, slot) in indices.iter_mut().enumerate() {
        let r = hash.rotate_left(21 * i as u32) as u32;
        *slot = ((segment + i as u32) * segment_length + reduce(r, segment_length)) as usize;
    }
    indices
}

fn construct<F: FingerprintBits>(
    keys: &[u64],
    first_seed: u64,
) -> Result<(u64, u32, u32, Vec<F>)> {
    let n = keys.len();
    let segment_length = segment_length_for(n);
    let mut factor = size_factor(n);
    let mut seed = first_seed;
    let mut checked_duplicates = false;

    for attempt in 0..MAX_SEED_ATTEMPTS {
        if attempt > 0 && attempt % 3 == 0 {
            factor *= 1.10;
        }
        let (segment_count, array_length) = layout(n, factor, segment_length);

        let mut reverse_order = vec![0u64; n];
        let mut reverse_slot = vec![0u8; n];
        let mut occupancy = vec![0u32; array_length];
        let mut xor_acc = vec![0u64; array_length];
        let mut alone = vec![0u32; array_length];

        for &key in keys {
            let h = mix64(key, seed);
            for idx in fuse_indices(h, segment_count, segment_length) {
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
            for (i, idx) in fuse_indices(h, segment_count, segment_length)
                .into_iter()
                .enumerate()
            {
                xor_acc[idx] ^= h;
                occupancy[idx] -= 1;
                if idx == slot {
                    reverse_slot[peeled] = i as u8;
                } else if occupancy[idx] == 1 {
                    alone[alone_top] = idx as u32;
                    alone_top += 1;
                }
            }
            peeled += 1;
        }

        if peeled == n {
            let mut fingerprints = vec![F::from_u64(0); array_length];
            for j in (0..n).rev() {
                let h = reverse_order[j];
                let chosen = usize::from(reverse_slot[j]);
                let mut x = fingerprint_of::<F>(h);
                let indices = fuse_indices(h, segment_count, segment_length);
                for (i, idx) in indices.into_iter().enumerate() {
                    if i != chosen {
                        x ^= fingerprints[idx].to_u64();
                    }
                }
                fingerprints[indices[chosen]] = F::from_u64(x);
            }
            return Ok((seed, segment_length, segment_count, fingerprints));
        }

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

/// Immutable binary fuse filter over 64-bit keys, generic in
/// fingerprint width.
///
/// Use the [`BinaryFuse8`] and [`BinaryFuse16`] aliases.
#[derive(Clone, Debug)]
pub struct BinaryFuse<F: FingerprintBits> {
    seed: u64,
    segment_length: u32,
    segment_count: u32,
    fingerprints: Vec<F>,
    key_count: usize,
}

/// Binary fuse filter with 8-bit fingerprints (~0.39% false positives).
pub type BinaryFuse8 = BinaryFuse<u8>;
/// Binary fuse filter with 16-bit fingerprints (~0.0015% false
/// positives); supports serialization.
pub type BinaryFuse16 = BinaryFuse<u16>;

impl<F: FingerprintBits> BinaryFuse<F> {
    /// Builds a filter from unique keys with a random seed.
    ///
    /// # Errors
    /// [`FilterError::DuplicateKey`] on repeated keys,
    /// [`FilterError::ConstructionFailed`] if peeling fails for every
    /// seed and load target.
    pub fn from_keys(keys: &[u64]) -> Result<Self> {
        Self::from_keys_with_seed(keys, random_seed())
    }

    /// Builds a filter with a deterministic first seed.
    pub fn from_keys_with_seed(keys: &[u64], seed: u64) -> Result<Self> {
        let (seed, segment_length, segment_count, fingerprints) = construct::<F>(keys, seed)?;
        Ok(BinaryFuse {
            seed,
            segment_length,
            segment_count,
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

impl<F: FingerprintBits> Filter for BinaryFuse<F> {
    fn may_contain(&self, key: u64) -> bool {
        let h = mix64(key, self.seed);
        let mut x = fingerprint_of::<F>(h);
        for idx in fuse_indices(h, self.segment_count, self.segment_length) {
            x ^= self.fingerprints[idx].to_u64();
        }
        x == 0
    }

    fn bit_count(&self) -> u64 {
        self.fingerprints.len() as u64 * u64::from(F::BITS)
    }
}

impl BinaryFuse<u16> {
    /// Exact byte count of the serialized form.
    pub fn serialized_size(&self) -> usize {
        1 + 8 + 6 * 4 + 2 * self.fingerprints.len()
    }

    /// Serializes into a caller buffer sized by
    /// [`BinaryFuse16::serialized_size`].
    ///
    /// # Errors
    /// [`FilterError::SerializationError`] when the buffer is too small.
    pub fn serialize_into(&self, out: &mut [u8]) -> Result<()> {
        let size = self.serialized_size();
        if out.len() < size {
            return Err(FilterError::SerializationError(format!(
                "need {} bytes, got {}",
                size,
                out.len()
            )));
        }
        out[0] = SERIAL_HEADER;
        out[1..9].copy_from_slice(&self.seed.to_be_bytes());
        out[9..13].copy_from_slice(&self.segment_length.to_be_bytes());
        out[13..17].copy_from_slice(&(self.segment_length - 1).to_be_bytes());
        out[17..21].copy_from_slice(&self.segment_count.to_be_bytes());
        out[21..25].copy_from_slice(&(self.segment_count * self.segment_length).to_be_bytes());
        out[25..29].copy_from_slice(&(self.fingerprints.len() as u32).to_be_bytes());
        out[29..33].copy_from_slice(&(self.key_count as u32).to_be_bytes());
        for (i, fp) in self.fingerprints.iter().enumerate() {
            out[33 + 2 * i..35 + 2 * i].copy_from_slice(&fp.to_be_bytes());
        }
        Ok(())
    }

    /// Serializes into a fresh, exactly-sized buffer.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = vec![0u8; self.serialized_size()];
        self.serialize_into(&mut bytes)
            .expect("buffer sized by serialized_size");
        bytes
    }

    /// Deserializes a filter written by [`BinaryFuse16::serialize_into`].
    ///
    /// # Errors
    /// [`FilterError::DeserializationError`] on a short buffer, a wrong
    /// header byte, or inconsistent geometry fields.
    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        let err = |msg: String| FilterError::DeserializationError(msg);
        if bytes.len() < 33 {
            return Err(err("buffer shorter than the fixed header".to_string()));
        }
        if bytes[0] != SERIAL_HEADER {
            return Err(err(format!("wrong header byte {:#04x}", bytes[0])));
        }
        let seed = u64::from_be_bytes(bytes[1..9].try_into().unwrap());
        let segment_length = u32::from_be_bytes(bytes[9..13].try_into().unwrap());
        let segment_length_mask = u32::from_be_bytes(bytes[13..17].try_into().unwrap());
        let segment_count = u32::from_be_bytes(bytes[17..21].try_into().unwrap());
        let segment_count_length = u32::from_be_bytes(bytes[21..25].try_into().unwrap());
        let array_length = u32::from_be_bytes(bytes[25..29].try_into().unwrap());
        let key_count = u32::from_be_bytes(bytes[29..33].try_into().unwrap()) as usize;

        if !segment_length.is_power_of_two() {
            return Err(err(format!("segment length {} not a power of two", segment_length)));
        }
        if segment_length_mask != segment_length - 1 {
            return Err(err("segment length mask mismatch".to_string()));
        }
        if u64::from(segment_count_length) != u64::from(segment_count) * u64::from(segment_length)
        {
            return Err(err("segment count length mismatch".to_string()));
        }
        if u64::from(array_length) != (u64::from(segment_count) + 2) * u64::from(segment_length) {
            return Err(err("array length mismatch".to_string()));
        }
        let expected = 33 + 2 * array_length as usize;
        if bytes.len() != expected {
            return Err(err(format!(
                "expected {} bytes, got {}",
                expected,
                bytes.len()
            )));
        }
        let fingerprints: Vec<u16> = (0..array_length as usize)
            .map(|i| u16::from_be_bytes(bytes[33 + 2 * i..35 + 2 * i].try_into().unwrap()))
            .collect();
        Ok(BinaryFuse {
            seed,
            segment_length,
            segment_count,
            fingerprints,
            key_count,
        })
    }
}
