//! Xor filter with compressed zero runs
//!
//! An assigned xor table is mostly fingerprints, but the 1.23x
//! construction head room leaves a fifth of the slots zero. This variant
//! stores a rank-indexed bitmap of the occupied slots and packs only the
//! non-zero fingerprints, bringing the cost toward ~8.5 bits per key at
//! the price of one rank lookup per probe.

use super::xor::{construct, fingerprint_of, slot_index};
use crate::bits::Rank9;
use crate::common::hash::{mix64, random_seed};
use crate::common::{Filter, FilterError, Result};

const SERIAL_HEADER: u8 = 0xE8;

/// Compressed xor filter with 8-bit fingerprints.
///
/// # Example
/// ```
/// use filter_oxide::membership::XorPlus8;
/// use filter_oxide::common::Filter;
///
/// let filter = XorPlus8::from_keys(&[10, 20, 30]).unwrap();
/// assert!(filter.may_contain(20));
/// ```
#[derive(Clone, Debug)]
pub struct XorPlus8 {
    seed: u64,
    block_length: u32,
    occupied: Rank9,
    packed: Vec<u8>,
    key_count: usize,
}

impl XorPlus8 {
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
        let (seed, block_length, fingerprints) = construct::<u8>(keys, seed)?;
        let m = fingerprints.len();
        let mut bitmap = vec![0u64; m.div_ceil(64)];
        let mut packed = Vec::new();
        for (i, &fp) in fingerprints.iter().enumerate() {
            if fp != 0 {
                bitmap[i >> 6] |= 1u64 << (i & 63);
                packed.push(fp);
            }
        }
        Ok(XorPlus8 {
            seed,
            block_length,
            occupied: Rank9::new(bitmap, m),
            packed,
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

    /// Exact size of [`XorPlus8::to_bytes`] output.
    pub fn serialized_size(&self) -> usize {
        let m = self.block_length as usize * 3;
        1 + 8 + 4 + 8 + m.div_ceil(64) * 8 + 4 + self.packed.len()
    }

    /// Serializes the filter, big-endian, multi-byte values MSB first.
    pub fn to_bytes(&self) -> Vec<u8> {
        let m = self.block_length as usize * 3;
        let words = m.div_ceil(64);
        let mut bytes = Vec::with_capacity(self.serialized_size());
        bytes.push(SERIAL_HEADER);
        bytes.extend_from_slice(&self.seed.to_be_bytes());
        bytes.extend_from_slice(&self.block_length.to_be_bytes());
        bytes.extend_from_slice(&(self.key_count as u64).to_be_bytes());
        for &word in &self.occupied.words()[..words] {
            bytes.extend_from_slice(&word.to_be_bytes());
        }
        bytes.extend_from_slice(&(self.packed.len() as u32).to_be_bytes());
        bytes.extend_from_slice(&self.packed);
        bytes
    }

    /// Deserializes a filter written by [`XorPlus8::to_bytes`].
    ///
    /// # Errors
    /// [`FilterError::DeserializationError`] on a short buffer, a wrong
    /// header, or inconsistent lengths.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let err = |msg: &str| FilterError::DeserializationError(msg.to_string());
        if bytes.len() < 25 {
            return Err(err("buffer shorter than the fixed header"));
        }
        if bytes[0] != SERIAL_HEADER {
            return Err(err("wrong header byte"));
        }
        let seed = u64::from_be_bytes(bytes[1..9].try_into().unwrap());
        let block_length = u32::from_be_bytes(bytes[9..13].try_into().unwrap());
        let key_count = u64::from_be_bytes(bytes[13..21].try_into().unwrap()) as usize;
        let m = block_length as usize * 3;
        let words = m.div_ceil(64);
        let packed_at = 21 + words * 8;
        if bytes.len() < packed_at + 4 {
            return Err(err("buffer shorter than the bitmap"));
        }
        let mut bitmap = Vec::with_capacity(words);
        for w in 0..words {
            let at = 21 + w * 8;
            bitmap.push(u64::from_be_bytes(bytes[at..at + 8].try_into().unwrap()));
        }
        let packed_len =
            u32::from_be_bytes(bytes[packed_at..packed_at + 4].try_into().unwrap()) as usize;
        if bytes.len() != packed_at + 4 + packed_len {
            return Err(err("buffer length does not match the packed array"));
        }
        let ones: u64 = bitmap.iter().map(|w| u64::from(w.count_ones())).sum();
        if ones as usize != packed_len {
            return Err(err("bitmap population does not match the packed array"));
        }
        let packed = bytes[packed_at + 4..].to_vec();
        Ok(XorPlus8 {
            seed,
            block_length,
            occupied: Rank9::new(bitmap, m),
            packed,
            key_count,
        })
    }
}

impl Filter for XorPlus8 {
    fn may_contain(&self, key: u64) -> bool {
        let h = mix64(key, self.seed);
        let mut x = fingerprint_of::<u8>(h);
        for block in 0..3 {
            let idx = slot_index(h, block, self.block_length);
            if self.occupied.get(idx) {
                x ^= u64::from(self.packed[self.occupied.rank(idx) as usize]);
            }
        }
        x == 0
    }

    fn bit_count(&self) -> u64 {
        self.occupied.bit_count() + self.packed.len() as u64 * 8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_false_negatives() {
        let keys: Vec<u64> = (0..10_000u64).map(|i| mix64(i, 61)).collect();
        let filter = XorPlus8::from_keys_with_seed(&keys, 1).unwrap();
        for &k in &keys {
            assert!(filter.may_contain(k));
        }
    }

    #[test]
    fn test_agrees_with_uncompressed() {
        use super::super::Xor8;
        let keys: Vec<u64> = (0..2000u64).map(|i| mix64(i, 62)).collect();
        let plain = Xor8::from_keys_with_seed(&keys, 9).unwrap();
        let plus = XorPlus8::from_keys_with_seed(&keys, 9).unwrap();
        for probe in 0..20_000u64 {
            assert_eq!(plain.may_contain(probe), plus.may_contain(probe));
        }
    }

    #[test]
    fn test_serialization_roundtrip() {
        let keys: Vec<u64> = (0..3000u64).map(|i| mix64(i, 63)).collect();
        let filter = XorPlus8::from_keys_with_seed(&keys, 2).unwrap();
        let bytes = filter.to_bytes();
        assert_eq!(bytes.len(), filter.serialized_size());
        let restored = XorPlus8::from_bytes(&bytes).unwrap();
        assert_eq!(restored.bit_count(), filter.bit_count());
        for &k in &keys {
            assert!(restored.may_contain(k));
        }
        for probe in 500_000..510_000u64 {
            assert_eq!(filter.may_contain(probe), restored.may_contain(probe));
        }
    }

    #[test]
    fn test_from_bytes_rejects_garbage() {
        assert!(XorPlus8::from_bytes(&[]).is_err());
        assert!(XorPlus8::from_bytes(&[0u8; 10]).is_err());
        let keys: Vec<u64> = (0..100u64).collect();
        let mut bytes = XorPlus8::from_keys_with_seed(&keys, 3).unwrap().to_bytes();
        bytes.pop();
        assert!(XorPlus8::from_bytes(&bytes).is_err());
    }

    #[test]
    fn test_compression_saves_space() {
        use super::super::Xor8;
        let keys: Vec<u64> = (0..50_000u64).map(|i| mix64(i, 64)).collect();
        let plain = Xor8::from_keys_with_seed(&keys, 4).unwrap();
        let plus = XorPlus8::from_keys_with_seed(&keys, 4).unwrap();
        assert!(plus.bit_count() < plain.bit_count());
    }
}
